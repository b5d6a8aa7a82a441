use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, encoding or batching llex data.
#[derive(Debug, Error)]
pub enum LlexError {
    /// A dataset or artifact file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// The path that was being read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of a JSONL file is not a valid record.
    #[error("malformed record on line {line}: {message}")]
    MalformedLine {
        /// 1-based line number in the source file.
        line: usize,
        /// The underlying parser message.
        message: String,
    },

    /// A record parsed but violates a structural invariant.
    #[error("invalid record {word:?}: {reason}")]
    InvalidRecord {
        /// The word (or a short description for semantic records).
        word: String,
        /// Why the record was rejected.
        reason: String,
    },

    /// A label string is not part of the active tag scheme.
    #[error("unknown BIO label {label:?} for tag scheme {scheme}")]
    UnknownLabel {
        /// The offending label.
        label: String,
        /// The scheme the label was looked up in.
        scheme: String,
    },

    /// Collation was asked to build a batch from zero examples.
    #[error("cannot collate an empty batch")]
    EmptyBatch,

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

/// Result type alias for llex core operations.
pub type Result<T> = std::result::Result<T, LlexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LlexError::EmptyBatch;
        assert_eq!(err.to_string(), "cannot collate an empty batch");

        let err = LlexError::UnknownLabel {
            label: "B-ROO".into(),
            scheme: "full".into(),
        };
        assert!(err.to_string().contains("B-ROO"));
        assert!(err.to_string().contains("full"));

        let err = LlexError::MalformedLine {
            line: 7,
            message: "expected value".into(),
        };
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlexError>();
    }
}
