//! Typed JSONL records and the in-memory record store.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlexError, Result};
use crate::tags::MorphemeKind;

/// A character span of a word, `start..end` in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: MorphemeKind,
}

/// One segmentation example: a word with a BIO label per character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRecord {
    pub word: String,
    pub labels: Vec<String>,
    /// Gold spans. Not used for training; checked for bounds on load.
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub morphemes: Vec<String>,
}

/// One semantic example: the affixes of a word and its semantic tags.
///
/// Missing lists default to empty, `complexity` to `0.0` and `confidence` to `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticRecord {
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub suffixes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub complexity: f32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl SemanticRecord {
    /// Prefixes then suffixes. Both land in the same count vector.
    pub fn affixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes
            .iter()
            .chain(self.suffixes.iter())
            .map(String::as_str)
    }
}

/// Load-time validation hook for record types.
pub trait Record: DeserializeOwned {
    fn validate(&self) -> Result<()>;
}

impl Record for SegmentationRecord {
    fn validate(&self) -> Result<()> {
        let len = self.word.chars().count();
        if len == 0 {
            return Err(LlexError::InvalidRecord {
                word: self.word.clone(),
                reason: "empty word".to_string(),
            });
        }
        if self.labels.len() != len {
            return Err(LlexError::InvalidRecord {
                word: self.word.clone(),
                reason: format!("{} labels for {} characters", self.labels.len(), len),
            });
        }
        for span in &self.spans {
            if span.start >= span.end || span.end > len {
                return Err(LlexError::InvalidRecord {
                    word: self.word.clone(),
                    reason: format!(
                        "{} span {}..{} out of bounds for length {}",
                        span.kind, span.start, span.end, len
                    ),
                });
            }
        }
        Ok(())
    }
}

impl Record for SemanticRecord {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(LlexError::InvalidRecord {
                word: self.affixes().collect::<Vec<_>>().join("+"),
                reason: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        Ok(())
    }
}

/// Ordered, in-memory collection of records loaded from a JSONL file.
#[derive(Debug, Clone)]
pub struct RecordStore<T> {
    records: Vec<T>,
}

impl<T: Record> RecordStore<T> {
    /// Load a JSONL file. Blank lines are skipped; any bad line fails the load.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LlexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            LlexError::Io { source, .. } => LlexError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), records = store.len(), "loaded records");
        Ok(store)
    }

    /// Parse records from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut records = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| LlexError::Io {
                path: Default::default(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let record: T = serde_json::from_str(&line).map_err(|e| LlexError::MalformedLine {
                line: idx + 1,
                message: e.to_string(),
            })?;
            record.validate().map_err(|e| match e {
                LlexError::InvalidRecord { word, reason } => LlexError::InvalidRecord {
                    word,
                    reason: format!("line {}: {}", idx + 1, reason),
                },
                other => other,
            })?;
            records.push(record);
        }

        Ok(Self { records })
    }
}

impl<T> RecordStore<T> {
    pub fn from_records(records: Vec<T>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }
}

impl<'a, T> IntoIterator for &'a RecordStore<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEG: &str = r#"{"word":"walked","labels":["B-ROOT","I-ROOT","I-ROOT","I-ROOT","B-SUFFIX","I-SUFFIX"],"spans":[{"start":0,"end":4,"type":"root"},{"start":4,"end":6,"type":"suffix"}],"morphemes":["walk","ed"]}"#;

    #[test]
    fn test_load_skips_blank_lines() {
        let input = format!("{SEG}\n\n   \n{SEG}\n");
        let store = RecordStore::<SegmentationRecord>::from_reader(input.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        let first = store.get(0).unwrap();
        assert_eq!(first.word, "walked");
        assert_eq!(first.spans[1].kind, MorphemeKind::Suffix);
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_malformed_line_fails_whole_load() {
        let input = format!("{SEG}\n{{not json\n{SEG}\n");
        let err = RecordStore::<SegmentationRecord>::from_reader(input.as_bytes()).unwrap_err();
        assert!(matches!(err, LlexError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_label_length_mismatch_rejected() {
        let input = r#"{"word":"cat","labels":["B-ROOT","I-ROOT"]}"#;
        let err = RecordStore::<SegmentationRecord>::from_reader(input.as_bytes()).unwrap_err();
        assert!(matches!(err, LlexError::InvalidRecord { .. }));
    }

    #[test]
    fn test_span_bounds_rejected() {
        let input = r#"{"word":"cat","labels":["B-ROOT","I-ROOT","I-ROOT"],"spans":[{"start":2,"end":4,"type":"root"}]}"#;
        let err = RecordStore::<SegmentationRecord>::from_reader(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_semantic_defaults() {
        let input = r#"{"suffixes":["-ify"],"tags":["CAUSATIVE"]}"#;
        let store = RecordStore::<SemanticRecord>::from_reader(input.as_bytes()).unwrap();
        let rec = store.get(0).unwrap();
        assert!(rec.prefixes.is_empty());
        assert_eq!(rec.complexity, 0.0);
        assert_eq!(rec.confidence, 1.0);
        assert_eq!(rec.affixes().collect::<Vec<_>>(), vec!["-ify"]);
    }

    #[test]
    fn test_semantic_confidence_range() {
        let input = r#"{"prefixes":["re-"],"confidence":1.5}"#;
        assert!(RecordStore::<SemanticRecord>::from_reader(input.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = RecordStore::<SemanticRecord>::load("/nonexistent/llex.jsonl").unwrap_err();
        assert!(matches!(err, LlexError::Io { .. }));
    }
}
