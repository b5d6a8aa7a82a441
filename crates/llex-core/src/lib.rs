//! # llex Core
//!
//! Data contracts for the llex morphology models: typed JSONL records,
//! frozen vocabularies, the BIO tag scheme, example encoders and
//! variable-length batch collation.
//!
//! ## Quick Start
//!
//! ```rust
//! use llex_core::{collate, CharVocab, RecordStore, SegmentationEncoder, SegmentationRecord, TagScheme};
//!
//! let jsonl = r#"{"word":"walked","labels":["B-ROOT","I-ROOT","I-ROOT","I-ROOT","B-SUFFIX","I-SUFFIX"]}"#;
//! let store = RecordStore::<SegmentationRecord>::from_reader(jsonl.as_bytes()).unwrap();
//! let vocab = CharVocab::build(store.iter().map(|r| r.word.as_str()));
//!
//! let encoder = SegmentationEncoder::new(&vocab, TagScheme::Full);
//! let encoded = encoder.encode(store.get(0).unwrap()).unwrap();
//! let batch = collate([&encoded]).unwrap();
//!
//! assert_eq!(batch.lengths, vec![6]);
//! ```
pub mod batch;
pub mod encode;
pub mod error;
pub mod record;
pub mod spans;
pub mod tags;
pub mod vocab;

// Re-export primary API
pub use batch::{collate, collate_semantic, PaddedBatch, SegmentationBatch, SemanticBatch};
pub use encode::{AffixEncoder, EncodedAffixes, EncodedWord, SegmentationEncoder};
pub use error::{LlexError, Result};
pub use record::{Record, RecordStore, SegmentationRecord, SemanticRecord, Span};
pub use spans::{assemble_morphemes, Morpheme};
pub use tags::{BioTag, LabelSlot, MorphemeKind, TagScheme, IGNORE_INDEX};
pub use vocab::{CharVocab, Vocab, PAD_ID, UNK_ID};
