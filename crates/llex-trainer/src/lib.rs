//! # llex Trainer
//!
//! Trains and applies the two llex morphology models:
//!
//! - a character BiLSTM that tags each character of a word with a BIO
//!   prefix/root/suffix label, and
//! - an affix-count classifier that predicts a set of semantic tags.
//!
//! Checkpoints bundle parameters with the vocabularies they were trained
//! with; see [`checkpoint`].

pub mod checkpoint;
pub mod config;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod trainer;

pub use config::{ClassifierConfig, SegmentationConfig, SegmenterConfig, SemanticConfig};
pub use inference::{Segmentation, Segmenter, TagPrediction, TagPredictor, TAG_THRESHOLD};
pub use metrics::EpochMetrics;
pub use model::{AffixClassifier, CharBiLstm};
pub use trainer::{select_device, SegmentationTrainer, SemanticTrainer, TrainingReport};
