//! Training and model hyper-parameters.

use std::path::PathBuf;

use anyhow::{bail, Result};
use llex_core::{BioTag, TagScheme};
use serde::{Deserialize, Serialize};

/// Options for a segmentation training run.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub lr: f64,
    /// Seed for the per-epoch shuffle.
    pub seed: u64,
    pub checkpoint: PathBuf,
    pub scheme: TagScheme,
    pub embedding_dim: usize,
    /// Total BiLSTM output width; each direction gets half.
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub dropout: f32,
    /// Overwrite the checkpoint after every epoch, not only at the end.
    pub save_every_epoch: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 32,
            lr: 0.001,
            seed: 42,
            checkpoint: PathBuf::from("segmentation_model.safetensors"),
            scheme: TagScheme::Full,
            embedding_dim: 64,
            hidden_dim: 128,
            num_layers: 2,
            dropout: 0.3,
            save_every_epoch: false,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        validate_loop(self.epochs, self.batch_size, self.lr)?;
        validate_dropout(self.dropout)?;
        if self.hidden_dim == 0 || self.hidden_dim % 2 != 0 {
            bail!("hidden_dim must be a positive even number, got {}", self.hidden_dim);
        }
        if self.embedding_dim == 0 || self.num_layers == 0 {
            bail!("embedding_dim and num_layers must be positive");
        }
        Ok(())
    }

    pub fn model_config(&self, vocab_size: usize) -> SegmenterConfig {
        SegmenterConfig {
            vocab_size,
            embedding_dim: self.embedding_dim,
            hidden_dim: self.hidden_dim,
            num_layers: self.num_layers,
            num_tags: BioTag::NUM_TAGS,
            dropout: self.dropout,
        }
    }
}

/// Options for a semantic training run.
#[derive(Debug, Clone)]
pub struct SemanticConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub lr: f64,
    pub seed: u64,
    pub checkpoint: PathBuf,
    pub hidden_dim: usize,
    pub dropout: f32,
    /// Scale each example's loss by its record confidence.
    pub weight_by_confidence: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 32,
            lr: 0.001,
            seed: 42,
            checkpoint: PathBuf::from("semantic_model.safetensors"),
            hidden_dim: 128,
            dropout: 0.3,
            weight_by_confidence: false,
        }
    }
}

impl SemanticConfig {
    pub fn validate(&self) -> Result<()> {
        validate_loop(self.epochs, self.batch_size, self.lr)?;
        validate_dropout(self.dropout)?;
        if self.hidden_dim < 2 {
            bail!("hidden_dim must be at least 2, got {}", self.hidden_dim);
        }
        Ok(())
    }

    pub fn model_config(&self, num_affixes: usize, num_tags: usize) -> ClassifierConfig {
        ClassifierConfig {
            num_affixes,
            num_tags,
            hidden_dim: self.hidden_dim,
            dropout: self.dropout,
        }
    }
}

fn validate_loop(epochs: usize, batch_size: usize, lr: f64) -> Result<()> {
    if epochs == 0 {
        bail!("epochs must be greater than 0");
    }
    if batch_size == 0 {
        bail!("batch_size must be greater than 0");
    }
    if !lr.is_finite() || lr <= 0.0 {
        bail!("learning rate must be a positive number, got {lr}");
    }
    Ok(())
}

fn validate_dropout(p: f32) -> Result<()> {
    if !(0.0..1.0).contains(&p) {
        bail!("dropout must be in [0, 1), got {p}");
    }
    Ok(())
}

/// Shape of a [`crate::model::CharBiLstm`]; stored in its checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub num_tags: usize,
    pub dropout: f32,
}

/// Shape of a [`crate::model::AffixClassifier`]; stored in its checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub num_affixes: usize,
    pub num_tags: usize,
    pub hidden_dim: usize,
    pub dropout: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let seg = SegmentationConfig::default();
        assert_eq!((seg.epochs, seg.batch_size, seg.lr), (10, 32, 0.001));
        assert!(seg.validate().is_ok());

        let sem = SemanticConfig::default();
        assert_eq!((sem.epochs, sem.batch_size, sem.lr), (20, 32, 0.001));
        assert!(sem.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let cfg = SegmentationConfig {
            epochs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SemanticConfig {
            lr: -1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SegmentationConfig {
            hidden_dim: 127,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SemanticConfig {
            dropout: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_model_config_uses_fixed_tag_count() {
        let cfg = SegmentationConfig::default().model_config(30);
        assert_eq!(cfg.num_tags, 7);
        assert_eq!(cfg.vocab_size, 30);
    }
}
