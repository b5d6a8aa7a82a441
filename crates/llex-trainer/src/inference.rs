//! Inference helpers for trained bundles.

use std::path::Path;

use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::ops::sigmoid;
use llex_core::encode::affix_counts;
use llex_core::{assemble_morphemes, BioTag, CharVocab, Morpheme, TagScheme, Vocab};
use serde::Serialize;

use crate::checkpoint;
use crate::model::{AffixClassifier, CharBiLstm};

/// Probability above which a tag is predicted.
pub const TAG_THRESHOLD: f32 = 0.5;

/// Predicted tags plus the full per-tag probability vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagPrediction {
    pub tags: Vec<String>,
    /// Indexed like the tag vocabulary.
    pub probabilities: Vec<f32>,
}

/// Every tag whose probability is strictly above `threshold`, in vocabulary order.
pub fn tags_above_threshold(tags: &Vocab, probabilities: &[f32], threshold: f32) -> Vec<String> {
    probabilities
        .iter()
        .enumerate()
        .filter(|(_, p)| **p > threshold)
        .filter_map(|(i, _)| tags.item(i).map(str::to_string))
        .collect()
}

/// Applies a trained [`AffixClassifier`] to new words.
pub struct TagPredictor {
    model: AffixClassifier,
    affixes: Vocab,
    tags: Vocab,
    device: Device,
}

impl TagPredictor {
    pub fn new(model: AffixClassifier, affixes: Vocab, tags: Vocab, device: Device) -> Self {
        Self {
            model,
            affixes,
            tags,
            device,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let ckpt = checkpoint::load_semantic(path.as_ref(), device)?;
        Ok(Self::new(ckpt.model, ckpt.affixes, ckpt.tags, device.clone()))
    }

    pub fn tags(&self) -> &Vocab {
        &self.tags
    }

    /// Affixes unknown to the training vocabulary contribute nothing.
    pub fn predict<S: AsRef<str>>(
        &self,
        prefixes: &[S],
        suffixes: &[S],
        complexity: f32,
    ) -> Result<TagPrediction> {
        let affixes = prefixes.iter().chain(suffixes.iter()).map(|a| a.as_ref());
        let counts = affix_counts(&self.affixes, affixes);
        let num_affixes = counts.len();

        let counts = Tensor::from_vec(counts, (1, num_affixes), &self.device)?;
        let complexity = Tensor::from_vec(vec![complexity], (1, 1), &self.device)?;
        let logits = self.model.forward_t(&counts, &complexity, false)?;
        let probabilities = sigmoid(&logits)?.squeeze(0)?.to_vec1::<f32>()?;

        Ok(TagPrediction {
            tags: tags_above_threshold(&self.tags, &probabilities, TAG_THRESHOLD),
            probabilities,
        })
    }
}

/// Predicted BIO labels and morphemes for one word.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segmentation {
    pub word: String,
    pub labels: Vec<String>,
    pub morphemes: Vec<Morpheme>,
}

/// Applies a trained [`CharBiLstm`] to new words.
pub struct Segmenter {
    model: CharBiLstm,
    vocab: CharVocab,
    scheme: TagScheme,
    device: Device,
}

impl Segmenter {
    pub fn new(model: CharBiLstm, vocab: CharVocab, scheme: TagScheme, device: Device) -> Self {
        Self {
            model,
            vocab,
            scheme,
            device,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let ckpt = checkpoint::load_segmentation(path.as_ref(), device)?;
        Ok(Self::new(ckpt.model, ckpt.vocab, ckpt.scheme, device.clone()))
    }

    pub fn scheme(&self) -> TagScheme {
        self.scheme
    }

    /// Per-character argmax tags.
    pub fn tag(&self, word: &str) -> Result<Vec<BioTag>> {
        let ids = self.vocab.encode(word);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let len = ids.len();
        let char_ids = Tensor::from_vec(ids, (1, len), &self.device)?;
        let logits = self.model.forward_t(&char_ids, &[len], false)?;
        logits
            .argmax(D::Minus1)?
            .squeeze(0)?
            .to_vec1::<u32>()?
            .into_iter()
            .map(|i| BioTag::from_index(i as usize).ok_or_else(|| anyhow!("tag index {i} out of range")))
            .collect()
    }

    pub fn segment(&self, word: &str) -> Result<Segmentation> {
        let tags = self.tag(word)?;
        Ok(Segmentation {
            word: word.to_string(),
            labels: tags.iter().map(|t| self.scheme.label(*t).to_string()).collect(),
            morphemes: assemble_morphemes(word, &tags),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_picks_confident_tags() {
        let tags = Vocab::from(vec!["CAUSATIVE".to_string(), "BENEFACTIVE".to_string()]);
        assert_eq!(
            tags_above_threshold(&tags, &[0.9, 0.1], TAG_THRESHOLD),
            vec!["CAUSATIVE".to_string()]
        );
        assert!(tags_above_threshold(&tags, &[0.5, 0.5], TAG_THRESHOLD).is_empty());
        assert_eq!(tags_above_threshold(&tags, &[0.7, 0.6], TAG_THRESHOLD).len(), 2);
    }
}
