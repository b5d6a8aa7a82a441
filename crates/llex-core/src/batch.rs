//! # Batch Collation
//!
//! Segmentation examples have different lengths. Collation right-pads them to
//! the longest sequence in the batch: character ids with [`PAD_ID`], labels
//! with [`LabelSlot::Ignore`]. True lengths are recorded before padding so the
//! encoder can stop at each sequence's real end.
//!
//! Semantic examples are fixed-width and are simply stacked.

use candle_core::{Device, Tensor};

use crate::encode::{EncodedAffixes, EncodedWord};
use crate::error::{LlexError, Result};
use crate::tags::LabelSlot;
use crate::vocab::PAD_ID;

/// A padded segmentation batch on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedBatch {
    /// `[batch][max_len]` character ids, padded with [`PAD_ID`].
    pub char_ids: Vec<Vec<u32>>,
    /// `[batch][max_len]` supervision targets, padded with [`LabelSlot::Ignore`].
    pub labels: Vec<Vec<LabelSlot>>,
    /// True length of each example.
    pub lengths: Vec<usize>,
}

/// Pad a group of encoded words into one batch.
pub fn collate<'a, I>(examples: I) -> Result<PaddedBatch>
where
    I: IntoIterator<Item = &'a EncodedWord>,
{
    let examples: Vec<&EncodedWord> = examples.into_iter().collect();
    if examples.is_empty() {
        return Err(LlexError::EmptyBatch);
    }

    let lengths: Vec<usize> = examples.iter().map(|e| e.len()).collect();
    let max_len = lengths.iter().copied().max().unwrap_or(0);

    let mut char_ids = Vec::with_capacity(examples.len());
    let mut labels = Vec::with_capacity(examples.len());
    for example in &examples {
        let mut ids = example.char_ids.clone();
        ids.resize(max_len, PAD_ID);
        char_ids.push(ids);

        let mut slots: Vec<LabelSlot> = example.tags.iter().map(|t| LabelSlot::Tag(*t)).collect();
        slots.resize(max_len, LabelSlot::Ignore);
        labels.push(slots);
    }

    Ok(PaddedBatch {
        char_ids,
        labels,
        lengths,
    })
}

impl PaddedBatch {
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    pub fn max_len(&self) -> usize {
        self.char_ids.first().map_or(0, Vec::len)
    }

    /// Number of supervised (non-padding) positions.
    pub fn num_targets(&self) -> usize {
        self.labels
            .iter()
            .flatten()
            .filter(|slot| !slot.is_ignored())
            .count()
    }

    /// Integer label grid with `-100` at padded positions.
    pub fn label_ids(&self) -> Vec<Vec<i64>> {
        self.labels
            .iter()
            .map(|row| row.iter().map(LabelSlot::id).collect())
            .collect()
    }

    /// Move the batch onto `device`.
    pub fn to_tensors(&self, device: &Device) -> Result<SegmentationBatch> {
        let shape = (self.batch_size(), self.max_len());

        let ids: Vec<u32> = self.char_ids.iter().flatten().copied().collect();
        let targets: Vec<u32> = self
            .labels
            .iter()
            .flatten()
            .map(|slot| slot.tag().map_or(0, |t| t.index() as u32))
            .collect();
        let mask: Vec<f32> = self
            .labels
            .iter()
            .flatten()
            .map(|slot| if slot.is_ignored() { 0.0 } else { 1.0 })
            .collect();

        Ok(SegmentationBatch {
            char_ids: Tensor::from_vec(ids, shape, device)?,
            targets: Tensor::from_vec(targets, shape, device)?,
            mask: Tensor::from_vec(mask, shape, device)?,
            lengths: self.lengths.clone(),
            num_targets: self.num_targets(),
        })
    }
}

/// A segmentation batch as tensors.
///
/// `targets` holds a valid tag index everywhere; positions whose `mask` is
/// zero carry a placeholder and must be excluded from loss and accuracy.
#[derive(Debug, Clone)]
pub struct SegmentationBatch {
    /// `[batch, max_len]` u32
    pub char_ids: Tensor,
    /// `[batch, max_len]` u32
    pub targets: Tensor,
    /// `[batch, max_len]` f32, 1.0 at supervised positions
    pub mask: Tensor,
    pub lengths: Vec<usize>,
    pub num_targets: usize,
}

/// A semantic batch as tensors.
#[derive(Debug, Clone)]
pub struct SemanticBatch {
    /// `[batch, num_affixes]`
    pub affix_counts: Tensor,
    /// `[batch, num_tags]`
    pub tag_vector: Tensor,
    /// `[batch, 1]`
    pub complexity: Tensor,
    /// `[batch, 1]`
    pub confidence: Tensor,
}

/// Stack fixed-width semantic examples.
pub fn collate_semantic<'a, I>(examples: I, device: &Device) -> Result<SemanticBatch>
where
    I: IntoIterator<Item = &'a EncodedAffixes>,
{
    let examples: Vec<&EncodedAffixes> = examples.into_iter().collect();
    let Some(first) = examples.first() else {
        return Err(LlexError::EmptyBatch);
    };
    let batch = examples.len();
    let num_affixes = first.affix_counts.len();
    let num_tags = first.tag_vector.len();

    let counts: Vec<f32> = examples
        .iter()
        .flat_map(|e| e.affix_counts.iter().copied())
        .collect();
    let tags: Vec<f32> = examples
        .iter()
        .flat_map(|e| e.tag_vector.iter().copied())
        .collect();
    let complexity: Vec<f32> = examples.iter().map(|e| e.complexity).collect();
    let confidence: Vec<f32> = examples.iter().map(|e| e.confidence).collect();

    Ok(SemanticBatch {
        affix_counts: Tensor::from_vec(counts, (batch, num_affixes), device)?,
        tag_vector: Tensor::from_vec(tags, (batch, num_tags), device)?,
        complexity: Tensor::from_vec(complexity, (batch, 1), device)?,
        confidence: Tensor::from_vec(confidence, (batch, 1), device)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{BioTag, IGNORE_INDEX};

    fn word(len: usize) -> EncodedWord {
        EncodedWord {
            char_ids: (0..len).map(|i| i as u32 + 2).collect(),
            tags: (0..len)
                .map(|i| if i == 0 { BioTag::BeginRoot } else { BioTag::InsideRoot })
                .collect(),
        }
    }

    #[test]
    fn test_collate_pads_to_longest() {
        let examples = vec![word(3), word(5), word(2)];
        let batch = collate(&examples).unwrap();

        assert_eq!(batch.lengths, vec![3, 5, 2]);
        assert_eq!(batch.max_len(), 5);
        let label_ids = batch.label_ids();
        for (i, &len) in batch.lengths.iter().enumerate() {
            assert_eq!(batch.char_ids[i].len(), 5);
            for j in len..5 {
                assert_eq!(batch.char_ids[i][j], PAD_ID);
                assert_eq!(label_ids[i][j], IGNORE_INDEX);
            }
            for j in 0..len {
                assert_ne!(label_ids[i][j], IGNORE_INDEX);
            }
        }
        assert_eq!(batch.num_targets(), 10);
    }

    #[test]
    fn test_single_example_has_no_padding() {
        let examples = vec![word(6)];
        let batch = collate(&examples).unwrap();
        assert!(batch.labels[0].iter().all(|s| !s.is_ignored()));
        assert_eq!(batch.num_targets(), 6);
    }

    #[test]
    fn test_collate_empty_is_error() {
        let examples: Vec<EncodedWord> = Vec::new();
        assert!(matches!(collate(&examples), Err(LlexError::EmptyBatch)));
    }

    #[test]
    fn test_to_tensors_shapes_and_mask() {
        let examples = vec![word(1), word(3)];
        let batch = collate(&examples).unwrap().to_tensors(&Device::Cpu).unwrap();
        assert_eq!(batch.char_ids.dims(), &[2, 3]);
        let mask = batch.mask.to_vec2::<f32>().unwrap();
        assert_eq!(mask, vec![vec![1.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]]);
        let targets = batch.targets.to_vec2::<u32>().unwrap();
        assert_eq!(targets[0], vec![3, 0, 0]);
        assert_eq!(batch.num_targets, 4);
    }

    #[test]
    fn test_collate_semantic() {
        let a = EncodedAffixes {
            affix_counts: vec![1.0, 0.0, 2.0],
            tag_vector: vec![1.0, 0.0],
            complexity: 1.5,
            confidence: 1.0,
        };
        let b = EncodedAffixes {
            affix_counts: vec![0.0, 1.0, 0.0],
            tag_vector: vec![0.0, 1.0],
            complexity: 0.0,
            confidence: 0.5,
        };
        let batch = collate_semantic([&a, &b], &Device::Cpu).unwrap();
        assert_eq!(batch.affix_counts.dims(), &[2, 3]);
        assert_eq!(batch.tag_vector.dims(), &[2, 2]);
        assert_eq!(
            batch.complexity.to_vec2::<f32>().unwrap(),
            vec![vec![1.5], vec![0.0]]
        );
    }
}
