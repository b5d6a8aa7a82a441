//! Training loops for the segmentation tagger and the semantic classifier.
//!
//! Both follow the same protocol per epoch: a shuffled training pass with an
//! optimizer step per batch, then a validation pass in file order without
//! dropout or parameter updates, then a checkpoint decision.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use llex_core::{
    collate, collate_semantic, AffixEncoder, CharVocab, EncodedAffixes, EncodedWord, RecordStore,
    SegmentationEncoder, SegmentationRecord, SemanticRecord, Vocab,
};
use oorandom::Rand64;
use tracing::{info, warn};

use crate::checkpoint;
use crate::config::{SegmentationConfig, SemanticConfig};
use crate::metrics::{
    masked_cross_entropy, multi_label_loss, BestLoss, EpochMetrics, MeanLoss, TokenAccuracy,
};
use crate::model::{AffixClassifier, CharBiLstm};

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochMetrics>,
    /// Epoch whose parameters are in the checkpoint (1-based).
    pub saved_epoch: Option<usize>,
    pub checkpoint: PathBuf,
}

/// Pick CUDA when available, otherwise CPU.
pub fn select_device() -> Device {
    match Device::cuda_if_available(0) {
        Ok(device) => device,
        Err(e) => {
            warn!("falling back to CPU: {e}");
            Device::Cpu
        }
    }
}

/// Fisher-Yates shuffle of `0..n`.
fn shuffled_indices(n: usize, rng: &mut Rand64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        indices.swap(i, j);
    }
    indices
}

fn adam(varmap: &VarMap, lr: f64) -> Result<AdamW> {
    // AdamW without decay is plain Adam
    let params = ParamsAdamW {
        lr,
        weight_decay: 0.0,
        ..Default::default()
    };
    Ok(AdamW::new(varmap.all_vars(), params)?)
}

/// Trains the character BiLSTM tagger.
pub struct SegmentationTrainer {
    config: SegmentationConfig,
    device: Device,
}

impl SegmentationTrainer {
    pub fn new(config: SegmentationConfig, device: Device) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, device })
    }

    pub fn train_on_files<P: AsRef<Path>>(&self, train_path: P, val_path: P) -> Result<TrainingReport> {
        let train = RecordStore::<SegmentationRecord>::load(train_path.as_ref())
            .with_context(|| format!("loading {}", train_path.as_ref().display()))?;
        let val = RecordStore::<SegmentationRecord>::load(val_path.as_ref())
            .with_context(|| format!("loading {}", val_path.as_ref().display()))?;
        self.train(&train, &val)
    }

    pub fn train(
        &self,
        train: &RecordStore<SegmentationRecord>,
        val: &RecordStore<SegmentationRecord>,
    ) -> Result<TrainingReport> {
        let cfg = &self.config;
        if train.is_empty() {
            bail!("training split is empty");
        }

        let vocab = CharVocab::build(train.iter().map(|r| r.word.as_str()));
        info!("Character vocabulary size: {}", vocab.vocab_size());
        info!("Tag scheme: {} ({} tags)", cfg.scheme, llex_core::BioTag::NUM_TAGS);

        let encoder = SegmentationEncoder::new(&vocab, cfg.scheme);
        let train_set = train
            .iter()
            .map(|r| encoder.encode(r))
            .collect::<llex_core::Result<Vec<_>>>()
            .context("encoding training split")?;
        let val_set = val
            .iter()
            .map(|r| encoder.encode(r))
            .collect::<llex_core::Result<Vec<_>>>()
            .context("encoding validation split")?;
        if val_set.is_empty() {
            warn!("validation split is empty; validation loss and accuracy will be 0");
        }

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let model_config = cfg.model_config(vocab.vocab_size());
        let model = CharBiLstm::new(model_config, vb)?;
        let mut optimizer = adam(&varmap, cfg.lr)?;

        info!("Training on {:?}", self.device);
        info!("Training examples: {}", train_set.len());
        info!("Validation examples: {}", val_set.len());

        let mut rng = Rand64::new(cfg.seed as u128);
        let mut history = Vec::with_capacity(cfg.epochs);
        let mut saved_epoch = None;

        for epoch in 1..=cfg.epochs {
            let mut train_loss = MeanLoss::default();
            let order = shuffled_indices(train_set.len(), &mut rng);
            for chunk in order.chunks(cfg.batch_size) {
                let batch = collate(chunk.iter().map(|&i| &train_set[i]))?.to_tensors(&self.device)?;
                let logits = model.forward_t(&batch.char_ids, &batch.lengths, true)?;
                let loss = masked_cross_entropy(&logits, &batch.targets, &batch.mask)?;
                optimizer.backward_step(&loss)?;
                train_loss.add(&loss)?;
            }

            let (val_loss, accuracy) = self.evaluate(&model, &val_set)?;
            let metrics = EpochMetrics {
                epoch,
                epochs: cfg.epochs,
                train_loss: train_loss.value(),
                val_loss,
                val_accuracy: Some(accuracy),
            };
            metrics.report(&mut std::io::stdout().lock())?;
            history.push(metrics);

            if cfg.save_every_epoch || epoch == cfg.epochs {
                checkpoint::save_segmentation(
                    &cfg.checkpoint,
                    &varmap,
                    &model_config,
                    &vocab,
                    cfg.scheme,
                    epoch,
                )?;
                saved_epoch = Some(epoch);
            }
        }

        info!("Training complete");
        Ok(TrainingReport {
            epochs: history,
            saved_epoch,
            checkpoint: cfg.checkpoint.clone(),
        })
    }

    /// Mean validation loss and masked token accuracy, batches in file order.
    fn evaluate(&self, model: &CharBiLstm, examples: &[EncodedWord]) -> Result<(f64, f64)> {
        let mut loss = MeanLoss::default();
        let mut accuracy = TokenAccuracy::default();
        for chunk in examples.chunks(self.config.batch_size) {
            let batch = collate(chunk)?.to_tensors(&self.device)?;
            let logits = model.forward_t(&batch.char_ids, &batch.lengths, false)?;
            loss.add(&masked_cross_entropy(&logits, &batch.targets, &batch.mask)?)?;
            accuracy.update(&logits, &batch.targets, &batch.mask)?;
        }
        Ok((loss.value(), accuracy.value()))
    }
}

/// Trains the affix-count multi-label classifier.
pub struct SemanticTrainer {
    config: SemanticConfig,
    device: Device,
}

impl SemanticTrainer {
    pub fn new(config: SemanticConfig, device: Device) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, device })
    }

    pub fn train_on_files<P: AsRef<Path>>(&self, train_path: P, val_path: P) -> Result<TrainingReport> {
        let train = RecordStore::<SemanticRecord>::load(train_path.as_ref())
            .with_context(|| format!("loading {}", train_path.as_ref().display()))?;
        let val = RecordStore::<SemanticRecord>::load(val_path.as_ref())
            .with_context(|| format!("loading {}", val_path.as_ref().display()))?;
        self.train(&train, &val)
    }

    pub fn train(
        &self,
        train: &RecordStore<SemanticRecord>,
        val: &RecordStore<SemanticRecord>,
    ) -> Result<TrainingReport> {
        let cfg = &self.config;
        if train.is_empty() {
            bail!("training split is empty");
        }

        let affixes = Vocab::build(train.iter().flat_map(|r| r.affixes()));
        let tags = Vocab::build(train.iter().flat_map(|r| r.tags.iter()));
        if tags.is_empty() {
            bail!("training split has no tags to learn");
        }
        info!("Number of unique affixes: {}", affixes.len());
        info!("Number of unique tags: {}", tags.len());

        let encoder = AffixEncoder::new(&affixes, &tags);
        let train_set: Vec<EncodedAffixes> = train.iter().map(|r| encoder.encode(r)).collect();
        let val_set: Vec<EncodedAffixes> = val.iter().map(|r| encoder.encode(r)).collect();
        if val_set.is_empty() {
            warn!("validation split is empty; validation loss will be 0");
        }

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let model_config = cfg.model_config(affixes.len(), tags.len());
        let model = AffixClassifier::new(model_config, vb)?;
        let mut optimizer = adam(&varmap, cfg.lr)?;

        info!("Training on {:?}", self.device);
        info!("Training examples: {}", train_set.len());
        info!("Validation examples: {}", val_set.len());

        let mut rng = Rand64::new(cfg.seed as u128);
        let mut history = Vec::with_capacity(cfg.epochs);
        let mut best = BestLoss::default();
        let mut saved_epoch = None;

        for epoch in 1..=cfg.epochs {
            let mut train_loss = MeanLoss::default();
            let order = shuffled_indices(train_set.len(), &mut rng);
            for chunk in order.chunks(cfg.batch_size) {
                let batch = collate_semantic(chunk.iter().map(|&i| &train_set[i]), &self.device)?;
                let logits = model.forward_t(&batch.affix_counts, &batch.complexity, true)?;
                let weights = cfg.weight_by_confidence.then_some(&batch.confidence);
                let loss = multi_label_loss(&logits, &batch.tag_vector, weights)?;
                optimizer.backward_step(&loss)?;
                train_loss.add(&loss)?;
            }

            let val_loss = self.evaluate(&model, &val_set)?;
            let metrics = EpochMetrics {
                epoch,
                epochs: cfg.epochs,
                train_loss: train_loss.value(),
                val_loss,
                val_accuracy: None,
            };
            metrics.report(&mut std::io::stdout().lock())?;
            history.push(metrics);

            if best.improved(val_loss) {
                checkpoint::save_semantic(
                    &cfg.checkpoint,
                    &varmap,
                    &model_config,
                    &affixes,
                    &tags,
                    epoch,
                )?;
                saved_epoch = Some(epoch);
                info!("Saved best model (val loss {val_loss:.4})");
            }
        }

        info!("Training complete");
        Ok(TrainingReport {
            epochs: history,
            saved_epoch,
            checkpoint: cfg.checkpoint.clone(),
        })
    }

    /// Mean validation loss; the unweighted loss is always used here.
    fn evaluate(&self, model: &AffixClassifier, examples: &[EncodedAffixes]) -> Result<f64> {
        let mut loss = MeanLoss::default();
        for chunk in examples.chunks(self.config.batch_size) {
            let batch = collate_semantic(chunk, &self.device)?;
            let logits = model.forward_t(&batch.affix_counts, &batch.complexity, false)?;
            loss.add(&multi_label_loss(&logits, &batch.tag_vector, None)?)?;
        }
        Ok(loss.value())
    }
}
