//! Masked loss, masked accuracy and epoch bookkeeping.

use std::fmt;
use std::io::{self, Write};

use candle_core::{DType, Result, Tensor, D};

/// Cross-entropy over `[batch, len, tags]` logits, averaged over positions
/// where `mask` is 1.0. Masked positions contribute neither loss nor gradient.
///
/// Returns a zero scalar when nothing is supervised.
pub fn masked_cross_entropy(logits: &Tensor, targets: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let (batch, len, num_tags) = logits.dims3()?;
    let n = batch * len;
    let mask = mask.reshape(n)?;
    let count = mask.sum_all()?.to_scalar::<f32>()?;
    if count == 0.0 {
        return Tensor::zeros((), logits.dtype(), logits.device());
    }

    let log_probs = candle_nn::ops::log_softmax(&logits.reshape((n, num_tags))?, D::Minus1)?;
    let picked = log_probs
        .gather(&targets.reshape((n, 1))?.contiguous()?, 1)?
        .squeeze(1)?;
    let nll = (picked.neg()? * &mask)?.sum_all()?;
    nll.affine(1.0 / count as f64, 0.0)
}

/// Element-wise binary cross-entropy on logits, in the overflow-safe form
/// `max(x, 0) - x*y + ln(1 + e^-|x|)`.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    let xy = (logits * targets)?;
    (logits.relu()? - xy)? + softplus
}

/// Mean multi-label loss. With `weights` (`[batch, 1]`), each example's
/// per-tag mean is scaled before averaging over the batch.
pub fn multi_label_loss(logits: &Tensor, targets: &Tensor, weights: Option<&Tensor>) -> Result<Tensor> {
    let per_elem = bce_with_logits(logits, targets)?;
    match weights {
        None => per_elem.mean_all(),
        Some(w) => per_elem
            .mean_keepdim(1)?
            .broadcast_mul(w)?
            .mean_all(),
    }
}

/// Running token accuracy over supervised positions only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenAccuracy {
    pub correct: usize,
    pub total: usize,
}

impl TokenAccuracy {
    /// Count positions where `argmax(logits) == target` and `mask` is set.
    pub fn update(&mut self, logits: &Tensor, targets: &Tensor, mask: &Tensor) -> Result<()> {
        let preds = logits.argmax(D::Minus1)?;
        let hits = preds.eq(targets)?.to_dtype(DType::F32)?;
        let correct = (hits * mask)?.sum_all()?.to_scalar::<f32>()?;
        let total = mask.sum_all()?.to_scalar::<f32>()?;
        self.correct += correct.round() as usize;
        self.total += total.round() as usize;
        Ok(())
    }

    /// `correct / total`, or 0 when no position was supervised.
    pub fn value(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Mean of per-batch losses.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanLoss {
    sum: f64,
    batches: usize,
}

impl MeanLoss {
    pub fn add(&mut self, loss: &Tensor) -> Result<()> {
        self.sum += loss.to_scalar::<f32>()? as f64;
        self.batches += 1;
        Ok(())
    }

    /// 0 when no batch was seen.
    pub fn value(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.sum / self.batches as f64
        }
    }
}

/// Tracks the lowest validation loss seen so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestLoss {
    best: Option<f64>,
}

impl BestLoss {
    /// True when `loss` is strictly lower than every earlier value.
    pub fn improved(&mut self, loss: f64) -> bool {
        let better = match self.best {
            None => !loss.is_nan(),
            Some(best) => loss < best,
        };
        if better {
            self.best = Some(loss);
        }
        better
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

/// Summary of one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// 1-based.
    pub epoch: usize,
    pub epochs: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    /// Token accuracy; segmentation only.
    pub val_accuracy: Option<f64>,
}

impl EpochMetrics {
    /// Write the report line to `out`, independent of the log filter.
    pub fn report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{self}")
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {}/{} | Train Loss: {:.4} | Val Loss: {:.4}",
            self.epoch, self.epochs, self.train_loss, self.val_loss
        )?;
        if let Some(acc) = self.val_accuracy {
            write!(f, " | Val Acc: {acc:.4}")?;
        }
        Ok(())
    }
}
