//! Character BiLSTM tagger and affix-count classifier.

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::rnn::LSTMState;
use candle_nn::{
    embedding, linear, lstm, Dropout, Embedding, LSTMConfig, Linear, Module, ModuleT, VarBuilder,
    LSTM, RNN,
};
use llex_core::PAD_ID;

use crate::config::{ClassifierConfig, SegmenterConfig};

/// `[batch, max_len]` f32 mask, 1.0 where `t < lengths[b]`.
pub fn sequence_mask(lengths: &[usize], max_len: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = lengths
        .iter()
        .flat_map(|&len| (0..max_len).map(move |t| if t < len { 1.0 } else { 0.0 }))
        .collect();
    Tensor::from_vec(mask, (lengths.len(), max_len), device)
}

/// One direction of one BiLSTM layer.
struct DirectionalLstm {
    cell: LSTM,
    reverse: bool,
}

impl DirectionalLstm {
    /// Run over `xs` (`[batch, seq, in]`) without letting padded steps touch the state.
    ///
    /// A step at `t >= len` keeps the previous state and emits zeros, so the
    /// reverse direction effectively starts at each sequence's last real character.
    fn forward(&self, xs: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        let mut state = self.cell.zero_state(batch)?;
        let mut outputs = Vec::with_capacity(seq_len);

        let steps: Box<dyn Iterator<Item = usize>> = if self.reverse {
            Box::new((0..seq_len).rev())
        } else {
            Box::new(0..seq_len)
        };

        for t in steps {
            let x_t = xs.narrow(1, t, 1)?.squeeze(1)?;
            let keep_new = mask.narrow(1, t, 1)?;
            let keep_old = keep_new.affine(-1.0, 1.0)?;

            let next = self.cell.step(&x_t, &state)?;
            let h = (next.h.broadcast_mul(&keep_new)? + state.h.broadcast_mul(&keep_old)?)?;
            let c = (next.c.broadcast_mul(&keep_new)? + state.c.broadcast_mul(&keep_old)?)?;

            outputs.push(h.broadcast_mul(&keep_new)?);
            state = LSTMState { h, c };
        }

        if self.reverse {
            outputs.reverse();
        }
        Tensor::stack(&outputs, 1)
    }
}

/// Character-level BiLSTM for BIO tagging.
///
/// Embedding (padding pinned to zero) → stacked bidirectional LSTM over the
/// true lengths → dropout → per-position linear projection to tag logits.
pub struct CharBiLstm {
    embedding: Embedding,
    layers: Vec<(DirectionalLstm, DirectionalLstm)>,
    dropout: Dropout,
    classifier: Linear,
    config: SegmenterConfig,
}

impl CharBiLstm {
    pub fn new(config: SegmenterConfig, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(config.vocab_size, config.embedding_dim, vb.pp("embedding"))?;

        let half = config.hidden_dim / 2;
        let mut layers = Vec::with_capacity(config.num_layers);
        for layer in 0..config.num_layers {
            let in_dim = if layer == 0 {
                config.embedding_dim
            } else {
                config.hidden_dim
            };
            let vb_layer = vb.pp(format!("lstm.l{layer}"));
            let fw = lstm(in_dim, half, LSTMConfig::default(), vb_layer.pp("fw"))?;
            let bw = lstm(in_dim, half, LSTMConfig::default(), vb_layer.pp("bw"))?;
            layers.push((
                DirectionalLstm {
                    cell: fw,
                    reverse: false,
                },
                DirectionalLstm {
                    cell: bw,
                    reverse: true,
                },
            ));
        }

        let classifier = linear(config.hidden_dim, config.num_tags, vb.pp("classifier"))?;

        Ok(Self {
            embedding,
            layers,
            dropout: Dropout::new(config.dropout),
            classifier,
            config,
        })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// `char_ids`: `[batch, max_len]` u32. Returns `[batch, max_len, num_tags]` logits.
    pub fn forward_t(&self, char_ids: &Tensor, lengths: &[usize], train: bool) -> Result<Tensor> {
        let (_, max_len) = char_ids.dims2()?;
        let mask = sequence_mask(lengths, max_len, char_ids.device())?;

        // Padding rows are multiplied out, so they stay zero and get no gradient.
        let not_pad = char_ids.ne(PAD_ID)?.to_dtype(DType::F32)?.unsqueeze(2)?;
        let mut xs = self.embedding.forward(char_ids)?.broadcast_mul(&not_pad)?;

        for (i, (fw, bw)) in self.layers.iter().enumerate() {
            if i > 0 {
                xs = self.dropout.forward_t(&xs, train)?;
            }
            let out_fw = fw.forward(&xs, &mask)?;
            let out_bw = bw.forward(&xs, &mask)?;
            xs = Tensor::cat(&[out_fw, out_bw], 2)?;
        }

        let xs = self.dropout.forward_t(&xs, train)?;
        self.classifier.forward(&xs)
    }
}

/// Feed-forward multi-label classifier over affix counts plus complexity.
pub struct AffixClassifier {
    hidden: Linear,
    bottleneck: Linear,
    output: Linear,
    dropout: Dropout,
    config: ClassifierConfig,
}

impl AffixClassifier {
    pub fn new(config: ClassifierConfig, vb: VarBuilder) -> Result<Self> {
        // +1 for the complexity feature
        let input_dim = config.num_affixes + 1;
        let half = config.hidden_dim / 2;
        Ok(Self {
            hidden: linear(input_dim, config.hidden_dim, vb.pp("mlp.0"))?,
            bottleneck: linear(config.hidden_dim, half, vb.pp("mlp.1"))?,
            output: linear(half, config.num_tags, vb.pp("mlp.2"))?,
            dropout: Dropout::new(config.dropout),
            config,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// `affix_counts`: `[batch, num_affixes]`, `complexity`: `[batch, 1]`.
    /// Returns `[batch, num_tags]` logits, one independent score per tag.
    pub fn forward_t(&self, affix_counts: &Tensor, complexity: &Tensor, train: bool) -> Result<Tensor> {
        let features = Tensor::cat(&[affix_counts, complexity], 1)?;
        let xs = self.hidden.forward(&features)?.relu()?;
        let xs = self.dropout.forward_t(&xs, train)?;
        let xs = self.bottleneck.forward(&xs)?.relu()?;
        let xs = self.dropout.forward_t(&xs, train)?;
        self.output.forward(&xs)
    }
}
