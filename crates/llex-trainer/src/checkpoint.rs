//! Checkpoint bundles: model parameters and their vocabularies in one
//! `.safetensors` file.
//!
//! Vocabularies, tag scheme and model shape live in the safetensors header
//! metadata as JSON strings, so a bundle is always loaded as a single unit.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use llex_core::{CharVocab, TagScheme, Vocab};
use safetensors::SafeTensors;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::{ClassifierConfig, SegmenterConfig};
use crate::model::{AffixClassifier, CharBiLstm};

const FORMAT: &str = "llex";

const KEY_FORMAT: &str = "format";
const KEY_TASK: &str = "task";
const KEY_EPOCH: &str = "epoch";
const KEY_MODEL_CONFIG: &str = "model_config";
const KEY_CHAR_VOCAB: &str = "char_vocab";
const KEY_TAG_SCHEME: &str = "tag_scheme";
const KEY_AFFIX_VOCAB: &str = "affix_vocab";
const KEY_TAG_VOCAB: &str = "tag_vocab";

/// Which model a bundle holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Segmentation,
    Semantic,
}

impl Task {
    fn as_str(&self) -> &'static str {
        match self {
            Task::Segmentation => "segmentation",
            Task::Semantic => "semantic",
        }
    }
}

/// Header metadata under construction.
struct Metadata(HashMap<String, String>);

impl Metadata {
    fn new(task: Task, epoch: usize) -> Self {
        let mut map = HashMap::new();
        map.insert(KEY_FORMAT.to_string(), FORMAT.to_string());
        map.insert(KEY_TASK.to_string(), task.as_str().to_string());
        map.insert(KEY_EPOCH.to_string(), epoch.to_string());
        Self(map)
    }

    fn json<T: Serialize>(mut self, key: &str, value: &T) -> Result<Self> {
        self.0.insert(key.to_string(), serde_json::to_string(value)?);
        Ok(self)
    }
}

/// A loaded bundle: verified header plus tensors.
struct Bundle {
    metadata: HashMap<String, String>,
    tensors: HashMap<String, Tensor>,
}

impl Bundle {
    fn read(path: &Path, task: Task, device: &Device) -> Result<Self> {
        let buffer =
            std::fs::read(path).with_context(|| format!("reading checkpoint {}", path.display()))?;
        let (_, header) = SafeTensors::read_metadata(&buffer)
            .map_err(|e| anyhow!("invalid checkpoint {}: {e:?}", path.display()))?;
        let metadata = header.metadata().clone().unwrap_or_default();

        match metadata.get(KEY_FORMAT).map(String::as_str) {
            Some(FORMAT) => {}
            _ => bail!("{} is not an llex checkpoint", path.display()),
        }
        let found = metadata.get(KEY_TASK).map(String::as_str).unwrap_or("");
        if found != task.as_str() {
            bail!(
                "{} holds a {found:?} model, expected {}",
                path.display(),
                task.as_str()
            );
        }

        let tensors = candle_core::safetensors::load_buffer(&buffer, device)?;
        Ok(Self { metadata, tensors })
    }

    fn json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw = self
            .metadata
            .get(key)
            .ok_or_else(|| anyhow!("checkpoint metadata is missing {key:?}"))?;
        serde_json::from_str(raw).with_context(|| format!("decoding checkpoint {key:?}"))
    }

    fn epoch(&self) -> usize {
        self.metadata
            .get(KEY_EPOCH)
            .and_then(|e| e.parse().ok())
            .unwrap_or(0)
    }

    fn var_builder(self, device: &Device) -> VarBuilder<'static> {
        VarBuilder::from_tensors(self.tensors, DType::F32, device)
    }
}

fn write(varmap: &VarMap, metadata: Metadata, path: &Path) -> Result<()> {
    let tensors: Vec<(String, Tensor)> = {
        let data = varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("parameter store lock poisoned"))?;
        data.iter()
            .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
            .collect()
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    safetensors::tensor::serialize_to_file(tensors, &Some(metadata.0), path)
        .map_err(|e| anyhow!("writing checkpoint {}: {e:?}", path.display()))?;
    Ok(())
}

/// Persist a segmentation model with its character vocabulary and tag scheme.
pub fn save_segmentation(
    path: &Path,
    varmap: &VarMap,
    config: &SegmenterConfig,
    vocab: &CharVocab,
    scheme: TagScheme,
    epoch: usize,
) -> Result<()> {
    let metadata = Metadata::new(Task::Segmentation, epoch)
        .json(KEY_MODEL_CONFIG, config)?
        .json(KEY_CHAR_VOCAB, vocab)?
        .json(KEY_TAG_SCHEME, &scheme)?;
    write(varmap, metadata, path)?;
    info!(path = %path.display(), epoch, "saved segmentation checkpoint");
    Ok(())
}

/// Persist a semantic classifier with its affix and tag vocabularies.
pub fn save_semantic(
    path: &Path,
    varmap: &VarMap,
    config: &ClassifierConfig,
    affixes: &Vocab,
    tags: &Vocab,
    epoch: usize,
) -> Result<()> {
    let metadata = Metadata::new(Task::Semantic, epoch)
        .json(KEY_MODEL_CONFIG, config)?
        .json(KEY_AFFIX_VOCAB, affixes)?
        .json(KEY_TAG_VOCAB, tags)?;
    write(varmap, metadata, path)?;
    info!(path = %path.display(), epoch, "saved semantic checkpoint");
    Ok(())
}

/// A segmentation model restored together with its vocabulary.
pub struct SegmentationCheckpoint {
    pub model: CharBiLstm,
    pub vocab: CharVocab,
    pub scheme: TagScheme,
    pub epoch: usize,
}

pub fn load_segmentation(path: &Path, device: &Device) -> Result<SegmentationCheckpoint> {
    let bundle = Bundle::read(path, Task::Segmentation, device)?;
    let config: SegmenterConfig = bundle.json(KEY_MODEL_CONFIG)?;
    let vocab: CharVocab = bundle.json(KEY_CHAR_VOCAB)?;
    let scheme: TagScheme = bundle.json(KEY_TAG_SCHEME)?;
    let epoch = bundle.epoch();

    if config.vocab_size != vocab.vocab_size() {
        bail!(
            "checkpoint vocabulary has {} ids but the model expects {}",
            vocab.vocab_size(),
            config.vocab_size
        );
    }

    let model = CharBiLstm::new(config, bundle.var_builder(device))?;
    Ok(SegmentationCheckpoint {
        model,
        vocab,
        scheme,
        epoch,
    })
}

/// A semantic classifier restored together with its vocabularies.
pub struct SemanticCheckpoint {
    pub model: AffixClassifier,
    pub affixes: Vocab,
    pub tags: Vocab,
    pub epoch: usize,
}

pub fn load_semantic(path: &Path, device: &Device) -> Result<SemanticCheckpoint> {
    let bundle = Bundle::read(path, Task::Semantic, device)?;
    let config: ClassifierConfig = bundle.json(KEY_MODEL_CONFIG)?;
    let affixes: Vocab = bundle.json(KEY_AFFIX_VOCAB)?;
    let tags: Vocab = bundle.json(KEY_TAG_VOCAB)?;
    let epoch = bundle.epoch();

    if config.num_affixes != affixes.len() || config.num_tags != tags.len() {
        bail!("checkpoint vocabularies do not match the model shape");
    }

    let model = AffixClassifier::new(config, bundle.var_builder(device))?;
    Ok(SemanticCheckpoint {
        model,
        affixes,
        tags,
        epoch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("llex-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_semantic_roundtrip_preserves_vocab_and_weights() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = ClassifierConfig {
            num_affixes: 2,
            num_tags: 2,
            hidden_dim: 4,
            dropout: 0.0,
        };
        let model = AffixClassifier::new(config, vb).unwrap();
        let affixes = Vocab::build(["re-", "-ness"]);
        let tags = Vocab::from(vec!["CAUSATIVE".to_string(), "BENEFACTIVE".to_string()]);

        let path = temp_path("semantic.safetensors");
        save_semantic(&path, &varmap, &config, &affixes, &tags, 3).unwrap();
        let loaded = load_semantic(&path, &device).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.affixes, affixes);
        assert_eq!(loaded.tags.get("BENEFACTIVE"), Some(1));
        assert_eq!(loaded.epoch, 3);

        let counts = Tensor::new(&[[1.0f32, 0.0]], &device).unwrap();
        let complexity = Tensor::new(&[[2.0f32]], &device).unwrap();
        let a = model.forward_t(&counts, &complexity, false).unwrap();
        let b = loaded.model.forward_t(&counts, &complexity, false).unwrap();
        assert_eq!(a.to_vec2::<f32>().unwrap(), b.to_vec2::<f32>().unwrap());
    }

    #[test]
    fn test_wrong_task_is_rejected() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = ClassifierConfig {
            num_affixes: 1,
            num_tags: 1,
            hidden_dim: 2,
            dropout: 0.0,
        };
        AffixClassifier::new(config, vb).unwrap();

        let path = temp_path("wrong-task.safetensors");
        save_semantic(&path, &varmap, &config, &Vocab::build(["a"]), &Vocab::build(["T"]), 1)
            .unwrap();
        let err = load_segmentation(&path, &device).err().unwrap();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("expected segmentation"));
    }
}
