//! `llex-train`: train the llex models and run them on new words.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use llex_core::TagScheme;
use llex_trainer::{
    select_device, SegmentationConfig, SegmentationTrainer, Segmenter, SemanticConfig,
    SemanticTrainer, TagPredictor,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments
#[derive(Parser)]
#[command(name = "llex-train")]
#[command(about = "Train morpheme segmentation and affix tagging models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the character BiLSTM segmenter
    Segmentation {
        /// Training split (JSONL)
        #[arg(long)]
        train: PathBuf,
        /// Validation split (JSONL)
        #[arg(long)]
        val: PathBuf,
        #[arg(long, default_value_t = 10)]
        epochs: usize,
        #[arg(long, default_value_t = 32)]
        batch_size: usize,
        #[arg(long, default_value_t = 0.001)]
        lr: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Output bundle
        #[arg(long, default_value = "segmentation_model.safetensors")]
        checkpoint: PathBuf,
        /// Label spelling used by the dataset: full or abbreviated
        #[arg(long, default_value = "full")]
        tag_scheme: TagScheme,
        /// Overwrite the bundle after every epoch
        #[arg(long)]
        save_every_epoch: bool,
    },
    /// Train the affix-count semantic classifier
    Semantic {
        #[arg(long)]
        train: PathBuf,
        #[arg(long)]
        val: PathBuf,
        #[arg(long, default_value_t = 20)]
        epochs: usize,
        #[arg(long, default_value_t = 32)]
        batch_size: usize,
        #[arg(long, default_value_t = 0.001)]
        lr: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "semantic_model.safetensors")]
        checkpoint: PathBuf,
        /// Scale each example's loss by its confidence
        #[arg(long)]
        weight_by_confidence: bool,
    },
    /// Predict semantic tags for one word's affixes
    PredictTags {
        #[arg(long, default_value = "semantic_model.safetensors")]
        checkpoint: PathBuf,
        #[arg(long = "prefix")]
        prefixes: Vec<String>,
        #[arg(long = "suffix")]
        suffixes: Vec<String>,
        #[arg(long, default_value_t = 0.0)]
        complexity: f32,
    },
    /// Segment words into prefix/root/suffix morphemes
    Segment {
        #[arg(long, default_value = "segmentation_model.safetensors")]
        checkpoint: PathBuf,
        #[arg(required = true)]
        words: Vec<String>,
    },
}

fn run(cli: Cli) -> Result<()> {
    let device = select_device();

    match cli.command {
        Commands::Segmentation {
            train,
            val,
            epochs,
            batch_size,
            lr,
            seed,
            checkpoint,
            tag_scheme,
            save_every_epoch,
        } => {
            let config = SegmentationConfig {
                epochs,
                batch_size,
                lr,
                seed,
                checkpoint,
                scheme: tag_scheme,
                save_every_epoch,
                ..Default::default()
            };
            let report = SegmentationTrainer::new(config, device)?.train_on_files(train, val)?;
            info!("Model saved to {}", report.checkpoint.display());
        }
        Commands::Semantic {
            train,
            val,
            epochs,
            batch_size,
            lr,
            seed,
            checkpoint,
            weight_by_confidence,
        } => {
            let config = SemanticConfig {
                epochs,
                batch_size,
                lr,
                seed,
                checkpoint,
                weight_by_confidence,
                ..Default::default()
            };
            let report = SemanticTrainer::new(config, device)?.train_on_files(train, val)?;
            match report.saved_epoch {
                Some(epoch) => info!(
                    "Best model (epoch {epoch}) saved to {}",
                    report.checkpoint.display()
                ),
                None => info!("No checkpoint was saved"),
            }
        }
        Commands::PredictTags {
            checkpoint,
            prefixes,
            suffixes,
            complexity,
        } => {
            let predictor = TagPredictor::load(&checkpoint, &device)?;
            let prediction = predictor.predict(prefixes.as_slice(), suffixes.as_slice(), complexity)?;
            println!("{}", serde_json::to_string(&prediction)?);
        }
        Commands::Segment { checkpoint, words } => {
            let segmenter = Segmenter::load(&checkpoint, &device)?;
            for word in &words {
                println!("{}", serde_json::to_string(&segmenter.segment(word)?)?);
            }
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("llex-train: {e:#}");
        std::process::exit(1);
    }
}
