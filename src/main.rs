use anyhow::{Context, Result};
use burn_ndarray::NdArray;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use corpus_datasets::config::{DatasetKind, InspectConfig, TokenizerConfig};
use corpus_datasets::data::{
    resolve_data_files, CharTokenizer, DataLoader, LabeledBatchLoader, LabeledDataset,
    LazySequence, LineSequence, TextBatchLoader, TextDataset, Tokenizer,
};

type Backend = NdArray<f32>;

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect lazily loaded training corpora")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load a configured dataset and log prepared examples
    Inspect(InspectArgs),
    /// Build a character vocabulary from a text corpus
    BuildVocab(BuildVocabArgs),
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Path to configuration JSON file
    #[arg(long)]
    config: PathBuf,
    /// Number of examples to print
    #[arg(long, default_value_t = 3)]
    samples: usize,
}

#[derive(Debug, Args)]
struct BuildVocabArgs {
    /// Corpus file or directory
    #[arg(long)]
    input: PathBuf,
    /// Where to write the vocabulary JSON
    #[arg(long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(args) => inspect_command(args),
        Commands::BuildVocab(args) => build_vocab_command(args),
    }
}

fn load_tokenizer(config: &TokenizerConfig) -> Result<Box<dyn Tokenizer>> {
    match config {
        TokenizerConfig::Char { path } => {
            let tokenizer = CharTokenizer::load(path)
                .with_context(|| format!("Failed to load vocabulary: {:?}", path))?;
            Ok(Box::new(tokenizer))
        }
        #[cfg(feature = "hf-tokenizers")]
        TokenizerConfig::HuggingFace { path } => {
            let tokenizer = corpus_datasets::data::HfTokenizer::from_file(path)
                .with_context(|| format!("Failed to load tokenizer: {:?}", path))?;
            Ok(Box::new(tokenizer))
        }
        #[cfg(not(feature = "hf-tokenizers"))]
        TokenizerConfig::HuggingFace { path } => {
            anyhow::bail!(
                "Cannot load {:?}: built without the `hf-tokenizers` feature",
                path
            )
        }
    }
}

fn inspect_command(args: InspectArgs) -> Result<()> {
    info!("Loading configuration from: {:?}", args.config);

    let config_str = fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config file: {:?}", args.config))?;

    let config: InspectConfig = serde_json::from_str(&config_str)
        .with_context(|| "Failed to parse config JSON")?;
    config.validate().with_context(|| "Invalid configuration")?;

    info!("Configuration loaded successfully");
    info!("Dataset config: {}", config.dataset);

    let tokenizer = load_tokenizer(&config.tokenizer)?;
    info!("Tokenizer vocabulary size: {}", tokenizer.vocab_size());

    match config.dataset.kind {
        DatasetKind::Text => inspect_text(&config, tokenizer.as_ref(), args.samples),
        DatasetKind::Labeled => inspect_labeled(&config, tokenizer.as_ref(), args.samples),
    }
}

fn inspect_text(config: &InspectConfig, tokenizer: &dyn Tokenizer, samples: usize) -> Result<()> {
    let dataset = TextDataset::<Backend, _>::new(
        tokenizer,
        &config.dataset.path,
        config.dataset.block_size,
        Default::default(),
    )
    .with_context(|| format!("Failed to load text dataset: {:?}", config.dataset.path))?;

    for i in 0..samples.min(dataset.len()) {
        let encoding = dataset.encoding(i)?;
        info!(
            "Example {}: {} tokens {:?} -> {:?}",
            i,
            encoding.input_ids().len(),
            encoding.input_ids(),
            tokenizer.decode(encoding.input_ids())
        );
    }

    let mut loader = TextBatchLoader::new(&dataset, &config.loader);
    info!("Batches per epoch: {:?}", loader.num_batches());
    if let Some(batch) = loader.next_batch()? {
        info!("First batch tokens: {:?}", batch.tokens.dims());
    }

    Ok(())
}

fn inspect_labeled(config: &InspectConfig, tokenizer: &dyn Tokenizer, samples: usize) -> Result<()> {
    let dataset = LabeledDataset::<Backend, _>::with_delimiter(
        tokenizer,
        &config.dataset.path,
        config.dataset.block_size,
        config.dataset.delimiter_byte()?,
        Default::default(),
    )
    .with_context(|| format!("Failed to load labeled dataset: {:?}", config.dataset.path))?;

    info!(
        "Text column {:?}, {} labels: {:?}",
        dataset.text_column(),
        dataset.num_labels(),
        dataset.label_columns()
    );

    for i in 0..samples.min(dataset.len()) {
        let example = dataset.get(i)?;
        let labels = example
            .label
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Failed to read labels: {:?}", e))?;
        let fields: Vec<&str> = example.inputs.keys().map(String::as_str).collect();
        info!("Example {}: fields {:?}, labels {:?}", i, fields, labels);
    }

    let mut loader = LabeledBatchLoader::new(&dataset, &config.loader);
    info!("Batches per epoch: {:?}", loader.num_batches());
    if let Some(batch) = loader.next_batch()? {
        info!("First batch labels: {:?}", batch.labels.dims());
    }

    Ok(())
}

fn build_vocab_command(args: BuildVocabArgs) -> Result<()> {
    let files = resolve_data_files(&args.input)?;
    let lines = LineSequence::open(&files)
        .with_context(|| format!("Failed to index corpus: {:?}", args.input))?;

    let mut chars = BTreeSet::new();
    for i in 0..lines.len() {
        chars.extend(lines.get(i)?.chars());
        if (i + 1) % 100_000 == 0 {
            info!("Scanned {} lines, {} distinct characters", i + 1, chars.len());
        }
    }

    let tokenizer = CharTokenizer::from_vocab(chars.into_iter().collect());
    save_vocab(&tokenizer, &args.output)?;

    info!(
        "Wrote vocabulary of {} tokens from {} lines to {:?}",
        tokenizer.vocab_size(),
        lines.len(),
        args.output
    );
    Ok(())
}

fn save_vocab(tokenizer: &CharTokenizer, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    tokenizer
        .save(path)
        .with_context(|| format!("Failed to write vocabulary: {:?}", path))
}
