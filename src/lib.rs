// Library exports for use in the inspect binary and training pipelines

pub mod config;
pub mod data;
pub mod error;

// Re-export commonly used types
pub use config::{DatasetConfig, DatasetKind, InspectConfig, LoaderConfig, TokenizerConfig};
pub use data::{clean_label, resolve_data_files, LabeledDataset, LazySequence, TextDataset, Tokenizer};
pub use error::{DatasetError, Result};
