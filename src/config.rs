use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{DatasetError, Result};

/// Which adapter reads the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// One example per line of plain text.
    #[default]
    Text,
    /// Delimited table: text column followed by numeric labels.
    Labeled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub kind: DatasetKind,
    pub path: PathBuf,
    pub block_size: usize,
    pub delimiter: char,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            kind: DatasetKind::Text,
            path: PathBuf::new(),
            block_size: 512,
            delimiter: ',',
        }
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(config_error("block_size must be > 0"));
        }
        if self.path.as_os_str().is_empty() {
            return Err(config_error("dataset path must be set"));
        }
        self.delimiter_byte().map(|_| ())
    }

    /// The delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| config_error("delimiter must be a single ASCII character"))
    }
}

impl fmt::Display for DatasetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenizerConfig {
    /// Character vocabulary saved by `CharTokenizer::save`.
    Char { path: PathBuf },
    /// Hugging Face `tokenizer.json`; requires the `hf-tokenizers` feature.
    HuggingFace { path: PathBuf },
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        TokenizerConfig::Char {
            path: PathBuf::from("vocab.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: usize,
    /// Shuffle with this seed; index order when unset.
    pub shuffle_seed: Option<u64>,
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            shuffle_seed: None,
            drop_last: false,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(config_error("batch_size must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    pub dataset: DatasetConfig,
    pub tokenizer: TokenizerConfig,
    pub loader: LoaderConfig,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate()?;
        self.loader.validate()
    }
}

impl fmt::Display for InspectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn config_error(message: &str) -> DatasetError {
    DatasetError::format("<config>", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: InspectConfig = serde_json::from_str(
            r#"{ "dataset": { "kind": "labeled", "path": "train.csv" } }"#,
        )
        .unwrap();

        assert_eq!(config.dataset.kind, DatasetKind::Labeled);
        assert_eq!(config.dataset.block_size, 512);
        assert_eq!(config.dataset.delimiter_byte().unwrap(), b',');
        assert_eq!(config.loader, LoaderConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tokenizer_config_tagged() {
        let config: TokenizerConfig =
            serde_json::from_str(r#"{ "kind": "hugging_face", "path": "tokenizer.json" }"#).unwrap();
        assert_eq!(
            config,
            TokenizerConfig::HuggingFace {
                path: PathBuf::from("tokenizer.json")
            }
        );
    }

    #[test]
    fn test_validation() {
        let mut config = InspectConfig::default();
        assert!(config.validate().is_err());

        config.dataset.path = PathBuf::from("corpus.txt");
        assert!(config.validate().is_ok());

        config.dataset.block_size = 0;
        assert!(config.validate().is_err());

        config.dataset.block_size = 8;
        config.dataset.delimiter = 'é';
        assert!(config.validate().is_err());

        config.dataset.delimiter = '\t';
        config.loader.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
