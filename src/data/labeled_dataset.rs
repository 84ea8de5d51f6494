use burn::tensor::{backend::Backend, Int, Tensor};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::files::{resolve_data_files, DataFiles};
use super::sequence::LazySequence;
use super::table::{CsvSequence, TableRow, TabularSequence};
use super::tokenizer::{EncodeOptions, Tokenizer, INPUT_IDS};
use crate::error::{DatasetError, Result};

/// Tokenizer fields plus the regression targets for one row.
#[derive(Debug, Clone)]
pub struct LabeledExample<B: Backend> {
    /// Every tokenizer output field, each exactly `block_size` long.
    pub inputs: BTreeMap<String, Tensor<B, 1, Int>>,
    /// One value per label column, cleaned with [`clean_label`].
    pub label: Tensor<B, 1>,
}

impl<B: Backend> LabeledExample<B> {
    pub fn field(&self, name: &str) -> Option<&Tensor<B, 1, Int>> {
        self.inputs.get(name)
    }

    pub fn input_ids(&self) -> Option<&Tensor<B, 1, Int>> {
        self.field(INPUT_IDS)
    }
}

/// Replace missing, NaN and infinite label values with zero.
pub fn clean_label(value: Option<f64>) -> f64 {
    match value {
        Some(x) if x.is_finite() => x,
        _ => 0.0,
    }
}

/// Tabular dataset of one text column followed by numeric label columns.
///
/// Text is padded and truncated to exactly `block_size` tokens.
pub struct LabeledDataset<'a, B: Backend, T: Tokenizer + ?Sized, S: TabularSequence = CsvSequence> {
    tokenizer: &'a T,
    files: Option<DataFiles>,
    block_size: usize,
    rows: S,
    len: usize,
    text_column: String,
    label_columns: Vec<String>,
    num_labels: usize,
    device: B::Device,
}

impl<'a, B: Backend, T: Tokenizer + ?Sized> LabeledDataset<'a, B, T, CsvSequence> {
    /// Load a comma-separated corpus from a file or a directory of files.
    pub fn new(
        tokenizer: &'a T,
        file_path: impl AsRef<Path>,
        block_size: usize,
        device: B::Device,
    ) -> Result<Self> {
        Self::with_delimiter(tokenizer, file_path, block_size, b',', device)
    }

    pub fn with_delimiter(
        tokenizer: &'a T,
        file_path: impl AsRef<Path>,
        block_size: usize,
        delimiter: u8,
        device: B::Device,
    ) -> Result<Self> {
        let file_path = file_path.as_ref();
        let files = resolve_data_files(file_path)?;
        let rows = CsvSequence::open(&files, delimiter)?;

        info!("Loaded labeled dataset from {:?}", file_path);
        info!("Number of lines: {}", rows.len());
        info!("Block size: {}", block_size);

        let mut dataset = Self::from_sequence(tokenizer, rows, block_size, device);
        dataset.files = Some(files);
        Ok(dataset)
    }
}

impl<'a, B: Backend, T: Tokenizer + ?Sized, S: TabularSequence> LabeledDataset<'a, B, T, S> {
    /// Wrap an already opened table; column roles come from its schema.
    pub fn from_sequence(tokenizer: &'a T, rows: S, block_size: usize, device: B::Device) -> Self {
        let schema = rows.schema();
        let text_column = schema.text_column().to_string();
        let label_columns = schema.label_columns().to_vec();
        let num_labels = label_columns.len();
        let len = rows.len();

        info!("Text column: {:?}, label columns: {:?}", text_column, label_columns);

        Self {
            tokenizer,
            files: None,
            block_size,
            rows,
            len,
            text_column,
            label_columns,
            num_labels,
            device,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn text_column(&self) -> &str {
        &self.text_column
    }

    pub fn label_columns(&self) -> &[String] {
        &self.label_columns
    }

    pub fn files(&self) -> Option<&DataFiles> {
        self.files.as_ref()
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Cleaned label values of `row`, in label column order.
    ///
    /// Values are narrowed to the tensor's `f32` before cleaning, so a finite
    /// `f64` outside the `f32` range also reads as zero.
    pub fn labels(&self, row: &TableRow) -> Result<Vec<f32>> {
        (0..self.num_labels)
            .map(|label| {
                let value = row.label(label).map_err(|e| {
                    DatasetError::format(
                        self.files
                            .as_ref()
                            .and_then(|f| f.paths().first().cloned())
                            .unwrap_or_else(PathBuf::new),
                        format!("column {:?}: {}", self.label_columns[label], e),
                    )
                })?;
                Ok(clean_label(value.map(|x| f64::from(x as f32))) as f32)
            })
            .collect()
    }

    pub fn preprocess(&self, row: &TableRow) -> Result<LabeledExample<B>> {
        let encoding = self
            .tokenizer
            .encode_with(row.text(), &EncodeOptions::padded(self.block_size))?;

        let inputs = encoding
            .into_fields()
            .into_iter()
            .map(|(name, values)| {
                let tensor = Tensor::<B, 1, Int>::from_ints(values.as_slice(), &self.device);
                (name, tensor)
            })
            .collect();

        let labels = self.labels(row)?;
        let label = Tensor::<B, 1>::from_floats(labels.as_slice(), &self.device);

        Ok(LabeledExample { inputs, label })
    }

    pub fn get(&self, index: usize) -> Result<LabeledExample<B>> {
        let row = self.rows.get(index)?;
        self.preprocess(&row)
    }
}
