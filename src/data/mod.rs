mod files;
mod labeled_dataset;
mod loader;
mod sequence;
mod table;
mod text_dataset;
mod tokenizer;

#[cfg(feature = "hf-tokenizers")]
mod hf_tokenizer;

pub use files::{resolve_data_files, DataFiles};
pub use labeled_dataset::{clean_label, LabeledDataset, LabeledExample};
pub use loader::{DataLoader, LabeledBatch, LabeledBatchLoader, TextBatch, TextBatchLoader};
pub use sequence::{LazySequence, LineSequence};
pub use table::{parse_label_cell, CsvSequence, InMemoryTable, TableRow, TableSchema, TabularSequence};
pub use text_dataset::TextDataset;
pub use tokenizer::{CharTokenizer, EncodeOptions, Encoding, Padding, Tokenizer, ATTENTION_MASK, INPUT_IDS};

#[cfg(feature = "hf-tokenizers")]
pub use hf_tokenizer::HfTokenizer;
