use burn::tensor::{backend::Backend, Int, Tensor};
use std::path::Path;
use tracing::info;

use super::files::{resolve_data_files, DataFiles};
use super::sequence::{LazySequence, LineSequence};
use super::tokenizer::{EncodeOptions, Encoding, Tokenizer};
use crate::error::Result;

/// Line-per-example dataset tokenized on access.
///
/// Lines are truncated to `block_size` tokens (special tokens included) and
/// are not padded, so examples vary in length.
pub struct TextDataset<'a, B: Backend, T: Tokenizer + ?Sized, S: LazySequence<String> = LineSequence> {
    tokenizer: &'a T,
    files: Option<DataFiles>,
    block_size: usize,
    lines: S,
    len: usize,
    device: B::Device,
}

impl<'a, B: Backend, T: Tokenizer + ?Sized> TextDataset<'a, B, T, LineSequence> {
    /// Load a plain-text corpus from a file or a directory of files.
    pub fn new(
        tokenizer: &'a T,
        file_path: impl AsRef<Path>,
        block_size: usize,
        device: B::Device,
    ) -> Result<Self> {
        let file_path = file_path.as_ref();
        let files = resolve_data_files(file_path)?;
        let lines = LineSequence::open(&files)?;

        info!("Loaded text dataset from {:?}", file_path);
        info!("Number of lines: {}", lines.len());
        info!("Block size: {}", block_size);

        let mut dataset = Self::from_sequence(tokenizer, lines, block_size, device);
        dataset.files = Some(files);
        Ok(dataset)
    }
}

impl<'a, B: Backend, T: Tokenizer + ?Sized, S: LazySequence<String>> TextDataset<'a, B, T, S> {
    /// Wrap an already opened line sequence.
    pub fn from_sequence(tokenizer: &'a T, lines: S, block_size: usize, device: B::Device) -> Self {
        let len = lines.len();
        Self {
            tokenizer,
            files: None,
            block_size,
            lines,
            len,
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

    /// Files the dataset was loaded from, when built from a path.
    pub fn files(&self) -> Option<&DataFiles> {
        self.files.as_ref()
    }

    pub fn tokenizer(&self) -> &T {
        self.tokenizer
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Tokenizer output for the line at `index`.
    pub fn encoding(&self, index: usize) -> Result<Encoding> {
        let line = self.lines.get(index)?;
        self.tokenizer
            .encode_with(&line, &EncodeOptions::truncated(self.block_size))
    }

    pub fn preprocess(&self, text: &str) -> Result<Tensor<B, 1, Int>> {
        let encoding = self
            .tokenizer
            .encode_with(text, &EncodeOptions::truncated(self.block_size))?;
        Ok(Tensor::<B, 1, Int>::from_ints(encoding.input_ids(), &self.device))
    }

    /// Token ids of the line at `index`.
    pub fn get(&self, index: usize) -> Result<Tensor<B, 1, Int>> {
        let line = self.lines.get(index)?;
        self.preprocess(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CharTokenizer;
    use crate::error::DatasetError;
    use burn_ndarray::NdArray;
    use std::io::Write;
    use tempfile::NamedTempFile;

    type TestBackend = NdArray<f32>;

    fn corpus(lines: &[&str]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file
    }

    #[test]
    fn test_text_dataset() {
        let temp_file = corpus(&["hello", "world", "foo bar baz"]);
        let tokenizer = CharTokenizer::from_text("hello world foo bar baz");
        let device = Default::default();

        let dataset =
            TextDataset::<TestBackend, _>::new(&tokenizer, temp_file.path(), 8, device).unwrap();

        assert_eq!(dataset.len(), 3);
        for i in 0..dataset.len() {
            let ids = dataset.get(i).unwrap();
            let len = ids.dims()[0];
            assert!(len > 0 && len <= 8);
        }

        // "foo bar baz" plus specials is longer than the block
        assert_eq!(dataset.get(2).unwrap().dims(), [8]);
    }

    #[test]
    fn test_examples_are_not_padded() {
        let temp_file = corpus(&["ab", "abcdef"]);
        let tokenizer = CharTokenizer::from_text("abcdef");
        let device = Default::default();

        let dataset =
            TextDataset::<TestBackend, _>::new(&tokenizer, temp_file.path(), 32, device).unwrap();

        assert_eq!(dataset.get(0).unwrap().dims(), [4]);
        assert_eq!(dataset.get(1).unwrap().dims(), [8]);
    }

    #[test]
    fn test_get_is_repeatable() {
        let temp_file = corpus(&["hello"]);
        let tokenizer = CharTokenizer::from_text("helo");
        let device = Default::default();

        let dataset =
            TextDataset::<TestBackend, _>::new(&tokenizer, temp_file.path(), 8, device).unwrap();

        let first = dataset.get(0).unwrap().into_data().to_vec::<i64>().unwrap();
        let second = dataset.get(0).unwrap().into_data().to_vec::<i64>().unwrap();
        assert_eq!(first, second);
        assert_eq!(tokenizer.decode(&first), "hello");
    }

    #[test]
    fn test_out_of_range() {
        let temp_file = corpus(&["hello"]);
        let tokenizer = CharTokenizer::from_text("helo");
        let device = Default::default();

        let dataset =
            TextDataset::<TestBackend, _>::new(&tokenizer, temp_file.path(), 8, device).unwrap();

        assert!(matches!(
            dataset.get(1),
            Err(DatasetError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_invalid_path() {
        let tokenizer = CharTokenizer::from_text("a");
        let device = Default::default();

        let result = TextDataset::<TestBackend, _>::new(
            &tokenizer,
            "/definitely/not/a/corpus",
            8,
            device,
        );
        assert!(matches!(result, Err(DatasetError::InvalidPath(_))));
    }

    #[test]
    fn test_from_sequence() {
        let tokenizer = CharTokenizer::from_text("xyz");
        let lines = vec!["xyz".to_string(), "zz".to_string()];
        let dataset =
            TextDataset::<TestBackend, _, _>::from_sequence(&tokenizer, lines, 16, Default::default());

        assert_eq!(dataset.len(), 2);
        assert!(dataset.files().is_none());
        assert_eq!(dataset.encoding(1).unwrap().input_ids().len(), 4);
    }
}
