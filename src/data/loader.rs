use burn::tensor::{backend::Backend, Int, Tensor};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::BTreeMap;

use super::labeled_dataset::LabeledDataset;
use super::sequence::LazySequence;
use super::table::TabularSequence;
use super::text_dataset::TextDataset;
use super::tokenizer::Tokenizer;
use crate::config::LoaderConfig;
use crate::error::Result;

/// Trait for data loading
pub trait DataLoader<B: Backend> {
    type Batch;

    /// Get the next batch of data
    fn next_batch(&mut self) -> Result<Option<Self::Batch>>;

    /// Reset the data loader to the beginning
    fn reset(&mut self);

    /// Get the total number of batches (if known)
    fn num_batches(&self) -> Option<usize>;
}

/// Visiting order over dataset indices, cut into batches.
struct BatchOrder {
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    drop_last: bool,
    rng: Option<StdRng>,
}

impl BatchOrder {
    fn new(len: usize, config: &LoaderConfig) -> Self {
        let mut order = Self {
            order: (0..len).collect(),
            cursor: 0,
            batch_size: config.batch_size.max(1),
            drop_last: config.drop_last,
            rng: config.shuffle_seed.map(StdRng::seed_from_u64),
        };
        order.shuffle();
        order
    }

    fn shuffle(&mut self) {
        if let Some(rng) = self.rng.as_mut() {
            self.order.shuffle(rng);
        }
    }

    fn next_indices(&mut self) -> Option<Vec<usize>> {
        let remaining = self.order.len() - self.cursor;
        if remaining == 0 || (self.drop_last && remaining < self.batch_size) {
            return None;
        }
        let end = self.cursor + remaining.min(self.batch_size);
        let indices = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        Some(indices)
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.shuffle();
    }

    fn num_batches(&self) -> usize {
        let len = self.order.len();
        if self.drop_last {
            len / self.batch_size
        } else {
            len.div_ceil(self.batch_size)
        }
    }
}

/// Variable-length token sequences padded to the longest in the batch.
#[derive(Clone, Debug)]
pub struct TextBatch<B: Backend> {
    pub tokens: Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,
}

/// Batches lines from a [`TextDataset`].
pub struct TextBatchLoader<'d, 'a, B: Backend, T: Tokenizer + ?Sized, S: LazySequence<String>> {
    dataset: &'d TextDataset<'a, B, T, S>,
    order: BatchOrder,
}

impl<'d, 'a, B: Backend, T: Tokenizer + ?Sized, S: LazySequence<String>> TextBatchLoader<'d, 'a, B, T, S> {
    pub fn new(dataset: &'d TextDataset<'a, B, T, S>, config: &LoaderConfig) -> Self {
        Self {
            order: BatchOrder::new(dataset.len(), config),
            dataset,
        }
    }
}

impl<B: Backend, T: Tokenizer + ?Sized, S: LazySequence<String>> DataLoader<B>
    for TextBatchLoader<'_, '_, B, T, S>
{
    type Batch = TextBatch<B>;

    fn next_batch(&mut self) -> Result<Option<TextBatch<B>>> {
        let Some(indices) = self.order.next_indices() else {
            return Ok(None);
        };

        let encodings = indices
            .iter()
            .map(|&i| self.dataset.encoding(i))
            .collect::<Result<Vec<_>>>()?;

        let batch_size = encodings.len();
        let width = encodings
            .iter()
            .map(|e| e.input_ids().len())
            .max()
            .unwrap_or(0);
        let pad_id = self.dataset.tokenizer().pad_id();

        let mut batch_tokens = Vec::with_capacity(batch_size * width);
        let mut batch_mask = Vec::with_capacity(batch_size * width);
        for encoding in &encodings {
            let ids = encoding.input_ids();
            batch_tokens.extend_from_slice(ids);
            batch_tokens.extend(std::iter::repeat(pad_id).take(width - ids.len()));
            batch_mask.extend(std::iter::repeat(1i64).take(ids.len()));
            batch_mask.extend(std::iter::repeat(0i64).take(width - ids.len()));
        }

        let device = self.dataset.device();
        let tokens = Tensor::<B, 1, Int>::from_ints(batch_tokens.as_slice(), device)
            .reshape([batch_size, width]);
        let attention_mask = Tensor::<B, 1, Int>::from_ints(batch_mask.as_slice(), device)
            .reshape([batch_size, width]);

        Ok(Some(TextBatch {
            tokens,
            attention_mask,
        }))
    }

    fn reset(&mut self) {
        self.order.reset();
    }

    fn num_batches(&self) -> Option<usize> {
        Some(self.order.num_batches())
    }
}

/// Stacked tokenizer fields `[batch, block_size]` and labels `[batch, num_labels]`.
#[derive(Clone, Debug)]
pub struct LabeledBatch<B: Backend> {
    pub inputs: BTreeMap<String, Tensor<B, 2, Int>>,
    pub labels: Tensor<B, 2>,
}

/// Batches rows from a [`LabeledDataset`].
pub struct LabeledBatchLoader<'d, 'a, B: Backend, T: Tokenizer + ?Sized, S: TabularSequence> {
    dataset: &'d LabeledDataset<'a, B, T, S>,
    order: BatchOrder,
}

impl<'d, 'a, B: Backend, T: Tokenizer + ?Sized, S: TabularSequence> LabeledBatchLoader<'d, 'a, B, T, S> {
    pub fn new(dataset: &'d LabeledDataset<'a, B, T, S>, config: &LoaderConfig) -> Self {
        Self {
            order: BatchOrder::new(dataset.len(), config),
            dataset,
        }
    }
}

impl<B: Backend, T: Tokenizer + ?Sized, S: TabularSequence> DataLoader<B>
    for LabeledBatchLoader<'_, '_, B, T, S>
{
    type Batch = LabeledBatch<B>;

    fn next_batch(&mut self) -> Result<Option<LabeledBatch<B>>> {
        let Some(indices) = self.order.next_indices() else {
            return Ok(None);
        };

        let mut fields: BTreeMap<String, Vec<Tensor<B, 1, Int>>> = BTreeMap::new();
        let mut labels = Vec::with_capacity(indices.len());
        for index in indices {
            let example = self.dataset.get(index)?;
            for (name, tensor) in example.inputs {
                fields.entry(name).or_default().push(tensor);
            }
            labels.push(example.label);
        }

        let inputs = fields
            .into_iter()
            .map(|(name, tensors)| (name, Tensor::stack::<2>(tensors, 0)))
            .collect();

        Ok(Some(LabeledBatch {
            inputs,
            labels: Tensor::stack::<2>(labels, 0),
        }))
    }

    fn reset(&mut self) {
        self.order.reset();
    }

    fn num_batches(&self) -> Option<usize> {
        Some(self.order.num_batches())
    }
}
