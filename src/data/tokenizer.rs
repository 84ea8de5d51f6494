use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{DatasetError, Result};

pub const INPUT_IDS: &str = "input_ids";
pub const ATTENTION_MASK: &str = "attention_mask";

/// Padding policy applied after truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    None,
    /// Pad every sequence to exactly `max_length`.
    MaxLength,
}

/// Options for a single encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub add_special_tokens: bool,
    pub truncation: bool,
    pub padding: Padding,
    pub max_length: usize,
}

impl EncodeOptions {
    /// Special tokens, truncated to `max_length`, unpadded.
    pub fn truncated(max_length: usize) -> Self {
        Self {
            add_special_tokens: true,
            truncation: true,
            padding: Padding::None,
            max_length,
        }
    }

    /// Special tokens, truncated and padded to exactly `max_length`.
    pub fn padded(max_length: usize) -> Self {
        Self {
            padding: Padding::MaxLength,
            ..Self::truncated(max_length)
        }
    }
}

/// Tokenizer output: named integer sequences of equal length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Encoding {
    fields: BTreeMap<String, Vec<i64>>,
}

impl Encoding {
    pub fn new(input_ids: Vec<i64>, attention_mask: Vec<i64>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(INPUT_IDS.to_string(), input_ids);
        fields.insert(ATTENTION_MASK.to_string(), attention_mask);
        Self { fields }
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<i64>) {
        self.fields.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[i64]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn input_ids(&self) -> &[i64] {
        self.get(INPUT_IDS).unwrap_or(&[])
    }

    pub fn attention_mask(&self) -> Option<&[i64]> {
        self.get(ATTENTION_MASK)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[i64])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn into_fields(self) -> BTreeMap<String, Vec<i64>> {
        self.fields
    }
}

/// Trait for tokenization
pub trait Tokenizer: Send + Sync {
    /// Encode text to token IDs, without special tokens
    fn encode(&self, text: &str) -> Vec<i64>;

    /// Decode token IDs to text
    fn decode(&self, tokens: &[i64]) -> String;

    /// Get vocabulary size
    fn vocab_size(&self) -> usize;

    /// Get the ID for unknown tokens
    fn unk_id(&self) -> i64;

    /// Get the ID for padding tokens
    fn pad_id(&self) -> i64;

    /// Tokens wrapped around a sequence when special tokens are requested.
    fn special_tokens(&self) -> (Option<i64>, Option<i64>) {
        (None, None)
    }

    /// Encode with truncation and padding applied.
    ///
    /// Truncation shortens the text before the special tokens are added, so
    /// the result (specials included) never exceeds `max_length`.
    fn encode_with(&self, text: &str, options: &EncodeOptions) -> Result<Encoding> {
        let (start, end) = if options.add_special_tokens {
            self.special_tokens()
        } else {
            (None, None)
        };
        let specials = usize::from(start.is_some()) + usize::from(end.is_some());

        let mut ids = self.encode(text);
        if options.truncation {
            ids.truncate(options.max_length.saturating_sub(specials));
        }

        let mut input_ids = Vec::with_capacity(ids.len() + specials);
        input_ids.extend(start);
        input_ids.extend(ids);
        input_ids.extend(end);
        if options.truncation {
            input_ids.truncate(options.max_length);
        }

        let mut attention_mask = vec![1; input_ids.len()];
        if options.padding == Padding::MaxLength && input_ids.len() < options.max_length {
            input_ids.resize(options.max_length, self.pad_id());
            attention_mask.resize(options.max_length, 0);
        }

        Ok(Encoding::new(input_ids, attention_mask))
    }
}

const PAD_CHAR: char = '\0';
const UNK_CHAR: char = '\u{FFFD}';
const BOS_CHAR: char = '\u{2}';
const EOS_CHAR: char = '\u{3}';

/// Character-level tokenizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharTokenizer {
    char_to_id: HashMap<char, i64>,
    id_to_char: HashMap<i64, char>,
    vocab_size: usize,
    unk_id: i64,
    pad_id: i64,
    bos_id: i64,
    eos_id: i64,
}

impl CharTokenizer {
    /// Create a new character tokenizer from text
    pub fn from_text(text: &str) -> Self {
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        Self::from_vocab(chars)
    }

    /// Create a tokenizer with a predefined vocabulary
    pub fn from_vocab(vocab: Vec<char>) -> Self {
        let reserved = [PAD_CHAR, UNK_CHAR, BOS_CHAR, EOS_CHAR];

        let mut char_to_id = HashMap::new();
        let mut id_to_char = HashMap::new();

        for (id, ch) in reserved.iter().enumerate() {
            char_to_id.insert(*ch, id as i64);
            id_to_char.insert(id as i64, *ch);
        }

        let mut next_id = reserved.len() as i64;
        for ch in vocab {
            if !char_to_id.contains_key(&ch) {
                char_to_id.insert(ch, next_id);
                id_to_char.insert(next_id, ch);
                next_id += 1;
            }
        }

        Self {
            char_to_id,
            id_to_char,
            vocab_size: next_id as usize,
            pad_id: 0,
            unk_id: 1,
            bos_id: 2,
            eos_id: 3,
        }
    }

    /// Save tokenizer to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DatasetError::Tokenizer(format!("failed to serialize tokenizer: {}", e)))?;

        fs::write(path, json).map_err(|e| DatasetError::io(path, e))
    }

    /// Load tokenizer from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;

        serde_json::from_str(&json).map_err(|e| DatasetError::format(path, e.to_string()))
    }
}

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<i64> {
        text.chars()
            .map(|ch| *self.char_to_id.get(&ch).unwrap_or(&self.unk_id))
            .collect()
    }

    fn decode(&self, tokens: &[i64]) -> String {
        tokens
            .iter()
            .filter(|&&id| id != self.pad_id && id != self.bos_id && id != self.eos_id)
            .filter_map(|id| self.id_to_char.get(id))
            .collect()
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn unk_id(&self) -> i64 {
        self.unk_id
    }

    fn pad_id(&self) -> i64 {
        self.pad_id
    }

    fn special_tokens(&self) -> (Option<i64>, Option<i64>) {
        (Some(self.bos_id), Some(self.eos_id))
    }
}
