use std::path::Path;
use tokenizers::{PaddingDirection, PostProcessor, TruncationDirection};
use tracing::warn;

use super::tokenizer::{EncodeOptions, Encoding, Padding, Tokenizer};
use crate::error::{DatasetError, Result};

const PAD_TOKENS: &[&str] = &["[PAD]", "<pad>"];
const UNK_TOKENS: &[&str] = &["[UNK]", "<unk>"];

/// Wraps a Hugging Face `tokenizer.json` behind [`Tokenizer`].
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    pad_id: u32,
    pad_token: String,
    unk_id: u32,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| DatasetError::Tokenizer(format!("cannot load {:?}: {}", path, e)))?;
        Self::new(inner)
    }

    /// Take over `inner`, keeping its pad token but dropping the truncation and
    /// padding stored in `tokenizer.json`. Lengths come from [`EncodeOptions`] only.
    pub fn new(mut inner: tokenizers::Tokenizer) -> Result<Self> {
        let (pad_id, pad_token) = match inner.get_padding() {
            Some(params) => (params.pad_id, params.pad_token.clone()),
            None => PAD_TOKENS
                .iter()
                .find_map(|t| inner.token_to_id(t).map(|id| (id, t.to_string())))
                .unwrap_or((0, PAD_TOKENS[0].to_string())),
        };
        let unk_id = UNK_TOKENS
            .iter()
            .find_map(|t| inner.token_to_id(t))
            .unwrap_or(0);

        inner
            .with_truncation(None)
            .map_err(|e| DatasetError::Tokenizer(e.to_string()))?;
        inner.with_padding(None);

        Ok(Self {
            inner,
            pad_id,
            pad_token,
            unk_id,
        })
    }

    fn added_tokens(&self, add_special_tokens: bool) -> usize {
        if !add_special_tokens {
            return 0;
        }
        self.inner
            .get_post_processor()
            .map(|p| p.added_tokens(false))
            .unwrap_or(0)
    }
}

impl Tokenizer for HfTokenizer {
    /// Raw ids without special tokens, truncation or padding. An encoding
    /// failure is logged and yields no ids; use `encode_with` to see the error.
    fn encode(&self, text: &str) -> Vec<i64> {
        let options = EncodeOptions {
            add_special_tokens: false,
            truncation: false,
            padding: Padding::None,
            max_length: 0,
        };
        match self.encode_with(text, &options) {
            Ok(encoding) => encoding.input_ids().to_vec(),
            Err(e) => {
                warn!("Failed to encode text: {}", e);
                Vec::new()
            }
        }
    }

    fn decode(&self, tokens: &[i64]) -> String {
        let ids: Vec<u32> = tokens.iter().filter_map(|&id| u32::try_from(id).ok()).collect();
        self.inner.decode(&ids, true).unwrap_or_default()
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    fn unk_id(&self) -> i64 {
        i64::from(self.unk_id)
    }

    fn pad_id(&self) -> i64 {
        i64::from(self.pad_id)
    }

    fn encode_with(&self, text: &str, options: &EncodeOptions) -> Result<Encoding> {
        let tokenizer_err = |e: tokenizers::Error| DatasetError::Tokenizer(e.to_string());

        let mut encoding = self.inner.encode(text, false).map_err(tokenizer_err)?;
        if options.truncation {
            let budget = options
                .max_length
                .saturating_sub(self.added_tokens(options.add_special_tokens));
            encoding.truncate(budget, 0, TruncationDirection::Right);
        }

        let mut encoding = self
            .inner
            .post_process(encoding, None, options.add_special_tokens)
            .map_err(tokenizer_err)?;
        if options.padding == Padding::MaxLength {
            encoding.pad(
                options.max_length,
                self.pad_id,
                0,
                &self.pad_token,
                PaddingDirection::Right,
            );
        }

        let widen = |ids: &[u32]| ids.iter().map(|&id| i64::from(id)).collect::<Vec<_>>();
        let mut out = Encoding::new(widen(encoding.get_ids()), widen(encoding.get_attention_mask()));
        out.insert("token_type_ids", widen(encoding.get_type_ids()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn word_level_tokenizer(dir: &TempDir) -> HfTokenizer {
        write_tokenizer(dir, serde_json::Value::Null, serde_json::Value::Null)
    }

    fn write_tokenizer(
        dir: &TempDir,
        truncation: serde_json::Value,
        padding: serde_json::Value,
    ) -> HfTokenizer {
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": truncation,
            "padding": padding,
            "added_tokens": [
                {"id": 0, "content": "[PAD]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 1, "content": "[UNK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 2, "content": "[CLS]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 3, "content": "[SEP]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": {"type": "BertProcessing", "sep": ["[SEP]", 3], "cls": ["[CLS]", 2]},
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {"[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3, "hello": 4, "world": 5, "foo": 6},
                "unk_token": "[UNK]"
            }
        });
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, json.to_string()).unwrap();
        HfTokenizer::from_file(&path).unwrap()
    }

    #[test]
    fn test_truncation_keeps_special_tokens() {
        let dir = TempDir::new().unwrap();
        let tokenizer = word_level_tokenizer(&dir);

        let encoding = tokenizer
            .encode_with("hello world foo", &EncodeOptions::truncated(4))
            .unwrap();
        assert_eq!(encoding.input_ids(), &[2, 4, 5, 3]);
    }

    #[test]
    fn test_padding_to_max_length() {
        let dir = TempDir::new().unwrap();
        let tokenizer = word_level_tokenizer(&dir);

        let encoding = tokenizer.encode_with("hello", &EncodeOptions::padded(6)).unwrap();
        assert_eq!(encoding.input_ids(), &[2, 4, 3, 0, 0, 0]);
        assert_eq!(encoding.attention_mask().unwrap(), &[1, 1, 1, 0, 0, 0]);
        assert_eq!(encoding.get("token_type_ids").unwrap().len(), 6);
        assert_eq!(tokenizer.pad_id(), 0);
        assert_eq!(tokenizer.unk_id(), 1);
    }

    #[test]
    fn test_stored_truncation_and_padding_are_ignored() {
        let dir = TempDir::new().unwrap();
        let tokenizer = write_tokenizer(
            &dir,
            serde_json::json!({
                "direction": "Right",
                "max_length": 3,
                "strategy": "LongestFirst",
                "stride": 0
            }),
            serde_json::json!({
                "strategy": {"Fixed": 16},
                "direction": "Right",
                "pad_to_multiple_of": null,
                "pad_id": 0,
                "pad_type_id": 0,
                "pad_token": "[PAD]"
            }),
        );
        assert_eq!(tokenizer.pad_id(), 0);

        let encoding = tokenizer
            .encode_with("hello world", &EncodeOptions::truncated(8))
            .unwrap();
        assert_eq!(encoding.input_ids(), &[2, 4, 5, 3]);
        assert_eq!(encoding.attention_mask().unwrap(), &[1, 1, 1, 1]);

        let encoding = tokenizer.encode_with("hello", &EncodeOptions::padded(6)).unwrap();
        assert_eq!(encoding.input_ids(), &[2, 4, 3, 0, 0, 0]);

        assert_eq!(tokenizer.encode("hello world foo hello"), vec![4, 5, 6, 4]);
    }

    #[test]
    fn test_without_special_tokens() {
        let dir = TempDir::new().unwrap();
        let tokenizer = word_level_tokenizer(&dir);

        let options = EncodeOptions {
            add_special_tokens: false,
            ..EncodeOptions::truncated(2)
        };
        let encoding = tokenizer.encode_with("hello world foo", &options).unwrap();
        assert_eq!(encoding.input_ids(), &[4, 5]);

        let options = EncodeOptions {
            add_special_tokens: false,
            ..EncodeOptions::padded(4)
        };
        let encoding = tokenizer.encode_with("hello", &options).unwrap();
        assert_eq!(encoding.input_ids(), &[4, 0, 0, 0]);
        assert_eq!(encoding.attention_mask().unwrap(), &[1, 0, 0, 0]);
    }

    #[test]
    fn test_encode_returns_raw_ids() {
        let dir = TempDir::new().unwrap();
        let tokenizer = word_level_tokenizer(&dir);

        let options = EncodeOptions {
            add_special_tokens: false,
            truncation: false,
            padding: Padding::None,
            max_length: 0,
        };
        let raw = tokenizer.encode_with("hello world", &options).unwrap();
        assert_eq!(tokenizer.encode("hello world"), vec![4, 5]);
        assert_eq!(tokenizer.encode("hello world"), raw.input_ids());
        assert_eq!(tokenizer.encode("hello bar"), vec![4, 1]);
    }
}
