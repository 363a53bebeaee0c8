//! Text tokenization for Bark (multilingual BERT WordPiece vocabulary)

use std::path::Path;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::Tokenizer as HfTokenizer;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const PAD_TOKEN: &str = "[PAD]";
const UNK_TOKEN: &str = "[UNK]";

/// Token ids and attention mask padded to a fixed length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedEncoding {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    /// Number of real (non-padding) tokens
    pub length: usize,
}

pub struct Tokenizer {
    inner: HfTokenizer,
    pad_id: u32,
}

impl Tokenizer {
    /// Load from `tokenizer.json`, falling back to a WordPiece `vocab.txt`.
    pub fn from_files(tokenizer_json: Option<&Path>, vocab_txt: Option<&Path>) -> Result<Self> {
        if let Some(path) = tokenizer_json {
            return Self::from_tokenizer_json(path);
        }
        if let Some(path) = vocab_txt {
            return Self::from_vocab(path);
        }
        Err(Error::TokenizationError(
            "No tokenizer.json or vocab.txt available".to_string(),
        ))
    }

    fn from_tokenizer_json(path: &Path) -> Result<Self> {
        let inner =
            HfTokenizer::from_file(path).map_err(|e| Error::TokenizationError(e.to_string()))?;
        debug!("Loaded tokenizer from {:?}", path);
        Ok(Self::new_with_tokenizer(inner))
    }

    fn from_vocab(vocab_path: &Path) -> Result<Self> {
        info!("Building WordPiece tokenizer from {:?}", vocab_path);
        let vocab_str = vocab_path
            .to_str()
            .ok_or_else(|| Error::TokenizationError("Invalid vocab path".to_string()))?;

        let wordpiece = WordPiece::from_file(vocab_str)
            .unk_token(UNK_TOKEN.to_string())
            .build()
            .map_err(|e| Error::TokenizationError(format!("WordPiece build failed: {}", e)))?;

        let mut inner = HfTokenizer::new(wordpiece);
        // Cased vocabulary: keep case, strip nothing.
        inner.with_normalizer(BertNormalizer::new(true, true, Some(false), false));
        inner.with_pre_tokenizer(BertPreTokenizer);
        Ok(Self::new_with_tokenizer(inner))
    }

    fn new_with_tokenizer(inner: HfTokenizer) -> Self {
        let pad_id = inner.token_to_id(PAD_TOKEN).unwrap_or(0);
        Self { inner, pad_id }
    }

    /// Encode without special tokens.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::TokenizationError(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Encode and pad (or truncate) to exactly `max_length` tokens.
    pub fn encode_padded(&self, text: &str, max_length: usize) -> Result<PaddedEncoding> {
        let ids = self.encode(text)?;
        Ok(pad_to_length(ids, max_length, self.pad_id))
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

pub(crate) fn pad_to_length(mut ids: Vec<u32>, max_length: usize, pad_id: u32) -> PaddedEncoding {
    if ids.len() > max_length {
        warn!(
            "Prompt is {} tokens, truncating to {}",
            ids.len(),
            max_length
        );
        ids.truncate(max_length);
    }

    let length = ids.len();
    let mut input_ids: Vec<i64> = ids.into_iter().map(i64::from).collect();
    let mut attention_mask = vec![1i64; length];

    input_ids.resize(max_length, i64::from(pad_id));
    attention_mask.resize(max_length, 0);

    PaddedEncoding {
        input_ids,
        attention_mask,
        length,
    }
}
