//! Deterministic sub-word tokenization used for chunk windowing.
//!
//! Tokens are byte spans into the source text, never re-encoded strings, so a
//! window of tokens always decodes to the exact substring it was cut from.

use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::ChunkError;

/// Contractions, optionally space-prefixed letter runs, digit groups of at most
/// three, optionally space-prefixed punctuation runs, and whitespace runs.
/// Every character of the input falls into exactly one alternative.
const TOKEN_PATTERN: &str =
    r"'(?:s|t|re|ve|m|ll|d)| ?\p{L}+| ?\p{N}{1,3}| ?[^\s\p{L}\p{N}]+|\s+";

/// Splits text into an ordered sequence of token spans that tile the text.
///
/// A span may be empty when a model splits one character across several
/// tokens. Implementations must be deterministic: the same text always yields the same
/// spans, otherwise chunk counts drift between ingestion runs.
pub trait Tokenizer: Send + Sync {
    fn token_spans(&self, text: &str) -> Vec<Range<usize>>;

    fn count_tokens(&self, text: &str) -> usize {
        self.token_spans(text).len()
    }
}

/// Regex pre-tokenizer in the shape of a byte-pair encoder's split stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTokenizer;

fn token_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern is a valid regex"))
}

impl Tokenizer for RegexTokenizer {
    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        token_regex().find_iter(text).map(|m| m.range()).collect()
    }
}

/// Tokenizer loaded from a Hugging Face `tokenizer.json`, such as an export of
/// the embedding model's `cl100k_base` vocabulary, so chunk sizes are counted in
/// the model's own tokens.
pub struct PretrainedTokenizer {
    inner: tokenizers::Tokenizer,
}

impl PretrainedTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChunkError> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| ChunkError::TokenizerLoad(format!("{}: {e}", path.display())))?;
        if inner.get_truncation().is_some() {
            return Err(ChunkError::TokenizerLoad(format!(
                "{}: truncation is enabled and would drop tokens",
                path.display()
            )));
        }
        Ok(Self { inner })
    }
}

impl Tokenizer for PretrainedTokenizer {
    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        let encoding = match self.inner.encode(text, false) {
            Ok(encoding) => encoding,
            Err(e) => {
                warn!("Pretrained tokenizer failed, using regex spans: {e}");
                return RegexTokenizer.token_spans(text);
            }
        };
        let ends = encoding
            .get_offsets()
            .iter()
            .zip(encoding.get_attention_mask())
            .filter(|(_, mask)| **mask == 1)
            .map(|((_, end), _)| *end);
        tile(text, ends)
    }
}

/// Turns token end offsets into contiguous spans covering all of `text`.
/// Whitespace the encoder leaves outside its offsets joins the next token.
fn tile(text: &str, ends: impl Iterator<Item = usize>) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for end in ends {
        let mut end = end.clamp(cursor, text.len());
        while !text.is_char_boundary(end) {
            end += 1;
        }
        spans.push(cursor..end);
        cursor = end;
    }
    if let Some(last) = spans.last_mut() {
        last.end = text.len();
    }
    spans
}
