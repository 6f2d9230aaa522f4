//! Chunker: splits raw document text into overlapping, token-bounded windows.
//!
//! Window `i` covers tokens `[i * stride, i * stride + chunk_size)` where
//! `stride = chunk_size - chunk_overlap`. Windowing stops at the first window that
//! reaches the end of the token sequence, so no chunk is a strict suffix of its
//! predecessor.

pub mod tokenizer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tokenizer::{PretrainedTokenizer, RegexTokenizer, Tokenizer};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Invalid chunking configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Could not load tokenizer: {0}")]
    TokenizerLoad(String),
}

/// A contiguous token span of one source document. Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_id: String,
    pub text: String,
    /// Zero-based window index within the source document.
    pub ordinal: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations whose stride would be non-positive.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::InvalidConfiguration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkError::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Chunks `text` into overlapping windows using `tokenizer`.
///
/// Empty text yields an empty vector; an invalid configuration is rejected before
/// any tokenization happens.
pub fn chunk_text(
    tokenizer: &dyn Tokenizer,
    source_id: &str,
    text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, ChunkError> {
    config.validate()?;

    let spans = tokenizer.token_spans(text);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < spans.len() {
        let end = (start + config.chunk_size).min(spans.len());
        let byte_range = spans[start].start..spans[end - 1].end;
        chunks.push(Chunk {
            source_id: source_id.to_string(),
            text: text[byte_range].to_string(),
            ordinal: chunks.len(),
        });
        if end == spans.len() {
            break;
        }
        start += config.stride();
    }

    Ok(chunks)
}

/// A tokenizer bound to a validated configuration. Cheap to clone.
#[derive(Clone)]
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: ChunkingConfig) -> Result<Self, ChunkError> {
        config.validate()?;
        Ok(Self { tokenizer, config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.count_tokens(text)
    }

    pub fn chunk(&self, source_id: &str, text: &str) -> Result<Vec<Chunk>, ChunkError> {
        chunk_text(self.tokenizer.as_ref(), source_id, text, &self.config)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            tokenizer: Arc::new(RegexTokenizer),
            config: ChunkingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n` single-letter words: exactly `n` tokens ("a", " a", " a", ...).
    fn words(n: usize) -> String {
        vec!["a"; n].join(" ")
    }

    fn expected_count(n: usize, size: usize, overlap: usize) -> usize {
        if n == 0 {
            0
        } else if n <= overlap {
            1
        } else {
            (n - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let config = ChunkingConfig::new(10, 2).unwrap();
        let chunks = chunk_text(&RegexTokenizer, "cv.pdf", "", &config).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_overlap_equal_to_size_is_rejected() {
        let config = ChunkingConfig {
            chunk_size: 5,
            chunk_overlap: 5,
        };
        let err = chunk_text(&RegexTokenizer, "cv.pdf", "some text", &config).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        assert!(ChunkingConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_chunk_count_matches_stride_formula() {
        for (size, overlap) in [(5, 2), (4, 0), (10, 9), (500, 100)] {
            let config = ChunkingConfig::new(size, overlap).unwrap();
            for n in [1, 2, 3, 4, 5, 6, 7, 10, 11, 23, 97, 1201] {
                let chunks = chunk_text(&RegexTokenizer, "doc", &words(n), &config).unwrap();
                assert_eq!(
                    chunks.len(),
                    expected_count(n, size, overlap),
                    "n={n} size={size} overlap={overlap}"
                );
            }
        }
    }

    #[test]
    fn test_windows_cover_every_token() {
        let config = ChunkingConfig::new(7, 3).unwrap();
        let text = "Designed a sharded Postgres cluster, migrated 40TB with zero downtime, \
                    and mentored three engineers on incident response.";
        let spans = RegexTokenizer.token_spans(text);
        let chunks = chunk_text(&RegexTokenizer, "doc", text, &config).unwrap();

        let stride = 7 - 3;
        let mut covered = vec![false; spans.len()];
        for chunk in &chunks {
            let start = chunk.ordinal * stride;
            let end = (start + 7).min(spans.len());
            assert_eq!(chunk.text, &text[spans[start].start..spans[end - 1].end]);
            covered[start..end].iter_mut().for_each(|c| *c = true);
        }
        assert!(covered.iter().all(|c| *c));
    }

    #[test]
    fn test_zero_overlap_chunks_concatenate_to_source() {
        let config = ChunkingConfig::new(3, 0).unwrap();
        let text = "Owned the billing pipeline end to end for 3 years.";
        let chunks = chunk_text(&RegexTokenizer, "doc", text, &config).unwrap();
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_ordinals_are_dense_and_ordered() {
        let chunker = Chunker::new(Arc::new(RegexTokenizer), ChunkingConfig::new(4, 1).unwrap())
            .unwrap();
        let chunks = chunker.chunk("resume.pdf", &words(20)).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.source_id, "resume.pdf");
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn test_short_text_below_overlap_is_one_chunk() {
        let config = ChunkingConfig::new(500, 100).unwrap();
        let chunks = chunk_text(&RegexTokenizer, "doc", "Rust, Go", &config).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Rust, Go");
    }
}
