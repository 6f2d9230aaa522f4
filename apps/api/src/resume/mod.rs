//! Resume ingestion and semantic search over the shared vector index.

pub mod handlers;
pub mod ingest;
pub mod search;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunking::ChunkError;
use crate::embeddings::EmbeddingError;
use crate::vector_index::IndexError;

pub use ingest::{extract_pdf_text, ingest_text, IngestSummary};
pub use search::search_resume;

/// Metadata stored alongside every resume chunk vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error(transparent)]
    Chunking(#[from] ChunkError),

    #[error("embedding gateway failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("could not extract text: {0}")]
    Extraction(String),

    #[error("{0}")]
    EmptyDocument(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
