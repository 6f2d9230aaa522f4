use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::chunking::{Chunk, Chunker};
use crate::embeddings::EmbeddingGateway;
use crate::vector_index::VectorIndex;

use super::{ChunkMetadata, ResumeError};

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub filename: String,
    pub num_chunks: usize,
    pub ids: Vec<i64>,
}

/// Chunk → embed → add. The index write (including persistence) runs on the
/// blocking pool.
///
/// Whitespace-only windows (a trailing newline left alone in the last window)
/// carry nothing to embed and are dropped; the remaining chunks are renumbered
/// so `chunk_index` stays dense.
pub async fn ingest_text(
    chunker: &Chunker,
    embedder: &dyn EmbeddingGateway,
    index: &Arc<VectorIndex<ChunkMetadata>>,
    filename: &str,
    text: &str,
) -> Result<IngestSummary, ResumeError> {
    if text.trim().is_empty() {
        return Err(ResumeError::EmptyDocument(format!(
            "No text could be extracted from {filename}"
        )));
    }

    let chunks: Vec<_> = chunker
        .chunk(filename, text)?
        .into_iter()
        .filter(|c| !c.text.trim().is_empty())
        .enumerate()
        .map(|(ordinal, chunk)| Chunk { ordinal, ..chunk })
        .collect();
    if chunks.is_empty() {
        return Err(ResumeError::EmptyDocument(format!(
            "{filename} produced no chunks"
        )));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed(&texts).await?;

    let metadatas: Vec<ChunkMetadata> = chunks
        .into_iter()
        .map(|c| ChunkMetadata {
            filename: c.source_id,
            chunk_index: c.ordinal,
            text: c.text,
        })
        .collect();
    let num_chunks = metadatas.len();

    let index = Arc::clone(index);
    let ids = tokio::task::spawn_blocking(move || index.add(vectors, metadatas)).await??;

    info!(
        "Ingested {} ({} tokens) as {} chunks",
        filename,
        chunker.count_tokens(text),
        num_chunks
    );
    Ok(IngestSummary {
        filename: filename.to_string(),
        num_chunks,
        ids,
    })
}

/// Extracts plain text from an in-memory PDF on the blocking pool.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, ResumeError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ResumeError::Extraction(format!("PDF parser aborted: {e}")))?
        .map_err(|e| ResumeError::Extraction(e.to_string()))
}
