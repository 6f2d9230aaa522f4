use std::sync::Arc;

use crate::embeddings::EmbeddingGateway;
use crate::vector_index::{SearchHit, VectorIndex};

use super::{ChunkMetadata, ResumeError};

/// Embeds `query` and returns up to `top_k` chunks ordered by descending score.
///
/// A known-empty index skips the embedding call. The emptiness check never
/// waits on the index lock; while a batch is persisting the search proceeds
/// and blocks on the blocking pool instead of a runtime worker.
pub async fn search_resume(
    embedder: &dyn EmbeddingGateway,
    index: &Arc<VectorIndex<ChunkMetadata>>,
    query: &str,
    top_k: usize,
) -> Result<Vec<SearchHit<ChunkMetadata>>, ResumeError> {
    if top_k == 0 || index.try_len() == Some(0) {
        return Ok(Vec::new());
    }

    let vector = embedder.embed_one(query).await?;
    let index = Arc::clone(index);
    let hits = tokio::task::spawn_blocking(move || index.search(&vector, top_k)).await??;
    Ok(hits)
}
