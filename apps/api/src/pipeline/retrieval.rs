use std::sync::Arc;

use crate::embeddings::EmbeddingGateway;
use crate::resume::{search_resume, ChunkMetadata, ResumeError};
use crate::vector_index::VectorIndex;

pub const QUESTION_CONTEXT_TOP_K: usize = 5;
pub const NO_CONTEXT_PLACEHOLDER: &str =
    "No relevant resume data found in the index for this role.";

/// Resume context for question generation: the role's nearest chunks, best first,
/// separated by blank lines.
pub async fn resume_context_for(
    embedder: &dyn EmbeddingGateway,
    index: &Arc<VectorIndex<ChunkMetadata>>,
    role: &str,
) -> Result<String, ResumeError> {
    let hits = search_resume(embedder, index, role, QUESTION_CONTEXT_TOP_K).await?;
    let context = hits
        .iter()
        .map(|hit| hit.metadata.text.as_str())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if context.is_empty() {
        return Ok(NO_CONTEXT_PLACEHOLDER.to_string());
    }
    Ok(context)
}
