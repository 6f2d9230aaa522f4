use std::sync::Arc;

use crate::chunking::Chunker;
use crate::embeddings::EmbeddingGateway;
use crate::pipeline::InterviewPipeline;
use crate::resume::ChunkMetadata;
use crate::session::SessionStore;
use crate::vector_index::VectorIndex;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub chunker: Chunker,
    pub embedder: Arc<dyn EmbeddingGateway>,
    /// Resume chunk index shared by ingestion, search and question retrieval.
    pub index: Arc<VectorIndex<ChunkMetadata>>,
    pub pipeline: Arc<InterviewPipeline>,
    /// Postgres when DATABASE_URL is set, in-memory otherwise.
    pub sessions: Arc<dyn SessionStore>,
}
