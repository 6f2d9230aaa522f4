use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::resume::{extract_pdf_text, ingest_text, search_resume};
use crate::state::AppState;

pub const MAX_SEARCH_TOP_K: usize = 20;

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub num_chunks: usize,
    pub message: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Serialize)]
pub struct ChunkLocation {
    pub filename: String,
    pub chunk_index: usize,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub text: String,
    pub metadata: ChunkLocation,
    pub score: f32,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// POST /api/v1/resumes/upload
/// Multipart field `file` holding a PDF.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Uploaded file has no filename".to_string()))?;
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(AppError::Validation(
                "Only PDF files are supported".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let text = extract_pdf_text(bytes.to_vec()).await?;
        let summary = ingest_text(
            &state.chunker,
            state.embedder.as_ref(),
            &state.index,
            &filename,
            &text,
        )
        .await?;

        return Ok(Json(UploadResponse {
            filename: summary.filename,
            num_chunks: summary.num_chunks,
            message: "Resume processed and indexed successfully".to_string(),
        }));
    }

    Err(AppError::Validation(
        "Multipart field 'file' is required".to_string(),
    ))
}

/// GET /api/v1/resumes/search?query=&top_k=
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    if params.query.trim().is_empty() {
        return Err(AppError::Validation("query must not be empty".to_string()));
    }
    if !(1..=MAX_SEARCH_TOP_K).contains(&params.top_k) {
        return Err(AppError::Validation(format!(
            "top_k must be between 1 and {MAX_SEARCH_TOP_K}"
        )));
    }

    let hits = search_resume(
        state.embedder.as_ref(),
        &state.index,
        &params.query,
        params.top_k,
    )
    .await?;

    let results = hits
        .into_iter()
        .map(|hit| SearchResult {
            text: hit.metadata.text,
            metadata: ChunkLocation {
                filename: hit.metadata.filename,
                chunk_index: hit.metadata.chunk_index,
            },
            score: hit.score,
        })
        .collect();

    Ok(Json(SearchResponse {
        query: params.query,
        results,
    }))
}
