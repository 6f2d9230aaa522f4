use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status plus the active backends and index size.
/// `records` is null while a batch is being persisted.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "interview-engine",
        "index": {
            "records": state.index.try_len(),
            "dimension": state.index.dimension()
        },
        "session_store": state.sessions.backend(),
        "decision_engine": state.pipeline.decision_backend()
    }))
}
