pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers as interview;
use crate::resume::handlers as resumes;
use crate::session::handlers as sessions;
use crate::state::AppState;

/// Upper bound for uploaded resume PDFs.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resumes
        .route(
            "/api/v1/resumes/upload",
            post(resumes::handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/v1/resumes/search", get(resumes::handle_search))
        // Interview pipeline
        .route("/api/v1/interview/questions", post(interview::handle_questions))
        .route("/api/v1/interview/evaluate", post(interview::handle_evaluate))
        .route("/api/v1/interview/audit", post(interview::handle_audit))
        .route("/api/v1/interview/decision", post(interview::handle_decision))
        // Sessions
        .route(
            "/api/v1/sessions",
            post(sessions::handle_create_session).get(sessions::handle_list_sessions),
        )
        .route("/api/v1/sessions/:id", get(sessions::handle_get_session))
        .route("/api/v1/sessions/:id/rounds", post(sessions::handle_add_round))
        .route(
            "/api/v1/sessions/:id/complete",
            post(sessions::handle_complete_session),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::chunking::Chunker;
    use crate::embeddings::fakes::HashingEmbedder;
    use crate::embeddings::EmbeddingGateway;
    use crate::llm_client::fakes::ScriptedGateway;
    use crate::pipeline::decision::RuleDecisionEngine;
    use crate::pipeline::{InterviewPipeline, StageRunner};
    use crate::session::InMemorySessionStore;
    use crate::vector_index::VectorIndex;

    fn test_state(dir: &Path, replies: &[&str]) -> AppState {
        let embedder: Arc<dyn EmbeddingGateway> = Arc::new(HashingEmbedder { dimension: 32 });
        let index = Arc::new(VectorIndex::open(dir.join("idx.bin"), 32).unwrap());
        let runner = StageRunner::new(
            Arc::new(ScriptedGateway::replying(replies)),
            Duration::from_secs(5),
        );
        let pipeline = InterviewPipeline::new(
            embedder.clone(),
            index.clone(),
            runner,
            Arc::new(RuleDecisionEngine),
        );
        AppState {
            chunker: Chunker::default(),
            embedder,
            index,
            pipeline: Arc::new(pipeline),
            sessions: Arc::new(InMemorySessionStore::new()),
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn round_evaluation(final_score: u32) -> Value {
        json!({
            "scores": {"technical_depth": 7},
            "weaknesses": ["Skipped failure modes"],
            "final_score": final_score,
            "audit": {
                "hallucination_detected": false,
                "reasoning_alignment_score": 8,
                "score_consistency": "Consistent"
            }
        })
    }

    #[tokio::test]
    async fn test_health_reports_backends() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), &[]));
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["session_store"], "memory");
        assert_eq!(body["decision_engine"], "rules");
        assert_eq!(body["index"]["records"], 0);
    }

    #[tokio::test]
    async fn test_session_lifecycle_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), &[]));

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/sessions",
            Some(json!({"owner_id": "owner-1", "role": "Backend Engineer"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "active");
        let id = created["id"].as_str().unwrap().to_string();

        for expected in 1..=2 {
            let (status, round) = send(
                &app,
                "POST",
                &format!("/api/v1/sessions/{id}/rounds"),
                Some(json!({"owner_id": "owner-1", "round_evaluation": round_evaluation(75)})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(round["round_number"], expected);
            assert_eq!(round["raw_evaluation"]["final_score"], 75);
        }

        let (status, completed) = send(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/complete"),
            Some(json!({"owner_id": "owner-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(completed["status"], "completed");
        assert_eq!(completed["rounds"].as_array().unwrap().len(), 2);

        let (status, error) = send(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/rounds"),
            Some(json!({"owner_id": "owner-1", "round_evaluation": round_evaluation(90)})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error"]["code"], "INVALID_STATE");

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/v1/sessions/{id}?owner_id=owner-2"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, listed) = send(&app, "GET", "/api/v1/sessions?owner_id=owner-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["round_count"], 2);
    }

    #[tokio::test]
    async fn test_evaluate_degrades_to_fallback_flag() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), &["I'd rate this a solid 7/10."]));
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/interview/evaluate",
            Some(json!({
                "question": "How do you handle backpressure?",
                "answer": "Bounded queues and load shedding.",
                "resume_context": "Built a streaming platform"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], true);
        assert_eq!(body["final_score"], 0);
        assert_eq!(body["confidence_level"], "Low");
    }

    #[tokio::test]
    async fn test_decision_uses_configured_engine() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), &[]));
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/interview/decision",
            Some(json!({
                "role": "SRE",
                "rounds": [round_evaluation(90), round_evaluation(88)]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], false);
        assert_eq!(body["hire_recommendation"], "Strong Hire");
        assert_eq!(body["recurring_weaknesses"][0], "Skipped failure modes");
    }

    #[tokio::test]
    async fn test_search_validates_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), &[]));

        let (status, _) = send(&app, "GET", "/api/v1/resumes/search?query=rust&top_k=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "GET", "/api/v1/resumes/search?query=rust&top_k=21", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "GET", "/api/v1/resumes/search?query=rust", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "rust");
        assert!(body["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path(), &[]));

        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/resumes/upload")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
