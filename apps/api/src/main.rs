mod chunking;
mod config;
mod db;
mod embeddings;
mod errors;
mod llm_client;
mod pipeline;
mod resume;
mod routes;
mod session;
mod state;
mod vector_index;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chunking::{Chunker, PretrainedTokenizer, RegexTokenizer, Tokenizer};
use crate::config::{Config, DecisionBackend};
use crate::db::{create_pool, ensure_schema};
use crate::embeddings::{EmbeddingGateway, OpenAiEmbeddingClient};
use crate::llm_client::LlmClient;
use crate::pipeline::audit::AuditStage;
use crate::pipeline::decision::{DecisionEngine, DecisionStage, LlmDecisionEngine, RuleDecisionEngine};
use crate::pipeline::evaluation::EvaluationStage;
use crate::pipeline::prompts::{audit_frame, decision_frame, evaluation_frame, question_frame, PromptFrame};
use crate::pipeline::question::QuestionStage;
use crate::pipeline::{InterviewPipeline, StageRunner};
use crate::resume::ChunkMetadata;
use crate::routes::build_router;
use crate::session::{InMemorySessionStore, PgSessionStore, SessionStore};
use crate::state::AppState;
use crate::vector_index::VectorIndex;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview engine v{}", env!("CARGO_PKG_VERSION"));

    // Session store: Postgres when configured, process memory otherwise
    let sessions: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => {
            let db = create_pool(url).await?;
            ensure_schema(&db).await?;
            Arc::new(PgSessionStore::new(db))
        }
        None => {
            info!("DATABASE_URL not set; sessions are kept in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    // Resume index
    if let Some(parent) = config.index_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create index directory {}", parent.display()))?;
    }
    let index: Arc<VectorIndex<ChunkMetadata>> = Arc::new(VectorIndex::open(
        &config.index_path,
        config.embedding_dimension,
    )?);
    info!(
        "Resume index ready at {} ({} records, next id {})",
        index.path().display(),
        index.len(),
        index.next_id()
    );
    if index.is_empty() {
        info!("Resume index is empty; questions use generic context until a resume is uploaded");
    }

    // Gateways
    let openai = OpenAiEmbeddingClient::new(
        config.openai_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
    );
    info!(
        "Embedding client initialized (model: {}, dimension: {})",
        openai.model(),
        config.embedding_dimension
    );
    let embedder: Arc<dyn EmbeddingGateway> = Arc::new(openai);
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone()));
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Pipeline
    let runner = StageRunner::new(llm, Duration::from_secs(config.stage_timeout_secs));
    let decision: Arc<dyn DecisionEngine> = match config.decision_backend {
        DecisionBackend::Llm => Arc::new(
            LlmDecisionEngine::new(runner.clone())
                .with_stage(DecisionStage::new(load_prompt(&config, "decision", decision_frame())?)),
        ),
        DecisionBackend::Rules => Arc::new(RuleDecisionEngine),
    };
    let pipeline = InterviewPipeline::new(embedder.clone(), index.clone(), runner, decision)
        .with_stages(
            QuestionStage::new(load_prompt(&config, "question", question_frame())?),
            EvaluationStage::new(load_prompt(&config, "evaluation", evaluation_frame())?),
            AuditStage::new(load_prompt(&config, "audit", audit_frame())?),
        );
    info!(
        "Interview pipeline ready (decision engine: {}, stage timeout: {}s)",
        pipeline.decision_backend(),
        config.stage_timeout_secs
    );

    let tokenizer: Arc<dyn Tokenizer> = match &config.tokenizer_path {
        Some(path) => {
            info!("Chunking with tokenizer from {}", path.display());
            Arc::new(PretrainedTokenizer::from_file(path)?)
        }
        None => Arc::new(RegexTokenizer),
    };
    let chunker = Chunker::new(tokenizer, config.chunking)?;
    info!(
        "Chunker configured (size: {}, overlap: {} tokens)",
        chunker.config().chunk_size,
        chunker.config().chunk_overlap
    );

    // Build app state
    let state = AppState {
        chunker,
        embedder,
        index: index.clone(),
        pipeline: Arc::new(pipeline),
        sessions,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(index) {
        Ok(index) => index.close(),
        Err(_) => info!("Index still referenced at shutdown; every add is already persisted"),
    }

    Ok(())
}

fn load_prompt(config: &Config, stage: &str, default: PromptFrame) -> Result<PromptFrame> {
    match &config.prompts_dir {
        Some(dir) => default
            .with_overrides_from(dir, stage)
            .with_context(|| format!("Could not read {stage} prompt overrides from {}", dir.display())),
        None => Ok(default),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
