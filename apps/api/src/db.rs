use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS interview_sessions (
        id          UUID PRIMARY KEY,
        owner_id    TEXT NOT NULL,
        role        TEXT NOT NULL,
        status      TEXT NOT NULL DEFAULT 'active',
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS interview_sessions_owner_idx \
     ON interview_sessions (owner_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS round_evaluations (
        id                         UUID PRIMARY KEY,
        session_id                 UUID NOT NULL REFERENCES interview_sessions (id) ON DELETE CASCADE,
        round_number               INTEGER NOT NULL,
        final_score                BIGINT NOT NULL,
        hallucination_detected     BOOLEAN NOT NULL,
        reasoning_alignment_score  INTEGER NOT NULL,
        score_consistency          TEXT NOT NULL,
        raw_evaluation             JSONB NOT NULL,
        created_at                 TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (session_id, round_number)
    )
    "#,
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the session tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Session schema is up to date");
    Ok(())
}
