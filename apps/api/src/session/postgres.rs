use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::pipeline::decision::RoundEvaluation;

use super::{Round, Session, SessionError, SessionStatus, SessionStore, SessionSummary};

#[derive(Debug, Clone, FromRow)]
struct SessionRow {
    id: Uuid,
    owner_id: String,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct RoundRow {
    id: Uuid,
    session_id: Uuid,
    round_number: i32,
    final_score: i64,
    hallucination_detected: bool,
    reasoning_alignment_score: i32,
    score_consistency: String,
    raw_evaluation: Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct SummaryRow {
    id: Uuid,
    owner_id: String,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
    round_count: i64,
}

fn parse_status(value: &str) -> Result<SessionStatus, SessionError> {
    SessionStatus::parse(value).ok_or_else(|| {
        SessionError::Database(sqlx::Error::Decode(
            format!("unknown session status {value:?}").into(),
        ))
    })
}

impl From<RoundRow> for Round {
    fn from(row: RoundRow) -> Self {
        Round {
            id: row.id,
            session_id: row.session_id,
            round_number: row.round_number,
            final_score: row.final_score,
            hallucination_detected: row.hallucination_detected,
            reasoning_alignment_score: row.reasoning_alignment_score,
            score_consistency: row.score_consistency,
            raw_evaluation: row.raw_evaluation,
            created_at: row.created_at,
        }
    }
}

impl SessionRow {
    fn into_session(self, rounds: Vec<RoundRow>) -> Result<Session, SessionError> {
        Ok(Session {
            id: self.id,
            owner_id: self.owner_id,
            role: self.role,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            rounds: rounds.into_iter().map(Round::from).collect(),
        })
    }
}

impl SummaryRow {
    fn into_summary(self) -> Result<SessionSummary, SessionError> {
        Ok(SessionSummary {
            id: self.id,
            owner_id: self.owner_id,
            role: self.role,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            round_count: usize::try_from(self.round_count).unwrap_or(0),
        })
    }
}

/// Postgres-backed sessions. Mutations lock the session row (`FOR UPDATE`) for
/// the whole read-transition-write sequence, so concurrent appends serialize and
/// round numbers stay dense.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_for_update(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Session, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, owner_id, role, status, created_at FROM interview_sessions \
             WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?;
        let row = row.ok_or(SessionError::NotFound(id))?;

        let rounds: Vec<RoundRow> = sqlx::query_as(
            "SELECT * FROM round_evaluations WHERE session_id = $1 ORDER BY round_number",
        )
        .bind(id)
        .fetch_all(&mut **tx)
        .await?;

        row.into_session(rounds)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, owner_id: &str, role: &str) -> Result<Session, SessionError> {
        let session = Session::new(owner_id, role);
        sqlx::query(
            "INSERT INTO interview_sessions (id, owner_id, role, status, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(&session.owner_id)
        .bind(&session.role)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        info!("Created session {} for role {:?}", session.id, role);
        Ok(session)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<SessionSummary>, SessionError> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.owner_id, s.role, s.status, s.created_at,
                   COUNT(r.id) AS round_count
            FROM interview_sessions s
            LEFT JOIN round_evaluations r ON r.session_id = s.id
            WHERE s.owner_id = $1
            GROUP BY s.id
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SummaryRow::into_summary).collect()
    }

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Session, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, owner_id, role, status, created_at FROM interview_sessions \
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        let row = row.ok_or(SessionError::NotFound(id))?;

        let rounds: Vec<RoundRow> = sqlx::query_as(
            "SELECT * FROM round_evaluations WHERE session_id = $1 ORDER BY round_number",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        row.into_session(rounds)
    }

    async fn add_round(
        &self,
        owner_id: &str,
        id: Uuid,
        evaluation: &RoundEvaluation,
    ) -> Result<Round, SessionError> {
        let mut tx = self.pool.begin().await?;
        let mut session = Self::load_for_update(&mut tx, owner_id, id).await?;
        let round = session.add_round(evaluation)?.clone();

        sqlx::query(
            r#"
            INSERT INTO round_evaluations
                (id, session_id, round_number, final_score, hallucination_detected,
                 reasoning_alignment_score, score_consistency, raw_evaluation, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(round.id)
        .bind(round.session_id)
        .bind(round.round_number)
        .bind(round.final_score)
        .bind(round.hallucination_detected)
        .bind(round.reasoning_alignment_score)
        .bind(&round.score_consistency)
        .bind(&round.raw_evaluation)
        .bind(round.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Recorded round {} for session {}", round.round_number, id);
        Ok(round)
    }

    async fn complete(&self, owner_id: &str, id: Uuid) -> Result<Session, SessionError> {
        let mut tx = self.pool.begin().await?;
        let mut session = Self::load_for_update(&mut tx, owner_id, id).await?;
        session.complete()?;

        sqlx::query("UPDATE interview_sessions SET status = $1 WHERE id = $2")
            .bind(session.status.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Completed session {} after {} rounds", id, session.rounds.len());
        Ok(session)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
