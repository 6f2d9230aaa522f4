//! Interview sessions: an owner's sequence of evaluated rounds for one role.
//!
//! A session is `active` until completed. Rounds may only be appended while active,
//! and the state machine assigns round numbers `1..N` with no gaps. Stores load a
//! [`Session`], apply the transition, then persist the result.

pub mod handlers;
pub mod postgres;
pub mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::decision::RoundEvaluation;

pub use postgres::PgSessionStore;
pub use store::{InMemorySessionStore, SessionStore};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot {operation} a {status} session")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("Session {0} not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Could not serialize round evaluation: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluated question inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: Uuid,
    pub session_id: Uuid,
    pub round_number: i32,
    pub final_score: i64,
    pub hallucination_detected: bool,
    pub reasoning_alignment_score: i32,
    pub score_consistency: String,
    pub raw_evaluation: Value,
    pub created_at: DateTime<Utc>,
}

impl Round {
    fn from_evaluation(
        session_id: Uuid,
        round_number: i32,
        evaluation: &RoundEvaluation,
    ) -> Result<Self, SessionError> {
        Ok(Round {
            id: Uuid::new_v4(),
            session_id,
            round_number,
            final_score: i64::from(evaluation.final_score),
            hallucination_detected: evaluation.audit.hallucination_detected,
            reasoning_alignment_score: i32::from(evaluation.audit.reasoning_alignment_score),
            score_consistency: evaluation.audit.score_consistency.clone(),
            raw_evaluation: serde_json::to_value(evaluation)?,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: String,
    pub role: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Ordered by `round_number`.
    pub rounds: Vec<Round>,
}

impl Session {
    pub fn new(owner_id: &str, role: &str) -> Self {
        Session {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            role: role.to_string(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
            rounds: Vec::new(),
        }
    }

    /// Appends a round numbered one past the current last round.
    pub fn add_round(&mut self, evaluation: &RoundEvaluation) -> Result<&Round, SessionError> {
        self.ensure_active("add a round to")?;
        let next = self.rounds.last().map_or(1, |r| r.round_number + 1);
        let round = Round::from_evaluation(self.id, next, evaluation)?;
        self.rounds.push(round);
        Ok(&self.rounds[self.rounds.len() - 1])
    }

    pub fn complete(&mut self) -> Result<(), SessionError> {
        self.ensure_active("complete")?;
        self.status = SessionStatus::Completed;
        Ok(())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            owner_id: self.owner_id.clone(),
            role: self.role.clone(),
            status: self.status,
            created_at: self.created_at,
            round_count: self.rounds.len(),
        }
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::InvalidState {
                operation,
                status: self.status,
            });
        }
        Ok(())
    }
}

/// A session without its rounds, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub owner_id: String,
    pub role: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub round_count: usize,
}
