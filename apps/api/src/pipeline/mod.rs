//! Interview pipeline: question generation → answer evaluation → evaluation audit →
//! hiring decision.
//!
//! Every stage has exactly two outcomes. Either the gateway's JSON parses and passes
//! the stage validator (`Validated`), or anything at all goes wrong and the stage
//! returns its conservative fallback (`Fallback`). No stage returns an error.

pub mod audit;
pub mod decision;
pub mod evaluation;
pub mod handlers;
pub mod prompts;
pub mod question;
pub mod retrieval;

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::embeddings::EmbeddingGateway;
use crate::llm_client::{strip_json_fences, GenerationGateway, LlmError};
use crate::resume::{ChunkMetadata, ResumeError};
use crate::vector_index::VectorIndex;

use self::audit::{Audit, AuditRequest, AuditStage};
use self::decision::{Decision, DecisionEngine, DecisionRequest};
use self::evaluation::{Evaluation, EvaluationRequest, EvaluationStage};
use self::prompts::PromptFrame;
use self::question::{QuestionRequest, QuestionSet, QuestionStage};

/// Why a stage attempt was rejected. Always absorbed into the stage fallback.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("generation gateway failed: {0}")]
    Gateway(#[from] LlmError),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("output is not valid JSON for the stage schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output violates the stage schema: {0}")]
    Invalid(String),
}

/// Confidence grade shared by the evaluation and decision stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Result of one stage run.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Validated(T),
    Fallback(T),
}

impl<T> StageOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, StageOutcome::Fallback(_))
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Validated(v) | StageOutcome::Fallback(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            StageOutcome::Validated(v) | StageOutcome::Fallback(v) => v,
        }
    }
}

/// A schema-constrained generation step.
///
/// Prompts and schemas are data on the implementing type; the validation and
/// fallback mechanics live in [`StageRunner`] and are shared by every stage.
pub trait Stage: Send + Sync {
    type Request: Sync;
    type Output: DeserializeOwned + Send;

    const NAME: &'static str;

    fn prompt(&self) -> &PromptFrame;

    fn user_content(&self, request: &Self::Request) -> Result<String, SchemaError>;

    /// Checks ranges and enumerations. May normalize the value (truncation,
    /// policy enforcement) on the way through.
    fn validate(
        &self,
        request: &Self::Request,
        output: Self::Output,
    ) -> Result<Self::Output, SchemaError>;

    /// Builds a fresh conservative result. Called once per failure.
    fn fallback(&self) -> Self::Output;
}

/// Runs stages against a generation gateway under a timeout.
#[derive(Clone)]
pub struct StageRunner {
    gateway: Arc<dyn GenerationGateway>,
    timeout: Duration,
}

impl StageRunner {
    pub fn new(gateway: Arc<dyn GenerationGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    pub async fn run<S: Stage>(&self, stage: &S, request: &S::Request) -> StageOutcome<S::Output> {
        match self.attempt(stage, request).await {
            Ok(output) => StageOutcome::Validated(output),
            Err(e) => {
                warn!("{} stage fell back: {e}", S::NAME);
                StageOutcome::Fallback(stage.fallback())
            }
        }
    }

    async fn attempt<S: Stage>(
        &self,
        stage: &S,
        request: &S::Request,
    ) -> Result<S::Output, SchemaError> {
        let user = stage.user_content(request)?;
        let system = stage.prompt().system_prompt();

        let raw = tokio::time::timeout(self.timeout, self.gateway.generate(&system, &user))
            .await
            .map_err(|_| SchemaError::Timeout(self.timeout))??;

        let parsed: S::Output = serde_json::from_str(strip_json_fences(&raw))?;
        stage.validate(request, parsed)
    }
}

pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), SchemaError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(SchemaError::Invalid(format!(
            "{field} = {value} is outside {min}..={max}"
        )));
    }
    Ok(())
}

/// JSON body wrapper for stage results; `fallback` tells callers the stage degraded.
#[derive(Debug, Serialize)]
pub struct StageResponse<T> {
    #[serde(flatten)]
    pub result: T,
    pub fallback: bool,
}

impl<T> From<StageOutcome<T>> for StageResponse<T> {
    fn from(outcome: StageOutcome<T>) -> Self {
        let fallback = outcome.is_fallback();
        Self {
            result: outcome.into_inner(),
            fallback,
        }
    }
}

/// The four stages wired to their collaborators.
pub struct InterviewPipeline {
    embedder: Arc<dyn EmbeddingGateway>,
    index: Arc<VectorIndex<ChunkMetadata>>,
    runner: StageRunner,
    question: QuestionStage,
    evaluation: EvaluationStage,
    audit: AuditStage,
    decision: Arc<dyn DecisionEngine>,
}

impl InterviewPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingGateway>,
        index: Arc<VectorIndex<ChunkMetadata>>,
        runner: StageRunner,
        decision: Arc<dyn DecisionEngine>,
    ) -> Self {
        Self {
            embedder,
            index,
            runner,
            question: QuestionStage::default(),
            evaluation: EvaluationStage::default(),
            audit: AuditStage::default(),
            decision,
        }
    }

    pub fn with_stages(
        mut self,
        question: QuestionStage,
        evaluation: EvaluationStage,
        audit: AuditStage,
    ) -> Self {
        self.question = question;
        self.evaluation = evaluation;
        self.audit = audit;
        self
    }

    pub fn decision_backend(&self) -> &'static str {
        self.decision.backend()
    }

    /// Retrieves resume context for `role` and generates questions from it.
    ///
    /// Only the embedding/index lookup can fail; the generation step itself
    /// always resolves to a question set.
    pub async fn questions_for_role(
        &self,
        role: &str,
    ) -> Result<StageOutcome<QuestionSet>, ResumeError> {
        let resume_context =
            retrieval::resume_context_for(self.embedder.as_ref(), &self.index, role).await?;
        let request = QuestionRequest {
            role: role.to_string(),
            resume_context,
        };
        let outcome = self.runner.run(&self.question, &request).await;
        info!(
            "Generated {} questions for role {:?} (fallback: {})",
            outcome.value().questions.len(),
            role,
            outcome.is_fallback()
        );
        Ok(outcome)
    }

    pub async fn evaluate(&self, request: &EvaluationRequest) -> StageOutcome<Evaluation> {
        self.runner.run(&self.evaluation, request).await
    }

    pub async fn audit(&self, request: &AuditRequest) -> StageOutcome<Audit> {
        self.runner.run(&self.audit, request).await
    }

    pub async fn decide(&self, request: &DecisionRequest) -> StageOutcome<Decision> {
        self.decision.decide(request).await
    }
}
