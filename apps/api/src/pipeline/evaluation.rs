use serde::{Deserialize, Serialize};

use super::prompts::{evaluation_frame, PromptFrame};
use super::{check_range, Confidence, SchemaError, Stage};

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationRequest {
    pub question: String,
    pub answer: String,
    pub resume_context: String,
}

/// Four sub-scores, each 0–10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub conceptual_clarity: u8,
    pub technical_depth: u8,
    pub real_world_application: u8,
    pub communication_precision: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: Scores,
    pub confidence_level: Confidence,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvement_suggestions: Vec<String>,
    /// 0–100.
    pub final_score: u32,
}

pub struct EvaluationStage {
    prompt: PromptFrame,
}

impl EvaluationStage {
    pub fn new(prompt: PromptFrame) -> Self {
        Self { prompt }
    }
}

impl Default for EvaluationStage {
    fn default() -> Self {
        Self::new(evaluation_frame())
    }
}

impl Stage for EvaluationStage {
    type Request = EvaluationRequest;
    type Output = Evaluation;

    const NAME: &'static str = "evaluation";

    fn prompt(&self) -> &PromptFrame {
        &self.prompt
    }

    fn user_content(&self, request: &EvaluationRequest) -> Result<String, SchemaError> {
        Ok(self.prompt.render_user(&[
            ("question", request.question.as_str()),
            ("resume_context", request.resume_context.as_str()),
            ("answer", request.answer.as_str()),
        ]))
    }

    fn validate(&self, _request: &EvaluationRequest, output: Evaluation) -> Result<Evaluation, SchemaError> {
        let s = &output.scores;
        check_range("scores.conceptual_clarity", s.conceptual_clarity, 0, 10)?;
        check_range("scores.technical_depth", s.technical_depth, 0, 10)?;
        check_range("scores.real_world_application", s.real_world_application, 0, 10)?;
        check_range("scores.communication_precision", s.communication_precision, 0, 10)?;
        check_range("final_score", output.final_score, 0, 100)?;
        Ok(output)
    }

    fn fallback(&self) -> Evaluation {
        Evaluation {
            scores: Scores {
                conceptual_clarity: 0,
                technical_depth: 0,
                real_world_application: 0,
                communication_precision: 0,
            },
            confidence_level: Confidence::Low,
            strengths: vec!["None identified due to processing error".to_string()],
            weaknesses: vec!["The answer could not be properly evaluated".to_string()],
            improvement_suggestions: vec![
                "Please try answering the question again or providing more context.".to_string(),
            ],
            final_score: 0,
        }
    }
}
