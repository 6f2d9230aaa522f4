use serde::{Deserialize, Serialize};

use super::prompts::{question_frame, PromptFrame};
use super::{SchemaError, Stage};

pub const MAX_QUESTIONS: usize = 5;

/// Role-agnostic questions used when generation fails.
const FALLBACK_QUESTIONS: [&str; MAX_QUESTIONS] = [
    "Walk me through the most technically challenging system you have built. What trade-offs did you make and why?",
    "Describe a time you had to scale a component under growing load. What broke first and how did you address it?",
    "Tell me about an architectural decision you would make differently today. What would you change?",
    "How do you approach diagnosing a production incident in a system you did not write?",
    "Describe how you have balanced delivery speed against long-term maintainability on a recent project.",
];

#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub role: String,
    pub resume_context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<String>,
}

pub struct QuestionStage {
    prompt: PromptFrame,
}

impl QuestionStage {
    pub fn new(prompt: PromptFrame) -> Self {
        Self { prompt }
    }
}

impl Default for QuestionStage {
    fn default() -> Self {
        Self::new(question_frame())
    }
}

impl Stage for QuestionStage {
    type Request = QuestionRequest;
    type Output = QuestionSet;

    const NAME: &'static str = "question";

    fn prompt(&self) -> &PromptFrame {
        &self.prompt
    }

    fn user_content(&self, request: &QuestionRequest) -> Result<String, SchemaError> {
        Ok(self.prompt.render_user(&[
            ("role", request.role.as_str()),
            ("resume_context", request.resume_context.as_str()),
        ]))
    }

    /// Blank entries are dropped; at least one question must remain. Extra
    /// questions beyond five are discarded.
    fn validate(&self, _request: &QuestionRequest, output: QuestionSet) -> Result<QuestionSet, SchemaError> {
        let mut questions: Vec<String> = output
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        if questions.is_empty() {
            return Err(SchemaError::Invalid("no questions were generated".to_string()));
        }
        questions.truncate(MAX_QUESTIONS);
        Ok(QuestionSet { questions })
    }

    fn fallback(&self) -> QuestionSet {
        QuestionSet {
            questions: FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect(),
        }
    }
}
