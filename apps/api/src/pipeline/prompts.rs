// Prompt frames for the four pipeline stages.
// Reuses cross-cutting fragments from llm_client::prompts.

use std::io;
use std::path::Path;

use tracing::info;

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION};

/// A system instruction plus a user template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFrame {
    pub system: String,
    pub user_template: String,
}

impl PromptFrame {
    pub fn new(system: impl Into<String>, user_template: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user_template: user_template.into(),
        }
    }

    /// The stage system prompt followed by the JSON-only rule.
    pub fn system_prompt(&self) -> String {
        format!("{}\n\n{}", self.system.trim_end(), JSON_ONLY_SYSTEM)
    }

    /// Substitutes `{name}` placeholders in a single pass.
    ///
    /// Substituted values are never rescanned, so candidate text containing braces
    /// is passed through verbatim. Unknown placeholders are left as-is.
    pub fn render_user(&self, vars: &[(&str, &str)]) -> String {
        let template = self.user_template.as_str();
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let replacement = after.find('}').and_then(|close| {
                let name = &after[..close];
                vars.iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (*value, close))
            });
            match replacement {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Replaces the system or user part from `<dir>/<stage>.system.txt` and
    /// `<dir>/<stage>.user.txt` when those files exist.
    pub fn with_overrides_from(mut self, dir: &Path, stage: &str) -> io::Result<Self> {
        if let Some(system) = read_optional(&dir.join(format!("{stage}.system.txt")))? {
            info!("Loaded {} system prompt override from {}", stage, dir.display());
            self.system = system;
        }
        if let Some(user) = read_optional(&dir.join(format!("{stage}.user.txt")))? {
            info!("Loaded {} user prompt override from {}", stage, dir.display());
            self.user_template = user;
        }
        Ok(self)
    }
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Question generation
// ────────────────────────────────────────────────────────────────────────────

pub const QUESTION_SYSTEM: &str = r#"You are an expert technical interviewer and senior engineering manager.
Your task is to generate exactly 5 advanced, highly technical interview questions for a candidate.

CRITICAL REQUIREMENTS:
1. Questions MUST be directly based on the provided resume context.
2. Focus heavily on trade-offs, system design, scaling, and architectural decisions.
3. DO NOT ask generic questions like "What are your strengths?" or basic definition questions.
4. Adapt the difficulty to assume a senior/experienced candidate if the resume reflects it.
5. Return a JSON object with this EXACT schema:
{
  "questions": [
    "Question 1...",
    "Question 2...",
    "Question 3...",
    "Question 4...",
    "Question 5..."
  ]
}"#;

/// Placeholders: `{role}`, `{resume_context}`.
pub const QUESTION_USER_TEMPLATE: &str = "Role: {role}

Candidate Resume Context:
{resume_context}

Generate the 5 interview questions based on the requirements.";

// ────────────────────────────────────────────────────────────────────────────
// Answer evaluation
// ────────────────────────────────────────────────────────────────────────────

pub const EVALUATION_SYSTEM: &str = r#"You are an expert technical interviewer and senior engineering manager evaluating a candidate's answer.

You will be provided with:
1. The Question asked
2. The Candidate's Resume Context
3. The Candidate's Answer

Critically evaluate the answer.

EVALUATION CRITERIA:
- Penalize vague, buzzword-heavy, or non-technical answers heavily.
- Reward deep technical discussion, especially trade-offs, scaling, and architectural decisions.
- Detect whether the candidate missed the core technical depth the question required.
- Compare the answer to what the resume context implies (a senior engineer should give a senior-level answer).

Return a JSON object with this EXACT schema:
{
  "scores": {
    "conceptual_clarity": <int 0-10>,
    "technical_depth": <int 0-10>,
    "real_world_application": <int 0-10>,
    "communication_precision": <int 0-10>
  },
  "confidence_level": "<Low | Medium | High>",
  "strengths": ["<strength>"],
  "weaknesses": ["<weakness>"],
  "improvement_suggestions": ["<suggestion>"],
  "final_score": <int 0-100>
}"#;

/// Placeholders: `{question}`, `{resume_context}`, `{answer}`.
pub const EVALUATION_USER_TEMPLATE: &str = "Question:
{question}

Candidate Resume Context:
{resume_context}

Candidate Answer:
{answer}

Evaluate the candidate's answer based on the criteria.";

// ────────────────────────────────────────────────────────────────────────────
// Evaluation audit
// ────────────────────────────────────────────────────────────────────────────

pub const AUDIT_SYSTEM: &str = r#"You are a strict AI evaluation auditor.

Verify whether an AI-generated interview evaluation is logically grounded in:
1) The candidate's actual answer
2) The resume context
3) The interview question

Detect:
- Fabricated criticism or unmentioned technologies
- Unsupported assumptions
- Claims not present in the answer
- Misinterpretation of technical content
- Over-penalization without justification

Do NOT re-evaluate the answer. ONLY validate whether the evaluation is justified and grounded.

AUDIT INSTRUCTIONS:
1. Check that every weakness is supported by the answer.
2. Check that every strength is justified by the answer.
3. Ensure no fabricated claims appear (criticizing a missing skill the question never asked about, or inventing claims the candidate made).
4. Verify that the scores are consistent with the reasoning.
5. Detect exaggerated criticism.

Return a JSON object with this EXACT schema:
{
  "grounded": <true/false>,
  "hallucination_detected": <true/false>,
  "unsupported_claims": ["<claim>"],
  "reasoning_alignment_score": <int 1-10>,
  "score_consistency": "<Consistent | Inconsistent>",
  "verdict": "<Valid Evaluation | Potential Hallucination>"
}"#;

/// Placeholders: `{question}`, `{candidate_answer}`, `{resume_context}`,
/// `{evaluation_json}` (pretty-printed).
pub const AUDIT_USER_TEMPLATE: &str = "Question:
{question}

Candidate Answer:
{candidate_answer}

Resume Context:
{resume_context}

Evaluation Output:
{evaluation_json}

Evaluate the integrity of the evaluation based on the instructions.";

// ────────────────────────────────────────────────────────────────────────────
// Hiring decision
// ────────────────────────────────────────────────────────────────────────────

pub const DECISION_SYSTEM: &str = r#"You are a senior AI interview decision engine.
Aggregate multiple interview question evaluations into a final structured hiring decision.

You will receive:
- The interview role
- Multiple Q&A rounds
- Structured evaluation scores for each round
- Hallucination audit results for each evaluation

YOUR TASKS:
1. Compute overall performance trends based purely on the structured data provided.
2. Detect recurring weaknesses across the rounds.
3. Detect dominant strengths.
4. Penalize evaluations flagged as hallucinated or inconsistent.
   If ANY round has hallucination_detected == true, you MUST set hallucination_risk_flag = true and lower overall_confidence.
5. Assess consistency across answers ("Stable", "Variable", "Improving", "Declining").
6. Produce a final hiring recommendation.

You must NOT generate new critique. ONLY aggregate and reason over the provided structured data.

Return a JSON object with this EXACT schema:
{
  "overall_average": <float 0.0-10.0>,
  "consistency_trend": "<string>",
  "recurring_weaknesses": ["<weakness>"],
  "dominant_strengths": ["<strength>"],
  "hallucination_risk_flag": <true/false>,
  "overall_confidence": "<Low | Medium | High>",
  "hire_recommendation": "<Strong Hire | Hire | Leaning Hire | Leaning No Hire | No Hire>",
  "justification": "<brief justification>"
}"#;

/// Placeholders: `{role}`, `{rounds_json}` (pretty-printed).
pub const DECISION_USER_TEMPLATE: &str = "Role: {role}

Rounds Data:
{rounds_json}

Compute the final hiring recommendation based on the instructions.";

pub fn question_frame() -> PromptFrame {
    PromptFrame::new(QUESTION_SYSTEM, QUESTION_USER_TEMPLATE)
}

pub fn evaluation_frame() -> PromptFrame {
    PromptFrame::new(
        format!("{EVALUATION_SYSTEM}\n\n{NO_FABRICATION_INSTRUCTION}"),
        EVALUATION_USER_TEMPLATE,
    )
}

pub fn audit_frame() -> PromptFrame {
    PromptFrame::new(AUDIT_SYSTEM, AUDIT_USER_TEMPLATE)
}

pub fn decision_frame() -> PromptFrame {
    PromptFrame::new(
        format!("{DECISION_SYSTEM}\n\n{NO_FABRICATION_INSTRUCTION}"),
        DECISION_USER_TEMPLATE,
    )
}
