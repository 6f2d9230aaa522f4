use serde::{Deserialize, Serialize};

use super::prompts::{audit_frame, PromptFrame};
use super::{check_range, SchemaError, Stage};

#[derive(Debug, Clone, Deserialize)]
pub struct AuditRequest {
    pub question: String,
    pub candidate_answer: String,
    pub resume_context: String,
    /// The evaluation under audit, as produced by the evaluation stage.
    pub evaluation_json: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreConsistency {
    Consistent,
    Inconsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditVerdict {
    #[serde(rename = "Valid Evaluation")]
    ValidEvaluation,
    #[serde(rename = "Potential Hallucination")]
    PotentialHallucination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub grounded: bool,
    pub hallucination_detected: bool,
    pub unsupported_claims: Vec<String>,
    /// 1–10.
    pub reasoning_alignment_score: u8,
    pub score_consistency: ScoreConsistency,
    pub verdict: AuditVerdict,
}

pub struct AuditStage {
    prompt: PromptFrame,
}

impl AuditStage {
    pub fn new(prompt: PromptFrame) -> Self {
        Self { prompt }
    }
}

impl Default for AuditStage {
    fn default() -> Self {
        Self::new(audit_frame())
    }
}

impl Stage for AuditStage {
    type Request = AuditRequest;
    type Output = Audit;

    const NAME: &'static str = "audit";

    fn prompt(&self) -> &PromptFrame {
        &self.prompt
    }

    fn user_content(&self, request: &AuditRequest) -> Result<String, SchemaError> {
        let evaluation_json = serde_json::to_string_pretty(&request.evaluation_json)?;
        Ok(self.prompt.render_user(&[
            ("question", request.question.as_str()),
            ("candidate_answer", request.candidate_answer.as_str()),
            ("resume_context", request.resume_context.as_str()),
            ("evaluation_json", evaluation_json.as_str()),
        ]))
    }

    fn validate(&self, _request: &AuditRequest, output: Audit) -> Result<Audit, SchemaError> {
        check_range("reasoning_alignment_score", output.reasoning_alignment_score, 1, 10)?;
        Ok(output)
    }

    fn fallback(&self) -> Audit {
        Audit {
            grounded: false,
            hallucination_detected: true,
            unsupported_claims: vec!["System error: Could not complete audit".to_string()],
            reasoning_alignment_score: 1,
            score_consistency: ScoreConsistency::Inconsistent,
            verdict: AuditVerdict::PotentialHallucination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> AuditRequest {
        AuditRequest {
            question: "How do you version an API?".to_string(),
            candidate_answer: "URL prefixes plus a deprecation window.".to_string(),
            resume_context: "Maintained a public REST API".to_string(),
            evaluation_json: json!({"final_score": 72, "weaknesses": ["No mention of GraphQL"]}),
        }
    }

    #[test]
    fn test_verdict_uses_spaced_names() {
        let audit: Audit = serde_json::from_str(
            r#"{"grounded":true,"hallucination_detected":false,"unsupported_claims":[],
                "reasoning_alignment_score":8,"score_consistency":"Consistent",
                "verdict":"Valid Evaluation"}"#,
        )
        .unwrap();
        assert_eq!(audit.verdict, AuditVerdict::ValidEvaluation);
        assert_eq!(
            serde_json::to_value(AuditVerdict::PotentialHallucination).unwrap(),
            json!("Potential Hallucination")
        );
    }

    #[test]
    fn test_unknown_enum_value_fails_to_parse() {
        let raw = r#"{"grounded":true,"hallucination_detected":false,"unsupported_claims":[],
            "reasoning_alignment_score":8,"score_consistency":"Mostly",
            "verdict":"Valid Evaluation"}"#;
        assert!(serde_json::from_str::<Audit>(raw).is_err());
    }

    #[test]
    fn test_alignment_score_zero_is_rejected() {
        let mut audit = AuditStage::default().fallback();
        audit.reasoning_alignment_score = 0;
        assert!(AuditStage::default().validate(&request(), audit).is_err());
    }

    #[test]
    fn test_user_content_pretty_prints_evaluation() {
        let content = AuditStage::default().user_content(&request()).unwrap();
        assert!(content.contains("\"final_score\": 72"));
        assert!(content.contains("Candidate Answer:\nURL prefixes"));
    }

    #[test]
    fn test_fallback_flags_hallucination() {
        let fallback = AuditStage::default().fallback();
        assert!(!fallback.grounded);
        assert!(fallback.hallucination_detected);
        assert_eq!(fallback.score_consistency, ScoreConsistency::Inconsistent);
    }
}
