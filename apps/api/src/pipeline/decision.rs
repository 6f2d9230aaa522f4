//! Decision: aggregates per-round evaluations into one hiring recommendation.
//!
//! Two backends implement [`DecisionEngine`]: the LLM-driven stage and a
//! deterministic rule aggregator. Both guarantee that a decision over any round
//! with a detected hallucination carries `hallucination_risk_flag = true` and a
//! confidence below `High`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::prompts::{decision_frame, PromptFrame};
use super::{Confidence, SchemaError, Stage, StageOutcome, StageRunner};

// ────────────────────────────────────────────────────────────────────────────
// Input
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundAudit {
    pub hallucination_detected: bool,
    pub reasoning_alignment_score: u8,
    pub score_consistency: String,
}

/// One evaluated question, as submitted to the decision stage and stored per
/// session round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEvaluation {
    pub scores: BTreeMap<String, i64>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    pub final_score: u32,
    pub audit: RoundAudit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub role: String,
    pub rounds: Vec<RoundEvaluation>,
}

impl DecisionRequest {
    pub fn any_hallucination(&self) -> bool {
        self.rounds.iter().any(|r| r.audit.hallucination_detected)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HireRecommendation {
    #[serde(rename = "No Hire")]
    NoHire,
    #[serde(rename = "Leaning No Hire")]
    LeaningNoHire,
    #[serde(rename = "Leaning Hire")]
    LeaningHire,
    #[serde(rename = "Hire")]
    Hire,
    #[serde(rename = "Strong Hire")]
    StrongHire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub overall_average: f64,
    pub consistency_trend: String,
    pub recurring_weaknesses: Vec<String>,
    pub dominant_strengths: Vec<String>,
    pub hallucination_risk_flag: bool,
    pub overall_confidence: Confidence,
    pub hire_recommendation: HireRecommendation,
    pub justification: String,
}

pub fn fallback_decision() -> Decision {
    Decision {
        overall_average: 0.0,
        consistency_trend: "Unknown".to_string(),
        recurring_weaknesses: vec!["Could not evaluate structure".to_string()],
        dominant_strengths: vec![],
        hallucination_risk_flag: true,
        overall_confidence: Confidence::Low,
        hire_recommendation: HireRecommendation::NoHire,
        justification: "System error: Could not complete decision aggregation.".to_string(),
    }
}

/// Forces the risk flag and lowers `High` confidence when any round was flagged.
pub fn enforce_hallucination_policy(request: &DecisionRequest, mut decision: Decision) -> Decision {
    if request.any_hallucination() {
        decision.hallucination_risk_flag = true;
        if decision.overall_confidence == Confidence::High {
            decision.overall_confidence = Confidence::Medium;
        }
    }
    decision
}

// ────────────────────────────────────────────────────────────────────────────
// Engines
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap the aggregation backend without touching handlers.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> StageOutcome<Decision>;

    fn backend(&self) -> &'static str;
}

pub struct DecisionStage {
    prompt: PromptFrame,
}

impl DecisionStage {
    pub fn new(prompt: PromptFrame) -> Self {
        Self { prompt }
    }
}

impl Default for DecisionStage {
    fn default() -> Self {
        Self::new(decision_frame())
    }
}

impl Stage for DecisionStage {
    type Request = DecisionRequest;
    type Output = Decision;

    const NAME: &'static str = "decision";

    fn prompt(&self) -> &PromptFrame {
        &self.prompt
    }

    fn user_content(&self, request: &DecisionRequest) -> Result<String, SchemaError> {
        let rounds_json = serde_json::to_string_pretty(&request.rounds)?;
        Ok(self.prompt.render_user(&[
            ("role", request.role.as_str()),
            ("rounds_json", rounds_json.as_str()),
        ]))
    }

    fn validate(&self, request: &DecisionRequest, output: Decision) -> Result<Decision, SchemaError> {
        if !output.overall_average.is_finite()
            || !(0.0..=10.0).contains(&output.overall_average)
        {
            return Err(SchemaError::Invalid(format!(
                "overall_average = {} is outside 0.0..=10.0",
                output.overall_average
            )));
        }
        Ok(enforce_hallucination_policy(request, output))
    }

    fn fallback(&self) -> Decision {
        fallback_decision()
    }
}

/// Runs the decision stage through the generation gateway.
pub struct LlmDecisionEngine {
    runner: StageRunner,
    stage: DecisionStage,
}

impl LlmDecisionEngine {
    pub fn new(runner: StageRunner) -> Self {
        Self {
            runner,
            stage: DecisionStage::default(),
        }
    }

    pub fn with_stage(mut self, stage: DecisionStage) -> Self {
        self.stage = stage;
        self
    }
}

#[async_trait]
impl DecisionEngine for LlmDecisionEngine {
    async fn decide(&self, request: &DecisionRequest) -> StageOutcome<Decision> {
        self.runner.run(&self.stage, request).await
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

/// Spread (on the 0–10 scale) at or below which rounds count as stable.
const STABLE_SPREAD: f64 = 1.5;

/// Deterministic aggregation over the structured round data. Never calls a gateway.
pub struct RuleDecisionEngine;

#[async_trait]
impl DecisionEngine for RuleDecisionEngine {
    async fn decide(&self, request: &DecisionRequest) -> StageOutcome<Decision> {
        if request.rounds.is_empty() {
            info!("Rule decision engine received no rounds; returning fallback");
            return StageOutcome::Fallback(fallback_decision());
        }
        StageOutcome::Validated(aggregate(request))
    }

    fn backend(&self) -> &'static str {
        "rules"
    }
}

fn aggregate(request: &DecisionRequest) -> Decision {
    let rounds = &request.rounds;
    let scores: Vec<f64> = rounds
        .iter()
        .map(|r| (f64::from(r.final_score) / 10.0).clamp(0.0, 10.0))
        .collect();
    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    let overall_average = (average * 10.0).round() / 10.0;

    let flagged = rounds.iter().filter(|r| r.audit.hallucination_detected).count();
    let inconsistent = rounds
        .iter()
        .filter(|r| r.audit.score_consistency.eq_ignore_ascii_case("Inconsistent"))
        .count();

    let overall_confidence = if flagged * 2 > rounds.len() {
        Confidence::Low
    } else if flagged > 0 || inconsistent > 0 || rounds.len() < 3 {
        Confidence::Medium
    } else {
        Confidence::High
    };

    let mut hire_recommendation = recommendation_band(overall_average);
    if flagged > 0 {
        hire_recommendation = hire_recommendation.min(HireRecommendation::LeaningHire);
    }

    let consistency_trend = trend(&scores).to_string();
    let recurring_weaknesses = recurring(rounds.iter().map(|r| r.weaknesses.as_slice()));
    let dominant_strengths = recurring(rounds.iter().map(|r| r.strengths.as_slice()));

    let justification = format!(
        "Average {overall_average:.1}/10 across {} round(s) for {}; trend {}. \
         {} round(s) flagged for hallucination, {} inconsistent.",
        rounds.len(),
        request.role,
        consistency_trend.to_lowercase(),
        flagged,
        inconsistent
    );

    enforce_hallucination_policy(
        request,
        Decision {
            overall_average,
            consistency_trend,
            recurring_weaknesses,
            dominant_strengths,
            hallucination_risk_flag: flagged > 0,
            overall_confidence,
            hire_recommendation,
            justification,
        },
    )
}

fn recommendation_band(average: f64) -> HireRecommendation {
    match average {
        a if a >= 8.5 => HireRecommendation::StrongHire,
        a if a >= 7.0 => HireRecommendation::Hire,
        a if a >= 6.0 => HireRecommendation::LeaningHire,
        a if a >= 4.5 => HireRecommendation::LeaningNoHire,
        _ => HireRecommendation::NoHire,
    }
}

fn trend(scores: &[f64]) -> &'static str {
    let max = scores.iter().copied().fold(f64::MIN, f64::max);
    let min = scores.iter().copied().fold(f64::MAX, f64::min);
    if max - min <= STABLE_SPREAD {
        "Stable"
    } else if scores.windows(2).all(|w| w[0] <= w[1]) {
        "Improving"
    } else if scores.windows(2).all(|w| w[0] >= w[1]) {
        "Declining"
    } else {
        "Variable"
    }
}

/// Items (case-insensitive, trimmed) appearing in at least two rounds, or every
/// item when there is a single round. Most frequent first, then first seen.
fn recurring<'a>(per_round: impl Iterator<Item = &'a [String]>) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize, &'a str)> = HashMap::new();
    let mut rounds = 0;
    let mut seen = 0;

    for items in per_round {
        rounds += 1;
        let mut in_this_round = Vec::new();
        for item in items {
            let key = item.trim().to_lowercase();
            if key.is_empty() || in_this_round.contains(&key) {
                continue;
            }
            let entry = counts.entry(key.clone()).or_insert_with(|| {
                seen += 1;
                (0, seen, item.trim())
            });
            entry.0 += 1;
            in_this_round.push(key);
        }
    }

    let threshold = if rounds == 1 { 1 } else { 2 };
    let mut kept: Vec<(usize, usize, &str)> = counts
        .into_values()
        .filter(|(count, _, _)| *count >= threshold)
        .collect();
    kept.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    kept.into_iter().map(|(_, _, text)| text.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::fakes::ScriptedGateway;
    use std::sync::Arc;
    use std::time::Duration;

    fn round(final_score: u32, hallucination: bool, weaknesses: &[&str]) -> RoundEvaluation {
        RoundEvaluation {
            scores: BTreeMap::from([("technical_depth".to_string(), i64::from(final_score / 10))]),
            strengths: vec!["Clear communication".to_string()],
            weaknesses: weaknesses.iter().map(|w| w.to_string()).collect(),
            final_score,
            audit: RoundAudit {
                hallucination_detected: hallucination,
                reasoning_alignment_score: 8,
                score_consistency: "Consistent".to_string(),
            },
        }
    }

    fn request(rounds: Vec<RoundEvaluation>) -> DecisionRequest {
        DecisionRequest {
            role: "Platform Engineer".to_string(),
            rounds,
        }
    }

    const CONFIDENT_HIRE: &str = r#"{
        "overall_average": 8.7,
        "consistency_trend": "Stable",
        "recurring_weaknesses": [],
        "dominant_strengths": ["Depth"],
        "hallucination_risk_flag": false,
        "overall_confidence": "High",
        "hire_recommendation": "Strong Hire",
        "justification": "Consistently strong."
    }"#;

    #[tokio::test]
    async fn test_llm_engine_enforces_policy_over_model_output() {
        let gateway = Arc::new(ScriptedGateway::replying(&[CONFIDENT_HIRE]));
        let engine = LlmDecisionEngine::new(StageRunner::new(gateway, Duration::from_secs(5)));

        let outcome = engine
            .decide(&request(vec![round(90, false, &[]), round(85, true, &[])]))
            .await;

        let StageOutcome::Validated(decision) = outcome else {
            panic!("decision should validate");
        };
        assert!(decision.hallucination_risk_flag);
        assert_eq!(decision.overall_confidence, Confidence::Medium);
        assert_eq!(decision.hire_recommendation, HireRecommendation::StrongHire);
    }

    #[tokio::test]
    async fn test_llm_engine_keeps_clean_decision() {
        let gateway = Arc::new(ScriptedGateway::replying(&[CONFIDENT_HIRE]));
        let engine = LlmDecisionEngine::new(StageRunner::new(gateway, Duration::from_secs(5)));
        let outcome = engine.decide(&request(vec![round(90, false, &[])])).await;
        assert!(!outcome.value().hallucination_risk_flag);
        assert_eq!(outcome.value().overall_confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_llm_engine_rejects_out_of_range_average() {
        let raw = CONFIDENT_HIRE.replace("8.7", "12.0");
        let gateway = Arc::new(ScriptedGateway::replying(&[raw.as_str()]));
        let engine = LlmDecisionEngine::new(StageRunner::new(gateway, Duration::from_secs(5)));
        let outcome = engine.decide(&request(vec![round(90, false, &[])])).await;
        assert_eq!(outcome, StageOutcome::Fallback(fallback_decision()));
    }

    #[tokio::test]
    async fn test_decision_prompt_carries_rounds() {
        let gateway = Arc::new(ScriptedGateway::replying(&[CONFIDENT_HIRE]));
        let engine =
            LlmDecisionEngine::new(StageRunner::new(gateway.clone(), Duration::from_secs(5)));
        engine.decide(&request(vec![round(64, false, &["Vague"])])).await;

        let calls = gateway.calls.lock().unwrap();
        assert!(calls[0].1.starts_with("Role: Platform Engineer"));
        assert!(calls[0].1.contains("\"final_score\": 64"));
    }

    #[tokio::test]
    async fn test_rule_engine_with_no_rounds_falls_back() {
        let outcome = RuleDecisionEngine.decide(&request(vec![])).await;
        assert!(outcome.is_fallback());
        assert_eq!(outcome.into_inner(), fallback_decision());
    }

    #[tokio::test]
    async fn test_rule_engine_aggregates_clean_rounds() {
        let rounds = vec![
            round(82, false, &["Skipped failure modes"]),
            round(88, false, &["skipped failure modes "]),
            round(85, false, &["Terse"]),
        ];
        let decision = RuleDecisionEngine.decide(&request(rounds)).await.into_inner();

        assert_eq!(decision.overall_average, 8.5);
        assert_eq!(decision.consistency_trend, "Stable");
        assert_eq!(decision.recurring_weaknesses, vec!["Skipped failure modes"]);
        assert_eq!(decision.dominant_strengths, vec!["Clear communication"]);
        assert!(!decision.hallucination_risk_flag);
        assert_eq!(decision.overall_confidence, Confidence::High);
        assert_eq!(decision.hire_recommendation, HireRecommendation::StrongHire);
    }

    #[tokio::test]
    async fn test_rule_engine_caps_flagged_candidates() {
        let rounds = vec![round(95, false, &[]), round(92, true, &[]), round(94, false, &[])];
        let decision = RuleDecisionEngine.decide(&request(rounds)).await.into_inner();

        assert!(decision.hallucination_risk_flag);
        assert_eq!(decision.overall_confidence, Confidence::Medium);
        assert_eq!(decision.hire_recommendation, HireRecommendation::LeaningHire);
    }

    #[tokio::test]
    async fn test_rule_engine_majority_flagged_is_low_confidence() {
        let rounds = vec![round(50, true, &[]), round(40, true, &[]), round(60, false, &[])];
        let decision = RuleDecisionEngine.decide(&request(rounds)).await.into_inner();
        assert_eq!(decision.overall_confidence, Confidence::Low);
        assert_eq!(decision.hire_recommendation, HireRecommendation::LeaningNoHire);
    }

    #[test]
    fn test_trend_directions() {
        assert_eq!(trend(&[5.0, 6.0, 8.0]), "Improving");
        assert_eq!(trend(&[9.0, 7.0, 4.0]), "Declining");
        assert_eq!(trend(&[3.0, 9.0, 4.0]), "Variable");
        assert_eq!(trend(&[7.0]), "Stable");
    }

    #[test]
    fn test_recommendation_uses_spaced_names() {
        assert_eq!(
            serde_json::to_value(HireRecommendation::LeaningNoHire).unwrap(),
            serde_json::json!("Leaning No Hire")
        );
    }

    #[test]
    fn test_round_evaluation_defaults_missing_lists() {
        let round: RoundEvaluation = serde_json::from_str(
            r#"{"scores":{"technical_depth":7},"final_score":70,
                "audit":{"hallucination_detected":false,"reasoning_alignment_score":9,
                "score_consistency":"Consistent"}}"#,
        )
        .unwrap();
        assert!(round.weaknesses.is_empty());
        assert!(round.strengths.is_empty());
    }
}
