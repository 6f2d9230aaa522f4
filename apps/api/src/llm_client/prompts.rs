// Shared prompt fragments.
// Each pipeline stage defines its own prompt frame in pipeline/prompts.rs.
// This file contains cross-cutting fragments appended to every stage.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every stage that reasons over candidate material.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Base every statement strictly on the material provided. \
    Do NOT invent technologies, experience, or claims the candidate did not make. \
    If the material does not support a statement, omit it.";
