use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::chunking::ChunkingConfig;
use crate::vector_index::DEFAULT_DIMENSION;

/// Which backend aggregates rounds into a hiring decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionBackend {
    Llm,
    Rules,
}

impl FromStr for DecisionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(DecisionBackend::Llm),
            "rules" => Ok(DecisionBackend::Rules),
            other => bail!("DECISION_ENGINE must be 'llm' or 'rules', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means sessions live in process memory.
    pub database_url: Option<String>,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub index_path: PathBuf,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chunking: ChunkingConfig,
    /// Hugging Face `tokenizer.json` for chunk windows; unset uses the regex tokenizer.
    pub tokenizer_path: Option<PathBuf>,
    pub stage_timeout_secs: u64,
    pub decision_backend: DecisionBackend,
    pub prompts_dir: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let chunk_size = parse_env("CHUNK_SIZE", 500usize)?;
        let chunk_overlap = parse_env("CHUNK_OVERLAP", 100usize)?;
        let chunking = ChunkingConfig::new(chunk_size, chunk_overlap)
            .context("CHUNK_SIZE / CHUNK_OVERLAP are inconsistent")?;

        let embedding_dimension = parse_env("EMBEDDING_DIMENSION", DEFAULT_DIMENSION)?;
        if embedding_dimension == 0 {
            bail!("EMBEDDING_DIMENSION must be greater than zero");
        }

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            index_path: optional_env("INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/resume_index.bin")),
            embedding_model: optional_env("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embedding_dimension,
            chunking,
            tokenizer_path: optional_env("TOKENIZER_PATH").map(PathBuf::from),
            stage_timeout_secs: parse_env("STAGE_TIMEOUT_SECS", 60u64)?,
            decision_backend: parse_env("DECISION_ENGINE", DecisionBackend::Llm)?,
            prompts_dir: optional_env("PROMPTS_DIR").map(PathBuf::from),
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} is invalid ({raw:?}): {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_backend_parses_case_insensitively() {
        assert_eq!("LLM".parse::<DecisionBackend>().unwrap(), DecisionBackend::Llm);
        assert_eq!(" rules ".parse::<DecisionBackend>().unwrap(), DecisionBackend::Rules);
        assert!("heuristic".parse::<DecisionBackend>().is_err());
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value = parse_env("INTERVIEW_ENGINE_TEST_UNSET_VAR", 42u64).unwrap();
        assert_eq!(value, 42);
    }
}
