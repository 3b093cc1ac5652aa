//! Typed runtime settings read from the (already merged) environment.

use std::time::Duration;

use crate::LoadError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_CYCLES: usize = 8;
pub const DEFAULT_RAG_MODE: &str = "mix";

/// Everything the CLI needs to build clients and runners.
///
/// Built once at process start; runners receive clients, never this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `OPENAI_API_KEY`, else `DASH_SCOPE_API_KEY`.
    pub api_key: Option<String>,
    /// `OPENAI_BASE_URL`, else `DASH_SCOPE_API_URL`.
    pub base_url: Option<String>,
    pub planner_model: String,
    pub executor_model: String,
    pub summarizer_model: String,
    pub writer_model: String,
    /// LightRAG server; retrieval is off when unset.
    pub rag_url: Option<String>,
    pub rag_mode: String,
    pub max_concurrency: usize,
    pub max_cycles: usize,
    pub step_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            planner_model: DEFAULT_MODEL.to_string(),
            executor_model: DEFAULT_MODEL.to_string(),
            summarizer_model: DEFAULT_MODEL.to_string(),
            writer_model: DEFAULT_MODEL.to_string(),
            rag_url: None,
            rag_mode: DEFAULT_RAG_MODE.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_cycles: DEFAULT_MAX_CYCLES,
            step_timeout: None,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment. Call after `load_and_apply`.
    pub fn from_env() -> Result<Self, LoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoadError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let model = |key: &str, fallback: &str| get(key).unwrap_or_else(|| fallback.to_string());

        let step_timeout = match get("COURSEGEN_STEP_TIMEOUT_SECS") {
            Some(raw) => match parse_number::<u64>("COURSEGEN_STEP_TIMEOUT_SECS", &raw)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            None => None,
        };

        Ok(Self {
            api_key: get("OPENAI_API_KEY").or_else(|| get("DASH_SCOPE_API_KEY")),
            base_url: get("OPENAI_BASE_URL").or_else(|| get("DASH_SCOPE_API_URL")),
            planner_model: model("COURSEGEN_PLANNER_MODEL", &defaults.planner_model),
            executor_model: model("COURSEGEN_EXECUTOR_MODEL", &defaults.executor_model),
            summarizer_model: model("COURSEGEN_SUMMARIZER_MODEL", &defaults.summarizer_model),
            writer_model: model("COURSEGEN_WRITER_MODEL", &defaults.writer_model),
            rag_url: get("RAG_URL"),
            rag_mode: get("COURSEGEN_RAG_MODE").unwrap_or(defaults.rag_mode),
            max_concurrency: match get("COURSEGEN_MAX_CONCURRENCY") {
                Some(raw) => positive("COURSEGEN_MAX_CONCURRENCY", &raw)?,
                None => defaults.max_concurrency,
            },
            max_cycles: match get("COURSEGEN_MAX_CYCLES") {
                Some(raw) => parse_number("COURSEGEN_MAX_CYCLES", &raw)?,
                None => defaults.max_cycles,
            },
            step_timeout,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, LoadError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| LoadError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn positive(key: &str, raw: &str) -> Result<usize, LoadError> {
    match parse_number::<usize>(key, raw)? {
        0 => Err(LoadError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "must be at least 1".to_string(),
        }),
        n => Ok(n),
    }
}
