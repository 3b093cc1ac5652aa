//! `$XDG_CONFIG_HOME/<app>/config.toml`: an `[env]` table plus typed `[models]` and
//! `[pipeline]` sections, flattened into env-style keys.
//!
//! ```toml
//! [env]
//! OPENAI_API_KEY = "sk-..."
//!
//! [models]
//! planner = "qwen-plus"
//!
//! [pipeline]
//! max_concurrency = 6
//! step_timeout_secs = 90
//! ```
//!
//! A key set in `[env]` wins over the same key derived from a typed section.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::LoadError;

/// `$XDG_CONFIG_HOME` when set, else the platform config dir.
fn config_home() -> Result<PathBuf, LoadError> {
    match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => dirs::config_dir()
            .ok_or_else(|| LoadError::XdgPath("no config directory for this platform".into())),
    }
}

fn config_path(app_name: &str) -> Result<Option<PathBuf>, LoadError> {
    let path = config_home()?.join(app_name).join("config.toml");
    Ok(path.is_file().then_some(path))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ModelsSection {
    planner: Option<String>,
    executor: Option<String>,
    summarizer: Option<String>,
    writer: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PipelineSection {
    max_concurrency: Option<u64>,
    max_cycles: Option<u64>,
    step_timeout_secs: Option<u64>,
    rag_url: Option<String>,
    rag_mode: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    env: HashMap<String, String>,
    models: ModelsSection,
    pipeline: PipelineSection,
}

impl ConfigFile {
    fn into_env_map(self) -> HashMap<String, String> {
        let m = self.models;
        let p = self.pipeline;
        let typed = [
            ("COURSEGEN_PLANNER_MODEL", m.planner),
            ("COURSEGEN_EXECUTOR_MODEL", m.executor),
            ("COURSEGEN_SUMMARIZER_MODEL", m.summarizer),
            ("COURSEGEN_WRITER_MODEL", m.writer),
            ("COURSEGEN_MAX_CONCURRENCY", p.max_concurrency.map(|v| v.to_string())),
            ("COURSEGEN_MAX_CYCLES", p.max_cycles.map(|v| v.to_string())),
            ("COURSEGEN_STEP_TIMEOUT_SECS", p.step_timeout_secs.map(|v| v.to_string())),
            ("RAG_URL", p.rag_url),
            ("COURSEGEN_RAG_MODE", p.rag_mode),
        ];
        let mut out: HashMap<String, String> = typed
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect();
        out.extend(self.env);
        out
    }
}

/// Env-style key/value pairs from the app's config file. No file → empty map.
pub fn load_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = config_path(app_name)? else {
        return Ok(HashMap::new());
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let file: ConfigFile = toml::from_str(&content)?;
    Ok(file.into_env_map())
}
