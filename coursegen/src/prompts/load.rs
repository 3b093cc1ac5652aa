//! Load prompts from a directory of YAML files, falling back to the embedded defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{
    GradingPromptsFile, OutlinePromptsFile, PlanExecutePromptsFile, Prompts, QuizPromptsFile,
    SyllabusPromptsFile,
};

/// Embedded default YAML (canonical source: `coursegen/prompts/*.yaml`).
macro_rules! embed_prompt_yaml {
    ($name:literal) => {
        include_str!(concat!("../../prompts/", $name))
    };
}
const EMBED_PLAN_EXECUTE: &str = embed_prompt_yaml!("plan_execute.yaml");
const EMBED_SYLLABUS: &str = embed_prompt_yaml!("syllabus.yaml");
const EMBED_OUTLINE: &str = embed_prompt_yaml!("outline.yaml");
const EMBED_QUIZ: &str = embed_prompt_yaml!("quiz.yaml");
const EMBED_GRADING: &str = embed_prompt_yaml!("grading.yaml");

const PLAN_EXECUTE_FILE: &str = "plan_execute.yaml";
const SYLLABUS_FILE: &str = "syllabus.yaml";
const OUTLINE_FILE: &str = "outline.yaml";
const QUIZ_FILE: &str = "quiz.yaml";
const GRADING_FILE: &str = "grading.yaml";

/// Default directory name when `PROMPTS_DIR` is not set.
const DEFAULT_PROMPTS_DIR: &str = "prompts";

/// Error when loading prompts from a directory (missing dir, invalid YAML).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("prompts directory not found or not readable: {0}")]
    DirNotFound(String),
    #[error("failed to read prompts file {path}: {message}")]
    ReadFile { path: String, message: String },
    #[error("failed to parse YAML in {path}: {message}")]
    ParseYaml { path: String, message: String },
}

fn prompts_dir(dir: Option<&Path>) -> PathBuf {
    dir.map(PathBuf::from).unwrap_or_else(|| {
        std::env::var("PROMPTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PROMPTS_DIR))
    })
}

fn read_yaml_file<T>(dir: &Path, name: &str) -> Result<Option<T>, LoadError>
where
    T: for<'de> Deserialize<'de>,
{
    let path = dir.join(name);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(LoadError::ReadFile {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };
    let value: T = serde_yaml::from_str(&content).map_err(|e| LoadError::ParseYaml {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(value))
}

/// Loads prompts from a directory, overlaying each file on the embedded defaults.
///
/// If `dir` is `None`, uses `PROMPTS_DIR` env or `./prompts`. Missing files and keys
/// keep the defaults. Fails when the directory is missing or a present file does not parse.
pub fn load(dir: Option<&Path>) -> Result<Prompts, LoadError> {
    let base = prompts_dir(dir);
    if !base.is_dir() {
        return Err(LoadError::DirNotFound(base.display().to_string()));
    }
    let defaults = default_from_embedded();

    let plan_execute = read_yaml_file::<PlanExecutePromptsFile>(&base, PLAN_EXECUTE_FILE)?
        .map(|f| f.overlay(defaults.plan_execute.clone()))
        .unwrap_or(defaults.plan_execute);
    let syllabus = read_yaml_file::<SyllabusPromptsFile>(&base, SYLLABUS_FILE)?
        .map(|f| f.overlay(defaults.syllabus.clone()))
        .unwrap_or(defaults.syllabus);
    let outline = read_yaml_file::<OutlinePromptsFile>(&base, OUTLINE_FILE)?
        .map(|f| f.overlay(defaults.outline.clone()))
        .unwrap_or(defaults.outline);
    let quiz = read_yaml_file::<QuizPromptsFile>(&base, QUIZ_FILE)?
        .map(|f| f.overlay(defaults.quiz.clone()))
        .unwrap_or(defaults.quiz);
    let grading = read_yaml_file::<GradingPromptsFile>(&base, GRADING_FILE)?
        .map(|f| f.overlay(defaults.grading.clone()))
        .unwrap_or(defaults.grading);

    tracing::debug!(dir = %base.display(), "loaded prompts directory");
    Ok(Prompts {
        plan_execute,
        syllabus,
        outline,
        quiz,
        grading,
    })
}

/// Default prompts parsed from the embedded YAML.
pub fn default_from_embedded() -> Prompts {
    Prompts {
        plan_execute: serde_yaml::from_str(EMBED_PLAN_EXECUTE).unwrap_or_default(),
        syllabus: serde_yaml::from_str(EMBED_SYLLABUS).unwrap_or_default(),
        outline: serde_yaml::from_str(EMBED_OUTLINE).unwrap_or_default(),
        quiz: serde_yaml::from_str(EMBED_QUIZ).unwrap_or_default(),
        grading: serde_yaml::from_str(EMBED_GRADING).unwrap_or_default(),
    }
}

/// Loads prompts from `dir` when it exists; otherwise the embedded defaults.
pub fn load_or_default(dir: Option<&Path>) -> Prompts {
    match load(dir) {
        Ok(p) => p,
        Err(LoadError::DirNotFound(_)) => default_from_embedded(),
        Err(e) => {
            tracing::warn!(error = %e, "invalid prompts directory, using embedded defaults");
            default_from_embedded()
        }
    }
}
