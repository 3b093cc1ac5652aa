//! Prompt templates loaded from YAML files by directory.
//!
//! Default text lives in `coursegen/prompts/*.yaml` and is embedded at compile
//! time. A prompts directory (argument or `PROMPTS_DIR`) may override any subset
//! of keys; missing keys keep the embedded defaults. See [`load`] and [`render`].

mod load;

use serde::Deserialize;

pub use load::{default_from_embedded, load, load_or_default, LoadError};

/// `{name}` accessors returning the template text, empty when unset.
macro_rules! template_getters {
    ($($field:ident),+ $(,)?) => {
        $(
            pub fn $field(&self) -> &str {
                self.$field.as_deref().unwrap_or_default()
            }
        )+

        /// Keys set in `self` win; unset keys are taken from `base`.
        pub fn overlay(self, base: Self) -> Self {
            Self {
                $($field: self.$field.or(base.$field),)+
            }
        }
    };
}

/// Shape of `prompts/plan_execute.yaml`. All keys optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PlanExecutePromptsFile {
    pub lesson_planner: Option<String>,
    pub experiment_planner: Option<String>,
    pub classifier: Option<String>,
    pub lesson_executor_system: Option<String>,
    pub experiment_executor_system: Option<String>,
    pub executor_task: Option<String>,
    pub summarizer: Option<String>,
    pub replanner: Option<String>,
    pub writer: Option<String>,
}

impl PlanExecutePromptsFile {
    template_getters!(
        lesson_planner,
        experiment_planner,
        classifier,
        lesson_executor_system,
        experiment_executor_system,
        executor_task,
        summarizer,
        replanner,
        writer,
    );
}

/// Shape of `prompts/syllabus.yaml`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SyllabusPromptsFile {
    pub parse: Option<String>,
    pub explain: Option<String>,
    pub allocate_time: Option<String>,
    pub polish: Option<String>,
}

impl SyllabusPromptsFile {
    template_getters!(parse, explain, allocate_time, polish);
}

/// Shape of `prompts/outline.yaml`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct OutlinePromptsFile {
    pub extract: Option<String>,
}

impl OutlinePromptsFile {
    template_getters!(extract);
}

/// Shape of `prompts/quiz.yaml`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct QuizPromptsFile {
    pub planner: Option<String>,
    pub question: Option<String>,
}

impl QuizPromptsFile {
    template_getters!(planner, question);
}

/// Shape of `prompts/grading.yaml`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct GradingPromptsFile {
    pub review: Option<String>,
    pub report: Option<String>,
}

impl GradingPromptsFile {
    template_getters!(review, report);
}

/// All prompt templates used by the pipelines.
#[derive(Clone, Debug, Default)]
pub struct Prompts {
    pub plan_execute: PlanExecutePromptsFile,
    pub syllabus: SyllabusPromptsFile,
    pub outline: OutlinePromptsFile,
    pub quiz: QuizPromptsFile,
    pub grading: GradingPromptsFile,
}

/// Fills `{key}` placeholders. Placeholders without a value are left untouched.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}
