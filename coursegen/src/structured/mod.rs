//! Structured model invoker: prompt + target schema → validated typed value.
//!
//! The contract is deliberately narrow. The model reply is trimmed, one enclosing
//! markdown code fence is removed if present, and the remainder must deserialize
//! into the target type with `serde_json::from_str`. Anything else is
//! `InvokeError::Parse`; callers recover locally (empty plan, empty partition, ...).

mod invoker;
mod parse;

pub use invoker::StructuredLlm;
pub use parse::{parse_structured, strip_code_fence};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::AgentError;

/// A type the model can be asked to produce.
///
/// `schema()` is a JSON schema (written with `serde_json::json!`) appended to the
/// prompt; deserialization is the only validation.
pub trait StructuredOutput: DeserializeOwned + Send + 'static {
    /// Short name used in prompts and error messages (e.g. `"Plan"`).
    fn type_name() -> &'static str;

    fn schema() -> serde_json::Value;
}

/// Failure of a structured call.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The reply was not a JSON value of the requested shape.
    #[error("could not parse {type_name} from model reply: {reason}")]
    Parse {
        type_name: &'static str,
        reason: String,
    },

    /// The model call itself failed (network, auth, timeout).
    #[error("model call failed: {0}")]
    Model(#[from] AgentError),
}

impl InvokeError {
    pub fn is_parse(&self) -> bool {
        matches!(self, InvokeError::Parse { .. })
    }
}
