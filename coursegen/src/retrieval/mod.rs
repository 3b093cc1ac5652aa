//! Retrieval collaborator: query a knowledge base, get grounded text back.
//!
//! The pipelines only see the `Retriever` trait. `LightRagRetriever` talks to a
//! LightRAG server over HTTP; `MockRetriever` serves canned answers in tests.

mod lightrag;
mod mock;

pub use lightrag::{LightRagRetriever, DEFAULT_RAG_URL};
pub use mock::MockRetriever;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

/// Retrieval strategy understood by the knowledge-base service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Context-dependent entities around the query.
    Local,
    /// Global knowledge across the corpus.
    Global,
    /// Local and global combined.
    Hybrid,
    /// Plain vector search.
    Naive,
    /// Knowledge graph plus vector retrieval.
    #[default]
    Mix,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Local => "local",
            RetrievalMode::Global => "global",
            RetrievalMode::Hybrid => "hybrid",
            RetrievalMode::Naive => "naive",
            RetrievalMode::Mix => "mix",
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "global" => Ok(Self::Global),
            "hybrid" => Ok(Self::Hybrid),
            "naive" => Ok(Self::Naive),
            "mix" => Ok(Self::Mix),
            _ => Err(format!(
                "unknown retrieval mode: {} (use local, global, hybrid, naive, or mix)",
                s
            )),
        }
    }
}

/// Retrieval failure.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Connection, timeout or body read failure.
    #[error("retrieval transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("retrieval service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Knowledge-base query capability.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, mode: RetrievalMode) -> Result<String, RetrievalError>;
}
