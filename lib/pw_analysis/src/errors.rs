//! Analysis errors definition.

use regex::Error as RegexError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A graph construction invariant does not hold, this is a defect in
    /// the analysis itself and not in the analyzed program.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// A statement known to be a call has not been registered in the call graph.
    #[error("callsite not found for statement: {0}")]
    CallSiteNotFound(String),

    #[error("context id not found: {0}")]
    ContextNotFound(usize),

    /// Malformed analysis configuration, reported before any run.
    #[error("bad configuration: {0}")]
    Config(String),

    #[error("malformed program description: {0}")]
    Program(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    Regex(#[from] RegexError),

    #[error("cannot access {0:?}: {1}")]
    Path(PathBuf, io::Error),

    #[error(transparent)]
    IO(#[from] io::Error),
}
