//! Global error handling.
//!
//! The analysis library defines its own error type, which is unified with
//! the command line tools errors when winding results at the top-level.
//!
//! ```rust
//! use pointsworks::prelude::*;
//!
//! fn main() -> PwResult<()> { // can return a PwError
//!    let _repo = Repo::from_json_str("{}")?; // can return an AnalysisError
//!    Ok(())
//! }
//! ```

use pw_analysis::errors::AnalysisError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`PwError`].
pub type PwResult<T> = Result<T, PwError>;

/// The main error type for error winding at the top-level.
#[derive(Debug, Error)]
pub enum PwError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned from [`pw_analysis`] functions.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
