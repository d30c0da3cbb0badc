use crate::errors::{AnalysisError, AnalysisResult};
use std::fs;
use std::path::PathBuf;

/// Options of a pointer analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerAnalysisConfig {
    /// Maximal call string length of a context, 0 makes the analysis
    /// context insensitive.
    pub k_limit: usize,
    /// Where dumps are written.
    pub output_directory: PathBuf,
    /// Record values whose points-to targets disagree with their declared type.
    pub detect_type_diff: bool,
    /// Dump the PAG and the call graph as dot files at each iteration.
    pub dot_dump: bool,
    /// Dump the list of methods never reached by the analysis.
    pub unhandled_func_dump: bool,
}

impl Default for PointerAnalysisConfig {
    fn default() -> Self {
        Self {
            k_limit: 1,
            output_directory: PathBuf::from("out/"),
            detect_type_diff: false,
            dot_dump: false,
            unhandled_func_dump: false,
        }
    }
}

impl PointerAnalysisConfig {
    #[must_use]
    pub fn new(k_limit: usize, output_directory: PathBuf) -> Self {
        Self {
            k_limit,
            output_directory,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn dumps(&self) -> bool {
        self.dot_dump || self.unhandled_func_dump
    }

    /// Checks the configuration before a run, the output directory is
    /// created when something has to be dumped.
    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.dumps() {
            return Ok(());
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(AnalysisError::Config(
                "output directory is required to dump analysis results".to_string(),
            ));
        }
        if self.output_directory.exists() && !self.output_directory.is_dir() {
            return Err(AnalysisError::Config(format!(
                "output path {:?} is not a directory",
                self.output_directory
            )));
        }
        fs::create_dir_all(&self.output_directory)
            .map_err(|err| AnalysisError::Path(self.output_directory.clone(), err))?;
        Ok(())
    }
}
