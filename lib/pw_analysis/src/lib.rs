//! This crate provides the call graph construction and pointer analysis
//! algorithms of the `PointsWorks` project, working on an intermediate
//! representation of ArkTS programs.

pub mod algorithm;
pub mod callgraph;
pub mod errors;
pub mod graph;
pub mod hierarchy;
pub mod pointer;
pub mod repo;
pub mod stats;

use crate::callgraph::{CallGraph, CallGraphBuilder};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::pointer::{ArkUiModel, PointerAnalysis, PointerAnalysisConfig};
use crate::repo::{MethodSignature, Repo};

/// File holding the methods the analyzed program calls but never declares.
pub const UNKNOWN_FILE_NAME: &str = "%unk";
/// Name of the class and method holding the top level code of a file or
/// namespace.
pub const DEFAULT_NAME: &str = "%dflt";
pub const GLOBAL_THIS_NAME: &str = "globalThis";
pub const CONSTRUCTOR_NAME: &str = "constructor";
pub const STATIC_INIT_NAME: &str = "%statInit";
pub const THIS_NAME: &str = "this";
pub const DUMMY_FILE_NAME: &str = "@dummyFile";
pub const DUMMY_CLASS_NAME: &str = "@dummyClass";
pub const DUMMY_MAIN_NAME: &str = "@dummyMain";

/// Builds the call graph made of the statically known calls only.
pub fn direct_call_graph(repo: &Repo) -> CallGraph<'_> {
    let mut cg = CallGraph::new(repo);
    CallGraphBuilder::new(&mut cg).build_direct_call_graph_for_repo();
    cg
}

/// Runs the pointer analysis with the ArkUI framework model, from a dummy
/// main calling the given entry methods.
pub fn points_to_analysis<'a>(
    repo: &'a mut Repo,
    entries: &[MethodSignature],
    config: PointerAnalysisConfig,
) -> AnalysisResult<PointerAnalysis<'a>> {
    let entries = entries
        .iter()
        .map(|signature| {
            repo.get_method(signature)
                .map(|method| method.uid())
                .ok_or_else(|| AnalysisError::MethodNotFound(signature.to_string()))
        })
        .collect::<AnalysisResult<Vec<_>>>()?;
    let dummy_main = repo.create_dummy_main(&entries)?;
    let repo: &'a Repo = repo;
    PointerAnalysis::for_whole_program(repo, dummy_main, config, Box::new(ArkUiModel))
}
