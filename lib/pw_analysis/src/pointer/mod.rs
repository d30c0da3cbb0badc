//! Context sensitive, inclusion based pointer analysis.
//!
//! Methods are first summarized once ([`FuncPag`]), then the summaries are
//! instantiated per calling context into the pointer assignment graph
//! ([`Pag`]). The [`PointerAnalysis`] solver propagates points-to facts on
//! that graph and, as receivers and function pointers get resolved, adds the
//! calls it discovers to both the call graph and the PAG.

pub mod builder;
pub mod config;
pub mod context;
pub mod framework;
pub mod func_pag;
pub mod pag;
pub mod pts;
pub mod solver;

pub use builder::{CsFunc, PagBuilder};
pub use config::PointerAnalysisConfig;
pub use context::{Context, ContextId, KLimitedContextSensitive, DUMMY_CID, GLOBAL_CID};
pub use framework::{ArkUiModel, FrameworkModel, NoFrameworkModel, StorageType};
pub use func_pag::{FuncPag, InterFuncPag};
pub use pag::{Pag, PagEdgeKind, PagNode, PagNodeKind, PagValue};
pub use pts::{DiffPtData, PtsSet};
pub use solver::PointerAnalysis;
