//! # `PointsWorks`
//!
//! `pointsworks` is the main crate of the `PointsWorks` ArkTS program analysis
//! project. It reexports the analysis library and ships the command line
//! tools built on top of it. Most of the reexports are done within the
//! `pointsworks::prelude` namespace.
//!
//! ## Library basics
//!
//! Programs are loaded from JSON descriptions into a `Repo`, the arena that
//! every analysis works on:
//!
//! ```rust
//! use pointsworks::prelude::*;
//!
//! let repo = Repo::from_json_str(r#"{"files": [{"name": "a.ts", "classes": [
//!     {"name": "Main", "methods": [{"name": "main", "static": true, "body": []}]}
//! ]}]}"#)?;
//! println!("classes count: {}", repo.nb_classes());
//! println!("methods count: {}", repo.nb_methods());
//! # Ok::<(), PwError>(())
//! ```
//!
//! The pointer analysis runs from a synthesized main calling the chosen
//! entries, and answers alias queries on the values of the program:
//!
//! ```rust
//! use pointsworks::prelude::*;
//!
//! let mut repo = Repo::from_json_str(r#"{"files": [{"name": "a.ts", "classes": [
//!     {"name": "Main", "methods": [{"name": "main", "static": true, "body": [
//!         {"assign": ["x", {"new": "A"}]},
//!         {"assign": ["y", "x"]}
//!     ]}]}
//! ]}]}"#)?;
//! let main = MethodSignature::parse("Main.main");
//! let pta = points_to_analysis(&mut repo, &[main.clone()], PointerAnalysisConfig::default())?;
//! let method = pta.cg().repo().get_method(&main).unwrap();
//! let (x, y) = (method.get_local("x").unwrap(), method.get_local("y").unwrap());
//! assert!(pta.may_alias(x, y));
//! # Ok::<(), PwError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`pw_analysis`] contains the program representation and all the
//!    analysis algorithms: call graphs (direct, CHA, RTA) and the context
//!    sensitive pointer analysis.

mod errors;

pub mod cli;
pub mod program;
pub mod pw_callgraph;
pub mod pw_hierarchy;
pub mod pw_pta;

pub use pw_analysis as analysis;

/// Reexport module of commonly used structures and functions from `PointsWorks`
/// project sub-crates:
///
/// ```rust
/// use pointsworks::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{PwError, PwResult};

    pub use pw_analysis::callgraph::{self, CallGraph, CallGraphBuilder};
    pub use pw_analysis::pointer::{
        ArkUiModel, FrameworkModel, NoFrameworkModel, PagValue, PointerAnalysis,
        PointerAnalysisConfig,
    };
    pub use pw_analysis::repo::{Class, Method, MethodSignature, Repo};
    pub use pw_analysis::{direct_call_graph, points_to_analysis};

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("PW_LOG", "info")
            .write_style("PW_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
