//! Call resolution analyses populating a call graph from its entries.

mod cha;
mod rta;

pub use cha::ClassHierarchyAnalysis;
pub use rta::RapidTypeAnalysis;

use crate::callgraph::{CallGraph, CallSite, FuncId};
use crate::repo::{InvokeExpr, Method, MethodSignature, Repo, StmtUid, Type};
use std::collections::{BTreeSet, VecDeque};

/// Worklist template shared by call resolution analyses: starting from the
/// call graph entries, every reached method has its calls resolved and the
/// resolved callees are reached in turn.
pub trait AbstractAnalysis<'a> {
    fn cg(&self) -> &CallGraph<'a>;

    fn cg_mut(&mut self) -> &mut CallGraph<'a>;

    /// Possible targets of the call performed by `stmt`.
    fn resolve_call(&mut self, caller: FuncId, stmt: StmtUid) -> Vec<CallSite>;

    /// Hook run on a newly reached method before its calls are resolved,
    /// returns call sites whose callees become reachable.
    fn pre_process_method(&mut self, _func: FuncId) -> Vec<CallSite> {
        Vec::new()
    }

    fn start(&mut self, display_generated: bool) {
        let mut worklist: VecDeque<FuncId> = self.cg().entries().iter().copied().collect();
        let mut processed = BTreeSet::new();
        while let Some(func) = worklist.pop_front() {
            if processed.contains(&func) || self.cg()[func].is_sdk() {
                continue;
            }
            processed.insert(func);

            for cs in self.pre_process_method(func) {
                if !processed.contains(&cs.callee) {
                    worklist.push_back(cs.callee);
                }
            }
            for cs in self.process_method(func) {
                self.add_call_graph_edge(&cs, display_generated);
                if !processed.contains(&cs.callee) {
                    worklist.push_back(cs.callee);
                }
            }
        }
        log::debug!(
            "{} methods processed, call graph has {} edges",
            processed.len(),
            self.cg().nb_edges()
        );
    }

    fn process_method(&mut self, func: FuncId) -> Vec<CallSite> {
        let Some(method) = self.cg().method_of(func) else {
            return Vec::new();
        };
        let repo = self.cg().repo();
        method
            .iter_stmts()
            .filter(|stmt| repo[*stmt].invoke_expr().is_some())
            .flat_map(|stmt| self.resolve_call(func, stmt))
            .collect()
    }

    fn add_call_graph_edge(&mut self, cs: &CallSite, display_generated: bool) {
        let hidden = self
            .cg()
            .method_of(cs.callee)
            .map_or(false, |callee| callee.is_generated() && !display_generated);
        if !hidden {
            self.cg_mut()
                .add_dynamic_call_edge(cs.caller, cs.callee, cs.stmt);
        }
    }
}

/// Method invoked by an expression, searched in the named class and then
/// in its superclasses.
pub(crate) fn resolve_invoke_expr<'r>(repo: &'r Repo, invoke: &InvokeExpr) -> Option<&'r Method> {
    repo.get_method(&invoke.method).or_else(|| {
        let class = repo.get_class_by_name(&invoke.method.class)?;
        repo.find_method_in_hierarchy(class, &invoke.method.name)
    })
}

/// Closures passed as arguments, they are assumed to be called.
pub(crate) fn param_anonymous_methods(repo: &Repo, invoke: &InvokeExpr) -> Vec<MethodSignature> {
    invoke
        .args
        .iter()
        .filter_map(|arg| match repo[*arg].ty() {
            Type::Function(signature) => Some(signature.clone()),
            _ => None,
        })
        .collect()
}

/// Call sites to the closures passed as arguments of `stmt`.
pub(crate) fn anonymous_call_sites(
    cg: &mut CallGraph,
    caller: FuncId,
    stmt: StmtUid,
    invoke: &InvokeExpr,
) -> Vec<CallSite> {
    let repo = cg.repo();
    param_anonymous_methods(repo, invoke)
        .iter()
        .map(|signature| CallSite {
            stmt: crate::callgraph::CallStmt::Ir(stmt),
            args: Vec::new(),
            callee: cg.get_or_add_node(signature),
            caller,
        })
        .collect()
}
