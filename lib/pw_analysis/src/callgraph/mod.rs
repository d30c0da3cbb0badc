//! Graph representation of the possible calls between the methods of the
//! analyzed program.
//!
//! Nodes are methods (real, virtual placeholders, intrinsics and
//! constructors), and at most one edge exists per (caller, callee) pair,
//! accumulating every call statement between them.

mod builder;

pub use builder::CallGraphBuilder;

use crate::graph::{self, GraphEdge, GraphNode, NodeId};
use crate::repo::{InvokeKind, Method, MethodSignature, MethodUid, Repo, StmtUid, ValueUid};
use crate::stats::CgStat;
use crate::UNKNOWN_FILE_NAME;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction::{Incoming, Outgoing};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::ops;

/// Identifier of a call graph node.
pub type FuncId = NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallGraphNodeKind {
    Real,
    /// Placeholder for a call target that cannot be resolved to a known method.
    Virtual,
    Intrinsic,
    Constructor,
}

impl fmt::Display for CallGraphNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Virtual => write!(f, "virtual"),
            Self::Intrinsic => write!(f, "intrinsic"),
            Self::Constructor => write!(f, "constructor"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallGraphNode {
    signature: MethodSignature,
    method: Option<MethodUid>,
    kind: CallGraphNodeKind,
    // Declared in a platform file
    is_sdk: bool,
    // No body available
    is_blank: bool,
}

impl fmt::Display for CallGraphNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.signature)
    }
}

impl GraphNode for CallGraphNode {
    fn dot_attr(&self) -> String {
        let color = if self.is_sdk {
            "blue"
        } else if self.is_blank {
            "gray"
        } else {
            "black"
        };
        let style = if self.kind == CallGraphNodeKind::Virtual {
            ",style=dashed"
        } else {
            ""
        };
        format!("color={color},shape=box{style}")
    }
}

impl CallGraphNode {
    #[inline]
    #[must_use]
    pub const fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    #[inline]
    #[must_use]
    pub const fn method(&self) -> Option<MethodUid> {
        self.method
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> CallGraphNodeKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn is_sdk(&self) -> bool {
        self.is_sdk
    }

    #[inline]
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        self.is_blank
    }
}

/// Statement performing a call: either a program statement, or the
/// synthesized invocation of a callback passed to an SDK method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallStmt {
    Ir(StmtUid),
    SdkCallback { method: FuncId, param: usize },
}

impl CallStmt {
    #[must_use]
    pub const fn ir(self) -> Option<StmtUid> {
        match self {
            Self::Ir(stmt) => Some(stmt),
            Self::SdkCallback { .. } => None,
        }
    }
}

impl fmt::Display for CallStmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ir(stmt) => write!(f, "stmt#{}", stmt.idx()),
            Self::SdkCallback { method, param } => {
                write!(f, "sdk#{}:param{}", method.index(), param)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallGraphEdge {
    direct: BTreeSet<CallStmt>,
    special: BTreeSet<CallStmt>,
    indirect: BTreeSet<CallStmt>,
    // Calls to intrinsics and constructors are not highlighted
    plain: bool,
}

impl fmt::Display for CallGraphEdge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.direct.len(),
            self.special.len(),
            self.indirect.len()
        )
    }
}

impl GraphEdge for CallGraphEdge {
    fn dot_attr(&self) -> String {
        if self.plain {
            return String::new();
        }
        let color = if self.direct.is_empty() && self.special.is_empty() {
            "red"
        } else if !self.special.is_empty() {
            "yellow"
        } else {
            "black"
        };
        format!("color={color}")
    }
}

impl CallGraphEdge {
    #[inline]
    pub fn iter_direct_calls(&self) -> impl Iterator<Item = &CallStmt> {
        self.direct.iter()
    }

    #[inline]
    pub fn iter_special_calls(&self) -> impl Iterator<Item = &CallStmt> {
        self.special.iter()
    }

    #[inline]
    pub fn iter_indirect_calls(&self) -> impl Iterator<Item = &CallStmt> {
        self.indirect.iter()
    }

    #[must_use]
    pub fn nb_calls(&self) -> usize {
        self.direct.len() + self.special.len() + self.indirect.len()
    }
}

/// A statically resolved call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub stmt: CallStmt,
    pub args: Vec<ValueUid>,
    pub callee: FuncId,
    pub caller: FuncId,
}

/// A call waiting for the resolution of its receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynCallSite {
    pub caller: FuncId,
    pub stmt: CallStmt,
    pub args: Vec<ValueUid>,
    pub potential_callee: Option<FuncId>,
    /// Signature named by the invocation.
    pub signature: MethodSignature,
    /// Receiver of an instance invocation.
    pub base: Option<ValueUid>,
}

impl DynCallSite {
    /// Treats a call whose target is out of the analyzed program as a call
    /// to be resolved through a local holding the target.
    #[must_use]
    pub fn from_unknown(cs: &CallSite, signature: MethodSignature) -> Self {
        Self {
            caller: cs.caller,
            stmt: cs.stmt,
            args: cs.args.clone(),
            potential_callee: Some(cs.callee),
            signature,
            base: None,
        }
    }
}

pub struct CallGraph<'a> {
    repo: &'a Repo,
    inner: StableDiGraph<CallGraphNode, CallGraphEdge>,
    method_to_node: HashMap<MethodSignature, FuncId>,
    call_sites: HashMap<StmtUid, CallSite>,
    dyn_call_sites: HashMap<StmtUid, DynCallSite>,
    entries: Vec<FuncId>,
    dummy_main: Option<FuncId>,
}

impl<'a> ops::Index<FuncId> for CallGraph<'a> {
    type Output = CallGraphNode;

    fn index(&self, id: FuncId) -> &CallGraphNode {
        &self.inner[id]
    }
}

impl<'a> CallGraph<'a> {
    #[must_use]
    pub fn new(repo: &'a Repo) -> Self {
        Self {
            repo,
            inner: StableDiGraph::new(),
            method_to_node: HashMap::new(),
            call_sites: HashMap::new(),
            dyn_call_sites: HashMap::new(),
            entries: Vec::new(),
            dummy_main: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn repo(&self) -> &'a Repo {
        self.repo
    }

    /// Returns the node of a method, creating it with the given kind if needed.
    pub fn add_node(&mut self, signature: &MethodSignature, kind: CallGraphNodeKind) -> FuncId {
        if let Some(id) = self.method_to_node.get(signature) {
            return *id;
        }
        let repo = self.repo;
        let method = repo.get_method(signature);
        let node = CallGraphNode {
            signature: signature.clone(),
            method: method.map(Method::uid),
            kind,
            is_sdk: repo.is_sdk_class(&signature.class),
            is_blank: method.map_or(true, |method| !method.has_body()),
        };
        log::trace!("new {} call graph node {}", kind, signature);
        let id = self.inner.add_node(node);
        self.method_to_node.insert(signature.clone(), id);
        id
    }

    /// Returns the node of a method, a virtual placeholder is created for
    /// methods never seen before.
    pub fn get_or_add_node(&mut self, signature: &MethodSignature) -> FuncId {
        self.add_node(signature, CallGraphNodeKind::Virtual)
    }

    #[must_use]
    pub fn get_node(&self, signature: &MethodSignature) -> Option<FuncId> {
        self.method_to_node.get(signature).copied()
    }

    /// Removes a node and every edge connected to it.
    pub fn remove_node(&mut self, id: FuncId) -> Option<CallGraphNode> {
        let node = self.inner.remove_node(id)?;
        self.method_to_node.remove(&node.signature);
        self.entries.retain(|entry| *entry != id);
        if self.dummy_main == Some(id) {
            self.dummy_main = None;
        }
        Some(node)
    }

    /// Method implementing a node, if any.
    #[must_use]
    pub fn method_of(&self, id: FuncId) -> Option<&'a Method> {
        let repo = self.repo;
        self.inner[id].method.map(|uid| &repo[uid])
    }

    /// Node of the method implementing the given node, if registered.
    #[must_use]
    pub fn func_of(&self, method: &Method) -> Option<FuncId> {
        self.get_node(method.signature())
    }

    fn add_call(&mut self, caller: FuncId, callee: FuncId) -> &mut CallGraphEdge {
        let edge = if let Some(edge) = self.inner.find_edge(caller, callee) {
            edge
        } else {
            let plain = matches!(
                self.inner[callee].kind,
                CallGraphNodeKind::Intrinsic | CallGraphNodeKind::Constructor
            );
            self.inner.add_edge(
                caller,
                callee,
                CallGraphEdge {
                    plain,
                    ..CallGraphEdge::default()
                },
            )
        };
        &mut self.inner[edge]
    }

    /// Adds a direct (static) or special (constructor like) call, and
    /// registers the call site of the statement.
    pub fn add_direct_or_special_call_edge(
        &mut self,
        caller: &MethodSignature,
        callee: &MethodSignature,
        stmt: StmtUid,
        is_direct: bool,
    ) {
        let caller_id = self.get_or_add_node(caller);
        let callee_id = self.get_or_add_node(callee);
        let edge = self.add_call(caller_id, callee_id);
        if is_direct {
            edge.direct.insert(CallStmt::Ir(stmt));
        } else {
            edge.special.insert(CallStmt::Ir(stmt));
        }

        let args = self.repo[stmt]
            .invoke_expr()
            .map(|invoke| invoke.args.clone())
            .unwrap_or_default();
        self.call_sites.entry(stmt).or_insert(CallSite {
            stmt: CallStmt::Ir(stmt),
            args,
            callee: callee_id,
            caller: caller_id,
        });
    }

    /// Records a call whose target depends on its receiver.
    pub fn add_dynamic_call_info(
        &mut self,
        stmt: StmtUid,
        caller: &MethodSignature,
        potential_callee: Option<&MethodSignature>,
    ) {
        let repo = self.repo;
        let Some(invoke) = repo[stmt].invoke_expr() else {
            log::warn!("{} is not a call", repo.display_stmt(stmt));
            return;
        };
        let caller = self.get_or_add_node(caller);
        let potential_callee = potential_callee.map(|callee| self.get_or_add_node(callee));
        let base = match invoke.kind {
            InvokeKind::Instance { base } => Some(base),
            _ => None,
        };
        self.dyn_call_sites.insert(
            stmt,
            DynCallSite {
                caller,
                stmt: CallStmt::Ir(stmt),
                args: invoke.args.clone(),
                potential_callee,
                signature: invoke.method.clone(),
                base,
            },
        );
    }

    /// Adds an indirect call, returns `true` if the (caller, callee) pair
    /// was not connected before.
    pub fn add_dynamic_call_edge(&mut self, caller: FuncId, callee: FuncId, stmt: CallStmt) -> bool {
        let is_new = self.inner.find_edge(caller, callee).is_none();
        self.add_call(caller, callee).indirect.insert(stmt);
        if is_new {
            log::trace!(
                "new dynamic call edge {} -> {}",
                self.inner[caller],
                self.inner[callee]
            );
        }
        is_new
    }

    #[must_use]
    pub fn call_site_by_stmt(&self, stmt: StmtUid) -> Option<&CallSite> {
        self.call_sites.get(&stmt)
    }

    #[must_use]
    pub fn dyn_call_site_by_stmt(&self, stmt: StmtUid) -> Option<&DynCallSite> {
        self.dyn_call_sites.get(&stmt)
    }

    /// Whether `to` can be reached from `from` by following at least one call.
    #[must_use]
    pub fn detect_reachable(&self, from: FuncId, to: FuncId) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for callee in self.inner.neighbors_directed(id, Outgoing) {
                if callee == to {
                    return true;
                }
                queue.push_back(callee);
            }
        }
        false
    }

    /// Whether the method is declared outside of the analyzed program.
    #[must_use]
    pub fn is_unknown_method(&self, signature: &MethodSignature) -> bool {
        self.repo
            .get_class_by_name(&signature.class)
            .and_then(|class| self.repo.class_file(class))
            .map_or(true, |file| file.name() == UNKNOWN_FILE_NAME)
    }

    /// Every edge, grouped by caller.
    #[must_use]
    pub fn dyn_edges(&self) -> BTreeMap<&MethodSignature, BTreeSet<&MethodSignature>> {
        let mut edges: BTreeMap<_, BTreeSet<_>> = BTreeMap::new();
        for edge in self.inner.edge_references() {
            edges
                .entry(&self.inner[edge.source()].signature)
                .or_default()
                .insert(&self.inner[edge.target()].signature);
        }
        edges
    }

    #[must_use]
    pub fn get_edge(&self, caller: FuncId, callee: FuncId) -> Option<&CallGraphEdge> {
        self.inner
            .find_edge(caller, callee)
            .map(|edge| &self.inner[edge])
    }

    pub fn callees(&self, id: FuncId) -> impl Iterator<Item = FuncId> + '_ {
        self.inner.neighbors_directed(id, Outgoing)
    }

    pub fn callers(&self, id: FuncId) -> impl Iterator<Item = FuncId> + '_ {
        self.inner.neighbors_directed(id, Incoming)
    }

    #[must_use]
    pub fn in_degree(&self, id: FuncId) -> usize {
        graph::in_degree(&self.inner, id)
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (FuncId, &CallGraphNode)> {
        self.inner
            .node_indices()
            .map(move |id| (id, &self.inner[id]))
    }

    #[inline]
    #[must_use]
    pub fn nb_nodes(&self) -> usize {
        self.inner.node_count()
    }

    #[inline]
    #[must_use]
    pub fn nb_edges(&self) -> usize {
        self.inner.edge_count()
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[FuncId] {
        &self.entries
    }

    pub fn set_entries(&mut self, entries: Vec<FuncId>) {
        self.entries = entries;
    }

    #[inline]
    #[must_use]
    pub const fn dummy_main(&self) -> Option<FuncId> {
        self.dummy_main
    }

    pub fn set_dummy_main(&mut self, id: FuncId) {
        self.dummy_main = Some(id);
    }

    #[must_use]
    pub fn stats(&self) -> CgStat {
        let mut stats = CgStat::default();
        for node in self.inner.node_weights() {
            stats.count(node.kind);
        }
        stats.nb_edges = self.inner.edge_count();
        stats
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        graph::to_dot(&self.inner, "CallGraph")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repo;

    const PROGRAM: &str = r#"{"files": [{"name": "cg.ts", "classes": [
        {"name": "A", "methods": [
            {"name": "constructor", "body": []},
            {"name": "foo", "body": []},
            {"name": "bar", "body": [{"call": {"base": "this", "method": "A.foo"}}]}
        ]},
        {"name": "Main", "methods": [
            {"name": "main", "static": true, "body": [
                {"assign": ["a", {"new": "A"}]},
                {"call": {"base": "a", "method": "A.constructor"}},
                {"call": {"base": "a", "method": "A.foo"}},
                {"call": {"base": "a", "method": "A.foo"}},
                {"call": {"method": "%unk.lost"}}
            ]}
        ]}
    ]}]}"#;

    fn sig(s: &str) -> MethodSignature {
        MethodSignature::parse(s)
    }

    #[test]
    fn one_edge_per_pair() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let main = repo.get_method(&sig("Main.main")).unwrap();
        let stmts: Vec<StmtUid> = main.iter_stmts().collect();
        let mut cg = CallGraph::new(&repo);
        let caller = cg.add_node(&sig("Main.main"), CallGraphNodeKind::Real);
        let foo = cg.add_node(&sig("A.foo"), CallGraphNodeKind::Real);
        assert!(cg.add_dynamic_call_edge(caller, foo, CallStmt::Ir(stmts[2])));
        assert!(!cg.add_dynamic_call_edge(caller, foo, CallStmt::Ir(stmts[3])));
        cg.add_direct_or_special_call_edge(&sig("Main.main"), &sig("A.foo"), stmts[2], true);
        assert_eq!(cg.nb_edges(), 1);
        let edge = cg.get_edge(caller, foo).unwrap();
        assert_eq!(edge.nb_calls(), 3);
        assert_eq!(edge.dot_attr(), "color=black");
        assert_eq!(cg.call_site_by_stmt(stmts[2]).unwrap().callee, foo);
    }

    #[test]
    fn placeholders_and_unknown_methods() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let mut cg = CallGraph::new(&repo);
        let lost = cg.get_or_add_node(&sig("%unk.lost"));
        assert_eq!(cg[lost].kind(), CallGraphNodeKind::Virtual);
        assert!(cg[lost].is_blank());
        assert!(cg.method_of(lost).is_none());
        assert!(cg.is_unknown_method(&sig("%unk.lost")));
        assert!(!cg.is_unknown_method(&sig("A.foo")));
        assert_eq!(cg.get_or_add_node(&sig("%unk.lost")), lost);

        assert!(cg.remove_node(lost).is_some());
        assert!(cg.get_node(&sig("%unk.lost")).is_none());
        assert_eq!(cg.nb_nodes(), 0);
    }

    #[test]
    fn reachability_follows_calls() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let bar = repo.get_method(&sig("A.bar")).unwrap();
        let stmt = bar.iter_stmts().last().unwrap();
        let mut cg = CallGraph::new(&repo);
        let main = cg.add_node(&sig("Main.main"), CallGraphNodeKind::Real);
        let a_bar = cg.add_node(&sig("A.bar"), CallGraphNodeKind::Real);
        let a_foo = cg.add_node(&sig("A.foo"), CallGraphNodeKind::Real);
        cg.add_dynamic_call_edge(main, a_bar, CallStmt::Ir(stmt));
        cg.add_dynamic_call_edge(a_bar, a_foo, CallStmt::Ir(stmt));
        assert!(cg.detect_reachable(main, a_foo));
        assert!(!cg.detect_reachable(a_foo, main));
        assert!(!cg.detect_reachable(a_bar, a_bar));
        cg.add_dynamic_call_edge(a_foo, a_foo, CallStmt::Ir(stmt));
        assert!(cg.detect_reachable(a_foo, a_foo));
        assert_eq!(cg.dyn_edges().len(), 3);
        assert!(cg.to_dot().contains("color=red"));
    }
}
