//! Context independent summaries of the pointer assignments of a method.

use super::pag::PagEdgeKind;
use crate::callgraph::{CallSite, DynCallSite};
use crate::repo::{StmtUid, ValueUid};
use std::collections::BTreeSet;

/// Pointer assignment between two values of the same method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntraProceduralEdge {
    pub src: ValueUid,
    pub dst: ValueUid,
    pub kind: PagEdgeKind,
    pub stmt: StmtUid,
}

/// Summary of a method body: internal edges and outgoing calls.
#[derive(Debug, Clone, Default)]
pub struct FuncPag {
    internal_edges: Vec<IntraProceduralEdge>,
    seen: BTreeSet<(ValueUid, ValueUid, PagEdgeKind)>,
    normal_call_sites: Vec<CallSite>,
    dynamic_call_sites: Vec<DynCallSite>,
    unknown_call_sites: Vec<CallSite>,
}

impl FuncPag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the same edge was already recorded by another statement.
    pub fn add_internal_edge(&mut self, edge: IntraProceduralEdge) -> bool {
        if !self.seen.insert((edge.src, edge.dst, edge.kind)) {
            return false;
        }
        self.internal_edges.push(edge);
        true
    }

    #[must_use]
    pub fn internal_edges(&self) -> &[IntraProceduralEdge] {
        &self.internal_edges
    }

    pub fn add_normal_call_site(&mut self, cs: CallSite) {
        if !self.normal_call_sites.contains(&cs) {
            self.normal_call_sites.push(cs);
        }
    }

    #[must_use]
    pub fn normal_call_sites(&self) -> &[CallSite] {
        &self.normal_call_sites
    }

    pub fn add_dynamic_call_site(&mut self, cs: DynCallSite) {
        if !self.dynamic_call_sites.contains(&cs) {
            self.dynamic_call_sites.push(cs);
        }
    }

    #[must_use]
    pub fn dynamic_call_sites(&self) -> &[DynCallSite] {
        &self.dynamic_call_sites
    }

    /// Calls to methods declared out of the analyzed program.
    pub fn add_unknown_call_site(&mut self, cs: CallSite) {
        if !self.unknown_call_sites.contains(&cs) {
            self.unknown_call_sites.push(cs);
        }
    }

    #[must_use]
    pub fn unknown_call_sites(&self) -> &[CallSite] {
        &self.unknown_call_sites
    }
}

/// Flow from a value defined in another method, through a closure capture,
/// an enclosing default scope or an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterProceduralEdge {
    pub src: ValueUid,
    pub dst: ValueUid,
    pub kind: PagEdgeKind,
}

#[derive(Debug, Clone, Default)]
pub struct InterFuncPag {
    edges: BTreeSet<InterProceduralEdge>,
}

impl InterFuncPag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: InterProceduralEdge) -> bool {
        self.edges.insert(edge)
    }

    pub fn edges(&self) -> impl Iterator<Item = &InterProceduralEdge> {
        self.edges.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::CallStmt;
    use petgraph::graph::NodeIndex;

    #[test]
    fn summaries_deduplicate() {
        let v = |i| ValueUid::from_idx(i);
        let s = |i| StmtUid::from_idx(i);

        let mut fpag = FuncPag::new();
        let edge = IntraProceduralEdge {
            src: v(1),
            dst: v(2),
            kind: PagEdgeKind::Copy,
            stmt: s(0),
        };
        assert!(fpag.add_internal_edge(edge));
        assert!(!fpag.add_internal_edge(IntraProceduralEdge { stmt: s(3), ..edge }));
        assert!(fpag.add_internal_edge(IntraProceduralEdge {
            kind: PagEdgeKind::Load,
            ..edge
        }));
        assert_eq!(fpag.internal_edges().len(), 2);

        let cs = CallSite {
            stmt: CallStmt::Ir(s(4)),
            args: vec![v(1)],
            callee: NodeIndex::new(1),
            caller: NodeIndex::new(0),
        };
        fpag.add_normal_call_site(cs.clone());
        fpag.add_normal_call_site(cs.clone());
        fpag.add_unknown_call_site(cs);
        assert_eq!(fpag.normal_call_sites().len(), 1);
        assert_eq!(fpag.unknown_call_sites().len(), 1);
        assert!(fpag.dynamic_call_sites().is_empty());

        let mut inter = InterFuncPag::new();
        assert!(inter.is_empty());
        let edge = InterProceduralEdge {
            src: v(5),
            dst: v(6),
            kind: PagEdgeKind::InterProceduralCopy,
        };
        assert!(inter.add_edge(edge));
        assert!(!inter.add_edge(edge));
        assert_eq!(inter.edges().count(), 1);
    }
}
