//! Counters collected while building the call graph and solving points-to
//! constraints.

use crate::callgraph::CallGraphNodeKind;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgStat {
    pub nb_real: usize,
    pub nb_virtual: usize,
    pub nb_intrinsic: usize,
    pub nb_constructor: usize,
    pub nb_edges: usize,
}

impl CgStat {
    pub(crate) fn count(&mut self, kind: CallGraphNodeKind) {
        match kind {
            CallGraphNodeKind::Real => self.nb_real += 1,
            CallGraphNodeKind::Virtual => self.nb_virtual += 1,
            CallGraphNodeKind::Intrinsic => self.nb_intrinsic += 1,
            CallGraphNodeKind::Constructor => self.nb_constructor += 1,
        }
    }

    #[must_use]
    pub const fn nb_nodes(&self) -> usize {
        self.nb_real + self.nb_virtual + self.nb_intrinsic + self.nb_constructor
    }
}

impl fmt::Display for CgStat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "call graph: {} nodes, {} edges", self.nb_nodes(), self.nb_edges)?;
        writeln!(f, "  real methods: {}", self.nb_real)?;
        writeln!(f, "  virtual methods: {}", self.nb_virtual)?;
        writeln!(f, "  intrinsic methods: {}", self.nb_intrinsic)?;
        write!(f, "  constructors: {}", self.nb_constructor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagStat {
    pub nb_dynamic_calls: usize,
    pub nb_functions: usize,
    pub nb_nodes: usize,
}

impl fmt::Display for PagStat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "pointer assignment graph:")?;
        writeln!(f, "  dynamic calls: {}", self.nb_dynamic_calls)?;
        writeln!(f, "  functions: {}", self.nb_functions)?;
        write!(f, "  nodes: {}", self.nb_nodes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PtaStat {
    pub nb_processed_addr: usize,
    pub nb_processed_copy: usize,
    pub nb_processed_load: usize,
    pub nb_processed_write: usize,
    pub nb_processed_this: usize,
    pub nb_real_write: usize,
    pub nb_real_load: usize,
    pub nb_unhandled_funcs: usize,
    pub nb_values_in_handled_funcs: usize,
    pub nb_inferred_unknown_values: usize,
    pub nb_inferred_diff_type_values: usize,
    pub iter_times: usize,
    started: Option<Instant>,
    elapsed: Duration,
}

impl PtaStat {
    pub(crate) fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub(crate) fn end(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed = started.elapsed();
        }
    }

    #[inline]
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl fmt::Display for PtaStat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "pointer analysis:")?;
        writeln!(f, "  processed address edges: {}", self.nb_processed_addr)?;
        writeln!(f, "  processed copy edges: {}", self.nb_processed_copy)?;
        writeln!(f, "  processed load edges: {}", self.nb_processed_load)?;
        writeln!(f, "  processed write edges: {}", self.nb_processed_write)?;
        writeln!(f, "  processed this edges: {}", self.nb_processed_this)?;
        writeln!(f, "  real load edges: {}", self.nb_real_load)?;
        writeln!(f, "  real write edges: {}", self.nb_real_write)?;
        writeln!(f, "  unhandled functions: {}", self.nb_unhandled_funcs)?;
        writeln!(f, "  values in handled functions: {}", self.nb_values_in_handled_funcs)?;
        writeln!(f, "  inferred unknown values: {}", self.nb_inferred_unknown_values)?;
        writeln!(f, "  inferred different type values: {}", self.nb_inferred_diff_type_values)?;
        writeln!(f, "  iterations: {}", self.iter_times)?;
        write!(f, "  time: {:.3}s", self.elapsed.as_secs_f64())
    }
}
