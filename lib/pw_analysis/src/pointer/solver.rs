//! Andersen style points-to solver with differential propagation and on the
//! fly call resolution.

use super::builder::PagBuilder;
use super::config::PointerAnalysisConfig;
use super::context::{ContextId, GLOBAL_CID};
use super::framework::FrameworkModel;
use super::pag::{Pag, PagEdgeKind, PagNodeData, PagNodeKind, PagValue};
use super::pts::{DiffPtData, PtsSet};
use crate::callgraph::{CallGraph, CallGraphBuilder, CallStmt, DynCallSite, FuncId};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::graph::NodeId;
use crate::repo::{MethodUid, Repo, StmtKind, Type};
use crate::stats::PtaStat;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fs;

const UNHANDLED_FUNCS_FILE: &str = "PtaUnhandledFunctionList.txt";

pub struct PointerAnalysis<'a> {
    builder: PagBuilder<'a>,
    ptd: DiffPtData,
    worklist: VecDeque<NodeId>,
    queued: HashSet<NodeId>,
    entries: Vec<FuncId>,
    config: PointerAnalysisConfig,
    stat: PtaStat,
    type_diff: BTreeMap<PagValue, BTreeSet<Type>>,
}

impl<'a> PointerAnalysis<'a> {
    /// Prepares an analysis over an already built call graph, the
    /// configuration is checked first.
    pub fn new(
        cg: CallGraph<'a>,
        config: PointerAnalysisConfig,
        model: Box<dyn FrameworkModel>,
    ) -> AnalysisResult<Self> {
        config.validate()?;
        log::debug!(
            "pointer analysis with k = {} and {} framework model",
            config.k_limit,
            model.name()
        );
        Ok(Self {
            builder: PagBuilder::new(cg, config.k_limit, model),
            ptd: DiffPtData::new(),
            worklist: VecDeque::new(),
            queued: HashSet::new(),
            entries: Vec::new(),
            config,
            stat: PtaStat::default(),
            type_diff: BTreeMap::new(),
        })
    }

    /// Runs the analysis on a whole program from its synthesized main
    /// method (see [`Repo::create_dummy_main`]).
    pub fn for_whole_program(
        repo: &'a Repo,
        dummy_main: MethodUid,
        config: PointerAnalysisConfig,
        model: Box<dyn FrameworkModel>,
    ) -> AnalysisResult<Self> {
        let mut cg = CallGraph::new(repo);
        CallGraphBuilder::new(&mut cg).build_direct_call_graph_for_repo();
        let main = cg
            .func_of(&repo[dummy_main])
            .ok_or_else(|| AnalysisError::MethodNotFound(repo[dummy_main].signature().to_string()))?;
        cg.set_dummy_main(main);

        let mut pta = Self::new(cg, config, model)?;
        pta.set_entries(vec![main]);
        pta.start()?;
        Ok(pta)
    }

    pub fn set_entries(&mut self, entries: Vec<FuncId>) {
        self.entries = entries;
    }

    #[inline]
    #[must_use]
    pub const fn pag(&self) -> &Pag<'a> {
        self.builder.pag()
    }

    #[inline]
    #[must_use]
    pub const fn cg(&self) -> &CallGraph<'a> {
        self.builder.cg()
    }

    #[inline]
    #[must_use]
    pub const fn builder(&self) -> &PagBuilder<'a> {
        &self.builder
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &PointerAnalysisConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn stat(&self) -> &PtaStat {
        &self.stat
    }

    pub fn start(&mut self) -> AnalysisResult<()> {
        self.init()?;
        self.solve_constraint()?;
        self.post_process()
    }

    /// Lowers the entries and what they statically reach.
    pub fn init(&mut self) -> AnalysisResult<()> {
        log::info!("initializing pointer analysis");
        self.stat.start();
        let entries = self.entries.clone();
        self.builder.build_for_entries(&entries)?;
        if self.config.dot_dump {
            self.dump_pag("ptaInit_pag.dot")?;
            self.dump_cg("cg_init.dot")?;
        }
        Ok(())
    }

    /// Solves until neither new points-to facts nor new reachable methods
    /// show up.
    pub fn solve_constraint(&mut self) -> AnalysisResult<()> {
        self.worklist.clear();
        self.queued.clear();
        self.init_worklist();
        while self.solve_round()? {}
        Ok(())
    }

    /// Propagates the pending facts then resolves the calls they enable,
    /// returns `true` if another round is needed.
    pub fn solve_round(&mut self) -> AnalysisResult<bool> {
        self.stat.iter_times += 1;
        log::info!("pointer analysis round {}", self.stat.iter_times);

        self.solve_worklist()?;
        let changed = self.on_the_fly_dynamic_call_solve()?;
        if self.config.dot_dump {
            self.dump_pag(&format!("pta_pag_itor#{}.dot", self.stat.iter_times))?;
        }
        Ok(changed || !self.worklist.is_empty())
    }

    fn post_process(&mut self) -> AnalysisResult<()> {
        self.stat.end();
        self.collect_inferred_stat();
        self.builder.do_stat();
        log::info!("{}", self.cg().stats());
        log::info!("{}", self.builder.stat());
        log::info!("{}", self.stat);
        if self.config.dot_dump {
            self.dump_pag("ptaEnd_pag.dot")?;
            self.dump_cg("cgEnd.dot")?;
        }
        if self.config.unhandled_func_dump {
            self.dump_unhandled_functions()?;
        }
        Ok(())
    }

    /// Seeds the worklist from the pointer introducing edges added since the
    /// last call, and from solved nodes given new outgoing flows.
    fn init_worklist(&mut self) {
        for (src, dst) in self.builder.pag_mut().take_addr_edges() {
            self.stat.nb_processed_addr += 1;
            self.ptd.add_pts(dst, src);
            if self.pag()[src].kind() == PagNodeKind::GlobalThis {
                self.ptd.add_pts(src, src);
                self.enqueue(src);
            }
            self.enqueue(dst);
        }
        let reanalyze = self.builder.pag_mut().take_reanalyze_nodes();
        self.add_to_reanalyze(&reanalyze);
    }

    fn solve_worklist(&mut self) -> AnalysisResult<()> {
        while let Some(node) = self.worklist.pop_front() {
            self.queued.remove(&node);
            self.process_node(node)?;
        }
        Ok(())
    }

    fn enqueue(&mut self, node: NodeId) {
        if self.queued.insert(node) {
            self.worklist.push_back(node);
        }
    }

    fn process_node(&mut self, node: NodeId) -> AnalysisResult<()> {
        self.handle_this(node);
        self.handle_load_write(node)?;
        self.handle_copy(node);
        self.handle_pt(node);
        self.detect_type_diff(node);
        Ok(())
    }

    /// Receiver objects flow to the `this` of the callee.
    fn handle_this(&mut self, node: NodeId) {
        let targets = self
            .pag()
            .neighbors(node, Direction::Outgoing, |kind| kind == PagEdgeKind::This);
        for dst in targets {
            self.propagate(node, dst);
            self.stat.nb_processed_this += 1;
        }
    }

    fn handle_copy(&mut self, node: NodeId) {
        let targets = self
            .pag()
            .neighbors(node, Direction::Outgoing, PagEdgeKind::is_copy);
        for dst in targets {
            self.propagate(node, dst);
            self.stat.nb_processed_copy += 1;
        }
    }

    /// Connects the field accesses made through the node to the fields of
    /// the objects newly pointed to.
    fn handle_load_write(&mut self, node: NodeId) -> AnalysisResult<()> {
        let Some(diff) = self.ptd.diff_pts(node).filter(|diff| !diff.is_empty()).cloned() else {
            return Ok(());
        };
        let pag = self.builder.pag();
        let value = pag[node].value();
        let base_cid = pag[node].cid();

        let mut fields = BTreeSet::new();
        if let Some(by_cid) = pag.nodes_by_base_value(value) {
            for (cid, ids) in by_cid {
                // the global object is accessed from every context
                if base_cid == GLOBAL_CID || *cid == base_cid {
                    fields.extend(ids.iter().copied());
                }
            }
        }
        // accesses made through the locals an external source flows to
        for dst in self.builder.export_variables(value) {
            if let Some(by_cid) = pag.nodes_by_base_value(*dst) {
                fields.extend(by_cid.values().flatten().copied());
            }
        }

        for field in fields {
            self.handle_field_in_edges(field, &diff)?;
            self.handle_field_out_edges(field, &diff)?;
        }
        Ok(())
    }

    fn clone_access_node(&mut self, access: NodeId, pt: NodeId) -> AnalysisResult<Option<NodeId>> {
        let pag = self.builder.pag_mut();
        if matches!(pag[access].data(), PagNodeData::Array) {
            pag.get_or_clone_array_element_node(access, pt)
        } else {
            pag.get_or_clone_field_node(access, pt)
        }
    }

    fn handle_field_in_edges(&mut self, field: NodeId, diff: &PtsSet) -> AnalysisResult<()> {
        let writers = self
            .pag()
            .neighbors(field, Direction::Incoming, |kind| kind == PagEdgeKind::Write);
        for src in writers {
            self.stat.nb_processed_write += 1;
            for pt in diff.iter() {
                let Some(dst) = self.clone_access_node(field, pt)? else {
                    continue;
                };
                if self.builder.pag_mut().add_edge(src, dst, PagEdgeKind::Copy, None) {
                    self.stat.nb_real_write += 1;
                    self.reanalyze(src);
                }
            }
        }
        Ok(())
    }

    fn handle_field_out_edges(&mut self, field: NodeId, diff: &PtsSet) -> AnalysisResult<()> {
        let readers = self
            .pag()
            .neighbors(field, Direction::Outgoing, |kind| kind == PagEdgeKind::Load);
        for dst in readers {
            self.stat.nb_processed_load += 1;
            for pt in diff.iter() {
                let Some(src) = self.clone_access_node(field, pt)? else {
                    continue;
                };
                if self.builder.pag_mut().add_edge(src, dst, PagEdgeKind::Copy, None) {
                    self.stat.nb_real_load += 1;
                    // a field read before being written has nothing to give yet
                    self.reanalyze(src);
                }
            }
        }
        Ok(())
    }

    /// Commits the pending facts of the node and records what is new.
    fn handle_pt(&mut self, node: NodeId) {
        let real_diff = self.ptd.calculate_diff(node, node);
        if !real_diff.is_empty() {
            self.builder.add_updated_node(node, &real_diff);
        }
        self.ptd.flush(node);
        let pts = self.ptd.propa_pts(node).cloned().unwrap_or_default();
        self.builder.set_pts(node, pts);
    }

    fn propagate(&mut self, src: NodeId, dst: NodeId) -> bool {
        if self.ptd.diff_pts(src).is_none() {
            return false;
        }
        let diff = self.ptd.calculate_diff(src, dst);
        let changed = self.ptd.union_pts_to(dst, &diff);
        if changed {
            self.enqueue(dst);
        }
        changed
    }

    /// Schedules an already solved node again, so that its facts reach the
    /// edges added since.
    fn reanalyze(&mut self, node: NodeId) -> bool {
        if !self.ptd.reset_elem(node) {
            return false;
        }
        self.enqueue(node);
        true
    }

    fn add_to_reanalyze(&mut self, nodes: &[NodeId]) -> bool {
        let mut changed = false;
        for node in nodes {
            changed |= self.reanalyze(*node);
        }
        changed
    }

    /// Resolves the calls made through locals whose points-to set grew, then
    /// lowers the newly reached methods.
    fn on_the_fly_dynamic_call_solve(&mut self) -> AnalysisResult<bool> {
        let mut changed = false;
        let mut processed: BTreeSet<CallStmt> = BTreeSet::new();
        for (node, pts) in self.builder.take_updated_nodes() {
            let pag = self.builder.pag();
            let Some(local) = pag[node].local() else {
                continue;
            };
            let cid = pag[node].cid();
            let dyn_call_sites: Vec<DynCallSite> = local.dyn_call_sites().cloned().collect();
            let unknown_call_sites: Vec<DynCallSite> =
                local.unknown_call_sites().cloned().collect();
            if dyn_call_sites.is_empty() && unknown_call_sites.is_empty() {
                continue;
            }
            log::debug!("resolving calls through node {}", node.index());

            for cs in &dyn_call_sites {
                changed |= self.resolve_call_site(cs, &pts, cid)?;
                processed.insert(cs.stmt);
            }
            for cs in &unknown_call_sites {
                changed |= self.resolve_call_site(cs, &pts, cid)?;
            }
        }

        let src_nodes = self.builder.handle_unprocessed_call_sites(&processed)?;
        changed |= self.add_to_reanalyze(&src_nodes);
        changed |= self.builder.handle_reachable()?;
        self.init_worklist();
        Ok(changed)
    }

    fn resolve_call_site(
        &mut self,
        cs: &DynCallSite,
        pts: &PtsSet,
        cid: ContextId,
    ) -> AnalysisResult<bool> {
        let mut changed = false;
        for pt in pts.iter() {
            let src_nodes = self.builder.add_dynamic_call_edge(cs, pt, cid)?;
            changed |= self.add_to_reanalyze(&src_nodes);
        }
        Ok(changed)
    }

    /// Objects a value may point to, in any context.
    #[must_use]
    pub fn points_to<V: Into<PagValue>>(&self, value: V) -> PtsSet {
        let pag = self.pag();
        pag.nodes_by_value(value.into())
            .into_iter()
            .flat_map(|nodes| nodes.values())
            .flat_map(|node| pag[*node].pts().iter())
            .collect()
    }

    #[must_use]
    pub fn no_alias<V: Into<PagValue>>(&self, left: V, right: V) -> bool {
        self.points_to(left).is_disjoint(&self.points_to(right))
    }

    #[must_use]
    pub fn may_alias<V: Into<PagValue>>(&self, left: V, right: V) -> bool {
        !self.no_alias(left, right)
    }

    /// Values connected to a value by copies, in either direction.
    #[must_use]
    pub fn related_nodes<V: Into<PagValue>>(&self, value: V) -> BTreeSet<PagValue> {
        let pag = self.pag();
        let mut worklist: VecDeque<NodeId> = pag
            .nodes_by_value(value.into())
            .map(|nodes| nodes.values().copied().collect())
            .unwrap_or_default();
        let mut processed = HashSet::new();
        while let Some(node) = worklist.pop_front() {
            if !processed.insert(node) {
                continue;
            }
            for dir in [Direction::Incoming, Direction::Outgoing] {
                worklist.extend(
                    pag.neighbors(node, dir, PagEdgeKind::is_copy)
                        .into_iter()
                        .filter(|next| !processed.contains(next)),
                );
            }
        }
        processed.into_iter().map(|node| pag[node].value()).collect()
    }

    fn detect_type_diff(&mut self, node: NodeId) {
        if !self.config.detect_type_diff {
            return;
        }
        let pag = self.builder.pag();
        let value = pag[node].value();
        let orig_type = pag.value_type(value);
        if !(orig_type.is_class() || orig_type.is_unknown()) || pag[node].pts().is_empty() {
            return;
        }

        let mut same_type = false;
        let mut diff_types = Vec::new();
        for pt in pag[node].pts().iter() {
            let ty = pag.value_type(pag[pt].value());
            if ty == orig_type {
                same_type = true;
            } else {
                diff_types.push(ty);
            }
        }
        if diff_types.is_empty() && !self.type_diff.contains_key(&value) {
            return;
        }
        let types = self.type_diff.entry(value).or_default();
        types.extend(diff_types);
        // the declared type is right for some targets
        if same_type {
            types.insert(orig_type);
        }
    }

    /// Values whose targets do not all have their declared type, with the
    /// types of the targets.
    #[must_use]
    pub const fn type_diff_map(&self) -> &BTreeMap<PagValue, BTreeSet<Type>> {
        &self.type_diff
    }

    #[must_use]
    pub fn unhandled_funcs(&self) -> Vec<FuncId> {
        self.builder.unhandled_funcs()
    }

    #[must_use]
    pub fn handled_funcs(&self) -> Vec<FuncId> {
        self.builder.handled_funcs()
    }

    fn collect_inferred_stat(&mut self) {
        let repo = self.builder.repo();
        let mut visited = HashSet::new();
        for func in self.handled_funcs() {
            let Some(method) = self.cg().method_of(func) else {
                continue;
            };
            for stmt in method.iter_stmts() {
                let left = match repo[stmt].kind() {
                    StmtKind::Assign { left, .. } | StmtKind::AssignInvoke { left, .. } => *left,
                    _ => continue,
                };
                if !visited.insert(left) {
                    continue;
                }
                if self.type_diff.contains_key(&PagValue::Ir(left)) {
                    if repo[left].ty().is_unknown() {
                        self.stat.nb_inferred_unknown_values += 1;
                    } else {
                        self.stat.nb_inferred_diff_type_values += 1;
                    }
                }
                self.stat.nb_values_in_handled_funcs += 1;
            }
        }
        self.stat.nb_unhandled_funcs = self.unhandled_funcs().len();
    }

    fn dump_pag(&self, name: &str) -> AnalysisResult<()> {
        self.pag().dump(self.config.output_directory.join(name))
    }

    fn dump_cg(&self, name: &str) -> AnalysisResult<()> {
        let path = self.config.output_directory.join(name);
        log::debug!("dumping call graph to {:?}", path);
        fs::write(&path, self.cg().to_dot()).map_err(|err| AnalysisError::Path(path, err))
    }

    fn dump_unhandled_functions(&self) -> AnalysisResult<()> {
        let path = self.config.output_directory.join(UNHANDLED_FUNCS_FILE);
        let mut content = String::new();
        for func in self.unhandled_funcs() {
            if self.cg()[func].is_sdk() {
                continue;
            }
            if let Some(method) = self.cg().method_of(func) {
                content.push_str(&method.signature().to_string());
                content.push('\n');
            }
        }
        log::debug!("dumping unhandled functions to {:?}", path);
        fs::write(&path, content).map_err(|err| AnalysisError::Path(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::context::DUMMY_CID;
    use crate::pointer::framework::ArkUiModel;
    use crate::repo::{MethodSignature, ValueUid};
    use std::path::PathBuf;

    fn dummy_main(repo: &mut Repo, entry: &str) -> MethodUid {
        let entry = repo
            .get_method(&MethodSignature::parse(entry))
            .unwrap()
            .uid();
        repo.create_dummy_main(&[entry]).unwrap()
    }

    fn local(repo: &Repo, method: &str, name: &str) -> ValueUid {
        repo.get_method(&MethodSignature::parse(method))
            .unwrap()
            .get_local(name)
            .unwrap()
    }

    /// Allocated classes of the targets, once per class whatever the heap
    /// context of the allocation.
    fn allocations_of(pta: &PointerAnalysis<'_>, pts: &PtsSet) -> Vec<String> {
        let classes: BTreeSet<String> = pts
            .iter()
            .filter_map(|pt| pta.pag().allocated_class(pta.pag()[pt].value()))
            .map(str::to_string)
            .collect();
        classes.into_iter().collect()
    }

    const FIELDS: &str = r#"{"files": [{"name": "f.ts", "classes": [
        {"name": "Main", "methods": [
            {"name": "main", "static": true, "body": [
                {"assign": ["x", {"new": "A"}]},
                {"assign": ["y", "x"]},
                {"assign": ["b", {"new": "B"}]},
                {"assign": [{"field": ["y", "f"]}, "b"]},
                {"assign": ["z", {"field": ["x", "f"]}]}
            ]}
        ]}
    ]}]}"#;

    #[test]
    fn field_flows_through_aliases() {
        let mut repo = Repo::from_json_str(FIELDS).unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");
        let mut config = PointerAnalysisConfig::default();
        config.detect_type_diff = true;
        let pta = PointerAnalysis::for_whole_program(&repo, dummy, config, Box::new(ArkUiModel))
            .unwrap();

        let x = local(&repo, "Main.main", "x");
        let y = local(&repo, "Main.main", "y");
        let z = local(&repo, "Main.main", "z");
        let b = local(&repo, "Main.main", "b");
        assert_eq!(allocations_of(&pta, &pta.points_to(z)), vec!["B"]);
        assert_eq!(allocations_of(&pta, &pta.points_to(x)), vec!["A"]);
        assert!(pta.may_alias(x, y));
        assert!(pta.may_alias(z, b));
        assert!(pta.no_alias(x, z));

        let related = pta.related_nodes(y);
        assert!(related.contains(&PagValue::Ir(x)));
        assert!(!related.contains(&PagValue::Ir(z)));

        // untyped locals get the type of what they point to
        let types = &pta.type_diff_map()[&PagValue::Ir(x)];
        assert_eq!(
            types.iter().collect::<Vec<_>>(),
            vec![&Type::Class("A".to_string())]
        );
        assert!(pta.stat().nb_inferred_unknown_values >= 4);
        assert!(pta.stat().nb_real_write >= 1);
        assert!(pta.stat().nb_real_load >= 1);
        assert!(pta.stat().nb_processed_addr >= 2);
    }

    #[test]
    fn points_to_sets_grow_to_a_fixpoint() {
        let mut repo = Repo::from_json_str(FIELDS).unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");
        let mut cg = CallGraph::new(&repo);
        CallGraphBuilder::new(&mut cg).build_direct_call_graph_for_repo();
        let main = cg.func_of(&repo[dummy]).unwrap();
        let mut pta =
            PointerAnalysis::new(cg, PointerAnalysisConfig::default(), Box::new(ArkUiModel)).unwrap();
        pta.set_entries(vec![main]);
        pta.init().unwrap();
        pta.init_worklist();

        let snapshot = |pta: &PointerAnalysis<'_>| -> BTreeMap<NodeId, Vec<NodeId>> {
            pta.pag()
                .iter_nodes()
                .map(|(id, node)| (id, node.pts().iter().collect()))
                .collect()
        };
        let mut previous = snapshot(&pta);
        loop {
            let again = pta.solve_round().unwrap();
            let current = snapshot(&pta);
            for (id, pts) in &previous {
                assert!(pts.iter().all(|pt| current[id].contains(pt)));
            }
            previous = current;
            if !again {
                break;
            }
        }

        // nothing moves once the fixpoint is reached
        pta.solve_constraint().unwrap();
        assert_eq!(snapshot(&pta), previous);
        assert!(pta.stat().iter_times >= 1);
    }

    #[test]
    fn closures_are_resolved_on_the_fly() {
        let mut repo = Repo::from_json_str(
            r#"{"files": [
                {"name": "sdk.d.ts", "sdk": true, "classes": [{"name": "Timer", "methods": [
                    {"name": "schedule", "static": true, "params": [{"name": "task", "type": "fn:Main.tick"}],
                     "returns": "Handle"}
                ]}]},
                {"name": "c.ts", "classes": [{"name": "Main", "methods": [
                    {"name": "main", "static": true, "body": [
                        {"assign": ["k", {"func": "Main.cb"}]},
                        {"call": {"method": "Main.run", "args": ["k"]}},
                        {"assign": ["t", {"func": "Main.tick"}]},
                        {"call": {"result": "h", "method": "Timer.schedule", "args": ["tick"]}}
                    ]},
                    {"name": "run", "static": true, "params": [{"name": "f"}], "body": [
                        {"call": {"ptr": "f", "method": "%unk.f"}}
                    ]},
                    {"name": "cb", "static": true, "body": []},
                    {"name": "tick", "static": true, "body": []}
                ]}]}
            ]}"#,
        )
        .unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");

        // no edge before the solver sees the function pointer
        let mut direct = CallGraph::new(&repo);
        CallGraphBuilder::new(&mut direct).build_direct_call_graph_for_repo();
        let run = direct.get_node(&MethodSignature::parse("Main.run")).unwrap();
        let cb = direct.get_node(&MethodSignature::parse("Main.cb")).unwrap();
        assert!(direct.get_edge(run, cb).is_none());

        let pta = PointerAnalysis::for_whole_program(
            &repo,
            dummy,
            PointerAnalysisConfig::default(),
            Box::new(ArkUiModel),
        )
        .unwrap();
        let cg = pta.cg();
        let run = cg.get_node(&MethodSignature::parse("Main.run")).unwrap();
        let cb = cg.get_node(&MethodSignature::parse("Main.cb")).unwrap();
        let edge = cg.get_edge(run, cb).unwrap();
        assert_eq!(edge.iter_indirect_calls().count(), 1);

        // the SDK method calls back the function it was given
        let schedule = cg.get_node(&MethodSignature::parse("Timer.schedule")).unwrap();
        let tick = cg.get_node(&MethodSignature::parse("Main.tick")).unwrap();
        let edge = cg.get_edge(schedule, tick).unwrap();
        assert!(matches!(
            edge.iter_indirect_calls().next(),
            Some(CallStmt::SdkCallback { param: 0, .. })
        ));
        assert!(pta.handled_funcs().contains(&cb));
        assert!(pta.handled_funcs().contains(&tick));

        // the SDK method returns an object of its declared type
        let h = local(&repo, "Main.main", "h");
        assert_eq!(allocations_of(&pta, &pta.points_to(h)), vec!["Handle"]);
    }

    #[test]
    fn array_receivers_only_call_function_arguments() {
        let mut repo = Repo::from_json_str(
            r#"{"files": [{"name": "a.ts", "classes": [
                {"name": "A", "methods": [
                    {"name": "foo", "params": [{"name": "g"}], "body": []}
                ]},
                {"name": "Main", "methods": [
                    {"name": "main", "static": true, "body": [
                        {"assign": ["arr", {"new_array": "A"}]},
                        {"assign": ["k", {"func": "Main.cb"}]},
                        {"call": {"base": "arr", "method": "A.foo", "args": ["k"]}}
                    ]},
                    {"name": "cb", "static": true, "params": [{"name": "x"}], "body": []}
                ]}
            ]}]}"#,
        )
        .unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");
        let pta = PointerAnalysis::for_whole_program(
            &repo,
            dummy,
            PointerAnalysisConfig::default(),
            Box::new(ArkUiModel),
        )
        .unwrap();

        let cg = pta.cg();
        let main = cg.get_node(&MethodSignature::parse("Main.main")).unwrap();
        let foo = cg.get_node(&MethodSignature::parse("A.foo")).unwrap();
        let cb = cg.get_node(&MethodSignature::parse("Main.cb")).unwrap();
        assert!(cg.get_edge(main, foo).is_none());
        assert!(cg.get_edge(main, cb).is_some());
    }

    const RECURSION: &str = r#"{"files": [{"name": "r.ts", "classes": [
        {"name": "B", "methods": [
            {"name": "id", "static": true, "params": [{"name": "p"}], "body": [{"return": "p"}]}
        ]},
        {"name": "Main", "methods": [
            {"name": "main", "static": true, "body": [
                {"assign": ["o1", {"new": "A1"}]},
                {"call": {"result": "r1", "method": "B.id", "args": ["o1"]}},
                {"call": {"method": "Main.a"}}
            ]},
            {"name": "a", "static": true, "body": [
                {"assign": ["o2", {"new": "A2"}]},
                {"call": {"result": "r2", "method": "B.id", "args": ["o2"]}},
                {"call": {"method": "Main.b"}}
            ]},
            {"name": "b", "static": true, "body": [
                {"call": {"method": "Main.a"}}
            ]}
        ]}
    ]}]}"#;

    #[test]
    fn call_string_length_bounds_precision() {
        let mut repo = Repo::from_json_str(RECURSION).unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");
        let r1 = local(&repo, "Main.main", "r1");
        let r2 = local(&repo, "Main.a", "r2");
        let p = local(&repo, "B.id", "p");

        let run = |k| {
            let config = PointerAnalysisConfig::new(k, PathBuf::from("out/"));
            PointerAnalysis::for_whole_program(&repo, dummy, config, Box::new(ArkUiModel)).unwrap()
        };

        let insensitive = run(1);
        assert_eq!(insensitive.pag().nodes_by_value(p.into()).unwrap().len(), 1);
        assert_eq!(
            allocations_of(&insensitive, &insensitive.points_to(r1)),
            vec!["A1", "A2"]
        );
        assert!(insensitive.may_alias(r1, r2));

        let sensitive = run(2);
        assert_eq!(sensitive.pag().nodes_by_value(p.into()).unwrap().len(), 2);
        assert_eq!(allocations_of(&sensitive, &sensitive.points_to(r1)), vec!["A1"]);
        assert_eq!(allocations_of(&sensitive, &sensitive.points_to(r2)), vec!["A2"]);
        // Main.a runs under two call strings, each with its own A2 object
        assert_eq!(sensitive.points_to(r2).len(), 2);
        assert!(sensitive.no_alias(r1, r2));

        for pta in [&insensitive, &sensitive] {
            let ctx = pta.builder().ctx();
            for cid in 0..ctx.nb_contexts() {
                assert!(ctx.context_by_id(cid).unwrap().len() <= ctx.k());
            }
        }
    }

    #[test]
    fn zero_limit_is_context_insensitive() {
        let mut repo = Repo::from_json_str(RECURSION).unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");
        let r1 = local(&repo, "Main.main", "r1");
        let r2 = local(&repo, "Main.a", "r2");
        let o2 = local(&repo, "Main.a", "o2");

        let config = PointerAnalysisConfig::new(0, PathBuf::from("out/"));
        let pta =
            PointerAnalysis::for_whole_program(&repo, dummy, config, Box::new(ArkUiModel)).unwrap();

        assert_eq!(pta.builder().ctx().nb_contexts(), 1);
        for (_, node) in pta.pag().iter_nodes() {
            assert!(node.cid() == DUMMY_CID || node.cid() == GLOBAL_CID);
        }
        // Main.a is reached twice but lowered once
        assert_eq!(pta.pag().nodes_by_value(o2.into()).unwrap().len(), 1);
        assert_eq!(pta.points_to(o2).len(), 1);
        assert_eq!(allocations_of(&pta, &pta.points_to(r1)), vec!["A1", "A2"]);
        assert!(pta.points_to(r2).iter().eq(pta.points_to(r1).iter()));
        assert!(pta.may_alias(r1, r2));
    }

    #[test]
    fn storage_properties_carry_objects() {
        let mut repo = Repo::from_json_str(
            r#"{"files": [{"name": "s.ts", "classes": [
                {"name": "Main", "methods": [
                    {"name": "main", "static": true, "locals": {"o": "A"}, "body": [
                        {"assign": ["o", {"new": "A"}]},
                        {"call": {"method": "AppStorage.setOrCreate", "args": [{"const": "'key'"}, "o"]}},
                        {"call": {"result": "r", "method": "AppStorage.get", "args": [{"const": "'key'"}]}},
                        {"call": {"result": "l", "method": "AppStorage.link", "args": [{"const": "'key'"}]}},
                        {"call": {"result": "u", "method": "AppStorage.get", "args": [{"const": "'other'"}]}}
                    ]}
                ]}
            ]}]}"#,
        )
        .unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");
        let pta = PointerAnalysis::for_whole_program(
            &repo,
            dummy,
            PointerAnalysisConfig::default(),
            Box::new(ArkUiModel),
        )
        .unwrap();
        let o = local(&repo, "Main.main", "o");
        let r = local(&repo, "Main.main", "r");
        let l = local(&repo, "Main.main", "l");
        let u = local(&repo, "Main.main", "u");
        assert!(pta.may_alias(o, r));
        assert!(pta.may_alias(o, l));
        assert!(pta.points_to(u).is_empty());
        let linked = *pta.pag().nodes_by_value(l.into()).unwrap().values().next().unwrap();
        assert_eq!(
            pta.pag()[linked].local().unwrap().storage(),
            Some((crate::pointer::framework::StorageType::AppStorage, "key"))
        );
    }

    #[test]
    fn dumps_are_written() {
        let dir = std::env::temp_dir().join(format!("pw-pta-dumps-{}", std::process::id()));
        let mut config = PointerAnalysisConfig::new(1, dir.clone());
        config.dot_dump = true;
        config.unhandled_func_dump = true;

        let mut repo = Repo::new();
        repo.load_json_str(FIELDS).unwrap();
        repo.load_json_str(
            r#"{"files": [{"name": "u.ts", "classes": [{"name": "U", "methods": [
                {"name": "unused", "static": true, "body": []}
            ]}]}]}"#,
        )
        .unwrap();
        repo.close_hierarchy().unwrap();
        let dummy = dummy_main(&mut repo, "Main.main");
        PointerAnalysis::for_whole_program(&repo, dummy, config, Box::new(ArkUiModel)).unwrap();

        for name in ["ptaInit_pag.dot", "cg_init.dot", "pta_pag_itor#1.dot", "ptaEnd_pag.dot", "cgEnd.dot"] {
            assert!(dir.join(name).is_file(), "{name} missing");
        }
        let unhandled = fs::read_to_string(dir.join(UNHANDLED_FUNCS_FILE)).unwrap();
        assert!(unhandled.lines().any(|line| line == "U.unused"));
        assert!(!unhandled.lines().any(|line| line == "Main.main"));
        fs::remove_dir_all(dir).unwrap();
    }
}
