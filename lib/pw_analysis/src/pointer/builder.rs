//! Lowering of method summaries into the pointer assignment graph.
//!
//! Summaries ([`FuncPag`]) are built once per method. They are then lowered
//! once per (context, method) pair reached by the analysis: internal edges
//! become PAG edges between context sensitive nodes, and resolved calls
//! become argument, return and receiver flows into the callee context.

use super::context::{ContextId, KLimitedContextSensitive, DUMMY_CID, GLOBAL_CID};
use super::framework::{FrameworkModel, StorageClass, StorageOp, StorageType};
use super::func_pag::{FuncPag, InterFuncPag, InterProceduralEdge, IntraProceduralEdge};
use super::pag::{FakeValue, ObjectData, Pag, PagEdgeKind, PagNodeKind, PagValue};
use super::pts::PtsSet;
use crate::callgraph::{CallGraph, CallGraphNodeKind, CallSite, CallStmt, DynCallSite, FuncId};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::graph::NodeId;
use crate::repo::{
    FieldSignature, InvokeKind, Method, Repo, StmtKind, StmtUid, Type, ValueKind, ValueUid,
};
use crate::stats::PagStat;
use crate::THIS_NAME;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// A method to lower under a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CsFunc {
    pub cid: ContextId,
    pub func: FuncId,
}

pub struct PagBuilder<'a> {
    repo: &'a Repo,
    pag: Pag<'a>,
    cg: CallGraph<'a>,
    ctx: KLimitedContextSensitive,
    model: Box<dyn FrameworkModel>,
    func_pags: BTreeMap<FuncId, FuncPag>,
    inter_func_pags: BTreeMap<FuncId, InterFuncPag>,
    handled: HashSet<CsFunc>,
    worklist: VecDeque<CsFunc>,
    queued: HashSet<CsFunc>,
    funcs_handled_this_round: BTreeSet<FuncId>,
    updated_nodes: BTreeMap<NodeId, PtsSet>,
    singleton_funcs: HashMap<FuncId, bool>,
    // one representative value per field access
    static_field_refs: HashMap<FieldSignature, ValueUid>,
    instance_field_refs: HashMap<(FieldSignature, PagValue), ValueUid>,
    sdk_param_values: HashMap<FuncId, Vec<PagValue>>,
    sdk_return_values: HashMap<(FuncId, ContextId), PagValue>,
    storage_properties: HashMap<(StorageType, String), PagValue>,
    // source value of an external scope -> locals and field bases it flows to
    export_map: HashMap<PagValue, Vec<PagValue>>,
    export_hubs: BTreeMap<ValueUid, NodeId>,
    // methods owning external sources found while summarizing
    pending_sources: Vec<FuncId>,
    stat: PagStat,
}

impl<'a> PagBuilder<'a> {
    #[must_use]
    pub fn new(cg: CallGraph<'a>, k_limit: usize, model: Box<dyn FrameworkModel>) -> Self {
        let repo = cg.repo();
        Self {
            repo,
            pag: Pag::new(repo),
            cg,
            ctx: KLimitedContextSensitive::new(k_limit),
            model,
            func_pags: BTreeMap::new(),
            inter_func_pags: BTreeMap::new(),
            handled: HashSet::new(),
            worklist: VecDeque::new(),
            queued: HashSet::new(),
            funcs_handled_this_round: BTreeSet::new(),
            updated_nodes: BTreeMap::new(),
            singleton_funcs: HashMap::new(),
            static_field_refs: HashMap::new(),
            instance_field_refs: HashMap::new(),
            sdk_param_values: HashMap::new(),
            sdk_return_values: HashMap::new(),
            storage_properties: HashMap::new(),
            export_map: HashMap::new(),
            export_hubs: BTreeMap::new(),
            pending_sources: Vec::new(),
            stat: PagStat::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn repo(&self) -> &'a Repo {
        self.repo
    }

    #[inline]
    #[must_use]
    pub const fn pag(&self) -> &Pag<'a> {
        &self.pag
    }

    #[inline]
    pub fn pag_mut(&mut self) -> &mut Pag<'a> {
        &mut self.pag
    }

    #[inline]
    #[must_use]
    pub const fn cg(&self) -> &CallGraph<'a> {
        &self.cg
    }

    #[inline]
    #[must_use]
    pub const fn ctx(&self) -> &KLimitedContextSensitive {
        &self.ctx
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> &dyn FrameworkModel {
        self.model.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn stat(&self) -> &PagStat {
        &self.stat
    }

    #[must_use]
    pub fn func_pag(&self, func: FuncId) -> Option<&FuncPag> {
        self.func_pags.get(&func)
    }

    /// Context of a callee, calls from context free nodes start from the
    /// empty context.
    fn callee_context(&mut self, caller_cid: ContextId, callee: FuncId) -> AnalysisResult<ContextId> {
        let caller_cid = if caller_cid == GLOBAL_CID {
            DUMMY_CID
        } else {
            caller_cid
        };
        self.ctx.get_or_new_context(caller_cid, callee, true)
    }

    fn build_func_pag_and_add_to_worklist(&mut self, cs: CsFunc) -> AnalysisResult<CsFunc> {
        if self.queued.contains(&cs) {
            return Ok(cs);
        }
        self.build_func_pag(cs.func)?;
        let cs = if self.is_singleton_function(cs.func) {
            CsFunc {
                cid: DUMMY_CID,
                func: cs.func,
            }
        } else {
            cs
        };
        if self.queued.insert(cs) {
            self.worklist.push_back(cs);
        }
        Ok(cs)
    }

    /// Summarizes and lowers the entries, each in its own fresh context.
    pub fn build_for_entries(&mut self, entries: &[FuncId]) -> AnalysisResult<()> {
        self.worklist.clear();
        self.queued.clear();
        for func in entries {
            let cid = self.ctx.new_context_id(*func);
            self.build_func_pag_and_add_to_worklist(CsFunc { cid, func: *func })?;
        }
        self.handle_reachable()?;

        // the global object points to itself
        let global_this = self.pag.global_this_value();
        let global = self.pag.get_or_new_node(GLOBAL_CID, global_this, None)?;
        self.pag.add_edge(global, global, PagEdgeKind::Copy, None);
        Ok(())
    }

    /// Lowers every queued (context, method) pair, returns `false` if there
    /// was nothing to do.
    pub fn handle_reachable(&mut self) -> AnalysisResult<bool> {
        if self.worklist.is_empty() {
            return Ok(false);
        }
        while let Some(cs) = self.worklist.pop_front() {
            self.queued.remove(&cs);
            self.build_pag_from_func_pag(cs.func, cs.cid)?;
            self.funcs_handled_this_round.insert(cs.func);
        }
        Ok(true)
    }

    /// Builds the summary of a method, returns `false` if it already exists
    /// or cannot be built.
    pub fn build_func_pag(&mut self, func: FuncId) -> AnalysisResult<bool> {
        if self.func_pags.contains_key(&func) {
            return Ok(false);
        }
        let Some(method) = self.cg.method_of(func) else {
            return Ok(false);
        };
        if !method.has_body() {
            self.build_sdk_func_pag(func);
            return Ok(false);
        }
        log::trace!("building summary of {}", method.signature());

        let repo = self.repo;
        let mut fpag = FuncPag::new();
        for stmt in method.iter_stmts() {
            match repo[stmt].kind() {
                StmtKind::Assign { left, right } => {
                    self.handle_value_from_external_scope(*right, func, None);
                    if let Some(kind) = self.assign_edge_kind(*left, *right) {
                        let src = self.real_value(*right);
                        let dst = self.real_value(*left);
                        fpag.add_internal_edge(IntraProceduralEdge {
                            src,
                            dst,
                            kind,
                            stmt,
                        });
                    }
                }
                StmtKind::AssignInvoke { invoke, .. } | StmtKind::Invoke(invoke) => {
                    for value in invoke.args.iter().chain(invoke.receiver().iter()) {
                        self.handle_value_from_external_scope(*value, func, None);
                    }
                    self.add_call_site(&mut fpag, stmt)?;
                }
                StmtKind::Return(Some(value)) => {
                    self.handle_value_from_external_scope(*value, func, None);
                }
                StmtKind::Return(None) | StmtKind::Nop => (),
            }
        }
        self.func_pags.insert(func, fpag);
        self.stat.nb_functions += 1;

        for source in std::mem::take(&mut self.pending_sources) {
            let cid = self.ctx.new_context_id(source);
            self.build_func_pag_and_add_to_worklist(CsFunc { cid, func: source })?;
        }
        Ok(true)
    }

    fn add_call_site(&mut self, fpag: &mut FuncPag, stmt: StmtUid) -> AnalysisResult<()> {
        if let Some(cs) = self.cg.call_site_by_stmt(stmt) {
            let cs = cs.clone();
            if self.cg.is_unknown_method(self.cg[cs.callee].signature()) {
                fpag.add_unknown_call_site(cs.clone());
            }
            fpag.add_normal_call_site(cs);
        } else if let Some(cs) = self.cg.dyn_call_site_by_stmt(stmt) {
            log::trace!("dynamic call site {}", self.repo.display_stmt(stmt));
            fpag.add_dynamic_call_site(cs.clone());
            self.stat.nb_dynamic_calls += 1;
        } else {
            return Err(AnalysisError::CallSiteNotFound(
                self.repo.display_stmt(stmt),
            ));
        }
        Ok(())
    }

    /// Methods without body get one fake value per parameter.
    fn build_sdk_func_pag(&mut self, func: FuncId) {
        if !self.cg[func].is_sdk() || self.sdk_param_values.contains_key(&func) {
            return;
        }
        let Some(method) = self.cg.method_of(func) else {
            return;
        };
        let params = method
            .params()
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                self.pag.new_fake_value(FakeValue::SdkParam {
                    method: method.signature().clone(),
                    index,
                    ty: ty.clone(),
                })
            })
            .collect();
        self.sdk_param_values.insert(func, params);
    }

    /// Edge kind of an assignment, `None` when it moves no pointer.
    fn assign_edge_kind(&self, left: ValueUid, right: ValueUid) -> Option<PagEdgeKind> {
        let (l, r) = (&self.repo[left], &self.repo[right]);
        let address = match r.kind() {
            ValueKind::NewExpr { .. } | ValueKind::NewArrayExpr { .. } => true,
            ValueKind::Local { .. } if self.pag.is_global_this_local(right) => true,
            ValueKind::Local { .. } => {
                l.is_local() && r.ty().is_function() && r.declaring_stmt().is_none()
            }
            ValueKind::InstanceFieldRef { .. } | ValueKind::StaticFieldRef { .. } => {
                l.is_local() && r.ty().is_function()
            }
            _ => false,
        };
        if address {
            return Some(PagEdgeKind::Address);
        }

        match (l.kind(), r.kind()) {
            (
                ValueKind::Local { .. },
                ValueKind::Local { .. }
                | ValueKind::ParameterRef { .. }
                | ValueKind::ThisRef
                | ValueKind::StaticFieldRef { .. },
            )
            | (ValueKind::StaticFieldRef { .. }, ValueKind::Local { .. }) => Some(PagEdgeKind::Copy),
            (
                ValueKind::Local { .. },
                ValueKind::InstanceFieldRef { .. } | ValueKind::ArrayRef { .. },
            ) => Some(PagEdgeKind::Load),
            (
                ValueKind::InstanceFieldRef { .. } | ValueKind::ArrayRef { .. },
                ValueKind::Local { .. },
            ) => Some(PagEdgeKind::Write),
            _ => None,
        }
    }

    /// Representative of a field access: every `x.f` on the same base, and
    /// every access to the same static field, share one value.
    fn real_value(&mut self, value: ValueUid) -> ValueUid {
        match self.repo[value].kind() {
            ValueKind::InstanceFieldRef { field, .. } => {
                let Some(base) = self.pag.access_base(PagValue::Ir(value)) else {
                    return value;
                };
                *self
                    .instance_field_refs
                    .entry((field.clone(), base))
                    .or_insert(value)
            }
            ValueKind::StaticFieldRef { field } => *self
                .static_field_refs
                .entry(field.clone())
                .or_insert(value),
            _ => value,
        }
    }

    /// Node of a value under a context, field accesses being replaced by
    /// their representative. Static fields are shared by every context.
    pub fn get_or_new_pag_node(
        &mut self,
        cid: ContextId,
        value: PagValue,
        stmt: Option<StmtUid>,
    ) -> AnalysisResult<NodeId> {
        let (cid, value) = match value {
            PagValue::Ir(uid) => {
                let uid = self.real_value(uid);
                match self.repo[uid].kind() {
                    ValueKind::StaticFieldRef { .. } => (GLOBAL_CID, PagValue::Ir(uid)),
                    _ => (cid, PagValue::Ir(uid)),
                }
            }
            PagValue::Fake(_) => (cid, value),
        };
        self.pag.get_or_new_node(cid, value, stmt)
    }

    /// Whether a static method is a singleton factory: an allocation flows
    /// to a returned value through a static field.
    pub fn is_singleton_function(&mut self, func: FuncId) -> bool {
        if let Some(singleton) = self.singleton_funcs.get(&func) {
            return *singleton;
        }
        let singleton = self.model.detects_singletons() && self.check_singleton(func);
        if singleton {
            log::info!("{} is a singleton function", self.cg[func].signature());
        }
        self.singleton_funcs.insert(func, singleton);
        singleton
    }

    fn check_singleton(&self, func: FuncId) -> bool {
        let repo = self.repo;
        let (Some(method), Some(fpag)) = (self.cg.method_of(func), self.func_pags.get(&func)) else {
            return false;
        };
        if !method.is_static() {
            return false;
        }

        let is_static_field =
            |value: ValueUid| matches!(repo[value].kind(), ValueKind::StaticFieldRef { .. });
        let mut graph: HashMap<ValueUid, Vec<ValueUid>> = HashMap::new();
        let mut has_static_field = false;
        for edge in fpag.internal_edges() {
            has_static_field |= is_static_field(edge.src) || is_static_field(edge.dst);
            graph.entry(edge.src).or_default().push(edge.dst);
        }
        if !has_static_field {
            return false;
        }

        let returned: HashSet<ValueUid> = method.return_values(repo).into_iter().collect();
        let objects = fpag
            .internal_edges()
            .iter()
            .filter(|edge| edge.kind == PagEdgeKind::Address)
            .map(|edge| edge.dst);
        for object in objects {
            // (value, a static field was crossed)
            let mut seen = HashSet::new();
            let mut stack = vec![(object, false)];
            while let Some((value, through_static)) = stack.pop() {
                if !seen.insert((value, through_static)) {
                    continue;
                }
                if through_static && returned.contains(&value) {
                    return true;
                }
                for next in graph.get(&value).into_iter().flatten() {
                    stack.push((*next, through_static || is_static_field(*next)));
                }
            }
        }
        false
    }

    /// Lowers the summary of a method under a context, once per pair.
    pub fn build_pag_from_func_pag(&mut self, func: FuncId, cid: ContextId) -> AnalysisResult<()> {
        if !self.func_pags.contains_key(&func) || !self.handled.insert(CsFunc { cid, func }) {
            return Ok(());
        }
        log::trace!("lowering {} in context {}", self.cg[func].signature(), cid);
        self.add_edges_from_func_pag(func, cid)?;
        self.add_edges_from_inter_func_pag(func, cid)?;
        self.add_calls_edges_from_func_pag(func, cid)?;
        self.add_dynamic_call_sites(func);
        self.add_unknown_call_sites(func);
        Ok(())
    }

    fn add_edges_from_func_pag(&mut self, func: FuncId, cid: ContextId) -> AnalysisResult<()> {
        let edges = match self.func_pags.get(&func) {
            Some(fpag) => fpag.internal_edges().to_vec(),
            None => return Ok(()),
        };
        for edge in edges {
            let src = self.get_or_new_pag_node(cid, PagValue::Ir(edge.src), Some(edge.stmt))?;
            let dst = self.get_or_new_pag_node(cid, PagValue::Ir(edge.dst), Some(edge.stmt))?;
            self.pag.add_edge(src, dst, edge.kind, Some(edge.stmt));

            // field accessed through a base linked to an external source
            let field = match edge.kind {
                PagEdgeKind::Load => src,
                PagEdgeKind::Write => dst,
                _ => continue,
            };
            if let Some(base) = self.pag.access_base(self.pag[field].value()) {
                self.reanalyze_export_sources(base);
            }
        }

        // exported locals of this method feed their hub
        let Some(method) = self.cg.method_of(func) else {
            return Ok(());
        };
        let hubs: Vec<(ValueUid, NodeId)> = self
            .export_hubs
            .iter()
            .filter(|(src, _)| self.repo[**src].method() == Some(method.uid()))
            .map(|(src, hub)| (*src, *hub))
            .collect();
        for (src, hub) in hubs {
            if let Some(node) = self.pag.has_ctx_node(cid, PagValue::Ir(src)) {
                self.pag.add_edge(node, hub, PagEdgeKind::Copy, None);
            }
        }
        Ok(())
    }

    fn reanalyze_export_sources(&mut self, base: PagValue) {
        let sources: Vec<PagValue> = self
            .export_map
            .iter()
            .filter(|(_, dsts)| dsts.contains(&base))
            .map(|(src, _)| *src)
            .collect();
        for src in sources {
            let nodes: Vec<NodeId> = self
                .pag
                .nodes_by_value(src)
                .map(|nodes| nodes.values().copied().collect())
                .unwrap_or_default();
            for node in nodes {
                if !self.pag[node].pts().is_empty() {
                    self.pag.reanalyze(node);
                }
            }
        }
    }

    /// Hub node gathering every context of an external source value.
    fn export_hub(&mut self, src: ValueUid) -> AnalysisResult<NodeId> {
        if let Some(hub) = self.export_hubs.get(&src) {
            return Ok(*hub);
        }
        let value = self.pag.new_fake_value(FakeValue::Export { local: src });
        let hub = self.pag.get_or_new_node(GLOBAL_CID, value, None)?;
        self.export_hubs.insert(src, hub);
        let nodes: Vec<NodeId> = self
            .pag
            .nodes_by_value(PagValue::Ir(src))
            .map(|nodes| nodes.values().copied().collect())
            .unwrap_or_default();
        for node in nodes {
            self.pag.add_edge(node, hub, PagEdgeKind::Copy, None);
        }
        Ok(hub)
    }

    fn add_edges_from_inter_func_pag(&mut self, func: FuncId, cid: ContextId) -> AnalysisResult<()> {
        let edges: Vec<InterProceduralEdge> = match self.inter_func_pags.get(&func) {
            Some(inter) => inter.edges().copied().collect(),
            None => return Ok(()),
        };
        for edge in edges {
            let hub = self.export_hub(edge.src)?;
            let dst = self.get_or_new_pag_node(cid, PagValue::Ir(edge.dst), None)?;
            self.pag.add_edge(hub, dst, edge.kind, None);
        }
        Ok(())
    }

    fn add_calls_edges_from_func_pag(&mut self, func: FuncId, cid: ContextId) -> AnalysisResult<()> {
        let call_sites = match self.func_pags.get(&func) {
            Some(fpag) => fpag.normal_call_sites().to_vec(),
            None => return Ok(()),
        };
        for cs in call_sites {
            let callee_cid = self.callee_context(cid, cs.callee)?;
            if !self.process_storage(cs.stmt, &cs.args, cs.callee, cid)? {
                self.add_static_pag_call_edge(&cs, cid, Some(callee_cid))?;
            }

            if matches!(
                self.cg[cs.callee].kind(),
                CallGraphNodeKind::Constructor | CallGraphNodeKind::Intrinsic
            ) {
                let callee = self.cg.method_of(cs.callee);
                match (self.instance_base(cs.stmt), callee) {
                    (Some(base), Some(callee)) => {
                        self.add_this_ref_call_edge(cid, base, callee, callee_cid)?;
                    }
                    (None, _) => log::error!(
                        "constructor or intrinsic {} is called statically",
                        self.cg[cs.callee].signature()
                    ),
                    (_, None) => (),
                }
            }
        }
        Ok(())
    }

    /// Binds dynamic call sites to the local nodes holding their receiver.
    fn add_dynamic_call_sites(&mut self, func: FuncId) {
        let call_sites = match self.func_pags.get(&func) {
            Some(fpag) => fpag.dynamic_call_sites().to_vec(),
            None => return,
        };
        for cs in call_sites {
            let Some(receiver) = self.call_receiver(cs.stmt) else {
                continue;
            };
            let mut nodes = self.nodes_of(PagValue::Ir(receiver));
            if nodes.is_empty() {
                if let Some(src) = self.source_value_from_external_scope(receiver, func) {
                    nodes = self.nodes_of(PagValue::Ir(src));
                }
            }
            if nodes.is_empty() {
                log::warn!(
                    "no node for receiver {} of dynamic call site",
                    self.repo.display_value(receiver)
                );
                continue;
            }
            for node in nodes {
                if let Some(local) = self.pag[node].local_mut() {
                    local.add_dyn_call_site(cs.clone());
                }
            }
        }
    }

    /// Binds calls to unknown methods to the local named after the callee.
    fn add_unknown_call_sites(&mut self, func: FuncId) {
        let (Some(fpag), Some(method)) = (self.func_pags.get(&func), self.cg.method_of(func)) else {
            return;
        };
        let call_sites = fpag.unknown_call_sites().to_vec();
        for cs in call_sites {
            let signature = self.cg[cs.callee].signature().clone();
            let Some(local) = method.get_local(&signature.name) else {
                continue;
            };
            let nodes = self.nodes_of(PagValue::Ir(local));
            if nodes.is_empty() {
                log::warn!("no node for local {} of unknown call site", signature.name);
                continue;
            }
            let dyn_cs = DynCallSite::from_unknown(&cs, signature);
            for node in nodes {
                if let Some(local) = self.pag[node].local_mut() {
                    local.add_unknown_call_site(dyn_cs.clone());
                }
            }
        }
    }

    fn nodes_of(&self, value: PagValue) -> Vec<NodeId> {
        self.pag
            .nodes_by_value(value)
            .map(|nodes| nodes.values().copied().collect())
            .unwrap_or_default()
    }

    fn instance_base(&self, stmt: CallStmt) -> Option<ValueUid> {
        let invoke = self.repo[stmt.ir()?].invoke_expr()?;
        match invoke.kind {
            InvokeKind::Instance { base } => Some(base),
            _ => None,
        }
    }

    fn call_receiver(&self, stmt: CallStmt) -> Option<ValueUid> {
        self.repo[stmt.ir()?].invoke_expr()?.receiver()
    }

    fn call_result(&self, stmt: CallStmt) -> Option<ValueUid> {
        self.repo[stmt.ir()?].left_op()
    }

    /// Lowers a call to a storage accessor into flows to property nodes,
    /// returns `false` if the callee is not a storage accessor.
    fn process_storage(
        &mut self,
        stmt: CallStmt,
        args: &[ValueUid],
        callee: FuncId,
        cid: ContextId,
    ) -> AnalysisResult<bool> {
        let Some(ir_stmt) = stmt.ir() else {
            return Ok(false);
        };
        let signature = self.cg[callee].signature().clone();
        let is_static = self.instance_base(stmt).is_none();
        let storage = match self.model.storage_class(&signature.class) {
            None => return Ok(false),
            Some(StorageClass::Storage(storage)) => storage,
            Some(StorageClass::Property) => {
                let Some(base) = self.instance_base(stmt) else {
                    return Ok(false);
                };
                let node = self.get_or_new_pag_node(cid, PagValue::Ir(base), None)?;
                match self.pag[node].local().and_then(|local| local.storage()) {
                    Some((storage, _)) => storage,
                    None => return Ok(false),
                }
            }
        };
        let Some(op) = self.model.storage_op(&signature.name) else {
            log::debug!("unsupported {} accessor {}", storage, signature);
            return Ok(true);
        };
        log::debug!("{:?} on {} at {}", op, storage, self.repo.display_stmt(ir_stmt));

        let stmt = Some(ir_stmt);
        let result = self.call_result(CallStmt::Ir(ir_stmt));
        match op {
            StorageOp::SetOrCreate => self.storage_set_or_create(storage, args, cid, stmt)?,
            StorageOp::Set if is_static => self.storage_set_or_create(storage, args, cid, stmt)?,
            StorageOp::Link | StorageOp::Prop => {
                let (Some(name), Some(result)) =
                    (args.first().and_then(|arg| self.property_name(*arg)), result)
                else {
                    return Ok(true);
                };
                let property = self.get_or_new_property_node(storage, &name)?;
                let linked = self.get_or_new_pag_node(cid, PagValue::Ir(result), stmt)?;
                if let Some(local) = self.pag[linked].local_mut() {
                    local.set_storage_link(storage, &name);
                }
                self.pag.add_edge(property, linked, PagEdgeKind::Copy, stmt);
                if op == StorageOp::Link {
                    self.pag.add_edge(linked, property, PagEdgeKind::Copy, stmt);
                }
            }
            StorageOp::Set => {
                let (Some(base), Some(arg)) = (self.instance_base(CallStmt::Ir(ir_stmt)), args.first())
                else {
                    return Ok(true);
                };
                let base = self.get_or_new_pag_node(cid, PagValue::Ir(base), None)?;
                let linked = self.pag[base]
                    .local()
                    .map_or(false, |local| local.storage().is_some());
                if linked && !self.repo[*arg].is_pointer_free() {
                    let arg = self.get_or_new_pag_node(cid, PagValue::Ir(*arg), stmt)?;
                    self.pag.add_edge(arg, base, PagEdgeKind::Copy, stmt);
                }
            }
            StorageOp::Get => {
                let Some(result) = result else {
                    return Ok(true);
                };
                let name = if is_static {
                    args.first().and_then(|arg| self.property_name(*arg))
                } else {
                    match self.instance_base(CallStmt::Ir(ir_stmt)) {
                        Some(base) => {
                            let base = self.get_or_new_pag_node(cid, PagValue::Ir(base), None)?;
                            self.pag[base]
                                .local()
                                .and_then(|local| local.storage())
                                .map(|(_, name)| name.to_string())
                        }
                        None => None,
                    }
                };
                let Some(property) = name.and_then(|name| self.property_node(storage, &name)) else {
                    return Ok(true);
                };
                let property = self.pag.get_or_new_node(GLOBAL_CID, property, None)?;
                let result = self.get_or_new_pag_node(cid, PagValue::Ir(result), stmt)?;
                self.pag.add_edge(property, result, PagEdgeKind::Copy, stmt);
            }
        }
        Ok(true)
    }

    fn storage_set_or_create(
        &mut self,
        storage: StorageType,
        args: &[ValueUid],
        cid: ContextId,
        stmt: Option<StmtUid>,
    ) -> AnalysisResult<()> {
        let (Some(name), Some(obj)) = (
            args.first().and_then(|arg| self.property_name(*arg)),
            args.get(1),
        ) else {
            return Ok(());
        };
        let property = self.get_or_new_property_node(storage, &name)?;
        if self.repo[*obj].ty().is_class() {
            let obj = self.get_or_new_pag_node(cid, PagValue::Ir(*obj), stmt)?;
            self.pag.add_edge(obj, property, PagEdgeKind::Copy, stmt);
        }
        Ok(())
    }

    fn property_name(&self, value: ValueUid) -> Option<String> {
        let value = &self.repo[value];
        match (value.ty(), value.kind()) {
            (Type::StringLiteral(name), _) => Some(name.clone()),
            (_, ValueKind::Constant { literal }) => Some(literal.clone()),
            _ => None,
        }
    }

    fn property_node(&self, storage: StorageType, name: &str) -> Option<PagValue> {
        self.storage_properties
            .get(&(storage, name.to_string()))
            .copied()
    }

    fn get_or_new_property_node(&mut self, storage: StorageType, name: &str) -> AnalysisResult<NodeId> {
        let value = match self.property_node(storage, name) {
            Some(value) => value,
            None => {
                let value = self.pag.new_fake_value(FakeValue::StorageProperty {
                    storage,
                    name: name.to_string(),
                });
                self.storage_properties
                    .insert((storage, name.to_string()), value);
                value
            }
        };
        self.pag.get_or_new_node(GLOBAL_CID, value, None)
    }

    /// Resolves a dynamic call site for one object its receiver points to,
    /// then lowers the call. Returns the nodes whose flows were extended.
    pub fn add_dynamic_call_edge(
        &mut self,
        cs: &DynCallSite,
        pt: NodeId,
        cid: ContextId,
    ) -> AnalysisResult<Vec<NodeId>> {
        let mut src_nodes = Vec::new();
        for callee in self.dynamic_callees(pt, cs) {
            let callee_id = self.cg.get_or_add_node(callee.signature());
            self.cg.add_dynamic_call_edge(cs.caller, callee_id, cs.stmt);
            if self.cg.detect_reachable(callee_id, cs.caller) {
                continue;
            }

            let callee_cid = self.callee_context(cid, callee_id)?;
            let static_cs = CallSite {
                stmt: cs.stmt,
                args: cs.args.clone(),
                callee: callee_id,
                caller: cs.caller,
            };
            src_nodes.extend(self.add_static_pag_call_edge(&static_cs, cid, Some(callee_cid))?);

            if let Some(base) = cs.base {
                if !self.cg[callee_id].is_sdk() {
                    if let Some(node) = self.add_this_ref_call_edge(cid, base, callee, callee_cid)? {
                        src_nodes.push(node);
                    }
                }
            }
        }
        Ok(src_nodes)
    }

    fn dynamic_callees(&self, pt: NodeId, cs: &DynCallSite) -> Vec<&'a Method> {
        let repo = self.repo;
        let node = &self.pag[pt];
        if let Some(signature) = node.function() {
            return repo.get_method(signature).into_iter().collect();
        }
        if node.kind() != PagNodeKind::HeapObj {
            return Vec::new();
        }
        // arrays have no methods of their own
        if node.object().map_or(false, ObjectData::is_array) {
            return function_args(repo, &cs.args);
        }

        let callee = self
            .pag
            .allocated_class(node.value())
            .and_then(|class| repo.get_class_by_name(class))
            .and_then(|class| repo.find_method_in_hierarchy(class, &cs.signature.name))
            .or_else(|| repo.get_method(&cs.signature));
        match callee {
            Some(callee) => vec![callee],
            None => function_args(repo, &cs.args),
        }
    }

    /// Resolves a call site whose receiver never got any object, from the
    /// invoked signature.
    pub fn handle_unknown_dynamic_call(
        &mut self,
        cs: &DynCallSite,
        cid: ContextId,
    ) -> AnalysisResult<Vec<NodeId>> {
        let repo = self.repo;
        let callees = match repo.get_method(&cs.signature) {
            Some(callee) => vec![callee],
            None => function_args(repo, &cs.args),
        };
        log::debug!(
            "unknown dynamic call to {} in {} (context {}): {} callees",
            cs.signature,
            self.cg[cs.caller].signature(),
            cid,
            callees.len()
        );

        let mut src_nodes = Vec::new();
        for callee in callees {
            let callee_id = self.cg.get_or_add_node(callee.signature());
            if self.process_storage(cs.stmt, &cs.args, callee_id, cid)? {
                if let Some(arg) = cs.args.first() {
                    if !repo[*arg].is_pointer_free() {
                        src_nodes.push(self.get_or_new_pag_node(cid, PagValue::Ir(*arg), None)?);
                    }
                }
            }

            self.cg.add_dynamic_call_edge(cs.caller, callee_id, cs.stmt);
            if !self.cg.detect_reachable(callee_id, cs.caller) {
                let callee_cid = self.callee_context(cid, callee_id)?;
                let static_cs = CallSite {
                    stmt: cs.stmt,
                    args: cs.args.clone(),
                    callee: callee_id,
                    caller: cs.caller,
                };
                src_nodes.extend(self.add_static_pag_call_edge(&static_cs, cid, Some(callee_cid))?);
            }
        }
        Ok(src_nodes)
    }

    /// Dynamic calls of the methods lowered since the last sweep that no
    /// receiver object resolved.
    pub fn handle_unprocessed_call_sites(
        &mut self,
        processed: &BTreeSet<CallStmt>,
    ) -> AnalysisResult<Vec<NodeId>> {
        let mut src_nodes = Vec::new();
        for func in std::mem::take(&mut self.funcs_handled_this_round) {
            let Some(fpag) = self.func_pags.get(&func) else {
                log::error!("no summary for handled function {}", self.cg[func].signature());
                continue;
            };
            let call_sites: Vec<DynCallSite> = fpag
                .dynamic_call_sites()
                .iter()
                .filter(|cs| !processed.contains(&cs.stmt))
                .cloned()
                .collect();
            for cs in call_sites {
                let Some(base) = cs.base else {
                    continue;
                };
                let cids: Vec<ContextId> = self
                    .pag
                    .nodes_by_value(PagValue::Ir(base))
                    .map(|nodes| nodes.keys().copied().collect())
                    .unwrap_or_default();
                for cid in cids {
                    src_nodes.extend(self.handle_unknown_dynamic_call(&cs, cid)?);
                }
            }
        }
        Ok(src_nodes)
    }

    /// Flows the receiver of a call to the `this` of the callee, returns the
    /// receiver node.
    fn add_this_ref_call_edge(
        &mut self,
        cid: ContextId,
        base: ValueUid,
        callee: &Method,
        callee_cid: ContextId,
    ) -> AnalysisResult<Option<NodeId>> {
        let Some(this_ref) = callee.this_ref(self.repo) else {
            log::error!("{} has no this reference", callee.signature());
            return Ok(None);
        };
        let this_node = self.get_or_new_pag_node(callee_cid, PagValue::Ir(this_ref), None)?;
        let base_node = self.get_or_new_pag_node(cid, PagValue::Ir(base), None)?;
        self.pag.add_edge(base_node, this_node, PagEdgeKind::This, None);
        Ok(Some(base_node))
    }

    /// Lowers a resolved call: arguments to parameters and returned values
    /// to the call result. Returns the argument nodes.
    pub fn add_static_pag_call_edge(
        &mut self,
        cs: &CallSite,
        caller_cid: ContextId,
        callee_cid: Option<ContextId>,
    ) -> AnalysisResult<Vec<NodeId>> {
        let repo = self.repo;
        let callee_cid = match callee_cid {
            Some(cid) => cid,
            None => self.callee_context(caller_cid, cs.callee)?,
        };
        let Some(callee) = self.cg.method_of(cs.callee) else {
            return Ok(Vec::new());
        };
        if self.cg[cs.callee].is_sdk() {
            return self.add_sdk_method_pag_call_edge(cs, caller_cid, callee_cid, callee);
        }
        if !callee.has_body() {
            return Ok(Vec::new());
        }

        // singletons are lowered in the empty context
        let callee_cid = self
            .build_func_pag_and_add_to_worklist(CsFunc {
                cid: callee_cid,
                func: cs.callee,
            })?
            .cid;

        let stmt = cs.stmt.ir();
        let mut src_nodes = Vec::new();
        for (arg, param) in cs.args.iter().zip(callee.parameter_refs(repo)) {
            if repo[*arg].is_pointer_free() {
                continue;
            }
            let src = self.get_or_new_pag_node(caller_cid, PagValue::Ir(*arg), stmt)?;
            let dst = self.get_or_new_pag_node(callee_cid, PagValue::Ir(param), stmt)?;
            self.pag.add_edge(src, dst, PagEdgeKind::Copy, stmt);
            src_nodes.push(src);
        }

        if let Some(result) = self.call_result(cs.stmt) {
            for ret_stmt in callee.iter_stmts() {
                let StmtKind::Return(Some(ret)) = repo[ret_stmt].kind() else {
                    continue;
                };
                if !repo[*ret].is_local() {
                    log::debug!(
                        "returned value {} of {} is not a local",
                        repo.display_value(*ret),
                        callee.signature()
                    );
                    continue;
                }
                let src = self.get_or_new_pag_node(callee_cid, PagValue::Ir(*ret), Some(ret_stmt))?;
                let dst = self.get_or_new_pag_node(caller_cid, PagValue::Ir(result), stmt)?;
                self.pag.add_edge(src, dst, PagEdgeKind::Copy, Some(ret_stmt));
            }
        }
        Ok(src_nodes)
    }

    fn add_sdk_method_pag_call_edge(
        &mut self,
        cs: &CallSite,
        caller_cid: ContextId,
        callee_cid: ContextId,
        callee: &Method,
    ) -> AnalysisResult<Vec<NodeId>> {
        let repo = self.repo;
        self.build_sdk_func_pag(cs.callee);
        let stmt = cs.stmt.ir();

        // one fake object returned per context
        if let (Type::Class(_), Some(result)) = (callee.return_type(), self.call_result(cs.stmt)) {
            let key = (cs.callee, callee_cid);
            let value = match self.sdk_return_values.get(&key) {
                Some(value) => *value,
                None => {
                    let value = self.pag.new_fake_value(FakeValue::SdkReturn {
                        method: callee.signature().clone(),
                        ty: callee.return_type().clone(),
                    });
                    self.sdk_return_values.insert(key, value);
                    value
                }
            };
            let src = self.pag.get_or_new_node(callee_cid, value, None)?;
            let dst = self.get_or_new_pag_node(caller_cid, PagValue::Ir(result), stmt)?;
            self.pag.add_edge(src, dst, PagEdgeKind::Address, stmt);
        }

        // callbacks passed to the method are called by it
        let params = self
            .sdk_param_values
            .get(&cs.callee)
            .cloned()
            .unwrap_or_default();
        let mut src_nodes = Vec::new();
        for (index, arg) in cs.args.iter().enumerate() {
            let Type::Function(signature) = repo[*arg].ty() else {
                continue;
            };
            let Some(param) = params.get(index).filter(|_| repo[*arg].is_local()) else {
                continue;
            };
            let src = self.get_or_new_pag_node(caller_cid, PagValue::Ir(*arg), stmt)?;
            let dst = self.pag.get_or_new_node(callee_cid, *param, stmt)?;
            let potential_callee = self.cg.get_node(signature);
            if let Some(local) = self.pag[dst].local_mut() {
                local.set_sdk_param();
                local.add_dyn_call_site(DynCallSite {
                    caller: cs.callee,
                    stmt: CallStmt::SdkCallback {
                        method: cs.callee,
                        param: index,
                    },
                    args: Vec::new(),
                    potential_callee,
                    signature: signature.clone(),
                    base: None,
                });
            }
            self.pag.add_edge(src, dst, PagEdgeKind::Copy, stmt);
            src_nodes.push(src);
        }
        Ok(src_nodes)
    }

    fn handle_value_from_external_scope(
        &mut self,
        value: ValueUid,
        func: FuncId,
        origin: Option<ValueUid>,
    ) {
        let repo = self.repo;
        let v = &repo[value];
        match v.kind() {
            ValueKind::Local { name } => {
                if v.declaring_stmt().is_some()
                    || name == THIS_NAME
                    || v.ty().is_function()
                    || self.pag.is_global_this_local(value)
                {
                    return;
                }
                if let Some(src) = self.source_value_from_external_scope(value, func) {
                    self.add_inter_func_edge(src, origin.unwrap_or(value), func);
                }
            }
            ValueKind::InstanceFieldRef { base, .. } => {
                self.handle_value_from_external_scope(*base, func, Some(value));
            }
            _ => (),
        }
    }

    fn add_inter_func_edge(&mut self, src: ValueUid, dst: ValueUid, func: FuncId) {
        let repo = self.repo;
        match repo[dst].kind() {
            ValueKind::Local { .. } => {
                self.inter_func_pags
                    .entry(func)
                    .or_default()
                    .add_edge(InterProceduralEdge {
                        src,
                        dst,
                        kind: PagEdgeKind::InterProceduralCopy,
                    });
                self.add_export_variable(src, dst);
            }
            ValueKind::InstanceFieldRef { base, .. } => self.add_export_variable(src, *base),
            _ => return,
        }
        log::trace!(
            "{} flows from external {}",
            repo.display_value(dst),
            repo.display_value(src)
        );

        let source_func = repo[src]
            .method()
            .and_then(|method| self.cg.get_node(repo[method].signature()));
        if let Some(source_func) = source_func {
            self.pending_sources.push(source_func);
        }
    }

    fn add_export_variable(&mut self, src: ValueUid, dst: ValueUid) {
        let dst = self.pag.normalize(PagValue::Ir(dst));
        let dsts = self.export_map.entry(PagValue::Ir(src)).or_default();
        if !dsts.contains(&dst) {
            dsts.push(dst);
        }
    }

    /// Values an external source flows to.
    #[must_use]
    pub fn export_variables(&self, src: PagValue) -> &[PagValue] {
        self.export_map.get(&src).map_or(&[], Vec::as_slice)
    }

    /// Defining value of a local used but not declared by a method: a local
    /// of an enclosing namespace or file top level code, or an imported value.
    #[must_use]
    pub fn source_value_from_external_scope(&self, value: ValueUid, func: FuncId) -> Option<ValueUid> {
        let repo = self.repo;
        let method = self.cg.method_of(func)?;
        let name = repo[value].local_name()?;
        let scope_local = |class| {
            repo.default_method(class)
                .and_then(|default| default.get_local(name))
                .filter(|local| *local != value)
        };

        let mut namespace = repo[method.class()].namespace();
        while let Some(uid) = namespace {
            let ns = &repo[uid];
            if let Some(local) = ns.default_class().and_then(scope_local) {
                return Some(local);
            }
            namespace = ns.parent();
        }

        let file = repo.method_file(method)?;
        if let Some(local) = file.default_class().and_then(scope_local) {
            return Some(local);
        }
        repo.resolve_import(file, name).filter(|local| *local != value)
    }

    pub fn add_updated_node(&mut self, node: NodeId, diff: &PtsSet) {
        self.updated_nodes.entry(node).or_default().union_with(diff);
    }

    /// Nodes whose points-to set grew since the last call, with the new targets.
    pub fn take_updated_nodes(&mut self) -> BTreeMap<NodeId, PtsSet> {
        std::mem::take(&mut self.updated_nodes)
    }

    pub fn set_pts(&mut self, node: NodeId, pts: PtsSet) {
        self.pag.set_pts(node, pts);
    }

    /// Methods of the call graph never summarized.
    #[must_use]
    pub fn unhandled_funcs(&self) -> Vec<FuncId> {
        self.cg
            .iter_nodes()
            .map(|(id, _)| id)
            .filter(|id| !self.func_pags.contains_key(id))
            .collect()
    }

    #[must_use]
    pub fn handled_funcs(&self) -> Vec<FuncId> {
        self.func_pags.keys().copied().collect()
    }

    pub fn do_stat(&mut self) {
        self.stat.nb_nodes = self.pag.nb_nodes();
    }
}

/// Methods passed as function pointers among the arguments.
fn function_args<'r>(repo: &'r Repo, args: &[ValueUid]) -> Vec<&'r Method> {
    args.iter()
        .filter_map(|arg| match repo[*arg].ty() {
            Type::Function(signature) => repo.get_method(signature),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::CallGraphBuilder;
    use crate::pointer::framework::{ArkUiModel, NoFrameworkModel};
    use crate::repo::MethodSignature;
    use petgraph::Direction;

    fn builder<'a>(repo: &'a Repo, k: usize) -> PagBuilder<'a> {
        let mut cg = CallGraph::new(repo);
        CallGraphBuilder::new(&mut cg).build_direct_call_graph_for_repo();
        PagBuilder::new(cg, k, Box::new(ArkUiModel))
    }

    fn func(builder: &PagBuilder, sig: &str) -> FuncId {
        builder.cg().get_node(&MethodSignature::parse(sig)).unwrap()
    }

    fn local(repo: &Repo, sig: &str, name: &str) -> PagValue {
        let method = repo.get_method(&MethodSignature::parse(sig)).unwrap();
        PagValue::Ir(method.get_local(name).unwrap())
    }

    #[test]
    fn summary_edge_kinds() {
        let repo = Repo::from_json_str(
            r#"{"files": [{"name": "s.ts", "classes": [
                {"name": "Main", "methods": [
                    {"name": "main", "static": true, "body": [
                        {"assign": ["x", {"new": "A"}]},
                        {"assign": ["y", "x"]},
                        {"assign": [{"field": ["y", "f"]}, "x"]},
                        {"assign": ["z", {"field": ["y", "f"]}]},
                        {"assign": [{"static_field": "Main.s"}, "z"]},
                        {"assign": ["w", {"static_field": "Main.s"}]},
                        {"assign": ["c", {"const": "1"}]},
                        {"assign": ["k", {"func": "Main.main"}]},
                        {"assign": ["g", "globalThis"]}
                    ]}
                ]}
            ]}]}"#,
        )
        .unwrap();
        let mut builder = builder(&repo, 1);
        let main = func(&builder, "Main.main");
        assert!(builder.build_func_pag(main).unwrap());
        assert!(!builder.build_func_pag(main).unwrap());

        let kinds: Vec<PagEdgeKind> = builder
            .func_pag(main)
            .unwrap()
            .internal_edges()
            .iter()
            .map(|edge| edge.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                PagEdgeKind::Address,
                PagEdgeKind::Copy,
                PagEdgeKind::Write,
                PagEdgeKind::Load,
                PagEdgeKind::Copy,
                PagEdgeKind::Copy,
                PagEdgeKind::Address,
                PagEdgeKind::Address,
            ]
        );

        // both accesses to y.f and both accesses to Main.s share a value
        let edges = builder.func_pag(main).unwrap().internal_edges();
        assert_eq!(edges[2].dst, edges[3].src);
        assert_eq!(edges[4].dst, edges[5].src);
        assert!(!builder.is_singleton_function(main));
    }

    #[test]
    fn lowering_is_done_once_per_context() {
        let repo = Repo::from_json_str(
            r#"{"files": [{"name": "l.ts", "classes": [
                {"name": "Main", "methods": [
                    {"name": "main", "static": true, "body": [
                        {"assign": ["a", {"new": "A"}]},
                        {"call": {"result": "r", "method": "Main.id", "args": ["a"]}}
                    ]},
                    {"name": "id", "static": true, "params": [{"name": "p"}], "body": [
                        {"return": "p"}
                    ]}
                ]}
            ]}]}"#,
        )
        .unwrap();
        let mut builder = builder(&repo, 1);
        let main = func(&builder, "Main.main");
        builder.build_for_entries(&[main]).unwrap();

        // a -> @parameter0 -> p -> r
        let a = builder.pag().nodes_by_value(local(&repo, "Main.main", "a")).unwrap();
        let r = builder.pag().nodes_by_value(local(&repo, "Main.main", "r")).unwrap();
        let p = builder.pag().nodes_by_value(local(&repo, "Main.id", "p")).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(r.len(), 1);
        assert_eq!(p.len(), 1);
        let (main_cid, a) = a.iter().next().map(|(cid, id)| (*cid, *id)).unwrap();
        let (_, r) = r.iter().next().unwrap();
        assert_eq!(builder.pag().neighbors(a, Direction::Outgoing, PagEdgeKind::is_copy).len(), 1);
        assert_eq!(builder.pag().neighbors(*r, Direction::Incoming, PagEdgeKind::is_copy).len(), 1);

        let nb_nodes = builder.pag().nb_nodes();
        let nb_edges = builder.pag().nb_edges();
        builder.build_pag_from_func_pag(main, main_cid).unwrap();
        assert_eq!(builder.pag().nb_nodes(), nb_nodes);
        assert_eq!(builder.pag().nb_edges(), nb_edges);

        let id = func(&builder, "Main.id");
        assert!(builder.handled_funcs().contains(&id));
        // only the empty top level code of the file
        assert_eq!(builder.unhandled_funcs().len(), 1);
    }

    #[test]
    fn singleton_factories_share_the_empty_context() {
        let json = r#"{"files": [{"name": "g.ts", "classes": [
            {"name": "S", "methods": [
                {"name": "instance", "static": true, "body": [
                    {"assign": ["o", {"new": "S"}]},
                    {"assign": [{"static_field": "S.inst"}, "o"]},
                    {"assign": ["r", {"static_field": "S.inst"}]},
                    {"return": "r"}
                ]},
                {"name": "fresh", "static": true, "body": [
                    {"assign": ["o", {"new": "S"}]},
                    {"return": "o"}
                ]}
            ]}
        ]}]}"#;
        let repo = Repo::from_json_str(json).unwrap();
        let mut arkui = builder(&repo, 1);
        let instance = func(&arkui, "S.instance");
        let fresh = func(&arkui, "S.fresh");
        arkui.build_func_pag(instance).unwrap();
        arkui.build_func_pag(fresh).unwrap();
        assert!(arkui.is_singleton_function(instance));
        assert!(!arkui.is_singleton_function(fresh));
        let cs = arkui
            .build_func_pag_and_add_to_worklist(CsFunc { cid: 3, func: instance })
            .unwrap();
        assert_eq!(cs.cid, DUMMY_CID);

        let mut cg = CallGraph::new(&repo);
        CallGraphBuilder::new(&mut cg).build_direct_call_graph_for_repo();
        let mut plain = PagBuilder::new(cg, 1, Box::new(NoFrameworkModel));
        plain.build_func_pag(instance).unwrap();
        assert!(!plain.is_singleton_function(instance));
    }

    #[test]
    fn external_scope_values() {
        let repo = Repo::from_json_str(
            r#"{"files": [
                {"name": "lib.ts",
                 "default": {"body": [{"assign": ["shared", {"new": "A"}]}]},
                 "exports": ["shared"]},
                {"name": "main.ts",
                 "imports": [{"name": "s", "from": "lib.ts", "export": "shared"}],
                 "default": {"body": [{"assign": ["top", {"new": "B"}]}]},
                 "classes": [{"name": "Main", "methods": [
                    {"name": "main", "static": true, "body": [
                        {"assign": ["x", "s"]},
                        {"assign": ["y", "top"]},
                        {"assign": ["z", {"field": ["top", "f"]}]}
                    ]}
                 ]}]}
            ]}"#,
        )
        .unwrap();
        let mut builder = builder(&repo, 1);
        let main = func(&builder, "Main.main");
        let shared = repo
            .resolve_import(repo.get_file_by_name("main.ts").unwrap(), "s")
            .unwrap();
        let s = match local(&repo, "Main.main", "s") {
            PagValue::Ir(uid) => uid,
            PagValue::Fake(_) => unreachable!(),
        };
        assert_eq!(builder.source_value_from_external_scope(s, main), Some(shared));

        builder.build_for_entries(&[main]).unwrap();
        // the defining methods were summarized and lowered too
        assert_eq!(builder.handled_funcs().len(), 3);
        assert_eq!(
            builder.export_variables(PagValue::Ir(shared)),
            &[local(&repo, "Main.main", "s")]
        );
        let top = local(&repo, "%dflt@main.ts.%dflt", "top");
        assert_eq!(builder.export_variables(top).len(), 1);

        let hubs = builder
            .pag()
            .iter_nodes()
            .filter(|(_, node)| node.kind() == PagNodeKind::ExportInfo)
            .count();
        assert_eq!(hubs, 2);
    }

    #[test]
    fn sdk_callbacks_and_returns() {
        let repo = Repo::from_json_str(
            r#"{"files": [
                {"name": "sdk.d.ts", "sdk": true, "classes": [{"name": "Api", "methods": [
                    {"name": "make", "static": true, "params": [{"name": "cb", "type": "fn:Main.cb"}],
                     "returns": "Widget"}
                ]}]},
                {"name": "m.ts", "classes": [{"name": "Main", "methods": [
                    {"name": "main", "static": true, "body": [
                        {"assign": ["k", {"func": "Main.cb"}]},
                        {"call": {"result": "w", "method": "Api.make", "args": ["cb"]}}
                    ]},
                    {"name": "cb", "static": true, "body": []}
                ]}]}
            ]}"#,
        )
        .unwrap();
        let mut builder = builder(&repo, 1);
        let main = func(&builder, "Main.main");
        builder.build_for_entries(&[main]).unwrap();

        let sdk_objects: Vec<NodeId> = builder
            .pag()
            .iter_nodes()
            .filter(|(_, node)| {
                node.kind() == PagNodeKind::HeapObj
                    && builder.pag().allocated_class(node.value()) == Some("Widget")
            })
            .map(|(id, _)| id)
            .collect();
        assert_eq!(sdk_objects.len(), 1);

        let params: Vec<_> = builder
            .pag()
            .iter_nodes()
            .filter_map(|(_, node)| node.local())
            .filter(|local| local.is_sdk_param())
            .collect();
        assert_eq!(params.len(), 1);
        let callback = params[0].dyn_call_sites().next().unwrap();
        assert!(matches!(callback.stmt, CallStmt::SdkCallback { param: 0, .. }));
        assert_eq!(callback.signature, MethodSignature::parse("Main.cb"));
    }

    #[test]
    fn missing_call_site_is_an_error() {
        let repo = Repo::from_json_str(
            r#"{"files": [{"name": "e.ts", "classes": [{"name": "Main", "methods": [
                {"name": "main", "static": true, "body": [{"call": {"method": "Main.main"}}]}
            ]}]}]}"#,
        )
        .unwrap();
        // call graph without any call site
        let mut cg = CallGraph::new(&repo);
        let main = cg.add_node(&MethodSignature::parse("Main.main"), CallGraphNodeKind::Real);
        let mut builder = PagBuilder::new(cg, 1, Box::new(ArkUiModel));
        assert!(matches!(
            builder.build_func_pag(main),
            Err(AnalysisError::CallSiteNotFound(_))
        ));
    }
}
