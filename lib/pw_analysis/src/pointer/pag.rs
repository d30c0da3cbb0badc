//! Pointer assignment graph.
//!
//! Nodes are (value, context) pairs, edges describe how pointers flow
//! between them. Abstract field nodes (declared on a base value) are cloned
//! into concrete field nodes once per object their base points to, the
//! clones are memoized on the object node.

use super::context::{ContextId, GLOBAL_CID};
use super::framework::StorageType;
use super::pts::PtsSet;
use crate::callgraph::{CallStmt, DynCallSite};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::graph::{self, GraphEdge, GraphNode, NodeId};
use crate::repo::{FieldSignature, MethodSignature, Repo, StmtKind, StmtUid, Type, ValueKind, ValueUid};
use crate::GLOBAL_THIS_NAME;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::ops;
use std::path::Path;

/// Value synthesized by the analysis, with no counterpart in the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeValue {
    /// The global object, shared by every context.
    GlobalThis,
    /// Parameter of a method without body.
    SdkParam {
        method: MethodSignature,
        index: usize,
        ty: Type,
    },
    /// Object returned by a method without body.
    SdkReturn { method: MethodSignature, ty: Type },
    StorageProperty { storage: StorageType, name: String },
    /// Hub gathering the values of an exported (or captured) local.
    Export { local: ValueUid },
}

/// Identity of the value held by a PAG node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PagValue {
    Ir(ValueUid),
    Fake(usize),
}

impl From<ValueUid> for PagValue {
    fn from(uid: ValueUid) -> Self {
        Self::Ir(uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PagNodeKind {
    HeapObj,
    LocalVar,
    RefVar,
    Param,
    ThisRef,
    Function,
    GlobalThis,
    ExportInfo,
}

impl fmt::Display for PagNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::HeapObj => "HeapObj",
            Self::LocalVar => "LocalVar",
            Self::RefVar => "RefVar",
            Self::Param => "Param",
            Self::ThisRef => "ThisRef",
            Self::Function => "Function",
            Self::GlobalThis => "GlobalThis",
            Self::ExportInfo => "ExportInfo",
        };
        write!(f, "{name}")
    }
}

/// Per local bookkeeping: calls whose receiver is held by the local.
#[derive(Debug, Clone, Default)]
pub struct LocalData {
    dyn_call_sites: BTreeMap<CallStmt, DynCallSite>,
    unknown_call_sites: BTreeMap<CallStmt, DynCallSite>,
    storage: Option<(StorageType, String)>,
    sdk_param: bool,
}

impl LocalData {
    pub fn add_dyn_call_site(&mut self, cs: DynCallSite) {
        self.dyn_call_sites.entry(cs.stmt).or_insert(cs);
    }

    pub fn dyn_call_sites(&self) -> impl Iterator<Item = &DynCallSite> {
        self.dyn_call_sites.values()
    }

    pub fn add_unknown_call_site(&mut self, cs: DynCallSite) {
        self.unknown_call_sites.entry(cs.stmt).or_insert(cs);
    }

    pub fn unknown_call_sites(&self) -> impl Iterator<Item = &DynCallSite> {
        self.unknown_call_sites.values()
    }

    pub fn set_storage_link(&mut self, storage: StorageType, property: &str) {
        self.storage = Some((storage, property.to_string()));
    }

    /// Storage and property name the local is bound to.
    #[must_use]
    pub fn storage(&self) -> Option<(StorageType, &str)> {
        self.storage
            .as_ref()
            .map(|(storage, name)| (*storage, name.as_str()))
    }

    pub fn set_sdk_param(&mut self) {
        self.sdk_param = true;
    }

    #[inline]
    #[must_use]
    pub const fn is_sdk_param(&self) -> bool {
        self.sdk_param
    }
}

/// Field nodes cloned for an object.
#[derive(Debug, Clone, Default)]
pub struct ObjectData {
    fields: BTreeMap<FieldSignature, NodeId>,
    element: Option<NodeId>,
    array: bool,
}

impl ObjectData {
    #[must_use]
    pub fn field(&self, field: &FieldSignature) -> Option<NodeId> {
        self.fields.get(field).copied()
    }

    pub fn iter_fields(&self) -> impl Iterator<Item = (&FieldSignature, NodeId)> {
        self.fields.iter().map(|(field, id)| (field, *id))
    }

    #[inline]
    #[must_use]
    pub const fn element(&self) -> Option<NodeId> {
        self.element
    }

    #[inline]
    #[must_use]
    pub const fn is_array(&self) -> bool {
        self.array
    }
}

#[derive(Debug, Clone)]
pub enum PagNodeData {
    Local(LocalData),
    /// Abstract array element access `a[i]`.
    Array,
    /// Abstract instance or static field access.
    Field,
    Param,
    ThisRef,
    Function(MethodSignature),
    HeapObj(ObjectData),
    GlobalThis(ObjectData),
    ExportInfo,
}

impl PagNodeData {
    fn fresh_copy(&self) -> Self {
        match self {
            Self::Local(_) => Self::Local(LocalData::default()),
            Self::HeapObj(obj) => Self::HeapObj(ObjectData {
                array: obj.array,
                ..ObjectData::default()
            }),
            Self::GlobalThis(_) => Self::GlobalThis(ObjectData::default()),
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PagNode {
    cid: ContextId,
    value: PagValue,
    stmt: Option<StmtUid>,
    pts: PtsSet,
    base_pt: Option<NodeId>,
    cloned_from: Option<NodeId>,
    data: PagNodeData,
    // rendered value, statement and method
    label: String,
}

impl fmt::Display for PagNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} Ctx: ", self.kind())?;
        if self.cid == GLOBAL_CID {
            write!(f, "global")?;
        } else {
            write!(f, "{}", self.cid)?;
        }
        if let Some(base) = self.base_pt {
            write!(f, " base:{{{}}}", base.index())?;
        }
        let pts: Vec<String> = self.pts.iter().map(|pt| pt.index().to_string()).collect();
        write!(f, " pts:{{{}}}\n{}", pts.join(","), self.label)
    }
}

impl GraphNode for PagNode {
    fn dot_attr(&self) -> String {
        match self.kind() {
            PagNodeKind::HeapObj | PagNodeKind::Function | PagNodeKind::GlobalThis => {
                "shape=box3d".to_string()
            }
            PagNodeKind::RefVar => "shape=component".to_string(),
            PagNodeKind::ExportInfo => "shape=tab,color=purple".to_string(),
            PagNodeKind::ThisRef => "shape=box,color=orange".to_string(),
            PagNodeKind::LocalVar | PagNodeKind::Param => "shape=box".to_string(),
        }
    }
}

impl PagNode {
    #[must_use]
    pub const fn kind(&self) -> PagNodeKind {
        match self.data {
            PagNodeData::Local(_) | PagNodeData::Array => PagNodeKind::LocalVar,
            PagNodeData::Field => PagNodeKind::RefVar,
            PagNodeData::Param => PagNodeKind::Param,
            PagNodeData::ThisRef => PagNodeKind::ThisRef,
            PagNodeData::Function(_) => PagNodeKind::Function,
            PagNodeData::HeapObj(_) => PagNodeKind::HeapObj,
            PagNodeData::GlobalThis(_) => PagNodeKind::GlobalThis,
            PagNodeData::ExportInfo => PagNodeKind::ExportInfo,
        }
    }

    #[inline]
    #[must_use]
    pub const fn cid(&self) -> ContextId {
        self.cid
    }

    #[inline]
    #[must_use]
    pub const fn value(&self) -> PagValue {
        self.value
    }

    #[inline]
    #[must_use]
    pub const fn stmt(&self) -> Option<StmtUid> {
        self.stmt
    }

    /// Propagated points-to set, as of the last time the node was processed.
    #[inline]
    #[must_use]
    pub const fn pts(&self) -> &PtsSet {
        &self.pts
    }

    /// Object the base of a cloned field node points to.
    #[inline]
    #[must_use]
    pub const fn base_pt(&self) -> Option<NodeId> {
        self.base_pt
    }

    #[inline]
    #[must_use]
    pub const fn cloned_from(&self) -> Option<NodeId> {
        self.cloned_from
    }

    #[inline]
    #[must_use]
    pub const fn data(&self) -> &PagNodeData {
        &self.data
    }

    #[must_use]
    pub const fn local(&self) -> Option<&LocalData> {
        match &self.data {
            PagNodeData::Local(local) => Some(local),
            _ => None,
        }
    }

    pub fn local_mut(&mut self) -> Option<&mut LocalData> {
        match &mut self.data {
            PagNodeData::Local(local) => Some(local),
            _ => None,
        }
    }

    /// Field clones of an object like node.
    #[must_use]
    pub const fn object(&self) -> Option<&ObjectData> {
        match &self.data {
            PagNodeData::HeapObj(obj) | PagNodeData::GlobalThis(obj) => Some(obj),
            _ => None,
        }
    }

    /// Method designated by a function pointer node.
    #[must_use]
    pub const fn function(&self) -> Option<&MethodSignature> {
        match &self.data {
            PagNodeData::Function(signature) => Some(signature),
            _ => None,
        }
    }

    /// Objects, functions and the global object are the only possible
    /// points-to targets.
    #[must_use]
    pub const fn is_object_like(&self) -> bool {
        matches!(
            self.data,
            PagNodeData::HeapObj(_) | PagNodeData::GlobalThis(_) | PagNodeData::Function(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PagEdgeKind {
    Address,
    Copy,
    Load,
    Write,
    This,
    InterProceduralCopy,
}

impl PagEdgeKind {
    /// Copy edges, whether they stay inside a procedure or not.
    #[inline]
    #[must_use]
    pub const fn is_copy(self) -> bool {
        matches!(self, Self::Copy | Self::InterProceduralCopy)
    }
}

impl fmt::Display for PagEdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Address => "Address",
            Self::Copy => "Copy",
            Self::Load => "Load",
            Self::Write => "Write",
            Self::This => "This",
            Self::InterProceduralCopy => "InterProceduralCopy",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct PagEdge {
    kind: PagEdgeKind,
    stmt: Option<StmtUid>,
    // argument passing or value return
    through_call: bool,
}

impl fmt::Display for PagEdge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl GraphEdge for PagEdge {
    fn dot_attr(&self) -> String {
        match self.kind {
            PagEdgeKind::Address => "color=green".to_string(),
            PagEdgeKind::Copy if self.through_call => "color=black,style=dotted".to_string(),
            PagEdgeKind::Copy => "color=black".to_string(),
            PagEdgeKind::Load => "color=red".to_string(),
            PagEdgeKind::Write => "color=blue".to_string(),
            PagEdgeKind::This => "color=orange".to_string(),
            PagEdgeKind::InterProceduralCopy => "color=purple,style=dashed".to_string(),
        }
    }
}

impl PagEdge {
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> PagEdgeKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn stmt(&self) -> Option<StmtUid> {
        self.stmt
    }
}

pub struct Pag<'a> {
    repo: &'a Repo,
    inner: StableDiGraph<PagNode, PagEdge>,
    fake_values: Vec<FakeValue>,
    global_this: PagValue,
    value_nodes: HashMap<PagValue, BTreeMap<ContextId, NodeId>>,
    // abstract field nodes, by base value of the access
    base_nodes: HashMap<PagValue, BTreeMap<ContextId, Vec<NodeId>>>,
    edges: HashSet<(NodeId, NodeId, PagEdgeKind)>,
    // pointer introducing edges added since the last reset
    stash_addr_edges: Vec<(NodeId, NodeId)>,
    // already solved nodes given new outgoing flows
    stash_reanalyze: Vec<NodeId>,
    cloned_nodes: HashMap<NodeId, BTreeMap<NodeId, NodeId>>,
}

impl<'a> ops::Index<NodeId> for Pag<'a> {
    type Output = PagNode;

    fn index(&self, id: NodeId) -> &PagNode {
        &self.inner[id]
    }
}

impl<'a> ops::IndexMut<NodeId> for Pag<'a> {
    fn index_mut(&mut self, id: NodeId) -> &mut PagNode {
        &mut self.inner[id]
    }
}

impl<'a> Pag<'a> {
    #[must_use]
    pub fn new(repo: &'a Repo) -> Self {
        Self {
            repo,
            inner: StableDiGraph::new(),
            fake_values: vec![FakeValue::GlobalThis],
            global_this: PagValue::Fake(0),
            value_nodes: HashMap::new(),
            base_nodes: HashMap::new(),
            edges: HashSet::new(),
            stash_addr_edges: Vec::new(),
            stash_reanalyze: Vec::new(),
            cloned_nodes: HashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn repo(&self) -> &'a Repo {
        self.repo
    }

    /// The value standing for the global object.
    #[inline]
    #[must_use]
    pub const fn global_this_value(&self) -> PagValue {
        self.global_this
    }

    pub fn new_fake_value(&mut self, value: FakeValue) -> PagValue {
        self.fake_values.push(value);
        PagValue::Fake(self.fake_values.len() - 1)
    }

    #[must_use]
    pub fn fake_value(&self, id: usize) -> Option<&FakeValue> {
        self.fake_values.get(id)
    }

    /// Whether an IR local is the implicit global object.
    #[must_use]
    pub fn is_global_this_local(&self, uid: ValueUid) -> bool {
        let value = &self.repo[uid];
        value.local_name() == Some(GLOBAL_THIS_NAME) && value.declaring_stmt().is_none()
    }

    /// Declared type of a value.
    #[must_use]
    pub fn value_type(&self, value: PagValue) -> Type {
        match value {
            PagValue::Ir(uid) => self.repo[uid].ty().clone(),
            PagValue::Fake(id) => match self.fake_values.get(id) {
                Some(FakeValue::GlobalThis) => Type::Class(GLOBAL_THIS_NAME.to_string()),
                Some(FakeValue::SdkParam { ty, .. } | FakeValue::SdkReturn { ty, .. }) => {
                    ty.clone()
                }
                _ => Type::Unknown,
            },
        }
    }

    /// Class allocated by an allocation value.
    #[must_use]
    pub fn allocated_class(&self, value: PagValue) -> Option<&str> {
        match value {
            PagValue::Ir(uid) => match self.repo[uid].kind() {
                ValueKind::NewExpr { class } => Some(class),
                _ => None,
            },
            PagValue::Fake(id) => match self.fake_values.get(id) {
                Some(FakeValue::SdkReturn { ty, .. }) => ty.class_name(),
                _ => None,
            },
        }
    }

    #[must_use]
    pub fn display_value(&self, value: PagValue) -> String {
        match value {
            PagValue::Ir(uid) => self.repo.display_value(uid),
            PagValue::Fake(id) => match self.fake_values.get(id) {
                Some(FakeValue::GlobalThis) => GLOBAL_THIS_NAME.to_string(),
                Some(FakeValue::SdkParam { method, index, .. }) => {
                    format!("@sdkParam{index}<{method}>")
                }
                Some(FakeValue::SdkReturn { method, ty }) => format!("new {ty} <{method}>"),
                Some(FakeValue::StorageProperty { storage, name }) => format!("{storage}.{name}"),
                Some(FakeValue::Export { local }) => {
                    format!("export {}", self.repo.display_value(*local))
                }
                None => format!("fake#{id}"),
            },
        }
    }

    fn node_data(&self, value: PagValue) -> AnalysisResult<PagNodeData> {
        let data = match value {
            PagValue::Ir(uid) => {
                let v = &self.repo[uid];
                match (v.kind(), v.ty()) {
                    (ValueKind::Local { .. }, Type::Function(signature))
                        if v.declaring_stmt().is_none() =>
                    {
                        PagNodeData::Function(signature.clone())
                    }
                    (ValueKind::Local { .. }, _) if self.is_global_this_local(uid) => {
                        PagNodeData::GlobalThis(ObjectData::default())
                    }
                    (ValueKind::Local { .. }, _) => PagNodeData::Local(LocalData::default()),
                    (
                        ValueKind::InstanceFieldRef { .. } | ValueKind::StaticFieldRef { .. },
                        Type::Function(signature),
                    ) => PagNodeData::Function(signature.clone()),
                    (ValueKind::InstanceFieldRef { .. } | ValueKind::StaticFieldRef { .. }, _) => {
                        PagNodeData::Field
                    }
                    (ValueKind::ArrayRef { .. }, _) => PagNodeData::Array,
                    (ValueKind::NewExpr { .. }, _) => PagNodeData::HeapObj(ObjectData::default()),
                    (ValueKind::NewArrayExpr { .. }, _) => PagNodeData::HeapObj(ObjectData {
                        array: true,
                        ..ObjectData::default()
                    }),
                    (ValueKind::ParameterRef { .. }, _) => PagNodeData::Param,
                    (ValueKind::ThisRef, _) => PagNodeData::ThisRef,
                    (ValueKind::Constant { .. } | ValueKind::Expr { .. }, _) => {
                        return Err(AnalysisError::Internal(format!(
                            "unsupported value {} in pointer assignment graph",
                            self.repo.display_value(uid)
                        )))
                    }
                }
            }
            PagValue::Fake(id) => match self.fake_values.get(id) {
                Some(FakeValue::GlobalThis) => PagNodeData::GlobalThis(ObjectData::default()),
                Some(FakeValue::SdkParam { .. } | FakeValue::StorageProperty { .. }) => {
                    PagNodeData::Local(LocalData::default())
                }
                Some(FakeValue::SdkReturn { .. }) => PagNodeData::HeapObj(ObjectData::default()),
                Some(FakeValue::Export { .. }) => PagNodeData::ExportInfo,
                None => {
                    return Err(AnalysisError::Internal(format!(
                        "unknown synthesized value #{id}"
                    )))
                }
            },
        };
        Ok(data)
    }

    fn label(&self, value: PagValue, stmt: Option<StmtUid>) -> String {
        let mut label = self.display_value(value);
        if let Some(stmt) = stmt {
            let method = &self.repo[self.repo[stmt].method()];
            label.push('\n');
            label.push_str(&self.repo.display_stmt(stmt));
            label.push('\n');
            label.push_str(&method.signature().to_string());
        }
        label
    }

    /// The undeclared `globalThis` local stands for the global object.
    #[must_use]
    pub fn normalize(&self, value: PagValue) -> PagValue {
        match value {
            PagValue::Ir(uid) if self.is_global_this_local(uid) => self.global_this,
            _ => value,
        }
    }

    /// Base of a field or array access.
    #[must_use]
    pub fn access_base(&self, value: PagValue) -> Option<PagValue> {
        let PagValue::Ir(uid) = value else {
            return None;
        };
        let base = self.repo[uid].base()?;
        Some(self.normalize(PagValue::Ir(base)))
    }

    /// Node of the base of an abstract field node, in the same context.
    fn access_base_node(&self, field: NodeId) -> Option<NodeId> {
        let node = &self.inner[field];
        if node.cloned_from.is_some() {
            return None;
        }
        let base = self.access_base(node.value)?;
        self.has_ctx_node(node.cid, base)
    }

    /// Creates a node, `register` tells whether it can be found back by
    /// value (clones cannot).
    fn add_node(
        &mut self,
        cid: ContextId,
        value: PagValue,
        stmt: Option<StmtUid>,
        register: bool,
    ) -> AnalysisResult<NodeId> {
        let data = self.node_data(value)?;
        let cid = match data {
            PagNodeData::GlobalThis(_) | PagNodeData::ExportInfo => GLOBAL_CID,
            _ => cid,
        };
        let is_access = matches!(data, PagNodeData::Field | PagNodeData::Array);
        let node = PagNode {
            cid,
            value,
            stmt,
            pts: PtsSet::new(),
            base_pt: None,
            cloned_from: None,
            data,
            label: self.label(value, stmt),
        };
        let id = self.inner.add_node(node);
        log::trace!("new PAG node {} {}", id.index(), self.inner[id]);

        if register {
            self.value_nodes.entry(value).or_default().insert(cid, id);
            if is_access {
                if let Some(base) = self.access_base(value) {
                    self.base_nodes
                        .entry(base)
                        .or_default()
                        .entry(cid)
                        .or_default()
                        .push(id);
                }
            }
        }
        Ok(id)
    }

    /// Node of a value under a context.
    #[must_use]
    pub fn has_ctx_node(&self, cid: ContextId, value: PagValue) -> Option<NodeId> {
        let nodes = self.value_nodes.get(&self.normalize(value))?;
        if let Some(id) = nodes.get(&cid) {
            return Some(*id);
        }
        // context free nodes
        nodes.get(&GLOBAL_CID).copied()
    }

    pub fn get_or_new_node(
        &mut self,
        cid: ContextId,
        value: PagValue,
        stmt: Option<StmtUid>,
    ) -> AnalysisResult<NodeId> {
        let value = self.normalize(value);
        match self.has_ctx_node(cid, value) {
            Some(id) => Ok(id),
            None => self.add_node(cid, value, stmt, true),
        }
    }

    /// Every node of a value, by context.
    #[must_use]
    pub fn nodes_by_value(&self, value: PagValue) -> Option<&BTreeMap<ContextId, NodeId>> {
        self.value_nodes.get(&self.normalize(value))
    }

    /// Abstract field and element nodes accessed through a base value, by context.
    #[must_use]
    pub fn nodes_by_base_value(
        &self,
        value: PagValue,
    ) -> Option<&BTreeMap<ContextId, Vec<NodeId>>> {
        self.base_nodes.get(&self.normalize(value))
    }

    /// Clones a node for a given points-to target of its base.
    pub fn get_or_clone_node(&mut self, src: NodeId, base_pt: NodeId) -> AnalysisResult<NodeId> {
        if self.inner[src].base_pt.is_some() {
            return Err(AnalysisError::Internal(format!(
                "node {} is a cloned field node and cannot be cloned again",
                src.index()
            )));
        }
        if let Some(id) = self
            .cloned_nodes
            .get(&src)
            .and_then(|clones| clones.get(&base_pt))
        {
            return Ok(*id);
        }

        let node = &self.inner[src];
        let clone = PagNode {
            cid: node.cid,
            value: node.value,
            stmt: node.stmt,
            pts: PtsSet::new(),
            base_pt: None,
            cloned_from: Some(src),
            data: node.data.fresh_copy(),
            label: node.label.clone(),
        };
        let id = self.inner.add_node(clone);
        self.cloned_nodes.entry(src).or_default().insert(base_pt, id);
        Ok(id)
    }

    /// Concrete field node of an abstract field node for an object its base
    /// points to, `None` when the object cannot hold fields.
    pub fn get_or_clone_field_node(
        &mut self,
        src: NodeId,
        base_pt: NodeId,
    ) -> AnalysisResult<Option<NodeId>> {
        let repo = self.repo;
        let field = match self.inner[src].value {
            PagValue::Ir(uid) => repo[uid].field().cloned(),
            PagValue::Fake(_) => None,
        };
        let Some(field) = field else {
            return Err(AnalysisError::Internal(format!(
                "node {} is not a field node",
                src.index()
            )));
        };
        match &self.inner[base_pt].data {
            PagNodeData::HeapObj(obj) | PagNodeData::GlobalThis(obj) if !obj.array => {
                if let Some(existing) = obj.field(&field) {
                    return Ok(Some(existing));
                }
            }
            _ => {
                log::error!(
                    "cannot clone field node {} for {} node {}",
                    self.display_value(self.inner[src].value),
                    self.inner[base_pt].kind(),
                    base_pt.index()
                );
                return Ok(None);
            }
        }

        let id = self.get_or_clone_node(src, base_pt)?;
        self.inner[id].base_pt = Some(base_pt);
        if let PagNodeData::HeapObj(obj) | PagNodeData::GlobalThis(obj) =
            &mut self.inner[base_pt].data
        {
            obj.fields.insert(field, id);
        }
        Ok(Some(id))
    }

    /// Concrete element node of an abstract array access for an array its
    /// base points to, `None` when the target is not an array.
    pub fn get_or_clone_array_element_node(
        &mut self,
        src: NodeId,
        base_pt: NodeId,
    ) -> AnalysisResult<Option<NodeId>> {
        match &self.inner[base_pt].data {
            PagNodeData::HeapObj(obj) if obj.array => {
                if let Some(existing) = obj.element {
                    return Ok(Some(existing));
                }
            }
            _ => {
                log::error!(
                    "cannot clone array element node {} for {} node {}",
                    self.display_value(self.inner[src].value),
                    self.inner[base_pt].kind(),
                    base_pt.index()
                );
                return Ok(None);
            }
        }

        let id = self.get_or_clone_node(src, base_pt)?;
        self.inner[id].base_pt = Some(base_pt);
        if let PagNodeData::HeapObj(obj) = &mut self.inner[base_pt].data {
            obj.element = Some(id);
        }
        Ok(Some(id))
    }

    /// Adds an edge, returns `false` if an edge of the same kind already
    /// connects the two nodes.
    pub fn add_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        kind: PagEdgeKind,
        stmt: Option<StmtUid>,
    ) -> bool {
        if !self.edges.insert((src, dst, kind)) {
            return false;
        }
        let repo = self.repo;
        let through_call = stmt.map_or(false, |stmt| {
            let stmt = &repo[stmt];
            stmt.invoke_expr().is_some() || matches!(stmt.kind(), StmtKind::Return(_))
        });
        self.inner.add_edge(
            src,
            dst,
            PagEdge {
                kind,
                stmt,
                through_call,
            },
        );

        let introduces_pointer = match kind {
            PagEdgeKind::Address => true,
            PagEdgeKind::Copy | PagEdgeKind::InterProceduralCopy => {
                self.inner[src].is_object_like()
            }
            _ => false,
        };
        if introduces_pointer {
            self.stash_addr_edges.push((src, dst));
        }

        // the new flow is missed if its source was solved before
        let solved = match kind {
            PagEdgeKind::Copy | PagEdgeKind::InterProceduralCopy | PagEdgeKind::This => Some(src),
            PagEdgeKind::Load => self.access_base_node(src),
            PagEdgeKind::Write => self.access_base_node(dst),
            PagEdgeKind::Address => None,
        };
        if let Some(solved) = solved {
            if !self.inner[solved].pts.is_empty() {
                self.stash_reanalyze.push(solved);
            }
        }
        log::trace!("new PAG {} edge {} -> {}", kind, src.index(), dst.index());
        true
    }

    /// Marks a solved node to be propagated again.
    pub fn reanalyze(&mut self, id: NodeId) {
        self.stash_reanalyze.push(id);
    }

    /// Solved nodes with new outgoing flows since the last call.
    pub fn take_reanalyze_nodes(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.stash_reanalyze)
    }

    #[must_use]
    pub fn has_edge(&self, src: NodeId, dst: NodeId, kind: PagEdgeKind) -> bool {
        self.edges.contains(&(src, dst, kind))
    }

    /// Pointer introducing edges added since the last call.
    pub fn take_addr_edges(&mut self) -> Vec<(NodeId, NodeId)> {
        std::mem::take(&mut self.stash_addr_edges)
    }

    /// Nodes linked to `id` in the given direction by an edge whose kind
    /// passes `filter`.
    #[must_use]
    pub fn neighbors<F>(&self, id: NodeId, dir: Direction, filter: F) -> Vec<NodeId>
    where
        F: Fn(PagEdgeKind) -> bool,
    {
        self.inner
            .edges_directed(id, dir)
            .filter(|edge| filter(edge.weight().kind))
            .map(|edge| match dir {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .collect()
    }

    pub fn set_pts(&mut self, id: NodeId, pts: PtsSet) {
        self.inner[id].pts = pts;
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &PagNode)> {
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

    #[must_use]
    pub fn to_dot(&self) -> String {
        graph::to_dot(&self.inner, "PAG")
    }

    pub fn dump<P: AsRef<Path>>(&self, path: P) -> AnalysisResult<()> {
        let path = path.as_ref();
        log::debug!("dumping PAG to {:?}", path);
        fs::write(path, self.to_dot()).map_err(|err| AnalysisError::Path(path.to_path_buf(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Method;

    const PROGRAM: &str = r#"{"files": [{"name": "pag.ts", "classes": [
        {"name": "Main", "methods": [
            {"name": "main", "static": true, "body": [
                {"assign": ["x", {"new": "A"}]},
                {"assign": ["arr", {"new_array": "A"}]},
                {"assign": [{"field": ["x", "f"]}, "x"]},
                {"assign": ["y", {"field": ["x", "f"]}]},
                {"assign": [{"array": ["arr", "0"]}, "x"]},
                {"assign": [{"field": ["globalThis", "g"]}, "x"]},
                {"assign": ["k", {"func": "Main.main"}]},
                {"assign": ["c", {"const": "1"}]},
                {"assign": ["b", {"new": "B"}]}
            ]}
        ]}
    ]}]}"#;

    fn main_method(repo: &Repo) -> &Method {
        repo.get_method(&MethodSignature::parse("Main.main")).unwrap()
    }

    fn operand(repo: &Repo, index: usize, left: bool) -> PagValue {
        let stmt = main_method(repo).iter_stmts().nth(index).unwrap();
        match repo[stmt].kind() {
            StmtKind::Assign { left: l, right: r } => PagValue::Ir(if left { *l } else { *r }),
            _ => unreachable!(),
        }
    }

    #[test]
    fn node_kinds_follow_values() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let mut pag = Pag::new(&repo);
        let x = pag.get_or_new_node(1, operand(&repo, 0, true), None).unwrap();
        let obj = pag.get_or_new_node(1, operand(&repo, 0, false), None).unwrap();
        let arr = pag.get_or_new_node(1, operand(&repo, 1, false), None).unwrap();
        let field = pag.get_or_new_node(1, operand(&repo, 2, true), None).unwrap();
        let element = pag.get_or_new_node(1, operand(&repo, 4, true), None).unwrap();
        let func = pag.get_or_new_node(1, operand(&repo, 6, false), None).unwrap();

        assert_eq!(pag[x].kind(), PagNodeKind::LocalVar);
        assert!(pag[x].local().is_some());
        assert_eq!(pag[obj].kind(), PagNodeKind::HeapObj);
        assert!(pag[arr].object().unwrap().is_array());
        assert_eq!(pag[field].kind(), PagNodeKind::RefVar);
        assert_eq!(pag[element].kind(), PagNodeKind::LocalVar);
        assert_eq!(
            pag[func].function(),
            Some(&MethodSignature::parse("Main.main"))
        );
        assert_eq!(pag.allocated_class(operand(&repo, 0, false)), Some("A"));

        // same value and context, same node
        assert_eq!(pag.get_or_new_node(1, operand(&repo, 0, true), None).unwrap(), x);
        assert_ne!(pag.get_or_new_node(2, operand(&repo, 0, true), None).unwrap(), x);
        assert_eq!(pag.nodes_by_value(operand(&repo, 0, true)).unwrap().len(), 2);

        // field and element accesses are found back by their base
        let by_base = pag.nodes_by_base_value(operand(&repo, 0, true)).unwrap();
        assert_eq!(by_base[&1], vec![field]);
        assert!(pag.nodes_by_base_value(operand(&repo, 1, true)).is_some());

        assert!(matches!(
            pag.get_or_new_node(1, operand(&repo, 7, false), None),
            Err(AnalysisError::Internal(_))
        ));
    }

    #[test]
    fn global_object_accesses() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let mut pag = Pag::new(&repo);
        let global_this = pag.global_this_value();
        let global = pag.get_or_new_node(1, global_this, None).unwrap();
        assert_eq!(pag[global].kind(), PagNodeKind::GlobalThis);
        assert_eq!(pag[global].cid(), GLOBAL_CID);
        // context free nodes are shared by every context
        assert_eq!(pag.get_or_new_node(7, global_this, None).unwrap(), global);

        let field = pag.get_or_new_node(1, operand(&repo, 5, true), None).unwrap();
        let by_base = pag.nodes_by_base_value(global_this).unwrap();
        assert_eq!(by_base[&1], vec![field]);
        let clone = pag.get_or_clone_field_node(field, global).unwrap().unwrap();
        assert_eq!(pag[global].object().unwrap().iter_fields().count(), 1);
        assert_eq!(pag[clone].base_pt(), Some(global));
    }

    #[test]
    fn field_clones_are_memoized_per_object() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let mut pag = Pag::new(&repo);
        let obj = pag.get_or_new_node(1, operand(&repo, 0, false), None).unwrap();
        let obj2 = pag.get_or_new_node(2, operand(&repo, 0, false), None).unwrap();
        let arr = pag.get_or_new_node(1, operand(&repo, 1, false), None).unwrap();
        let written = pag.get_or_new_node(1, operand(&repo, 2, true), None).unwrap();
        let read = pag.get_or_new_node(1, operand(&repo, 3, false), None).unwrap();

        let clone = pag.get_or_clone_field_node(written, obj).unwrap().unwrap();
        assert_eq!(pag[clone].cloned_from(), Some(written));
        assert_eq!(pag[clone].base_pt(), Some(obj));
        // the field signature is the key, not the access
        assert_eq!(pag.get_or_clone_field_node(read, obj).unwrap(), Some(clone));
        let other = pag.get_or_clone_field_node(written, obj2).unwrap().unwrap();
        assert_ne!(other, clone);

        // another allocation site reaching the same access gets its own clone
        let obj_b = pag.get_or_new_node(1, operand(&repo, 8, false), None).unwrap();
        let clone_b = pag.get_or_clone_field_node(written, obj_b).unwrap().unwrap();
        assert_ne!(clone_b, clone);
        assert_eq!(pag[clone_b].base_pt(), Some(obj_b));
        assert_eq!(pag.get_or_clone_field_node(read, obj_b).unwrap(), Some(clone_b));
        assert_eq!(pag.get_or_clone_field_node(read, obj).unwrap(), Some(clone));

        // arrays have no fields, objects have no elements
        assert_eq!(pag.get_or_clone_field_node(written, arr).unwrap(), None);
        let element = pag.get_or_new_node(1, operand(&repo, 4, true), None).unwrap();
        assert_eq!(pag.get_or_clone_array_element_node(element, obj).unwrap(), None);
        let cloned_element = pag
            .get_or_clone_array_element_node(element, arr)
            .unwrap()
            .unwrap();
        assert_eq!(pag[arr].object().unwrap().element(), Some(cloned_element));

        assert!(matches!(
            pag.get_or_clone_node(clone, obj2),
            Err(AnalysisError::Internal(_))
        ));
    }

    #[test]
    fn edges_are_unique_and_stashed() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let mut pag = Pag::new(&repo);
        let x = pag.get_or_new_node(1, operand(&repo, 0, true), None).unwrap();
        let obj = pag.get_or_new_node(1, operand(&repo, 0, false), None).unwrap();
        let y = pag.get_or_new_node(1, operand(&repo, 3, true), None).unwrap();
        let func = pag.get_or_new_node(1, operand(&repo, 6, false), None).unwrap();

        assert!(pag.add_edge(obj, x, PagEdgeKind::Address, None));
        assert!(!pag.add_edge(obj, x, PagEdgeKind::Address, None));
        assert!(pag.add_edge(x, y, PagEdgeKind::Copy, None));
        assert!(pag.add_edge(x, y, PagEdgeKind::Load, None));
        assert!(pag.add_edge(func, y, PagEdgeKind::Copy, None));
        assert_eq!(pag.nb_edges(), 4);
        assert_eq!(pag.take_addr_edges(), vec![(obj, x), (func, y)]);
        assert!(pag.take_addr_edges().is_empty());

        let mut copied = pag.neighbors(y, Direction::Incoming, PagEdgeKind::is_copy);
        copied.sort();
        assert_eq!(copied, vec![x, func]);
        assert!(pag.has_edge(x, y, PagEdgeKind::Load));
        let dot = pag.to_dot();
        assert!(dot.contains("color=green"));
        assert!(dot.contains("shape=box3d"));
    }
}
