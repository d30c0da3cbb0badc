use crate::repo::{MethodSignature, MethodUid, StmtUid, ValueUid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeKind {
    Static,
    Instance { base: ValueUid },
    /// Call through a function-pointer local.
    Ptr { func_ptr: ValueUid },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeExpr {
    pub kind: InvokeKind,
    pub method: MethodSignature,
    pub args: Vec<ValueUid>,
}

impl InvokeExpr {
    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(self.kind, InvokeKind::Static)
    }

    #[inline]
    #[must_use]
    pub const fn is_instance(&self) -> bool {
        matches!(self.kind, InvokeKind::Instance { .. })
    }

    /// Receiver of an instance call, or pointer of an indirect call.
    #[must_use]
    pub const fn receiver(&self) -> Option<ValueUid> {
        match self.kind {
            InvokeKind::Static => None,
            InvokeKind::Instance { base } => Some(base),
            InvokeKind::Ptr { func_ptr } => Some(func_ptr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Assign { left: ValueUid, right: ValueUid },
    AssignInvoke { left: ValueUid, invoke: InvokeExpr },
    Invoke(InvokeExpr),
    Return(Option<ValueUid>),
    Nop,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub(crate) uid: StmtUid,
    pub(crate) method: MethodUid,
    pub(crate) kind: StmtKind,
}

impl Stmt {
    #[inline]
    #[must_use]
    pub const fn uid(&self) -> StmtUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub const fn method(&self) -> MethodUid {
        self.method
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &StmtKind {
        &self.kind
    }

    #[must_use]
    pub const fn invoke_expr(&self) -> Option<&InvokeExpr> {
        match &self.kind {
            StmtKind::AssignInvoke { invoke, .. } | StmtKind::Invoke(invoke) => Some(invoke),
            _ => None,
        }
    }

    /// Value defined by the statement, if any.
    #[must_use]
    pub const fn left_op(&self) -> Option<ValueUid> {
        match self.kind {
            StmtKind::Assign { left, .. } | StmtKind::AssignInvoke { left, .. } => Some(left),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_assign(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Assign { .. } | StmtKind::AssignInvoke { .. }
        )
    }
}
