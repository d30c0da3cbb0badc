use crate::repo::{MethodUid, StmtUid, Type, ValueUid};
use std::fmt;

/// Field identity: declaring class and field name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldSignature {
    pub class: String,
    pub name: String,
}

impl FieldSignature {
    #[must_use]
    pub fn new(class: &str, name: &str) -> Self {
        Self {
            class: class.to_string(),
            name: name.to_string(),
        }
    }

    /// Parses a `Class.field` string, splitting on the last dot.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.rsplit_once('.') {
            Some((class, name)) => Self::new(class, name),
            None => Self::new("", s),
        }
    }
}

impl fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Local { name: String },
    InstanceFieldRef { base: ValueUid, field: FieldSignature },
    StaticFieldRef { field: FieldSignature },
    ArrayRef { base: ValueUid, index: ValueUid },
    ParameterRef { index: usize },
    ThisRef,
    NewExpr { class: String },
    NewArrayExpr { element: Type },
    Constant { literal: String },
    /// Any non-pointer computation over other values.
    Expr { operands: Vec<ValueUid> },
}

/// An IR value. Identity is the arena uid, never the structure.
#[derive(Debug, Clone)]
pub struct Value {
    pub(crate) uid: ValueUid,
    pub(crate) kind: ValueKind,
    pub(crate) ty: Type,
    // Method in which the value occurs
    pub(crate) method: Option<MethodUid>,
    // First statement defining the value (locals only)
    pub(crate) declaring_stmt: Option<StmtUid>,
}

impl Value {
    #[inline]
    #[must_use]
    pub const fn uid(&self) -> ValueUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &ValueKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub const fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    #[must_use]
    pub const fn method(&self) -> Option<MethodUid> {
        self.method
    }

    #[inline]
    #[must_use]
    pub const fn declaring_stmt(&self) -> Option<StmtUid> {
        self.declaring_stmt
    }

    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Local { name } => Some(name),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.kind, ValueKind::Local { .. })
    }

    /// Constants and plain expressions never carry pointers.
    #[inline]
    #[must_use]
    pub const fn is_pointer_free(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::Constant { .. } | ValueKind::Expr { .. }
        )
    }

    #[must_use]
    pub fn field(&self) -> Option<&FieldSignature> {
        match &self.kind {
            ValueKind::InstanceFieldRef { field, .. } | ValueKind::StaticFieldRef { field } => {
                Some(field)
            }
            _ => None,
        }
    }

    /// Base value of an instance field or array access.
    #[must_use]
    pub const fn base(&self) -> Option<ValueUid> {
        match self.kind {
            ValueKind::InstanceFieldRef { base, .. } | ValueKind::ArrayRef { base, .. } => {
                Some(base)
            }
            _ => None,
        }
    }
}
