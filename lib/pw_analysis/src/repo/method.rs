use crate::repo::{ClassUid, MethodUid, Repo, StmtKind, StmtUid, Type, ValueKind, ValueUid};
use std::collections::BTreeMap;
use std::fmt;

/// Method identity: declaring class name and method name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodSignature {
    pub class: String,
    pub name: String,
}

impl MethodSignature {
    #[must_use]
    pub fn new(class: &str, name: &str) -> Self {
        Self {
            class: class.to_string(),
            name: name.to_string(),
        }
    }

    /// Parses a `Class.method` string, splitting on the last dot.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.rsplit_once('.') {
            Some((class, name)) => Self::new(class, name),
            None => Self::new("", s),
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// Method implementation: named locals and a flat statement list.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub(crate) locals: BTreeMap<String, ValueUid>,
    pub(crate) stmts: Vec<StmtUid>,
}

impl Body {
    #[inline]
    pub fn iter_stmts(&self) -> impl Iterator<Item = StmtUid> + '_ {
        self.stmts.iter().copied()
    }

    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<ValueUid> {
        self.locals.get(name).copied()
    }

    #[inline]
    pub fn iter_locals(&self) -> impl Iterator<Item = ValueUid> + '_ {
        self.locals.values().copied()
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    // Unique identifier in the repository
    pub(crate) uid: MethodUid,
    pub(crate) class: ClassUid,
    pub(crate) signature: MethodSignature,
    pub(crate) is_static: bool,
    // Synthesized by the frontend (default constructors, accessors...)
    pub(crate) is_generated: bool,
    pub(crate) is_abstract: bool,
    pub(crate) params: Vec<Type>,
    pub(crate) return_type: Type,
    pub(crate) body: Option<Body>,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.signature)
    }
}

impl Method {
    #[inline]
    #[must_use]
    pub const fn uid(&self) -> MethodUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub const fn class(&self) -> ClassUid {
        self.class
    }

    #[inline]
    #[must_use]
    pub const fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.is_generated
    }

    #[inline]
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[inline]
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.signature.name == crate::CONSTRUCTOR_NAME
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    #[inline]
    #[must_use]
    pub const fn return_type(&self) -> &Type {
        &self.return_type
    }

    #[inline]
    #[must_use]
    pub const fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn has_body(&self) -> bool {
        self.body.is_some()
    }

    #[inline]
    pub fn iter_stmts(&self) -> impl Iterator<Item = StmtUid> + '_ {
        self.body.iter().flat_map(Body::iter_stmts)
    }

    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<ValueUid> {
        self.body.as_ref().and_then(|body| body.get_local(name))
    }

    /// The `@this` reference bound at method entry.
    #[must_use]
    pub fn this_ref(&self, repo: &Repo) -> Option<ValueUid> {
        self.iter_stmts().find_map(|stmt| match repo[stmt].kind() {
            StmtKind::Assign { right, .. }
                if matches!(repo[*right].kind(), ValueKind::ThisRef) =>
            {
                Some(*right)
            }
            _ => None,
        })
    }

    /// Parameter references in binding order.
    #[must_use]
    pub fn parameter_refs(&self, repo: &Repo) -> Vec<ValueUid> {
        self.iter_stmts()
            .filter_map(|stmt| match repo[stmt].kind() {
                StmtKind::Assign { right, .. }
                    if matches!(repo[*right].kind(), ValueKind::ParameterRef { .. }) =>
                {
                    Some(*right)
                }
                _ => None,
            })
            .collect()
    }

    /// Values returned by the method.
    #[must_use]
    pub fn return_values(&self, repo: &Repo) -> Vec<ValueUid> {
        self.iter_stmts()
            .filter_map(|stmt| match repo[stmt].kind() {
                StmtKind::Return(value) => *value,
                _ => None,
            })
            .collect()
    }
}
