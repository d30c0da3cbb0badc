//! Static types attached to IR values.

use crate::repo::MethodSignature;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Unknown,
    Void,
    /// Number, boolean, string and friends.
    Primitive(String),
    StringLiteral(String),
    Class(String),
    /// Function pointer to a known method.
    Function(MethodSignature),
    Array(Box<Type>),
}

impl Type {
    /// Parses the compact type notation used by program descriptions:
    /// `unknown`, `void`, `number`, `'lit'`, `fn:Class.method`, `Elem[]`,
    /// anything else being a class name.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some(elem) = s.strip_suffix("[]") {
            return Self::Array(Box::new(Self::parse(elem)));
        }
        if let Some(sig) = s.strip_prefix("fn:") {
            return Self::Function(MethodSignature::parse(sig));
        }
        if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
            return Self::StringLiteral(s[1..s.len() - 1].to_string());
        }
        match s {
            "" | "unknown" | "any" => Self::Unknown,
            "void" => Self::Void,
            "number" | "boolean" | "string" | "bigint" | "null" | "undefined" => {
                Self::Primitive(s.to_string())
            }
            _ => Self::Class(s.to_string()),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_class(&self) -> bool {
        matches!(self, Self::Class(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Void => write!(f, "void"),
            Self::Primitive(name) | Self::Class(name) => write!(f, "{name}"),
            Self::StringLiteral(lit) => write!(f, "'{lit}'"),
            Self::Function(sig) => write!(f, "fn:{sig}"),
            Self::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_compact_types() {
        assert_eq!(Type::parse("unknown"), Type::Unknown);
        assert_eq!(Type::parse("number"), Type::Primitive("number".to_string()));
        assert_eq!(Type::parse("'key'"), Type::StringLiteral("key".to_string()));
        assert_eq!(
            Type::parse("A[]"),
            Type::Array(Box::new(Type::Class("A".to_string())))
        );
        let ty = Type::parse("fn:%dflt@main.ts.cb");
        assert!(ty.is_function());
        assert_eq!(ty.to_string(), "fn:%dflt@main.ts.cb");
    }
}
