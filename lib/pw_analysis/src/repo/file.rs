use crate::repo::{ClassUid, FileUid, NamespaceUid, ValueUid};
use std::collections::BTreeMap;

/// An imported name: exported name `export` of file `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub from: String,
    pub export: String,
}

#[derive(Debug, Clone)]
pub struct File {
    pub(crate) uid: FileUid,
    pub(crate) name: String,
    // Platform (SDK) file, bodies are not analyzed
    pub(crate) is_sdk: bool,
    pub(crate) default_class: Option<ClassUid>,
    pub(crate) imports: BTreeMap<String, ImportInfo>,
    pub(crate) exports: BTreeMap<String, ValueUid>,
}

impl File {
    #[inline]
    #[must_use]
    pub const fn uid(&self) -> FileUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn is_sdk(&self) -> bool {
        self.is_sdk
    }

    #[inline]
    #[must_use]
    pub const fn default_class(&self) -> Option<ClassUid> {
        self.default_class
    }

    #[must_use]
    pub fn get_import(&self, name: &str) -> Option<&ImportInfo> {
        self.imports.get(name)
    }

    #[must_use]
    pub fn get_export(&self, name: &str) -> Option<ValueUid> {
        self.exports.get(name).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Namespace {
    pub(crate) uid: NamespaceUid,
    pub(crate) name: String,
    pub(crate) file: FileUid,
    pub(crate) parent: Option<NamespaceUid>,
    pub(crate) default_class: Option<ClassUid>,
}

impl Namespace {
    #[inline]
    #[must_use]
    pub const fn uid(&self) -> NamespaceUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn file(&self) -> FileUid {
        self.file
    }

    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<NamespaceUid> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub const fn default_class(&self) -> Option<ClassUid> {
        self.default_class
    }
}
