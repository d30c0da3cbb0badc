use crate::repo::{ClassUid, FileUid, Method, MethodUid, NamespaceUid, Repo};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A class, either defined by a loaded file or only referenced as a superclass.
#[derive(Debug, Clone)]
pub struct Class {
    // Unique identifier in the repository
    pub(crate) uid: ClassUid,
    pub(crate) name: String,
    // Declaring file, none for classes only known by name
    pub(crate) file: Option<FileUid>,
    pub(crate) namespace: Option<NamespaceUid>,
    pub(crate) superclass: Option<String>,
    pub(crate) is_abstract: bool,
    // Holder of file or namespace level code
    pub(crate) is_default: bool,
    pub(crate) methods: BTreeMap<String, MethodUid>,
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Class {}

impl PartialOrd for Class {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Class {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uid.cmp(&other.uid)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Class {
    pub(crate) fn new_no_def(uid: ClassUid, name: &str) -> Self {
        Self {
            uid,
            name: name.to_string(),
            file: None,
            namespace: None,
            superclass: None,
            is_abstract: false,
            is_default: false,
            methods: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn uid(&self) -> ClassUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn file(&self) -> Option<FileUid> {
        self.file
    }

    #[inline]
    #[must_use]
    pub const fn namespace(&self) -> Option<NamespaceUid> {
        self.namespace
    }

    #[inline]
    #[must_use]
    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.file.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[inline]
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.is_default
    }

    /// Declared method with the given name, superclasses are not searched.
    #[must_use]
    pub fn get_method<'r>(&self, name: &str, repo: &'r Repo) -> Option<&'r Method> {
        self.methods.get(name).map(|uid| &repo[*uid])
    }

    pub fn iter_methods<'r>(&'r self, repo: &'r Repo) -> impl Iterator<Item = &'r Method> + 'r {
        self.methods.values().map(move |uid| &repo[*uid])
    }
}
