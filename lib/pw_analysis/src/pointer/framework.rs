//! Modeling of UI framework idioms whose implementation lies outside of the
//! analyzed program.

use std::fmt;

/// Global key-value stores shared by the components of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageType {
    AppStorage,
    LocalStorage,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::AppStorage => write!(f, "AppStorage"),
            Self::LocalStorage => write!(f, "LocalStorage"),
        }
    }
}

/// Accessors of a storage property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    /// `setOrCreate(name, value)`: the property receives the value.
    SetOrCreate,
    /// `link(name)`: the result is bound to the property in both directions.
    Link,
    /// `prop(name)`: the result is bound to the property one way.
    Prop,
    /// `set(value)` on a bound result, or `set(name, value)` on the storage.
    Set,
    /// `get()` on a bound result, or `get(name)` on the storage.
    Get,
}

/// How the declaring class of a callee relates to storages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    /// Static accessors of a storage.
    Storage(StorageType),
    /// Property handle returned by `link`/`prop`, its storage is known from
    /// the receiver.
    Property,
}

/// Framework specific shortcuts used while building the pointer assignment
/// graph.
pub trait FrameworkModel {
    fn name(&self) -> &str;

    fn storage_class(&self, class_name: &str) -> Option<StorageClass>;

    fn storage_op(&self, method_name: &str) -> Option<StorageOp>;

    /// Whether static factories storing their allocation in a static field
    /// share a single context.
    fn detects_singletons(&self) -> bool;
}

/// The ArkUI declarative framework: `AppStorage`, `LocalStorage` and the
/// `SubscribedAbstractProperty` handles they return.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArkUiModel;

impl FrameworkModel for ArkUiModel {
    fn name(&self) -> &str {
        "arkui"
    }

    fn storage_class(&self, class_name: &str) -> Option<StorageClass> {
        match class_name {
            "AppStorage" => Some(StorageClass::Storage(StorageType::AppStorage)),
            "LocalStorage" => Some(StorageClass::Storage(StorageType::LocalStorage)),
            "SubscribedAbstractProperty" => Some(StorageClass::Property),
            _ => None,
        }
    }

    fn storage_op(&self, method_name: &str) -> Option<StorageOp> {
        match method_name {
            "setOrCreate" => Some(StorageOp::SetOrCreate),
            "link" => Some(StorageOp::Link),
            "prop" => Some(StorageOp::Prop),
            "set" => Some(StorageOp::Set),
            "get" => Some(StorageOp::Get),
            _ => None,
        }
    }

    fn detects_singletons(&self) -> bool {
        true
    }
}

/// Plain language semantics, no framework shortcut.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrameworkModel;

impl FrameworkModel for NoFrameworkModel {
    fn name(&self) -> &str {
        "none"
    }

    fn storage_class(&self, _class_name: &str) -> Option<StorageClass> {
        None
    }

    fn storage_op(&self, _method_name: &str) -> Option<StorageOp> {
        None
    }

    fn detects_singletons(&self) -> bool {
        false
    }
}
