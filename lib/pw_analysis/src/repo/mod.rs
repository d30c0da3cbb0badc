//! Arena based view of the analyzed program: files, namespaces, classes,
//! methods and their statement lists.

mod class;
mod dummy_main;
mod file;
mod loader;
mod method;
mod repository;
mod stmt;
mod types;
mod uids;
mod value;

pub use class::Class;
pub use file::{File, ImportInfo, Namespace};
pub use method::{Body, Method, MethodSignature};
pub use repository::Repo;
pub use stmt::{InvokeExpr, InvokeKind, Stmt, StmtKind};
pub use types::Type;
pub use uids::{ClassUid, FileUid, MethodUid, NamespaceUid, StmtUid, ValueUid};
pub use value::{FieldSignature, Value, ValueKind};
