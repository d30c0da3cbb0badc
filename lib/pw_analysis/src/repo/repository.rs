//! A repository to centralize the analyzed program: files, classes, methods
//! and their bodies.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::hierarchy::Hierarchy;
use crate::repo::*;
use crate::DEFAULT_NAME;
use regex::Regex;
use std::collections::BTreeMap;
use std::ops;

#[derive(Debug, Default)]
pub struct Repo {
    hierarchy: Hierarchy,
    files: Vec<File>,
    file_ids: BTreeMap<String, FileUid>,
    namespaces: Vec<Namespace>,
    methods: Vec<Method>,
    values: Vec<Value>,
    stmts: Vec<Stmt>,
}

impl ops::Index<FileUid> for Repo {
    type Output = File;

    fn index(&self, uid: FileUid) -> &File {
        &self.files[uid.idx()]
    }
}

impl ops::Index<NamespaceUid> for Repo {
    type Output = Namespace;

    fn index(&self, uid: NamespaceUid) -> &Namespace {
        &self.namespaces[uid.idx()]
    }
}

impl ops::Index<ClassUid> for Repo {
    type Output = Class;

    fn index(&self, uid: ClassUid) -> &Class {
        self.hierarchy.class(uid)
    }
}

impl ops::Index<MethodUid> for Repo {
    type Output = Method;

    fn index(&self, uid: MethodUid) -> &Method {
        &self.methods[uid.idx()]
    }
}

impl ops::Index<ValueUid> for Repo {
    type Output = Value;

    fn index(&self, uid: ValueUid) -> &Value {
        &self.values[uid.idx()]
    }
}

impl ops::Index<StmtUid> for Repo {
    type Output = Stmt;

    fn index(&self, uid: StmtUid) -> &Stmt {
        &self.stmts[uid.idx()]
    }
}

impl Repo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_file(&mut self, name: &str, is_sdk: bool) -> AnalysisResult<FileUid> {
        if self.file_ids.contains_key(name) {
            return Err(AnalysisError::Program(format!("duplicate file {name}")));
        }
        log::trace!(
            "pushing file '{}'{} in repository",
            name,
            if is_sdk { " (SDK)" } else { "" }
        );
        let uid = FileUid::from_idx(self.files.len());
        self.files.push(File {
            uid,
            name: name.to_string(),
            is_sdk,
            default_class: None,
            imports: BTreeMap::new(),
            exports: BTreeMap::new(),
        });
        self.file_ids.insert(name.to_string(), uid);
        Ok(uid)
    }

    pub fn register_namespace(
        &mut self,
        file: FileUid,
        parent: Option<NamespaceUid>,
        name: &str,
    ) -> NamespaceUid {
        let uid = NamespaceUid::from_idx(self.namespaces.len());
        self.namespaces.push(Namespace {
            uid,
            name: name.to_string(),
            file,
            parent,
            default_class: None,
        });
        uid
    }

    pub fn register_class(
        &mut self,
        name: &str,
        file: FileUid,
        namespace: Option<NamespaceUid>,
        superclass: Option<&str>,
        is_abstract: bool,
    ) -> AnalysisResult<ClassUid> {
        log::trace!("pushing class '{}' in repository", name);
        if let Some(class) = self.hierarchy.get_class(name) {
            if class.is_defined() {
                return Err(AnalysisError::Program(format!(
                    "class '{name}' has already been pushed in repository"
                )));
            }
            // only referenced until now, complete its definition
            let uid = class.uid();
            let class = self.hierarchy.class_mut(uid);
            class.file = Some(file);
            class.namespace = namespace;
            class.superclass = superclass.map(str::to_string);
            class.is_abstract = is_abstract;
            return Ok(uid);
        }

        let mut class = Class::new_no_def(ClassUid::from_idx(self.hierarchy.nb_classes()), name);
        class.file = Some(file);
        class.namespace = namespace;
        class.superclass = superclass.map(str::to_string);
        class.is_abstract = is_abstract;
        self.hierarchy.insert_class(class)
    }

    /// Registers the class holding file level (or namespace level) code.
    pub fn register_default_class(
        &mut self,
        file: FileUid,
        namespace: Option<NamespaceUid>,
    ) -> AnalysisResult<ClassUid> {
        let name = match namespace {
            Some(ns) => format!("{DEFAULT_NAME}@{}/{}", self[file].name, self[ns].name),
            None => format!("{DEFAULT_NAME}@{}", self[file].name),
        };
        let uid = self.register_class(&name, file, namespace, None, false)?;
        self.hierarchy.class_mut(uid).is_default = true;
        match namespace {
            Some(ns) => self.namespaces[ns.idx()].default_class = Some(uid),
            None => self.files[file.idx()].default_class = Some(uid),
        }
        Ok(uid)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register_method(
        &mut self,
        class: ClassUid,
        name: &str,
        is_static: bool,
        is_generated: bool,
        is_abstract: bool,
        params: Vec<Type>,
        return_type: Type,
        has_body: bool,
    ) -> AnalysisResult<MethodUid> {
        let class_name = self[class].name().to_string();
        if self[class].methods.contains_key(name) {
            return Err(AnalysisError::Program(format!(
                "duplicate method {class_name}.{name}"
            )));
        }
        let uid = MethodUid::from_idx(self.methods.len());
        self.methods.push(Method {
            uid,
            class,
            signature: MethodSignature::new(&class_name, name),
            is_static,
            is_generated,
            is_abstract,
            params,
            return_type,
            body: has_body.then(Body::default),
        });
        self.hierarchy
            .class_mut(class)
            .methods
            .insert(name.to_string(), uid);
        Ok(uid)
    }

    fn body_mut(&mut self, method: MethodUid) -> AnalysisResult<&mut Body> {
        let signature = self.methods[method.idx()].signature.to_string();
        self.methods[method.idx()]
            .body
            .as_mut()
            .ok_or_else(|| AnalysisError::Program(format!("method {signature} has no body")))
    }

    /// Creates a value that lives in `method`.
    pub fn new_value(&mut self, method: Option<MethodUid>, kind: ValueKind, ty: Type) -> ValueUid {
        let uid = ValueUid::from_idx(self.values.len());
        self.values.push(Value {
            uid,
            kind,
            ty,
            method,
            declaring_stmt: None,
        });
        uid
    }

    /// Returns the local named `name` in `method`, creating it with type `ty`
    /// if needed.
    pub fn get_or_new_local(
        &mut self,
        method: MethodUid,
        name: &str,
        ty: Type,
    ) -> AnalysisResult<ValueUid> {
        if let Some(local) = self.body_mut(method)?.get_local(name) {
            return Ok(local);
        }
        let uid = self.new_value(
            Some(method),
            ValueKind::Local {
                name: name.to_string(),
            },
            ty,
        );
        self.body_mut(method)?.locals.insert(name.to_string(), uid);
        Ok(uid)
    }

    /// Appends a statement to the body of `method`, the first statement
    /// defining a local becomes its declaring statement.
    pub fn push_stmt(&mut self, method: MethodUid, kind: StmtKind) -> AnalysisResult<StmtUid> {
        let uid = StmtUid::from_idx(self.stmts.len());
        let defined = match &kind {
            StmtKind::Assign { left, .. } | StmtKind::AssignInvoke { left, .. } => Some(*left),
            _ => None,
        };
        self.body_mut(method)?.stmts.push(uid);
        self.stmts.push(Stmt { uid, method, kind });
        if let Some(left) = defined {
            let value = &mut self.values[left.idx()];
            if value.is_local() && value.declaring_stmt.is_none() {
                value.declaring_stmt = Some(uid);
            }
        }
        Ok(uid)
    }

    pub fn add_import(&mut self, file: FileUid, name: &str, from: &str, export: &str) {
        self.files[file.idx()].imports.insert(
            name.to_string(),
            ImportInfo {
                from: from.to_string(),
                export: export.to_string(),
            },
        );
    }

    pub fn add_export(&mut self, file: FileUid, name: &str, value: ValueUid) {
        self.files[file.idx()]
            .exports
            .insert(name.to_string(), value);
    }

    /// Links every defined class to its superclass, superclasses that are
    /// referenced but never defined are declared on the fly.
    pub fn close_hierarchy(&mut self) -> AnalysisResult<()> {
        let links: Vec<(String, String)> = self
            .hierarchy
            .iter_classes()
            .filter_map(|class| {
                class
                    .superclass()
                    .map(|parent| (class.name().to_string(), parent.to_string()))
            })
            .collect();
        for (class, parent) in links {
            if !self.hierarchy.contains_class(&parent) {
                log::warn!("superclass {} of {} is not defined", parent, class);
                let uid = ClassUid::from_idx(self.hierarchy.nb_classes());
                self.hierarchy.insert_class(Class::new_no_def(uid, &parent))?;
            }
            self.hierarchy.insert_extends(&class, &parent)?;
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    #[inline]
    #[must_use]
    pub fn nb_classes(&self) -> usize {
        self.hierarchy.nb_classes()
    }

    #[inline]
    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.methods.len()
    }

    #[inline]
    pub fn iter_files(&self) -> impl Iterator<Item = &File> {
        self.files.iter()
    }

    #[inline]
    pub fn iter_classes(&self) -> impl Iterator<Item = &Class> {
        self.hierarchy.iter_classes()
    }

    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    pub fn find_methods<'r>(&'r self, pattern: &'r Regex) -> impl Iterator<Item = &'r Method> {
        self.methods
            .iter()
            .filter(|method| pattern.is_match(&method.signature.to_string()))
    }

    #[must_use]
    pub fn get_file_by_name(&self, name: &str) -> Option<&File> {
        self.file_ids.get(name).map(|uid| &self[*uid])
    }

    #[must_use]
    pub fn get_class_by_name(&self, name: &str) -> Option<&Class> {
        self.hierarchy.get_class(name)
    }

    /// Method exactly matching the signature.
    #[must_use]
    pub fn get_method(&self, signature: &MethodSignature) -> Option<&Method> {
        self.get_class_by_name(&signature.class)?
            .get_method(&signature.name, self)
    }

    /// Looks for a method by name in `class` and then in its superclasses.
    #[must_use]
    pub fn find_method_in_hierarchy(&self, class: &Class, name: &str) -> Option<&Method> {
        let mut current = Some(class);
        while let Some(class) = current {
            if let Some(method) = class.get_method(name, self) {
                return Some(method);
            }
            current = self.hierarchy.superclass(class);
        }
        None
    }

    #[must_use]
    pub fn class_file(&self, class: &Class) -> Option<&File> {
        class.file().map(|uid| &self[uid])
    }

    #[must_use]
    pub fn method_file(&self, method: &Method) -> Option<&File> {
        self.class_file(&self[method.class()])
    }

    /// Whether the class (by name) is declared in an SDK file.
    #[must_use]
    pub fn is_sdk_class(&self, class_name: &str) -> bool {
        self.get_class_by_name(class_name)
            .and_then(|class| self.class_file(class))
            .map_or(false, File::is_sdk)
    }

    /// The method holding the top level code of a default class.
    #[must_use]
    pub fn default_method(&self, class: ClassUid) -> Option<&Method> {
        self[class].get_method(DEFAULT_NAME, self)
    }

    /// Resolves a name imported by `file` to the exported value.
    #[must_use]
    pub fn resolve_import(&self, file: &File, name: &str) -> Option<ValueUid> {
        let import = file.get_import(name)?;
        self.get_file_by_name(&import.from)?.get_export(&import.export)
    }

    #[must_use]
    pub fn display_value(&self, uid: ValueUid) -> String {
        let value = &self[uid];
        match value.kind() {
            ValueKind::Local { name } => name.clone(),
            ValueKind::InstanceFieldRef { base, field } => {
                format!("{}.{}", self.display_value(*base), field.name)
            }
            ValueKind::StaticFieldRef { field } => field.to_string(),
            ValueKind::ArrayRef { base, index } => format!(
                "{}[{}]",
                self.display_value(*base),
                self.display_value(*index)
            ),
            ValueKind::ParameterRef { index } => format!("@parameter{index}: {}", value.ty()),
            ValueKind::ThisRef => format!("@this: {}", value.ty()),
            ValueKind::NewExpr { class } => format!("new {class}"),
            ValueKind::NewArrayExpr { element } => format!("newarray ({element})"),
            ValueKind::Constant { literal } => literal.clone(),
            ValueKind::Expr { operands } => format!(
                "expr({})",
                operands
                    .iter()
                    .map(|op| self.display_value(*op))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    #[must_use]
    pub fn display_invoke(&self, invoke: &InvokeExpr) -> String {
        let args = invoke
            .args
            .iter()
            .map(|arg| self.display_value(*arg))
            .collect::<Vec<_>>()
            .join(", ");
        match invoke.kind {
            InvokeKind::Static => format!("staticinvoke <{}>({args})", invoke.method),
            InvokeKind::Instance { base } => format!(
                "instanceinvoke {}.<{}>({args})",
                self.display_value(base),
                invoke.method
            ),
            InvokeKind::Ptr { func_ptr } => format!(
                "ptrinvoke {}<{}>({args})",
                self.display_value(func_ptr),
                invoke.method
            ),
        }
    }

    #[must_use]
    pub fn display_stmt(&self, uid: StmtUid) -> String {
        match self[uid].kind() {
            StmtKind::Assign { left, right } => {
                format!("{} = {}", self.display_value(*left), self.display_value(*right))
            }
            StmtKind::AssignInvoke { left, invoke } => {
                format!("{} = {}", self.display_value(*left), self.display_invoke(invoke))
            }
            StmtKind::Invoke(invoke) => self.display_invoke(invoke),
            StmtKind::Return(Some(value)) => format!("return {}", self.display_value(*value)),
            StmtKind::Return(None) => "return".to_string(),
            StmtKind::Nop => "nop".to_string(),
        }
    }
}
