//! Loading of program descriptions.
//!
//! A program is described as JSON: a list of files, each holding classes,
//! namespaces, top level functions, top level code, imports and exports.
//! Statements reference values through compact operands:
//!
//! | operand                      | value                            |
//! |------------------------------|----------------------------------|
//! | `"x"`                        | local `x`                        |
//! | `{"new": "A"}`               | allocation of class `A`          |
//! | `{"new_array": "A"}`         | allocation of an `A[]` array     |
//! | `{"field": ["x", "f"]}`      | instance field `x.f`             |
//! | `{"static_field": "A.f"}`    | static field `A.f`               |
//! | `{"array": ["x", "i"]}`      | array element `x[i]`             |
//! | `{"param": 0}`               | parameter reference              |
//! | `{"this": true}`             | this reference                   |
//! | `{"const": "'k'"}`           | constant literal                 |
//! | `{"func": "A.m"}`            | function pointer to `A.m`        |
//! | `{"expr": ["x", "y"]}`       | pointer free computation         |
//!
//! Names that are used but never declared nor assigned become undeclared
//! locals, which is how captured variables, imported names and `globalThis`
//! show up in a body.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::repo::*;
use crate::{DEFAULT_NAME, THIS_NAME};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ProgramDesc {
    #[serde(default)]
    files: Vec<FileDesc>,
}

#[derive(Debug, Deserialize)]
struct FileDesc {
    name: String,
    #[serde(default)]
    sdk: bool,
    #[serde(default)]
    default: ScopeDesc,
    #[serde(default)]
    functions: Vec<MethodDesc>,
    #[serde(default)]
    classes: Vec<ClassDesc>,
    #[serde(default)]
    namespaces: Vec<NamespaceDesc>,
    #[serde(default)]
    imports: Vec<ImportDesc>,
    #[serde(default)]
    exports: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NamespaceDesc {
    name: String,
    #[serde(default)]
    default: ScopeDesc,
    #[serde(default)]
    functions: Vec<MethodDesc>,
    #[serde(default)]
    classes: Vec<ClassDesc>,
    #[serde(default)]
    namespaces: Vec<NamespaceDesc>,
}

#[derive(Debug, Deserialize)]
struct ImportDesc {
    name: String,
    from: String,
    #[serde(default)]
    export: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassDesc {
    name: String,
    #[serde(default)]
    superclass: Option<String>,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default)]
    methods: Vec<MethodDesc>,
}

#[derive(Debug, Deserialize)]
struct ParamDesc {
    name: String,
    #[serde(default, rename = "type")]
    ty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MethodDesc {
    name: String,
    #[serde(default, rename = "static")]
    is_static: bool,
    #[serde(default)]
    generated: bool,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default)]
    params: Vec<ParamDesc>,
    #[serde(default)]
    returns: Option<String>,
    #[serde(default)]
    locals: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<Vec<StmtDesc>>,
}

#[derive(Debug, Default, Deserialize)]
struct ScopeDesc {
    #[serde(default)]
    locals: BTreeMap<String, String>,
    #[serde(default)]
    body: Vec<StmtDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StmtDesc {
    Assign(OperandDesc, OperandDesc),
    Call(CallDesc),
    Return(Option<OperandDesc>),
    Nop,
}

#[derive(Debug, Deserialize)]
struct CallDesc {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    ptr: Option<String>,
    method: String,
    #[serde(default)]
    args: Vec<OperandDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OperandDesc {
    Local(String),
    New {
        new: String,
    },
    NewArray {
        new_array: String,
    },
    Field {
        field: (String, String),
    },
    StaticField {
        static_field: String,
    },
    Array {
        array: (String, String),
    },
    Param {
        param: usize,
    },
    This {
        this: bool,
    },
    Const {
        #[serde(rename = "const")]
        literal: String,
    },
    Func {
        func: String,
    },
    Expr {
        expr: Vec<String>,
    },
}

fn literal_type(literal: &str) -> Type {
    if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
        Type::StringLiteral(literal[1..literal.len() - 1].to_string())
    } else if literal == "true" || literal == "false" {
        Type::Primitive("boolean".to_string())
    } else if literal.parse::<f64>().is_ok() {
        Type::Primitive("number".to_string())
    } else {
        Type::Primitive("string".to_string())
    }
}

impl Repo {
    /// Builds a closed repository from a JSON program description.
    pub fn from_json_str(json: &str) -> AnalysisResult<Self> {
        let mut repo = Self::new();
        repo.load_json_str(json)?;
        repo.close_hierarchy()?;
        Ok(repo)
    }

    /// Builds a closed repository from a list of JSON program description files.
    pub fn from_json_files<P: AsRef<Path>>(paths: &[P]) -> AnalysisResult<Self> {
        let mut repo = Self::new();
        for path in paths {
            let path = path.as_ref();
            let json = fs::read_to_string(path)
                .map_err(|err| AnalysisError::Path(path.to_path_buf(), err))?;
            log::debug!("loading program description {:?}", path);
            repo.load_json_str(&json)?;
        }
        repo.close_hierarchy()?;
        Ok(repo)
    }

    /// Registers the content of a JSON program description, the hierarchy
    /// must be closed once every description is loaded.
    pub fn load_json_str(&mut self, json: &str) -> AnalysisResult<()> {
        let program: ProgramDesc = serde_json::from_str(json)?;
        for file in &program.files {
            self.load_file(file)?;
        }
        Ok(())
    }

    fn load_file(&mut self, desc: &FileDesc) -> AnalysisResult<()> {
        let file = self.register_file(&desc.name, desc.sdk)?;
        let default_method =
            self.load_scope(file, None, &desc.default, &desc.functions, &desc.classes)?;
        for ns in &desc.namespaces {
            self.load_namespace(file, None, ns)?;
        }
        for import in &desc.imports {
            let export = import.export.as_deref().unwrap_or(&import.name);
            self.add_import(file, &import.name, &import.from, export);
        }
        for export in &desc.exports {
            let local = self.get_or_new_local(default_method, export, Type::Unknown)?;
            self.add_export(file, export, local);
        }
        Ok(())
    }

    fn load_namespace(
        &mut self,
        file: FileUid,
        parent: Option<NamespaceUid>,
        desc: &NamespaceDesc,
    ) -> AnalysisResult<()> {
        let ns = self.register_namespace(file, parent, &desc.name);
        self.load_scope(file, Some(ns), &desc.default, &desc.functions, &desc.classes)?;
        for inner in &desc.namespaces {
            self.load_namespace(file, Some(ns), inner)?;
        }
        Ok(())
    }

    /// Loads a file or namespace scope, returns its default method.
    fn load_scope(
        &mut self,
        file: FileUid,
        namespace: Option<NamespaceUid>,
        default: &ScopeDesc,
        functions: &[MethodDesc],
        classes: &[ClassDesc],
    ) -> AnalysisResult<MethodUid> {
        let default_class = self.register_default_class(file, namespace)?;
        let default_method = self.register_method(
            default_class,
            DEFAULT_NAME,
            true,
            false,
            false,
            Vec::new(),
            Type::Void,
            true,
        )?;
        self.load_body(default_method, &default.locals, &default.body)?;
        for function in functions {
            self.load_method(default_class, function, true)?;
        }
        for class in classes {
            let uid = self.register_class(
                &class.name,
                file,
                namespace,
                class.superclass.as_deref(),
                class.is_abstract,
            )?;
            for method in &class.methods {
                self.load_method(uid, method, method.is_static)?;
            }
        }
        Ok(default_method)
    }

    fn load_method(
        &mut self,
        class: ClassUid,
        desc: &MethodDesc,
        is_static: bool,
    ) -> AnalysisResult<MethodUid> {
        let params: Vec<Type> = desc
            .params
            .iter()
            .map(|param| param.ty.as_deref().map_or(Type::Unknown, Type::parse))
            .collect();
        let return_type = desc.returns.as_deref().map_or(Type::Unknown, Type::parse);
        let method = self.register_method(
            class,
            &desc.name,
            is_static,
            desc.generated,
            desc.is_abstract,
            params.clone(),
            return_type,
            desc.body.is_some(),
        )?;
        if let Some(body) = &desc.body {
            if !is_static {
                let class_type = Type::Class(self[class].name().to_string());
                let this = self.get_or_new_local(method, THIS_NAME, class_type.clone())?;
                let this_ref = self.new_value(Some(method), ValueKind::ThisRef, class_type);
                self.push_stmt(
                    method,
                    StmtKind::Assign {
                        left: this,
                        right: this_ref,
                    },
                )?;
            }
            for (index, (param, ty)) in desc.params.iter().zip(params).enumerate() {
                let local = self.get_or_new_local(method, &param.name, ty.clone())?;
                let param_ref =
                    self.new_value(Some(method), ValueKind::ParameterRef { index }, ty);
                self.push_stmt(
                    method,
                    StmtKind::Assign {
                        left: local,
                        right: param_ref,
                    },
                )?;
            }
            self.load_body(method, &desc.locals, body)?;
        }
        Ok(method)
    }

    fn load_body(
        &mut self,
        method: MethodUid,
        locals: &BTreeMap<String, String>,
        stmts: &[StmtDesc],
    ) -> AnalysisResult<()> {
        for (name, ty) in locals {
            self.get_or_new_local(method, name, Type::parse(ty))?;
        }
        for stmt in stmts {
            let kind = match stmt {
                StmtDesc::Assign(left, right) => {
                    let left = self.load_operand(method, left)?;
                    let right = self.load_operand(method, right)?;
                    StmtKind::Assign { left, right }
                }
                StmtDesc::Call(call) => {
                    let invoke = self.load_invoke(method, call)?;
                    match &call.result {
                        Some(result) => StmtKind::AssignInvoke {
                            left: self.get_or_new_local(method, result, Type::Unknown)?,
                            invoke,
                        },
                        None => StmtKind::Invoke(invoke),
                    }
                }
                StmtDesc::Return(value) => StmtKind::Return(
                    value
                        .as_ref()
                        .map(|value| self.load_operand(method, value))
                        .transpose()?,
                ),
                StmtDesc::Nop => StmtKind::Nop,
            };
            self.push_stmt(method, kind)?;
        }
        Ok(())
    }

    fn load_invoke(&mut self, method: MethodUid, desc: &CallDesc) -> AnalysisResult<InvokeExpr> {
        let kind = match (&desc.base, &desc.ptr) {
            (Some(_), Some(_)) => {
                return Err(AnalysisError::Program(format!(
                    "call to {} has both a receiver and a function pointer",
                    desc.method
                )))
            }
            (Some(base), None) => InvokeKind::Instance {
                base: self.get_or_new_local(method, base, Type::Unknown)?,
            },
            (None, Some(ptr)) => InvokeKind::Ptr {
                func_ptr: self.get_or_new_local(method, ptr, Type::Unknown)?,
            },
            (None, None) => InvokeKind::Static,
        };
        let args = desc
            .args
            .iter()
            .map(|arg| self.load_operand(method, arg))
            .collect::<AnalysisResult<Vec<_>>>()?;
        Ok(InvokeExpr {
            kind,
            method: MethodSignature::parse(&desc.method),
            args,
        })
    }

    fn load_operand(&mut self, method: MethodUid, desc: &OperandDesc) -> AnalysisResult<ValueUid> {
        let m = Some(method);
        let uid = match desc {
            OperandDesc::Local(name) => self.get_or_new_local(method, name, Type::Unknown)?,
            OperandDesc::New { new } => self.new_value(
                m,
                ValueKind::NewExpr { class: new.clone() },
                Type::Class(new.clone()),
            ),
            OperandDesc::NewArray { new_array } => {
                let element = Type::parse(new_array);
                self.new_value(
                    m,
                    ValueKind::NewArrayExpr {
                        element: element.clone(),
                    },
                    Type::Array(Box::new(element)),
                )
            }
            OperandDesc::Field { field: (base, name) } => {
                let base = self.get_or_new_local(method, base, Type::Unknown)?;
                let class = self[base].ty().class_name().unwrap_or_default().to_string();
                self.new_value(
                    m,
                    ValueKind::InstanceFieldRef {
                        base,
                        field: FieldSignature::new(&class, name),
                    },
                    Type::Unknown,
                )
            }
            OperandDesc::StaticField { static_field } => self.new_value(
                m,
                ValueKind::StaticFieldRef {
                    field: FieldSignature::parse(static_field),
                },
                Type::Unknown,
            ),
            OperandDesc::Array { array: (base, index) } => {
                let base = self.get_or_new_local(method, base, Type::Unknown)?;
                let index = if index.parse::<f64>().is_ok() {
                    self.new_value(
                        m,
                        ValueKind::Constant {
                            literal: index.clone(),
                        },
                        literal_type(index),
                    )
                } else {
                    self.get_or_new_local(method, index, Type::Unknown)?
                };
                let ty = match self[base].ty() {
                    Type::Array(element) => (**element).clone(),
                    _ => Type::Unknown,
                };
                self.new_value(m, ValueKind::ArrayRef { base, index }, ty)
            }
            OperandDesc::Param { param } => {
                let ty = self[method]
                    .params()
                    .get(*param)
                    .cloned()
                    .unwrap_or(Type::Unknown);
                self.new_value(m, ValueKind::ParameterRef { index: *param }, ty)
            }
            OperandDesc::This { .. } => {
                let ty = Type::Class(self[self[method].class()].name().to_string());
                self.new_value(m, ValueKind::ThisRef, ty)
            }
            OperandDesc::Const { literal } => self.new_value(
                m,
                ValueKind::Constant {
                    literal: literal.clone(),
                },
                literal_type(literal),
            ),
            OperandDesc::Func { func } => {
                let signature = MethodSignature::parse(func);
                let name = signature.name.clone();
                self.get_or_new_local(method, &name, Type::Function(signature))?
            }
            OperandDesc::Expr { expr } => {
                let operands = expr
                    .iter()
                    .map(|name| self.get_or_new_local(method, name, Type::Unknown))
                    .collect::<AnalysisResult<Vec<_>>>()?;
                self.new_value(m, ValueKind::Expr { operands }, Type::Unknown)
            }
        };
        Ok(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = r#"{"files": [
        {"name": "lib.ts",
         "default": {"body": [{"assign": ["shared", {"new": "A"}]}]},
         "exports": ["shared"]},
        {"name": "main.ts",
         "imports": [{"name": "s", "from": "lib.ts", "export": "shared"}],
         "classes": [
            {"name": "A", "methods": [
                {"name": "foo", "params": [{"name": "p", "type": "A"}], "returns": "A",
                 "body": [{"assign": [{"field": ["this", "f"]}, "p"]}, {"return": "p"}]}
            ]},
            {"name": "Main", "methods": [
                {"name": "main", "static": true, "locals": {"a": "A"},
                 "body": [
                    {"assign": ["a", {"new": "A"}]},
                    {"call": {"result": "r", "base": "a", "method": "A.foo", "args": ["s"]}},
                    {"assign": ["c", {"func": "Main.cb"}]},
                    {"call": {"ptr": "c", "method": "Main.cb"}},
                    "nop",
                    {"return": null}
                 ]},
                {"name": "cb", "static": true, "body": []}
            ]}
         ]}
    ]}"#;

    #[test]
    fn load_program() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        assert_eq!(repo.iter_files().count(), 2);
        // two default classes plus A and Main
        assert_eq!(repo.nb_classes(), 4);

        let foo = repo.get_method(&MethodSignature::new("A", "foo")).unwrap();
        assert!(!foo.is_static());
        assert!(foo.this_ref(&repo).is_some());
        assert_eq!(foo.parameter_refs(&repo).len(), 1);
        assert_eq!(foo.return_values(&repo).len(), 1);
        let this = foo.get_local(THIS_NAME).unwrap();
        assert!(repo[this].declaring_stmt().is_some());
        assert_eq!(repo[this].ty(), &Type::Class("A".to_string()));

        let main = repo.get_method(&MethodSignature::new("Main", "main")).unwrap();
        assert!(main.this_ref(&repo).is_none());
        assert_eq!(main.iter_stmts().count(), 6);
        let imported = main.get_local("s").unwrap();
        assert!(repo[imported].declaring_stmt().is_none());
        let cb = main.get_local("cb").unwrap();
        assert!(repo[cb].ty().is_function());
        assert!(repo[cb].declaring_stmt().is_none());

        let call = main.iter_stmts().nth(1).unwrap();
        assert_eq!(
            repo.display_stmt(call),
            "r = instanceinvoke a.<A.foo>(s)"
        );
    }

    #[test]
    fn resolve_import_to_export() {
        let repo = Repo::from_json_str(PROGRAM).unwrap();
        let main_file = repo.get_file_by_name("main.ts").unwrap();
        let exported = repo.resolve_import(main_file, "s").unwrap();
        assert_eq!(repo[exported].local_name(), Some("shared"));
        let lib = repo.get_file_by_name("lib.ts").unwrap();
        let default = repo.default_method(lib.default_class().unwrap()).unwrap();
        assert_eq!(default.get_local("shared"), Some(exported));
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let json = r#"{"files": [{"name": "a.ts", "classes": [{"name": "A"}, {"name": "A"}]}]}"#;
        assert!(matches!(
            Repo::from_json_str(json),
            Err(AnalysisError::Program(_))
        ));
    }
}
