//! Synthesized program entry calling every analysis entry method.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::repo::*;
use crate::{CONSTRUCTOR_NAME, DUMMY_CLASS_NAME, DUMMY_FILE_NAME, DUMMY_MAIN_NAME, STATIC_INIT_NAME};
use std::collections::BTreeMap;

impl Repo {
    /// Creates `@dummyMain`: static initializers are run first, then one
    /// receiver object is allocated (and constructed) per entry class, and
    /// finally every entry is invoked with freshly allocated arguments for
    /// its class typed parameters.
    pub fn create_dummy_main(&mut self, entries: &[MethodUid]) -> AnalysisResult<MethodUid> {
        if self.get_file_by_name(DUMMY_FILE_NAME).is_some() {
            return Err(AnalysisError::Internal(
                "dummy main already created".to_string(),
            ));
        }
        let file = self.register_file(DUMMY_FILE_NAME, false)?;
        let class = self.register_class(DUMMY_CLASS_NAME, file, None, None, false)?;
        let dummy = self.register_method(
            class,
            DUMMY_MAIN_NAME,
            true,
            false,
            false,
            Vec::new(),
            Type::Void,
            true,
        )?;

        let static_inits: Vec<MethodSignature> = self
            .iter_methods()
            .filter(|method| method.name() == STATIC_INIT_NAME)
            .map(|method| method.signature().clone())
            .collect();
        for method in static_inits {
            self.push_stmt(
                dummy,
                StmtKind::Invoke(InvokeExpr {
                    kind: InvokeKind::Static,
                    method,
                    args: Vec::new(),
                }),
            )?;
        }

        let mut temp_index = 0;
        let mut receivers: BTreeMap<ClassUid, ValueUid> = BTreeMap::new();
        for entry in entries {
            let method = &self[*entry];
            let class = method.class();
            if method.is_static() || self[class].is_default() || receivers.contains_key(&class) {
                continue;
            }
            let class_name = self[class].name().to_string();
            let constructor = self[class]
                .get_method(CONSTRUCTOR_NAME, self)
                .map(|method| method.signature().clone());
            let local = self.new_temp(dummy, &mut temp_index, Type::Class(class_name.clone()))?;
            self.push_alloc(dummy, local, &class_name)?;
            if let Some(constructor) = constructor {
                self.push_stmt(
                    dummy,
                    StmtKind::Invoke(InvokeExpr {
                        kind: InvokeKind::Instance { base: local },
                        method: constructor,
                        args: Vec::new(),
                    }),
                )?;
            }
            receivers.insert(class, local);
        }

        for entry in entries {
            let method = &self[*entry];
            let signature = method.signature().clone();
            let params = method.params().to_vec();
            let receiver = receivers.get(&method.class()).copied();
            let is_static = method.is_static();

            let mut args = Vec::new();
            for ty in params {
                let local = self.new_temp(dummy, &mut temp_index, ty.clone())?;
                if let Type::Class(class_name) = &ty {
                    self.push_alloc(dummy, local, class_name)?;
                }
                args.push(local);
            }
            let kind = match receiver {
                Some(base) if !is_static => InvokeKind::Instance { base },
                _ => InvokeKind::Static,
            };
            self.push_stmt(
                dummy,
                StmtKind::Invoke(InvokeExpr {
                    kind,
                    method: signature,
                    args,
                }),
            )?;
        }
        self.push_stmt(dummy, StmtKind::Return(None))?;
        log::debug!("dummy main created for {} entries", entries.len());
        Ok(dummy)
    }

    fn new_temp(
        &mut self,
        method: MethodUid,
        index: &mut usize,
        ty: Type,
    ) -> AnalysisResult<ValueUid> {
        let name = format!("temp{index}");
        *index += 1;
        self.get_or_new_local(method, &name, ty)
    }

    fn push_alloc(
        &mut self,
        method: MethodUid,
        local: ValueUid,
        class_name: &str,
    ) -> AnalysisResult<()> {
        let alloc = self.new_value(
            Some(method),
            ValueKind::NewExpr {
                class: class_name.to_string(),
            },
            Type::Class(class_name.to_string()),
        );
        self.push_stmt(
            method,
            StmtKind::Assign {
                left: local,
                right: alloc,
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_main_invokes_entries() {
        let mut repo = Repo::from_json_str(
            r#"{"files": [{"name": "app.ts", "classes": [
                {"name": "Ability", "methods": [
                    {"name": "constructor", "body": []},
                    {"name": "onCreate", "params": [{"name": "want", "type": "Want"}], "body": []},
                    {"name": "%statInit", "static": true, "body": []}
                ]},
                {"name": "Want"}
            ]}]}"#,
        )
        .unwrap();
        let entry = repo
            .get_method(&MethodSignature::new("Ability", "onCreate"))
            .unwrap()
            .uid();
        let dummy = repo.create_dummy_main(&[entry]).unwrap();
        let stmts: Vec<String> = repo[dummy]
            .iter_stmts()
            .map(|stmt| repo.display_stmt(stmt))
            .collect();
        assert_eq!(
            stmts,
            vec![
                "staticinvoke <Ability.%statInit>()",
                "temp0 = new Ability",
                "instanceinvoke temp0.<Ability.constructor>()",
                "temp1 = new Want",
                "instanceinvoke temp0.<Ability.onCreate>(temp1)",
                "return",
            ]
        );
        assert!(repo.create_dummy_main(&[entry]).is_err());
    }
}
