use crate::algorithm::{anonymous_call_sites, resolve_invoke_expr, AbstractAnalysis};
use crate::callgraph::{CallGraph, CallSite, CallStmt, FuncId};
use crate::repo::StmtUid;

/// Class Hierarchy Analysis: a virtual call may reach the override of any
/// concrete subclass of the declaring class.
pub struct ClassHierarchyAnalysis<'c, 'a> {
    cg: &'c mut CallGraph<'a>,
}

impl<'c, 'a> ClassHierarchyAnalysis<'c, 'a> {
    pub fn new(cg: &'c mut CallGraph<'a>) -> Self {
        Self { cg }
    }
}

impl<'c, 'a> AbstractAnalysis<'a> for ClassHierarchyAnalysis<'c, 'a> {
    fn cg(&self) -> &CallGraph<'a> {
        &*self.cg
    }

    fn cg_mut(&mut self) -> &mut CallGraph<'a> {
        &mut *self.cg
    }

    fn resolve_call(&mut self, caller: FuncId, stmt: StmtUid) -> Vec<CallSite> {
        let repo = self.cg.repo();
        let Some(invoke) = repo[stmt].invoke_expr() else {
            return Vec::new();
        };
        let mut call_sites = anonymous_call_sites(&mut *self.cg, caller, stmt, invoke);
        let Some(callee) = resolve_invoke_expr(repo, invoke) else {
            log::trace!("no method found for {}", repo.display_stmt(stmt));
            return call_sites;
        };

        if invoke.is_static() {
            call_sites.push(CallSite {
                stmt: CallStmt::Ir(stmt),
                args: invoke.args.clone(),
                callee: self.cg.get_or_add_node(callee.signature()),
                caller,
            });
            return call_sites;
        }

        let declaring = &repo[callee.class()];
        for class in repo.hierarchy().subclass_closure(declaring) {
            if class.is_abstract() {
                continue;
            }
            let Some(possible) = class.get_method(callee.name(), repo) else {
                continue;
            };
            // generated overrides only shadow the declaring one
            if possible.is_generated() && class.uid() != declaring.uid() {
                continue;
            }
            if !possible.is_abstract() {
                call_sites.push(CallSite {
                    stmt: CallStmt::Ir(stmt),
                    args: invoke.args.clone(),
                    callee: self.cg.get_or_add_node(possible.signature()),
                    caller,
                });
            }
        }
        call_sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::CallGraphBuilder;
    use crate::repo::{MethodSignature, Repo};

    const OVERRIDE_PROGRAM: &str = r#"{"files": [{"name": "o.ts", "classes": [
        {"name": "Base", "methods": [
            {"name": "constructor", "body": []},
            {"name": "foo", "body": []}
        ]},
        {"name": "A", "superclass": "Base", "methods": [
            {"name": "constructor", "body": []},
            {"name": "foo", "body": []}
        ]},
        {"name": "Main", "methods": [
            {"name": "main", "static": true, "locals": {"a": "A"}, "body": [
                {"assign": ["a", {"new": "A"}]},
                {"call": {"base": "a", "method": "A.constructor"}},
                {"call": {"base": "a", "method": "A.foo"}}
            ]}
        ]}
    ]}]}"#;

    #[test]
    fn virtual_call_to_override() {
        let repo = Repo::from_json_str(OVERRIDE_PROGRAM).unwrap();
        let mut cg = CallGraph::new(&repo);
        let mut builder = CallGraphBuilder::new(&mut cg);
        builder.build_direct_call_graph_for_repo();
        builder.build_class_hierarchy_call_graph(&[MethodSignature::parse("Main.main")], false);

        let main = cg.get_node(&MethodSignature::parse("Main.main")).unwrap();
        let a_foo = cg.get_node(&MethodSignature::parse("A.foo")).unwrap();
        let base_foo = cg.get_node(&MethodSignature::parse("Base.foo")).unwrap();
        let edge = cg.get_edge(main, a_foo).unwrap();
        assert_eq!(edge.iter_indirect_calls().count(), 1);
        assert!(cg.get_edge(main, base_foo).is_none());
    }

    #[test]
    fn abstract_classes_contribute_nothing() {
        let repo = Repo::from_json_str(
            r#"{"files": [{"name": "abs.ts", "classes": [
                {"name": "Shape", "abstract": true, "methods": [
                    {"name": "area", "abstract": true}
                ]},
                {"name": "Square", "superclass": "Shape", "methods": [{"name": "area", "body": []}]},
                {"name": "Circle", "superclass": "Shape", "methods": [{"name": "area", "body": []}]},
                {"name": "Main", "methods": [
                    {"name": "main", "static": true, "locals": {"s": "Shape"}, "body": [
                        {"call": {"base": "s", "method": "Shape.area"}}
                    ]}
                ]}
            ]}]}"#,
        )
        .unwrap();
        let mut cg = CallGraph::new(&repo);
        let mut builder = CallGraphBuilder::new(&mut cg);
        builder.build_direct_call_graph_for_repo();
        builder.build_class_hierarchy_call_graph(&[MethodSignature::parse("Main.main")], false);

        let main = cg.get_node(&MethodSignature::parse("Main.main")).unwrap();
        let callees: Vec<String> = cg
            .callees(main)
            .map(|id| cg[id].signature().to_string())
            .collect();
        assert_eq!(callees.len(), 2);
        assert!(callees.contains(&"Square.area".to_string()));
        assert!(callees.contains(&"Circle.area".to_string()));
    }
}
