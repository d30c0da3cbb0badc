use crate::algorithm::{anonymous_call_sites, resolve_invoke_expr, AbstractAnalysis};
use crate::callgraph::{CallGraph, CallSite, CallStmt, FuncId};
use crate::repo::{StmtKind, StmtUid, ValueKind};
use std::collections::{BTreeMap, BTreeSet};

/// Rapid Type Analysis: class hierarchy analysis restricted to classes that
/// have been seen instantiated. Calls to not yet instantiated classes are
/// parked and replayed once an allocation of the class is reached.
pub struct RapidTypeAnalysis<'c, 'a> {
    cg: &'c mut CallGraph<'a>,
    instanced_classes: BTreeSet<String>,
    // (caller, callee, statement) waiting for an instance of the class
    ignored_calls: BTreeMap<String, BTreeSet<(FuncId, FuncId, StmtUid)>>,
}

impl<'c, 'a> RapidTypeAnalysis<'c, 'a> {
    pub fn new(cg: &'c mut CallGraph<'a>) -> Self {
        Self {
            cg,
            instanced_classes: BTreeSet::new(),
            ignored_calls: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_instanced(&self, class_name: &str) -> bool {
        self.instanced_classes.contains(class_name)
    }

    fn collect_instanced_classes(&self, func: FuncId) -> BTreeSet<String> {
        let repo = self.cg.repo();
        let Some(method) = self.cg.method_of(func) else {
            return BTreeSet::new();
        };
        method
            .iter_stmts()
            .filter_map(|stmt| match repo[stmt].kind() {
                StmtKind::Assign { right, .. } => match repo[*right].kind() {
                    ValueKind::NewExpr { class } => Some(class.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }
}

impl<'c, 'a> AbstractAnalysis<'a> for RapidTypeAnalysis<'c, 'a> {
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
            if possible.is_generated() && class.uid() != declaring.uid() {
                continue;
            }
            if possible.is_abstract() {
                continue;
            }
            let target = self.cg.get_or_add_node(possible.signature());
            if self.instanced_classes.contains(class.name()) {
                call_sites.push(CallSite {
                    stmt: CallStmt::Ir(stmt),
                    args: invoke.args.clone(),
                    callee: target,
                    caller,
                });
            } else {
                log::trace!(
                    "call to {} parked until {} is instantiated",
                    possible,
                    class
                );
                self.ignored_calls
                    .entry(class.name().to_string())
                    .or_default()
                    .insert((caller, target, stmt));
            }
        }
        call_sites
    }

    fn pre_process_method(&mut self, func: FuncId) -> Vec<CallSite> {
        let mut call_sites = Vec::new();
        for class in self.collect_instanced_classes(func) {
            if self.instanced_classes.contains(&class) {
                continue;
            }
            for (caller, callee, stmt) in self.ignored_calls.remove(&class).unwrap_or_default() {
                self.cg
                    .add_dynamic_call_edge(caller, callee, CallStmt::Ir(stmt));
                call_sites.push(CallSite {
                    stmt: CallStmt::Ir(stmt),
                    args: Vec::new(),
                    callee,
                    caller,
                });
            }
            self.instanced_classes.insert(class);
        }
        call_sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::ClassHierarchyAnalysis;
    use crate::callgraph::CallGraphBuilder;
    use crate::repo::{MethodSignature, Repo};

    // the allocation of A happens in a callee processed after main
    const FACTORY_PROGRAM: &str = r#"{"files": [{"name": "f.ts", "classes": [
        {"name": "Base", "methods": [{"name": "foo", "body": []}]},
        {"name": "A", "superclass": "Base", "methods": [{"name": "foo", "body": []}]},
        {"name": "B", "superclass": "Base", "methods": [{"name": "foo", "body": []}]},
        {"name": "Main", "methods": [
            {"name": "main", "static": true, "locals": {"a": "Base"}, "body": [
                {"call": {"result": "a", "method": "Main.makeA"}},
                {"call": {"base": "a", "method": "Base.foo"}}
            ]},
            {"name": "makeA", "static": true, "returns": "A", "body": [
                {"assign": ["x", {"new": "A"}]},
                {"return": "x"}
            ]}
        ]}
    ]}]}"#;

    fn callees(cg: &CallGraph, caller: &str) -> BTreeSet<String> {
        let caller = cg.get_node(&MethodSignature::parse(caller)).unwrap();
        cg.callees(caller)
            .map(|id| cg[id].signature().to_string())
            .collect()
    }

    #[test]
    fn parked_call_is_flushed_on_allocation() {
        let repo = Repo::from_json_str(FACTORY_PROGRAM).unwrap();
        let mut cg = CallGraph::new(&repo);
        CallGraphBuilder::new(&mut cg).build_direct_call_graph_for_repo();
        let main = cg.get_node(&MethodSignature::parse("Main.main")).unwrap();
        cg.set_entries(vec![main]);

        let mut rta = RapidTypeAnalysis::new(&mut cg);
        // main alone: the virtual call is parked
        let call = repo
            .get_method(&MethodSignature::parse("Main.main"))
            .unwrap()
            .iter_stmts()
            .nth(1)
            .unwrap();
        assert!(rta.resolve_call(main, call).is_empty());
        assert!(!rta.is_instanced("A"));

        let make_a = rta.cg().get_node(&MethodSignature::parse("Main.makeA")).unwrap();
        let flushed = rta.pre_process_method(make_a);
        assert_eq!(flushed.len(), 1);
        assert!(rta.is_instanced("A"));
        assert_eq!(rta.cg()[flushed[0].callee].signature().to_string(), "A.foo");

        let callees = callees(&cg, "Main.main");
        assert!(callees.contains("A.foo"));
        assert!(!callees.contains("B.foo"));
        assert!(!callees.contains("Base.foo"));
    }

    #[test]
    fn rapid_type_targets_are_class_hierarchy_targets() {
        let repo = Repo::from_json_str(FACTORY_PROGRAM).unwrap();
        let entries = [MethodSignature::parse("Main.main")];

        let mut cha_cg = CallGraph::new(&repo);
        let mut builder = CallGraphBuilder::new(&mut cha_cg);
        builder.build_direct_call_graph_for_repo();
        builder.build_class_hierarchy_call_graph(&entries, false);

        let mut rta_cg = CallGraph::new(&repo);
        let mut builder = CallGraphBuilder::new(&mut rta_cg);
        builder.build_direct_call_graph_for_repo();
        builder.build_rapid_type_call_graph(&entries, false);

        let cha = callees(&cha_cg, "Main.main");
        let rta = callees(&rta_cg, "Main.main");
        assert!(rta.is_subset(&cha));
        assert_eq!(cha.len(), 4);
        assert_eq!(
            rta,
            BTreeSet::from(["Main.makeA".to_string(), "A.foo".to_string()])
        );
    }

    #[test]
    fn class_hierarchy_start_is_idempotent() {
        let repo = Repo::from_json_str(FACTORY_PROGRAM).unwrap();
        let mut cg = CallGraph::new(&repo);
        let mut builder = CallGraphBuilder::new(&mut cg);
        builder.build_direct_call_graph_for_repo();
        builder.build_class_hierarchy_call_graph(&[MethodSignature::parse("Main.main")], false);
        let nb_edges = cg.nb_edges();
        ClassHierarchyAnalysis::new(&mut cg).start(false);
        assert_eq!(cg.nb_edges(), nb_edges);
    }
}
