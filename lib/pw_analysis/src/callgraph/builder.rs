use crate::algorithm::{AbstractAnalysis, ClassHierarchyAnalysis, RapidTypeAnalysis};
use crate::callgraph::{CallGraph, CallGraphNodeKind, FuncId};
use crate::repo::{InvokeKind, Method, MethodSignature};

/// Populates a call graph from the methods of a repository.
pub struct CallGraphBuilder<'c, 'a> {
    cg: &'c mut CallGraph<'a>,
}

impl<'c, 'a> CallGraphBuilder<'c, 'a> {
    pub fn new(cg: &'c mut CallGraph<'a>) -> Self {
        Self { cg }
    }

    /// Adds every method of the repository, with their syntactically visible
    /// calls, and sets the entries.
    pub fn build_direct_call_graph_for_repo(&mut self) {
        let repo = self.cg.repo();
        let methods: Vec<&Method> = repo.iter_methods().collect();
        self.build_direct_call_graph(&methods);
        self.set_entries();
    }

    /// Creates a node per method, then an edge per static call and per
    /// constructor or generated method call. Other calls are recorded as
    /// dynamic call sites to be resolved later.
    pub fn build_direct_call_graph(&mut self, methods: &[&Method]) {
        let repo = self.cg.repo();
        for method in methods {
            let kind = if method.is_generated() {
                CallGraphNodeKind::Intrinsic
            } else if method.is_constructor() {
                CallGraphNodeKind::Constructor
            } else {
                CallGraphNodeKind::Real
            };
            self.cg.add_node(method.signature(), kind);
        }

        for method in methods {
            for stmt in method.iter_stmts() {
                let Some(invoke) = repo[stmt].invoke_expr() else {
                    continue;
                };
                match invoke.kind {
                    InvokeKind::Static => self.cg.add_direct_or_special_call_edge(
                        method.signature(),
                        &invoke.method,
                        stmt,
                        true,
                    ),
                    InvokeKind::Instance { .. } | InvokeKind::Ptr { .. } => {
                        let special = invoke.is_instance()
                            && repo
                                .get_method(&invoke.method)
                                .map_or(false, |callee| {
                                    callee.is_constructor() || callee.is_generated()
                                });
                        if special {
                            self.cg.add_direct_or_special_call_edge(
                                method.signature(),
                                &invoke.method,
                                stmt,
                                false,
                            );
                        } else {
                            self.cg.add_dynamic_call_info(
                                stmt,
                                method.signature(),
                                Some(&invoke.method),
                            );
                        }
                    }
                }
            }
        }
        log::debug!(
            "direct call graph: {} nodes, {} edges",
            self.cg.nb_nodes(),
            self.cg.nb_edges()
        );
    }

    /// Entries are the real methods with a body that nobody calls.
    pub fn set_entries(&mut self) {
        let entries: Vec<FuncId> = self
            .cg
            .iter_nodes()
            .filter(|(_, node)| node.kind() == CallGraphNodeKind::Real && !node.is_blank())
            .map(|(id, _)| id)
            .filter(|id| self.cg.in_degree(*id) == 0)
            .collect();
        log::debug!("{} call graph entries", entries.len());
        self.cg.set_entries(entries);
    }

    fn set_entry_methods(&mut self, entries: &[MethodSignature]) {
        let ids = entries
            .iter()
            .map(|entry| self.cg.get_or_add_node(entry))
            .collect();
        self.cg.set_entries(ids);
    }

    pub fn build_class_hierarchy_call_graph(
        &mut self,
        entries: &[MethodSignature],
        display_generated: bool,
    ) {
        self.set_entry_methods(entries);
        ClassHierarchyAnalysis::new(&mut *self.cg).start(display_generated);
    }

    pub fn build_rapid_type_call_graph(
        &mut self,
        entries: &[MethodSignature],
        display_generated: bool,
    ) {
        self.set_entry_methods(entries);
        RapidTypeAnalysis::new(&mut *self.cg).start(display_generated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repo;

    #[test]
    fn direct_call_graph() {
        let repo = Repo::from_json_str(
            r#"{"files": [{"name": "d.ts", "classes": [
                {"name": "A", "methods": [
                    {"name": "constructor", "body": []},
                    {"name": "get", "generated": true, "body": []},
                    {"name": "foo", "body": []}
                ]},
                {"name": "Main", "methods": [
                    {"name": "main", "static": true, "body": [
                        {"assign": ["a", {"new": "A"}]},
                        {"call": {"base": "a", "method": "A.constructor"}},
                        {"call": {"base": "a", "method": "A.get"}},
                        {"call": {"base": "a", "method": "A.foo"}},
                        {"call": {"method": "Main.helper"}}
                    ]},
                    {"name": "helper", "static": true, "body": []},
                    {"name": "decl", "static": true}
                ]}
            ]}]}"#,
        )
        .unwrap();
        let mut cg = CallGraph::new(&repo);
        CallGraphBuilder::new(&mut cg).build_direct_call_graph_for_repo();

        let main = cg.get_node(&MethodSignature::parse("Main.main")).unwrap();
        let ctor = cg.get_node(&MethodSignature::parse("A.constructor")).unwrap();
        let get = cg.get_node(&MethodSignature::parse("A.get")).unwrap();
        let foo = cg.get_node(&MethodSignature::parse("A.foo")).unwrap();
        let helper = cg.get_node(&MethodSignature::parse("Main.helper")).unwrap();
        assert_eq!(cg[ctor].kind(), CallGraphNodeKind::Constructor);
        assert_eq!(cg[get].kind(), CallGraphNodeKind::Intrinsic);
        assert!(cg.get_edge(main, ctor).is_some());
        assert!(cg.get_edge(main, get).is_some());
        assert!(cg.get_edge(main, helper).is_some());
        assert!(cg.get_edge(main, foo).is_none());

        let call = repo
            .get_method(&MethodSignature::parse("Main.main"))
            .unwrap()
            .iter_stmts()
            .nth(3)
            .unwrap();
        let dyn_cs = cg.dyn_call_site_by_stmt(call).unwrap();
        assert_eq!(dyn_cs.potential_callee, Some(foo));
        assert!(dyn_cs.base.is_some());

        // foo is only called dynamically, decl has no body, the default
        // method of the file is never called
        let entries: Vec<String> = cg
            .entries()
            .iter()
            .map(|id| cg[*id].signature().to_string())
            .collect();
        assert!(entries.contains(&"Main.main".to_string()));
        assert!(entries.contains(&"A.foo".to_string()));
        assert!(!entries.contains(&"Main.decl".to_string()));
        assert!(!entries.contains(&"Main.helper".to_string()));
    }
}
