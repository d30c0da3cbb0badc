//! Classes hierarchy graph representation.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::repo::{Class, ClassUid};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use Direction::{Incoming, Outgoing};

#[derive(Debug, PartialEq, Eq)]
pub enum Inheritance {
    Extends,
}

impl fmt::Display for Inheritance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Extends => write!(f, "<extends>"),
        }
    }
}

/// Single inheritance graph, edges go from a class to its superclass.
///
/// Classes are inserted in uid order and never removed, so a class uid
/// directly maps to its node index.
#[derive(Debug, Default)]
pub struct Hierarchy {
    inner: DiGraph<Class, Inheritance>,
    node_ids: BTreeMap<String, NodeIndex>,
}

impl Hierarchy {
    pub(crate) fn insert_class(&mut self, class: Class) -> AnalysisResult<ClassUid> {
        if self.node_ids.contains_key(class.name()) {
            return Err(AnalysisError::Internal(format!(
                "duplicate class {} in hierarchy graph",
                class.name()
            )));
        }
        if class.uid().idx() != self.inner.node_count() {
            return Err(AnalysisError::Internal(format!(
                "class {} inserted out of order",
                class.name()
            )));
        }

        let uid = class.uid();
        let class_name = class.name().to_string();
        let id = self.inner.add_node(class);
        self.node_ids.insert(class_name, id);
        Ok(uid)
    }

    #[inline]
    pub(crate) fn nb_classes(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn contains_class(&self, class_name: &str) -> bool {
        self.node_ids.contains_key(class_name)
    }

    pub fn iter_classes(&self) -> impl Iterator<Item = &Class> {
        self.inner.node_weights()
    }

    #[must_use]
    pub fn get_class(&self, class_name: &str) -> Option<&Class> {
        self.node_ids.get(class_name).map(|id| &self.inner[*id])
    }

    pub(crate) fn class(&self, uid: ClassUid) -> &Class {
        &self.inner[NodeIndex::new(uid.idx())]
    }

    pub(crate) fn class_mut(&mut self, uid: ClassUid) -> &mut Class {
        &mut self.inner[NodeIndex::new(uid.idx())]
    }

    pub(crate) fn insert_extends(&mut self, class: &str, superclass: &str) -> AnalysisResult<()> {
        let src = *self
            .node_ids
            .get(class)
            .ok_or_else(|| AnalysisError::ClassNotFound(class.to_string()))?;
        let dst = *self
            .node_ids
            .get(superclass)
            .ok_or_else(|| AnalysisError::ClassNotFound(superclass.to_string()))?;
        if self.inner.find_edge(src, dst).is_none() {
            self.inner.add_edge(src, dst, Inheritance::Extends);
        }
        Ok(())
    }

    /// Direct superclass of a class, if known.
    #[must_use]
    pub fn superclass(&self, class: &Class) -> Option<&Class> {
        let id = NodeIndex::new(class.uid().idx());
        self.inner
            .neighbors_directed(id, Outgoing)
            .next()
            .map(|parent| &self.inner[parent])
    }

    /// The class itself followed by all its (transitive) subclasses, in
    /// breadth-first order.
    #[must_use]
    pub fn subclass_closure(&self, class: &Class) -> Vec<&Class> {
        let start = NodeIndex::new(class.uid().idx());
        let mut closure = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            closure.push(&self.inner[id]);
            queue.extend(self.inner.neighbors_directed(id, Incoming));
        }
        closure
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        format!(
            "{}",
            Dot::with_attr_getters(
                &self.inner,
                &[Config::EdgeNoLabel],
                &|_, _| "arrowType=empty,style=solid".to_string(),
                &|_, (_, class)| {
                    let (color, shape) = match (class.is_defined(), class.is_abstract()) {
                        (true, false) => ("black", "box"),
                        (true, true) => ("#00000088", "box"),
                        (false, _) => ("black", "none"),
                    };
                    format!("color={color},shape={shape}")
                }
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::repo::Repo;

    #[test]
    fn subclass_closure_is_breadth_first() {
        let repo = Repo::from_json_str(
            r#"{"files": [{"name": "h.ts", "classes": [
                {"name": "Base"},
                {"name": "A", "superclass": "Base"},
                {"name": "B", "superclass": "Base"},
                {"name": "C", "superclass": "A"}
            ]}]}"#,
        )
        .unwrap();
        let hierarchy = repo.hierarchy();
        let base = hierarchy.get_class("Base").unwrap();
        let names: Vec<&str> = hierarchy
            .subclass_closure(base)
            .into_iter()
            .map(|class| class.name())
            .collect();
        assert_eq!(names.len(), 4);
        assert_eq!(names[0], "Base");
        assert_eq!(names[3], "C");

        let c = hierarchy.get_class("C").unwrap();
        assert_eq!(hierarchy.superclass(c).map(|class| class.name()), Some("A"));
        assert_eq!(hierarchy.subclass_closure(c).len(), 1);
    }

    #[test]
    fn missing_superclass_is_declared() {
        let repo = Repo::from_json_str(
            r#"{"files": [{"name": "h.ts", "classes": [{"name": "A", "superclass": "Missing"}]}]}"#,
        )
        .unwrap();
        let missing = repo.get_class_by_name("Missing").unwrap();
        assert!(!missing.is_defined());
        assert!(repo.hierarchy().to_dot().contains("shape=none"));
    }
}
