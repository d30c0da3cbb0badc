//! Shared pieces of the call graph and pointer assignment graph: dense
//! integer identities and dot rendering driven by node and edge kinds.

use petgraph::dot::{Config, Dot};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::fmt;

/// Dense integer identity of a graph node, stable for the analysis run.
pub type NodeId = NodeIndex;

/// A node is displayed with its `Display` text as label.
pub trait GraphNode: fmt::Display {
    /// Extra dot attributes (shape, color, ...).
    fn dot_attr(&self) -> String;
}

pub trait GraphEdge: fmt::Display {
    fn dot_attr(&self) -> String;
}

/// Escapes a label to be used inside a double quoted dot attribute.
pub(crate) fn escape_label(label: &str) -> String {
    html_escape::encode_double_quoted_attribute(label)
        .replace('\n', "\\l")
}

/// Renders a whole graph with the attributes of its nodes and edges.
#[must_use]
pub fn to_dot<N: GraphNode, E: GraphEdge>(graph: &StableDiGraph<N, E>, name: &str) -> String {
    let content = format!(
        "{}",
        Dot::with_attr_getters(
            graph,
            &[
                Config::GraphContentOnly,
                Config::NodeNoLabel,
                Config::EdgeNoLabel
            ],
            &|_, edge| edge.weight().dot_attr(),
            &|_, (id, node)| {
                let label = escape_label(&format!("[{}] {}", id.index(), node));
                let attr = node.dot_attr();
                if attr.is_empty() {
                    format!("label=\"{label}\"")
                } else {
                    format!("label=\"{label}\",{attr}")
                }
            }
        )
    );
    format!("digraph \"{}\" {{\n  rankdir=LR;\n{content}}}\n", escape_label(name))
}

/// Number of edges entering a node.
pub(crate) fn in_degree<N, E>(graph: &StableDiGraph<N, E>, id: NodeId) -> usize {
    graph
        .edges_directed(id, petgraph::Direction::Incoming)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node(&'static str);
    struct Edge;

    impl fmt::Display for Node {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl fmt::Display for Edge {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "edge")
        }
    }

    impl GraphNode for Node {
        fn dot_attr(&self) -> String {
            "shape=box".to_string()
        }
    }

    impl GraphEdge for Edge {
        fn dot_attr(&self) -> String {
            "color=red".to_string()
        }
    }

    #[test]
    fn dot_output_escapes_labels() {
        let mut graph = StableDiGraph::new();
        let a = graph.add_node(Node("a \"quoted\""));
        let b = graph.add_node(Node("b"));
        graph.add_edge(a, b, Edge);
        let dot = to_dot(&graph, "test");
        assert!(dot.starts_with("digraph \"test\" {"));
        assert!(dot.contains("&quot;quoted&quot;"));
        assert!(dot.contains("shape=box"));
        assert!(dot.contains("color=red"));
        assert_eq!(in_degree(&graph, b), 1);
        assert_eq!(in_degree(&graph, a), 0);
    }
}
