use crate::graph::FlowGraph;
use crate::node::{GraphNode, Node};
use std::collections::HashMap;

/// `None` is the root scope, otherwise the id of a graph node.
pub type ScopeRef<'a> = Option<&'a str>;

#[derive(Debug, Clone, Copy)]
pub struct IndexedNode<'g> {
    pub node: &'g Node,
    pub parent: ScopeRef<'g>,
    /// Root nodes sit at depth 1.
    pub depth: usize,
}

/// Id lookup over one graph snapshot, with a parent map for ancestry queries.
///
/// When ids collide the first node in pre-order wins; validation reports
/// the collision separately.
#[derive(Debug, Clone)]
pub struct GraphIndex<'g> {
    entries: HashMap<&'g str, IndexedNode<'g>>,
}

impl<'g> GraphIndex<'g> {
    pub fn build(graph: &'g FlowGraph) -> Self {
        let mut entries = HashMap::new();
        index_nodes(&graph.root_nodes, None, 1, &mut entries);
        Self { entries }
    }

    pub fn entry(&self, node_id: &str) -> Option<&IndexedNode<'g>> {
        self.entries.get(node_id)
    }

    pub fn node(&self, node_id: &str) -> Option<&'g Node> {
        self.entries.get(node_id).map(|entry| entry.node)
    }

    pub fn graph_node(&self, node_id: &str) -> Option<&'g GraphNode> {
        self.node(node_id).and_then(Node::as_graph)
    }

    pub fn parent(&self, node_id: &str) -> Option<ScopeRef<'g>> {
        self.entries.get(node_id).map(|entry| entry.parent)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Graph node ids enclosing `node_id`, outermost first. Empty for root nodes.
    pub fn ancestry(&self, node_id: &str) -> Option<Vec<&'g str>> {
        let mut chain = Vec::new();
        let mut current = self.entries.get(node_id)?.parent;
        while let Some(scope) = current {
            chain.push(scope);
            current = self.entries.get(scope).and_then(|entry| entry.parent);
        }
        chain.reverse();
        Some(chain)
    }

    /// Innermost scope enclosing both nodes, or `None` if either is unknown.
    pub fn common_scope(&self, a: &str, b: &str) -> Option<ScopeRef<'g>> {
        let left = self.ancestry(a)?;
        let right = self.ancestry(b)?;
        let shared = common_prefix_len(&left, &right);
        Some(if shared == 0 { None } else { Some(left[shared - 1]) })
    }

    /// True when `node_id` is nested (at any depth) inside `ancestor_id`.
    pub fn is_descendant_of(&self, node_id: &str, ancestor_id: &str) -> bool {
        self.ancestry(node_id)
            .map(|chain| chain.contains(&ancestor_id))
            .unwrap_or(false)
    }
}

pub(crate) fn common_prefix_len(left: &[&str], right: &[&str]) -> usize {
    left.iter()
        .zip(right.iter())
        .take_while(|(a, b)| a == b)
        .count()
}

fn index_nodes<'g>(
    nodes: &'g [Node],
    parent: ScopeRef<'g>,
    depth: usize,
    entries: &mut HashMap<&'g str, IndexedNode<'g>>,
) {
    for node in nodes {
        entries.entry(node.id()).or_insert(IndexedNode {
            node,
            parent,
            depth,
        });
        if let Node::Graph(graph) = node {
            index_nodes(&graph.child_nodes, Some(graph.base.id.as_str()), depth + 1, entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CodeNode, CodeNodeType, GraphNode};

    fn nested() -> FlowGraph {
        FlowGraph::new("nested")
            .with_node(CodeNode::new("src", CodeNodeType::Generator).with_id("src"))
            .with_node(
                GraphNode::new("outer").with_id("outer").with_child(
                    GraphNode::new("inner")
                        .with_id("inner")
                        .with_child(CodeNode::new("leaf", CodeNodeType::Sink).with_id("leaf")),
                ),
            )
    }

    #[test]
    fn test_ancestry_is_outermost_first() {
        let graph = nested();
        let index = GraphIndex::build(&graph);

        assert_eq!(index.ancestry("leaf"), Some(vec!["outer", "inner"]));
        assert_eq!(index.ancestry("src"), Some(vec![]));
        assert_eq!(index.ancestry("missing"), None);
        assert_eq!(index.entry("leaf").map(|e| e.depth), Some(3));
    }

    #[test]
    fn test_common_scope() {
        let graph = nested();
        let index = GraphIndex::build(&graph);

        assert_eq!(index.common_scope("src", "leaf"), Some(None));
        assert_eq!(index.common_scope("inner", "leaf"), Some(Some("outer")));
        assert_eq!(index.common_scope("leaf", "leaf"), Some(Some("inner")));
        assert!(index.is_descendant_of("leaf", "outer"));
        assert!(!index.is_descendant_of("src", "outer"));
    }
}
