use crate::connection::Connection;
use crate::error::GraphError;
use crate::node::{Node, Position};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type GraphId = String;

pub const DEFAULT_VERSION: &str = "1.0.0";

/// Top-level named, versioned dataflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub id: GraphId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub root_nodes: Vec<Node>,
    /// Root-level connections; subgraph connections live on their graph node.
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
    #[serde(default)]
    pub target_platforms: Vec<String>,
}

/// A connection together with the scope that stores it.
#[derive(Debug, Clone, Copy)]
pub struct ScopedConnection<'a> {
    /// `None` is the root scope.
    pub scope: Option<&'a str>,
    pub connection: &'a Connection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub code_nodes: usize,
    pub graph_nodes: usize,
    /// Deepest nesting level; root nodes sit at depth 1.
    pub max_depth: usize,
    pub root_connections: usize,
    pub internal_connections: usize,
}

impl GraphStats {
    pub fn node_count(&self) -> usize {
        self.code_nodes + self.graph_nodes
    }

    pub fn connection_count(&self) -> usize {
        self.root_connections + self.internal_connections
    }
}

impl FlowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            version: DEFAULT_VERSION.to_string(),
            description: None,
            root_nodes: Vec::new(),
            connections: Vec::new(),
            metadata: IndexMap::new(),
            target_platforms: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_target(mut self, platform: impl Into<String>) -> Self {
        self.target_platforms.push(platform.into());
        self
    }

    pub fn with_node(mut self, node: impl Into<Node>) -> Self {
        self.root_nodes.push(node.into());
        self
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Finds a node at any depth.
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        find_in(&self.root_nodes, id)
    }

    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        find_in_mut(&mut self.root_nodes, id)
    }

    /// Finds a connection at any depth, with the scope that stores it.
    pub fn find_connection(&self, id: &str) -> Option<ScopedConnection<'_>> {
        self.scoped_connections()
            .into_iter()
            .find(|scoped| scoped.connection.id == id)
    }

    /// Every node, depth-first pre-order in declaration order.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        collect_nodes(&self.root_nodes, &mut out);
        out
    }

    /// Root connections first, then each graph node's internal connections
    /// in depth-first pre-order.
    pub fn scoped_connections(&self) -> Vec<ScopedConnection<'_>> {
        let mut out: Vec<ScopedConnection<'_>> = self
            .connections
            .iter()
            .map(|connection| ScopedConnection {
                scope: None,
                connection,
            })
            .collect();
        for node in self.nodes() {
            if let Node::Graph(graph) = node {
                out.extend(graph.internal_connections.iter().map(|connection| {
                    ScopedConnection {
                        scope: Some(graph.base.id.as_str()),
                        connection,
                    }
                }));
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// Root plus every internal connection, recursively.
    pub fn connection_count(&self) -> usize {
        self.scoped_connections().len()
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            root_connections: self.connections.len(),
            ..GraphStats::default()
        };
        accumulate_stats(&self.root_nodes, 1, &mut stats);
        stats
    }

    /// Node list and connection list of a scope; `None` is the root.
    pub(crate) fn scope_mut(
        &mut self,
        scope: Option<&str>,
    ) -> Result<(&mut Vec<Node>, &mut Vec<Connection>), GraphError> {
        match scope {
            None => Ok((&mut self.root_nodes, &mut self.connections)),
            Some(id) => {
                let node = self
                    .find_node_mut(id)
                    .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
                match node {
                    Node::Graph(graph) => {
                        Ok((&mut graph.child_nodes, &mut graph.internal_connections))
                    }
                    Node::Code(_) => Err(GraphError::NotAGraphNode(id.to_string())),
                }
            }
        }
    }

    pub(crate) fn set_position(
        &mut self,
        node_id: &str,
        position: Position,
    ) -> Result<(), GraphError> {
        let node = self
            .find_node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        node.base_mut().position = position;
        Ok(())
    }
}

fn find_in<'a>(nodes: &'a [Node], id: &str) -> Option<&'a Node> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_in(node.children(), id) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut<'a>(nodes: &'a mut [Node], id: &str) -> Option<&'a mut Node> {
    for node in nodes.iter_mut() {
        if node.id() == id {
            return Some(node);
        }
        if let Node::Graph(graph) = node {
            if let Some(found) = find_in_mut(&mut graph.child_nodes, id) {
                return Some(found);
            }
        }
    }
    None
}

fn collect_nodes<'a>(nodes: &'a [Node], out: &mut Vec<&'a Node>) {
    for node in nodes {
        out.push(node);
        collect_nodes(node.children(), out);
    }
}

fn accumulate_stats(nodes: &[Node], depth: usize, stats: &mut GraphStats) {
    for node in nodes {
        stats.max_depth = stats.max_depth.max(depth);
        match node {
            Node::Code(_) => stats.code_nodes += 1,
            Node::Graph(graph) => {
                stats.graph_nodes += 1;
                stats.internal_connections += graph.internal_connections.len();
                accumulate_stats(&graph.child_nodes, depth + 1, stats);
            }
        }
    }
}

/// JSON form for tooling. The text codec owns the persisted form.
impl FlowGraph {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<FlowGraph> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_json(&self, mut writer: impl std::io::Write) -> crate::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
