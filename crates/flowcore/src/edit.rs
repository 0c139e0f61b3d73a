//! Value-returning mutation surface used by editors.
//!
//! Every operation leaves `self` untouched and returns the edited copy, so
//! undo is a matter of keeping the previous value.

use crate::connection::Connection;
use crate::error::GraphError;
use crate::graph::FlowGraph;
use crate::index::GraphIndex;
use crate::node::{Node, Position};
use crate::port::{ExposedPort, PortDirection};
use crate::scope::ScopeResolver;
use std::collections::HashSet;

impl FlowGraph {
    /// Adds a node (with any subtree it carries) under `parent_id`, or at the
    /// root when `parent_id` is `None`.
    pub fn add_node(
        &self,
        node: impl Into<Node>,
        parent_id: Option<&str>,
    ) -> Result<FlowGraph, GraphError> {
        let node = node.into();
        let incoming = FlowGraph {
            root_nodes: vec![node.clone()],
            ..FlowGraph::new("incoming")
        };
        incoming.check()?;

        let existing_nodes: HashSet<&str> = self.nodes().into_iter().map(Node::id).collect();
        let existing_ports: HashSet<&str> = self
            .nodes()
            .into_iter()
            .flat_map(Node::all_ports)
            .map(|port| port.id.as_str())
            .collect();
        let existing_connections: HashSet<&str> = self
            .scoped_connections()
            .into_iter()
            .map(|scoped| scoped.connection.id.as_str())
            .collect();

        for added in incoming.nodes() {
            if existing_nodes.contains(added.id()) {
                return Err(GraphError::DuplicateId {
                    kind: "node",
                    id: added.id().to_string(),
                });
            }
            if let Some(port) = added
                .all_ports()
                .into_iter()
                .find(|port| existing_ports.contains(port.id.as_str()))
            {
                return Err(GraphError::DuplicateId {
                    kind: "port",
                    id: port.id.clone(),
                });
            }
        }
        if let Some(scoped) = incoming
            .scoped_connections()
            .into_iter()
            .find(|scoped| existing_connections.contains(scoped.connection.id.as_str()))
        {
            return Err(GraphError::DuplicateId {
                kind: "connection",
                id: scoped.connection.id.clone(),
            });
        }

        let mut graph = self.clone();
        let (nodes, _) = graph.scope_mut(parent_id)?;
        tracing::debug!("Adding {} {} to {:?}", node.kind(), node.id(), parent_id);
        nodes.push(node);
        Ok(graph)
    }

    /// Removes a node and its subtree, together with every connection, port
    /// mapping and pass-thru route that referenced any removed node.
    pub fn remove_node(&self, node_id: &str) -> Result<FlowGraph, GraphError> {
        let index = GraphIndex::build(self);
        let entry = index
            .entry(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;

        let mut removed = HashSet::new();
        collect_ids(entry.node, &mut removed);
        let parent = entry.parent.map(str::to_string);

        let mut graph = self.clone();
        let (nodes, _) = graph.scope_mut(parent.as_deref())?;
        nodes.retain(|node| node.id() != node_id);

        graph.connections.retain(|c| !touches_any(c, &removed));
        prune(&mut graph.root_nodes, &removed);

        tracing::debug!("Removed node {} ({} nodes in subtree)", node_id, removed.len());
        Ok(graph)
    }

    /// Adds a connection after checking capacity, id uniqueness, endpoint
    /// directions and reachability. The connection is stored in the innermost
    /// scope enclosing both endpoints.
    pub fn add_connection(&self, connection: Connection) -> Result<FlowGraph, GraphError> {
        if !connection.has_valid_capacity() {
            return Err(GraphError::InvalidCapacity {
                connection_id: connection.id.clone(),
                capacity: connection.channel_capacity,
            });
        }
        if self.find_connection(&connection.id).is_some() {
            return Err(GraphError::DuplicateId {
                kind: "connection",
                id: connection.id.clone(),
            });
        }

        let resolver = ScopeResolver::new(self);
        let index = resolver.index();
        let ends = [
            (&connection.source_node_id, &connection.source_port_id, PortDirection::Output),
            (&connection.target_node_id, &connection.target_port_id, PortDirection::Input),
        ];
        for (node_id, port_id, expected) in ends {
            let node = index
                .node(node_id)
                .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
            let port = node.find_port(port_id).ok_or_else(|| GraphError::PortNotFound {
                node_id: node_id.clone(),
                port_id: port_id.clone(),
            })?;
            if port.direction != expected {
                return Err(GraphError::InvalidConnection {
                    connection_id: connection.id.clone(),
                    reason: format!(
                        "port '{}' is an {} port, expected {}",
                        port.id, port.direction, expected
                    ),
                });
            }
        }

        resolver
            .resolve(&connection)
            .map_err(|err| GraphError::InvalidConnection {
                connection_id: connection.id.clone(),
                reason: err.to_string(),
            })?;

        let scope = index
            .common_scope(&connection.source_node_id, &connection.target_node_id)
            .flatten()
            .map(str::to_string);

        let mut graph = self.clone();
        let (_, connections) = graph.scope_mut(scope.as_deref())?;
        tracing::debug!("Adding connection {} to {:?}", connection.id, scope);
        connections.push(connection);
        Ok(graph)
    }

    pub fn remove_connection(&self, connection_id: &str) -> Result<FlowGraph, GraphError> {
        let scope = self
            .find_connection(connection_id)
            .ok_or_else(|| GraphError::ConnectionNotFound(connection_id.to_string()))?
            .scope
            .map(str::to_string);

        let mut graph = self.clone();
        let (_, connections) = graph.scope_mut(scope.as_deref())?;
        connections.retain(|c| c.id != connection_id);
        Ok(graph)
    }

    pub fn update_node_position(
        &self,
        node_id: &str,
        position: Position,
    ) -> Result<FlowGraph, GraphError> {
        let mut graph = self.clone();
        graph.set_position(node_id, position)?;
        Ok(graph)
    }
}

fn collect_ids(node: &Node, out: &mut HashSet<String>) {
    out.insert(node.id().to_string());
    for child in node.children() {
        collect_ids(child, out);
    }
}

fn touches_any(connection: &Connection, removed: &HashSet<String>) -> bool {
    removed.contains(&connection.source_node_id) || removed.contains(&connection.target_node_id)
}

/// Drops references to removed nodes from every remaining graph node.
fn prune(nodes: &mut [Node], removed: &HashSet<String>) {
    for node in nodes.iter_mut() {
        let Node::Graph(graph) = node else {
            continue;
        };
        graph.internal_connections.retain(|c| !touches_any(c, removed));
        graph
            .port_mappings
            .retain(|_, mapping| !removed.contains(&mapping.child_node_id));

        for exposed in graph.input_ports.iter_mut().chain(graph.output_ports.iter_mut()) {
            let stale = match exposed {
                ExposedPort::PassThru(pass_thru) => {
                    removed.contains(&pass_thru.upstream_node_id)
                        || removed.contains(&pass_thru.downstream_node_id)
                }
                ExposedPort::Plain(_) => false,
            };
            if stale {
                *exposed = ExposedPort::Plain(exposed.port().clone());
            }
        }

        prune(&mut graph.child_nodes, removed);
    }
}
