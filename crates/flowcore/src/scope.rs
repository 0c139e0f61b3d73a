//! Decomposition of connections into per-scope segments.
//!
//! A connection whose endpoints sit in different scopes is split at every
//! graph node boundary it crosses. Boundaries are crossed through exposed
//! ports, found by routing (pass-thru data first, port mapping otherwise).

use crate::connection::{Connection, ConnectionSegment};
use crate::diagnostic::Diagnostic;
use crate::error::ResolveError;
use crate::graph::FlowGraph;
use crate::index::{common_prefix_len, GraphIndex, ScopeRef};
use crate::node::Node;
use crate::port::{Port, PortDirection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoint<'g> {
    node_id: &'g str,
    port_id: &'g str,
}

impl<'g> Endpoint<'g> {
    fn of(node: &'g Node, port: &'g Port) -> Self {
        Self {
            node_id: node.id(),
            port_id: &port.id,
        }
    }
}

/// One scoped hop before it is numbered.
struct Hop<'g> {
    scope: ScopeRef<'g>,
    source: Endpoint<'g>,
    target: Endpoint<'g>,
}

/// Segments of a single connection, in source to target order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConnection {
    pub connection_id: String,
    pub segments: Vec<ConnectionSegment>,
}

/// Outcome of resolving every connection of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolved: Vec<ResolvedConnection>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn segments(&self) -> impl Iterator<Item = &ConnectionSegment> {
        self.resolved.iter().flat_map(|resolved| resolved.segments.iter())
    }

    pub fn segments_for(&self, connection_id: &str) -> Option<&[ConnectionSegment]> {
        self.resolved
            .iter()
            .find(|resolved| resolved.connection_id == connection_id)
            .map(|resolved| resolved.segments.as_slice())
    }
}

pub struct ScopeResolver<'g> {
    graph: &'g FlowGraph,
    index: GraphIndex<'g>,
}

impl<'g> ScopeResolver<'g> {
    pub fn new(graph: &'g FlowGraph) -> Self {
        Self {
            graph,
            index: GraphIndex::build(graph),
        }
    }

    pub fn index(&self) -> &GraphIndex<'g> {
        &self.index
    }

    /// Graph node ids enclosing a node, outermost first.
    pub fn ancestry(&self, node_id: &str) -> Option<Vec<&'g str>> {
        self.index.ancestry(node_id)
    }

    /// Resolves every root and internal connection. A failing connection is
    /// reported as a diagnostic and the rest still resolve.
    pub fn resolve_all(&self) -> Resolution {
        let mut resolution = Resolution::default();
        for scoped in self.graph.scoped_connections() {
            match self.resolve(scoped.connection) {
                Ok(segments) => resolution.resolved.push(ResolvedConnection {
                    connection_id: scoped.connection.id.clone(),
                    segments,
                }),
                Err(err) => {
                    tracing::warn!("Skipping connection {}: {}", scoped.connection.id, err);
                    resolution.diagnostics.push(Diagnostic::from(&err));
                }
            }
        }
        tracing::debug!(
            "Resolved {} connections into {} segments ({} diagnostics)",
            resolution.resolved.len(),
            resolution.segments().count(),
            resolution.diagnostics.len()
        );
        resolution
    }

    /// Splits one connection into ordered segments, one per scope it passes
    /// through. The connection does not have to be stored in the graph.
    pub fn resolve(&self, connection: &Connection) -> Result<Vec<ConnectionSegment>, ResolveError> {
        let (source_node, source_port) = self.endpoint(connection, Side::Source)?;
        let (target_node, target_port) = self.endpoint(connection, Side::Target)?;

        if source_node.id() == target_node.id() {
            let scope = self.index.parent(source_node.id()).flatten();
            let hop = Hop {
                scope,
                source: Endpoint::of(source_node, source_port),
                target: Endpoint::of(target_node, target_port),
            };
            return Ok(number(connection, vec![hop]));
        }

        let source_chain = self.chain(connection, source_node.id())?;
        let target_chain = self.chain(connection, target_node.id())?;
        let shared = common_prefix_len(&source_chain, &target_chain);
        let common: ScopeRef<'g> = if shared == 0 { None } else { Some(source_chain[shared - 1]) };

        let mut hops = Vec::new();

        // Inside the source graph node, innermost producer first.
        let mut inner = self.descend(connection, source_node, source_port)?;
        inner.reverse();
        hops.extend(inner);

        let mut source = Endpoint::of(source_node, source_port);
        for &scope in source_chain[shared..].iter().rev() {
            let exposed = self.cross(connection, scope, PortDirection::Output, source)?;
            hops.push(Hop {
                scope: Some(scope),
                source,
                target: exposed,
            });
            source = exposed;
        }

        let mut target = Endpoint::of(target_node, target_port);
        let mut entering = Vec::new();
        for &scope in target_chain[shared..].iter().rev() {
            let exposed = self.cross(connection, scope, PortDirection::Input, target)?;
            entering.push(Hop {
                scope: Some(scope),
                source: exposed,
                target,
            });
            target = exposed;
        }

        hops.push(Hop {
            scope: common,
            source,
            target,
        });
        entering.reverse();
        hops.extend(entering);
        hops.extend(self.descend(connection, target_node, target_port)?);

        tracing::debug!(
            "Connection {} resolved into {} segments",
            connection.id,
            hops.len()
        );
        Ok(number(connection, hops))
    }

    fn endpoint(
        &self,
        connection: &Connection,
        side: Side,
    ) -> Result<(&'g Node, &'g Port), ResolveError> {
        let (node_id, port_id, expected) = match side {
            Side::Source => (
                &connection.source_node_id,
                &connection.source_port_id,
                PortDirection::Output,
            ),
            Side::Target => (
                &connection.target_node_id,
                &connection.target_port_id,
                PortDirection::Input,
            ),
        };
        let label = side.label();

        let node = self.index.node(node_id).ok_or_else(|| {
            ResolveError::unresolvable(
                &connection.id,
                format!("{} node '{}'", label, node_id),
                "node not found",
            )
        })?;
        let port = node.find_port(port_id).ok_or_else(|| {
            ResolveError::unresolvable(
                &connection.id,
                format!("{} port '{}'", label, port_id),
                format!("port not found on {} '{}'", node.kind(), node_id),
            )
        })?;
        if port.direction != expected {
            return Err(ResolveError::unresolvable(
                &connection.id,
                format!("{} port '{}'", label, port_id),
                format!("expected an {} port, found an {} port", expected, port.direction),
            ));
        }
        Ok((node, port))
    }

    fn chain(&self, connection: &Connection, node_id: &str) -> Result<Vec<&'g str>, ResolveError> {
        self.index.ancestry(node_id).ok_or_else(|| {
            ResolveError::unresolvable(
                &connection.id,
                format!("node '{}'", node_id),
                "node not found",
            )
        })
    }

    /// Finds the exposed port of graph node `scope` that routes to `inner`.
    fn cross(
        &self,
        connection: &Connection,
        scope: &'g str,
        direction: PortDirection,
        inner: Endpoint<'g>,
    ) -> Result<Endpoint<'g>, ResolveError> {
        let graph = self.index.graph_node(scope).ok_or_else(|| {
            ResolveError::unresolvable(
                &connection.id,
                format!("boundary of '{}'", scope),
                "enclosing scope is not a graph node",
            )
        })?;
        let exposed = graph
            .exposed_for_child(direction, inner.node_id, inner.port_id)
            .ok_or_else(|| {
                ResolveError::unresolvable(
                    &connection.id,
                    format!("boundary of '{}'", scope),
                    format!(
                        "no exposed {} port routes to '{}' port '{}'",
                        direction, inner.node_id, inner.port_id
                    ),
                )
            })?;
        Ok(Endpoint {
            node_id: &graph.base.id,
            port_id: &exposed.port().id,
        })
    }

    /// Follows a graph node's exposed port inward until a code node is
    /// reached, outermost hop first.
    fn descend(
        &self,
        connection: &Connection,
        node: &'g Node,
        port: &'g Port,
    ) -> Result<Vec<Hop<'g>>, ResolveError> {
        let mut hops = Vec::new();
        let mut current = (node, port);
        while let Node::Graph(graph) = current.0 {
            let exposed = graph.find_exposed(&current.1.id).ok_or_else(|| {
                ResolveError::unresolvable(
                    &connection.id,
                    format!("boundary of '{}'", graph.base.id),
                    format!("port '{}' is not exposed", current.1.id),
                )
            })?;
            let (child, child_port) = graph.route(exposed)?;
            let outer = Endpoint::of(current.0, current.1);
            let inner = Endpoint::of(child, child_port);
            let (source, target) = match current.1.direction {
                PortDirection::Input => (outer, inner),
                PortDirection::Output => (inner, outer),
            };
            hops.push(Hop {
                scope: Some(graph.base.id.as_str()),
                source,
                target,
            });
            current = (child, child_port);
        }
        Ok(hops)
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Source,
    Target,
}

impl Side {
    fn label(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

fn number(connection: &Connection, hops: Vec<Hop<'_>>) -> Vec<ConnectionSegment> {
    hops.into_iter()
        .enumerate()
        .map(|(i, hop)| ConnectionSegment {
            id: format!("{}#{}", connection.id, i),
            parent_connection_id: connection.id.clone(),
            source_node_id: hop.source.node_id.to_string(),
            source_port_id: hop.source.port_id.to_string(),
            target_node_id: hop.target.node_id.to_string(),
            target_port_id: hop.target.port_id.to_string(),
            scope_node_id: hop.scope.map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CodeNode, CodeNodeType, GraphNode};

    #[test]
    fn test_sibling_connection_is_single_segment() {
        let graph = FlowGraph::new("flat")
            .with_node(
                CodeNode::new("a", CodeNodeType::Generator)
                    .with_id("a")
                    .with_output("out", "Int"),
            )
            .with_node(CodeNode::new("b", CodeNodeType::Sink).with_id("b").with_input("in", "Int"))
            .with_connection(Connection::new("a", "a.out.out", "b", "b.in.in").with_id("c1"));

        let resolver = ScopeResolver::new(&graph);
        let segments = resolver.resolve(&graph.connections[0]).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].id, "c1#0");
        assert_eq!(segments[0].scope_node_id, None);
    }

    #[test]
    fn test_wrong_direction_is_unresolvable() {
        let graph = FlowGraph::new("flat")
            .with_node(
                CodeNode::new("a", CodeNodeType::Generator)
                    .with_id("a")
                    .with_output("out", "Int"),
            )
            .with_node(CodeNode::new("b", CodeNodeType::Sink).with_id("b").with_input("in", "Int"));
        let backwards = Connection::new("b", "b.in.in", "a", "a.out.out").with_id("back");

        let err = ScopeResolver::new(&graph).resolve(&backwards).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnresolvableConnection { ref connection_id, .. }
                if connection_id == "back"
        ));
    }

    #[test]
    fn test_connection_inside_graph_node_is_scoped_to_it() {
        let group = GraphNode::new("g")
            .with_id("g")
            .with_child(
                CodeNode::new("x", CodeNodeType::Transformer)
                    .with_id("x")
                    .with_output("out", "Int"),
            )
            .with_child(CodeNode::new("y", CodeNodeType::Sink).with_id("y").with_input("in", "Int"))
            .with_connection(Connection::new("x", "x.out.out", "y", "y.in.in").with_id("inner"));
        let graph = FlowGraph::new("scoped").with_node(group);

        let resolution = ScopeResolver::new(&graph).resolve_all();
        let segments = resolution.segments_for("inner").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].scope_node_id.as_deref(), Some("g"));
    }
}
