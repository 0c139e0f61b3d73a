//! Boundary routing metadata for graph nodes.
//!
//! A [`PassThruPort`] records both sides of a boundary crossing: the external
//! sibling endpoint and the internal child endpoint. Plain exposed ports with a
//! [`PortMapping`](crate::PortMapping) stay valid; synthesis only makes the
//! routing explicit.

use crate::connection::{Connection, ConnectionSegment};
use crate::diagnostic::Diagnostic;
use crate::error::ResolveError;
use crate::graph::FlowGraph;
use crate::node::{GraphNode, Node};
use crate::port::{ExposedPort, PassThruPort, PortDirection};
use crate::scope::ScopeResolver;

pub struct PassThruSynthesizer<'g> {
    graph: &'g FlowGraph,
    resolver: ScopeResolver<'g>,
    /// Every resolvable connection with its segments, computed once.
    resolved: Vec<(&'g Connection, Vec<ConnectionSegment>)>,
}

impl<'g> PassThruSynthesizer<'g> {
    pub fn new(graph: &'g FlowGraph) -> Self {
        let resolver = ScopeResolver::new(graph);
        let resolved = graph
            .scoped_connections()
            .into_iter()
            .filter_map(|scoped| {
                resolver
                    .resolve(scoped.connection)
                    .ok()
                    .map(|segments| (scoped.connection, segments))
            })
            .collect();
        Self {
            graph,
            resolver,
            resolved,
        }
    }

    /// Builds the pass-thru form of an exposed port.
    ///
    /// When `external` is `None` the single connection crossing the port from
    /// outside is looked up; zero or several candidates are errors.
    pub fn synthesize(
        &self,
        graph_node_id: &str,
        exposed_port_name: &str,
        external: Option<&Connection>,
    ) -> Result<PassThruPort, ResolveError> {
        let graph_node = self.resolver.index().graph_node(graph_node_id).ok_or_else(|| {
            ResolveError::broken_mapping(graph_node_id, exposed_port_name, "graph node not found")
        })?;
        let input = graph_node.find_exposed_by_name(PortDirection::Input, exposed_port_name);
        let output = graph_node.find_exposed_by_name(PortDirection::Output, exposed_port_name);
        let exposed = match (input, output) {
            (Some(exposed), None) | (None, Some(exposed)) => exposed,
            (None, None) => {
                return Err(ResolveError::broken_mapping(
                    graph_node_id,
                    exposed_port_name,
                    "no exposed port with this name",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ResolveError::broken_mapping(
                    graph_node_id,
                    exposed_port_name,
                    "name is used by both an input and an output port",
                ))
            }
        };
        self.synthesize_port(graph_node, exposed, external)
    }

    fn synthesize_port(
        &self,
        graph_node: &'g GraphNode,
        exposed: &'g ExposedPort,
        external: Option<&Connection>,
    ) -> Result<PassThruPort, ResolveError> {
        let port = exposed.port();
        let (child, child_port) = graph_node.route(exposed)?;

        let (external_node, external_port) = match external {
            Some(connection) => {
                let segments = self.resolver.resolve(connection)?;
                outside_endpoint(graph_node, exposed, &segments).ok_or_else(|| {
                    ResolveError::unresolvable(
                        &connection.id,
                        format!("boundary of '{}'", graph_node.base.id),
                        format!("connection does not cross exposed port '{}'", port.name),
                    )
                })?
            }
            None => {
                let candidates = self.candidates(graph_node, exposed);
                let endpoints = distinct_endpoints(&candidates);
                match endpoints.as_slice() {
                    [] => {
                        return Err(ResolveError::NoExternalConnection {
                            graph_node_id: graph_node.base.id.clone(),
                            port_name: port.name.clone(),
                        })
                    }
                    [end] => end.clone(),
                    _ => {
                        return Err(ResolveError::AmbiguousPassThru {
                            graph_node_id: graph_node.base.id.clone(),
                            port_name: port.name.clone(),
                            connection_ids: candidates.iter().map(|(c, _)| c.id.clone()).collect(),
                        })
                    }
                }
            }
        };

        let internal_node = child.id().to_string();
        let internal_port = child_port.id.clone();
        let pass_thru = match port.direction {
            PortDirection::Input => PassThruPort {
                port: port.clone(),
                upstream_node_id: external_node,
                upstream_port_id: external_port,
                downstream_node_id: internal_node,
                downstream_port_id: internal_port,
            },
            PortDirection::Output => PassThruPort {
                port: port.clone(),
                upstream_node_id: internal_node,
                upstream_port_id: internal_port,
                downstream_node_id: external_node,
                downstream_port_id: external_port,
            },
        };
        Ok(pass_thru)
    }

    fn candidates(
        &self,
        graph_node: &GraphNode,
        exposed: &ExposedPort,
    ) -> Vec<(&'g Connection, (String, String))> {
        self.resolved
            .iter()
            .filter_map(|(connection, segments)| {
                outside_endpoint(graph_node, exposed, segments).map(|end| (*connection, end))
            })
            .collect()
    }

    /// Connections that reach an exposed port from outside its graph node.
    pub fn external_connections(&self, graph_node_id: &str, port_id: &str) -> Vec<&'g Connection> {
        self.lookup(graph_node_id, port_id)
            .map(|(graph_node, exposed)| {
                self.candidates(graph_node, exposed)
                    .into_iter()
                    .map(|(connection, _)| connection)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct (node, port) pairs feeding or fed by an exposed port from
    /// outside. More than one makes the port ambiguous.
    pub fn external_endpoints(&self, graph_node_id: &str, port_id: &str) -> Vec<(String, String)> {
        self.lookup(graph_node_id, port_id)
            .map(|(graph_node, exposed)| distinct_endpoints(&self.candidates(graph_node, exposed)))
            .unwrap_or_default()
    }

    fn lookup(
        &self,
        graph_node_id: &str,
        port_id: &str,
    ) -> Option<(&'g GraphNode, &'g ExposedPort)> {
        let graph_node = self.resolver.index().graph_node(graph_node_id)?;
        let exposed = graph_node.find_exposed(port_id)?;
        Some((graph_node, exposed))
    }

    /// Returns a copy of the graph where every plain exposed port with exactly
    /// one external connection becomes a pass-thru port. Ports that cannot be
    /// upgraded are left as they are and reported.
    pub fn upgrade(&self) -> (FlowGraph, Vec<Diagnostic>) {
        let mut replacements = Vec::new();
        let mut diagnostics = Vec::new();

        for node in self.graph.nodes() {
            let Node::Graph(graph_node) = node else {
                continue;
            };
            let exposed_ports = graph_node.input_ports.iter().chain(graph_node.output_ports.iter());
            for exposed in exposed_ports {
                if exposed.as_pass_thru().is_some() {
                    continue;
                }
                match self.synthesize_port(graph_node, exposed, None) {
                    Ok(pass_thru) => replacements.push((graph_node.base.id.clone(), pass_thru)),
                    Err(err) => {
                        tracing::warn!(
                            "Leaving {}.{} unchanged: {}",
                            graph_node.base.id,
                            exposed.name(),
                            err
                        );
                        diagnostics.push(Diagnostic::from(&err));
                    }
                }
            }
        }

        let mut upgraded = self.graph.clone();
        let count = replacements.len();
        for (graph_node_id, pass_thru) in replacements {
            if let Some(Node::Graph(graph_node)) = upgraded.find_node_mut(&graph_node_id) {
                graph_node.replace_exposed(pass_thru);
            }
        }
        tracing::info!(
            "Upgraded {} exposed ports to pass-thru ({} left unchanged)",
            count,
            diagnostics.len()
        );
        (upgraded, diagnostics)
    }
}

/// Free-function form of [`PassThruSynthesizer::synthesize`].
pub fn synthesize_pass_thru(
    graph: &FlowGraph,
    graph_node_id: &str,
    exposed_port_name: &str,
    external: Option<&Connection>,
) -> Result<PassThruPort, ResolveError> {
    PassThruSynthesizer::new(graph).synthesize(graph_node_id, exposed_port_name, external)
}

fn distinct_endpoints(candidates: &[(&Connection, (String, String))]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for (_, end) in candidates {
        if !out.contains(end) {
            out.push(end.clone());
        }
    }
    out
}

/// The endpoint on the far side of `exposed`, taken from a segment that
/// touches the port from outside the graph node.
fn outside_endpoint(
    graph_node: &GraphNode,
    exposed: &ExposedPort,
    segments: &[ConnectionSegment],
) -> Option<(String, String)> {
    let id = graph_node.base.id.as_str();
    let port_id = exposed.id();
    segments
        .iter()
        .filter(|segment| segment.scope_node_id.as_deref() != Some(id))
        .find_map(|segment| match exposed.port().direction {
            PortDirection::Input
                if segment.target_node_id == id && segment.target_port_id == port_id =>
            {
                Some((segment.source_node_id.clone(), segment.source_port_id.clone()))
            }
            PortDirection::Output
                if segment.source_node_id == id && segment.source_port_id == port_id =>
            {
                Some((segment.target_node_id.clone(), segment.target_port_id.clone()))
            }
            _ => None,
        })
}
