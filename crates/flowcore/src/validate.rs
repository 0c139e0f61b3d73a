use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::error::GraphError;
use crate::graph::FlowGraph;
use crate::index::GraphIndex;
use crate::node::{GraphNode, Node};
use crate::passthru::PassThruSynthesizer;
use crate::port::{ExposedPort, PassThruPort, PortDirection};
use crate::scope::ScopeResolver;
use std::collections::HashSet;

impl FlowGraph {
    /// Checks every structural invariant and reports all problems found.
    ///
    /// Errors break an invariant outright; warnings mark elements that
    /// resolution and lowering will skip.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = self
            .structural_errors()
            .iter()
            .map(Diagnostic::from)
            .collect();

        let resolver = ScopeResolver::new(self);
        diagnostics.extend(resolver.resolve_all().diagnostics);

        let synthesizer = PassThruSynthesizer::new(self);
        for node in self.nodes() {
            if let Node::Graph(graph_node) = node {
                check_boundary(graph_node, resolver.index(), &synthesizer, &mut diagnostics);
            }
        }

        tracing::info!(
            "Validated graph {} ({} diagnostics)",
            self.name,
            diagnostics.len()
        );
        diagnostics
    }

    /// Fails on the first structural error: duplicate ids, bad capacities or
    /// connections whose existing endpoints point the wrong way.
    pub fn check(&self) -> Result<(), GraphError> {
        match self.structural_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn structural_errors(&self) -> Vec<GraphError> {
        let mut errors = Vec::new();
        let mut node_ids = HashSet::new();
        let mut port_ids = HashSet::new();
        for node in self.nodes() {
            if !node_ids.insert(node.id()) {
                errors.push(GraphError::DuplicateId {
                    kind: "node",
                    id: node.id().to_string(),
                });
            }
            for port in node.all_ports() {
                if !port_ids.insert(port.id.as_str()) {
                    errors.push(GraphError::DuplicateId {
                        kind: "port",
                        id: port.id.clone(),
                    });
                }
            }
        }

        let index = GraphIndex::build(self);
        let mut connection_ids = HashSet::new();
        for scoped in self.scoped_connections() {
            let connection = scoped.connection;
            if !connection_ids.insert(connection.id.as_str()) {
                errors.push(GraphError::DuplicateId {
                    kind: "connection",
                    id: connection.id.clone(),
                });
            }
            if !connection.has_valid_capacity() {
                errors.push(GraphError::InvalidCapacity {
                    connection_id: connection.id.clone(),
                    capacity: connection.channel_capacity,
                });
            }
            let ends = [
                (&connection.source_node_id, &connection.source_port_id, PortDirection::Output),
                (&connection.target_node_id, &connection.target_port_id, PortDirection::Input),
            ];
            for (node_id, port_id, expected) in ends {
                let port = index.node(node_id).and_then(|node| node.find_port(port_id));
                if let Some(port) = port {
                    if port.direction != expected {
                        errors.push(GraphError::InvalidConnection {
                            connection_id: connection.id.clone(),
                            reason: format!(
                                "port '{}' is an {} port, expected {}",
                                port.id, port.direction, expected
                            ),
                        });
                    }
                }
                // Unknown nodes surface later as unresolvable connections.
                if let Some(scope) = scoped.scope {
                    let outside = index.entry(node_id).is_some()
                        && node_id != scope
                        && !index.is_descendant_of(node_id, scope);
                    if outside {
                        errors.push(GraphError::InvalidConnection {
                            connection_id: connection.id.clone(),
                            reason: format!(
                                "endpoint '{}' lies outside graph node '{}' that stores it",
                                node_id, scope
                            ),
                        });
                    }
                }
            }
        }
        errors
    }
}

fn check_boundary(
    graph_node: &GraphNode,
    index: &GraphIndex<'_>,
    synthesizer: &PassThruSynthesizer<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let id = graph_node.base.id.as_str();

    for name in graph_node.port_mappings.keys() {
        let exposed = graph_node
            .find_exposed_by_name(PortDirection::Input, name)
            .or_else(|| graph_node.find_exposed_by_name(PortDirection::Output, name));
        if exposed.is_none() {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::BrokenPortMapping,
                format!("{}.{}", id, name),
                format!("mapping '{}' on '{}' names no exposed port", name, id),
            ));
        }
    }

    for exposed in &graph_node.input_ports {
        if graph_node
            .find_exposed_by_name(PortDirection::Output, exposed.name())
            .is_some()
        {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::AmbiguousPassThru,
                format!("{}.{}", id, exposed.name()),
                format!(
                    "'{}' exposes both an input and an output port named '{}'",
                    id,
                    exposed.name()
                ),
            ));
        }
    }

    for exposed in graph_node.input_ports.iter().chain(graph_node.output_ports.iter()) {
        if let Err(err) = graph_node.route(exposed) {
            tracing::warn!("{}", err);
            diagnostics.push(Diagnostic::from(&err));
        }
        if let ExposedPort::PassThru(pass_thru) = exposed {
            check_pass_thru(graph_node, pass_thru, index, diagnostics);
        }

        let external = synthesizer.external_connections(id, exposed.id());
        if synthesizer.external_endpoints(id, exposed.id()).len() > 1 {
            let ids: Vec<&str> = external.iter().map(|c| c.id.as_str()).collect();
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::AmbiguousPassThru,
                format!("{}.{}", id, exposed.name()),
                format!(
                    "exposed port '{}' on '{}' is served by {} external connections: {}",
                    exposed.name(),
                    id,
                    ids.len(),
                    ids.join(", ")
                ),
            ));
        }
    }
}

/// The external endpoint must live in the graph node's own scope: a sibling,
/// or the enclosing graph node's boundary.
fn check_pass_thru(
    graph_node: &GraphNode,
    pass_thru: &PassThruPort,
    index: &GraphIndex<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let id = graph_node.base.id.as_str();
    let subject = format!("{}.{}", id, pass_thru.port.name);
    let (node_id, port_id) = pass_thru.external_endpoint();
    let scope = index.parent(id).flatten();

    let Some(entry) = index.entry(node_id) else {
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::InvalidPassThru,
            subject,
            format!("external endpoint '{}' does not exist", node_id),
        ));
        return;
    };

    let (in_scope, wanted) = if Some(node_id) == scope {
        // Enclosing boundary: same direction as this port.
        (true, pass_thru.port.direction)
    } else {
        (
            entry.parent == scope && node_id != id,
            pass_thru.port.direction.opposite(),
        )
    };
    if !in_scope {
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::InvalidPassThru,
            subject,
            format!("external endpoint '{}' is not a sibling of '{}'", node_id, id),
        ));
        return;
    }

    match entry.node.find_port(port_id) {
        Some(port) if port.direction == wanted => {}
        Some(port) => diagnostics.push(Diagnostic::warning(
            DiagnosticCode::InvalidPassThru,
            subject,
            format!(
                "external port '{}' is an {} port, expected {}",
                port.id, port.direction, wanted
            ),
        )),
        None => diagnostics.push(Diagnostic::warning(
            DiagnosticCode::InvalidPassThru,
            subject,
            format!("external port '{}' not found on '{}'", port_id, node_id),
        )),
    }
}
