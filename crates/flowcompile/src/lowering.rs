//! Lowering of a graph into a flat wiring plan.
//!
//! Every root and internal connection becomes at most one statement that
//! names the channel on each side by the port's position in its owner's port
//! list. Connections whose endpoints cannot be found are dropped with a
//! diagnostic; lowering always continues with the rest of the graph.

use crate::channel::channel_name;
use crate::error::LoweringError;
use flowcore::{
    Connection, Diagnostic, DiagnosticCode, FlowGraph, PortDirection, ScopeResolver, RENDEZVOUS,
    UNLIMITED,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Channel semantics encoded by a connection capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "depth", rename_all = "snake_case")]
pub enum Buffering {
    /// Synchronous handoff.
    Rendezvous,
    Unlimited,
    /// Buffer of the given depth with backpressure.
    Bounded(u32),
}

impl Buffering {
    /// `None` for capacities below -1.
    pub fn from_capacity(capacity: i32) -> Option<Self> {
        match capacity {
            RENDEZVOUS => Some(Buffering::Rendezvous),
            UNLIMITED => Some(Buffering::Unlimited),
            depth => u32::try_from(depth).ok().map(Buffering::Bounded),
        }
    }
}

impl fmt::Display for Buffering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Buffering::Rendezvous => f.write_str("rendezvous"),
            Buffering::Unlimited => f.write_str("unlimited"),
            Buffering::Bounded(depth) => write!(f, "bounded({})", depth),
        }
    }
}

/// One lowered connection: the source channel is wired to the target channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringStatement {
    pub connection_id: String,
    /// Graph node the wiring lives in; `None` at the root.
    pub scope_node_id: Option<String>,
    pub source_node_id: String,
    pub source_port_id: String,
    pub source_channel: String,
    pub target_node_id: String,
    pub target_port_id: String,
    pub target_channel: String,
    /// Forwarded verbatim from the connection.
    pub capacity: i32,
    pub ip_type_id: Option<String>,
}

impl WiringStatement {
    pub fn buffering(&self) -> Option<Buffering> {
        Buffering::from_capacity(self.capacity)
    }
}

impl fmt::Display for WiringStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_node_id, self.source_channel, self.target_node_id, self.target_channel
        )?;
        match self.buffering() {
            Some(buffering) => write!(f, " [{}]", buffering),
            None => write!(f, " [capacity {}]", self.capacity),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoweringMode {
    /// One statement per stored connection, between its own endpoints.
    #[default]
    PerConnection,
    /// One statement per connection, between the code nodes at the two ends
    /// of its resolved segment chain.
    Flattened,
}

impl LoweringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoweringMode::PerConnection => "per_connection",
            LoweringMode::Flattened => "flattened",
        }
    }
}

impl fmt::Display for LoweringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoweringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_connection" | "per-connection" => Ok(LoweringMode::PerConnection),
            "flattened" => Ok(LoweringMode::Flattened),
            other => Err(format!("unknown lowering mode '{}'", other)),
        }
    }
}

/// Ordered statements in connection declaration order, root connections
/// first, plus the diagnostics for every connection that was dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WiringPlan {
    pub statements: Vec<WiringStatement>,
    pub diagnostics: Vec<Diagnostic>,
}

impl WiringPlan {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statement(&self, connection_id: &str) -> Option<&WiringStatement> {
        self.statements.iter().find(|s| s.connection_id == connection_id)
    }
}

pub struct Lowerer<'g> {
    graph: &'g FlowGraph,
    resolver: ScopeResolver<'g>,
}

impl<'g> Lowerer<'g> {
    pub fn new(graph: &'g FlowGraph) -> Self {
        Self {
            graph,
            resolver: ScopeResolver::new(graph),
        }
    }

    pub fn lower(&self, mode: LoweringMode) -> WiringPlan {
        let mut plan = WiringPlan::default();
        for scoped in self.graph.scoped_connections() {
            let lowered = match mode {
                LoweringMode::PerConnection => {
                    self.lower_connection(scoped.connection, scoped.scope)
                }
                LoweringMode::Flattened => self.lower_flattened(scoped.connection),
            };
            match lowered {
                Ok(statement) => plan.statements.push(statement),
                Err(diagnostic) => {
                    tracing::warn!(
                        "Dropping connection {}: {}",
                        scoped.connection.id,
                        diagnostic.message
                    );
                    plan.diagnostics.push(diagnostic);
                }
            }
        }

        tracing::debug!(
            "Lowered graph {} ({} mode) into {} statements, {} dropped",
            self.graph.name,
            mode,
            plan.statements.len(),
            plan.diagnostics.len()
        );
        plan
    }

    fn lower_connection(
        &self,
        connection: &Connection,
        scope: Option<&str>,
    ) -> Result<WiringStatement, Diagnostic> {
        self.statement(
            connection,
            scope.map(str::to_string),
            (connection.source_node_id.as_str(), connection.source_port_id.as_str()),
            (connection.target_node_id.as_str(), connection.target_port_id.as_str()),
        )
        .map_err(|err| Diagnostic::from(&err))
    }

    fn lower_flattened(&self, connection: &Connection) -> Result<WiringStatement, Diagnostic> {
        // Missing endpoints read as dangling references in both modes.
        let (source, target) = (&connection.source_node_id, &connection.target_node_id);
        self.slot(connection, source, &connection.source_port_id, PortDirection::Output)
            .and_then(|_| {
                self.slot(connection, target, &connection.target_port_id, PortDirection::Input)
            })
            .map_err(|err| Diagnostic::from(&err))?;

        let segments = self.resolver.resolve(connection).map_err(|err| Diagnostic::from(&err))?;
        let (first, last) = segments.first().zip(segments.last()).ok_or_else(|| {
            Diagnostic::warning(
                DiagnosticCode::UnresolvableConnection,
                connection.id.clone(),
                "connection resolved to no segments",
            )
        })?;

        let scope = self
            .resolver
            .index()
            .common_scope(&first.source_node_id, &last.target_node_id)
            .flatten()
            .map(str::to_string);
        self.statement(
            connection,
            scope,
            (first.source_node_id.as_str(), first.source_port_id.as_str()),
            (last.target_node_id.as_str(), last.target_port_id.as_str()),
        )
        .map_err(|err| Diagnostic::from(&err))
    }

    fn statement(
        &self,
        connection: &Connection,
        scope_node_id: Option<String>,
        source: (&str, &str),
        target: (&str, &str),
    ) -> Result<WiringStatement, LoweringError> {
        let (source_index, source_count) =
            self.slot(connection, source.0, source.1, PortDirection::Output)?;
        let (target_index, target_count) =
            self.slot(connection, target.0, target.1, PortDirection::Input)?;

        Ok(WiringStatement {
            connection_id: connection.id.clone(),
            scope_node_id,
            source_node_id: source.0.to_string(),
            source_port_id: source.1.to_string(),
            source_channel: channel_name(PortDirection::Output, source_index, source_count),
            target_node_id: target.0.to_string(),
            target_port_id: target.1.to_string(),
            target_channel: channel_name(PortDirection::Input, target_index, target_count),
            capacity: connection.channel_capacity,
            ip_type_id: connection.ip_type_id.clone(),
        })
    }

    /// Zero-based position of a port among its owner's ports of `direction`,
    /// with the number of such ports.
    fn slot(
        &self,
        connection: &Connection,
        node_id: &str,
        port_id: &str,
        direction: PortDirection,
    ) -> Result<(usize, usize), LoweringError> {
        let dangling = || LoweringError::DanglingPortReference {
            connection_id: connection.id.clone(),
            node_id: node_id.to_string(),
            port_id: port_id.to_string(),
        };
        let node = self.resolver.index().node(node_id).ok_or_else(dangling)?;
        let ports = node.ports(direction);
        let index = ports.iter().position(|port| port.id == port_id).ok_or_else(dangling)?;
        Ok((index, ports.len()))
    }
}

/// Lowers every connection of `graph`.
pub fn lower(graph: &FlowGraph, mode: LoweringMode) -> WiringPlan {
    Lowerer::new(graph).lower(mode)
}
