use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that reject a single mutation or validation call outright.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Port '{port_id}' not found on node '{node_id}'")]
    PortNotFound { node_id: String, port_id: String },

    #[error("Invalid connection '{connection_id}': {reason}")]
    InvalidConnection {
        connection_id: String,
        reason: String,
    },

    #[error(
        "Invalid channel capacity {capacity} on connection '{connection_id}' \
         (expected -1, 0 or a positive depth)"
    )]
    InvalidCapacity {
        connection_id: String,
        capacity: i32,
    },

    #[error("Node '{0}' is not a graph node")]
    NotAGraphNode(String),

    #[error("Invalid port mapping '{port_name}' on graph node '{graph_node_id}': {reason}")]
    InvalidPortMapping {
        graph_node_id: String,
        port_name: String,
        reason: String,
    },
}

/// Errors raised while resolving connections across subgraph boundaries.
///
/// These never abort a whole-graph pass: callers collect them per connection
/// (or per boundary port) and keep going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Connection '{connection_id}' is unresolvable at {failure_point}: {reason}")]
    UnresolvableConnection {
        connection_id: String,
        failure_point: String,
        reason: String,
    },

    #[error("Broken port mapping '{port_name}' on graph node '{graph_node_id}': {reason}")]
    BrokenPortMapping {
        graph_node_id: String,
        port_name: String,
        reason: String,
    },

    #[error(
        "Exposed port '{port_name}' on graph node '{graph_node_id}' is served by \
         {} external connections: {}",
        .connection_ids.len(),
        .connection_ids.join(", ")
    )]
    AmbiguousPassThru {
        graph_node_id: String,
        port_name: String,
        connection_ids: Vec<String>,
    },

    #[error(
        "Exposed port '{port_name}' on graph node '{graph_node_id}' has no external connection"
    )]
    NoExternalConnection {
        graph_node_id: String,
        port_name: String,
    },
}

impl ResolveError {
    pub(crate) fn unresolvable(
        connection_id: &str,
        failure_point: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ResolveError::UnresolvableConnection {
            connection_id: connection_id.to_string(),
            failure_point: failure_point.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn broken_mapping(
        graph_node_id: &str,
        port_name: &str,
        reason: impl Into<String>,
    ) -> Self {
        ResolveError::BrokenPortMapping {
            graph_node_id: graph_node_id.to_string(),
            port_name: port_name.to_string(),
            reason: reason.into(),
        }
    }
}
