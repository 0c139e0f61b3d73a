use crate::port::PortId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ConnectionId = String;

/// Capacity of a synchronous hand-off channel.
pub const RENDEZVOUS: i32 = 0;
/// Capacity of an unbounded channel.
pub const UNLIMITED: i32 = -1;

/// Directed edge from an OUTPUT port to an INPUT port, possibly crossing
/// subgraph boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_node_id: String,
    pub source_port_id: PortId,
    pub target_node_id: String,
    pub target_port_id: PortId,
    #[serde(default)]
    pub ip_type_id: Option<String>,
    #[serde(default)]
    pub channel_capacity: i32,
}

impl Connection {
    pub fn new(
        source_node_id: impl Into<String>,
        source_port_id: impl Into<String>,
        target_node_id: impl Into<String>,
        target_port_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_node_id: source_node_id.into(),
            source_port_id: source_port_id.into(),
            target_node_id: target_node_id.into(),
            target_port_id: target_port_id.into(),
            ip_type_id: None,
            channel_capacity: RENDEZVOUS,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_capacity(mut self, capacity: i32) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_ip_type(mut self, ip_type_id: impl Into<String>) -> Self {
        self.ip_type_id = Some(ip_type_id.into());
        self
    }

    /// Id given to connections whose declaration carries no explicit id.
    pub fn derived_id(
        source_node_id: &str,
        source_port_id: &str,
        target_node_id: &str,
        target_port_id: &str,
    ) -> ConnectionId {
        format!(
            "{}.{}->{}.{}",
            source_node_id, source_port_id, target_node_id, target_port_id
        )
    }

    pub fn has_valid_capacity(&self) -> bool {
        self.channel_capacity >= UNLIMITED
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }
}

/// The portion of a connection visible within one scope.
///
/// Derived from the current graph and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSegment {
    pub id: String,
    pub parent_connection_id: ConnectionId,
    pub source_node_id: String,
    pub source_port_id: PortId,
    pub target_node_id: String,
    pub target_port_id: PortId,
    /// `None` is the root scope, otherwise the id of a graph node.
    pub scope_node_id: Option<String>,
}

impl ConnectionSegment {
    pub fn is_root(&self) -> bool {
        self.scope_node_id.is_none()
    }
}
