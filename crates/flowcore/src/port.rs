use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type PortId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }

    /// Short tag used in derived port ids.
    pub fn tag(&self) -> &'static str {
        match self {
            PortDirection::Input => "in",
            PortDirection::Output => "out",
        }
    }

    pub fn opposite(&self) -> PortDirection {
        match self {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" | "INPUT" => Ok(PortDirection::Input),
            "output" | "OUTPUT" => Ok(PortDirection::Output),
            other => Err(format!("unknown port direction '{}'", other)),
        }
    }
}

/// Typed, directional attachment point on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub name: String,
    pub direction: PortDirection,
    /// Opaque payload type tag, e.g. `"Int"` or `"com.example.Reading"`.
    pub data_type: String,
    pub owning_node_id: String,
    #[serde(default)]
    pub required: bool,
}

impl Port {
    pub fn new(
        owning_node_id: impl Into<String>,
        name: impl Into<String>,
        direction: PortDirection,
        data_type: impl Into<String>,
    ) -> Self {
        let owning_node_id = owning_node_id.into();
        let name = name.into();
        Self {
            id: Self::derived_id(&owning_node_id, direction, &name),
            name,
            direction,
            data_type: data_type.into(),
            owning_node_id,
            required: false,
        }
    }

    pub fn input(
        owning_node_id: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self::new(owning_node_id, name, PortDirection::Input, data_type)
    }

    pub fn output(
        owning_node_id: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self::new(owning_node_id, name, PortDirection::Output, data_type)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Id given to ports whose declaration carries no explicit id.
    pub fn derived_id(owning_node_id: &str, direction: PortDirection, name: &str) -> PortId {
        format!("{}.{}.{}", owning_node_id, direction.tag(), name)
    }

    pub fn has_derived_id(&self) -> bool {
        self.id == Self::derived_id(&self.owning_node_id, self.direction, &self.name)
    }

    /// Moves the port to a new owner, re-deriving its id when it was derived.
    pub(crate) fn rehome(&mut self, owning_node_id: &str) {
        if self.has_derived_id() {
            self.id = Self::derived_id(owning_node_id, self.direction, &self.name);
        }
        self.owning_node_id = owning_node_id.to_string();
    }
}

/// A boundary port that records the crossing connection it bridges.
///
/// For an INPUT port the upstream side is the external sibling feeding the
/// graph node and the downstream side is the internal child; OUTPUT reverses
/// the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassThruPort {
    #[serde(flatten)]
    pub port: Port,
    pub upstream_node_id: String,
    pub upstream_port_id: PortId,
    pub downstream_node_id: String,
    pub downstream_port_id: PortId,
}

impl PassThruPort {
    /// The (node, port) pair on the inside of the boundary.
    pub fn internal_endpoint(&self) -> (&str, &str) {
        match self.port.direction {
            PortDirection::Input => (&self.downstream_node_id, &self.downstream_port_id),
            PortDirection::Output => (&self.upstream_node_id, &self.upstream_port_id),
        }
    }

    /// The (node, port) pair on the outside of the boundary.
    pub fn external_endpoint(&self) -> (&str, &str) {
        match self.port.direction {
            PortDirection::Input => (&self.upstream_node_id, &self.upstream_port_id),
            PortDirection::Output => (&self.downstream_node_id, &self.downstream_port_id),
        }
    }
}

/// A port a graph node exposes on its boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExposedPort {
    Plain(Port),
    PassThru(PassThruPort),
}

impl ExposedPort {
    pub fn port(&self) -> &Port {
        match self {
            ExposedPort::Plain(port) => port,
            ExposedPort::PassThru(pass_thru) => &pass_thru.port,
        }
    }

    pub fn port_mut(&mut self) -> &mut Port {
        match self {
            ExposedPort::Plain(port) => port,
            ExposedPort::PassThru(pass_thru) => &mut pass_thru.port,
        }
    }

    pub fn as_pass_thru(&self) -> Option<&PassThruPort> {
        match self {
            ExposedPort::PassThru(pass_thru) => Some(pass_thru),
            ExposedPort::Plain(_) => None,
        }
    }

    pub fn id(&self) -> &str {
        &self.port().id
    }

    pub fn name(&self) -> &str {
        &self.port().name
    }
}

impl From<Port> for ExposedPort {
    fn from(port: Port) -> Self {
        ExposedPort::Plain(port)
    }
}

impl From<PassThruPort> for ExposedPort {
    fn from(pass_thru: PassThruPort) -> Self {
        ExposedPort::PassThru(pass_thru)
    }
}

/// Associates an exposed port name with a port on a direct child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub child_node_id: String,
    pub child_port_name: String,
}

impl PortMapping {
    pub fn new(child_node_id: impl Into<String>, child_port_name: impl Into<String>) -> Self {
        Self {
            child_node_id: child_node_id.into(),
            child_port_name: child_port_name.into(),
        }
    }
}
