use crate::connection::Connection;
use crate::error::ResolveError;
use crate::port::{ExposedPort, PassThruPort, Port, PortDirection, PortMapping};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type NodeId = String;

/// Node position in the visual editor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Paused,
    Error,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "IDLE",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Paused => "PAUSED",
            ExecutionState::Error => "ERROR",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(ExecutionState::Idle),
            "RUNNING" => Ok(ExecutionState::Running),
            "PAUSED" => Ok(ExecutionState::Paused),
            "ERROR" => Ok(ExecutionState::Error),
            other => Err(format!("unknown execution state '{}'", other)),
        }
    }
}

/// Runtime control knobs, owned by the external control layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub pause_buffer_size: u32,
    pub speed_attenuation: u32,
    pub independent_control: bool,
    pub auto_resume_on_error: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            pause_buffer_size: 100,
            speed_attenuation: 0,
            independent_control: false,
            auto_resume_on_error: false,
        }
    }
}

impl ControlConfig {
    pub fn is_default(&self) -> bool {
        *self == ControlConfig::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeNodeType {
    Generator,
    Sink,
    Transformer,
    Filter,
    Splitter,
    Merger,
    Validator,
    #[default]
    Custom,
}

impl CodeNodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeNodeType::Generator => "GENERATOR",
            CodeNodeType::Sink => "SINK",
            CodeNodeType::Transformer => "TRANSFORMER",
            CodeNodeType::Filter => "FILTER",
            CodeNodeType::Splitter => "SPLITTER",
            CodeNodeType::Merger => "MERGER",
            CodeNodeType::Validator => "VALIDATOR",
            CodeNodeType::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for CodeNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeNodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERATOR" => Ok(CodeNodeType::Generator),
            "SINK" => Ok(CodeNodeType::Sink),
            "TRANSFORMER" => Ok(CodeNodeType::Transformer),
            "FILTER" => Ok(CodeNodeType::Filter),
            "SPLITTER" => Ok(CodeNodeType::Splitter),
            "MERGER" => Ok(CodeNodeType::Merger),
            "VALIDATOR" => Ok(CodeNodeType::Validator),
            "CUSTOM" => Ok(CodeNodeType::Custom),
            other => Err(format!("unknown code node type '{}'", other)),
        }
    }
}

/// Fields shared by both node variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBase {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub execution_state: ExecutionState,
    #[serde(default)]
    pub control_config: ControlConfig,
    /// Opaque metadata, passed through verbatim in declaration order.
    #[serde(default)]
    pub configuration: IndexMap<String, String>,
}

impl NodeBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            position: Position::default(),
            description: None,
            execution_state: ExecutionState::default(),
            control_config: ControlConfig::default(),
            configuration: IndexMap::new(),
        }
    }
}

/// Leaf node carrying user logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub code_node_type: CodeNodeType,
    #[serde(default)]
    pub input_ports: Vec<Port>,
    #[serde(default)]
    pub output_ports: Vec<Port>,
}

impl CodeNode {
    pub fn new(name: impl Into<String>, code_node_type: CodeNodeType) -> Self {
        Self {
            base: NodeBase::new(name),
            code_node_type,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
        }
    }

    /// Replaces the generated id, carrying derived port ids along.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.base.id = id.into();
        for port in self.input_ports.iter_mut().chain(self.output_ports.iter_mut()) {
            port.rehome(&self.base.id);
        }
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.base.position = Position { x, y };
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.base.description = Some(description.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base.configuration.insert(key.into(), value.into());
        self
    }

    pub fn with_control_config(mut self, control_config: ControlConfig) -> Self {
        self.base.control_config = control_config;
        self
    }

    pub fn with_execution_state(mut self, state: ExecutionState) -> Self {
        self.base.execution_state = state;
        self
    }

    pub fn with_input(self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let port = Port::input(self.base.id.clone(), name, data_type);
        self.with_port(port)
    }

    pub fn with_output(self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let port = Port::output(self.base.id.clone(), name, data_type);
        self.with_port(port)
    }

    /// Appends a port to the list matching its direction.
    pub fn with_port(mut self, mut port: Port) -> Self {
        port.owning_node_id = self.base.id.clone();
        match port.direction {
            PortDirection::Input => self.input_ports.push(port),
            PortDirection::Output => self.output_ports.push(port),
        }
        self
    }
}

/// Subgraph container exposing boundary ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(flatten)]
    pub base: NodeBase,
    #[serde(default)]
    pub child_nodes: Vec<Node>,
    #[serde(default)]
    pub internal_connections: Vec<Connection>,
    #[serde(default)]
    pub input_ports: Vec<ExposedPort>,
    #[serde(default)]
    pub output_ports: Vec<ExposedPort>,
    /// Exposed port name -> direct child port.
    #[serde(default)]
    pub port_mappings: IndexMap<String, PortMapping>,
}

impl GraphNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: NodeBase::new(name),
            child_nodes: Vec::new(),
            internal_connections: Vec::new(),
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            port_mappings: IndexMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.base.id = id.into();
        for exposed in self.input_ports.iter_mut().chain(self.output_ports.iter_mut()) {
            exposed.port_mut().rehome(&self.base.id);
        }
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.base.position = Position { x, y };
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.base.description = Some(description.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base.configuration.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, node: impl Into<Node>) -> Self {
        self.child_nodes.push(node.into());
        self
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.internal_connections.push(connection);
        self
    }

    /// Exposes a direct child's input port under `name`, recording a port mapping.
    pub fn expose_input(
        self,
        name: impl Into<String>,
        data_type: impl Into<String>,
        child_node_id: impl Into<String>,
        child_port_name: impl Into<String>,
    ) -> Self {
        self.expose(
            PortDirection::Input,
            name.into(),
            data_type.into(),
            child_node_id,
            child_port_name,
        )
    }

    /// Exposes a direct child's output port under `name`, recording a port mapping.
    pub fn expose_output(
        self,
        name: impl Into<String>,
        data_type: impl Into<String>,
        child_node_id: impl Into<String>,
        child_port_name: impl Into<String>,
    ) -> Self {
        self.expose(
            PortDirection::Output,
            name.into(),
            data_type.into(),
            child_node_id,
            child_port_name,
        )
    }

    fn expose(
        mut self,
        direction: PortDirection,
        name: String,
        data_type: String,
        child_node_id: impl Into<String>,
        child_port_name: impl Into<String>,
    ) -> Self {
        self.port_mappings
            .insert(name.clone(), PortMapping::new(child_node_id, child_port_name));
        let port = Port::new(self.base.id.clone(), name, direction, data_type);
        self.with_exposed_port(port)
    }

    pub fn with_exposed_port(mut self, exposed: impl Into<ExposedPort>) -> Self {
        let mut exposed = exposed.into();
        exposed.port_mut().owning_node_id = self.base.id.clone();
        match exposed.port().direction {
            PortDirection::Input => self.input_ports.push(exposed),
            PortDirection::Output => self.output_ports.push(exposed),
        }
        self
    }

    pub fn with_port_mapping(
        mut self,
        exposed_port_name: impl Into<String>,
        mapping: PortMapping,
    ) -> Self {
        self.port_mappings.insert(exposed_port_name.into(), mapping);
        self
    }

    pub fn exposed_ports(&self, direction: PortDirection) -> &[ExposedPort] {
        match direction {
            PortDirection::Input => &self.input_ports,
            PortDirection::Output => &self.output_ports,
        }
    }

    pub fn exposed_ports_mut(&mut self, direction: PortDirection) -> &mut Vec<ExposedPort> {
        match direction {
            PortDirection::Input => &mut self.input_ports,
            PortDirection::Output => &mut self.output_ports,
        }
    }

    pub fn find_exposed(&self, port_id: &str) -> Option<&ExposedPort> {
        self.input_ports
            .iter()
            .chain(self.output_ports.iter())
            .find(|exposed| exposed.id() == port_id)
    }

    pub fn find_exposed_by_name(
        &self,
        direction: PortDirection,
        name: &str,
    ) -> Option<&ExposedPort> {
        self.exposed_ports(direction)
            .iter()
            .find(|exposed| exposed.name() == name)
    }

    /// Direct child lookup; deeper descendants are never returned.
    pub fn child(&self, node_id: &str) -> Option<&Node> {
        self.child_nodes.iter().find(|child| child.id() == node_id)
    }

    /// Follows an exposed port to the direct child port it routes to.
    ///
    /// An explicit pass-thru port wins; otherwise the port mapping registered
    /// under the exposed port's name is used.
    pub fn route<'a>(
        &'a self,
        exposed: &ExposedPort,
    ) -> Result<(&'a Node, &'a Port), ResolveError> {
        let direction = exposed.port().direction;
        let (child_id, child_port) = match exposed {
            ExposedPort::PassThru(pass_thru) => {
                let (node_id, port_id) = pass_thru.internal_endpoint();
                let child = self.child(node_id).ok_or_else(|| {
                    ResolveError::broken_mapping(
                        &self.base.id,
                        exposed.name(),
                        format!("pass-thru endpoint '{}' is not a direct child", node_id),
                    )
                })?;
                let port = child.find_port(port_id).ok_or_else(|| {
                    ResolveError::broken_mapping(
                        &self.base.id,
                        exposed.name(),
                        format!("port '{}' not found on child '{}'", port_id, node_id),
                    )
                })?;
                (child, port)
            }
            ExposedPort::Plain(port) => {
                let mapping = self.port_mappings.get(&port.name).ok_or_else(|| {
                    ResolveError::broken_mapping(
                        &self.base.id,
                        &port.name,
                        "no port mapping registered",
                    )
                })?;
                let child = self.child(&mapping.child_node_id).ok_or_else(|| {
                    ResolveError::broken_mapping(
                        &self.base.id,
                        &port.name,
                        format!("child node '{}' is not a direct child", mapping.child_node_id),
                    )
                })?;
                let child_port = child
                    .find_port_by_name(direction, &mapping.child_port_name)
                    .ok_or_else(|| {
                        ResolveError::broken_mapping(
                            &self.base.id,
                            &port.name,
                            format!(
                                "child '{}' has no {} port named '{}'",
                                mapping.child_node_id, direction, mapping.child_port_name
                            ),
                        )
                    })?;
                (child, child_port)
            }
        };

        if child_port.direction != direction {
            return Err(ResolveError::broken_mapping(
                &self.base.id,
                exposed.name(),
                format!(
                    "child port '{}' is an {} port but the boundary port is an {} port",
                    child_port.id, child_port.direction, direction
                ),
            ));
        }
        Ok((child_id, child_port))
    }

    /// Finds the exposed port of `direction` that routes to the given child port.
    /// Ports with broken routing are skipped.
    pub fn exposed_for_child(
        &self,
        direction: PortDirection,
        child_node_id: &str,
        child_port_id: &str,
    ) -> Option<&ExposedPort> {
        self.exposed_ports(direction).iter().find(|exposed| {
            matches!(
                self.route(exposed),
                Ok((child, port)) if child.id() == child_node_id && port.id == child_port_id
            )
        })
    }

    pub fn replace_exposed(&mut self, pass_thru: PassThruPort) -> bool {
        let direction = pass_thru.port.direction;
        let slot = self
            .exposed_ports_mut(direction)
            .iter_mut()
            .find(|exposed| exposed.id() == pass_thru.port.id);
        match slot {
            Some(slot) => {
                *slot = ExposedPort::PassThru(pass_thru);
                true
            }
            None => false,
        }
    }
}

/// Where a port sits in its owner's ordered port list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSlot {
    pub direction: PortDirection,
    pub index: usize,
    /// Number of ports in the same direction on the same node.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Code(CodeNode),
    Graph(GraphNode),
}

impl Node {
    pub fn base(&self) -> &NodeBase {
        match self {
            Node::Code(node) => &node.base,
            Node::Graph(node) => &node.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            Node::Code(node) => &mut node.base,
            Node::Graph(node) => &mut node.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Code(_) => "code node",
            Node::Graph(_) => "graph node",
        }
    }

    pub fn as_graph(&self) -> Option<&GraphNode> {
        match self {
            Node::Graph(graph) => Some(graph),
            Node::Code(_) => None,
        }
    }

    pub fn as_graph_mut(&mut self) -> Option<&mut GraphNode> {
        match self {
            Node::Graph(graph) => Some(graph),
            Node::Code(_) => None,
        }
    }

    pub fn as_code(&self) -> Option<&CodeNode> {
        match self {
            Node::Code(code) => Some(code),
            Node::Graph(_) => None,
        }
    }

    /// Ports of one direction, in declaration order.
    pub fn ports(&self, direction: PortDirection) -> Vec<&Port> {
        match (self, direction) {
            (Node::Code(node), PortDirection::Input) => node.input_ports.iter().collect(),
            (Node::Code(node), PortDirection::Output) => node.output_ports.iter().collect(),
            (Node::Graph(node), direction) => node
                .exposed_ports(direction)
                .iter()
                .map(ExposedPort::port)
                .collect(),
        }
    }

    pub fn all_ports(&self) -> Vec<&Port> {
        let mut ports = self.ports(PortDirection::Input);
        ports.extend(self.ports(PortDirection::Output));
        ports
    }

    pub fn find_port(&self, port_id: &str) -> Option<&Port> {
        self.all_ports().into_iter().find(|port| port.id == port_id)
    }

    pub fn find_port_by_name(&self, direction: PortDirection, name: &str) -> Option<&Port> {
        self.ports(direction).into_iter().find(|port| port.name == name)
    }

    pub fn port_slot(&self, port_id: &str) -> Option<PortSlot> {
        [PortDirection::Input, PortDirection::Output]
            .into_iter()
            .find_map(|direction| {
                let ports = self.ports(direction);
                ports
                    .iter()
                    .position(|port| port.id == port_id)
                    .map(|index| PortSlot {
                        direction,
                        index,
                        count: ports.len(),
                    })
            })
    }

    /// Direct children; empty for code nodes.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Graph(graph) => &graph.child_nodes,
            Node::Code(_) => &[],
        }
    }
}

impl From<CodeNode> for Node {
    fn from(node: CodeNode) -> Self {
        Node::Code(node)
    }
}

impl From<GraphNode> for Node {
    fn from(node: GraphNode) -> Self {
        Node::Graph(node)
    }
}
