use crate::FORMAT_VERSION;
use flowcore::{
    CodeNode, CodeNodeType, Connection, ControlConfig, ExecutionState, ExposedPort, FlowGraph,
    GraphNode, Node, NodeBase, Port, Position,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Layout knobs for the text writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// When false, `state`, `control`, `type` and `position` lines holding
    /// their default values are left out.
    pub emit_defaults: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            indent: 4,
            emit_defaults: true,
        }
    }
}

/// Renders a graph in the current format. Ids equal to the value the reader
/// would derive are omitted.
pub fn write(graph: &FlowGraph, options: &WriterOptions) -> String {
    let mut writer = Writer {
        out: String::new(),
        depth: 0,
        options,
    };
    writer.graph(graph);
    writer.out
}

struct Writer<'a> {
    out: String,
    depth: usize,
    options: &'a WriterOptions,
}

impl Writer<'_> {
    fn line(&mut self, text: &str) {
        let pad = self.depth * self.options.indent;
        let _ = writeln!(self.out, "{:pad$}{}", "", text, pad = pad);
    }

    fn open(&mut self, header: &str) {
        self.line(&format!("{} {{", header));
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    fn graph(&mut self, graph: &FlowGraph) {
        self.line(&format!("format {}", FORMAT_VERSION));
        self.open(&format!(
            "flowGraph {} version {}",
            quote(&graph.name),
            quote(&graph.version)
        ));
        if graph.id != graph.name {
            self.line(&format!("id {}", quote(&graph.id)));
        }
        if let Some(description) = &graph.description {
            self.line(&format!("description {}", quote(description)));
        }
        for (key, value) in &graph.metadata {
            self.line(&format!("metadata {} = {}", quote(key), quote(value)));
        }
        for platform in &graph.target_platforms {
            self.line(&format!("target {}", quote(platform)));
        }
        for node in &graph.root_nodes {
            self.node(node);
        }
        for connection in &graph.connections {
            self.connection(connection);
        }
        self.close();
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Code(code) => self.code_node(code),
            Node::Graph(graph) => self.graph_node(graph),
        }
    }

    fn code_node(&mut self, node: &CodeNode) {
        self.open(&format!("codeNode {}", quote(&node.base.name)));
        self.base(&node.base);
        if self.options.emit_defaults || node.code_node_type != CodeNodeType::default() {
            self.line(&format!("type {}", node.code_node_type));
        }
        for port in node.input_ports.iter().chain(node.output_ports.iter()) {
            self.port(port, &node.base.id);
        }
        self.close();
    }

    fn graph_node(&mut self, node: &GraphNode) {
        self.open(&format!("graphNode {}", quote(&node.base.name)));
        self.base(&node.base);
        for exposed in node.input_ports.iter().chain(node.output_ports.iter()) {
            match exposed {
                ExposedPort::Plain(port) => self.port(port, &node.base.id),
                ExposedPort::PassThru(pass_thru) => {
                    let port = &pass_thru.port;
                    self.open(&format!(
                        "passThru {} {} : {}",
                        port.direction,
                        quote(&port.name),
                        quote(&port.data_type)
                    ));
                    self.port_items(port, &node.base.id);
                    self.line(&format!(
                        "upstream {} {}",
                        quote(&pass_thru.upstream_node_id),
                        quote(&pass_thru.upstream_port_id)
                    ));
                    self.line(&format!(
                        "downstream {} {}",
                        quote(&pass_thru.downstream_node_id),
                        quote(&pass_thru.downstream_port_id)
                    ));
                    self.close();
                }
            }
        }
        for (name, mapping) in &node.port_mappings {
            self.line(&format!(
                "map {} -> {} {}",
                quote(name),
                quote(&mapping.child_node_id),
                quote(&mapping.child_port_name)
            ));
        }
        for child in &node.child_nodes {
            self.node(child);
        }
        for connection in &node.internal_connections {
            self.connection(connection);
        }
        self.close();
    }

    fn base(&mut self, base: &NodeBase) {
        if base.id != base.name {
            self.line(&format!("id {}", quote(&base.id)));
        }
        if self.options.emit_defaults || base.position != Position::default() {
            self.line(&format!(
                "position {} {}",
                number(base.position.x),
                number(base.position.y)
            ));
        }
        if let Some(description) = &base.description {
            self.line(&format!("description {}", quote(description)));
        }
        if self.options.emit_defaults || base.execution_state != ExecutionState::default() {
            self.line(&format!("state {}", base.execution_state));
        }
        if self.options.emit_defaults || !base.control_config.is_default() {
            self.control(&base.control_config);
        }
        for (key, value) in &base.configuration {
            self.line(&format!("config {} = {}", quote(key), quote(value)));
        }
    }

    fn control(&mut self, control: &ControlConfig) {
        self.open("control");
        self.line(&format!("pauseBufferSize {}", control.pause_buffer_size));
        self.line(&format!("speedAttenuation {}", control.speed_attenuation));
        self.line(&format!("independentControl {}", control.independent_control));
        self.line(&format!("autoResumeOnError {}", control.auto_resume_on_error));
        self.close();
    }

    fn port(&mut self, port: &Port, owner: &str) {
        let header = format!(
            "{} {} : {}",
            port.direction,
            quote(&port.name),
            quote(&port.data_type)
        );
        let explicit_id = port.id != Port::derived_id(owner, port.direction, &port.name);
        if explicit_id || port.required {
            self.open(&header);
            self.port_items(port, owner);
            self.close();
        } else {
            self.line(&header);
        }
    }

    fn port_items(&mut self, port: &Port, owner: &str) {
        if port.id != Port::derived_id(owner, port.direction, &port.name) {
            self.line(&format!("id {}", quote(&port.id)));
        }
        if port.required {
            self.line("required true");
        }
    }

    fn connection(&mut self, connection: &Connection) {
        let header = format!(
            "connect {} {} -> {} {}",
            quote(&connection.source_node_id),
            quote(&connection.source_port_id),
            quote(&connection.target_node_id),
            quote(&connection.target_port_id)
        );
        let derived = Connection::derived_id(
            &connection.source_node_id,
            &connection.source_port_id,
            &connection.target_node_id,
            &connection.target_port_id,
        );

        let mut items = Vec::new();
        if connection.id != derived {
            items.push(format!("id {}", quote(&connection.id)));
        }
        if connection.channel_capacity != flowcore::RENDEZVOUS {
            items.push(format!("capacity {}", connection.channel_capacity));
        }
        if let Some(ip_type) = &connection.ip_type_id {
            items.push(format!("ipType {}", quote(ip_type)));
        }

        if items.is_empty() {
            self.line(&header);
        } else {
            self.open(&header);
            for item in &items {
                self.line(item);
            }
            self.close();
        }
    }
}

pub(crate) fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

/// Coordinates always carry a fractional part so they read back as floats.
fn number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else if value.is_finite() {
        format!("{}", value)
    } else {
        "0.0".to_string()
    }
}
