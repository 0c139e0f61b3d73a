// crates/flowcodec/tests/common/mod.rs

#![allow(dead_code)]

use flowcore::{
    CodeNode, CodeNodeType, Connection, ControlConfig, ExecutionState, FlowGraph, GraphNode,
    Node, PassThruPort, Port, PortDirection,
};
use std::collections::BTreeSet;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Port names per node id, for round-trip comparisons.
pub fn port_names(graph: &FlowGraph) -> Vec<(String, BTreeSet<String>)> {
    graph
        .nodes()
        .into_iter()
        .map(|node| {
            let names = node.all_ports().into_iter().map(|p| p.name.clone()).collect();
            (node.id().to_string(), names)
        })
        .collect()
}

/// A graph touching every persisted field, nested six levels deep.
pub fn kitchen_sink() -> FlowGraph {
    let leaf = CodeNode::new("Leaf Processor", CodeNodeType::Transformer)
        .with_id("leaf")
        .with_position(410.5, -12.25)
        .with_description("innermost \"worker\"\nsecond line")
        .with_config("_genericType", "Reading<Int>")
        .with_config("processingLogicFile", "logic/leaf.kt")
        .with_config("com.example:tuning", "a=b; c=\\d")
        .with_execution_state(ExecutionState::Paused)
        .with_control_config(ControlConfig {
            pause_buffer_size: 7,
            speed_attenuation: 250,
            independent_control: true,
            auto_resume_on_error: true,
        })
        .with_port(Port::input("leaf", "in", "Int").with_required(true))
        .with_output("out", "Int")
        .with_output("errors", "String");

    let mut node: Node = leaf.into();
    let mut child = "leaf".to_string();
    for level in (1..=5).rev() {
        let id = format!("level{}", level);
        node = GraphNode::new(format!("Level {}", level))
            .with_id(id.clone())
            .with_position(level as f64 * 10.0, 0.0)
            .with_config("_useCaseClass", format!("UseCase{}", level))
            .with_child(node)
            .expose_input("in", "Int", child.clone(), "in")
            .expose_output("out", "Int", child.clone(), "out")
            .into();
        child = id;
    }

    let monitor = CodeNode::new("Monitor", CodeNodeType::Sink)
        .with_id("monitor")
        .with_input("in", "Int");
    let tap = CodeNode::new("Tap", CodeNodeType::Sink)
        .with_id("tap")
        .with_port(Port::input("tap", "in", "String").with_id("tap-in"));
    let source = CodeNode::new("Source", CodeNodeType::Generator)
        .with_id("source")
        .with_output("out", "Int");

    let pass_thru = PassThruPort {
        port: Port::new("wrapper", "in", PortDirection::Input, "Int"),
        upstream_node_id: "source".to_string(),
        upstream_port_id: "source.out.out".to_string(),
        downstream_node_id: "monitor".to_string(),
        downstream_port_id: "monitor.in.in".to_string(),
    };
    let wrapper = GraphNode::new("Wrapper")
        .with_id("wrapper")
        .with_child(monitor)
        .with_exposed_port(pass_thru)
        .with_port_mapping("in", flowcore::PortMapping::new("monitor", "in"));

    FlowGraph::new("Kitchen Sink")
        .with_id("kitchen-sink")
        .with_version("2.3.1")
        .with_description("Every field at once")
        .with_metadata("author", "flow team")
        .with_metadata("x-namespaced:key", "value with \"quotes\"")
        .with_target("jvm")
        .with_target("wasm")
        .with_node(source)
        .with_node(node)
        .with_node(tap)
        .with_node(wrapper)
        .with_connection(
            Connection::new("source", "source.out.out", "level1", "level1.in.in")
                .with_id("feed")
                .with_capacity(5)
                .with_ip_type("com.example.Reading"),
        )
        .with_connection(
            Connection::new("level1", "level1.out.out", "tap", "tap-in")
                .with_id("drain")
                .with_capacity(-1),
        )
        .with_connection(
            Connection::new("source", "source.out.out", "wrapper", "wrapper.in.in")
                .with_id("monitoring"),
        )
}

/// Scenario B in the legacy unversioned dialect.
pub const LEGACY_SCENARIO_B: &str = r#"
// Written before pass-thru ports existed.
graph "Legacy" {
    node "Source" {
        type GENERATOR
        output "out" : "Int"
    }
    group "OuterGroup" {
        input "in" : "Int"
        portMapping "in" -> "InnerGroup" "in"
        group "InnerGroup" {
            input "in" : "Int"
            portMapping "in" -> "LeafProcessor" "in"
            node "LeafProcessor" {
                input "in" : "Int"
            }
        }
    }
    connection "Source" "out" -> "OuterGroup" "in"
}
"#;
