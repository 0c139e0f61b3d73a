// crates/flowcore/tests/common/mod.rs

#![allow(dead_code)]

use flowcore::{CodeNode, CodeNodeType, Connection, FlowGraph, GraphNode, Node};

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

pub fn generator(id: &str) -> CodeNode {
    CodeNode::new(id, CodeNodeType::Generator)
        .with_id(id)
        .with_output("out", "Int")
}

pub fn sink(id: &str) -> CodeNode {
    CodeNode::new(id, CodeNodeType::Sink)
        .with_id(id)
        .with_input("in", "Int")
}

pub fn transformer(id: &str) -> CodeNode {
    CodeNode::new(id, CodeNodeType::Transformer)
        .with_id(id)
        .with_input("in", "Int")
        .with_output("out", "Int")
}

/// Root "source" feeding OuterGroup > InnerGroup > "leaf" through exposed
/// input ports, connected to OuterGroup's boundary as connection "c1".
pub fn scenario_b() -> FlowGraph {
    let inner = GraphNode::new("InnerGroup")
        .with_id("inner")
        .with_child(sink("leaf"))
        .expose_input("in", "Int", "leaf", "in");
    let outer = GraphNode::new("OuterGroup")
        .with_id("outer")
        .with_child(inner)
        .expose_input("in", "Int", "inner", "in");

    FlowGraph::new("ScenarioB")
        .with_id("scenario-b")
        .with_node(generator("source"))
        .with_node(outer)
        .with_connection(
            Connection::new("source", "source.out.out", "outer", "outer.in.in").with_id("c1"),
        )
}

/// Ids of the groups in a chain built by [`nested_sink`], outermost first.
pub fn group_ids(depth: usize) -> Vec<String> {
    (1..=depth).map(|level| format!("g{}", level)).collect()
}

/// `depth` nested groups around a sink "leaf", each exposing "in".
pub fn nested_sink(depth: usize) -> Node {
    let mut node: Node = sink("leaf").into();
    let mut child_id = "leaf".to_string();
    for id in group_ids(depth).into_iter().rev() {
        node = GraphNode::new(id.clone())
            .with_id(id.clone())
            .with_child(node)
            .expose_input("in", "Int", child_id.clone(), "in")
            .into();
        child_id = id;
    }
    node
}

/// `depth` nested groups around a generator "producer", each exposing "out".
pub fn nested_generator(depth: usize) -> Node {
    let mut node: Node = generator("producer").into();
    let mut child_id = "producer".to_string();
    for level in (1..=depth).rev() {
        let id = format!("p{}", level);
        node = GraphNode::new(id.clone())
            .with_id(id.clone())
            .with_child(node)
            .expose_output("out", "Int", child_id.clone(), "out")
            .into();
        child_id = id;
    }
    node
}

/// Root generator wired straight to a sink buried `depth` groups deep.
pub fn deep_graph(depth: usize) -> FlowGraph {
    FlowGraph::new("Deep")
        .with_id("deep")
        .with_node(generator("source"))
        .with_node(nested_sink(depth))
        .with_connection(
            Connection::new("source", "source.out.out", "leaf", "leaf.in.in").with_id("deep-link"),
        )
}
