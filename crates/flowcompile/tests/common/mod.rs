// crates/flowcompile/tests/common/mod.rs

#![allow(dead_code)]

use flowcore::{CodeNode, CodeNodeType, Connection, FlowGraph, GraphNode};

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

/// A node with `outputs` output ports named "o1".."oN".
pub fn splitter(id: &str, outputs: usize) -> CodeNode {
    (1..=outputs).fold(
        CodeNode::new(id, CodeNodeType::Splitter)
            .with_id(id)
            .with_input("in", "Int"),
        |node, i| node.with_output(format!("o{}", i), "Int"),
    )
}

/// A node with `inputs` input ports named "i1".."iN".
pub fn merger(id: &str, inputs: usize) -> CodeNode {
    (1..=inputs).fold(
        CodeNode::new(id, CodeNodeType::Merger)
            .with_id(id)
            .with_output("out", "Int"),
        |node, i| node.with_input(format!("i{}", i), "Int"),
    )
}

pub fn link(
    id: &str,
    source: &str,
    source_port: &str,
    target: &str,
    target_port: &str,
) -> Connection {
    Connection::new(
        source,
        format!("{}.out.{}", source, source_port),
        target,
        format!("{}.in.{}", target, target_port),
    )
    .with_id(id)
}

/// Root "Source" with one output wired to root "Sink" with one input.
pub fn scenario_a() -> FlowGraph {
    FlowGraph::new("ScenarioA")
        .with_node(generator("Source"))
        .with_node(sink("Sink"))
        .with_connection(link("c1", "Source", "out", "Sink", "in"))
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
        .with_connection(link("c1", "source", "out", "outer", "in").with_capacity(5))
}

/// A group "pipeline" holding a -> b -> c, fed from the root and exposing
/// c's output to a root sink.
pub fn pipeline() -> FlowGraph {
    let group = GraphNode::new("Pipeline")
        .with_id("pipeline")
        .with_child(transformer("a"))
        .with_child(transformer("b"))
        .with_child(transformer("c"))
        .with_connection(link("a-b", "a", "out", "b", "in"))
        .with_connection(link("b-c", "b", "out", "c", "in"))
        .expose_input("in", "Int", "a", "in")
        .expose_output("out", "Int", "c", "out");

    FlowGraph::new("Pipeline")
        .with_node(generator("feed"))
        .with_node(group)
        .with_node(sink("drain"))
        .with_connection(link("feed-in", "feed", "out", "pipeline", "in"))
        .with_connection(link("out-drain", "pipeline", "out", "drain", "in"))
}
