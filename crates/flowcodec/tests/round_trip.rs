// crates/flowcodec/tests/round_trip.rs

mod common;

use common::*;
use flowcodec::{deserialize, serialize, serialize_with, WriterOptions};
use flowcore::{
    CodeNode, CodeNodeType, Connection, ControlConfig, FlowGraph, GraphNode, Node, ScopeResolver,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_kitchen_sink_round_trips_exactly() {
    init_tracing();
    let graph = kitchen_sink();

    let text = serialize(&graph);
    let parsed = deserialize(&text).unwrap();

    assert_eq!(parsed, graph);
    assert_eq!(parsed.stats().max_depth, 6);
}

#[test]
fn test_round_trip_is_stable_text() {
    let text = serialize(&kitchen_sink());
    let again = serialize(&deserialize(&text).unwrap());

    assert_eq!(again, text);
}

#[test]
fn test_compact_output_still_round_trips() {
    let graph = kitchen_sink();
    let options = WriterOptions {
        indent: 2,
        emit_defaults: false,
    };

    let text = serialize_with(&graph, &options);

    assert!(!text.contains("state IDLE"));
    assert!(!text.contains("type CUSTOM"));
    assert_eq!(deserialize(&text).unwrap(), graph);
}

#[test]
fn test_writer_layout() {
    let graph = FlowGraph::new("Tiny")
        .with_id("Tiny")
        .with_node(
            CodeNode::new("Source", CodeNodeType::Generator)
                .with_id("Source")
                .with_output("out", "Int"),
        )
        .with_node(
            CodeNode::new("Sink", CodeNodeType::Sink)
                .with_id("Sink")
                .with_input("in", "Int"),
        )
        .with_connection(
            Connection::new("Source", "Source.out.out", "Sink", "Sink.in.in")
                .with_id(Connection::derived_id("Source", "Source.out.out", "Sink", "Sink.in.in"))
                .with_capacity(5),
        );
    let options = WriterOptions {
        indent: 2,
        emit_defaults: false,
    };

    let expected = r#"format 2
flowGraph "Tiny" version "1.0.0" {
  codeNode "Source" {
    type GENERATOR
    output "out" : "Int"
  }
  codeNode "Sink" {
    type SINK
    input "in" : "Int"
  }
  connect "Source" "Source.out.out" -> "Sink" "Sink.in.in" {
    capacity 5
  }
}
"#;
    assert_eq!(serialize_with(&graph, &options), expected);
}

#[test]
fn test_segments_survive_round_trip() {
    let graph = kitchen_sink();
    let parsed = deserialize(&serialize(&graph)).unwrap();

    let before = ScopeResolver::new(&graph).resolve_all();
    let after = ScopeResolver::new(&parsed).resolve_all();

    assert_eq!(before, after);
    assert_eq!(before.segments_for("feed").map(|s| s.len()), Some(6));
}

#[test]
fn test_control_limits_round_trip() {
    let graph = FlowGraph::new("Limits").with_node(
        CodeNode::new("Throttled", CodeNodeType::Filter).with_control_config(ControlConfig {
            pause_buffer_size: u32::MAX,
            speed_attenuation: u32::MAX,
            ..ControlConfig::default()
        }),
    );

    let text = serialize(&graph);

    assert!(text.contains("pauseBufferSize 4294967295"));
    assert_eq!(deserialize(&text).unwrap(), graph);
}

#[test]
fn test_dangling_port_reference_survives_round_trip() {
    // "out" and "in" are port names, not the ids those ports carry.
    let graph = FlowGraph::new("Dangling")
        .with_node(
            CodeNode::new("src", CodeNodeType::Generator)
                .with_id("src")
                .with_output("out", "Int"),
        )
        .with_node(
            CodeNode::new("dst", CodeNodeType::Sink)
                .with_id("dst")
                .with_input("in", "Int"),
        )
        .with_connection(Connection::new("src", "out", "dst", "in").with_id("loose"));

    let parsed = deserialize(&serialize(&graph)).unwrap();

    assert_eq!(parsed, graph);
    assert_eq!(parsed.connections[0].source_port_id, "out");
    let diagnostics = ScopeResolver::new(&parsed).resolve_all().diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].subject_id, "loose");
}

// ============================================================================
// Property: counts and port name sets survive for arbitrary shapes
// ============================================================================

fn text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.:/\"\\\\\n\t-]{0,16}"
}

/// Builds a chain of `depth` groups, each holding `width` code nodes wired in
/// sequence, with free-form names and configuration values.
fn shaped_graph(depth: usize, width: usize, names: &[String], values: &[String]) -> FlowGraph {
    let pick = |items: &[String], i: usize| {
        items.get(i % items.len().max(1)).cloned().unwrap_or_default()
    };

    let mut inner: Option<Node> = None;
    for level in (0..depth).rev() {
        let mut group = GraphNode::new(pick(names, level)).with_id(format!("g{}", level));
        for i in 0..width {
            let id = format!("g{}n{}", level, i);
            let node = CodeNode::new(pick(names, level + i), CodeNodeType::Transformer)
                .with_id(id.clone())
                .with_config(format!("key.{}", i), pick(values, level * width + i))
                .with_input("in", "Int")
                .with_output("out", "Int");
            group = group.with_child(node);
            if i > 0 {
                let prev = format!("g{}n{}", level, i - 1);
                group = group.with_connection(
                    Connection::new(
                        prev.clone(),
                        format!("{}.out.out", prev),
                        id.clone(),
                        format!("{}.in.in", id),
                    )
                        .with_id(format!("{}->{}", prev, id)),
                );
            }
        }
        if let Some(child) = inner.take() {
            group = group.with_child(child);
        }
        inner = Some(group.into());
    }

    let mut graph = FlowGraph::new(pick(names, 0)).with_id("shaped");
    if let Some(root) = inner {
        graph = graph.with_node(root);
    }
    graph
}

proptest! {
    #[test]
    fn prop_round_trip_preserves_shape(
        depth in 0usize..6,
        width in 1usize..4,
        names in prop::collection::vec(text_strategy(), 1..4),
        values in prop::collection::vec(text_strategy(), 1..6),
    ) {
        let graph = shaped_graph(depth, width, &names, &values);

        let parsed = deserialize(&serialize(&graph)).unwrap();

        prop_assert_eq!(parsed.node_count(), graph.node_count());
        prop_assert_eq!(parsed.connection_count(), graph.connection_count());
        prop_assert_eq!(port_names(&parsed), port_names(&graph));
        prop_assert_eq!(&parsed.name, &graph.name);
        prop_assert_eq!(&parsed.version, &graph.version);
        prop_assert_eq!(&parsed, &graph);
    }
}
