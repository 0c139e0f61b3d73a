// crates/flowcore/tests/passthru.rs

mod common;

use common::*;
use flowcore::{
    synthesize_pass_thru, Connection, DiagnosticCode, ExposedPort, FlowGraph, GraphNode,
    Node, PassThruPort, PassThruSynthesizer, Port, PortDirection, ResolveError, ScopeResolver,
};
use pretty_assertions::assert_eq;

fn exposed<'a>(graph: &'a FlowGraph, node_id: &str, port_id: &str) -> &'a ExposedPort {
    graph
        .find_node(node_id)
        .and_then(Node::as_graph)
        .and_then(|g| g.find_exposed(port_id))
        .expect("exposed port should exist")
}

#[test]
fn test_synthesize_input_pass_thru() {
    let graph = scenario_b();

    let pass_thru =
        synthesize_pass_thru(&graph, "outer", "in", Some(&graph.connections[0])).unwrap();

    assert_eq!(pass_thru.port.id, "outer.in.in");
    assert_eq!(pass_thru.upstream_node_id, "source");
    assert_eq!(pass_thru.upstream_port_id, "source.out.out");
    assert_eq!(pass_thru.downstream_node_id, "inner");
    assert_eq!(pass_thru.downstream_port_id, "inner.in.in");
}

#[test]
fn test_synthesize_output_pass_thru() {
    let graph = FlowGraph::new("Out")
        .with_node(nested_generator(1))
        .with_node(sink("drain"))
        .with_connection(Connection::new("p1", "p1.out.out", "drain", "drain.in.in").with_id("up"));

    let pass_thru = synthesize_pass_thru(&graph, "p1", "out", None).unwrap();

    assert_eq!(pass_thru.upstream_node_id, "producer");
    assert_eq!(pass_thru.upstream_port_id, "producer.out.out");
    assert_eq!(pass_thru.downstream_node_id, "drain");
    assert_eq!(pass_thru.downstream_port_id, "drain.in.in");
}

#[test]
fn test_inner_boundary_sees_outer_boundary_as_upstream() {
    let graph = scenario_b();

    let pass_thru = synthesize_pass_thru(&graph, "inner", "in", None).unwrap();

    assert_eq!(pass_thru.upstream_node_id, "outer");
    assert_eq!(pass_thru.upstream_port_id, "outer.in.in");
    assert_eq!(pass_thru.downstream_node_id, "leaf");
}

#[test]
fn test_synthesis_is_idempotent() {
    let graph = scenario_b();
    let synthesizer = PassThruSynthesizer::new(&graph);

    let first = synthesizer.synthesize("outer", "in", Some(&graph.connections[0])).unwrap();
    let second = synthesizer.synthesize("outer", "in", Some(&graph.connections[0])).unwrap();
    assert_eq!(first, second);

    // Synthesizing again on the upgraded graph gives the same port back.
    let (upgraded, _) = synthesizer.upgrade();
    let third = synthesize_pass_thru(&upgraded, "outer", "in", None).unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_no_external_connection() {
    let graph = FlowGraph::new("Lonely").with_node(nested_sink(1));

    let err = synthesize_pass_thru(&graph, "g1", "in", None).unwrap_err();

    assert_eq!(
        err,
        ResolveError::NoExternalConnection {
            graph_node_id: "g1".to_string(),
            port_name: "in".to_string(),
        }
    );
}

#[test]
fn test_fan_in_through_one_port_is_ambiguous() {
    let graph = scenario_b()
        .with_node(generator("second"))
        .with_connection(
            Connection::new("second", "second.out.out", "outer", "outer.in.in").with_id("c2"),
        );

    let err = synthesize_pass_thru(&graph, "outer", "in", None).unwrap_err();

    match err {
        ResolveError::AmbiguousPassThru { connection_ids, .. } => {
            assert_eq!(connection_ids, vec!["c1".to_string(), "c2".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // An explicit connection still disambiguates.
    let pass_thru =
        synthesize_pass_thru(&graph, "outer", "in", Some(&graph.connections[1])).unwrap();
    assert_eq!(pass_thru.upstream_node_id, "second");
}

#[test]
fn test_broken_mapping_is_not_synthesized() {
    let graph = FlowGraph::new("Broken")
        .with_node(generator("source"))
        .with_node(
            GraphNode::new("g")
                .with_id("g")
                .with_child(sink("leaf"))
                .expose_input("in", "Int", "leaf", "nope"),
        )
        .with_connection(Connection::new("source", "source.out.out", "g", "g.in.in"));

    let err = synthesize_pass_thru(&graph, "g", "in", None).unwrap_err();

    assert!(matches!(err, ResolveError::BrokenPortMapping { .. }));
}

#[test]
fn test_upgrade_replaces_plain_ports() {
    init_tracing();
    let graph = scenario_b();

    let (upgraded, diagnostics) = PassThruSynthesizer::new(&graph).upgrade();

    assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
    assert!(exposed(&upgraded, "outer", "outer.in.in").as_pass_thru().is_some());
    assert!(exposed(&upgraded, "inner", "inner.in.in").as_pass_thru().is_some());
    // The input graph is untouched.
    assert!(exposed(&graph, "outer", "outer.in.in").as_pass_thru().is_none());

    // Routing, and therefore every segment, is unchanged.
    let before = ScopeResolver::new(&graph).resolve_all();
    let after = ScopeResolver::new(&upgraded).resolve_all();
    assert_eq!(before, after);
}

#[test]
fn test_upgrade_reports_unconnected_ports() {
    let graph = FlowGraph::new("Lonely").with_node(nested_sink(1));

    let (upgraded, diagnostics) = PassThruSynthesizer::new(&graph).upgrade();

    assert_eq!(upgraded, graph);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, DiagnosticCode::NoExternalConnection);
    assert_eq!(diagnostics[0].code.as_str(), "NO_EXTERNAL_CONNECTION");
    assert_eq!(diagnostics[0].subject_id, "g1.in");
}

#[test]
fn test_pass_thru_routing_wins_over_mapping() {
    // The mapping points at "a" but the pass-thru port routes to "b".
    let port = Port::new("g", "in", PortDirection::Input, "Int");
    let pass_thru = PassThruPort {
        port,
        upstream_node_id: "source".to_string(),
        upstream_port_id: "source.out.out".to_string(),
        downstream_node_id: "b".to_string(),
        downstream_port_id: "b.in.in".to_string(),
    };
    let group = GraphNode::new("g")
        .with_id("g")
        .with_child(sink("a"))
        .with_child(sink("b"))
        .with_exposed_port(pass_thru)
        .with_port_mapping("in", flowcore::PortMapping::new("a", "in"));
    let graph = FlowGraph::new("Prefer")
        .with_node(generator("source"))
        .with_node(group)
        .with_connection(Connection::new("source", "source.out.out", "g", "g.in.in").with_id("c"));

    let segments = ScopeResolver::new(&graph)
        .resolve(&graph.connections[0])
        .unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].target_node_id, "b");
}
