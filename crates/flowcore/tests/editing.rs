// crates/flowcore/tests/editing.rs

mod common;

use common::*;
use flowcore::{Connection, FlowGraph, GraphError, GraphNode, Node, Position};
use pretty_assertions::assert_eq;

#[test]
fn test_add_node_returns_new_value() {
    let original = FlowGraph::new("Edit");

    let edited = original.add_node(generator("a"), None).unwrap();

    assert_eq!(original.node_count(), 0, "original must be left untouched");
    assert_eq!(edited.node_count(), 1);
    assert_eq!(edited.root_nodes[0].id(), "a");
}

#[test]
fn test_add_node_into_graph_node() {
    let graph = FlowGraph::new("Edit").with_node(GraphNode::new("g").with_id("g"));

    let edited = graph.add_node(sink("inside"), Some("g")).unwrap();

    let group = edited.find_node("g").and_then(Node::as_graph).unwrap();
    assert_eq!(group.child_nodes.len(), 1);
    assert_eq!(group.child_nodes[0].id(), "inside");
}

#[test]
fn test_add_node_rejects_duplicate_id_at_any_depth() {
    let graph = scenario_b();

    let err = graph.add_node(sink("leaf"), None).unwrap_err();

    assert_eq!(
        err,
        GraphError::DuplicateId {
            kind: "node",
            id: "leaf".to_string()
        }
    );
}

#[test]
fn test_add_node_under_code_node_fails() {
    let graph = FlowGraph::new("Edit").with_node(generator("a"));

    let err = graph.add_node(sink("b"), Some("a")).unwrap_err();

    assert_eq!(err, GraphError::NotAGraphNode("a".to_string()));
}

#[test]
fn test_add_connection_is_stored_in_common_scope() {
    let group = GraphNode::new("g")
        .with_id("g")
        .with_child(generator("x"))
        .with_child(sink("y"));
    let graph = FlowGraph::new("Edit").with_node(group);

    let edited = graph
        .add_connection(Connection::new("x", "x.out.out", "y", "y.in.in").with_id("xy"))
        .unwrap();

    assert!(edited.connections.is_empty());
    let scoped = edited.find_connection("xy").unwrap();
    assert_eq!(scoped.scope, Some("g"));
}

#[test]
fn test_add_connection_across_boundaries_stays_at_root() {
    let graph = scenario_b().with_node(generator("extra"));

    let edited = graph
        .add_connection(
            Connection::new("extra", "extra.out.out", "leaf", "leaf.in.in").with_id("deep"),
        )
        .unwrap();

    assert_eq!(edited.find_connection("deep").unwrap().scope, None);
    assert_eq!(edited.connection_count(), 2);
}

#[test]
fn test_add_connection_rejects_wrong_direction() {
    let graph = FlowGraph::new("Edit").with_node(generator("a")).with_node(sink("b"));

    let err = graph
        .add_connection(Connection::new("b", "b.in.in", "a", "a.out.out").with_id("rev"))
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::InvalidConnection { ref connection_id, .. } if connection_id == "rev"
    ));
}

#[test]
fn test_add_connection_rejects_bad_capacity() {
    let graph = FlowGraph::new("Edit").with_node(generator("a")).with_node(sink("b"));

    let err = graph
        .add_connection(
            Connection::new("a", "a.out.out", "b", "b.in.in").with_id("c").with_capacity(-2),
        )
        .unwrap_err();

    assert_eq!(
        err,
        GraphError::InvalidCapacity {
            connection_id: "c".to_string(),
            capacity: -2
        }
    );

    for capacity in [-1, 0, 5] {
        let connection = Connection::new("a", "a.out.out", "b", "b.in.in").with_capacity(capacity);
        assert!(
            graph.add_connection(connection).is_ok(),
            "capacity {} should be accepted",
            capacity
        );
    }
}

#[test]
fn test_add_connection_rejects_unreachable_endpoint() {
    let graph = FlowGraph::new("Edit")
        .with_node(generator("source"))
        .with_node(GraphNode::new("g").with_id("g").with_child(sink("hidden")));

    let err = graph
        .add_connection(Connection::new("source", "source.out.out", "hidden", "hidden.in.in"))
        .unwrap_err();

    assert!(matches!(err, GraphError::InvalidConnection { .. }));
}

#[test]
fn test_add_connection_rejects_missing_port() {
    let graph = FlowGraph::new("Edit").with_node(generator("a")).with_node(sink("b"));

    let err = graph
        .add_connection(Connection::new("a", "a.out.nope", "b", "b.in.in"))
        .unwrap_err();

    assert_eq!(
        err,
        GraphError::PortNotFound {
            node_id: "a".to_string(),
            port_id: "a.out.nope".to_string()
        }
    );
}

#[test]
fn test_remove_node_cascades() {
    let graph = scenario_b();

    let edited = graph.remove_node("inner").unwrap();

    // The crossing connection still targets "outer", which survives.
    assert_eq!(edited.node_count(), 2);
    let outer = edited.find_node("outer").and_then(Node::as_graph).unwrap();
    assert!(outer.child_nodes.is_empty());
    assert!(outer.port_mappings.is_empty(), "mapping to the removed child is dropped");
    assert_eq!(edited.connection_count(), 1);

    let edited = edited.remove_node("outer").unwrap();
    assert_eq!(edited.node_count(), 1);
    assert_eq!(edited.connection_count(), 0);
}

#[test]
fn test_remove_connection() {
    let graph = scenario_b();

    let edited = graph.remove_connection("c1").unwrap();

    assert_eq!(edited.connection_count(), 0);
    assert_eq!(
        graph.remove_connection("c1").and_then(|g| g.remove_connection("c1")),
        Err(GraphError::ConnectionNotFound("c1".to_string()))
    );
}

#[test]
fn test_update_node_position() {
    let graph = scenario_b();

    let edited = graph.update_node_position("leaf", Position::new(12.5, -3.0)).unwrap();

    assert_eq!(edited.find_node("leaf").unwrap().base().position, Position::new(12.5, -3.0));
    assert_eq!(graph.find_node("leaf").unwrap().base().position, Position::default());
    assert_eq!(
        graph.update_node_position("ghost", Position::default()),
        Err(GraphError::NodeNotFound("ghost".to_string()))
    );
}

#[test]
fn test_undo_by_value_retention() {
    let history = vec![FlowGraph::new("Undo").with_id("u")];
    let step = history[0].add_node(generator("a"), None).unwrap();
    let step = step.add_node(sink("b"), None).unwrap();
    let step = step
        .add_connection(Connection::new("a", "a.out.out", "b", "b.in.in").with_id("ab"))
        .unwrap();

    assert_eq!(step.connection_count(), 1);
    assert_eq!(history[0].node_count(), 0);
}

// ============================================================================
// Umbrella error and JSON form
// ============================================================================

fn build_scenario() -> flowcore::Result<FlowGraph> {
    let graph = FlowGraph::new("Built").with_id("built");
    let graph = graph.add_node(generator("source"), None)?;
    let graph = graph.add_node(GraphNode::new("Group").with_id("group"), None)?;
    let graph = graph.add_node(transformer("inner"), Some("group"))?;
    let graph = graph.add_connection(
        Connection::new("source", "source.out.out", "inner", "inner.in.in").with_id("x"),
    )?;
    Ok(graph)
}

#[test]
fn test_editor_errors_convert_into_flow_error() {
    // "inner" is not reachable from the root without an exposed port.
    let err = build_scenario().unwrap_err();

    assert!(matches!(err, flowcore::FlowError::Graph(GraphError::InvalidConnection { .. })));
}

#[test]
fn test_json_form_round_trips() {
    let graph = scenario_b();

    let json = graph.to_json().unwrap();
    let mut written = Vec::new();
    graph.write_json(&mut written).unwrap();

    assert_eq!(FlowGraph::from_json(&json).unwrap(), graph);
    assert_eq!(String::from_utf8(written).unwrap(), format!("{}\n", json));
    assert!(matches!(
        FlowGraph::from_json("{ not json"),
        Err(flowcore::FlowError::Serialization(_))
    ));
}
