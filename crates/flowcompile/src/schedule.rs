//! Start ordering derived from a wiring plan.

use crate::error::CompileError;
use crate::lowering::WiringPlan;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

impl WiringPlan {
    /// Node ids as vertices in order of first appearance, one edge per
    /// statement weighted by the statement's position in the plan.
    pub fn dependency_graph(&self) -> DiGraph<String, usize> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for (position, statement) in self.statements.iter().enumerate() {
            let source = vertex(&mut graph, &mut indices, &statement.source_node_id);
            let target = vertex(&mut graph, &mut indices, &statement.target_node_id);
            graph.add_edge(source, target, position);
        }
        graph
    }

    /// Node ids so that every producer comes before its consumers.
    pub fn topological_order(&self) -> Result<Vec<String>, CompileError> {
        let graph = self.dependency_graph();
        let order = toposort(&graph, None).map_err(|cycle| CompileError::CyclicDependency {
            node_id: graph[cycle.node_id()].clone(),
        })?;
        Ok(order.into_iter().map(|index| graph[index].clone()).collect())
    }
}

fn vertex<'a>(
    graph: &mut DiGraph<String, usize>,
    indices: &mut HashMap<&'a str, NodeIndex>,
    node_id: &'a str,
) -> NodeIndex {
    *indices
        .entry(node_id)
        .or_insert_with(|| graph.add_node(node_id.to_string()))
}
