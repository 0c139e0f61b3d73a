//! Core graph model for the flow toolchain
//!
//! This crate holds the nested dataflow graph representation together with
//! the passes every consumer needs: id indexing, validation, the editor
//! mutation surface, scope resolution of boundary-crossing connections and
//! pass-thru port synthesis. Everything here is pure and synchronous.

mod connection;
mod diagnostic;
mod edit;
mod error;
mod graph;
mod index;
mod node;
mod passthru;
mod port;
mod scope;
mod validate;

pub use connection::{Connection, ConnectionId, ConnectionSegment, RENDEZVOUS, UNLIMITED};
pub use diagnostic::{count_errors, Diagnostic, DiagnosticCode, Severity};
pub use error::{FlowError, GraphError, ResolveError};
pub use graph::{FlowGraph, GraphId, GraphStats, ScopedConnection, DEFAULT_VERSION};
pub use index::{GraphIndex, IndexedNode, ScopeRef};
pub use node::{
    CodeNode, CodeNodeType, ControlConfig, ExecutionState, GraphNode, Node, NodeBase, NodeId,
    PortSlot, Position,
};
pub use passthru::{synthesize_pass_thru, PassThruSynthesizer};
pub use port::{ExposedPort, PassThruPort, Port, PortDirection, PortId, PortMapping};
pub use scope::{Resolution, ResolvedConnection, ScopeResolver};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
