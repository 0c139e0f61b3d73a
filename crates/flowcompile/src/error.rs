use flowcore::{Diagnostic, DiagnosticCode};
use thiserror::Error;

/// A connection skipped while lowering. The rest of the plan is unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoweringError {
    #[error(
        "Connection {connection_id} references port '{port_id}' on '{node_id}', \
         which does not exist"
    )]
    DanglingPortReference {
        connection_id: String,
        node_id: String,
        port_id: String,
    },
}

impl From<&LoweringError> for Diagnostic {
    fn from(err: &LoweringError) -> Self {
        match err {
            LoweringError::DanglingPortReference { connection_id, .. } => Diagnostic::warning(
                DiagnosticCode::DanglingPortReference,
                connection_id.clone(),
                err.to_string(),
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Cyclic dependency through node '{node_id}'")]
    CyclicDependency { node_id: String },

    #[error("Compilation reported {} diagnostics and diagnostics are denied", .diagnostics.len())]
    DiagnosticsDenied { diagnostics: Vec<Diagnostic> },
}
