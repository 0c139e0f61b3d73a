use crate::error::{GraphError, ResolveError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifiers for the non-fatal problems a graph pass can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    UnresolvableConnection,
    BrokenPortMapping,
    DanglingPortReference,
    AmbiguousPassThru,
    /// An exposed port has no external connection to bridge.
    NoExternalConnection,
    InvalidPassThru,
    InvalidConnection,
    DuplicateId,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnresolvableConnection => "UNRESOLVABLE_CONNECTION",
            DiagnosticCode::BrokenPortMapping => "BROKEN_PORT_MAPPING",
            DiagnosticCode::DanglingPortReference => "DANGLING_PORT_REFERENCE",
            DiagnosticCode::AmbiguousPassThru => "AMBIGUOUS_PASS_THRU",
            DiagnosticCode::NoExternalConnection => "NO_EXTERNAL_CONNECTION",
            DiagnosticCode::InvalidPassThru => "INVALID_PASS_THRU",
            DiagnosticCode::InvalidConnection => "INVALID_CONNECTION",
            DiagnosticCode::DuplicateId => "DUPLICATE_ID",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The affected element was skipped; the rest of the output is usable.
    Warning,
    /// The graph breaks a structural invariant.
    Error,
}

/// A typed, non-fatal problem returned alongside partial results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Id of the offending connection, node or port.
    pub subject_id: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        subject_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            subject_id: subject_id.into(),
            message: message.into(),
        }
    }

    pub fn warning(
        code: DiagnosticCode,
        subject_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, Severity::Warning, subject_id, message)
    }

    pub fn error(
        code: DiagnosticCode,
        subject_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, Severity::Error, subject_id, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.code, self.subject_id, self.message)
    }
}

impl From<&ResolveError> for Diagnostic {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::UnresolvableConnection { connection_id, .. } => Diagnostic::warning(
                DiagnosticCode::UnresolvableConnection,
                connection_id.clone(),
                err.to_string(),
            ),
            ResolveError::BrokenPortMapping {
                graph_node_id,
                port_name,
                ..
            } => Diagnostic::warning(
                DiagnosticCode::BrokenPortMapping,
                format!("{}.{}", graph_node_id, port_name),
                err.to_string(),
            ),
            ResolveError::AmbiguousPassThru {
                graph_node_id,
                port_name,
                ..
            } => Diagnostic::warning(
                DiagnosticCode::AmbiguousPassThru,
                format!("{}.{}", graph_node_id, port_name),
                err.to_string(),
            ),
            ResolveError::NoExternalConnection {
                graph_node_id,
                port_name,
            } => Diagnostic::warning(
                DiagnosticCode::NoExternalConnection,
                format!("{}.{}", graph_node_id, port_name),
                err.to_string(),
            ),
        }
    }
}

impl From<&GraphError> for Diagnostic {
    fn from(err: &GraphError) -> Self {
        let (code, subject) = match err {
            GraphError::DuplicateId { id, .. } => (DiagnosticCode::DuplicateId, id.clone()),
            GraphError::InvalidConnection { connection_id, .. }
            | GraphError::InvalidCapacity { connection_id, .. } => {
                (DiagnosticCode::InvalidConnection, connection_id.clone())
            }
            GraphError::PortNotFound { node_id, port_id } => (
                DiagnosticCode::DanglingPortReference,
                format!("{}.{}", node_id, port_id),
            ),
            GraphError::InvalidPortMapping {
                graph_node_id,
                port_name,
                ..
            } => (
                DiagnosticCode::BrokenPortMapping,
                format!("{}.{}", graph_node_id, port_name),
            ),
            GraphError::NodeNotFound(id)
            | GraphError::ConnectionNotFound(id)
            | GraphError::NotAGraphNode(id) => (DiagnosticCode::InvalidConnection, id.clone()),
        };
        Diagnostic::error(code, subject, err.to_string())
    }
}

/// Counts diagnostics by severity, for summaries.
pub fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}
