use crate::error::CompileError;
use crate::lowering::{Lowerer, LoweringMode, WiringPlan};
use flowcore::{count_errors, ConnectionSegment, Diagnostic, FlowGraph, ScopeResolver};
use serde::{Deserialize, Serialize};

/// Compiler settings, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub mode: LoweringMode,
    /// Fail the compilation when any diagnostic is reported.
    pub deny_diagnostics: bool,
    /// Carry the resolved segments in the output.
    pub include_segments: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            mode: LoweringMode::default(),
            deny_diagnostics: false,
            include_segments: true,
        }
    }
}

/// Everything produced for one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compilation {
    pub segments: Vec<ConnectionSegment>,
    pub plan: WiringPlan,
    /// Validation findings followed by lowering findings, without repeats.
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        count_errors(&self.diagnostics) > 0
    }
}

/// Validates, resolves and lowers a graph in one call.
pub struct FlowCompiler {
    config: CompilerConfig,
}

impl FlowCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile(&self, graph: &FlowGraph) -> Result<Compilation, CompileError> {
        let mut diagnostics = graph.validate();

        let segments = if self.config.include_segments {
            ScopeResolver::new(graph).resolve_all().segments().cloned().collect()
        } else {
            Vec::new()
        };

        let plan = Lowerer::new(graph).lower(self.config.mode);
        for diagnostic in &plan.diagnostics {
            if !diagnostics.contains(diagnostic) {
                diagnostics.push(diagnostic.clone());
            }
        }

        if self.config.deny_diagnostics && !diagnostics.is_empty() {
            return Err(CompileError::DiagnosticsDenied { diagnostics });
        }

        tracing::info!(
            "Compiled graph {} into {} wiring statements ({} diagnostics)",
            graph.name,
            plan.len(),
            diagnostics.len()
        );
        Ok(Compilation {
            segments,
            plan,
            diagnostics,
        })
    }
}

impl Default for FlowCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}
