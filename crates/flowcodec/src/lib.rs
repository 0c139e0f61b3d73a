//! Text codec for flow graphs
//!
//! Reads and writes the human-readable graph format. The reader accepts the
//! current format and the legacy unversioned one; the writer always produces
//! the current format.

mod error;
mod lexer;
mod parser;
mod writer;

pub use error::{ParseError, ParseResult, SourceLocation};
pub use lexer::{tokenize, Spanned, Token};
pub use parser::MAX_NESTING_DEPTH;
pub use writer::WriterOptions;

use flowcore::FlowGraph;

/// Highest format version this crate reads, and the one it writes.
pub const FORMAT_VERSION: u32 = 2;

/// Renders a graph with default [`WriterOptions`].
pub fn serialize(graph: &FlowGraph) -> String {
    serialize_with(graph, &WriterOptions::default())
}

pub fn serialize_with(graph: &FlowGraph, options: &WriterOptions) -> String {
    writer::write(graph, options)
}

/// Parses text into a graph. Any failure is fatal and yields no graph.
pub fn deserialize(text: &str) -> ParseResult<FlowGraph> {
    parser::parse(text).map_err(|err| {
        tracing::debug!("Failed to parse graph: {}", err);
        err
    })
}
