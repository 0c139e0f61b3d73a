use std::fmt;
use thiserror::Error;

/// Position in the input text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Fatal failure of a deserialize call. No partial graph is ever returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Lexical error at {location}: {message}")]
    Lexical {
        message: String,
        location: SourceLocation,
    },

    #[error("Syntax error at {location}: {message}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    #[error("Unexpected end of input at {location}: expected {expected}")]
    UnexpectedEof {
        expected: String,
        location: SourceLocation,
    },

    #[error("Unsupported format version {found} (supported: 1 to {supported})")]
    UnsupportedFormat { found: i64, supported: u32 },

    /// Well-formed text describing a graph that breaks an invariant.
    #[error("Invalid graph at {location}: {message}")]
    Invalid {
        message: String,
        location: SourceLocation,
    },
}

impl ParseError {
    pub fn lexical(message: impl Into<String>, location: SourceLocation) -> Self {
        ParseError::Lexical {
            message: message.into(),
            location,
        }
    }

    pub fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        ParseError::Syntax {
            message: message.into(),
            location,
        }
    }

    pub fn invalid(message: impl Into<String>, location: SourceLocation) -> Self {
        ParseError::Invalid {
            message: message.into(),
            location,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            ParseError::Lexical { location, .. }
            | ParseError::Syntax { location, .. }
            | ParseError::UnexpectedEof { location, .. }
            | ParseError::Invalid { location, .. } => Some(*location),
            ParseError::UnsupportedFormat { .. } => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
