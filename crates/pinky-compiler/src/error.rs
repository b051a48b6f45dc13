//! Error taxonomy for the three pipeline stages: lexing, parsing, and
//! back-end compilation. Each variant carries enough source position
//! information for a caller to point at the offending token.

/// A `(line, column, length)` triple identifying a span of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
    pub length: u32,
}

impl Pos {
    #[must_use]
    pub const fn new(line: u32, column: u32, length: u32) -> Self {
        Self {
            line,
            column,
            length,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}:{}: {message}", pos.line, pos.column)]
pub struct LexError {
    pub message: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}:{}: {message}", pos.line, pos.column)]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("{}:{}: undeclared variable '{name}'", pos.line, pos.column)]
    UndeclaredVariable { name: String, pos: Pos },

    #[error("{}:{}: undefined function '{name}'", pos.line, pos.column)]
    UndefinedFunction { name: String, pos: Pos },

    #[error(
        "{}:{}: function '{name}' expects {expected} argument(s), got {found}",
        pos.line,
        pos.column
    )]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        pos: Pos,
    },

    #[error("{}:{}: duplicate function '{name}'", pos.line, pos.column)]
    DuplicateFunction { name: String, pos: Pos },

    #[error("{}:{}: unsupported operator '{op}'", pos.line, pos.column)]
    UnsupportedOperator { op: String, pos: Pos },

    /// "Should never happen" conditions: missing function body, unknown
    /// statement/expression kind. Returned rather than panicking, so a
    /// caller embedding this compiler never has to catch_unwind it.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    #[must_use]
    pub const fn pos(&self) -> Option<Pos> {
        match self {
            Self::UndeclaredVariable { pos, .. }
            | Self::UndefinedFunction { pos, .. }
            | Self::ArityMismatch { pos, .. }
            | Self::DuplicateFunction { pos, .. }
            | Self::UnsupportedOperator { pos, .. } => Some(*pos),
            Self::Internal(_) => None,
        }
    }
}

/// Unifies the three stage-specific error types for callers that go
/// through [`crate::compile_source`] rather than calling the back end
/// directly with an already-parsed AST.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PinkyError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;
