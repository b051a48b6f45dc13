//! Lexer and parser that turn Pinky source text into the [`crate::ast`]
//! the back end lowers. Neither stage attempts error recovery: the first
//! malformed token or construct aborts the pass.

pub mod lexer;
pub mod parser;

use crate::ast::Program;
use crate::error::PinkyError;

/// Lexes then parses `src` into a [`Program`], tracing both stages.
pub fn parse(src: &str) -> Result<Program, PinkyError> {
    let tokens = tracing::trace_span!("lex").in_scope(|| lexer::Lexer::new(src).tokenize())?;
    let program =
        tracing::trace_span!("parse").in_scope(|| parser::Parser::new(tokens).parse_program())?;
    Ok(program)
}
