#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::missing_errors_doc
)]

//! Pinky language compiler: translates Pinky source text into a
//! self-contained WASM 1.0 module.
//!
//! `frontend` (lexer + parser, producing the `ast` this crate consumes)
//! feeds `backend` (the binary encoder, string table, runtime library,
//! scope/symbol table and AST lowering). [`compile_source`] is the thin
//! façade over both; callers who already hold a parsed [`ast::Program`]
//! can call [`backend::compile`] directly.

pub mod ast;
pub mod backend;
pub mod error;
pub mod frontend;

/// Test harness module: decode/assert helpers over emitted module bytes,
/// used by this crate's own tests and available to downstream consumers
/// that want to assert on compiler output without embedding a WASM engine.
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use backend::{compile, compile_with_options, CompileOptions, CompileOutput};
pub use error::{CompileError, LexError, ParseError, PinkyError};

/// Lexes, parses and compiles Pinky source text in one call.
pub fn compile_source(src: &str) -> Result<CompileOutput, PinkyError> {
    compile_source_with_options(src, &CompileOptions::default())
}

/// As [`compile_source`], with explicit [`CompileOptions`].
pub fn compile_source_with_options(
    src: &str,
    options: &CompileOptions,
) -> Result<CompileOutput, PinkyError> {
    let program = frontend::parse(src)?;
    let output = backend::compile_with_options(&program, options)?;
    Ok(output)
}

/// Scaffolds a starter `.pinky` file at `path`, the library function the
/// CLI's `init` subcommand calls.
pub fn init(path: &std::path::Path) -> std::io::Result<()> {
    const STARTER: &str = "println \"hello, pinky\"\n";
    std::fs::write(path, STARTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_source_runs_the_full_pipeline() {
        let output = compile_source("println \"hello\"").expect("compile");
        assert_eq!(&output.bytes[0..8], &backend::encoder::MODULE_HEADER);
    }

    #[test]
    fn compile_source_surfaces_lex_errors() {
        let err = compile_source("\"unterminated").unwrap_err();
        assert!(matches!(err, PinkyError::Lex(_)));
    }

    #[test]
    fn compile_source_surfaces_parse_errors() {
        let err = compile_source("if 1 then").unwrap_err();
        assert!(matches!(err, PinkyError::Parse(_)));
    }

    #[test]
    fn compile_source_surfaces_compile_errors() {
        let err = compile_source("println undeclared_name").unwrap_err();
        assert!(matches!(err, PinkyError::Compile(_)));
    }
}
