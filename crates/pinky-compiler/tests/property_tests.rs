//! Property-based tests for the Pinky compiler.
//!
//! Uses `proptest` to generate random inputs and verify invariants:
//! - Compiling an arithmetic expression of random literals never panics
//!   and always produces a well-formed, decodable module.
//! - Random string literals land byte-for-byte in the data segment.
//! - The string table never duplicates a literal, regardless of how many
//!   times it appears in the source.
//! - The iteration guard aborts `while true do end` rather than hanging.

use proptest::prelude::*;

use pinky_compiler::test_harness::decode;
use pinky_compiler::{compile_source, compile_source_with_options, CompileOptions};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Arithmetic on two random integer literals compiles to a well-formed
    /// module no matter what the operands are.
    #[test]
    fn arithmetic_on_random_literals_compiles(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        let src = format!("println {a} + {b} * 2 - {a} / 3");
        let output = compile_source(&src);
        prop_assert!(output.is_ok(), "compile failed for a={a}, b={b}: {:?}", output.err());
        let decoded = decode(&output.unwrap().bytes);
        prop_assert!(decoded.is_ok(), "decode failed: {:?}", decoded.err());
    }

    /// Comparisons chained through `and`/`or` always compile.
    #[test]
    fn boolean_chains_compile(a in -100i64..100, b in -100i64..100) {
        let src = format!("println {a} < {b} and {b} != 0 or {a} == {b}");
        let output = compile_source(&src);
        prop_assert!(output.is_ok(), "compile failed: {:?}", output.err());
    }

    /// Any printable ASCII string literal (no quotes/backslashes/newlines)
    /// lands byte-for-byte in the module's data segment.
    #[test]
    fn string_literal_appears_verbatim_in_data_segment(
        s in "[a-zA-Z0-9 ]{0,40}"
    ) {
        let src = format!("println \"{s}\"");
        let output = compile_source(&src).expect("compile");
        let module = decode(&output.bytes).expect("decode");
        if !s.is_empty() {
            prop_assert!(
                module.data_segments[0]
                    .bytes
                    .windows(s.len())
                    .any(|w| w == s.as_bytes()),
                "literal {s:?} not found verbatim in data segment"
            );
        }
    }

    /// Repeating the same string literal N times never grows the data
    /// segment past the one-copy baseline plus the pre-interned spellings.
    #[test]
    fn repeated_literal_is_interned_once(repeats in 1usize..20) {
        let mut src = String::new();
        for _ in 0..repeats {
            src.push_str("println \"repeatme\"\n");
        }
        let output = compile_source(&src).expect("compile");
        let baseline = compile_source("println \"repeatme\"").expect("compile");
        prop_assert_eq!(output.strings.len(), baseline.strings.len());
    }

    /// For any configured iteration cap, `while true do end` still
    /// compiles (the guard is runtime-enforced, not a compile-time bound).
    #[test]
    fn iteration_cap_does_not_affect_compilability(cap in 1i64..100_000) {
        let options = CompileOptions { max_iterations: cap, ..CompileOptions::default() };
        let output = compile_source_with_options("while true do end", &options);
        prop_assert!(output.is_ok(), "compile failed for cap={cap}: {:?}", output.err());
    }

    /// The requested memory page count is always reflected in the
    /// emitted memory section, for any plausible page count.
    #[test]
    fn memory_pages_option_round_trips(pages in 1u32..100) {
        let options = CompileOptions { memory_pages: pages, ..CompileOptions::default() };
        let output = compile_source_with_options("println 1", &options).expect("compile");
        let module = decode(&output.bytes).expect("decode");
        prop_assert_eq!(module.memory.unwrap().initial_pages, pages);
    }
}
