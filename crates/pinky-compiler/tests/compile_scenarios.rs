//! End-to-end scenarios compiling Pinky source to WASM module bytes and
//! asserting on the emitted module's shape. There is no embedded WASM
//! engine here, so these check structure rather than stdout: section
//! presence, exports, memory limits, data segment contents and
//! well-formedness, not runtime behavior.

use pinky_compiler::test_harness::decode;
use pinky_compiler::{compile_source, CompileError, PinkyError};

fn compiled(src: &str) -> pinky_compiler::CompileOutput {
    compile_source(src).unwrap_or_else(|e| panic!("compile failed for {src:?}: {e}"))
}

#[test]
fn hello_world_prints_a_string_literal() {
    let output = compiled(r#"println "hello""#);
    let module = decode(&output.bytes).expect("decode");
    assert!(module.find_export("main").is_some());
    // "hello" plus the pre-interned true/false/nil spellings.
    assert!(module.data_segments[0]
        .bytes
        .windows(5)
        .any(|w| w == b"hello"));
}

#[test]
fn arithmetic_and_println_of_a_number() {
    let output = compiled("x := 5\nprintln x + 10");
    let module = decode(&output.bytes).expect("decode");
    assert!(module.find_export("main").is_some());
}

#[test]
fn string_plus_number_concatenates_via_coercion() {
    // `+` with a string operand coerces the other side to its
    // stringified form and concatenates, rather than erroring.
    let output = compiled(r#"println "a" + 1"#);
    let module = decode(&output.bytes).expect("decode");
    assert!(module.find_export("main").is_some());
}

#[test]
fn bool_plus_number_coerces_the_boolean_via_to_number() {
    // `+` with a boolean operand (and no string operand) coerces both
    // sides through `to_number` (true/false -> 1/0) rather than unboxing
    // either side directly as a 9-byte number box.
    let output = compiled("println true + 1");
    let module = decode(&output.bytes).expect("decode");
    assert!(module.find_export("main").is_some());

    let output = compiled("println 1 + false");
    decode(&output.bytes).expect("decode");
}

#[test]
fn if_elif_else_chain_compiles_to_one_well_formed_function() {
    let src = "\
x := 1
if x == 1 then
    println \"one\"
elif x == 2 then
    println \"two\"
else
    println \"other\"
end";
    let output = compiled(src);
    let module = decode(&output.bytes).expect("decode");
    let main_body = module.code_bodies.last().expect("main body");
    assert_eq!(*main_body.last().unwrap(), 0x0b);
}

#[test]
fn while_loop_compiles_with_the_iteration_guard() {
    let src = "\
i := 0
while i < 5 do
    println i
    i = i + 1
end";
    let output = compiled(src);
    decode(&output.bytes).expect("decode");
}

#[test]
fn for_loop_with_default_and_explicit_step() {
    let output = compiled("for i := 1, 5 do println i end");
    decode(&output.bytes).expect("decode");

    let output = compiled("for i := 10, 0, -2 do println i end");
    decode(&output.bytes).expect("decode");
}

#[test]
fn function_call_compiles_and_registers_in_the_function_section() {
    let src = "\
func add(a, b)
    ret a + b
end
println add(2, 3)";
    let output = compiled(src);
    let module = decode(&output.bytes).expect("decode");
    // two runtime+import-independent user functions: `add` and `main`.
    assert!(module.function_type_indices.len() >= 2);
}

#[test]
fn forward_reference_to_a_later_function_resolves() {
    let src = "\
func caller()
    ret callee()
end
func callee()
    ret 42
end
println caller()";
    compiled(src);
}

#[test]
fn short_circuit_and_or_compile() {
    compiled("println true and false");
    compiled("println false or true");
}

#[test]
fn builtin_type_predicates_are_callable_by_name() {
    compiled(r#"println is_string("a")"#);
    compiled("println is_number(1)");
    compiled("println is_bool(true)");
    compiled("println is_nil(nil)");
}

#[test]
fn builtin_type_predicate_with_wrong_arity_is_a_compile_error() {
    let err = compile_source(r#"println is_string("a", "b")"#).unwrap_err();
    assert!(matches!(
        err,
        PinkyError::Compile(CompileError::ArityMismatch { .. })
    ));
}

#[test]
fn user_function_shadows_the_builtin_predicate_of_the_same_name() {
    let src = "\
func is_string(x)
    ret 42
end
println is_string(1)";
    compiled(src);
}

// ── Negative cases ──

#[test]
fn undeclared_variable_is_a_compile_error() {
    let err = compile_source("println never_declared").unwrap_err();
    assert!(matches!(
        err,
        PinkyError::Compile(CompileError::UndeclaredVariable { .. })
    ));
}

#[test]
fn duplicate_function_declaration_is_a_compile_error() {
    let src = "\
func f() ret 1 end
func f() ret 2 end
";
    let err = compile_source(src).unwrap_err();
    assert!(matches!(
        err,
        PinkyError::Compile(CompileError::DuplicateFunction { .. })
    ));
}

#[test]
fn calling_a_function_with_the_wrong_arity_is_a_compile_error() {
    let src = "\
func f(a, b) ret a + b end
println f(1)
";
    let err = compile_source(src).unwrap_err();
    assert!(matches!(
        err,
        PinkyError::Compile(CompileError::ArityMismatch { .. })
    ));
}
