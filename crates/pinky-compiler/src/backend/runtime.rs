//! Fixed catalogue of WASM helper functions implementing boxed
//! dynamic-value semantics. Every body here is literal WASM bytecode
//! authored once at compile time, not generated per-program; the only
//! things that vary between compiles are the user functions assembled
//! in [`crate::backend::lower`].
//!
//! WASM 1.0 has no float-to-string, string-to-float or general-exponent
//! `pow`, so `to_number`, `concat` and `math_pow` each hand-roll the
//! arithmetic (see DESIGN.md for the scope limits this implies for
//! `math_pow`).

use crate::backend::encoder::{op, valtype, Emitter};
use crate::backend::strings::STRINGS_BASE;

pub mod tag {
    pub const NIL: i32 = 0;
    pub const BOOL: i32 = 1;
    pub const NUMBER: i32 = 2;
    pub const STRING: i32 = 3;
}

pub mod size {
    pub const NIL: i32 = 1;
    pub const BOOL: i32 = 2;
    pub const NUMBER: i32 = 9;
    pub const STRING: i32 = 9;
}

/// The module's one mutable global: a bump-allocator heap pointer.
/// There is no garbage collector; memory only grows.
pub const HEAP_PTR_GLOBAL: u32 = 0;

// `strings::StringTable::new()` always interns "true", "false", "nil" in
// that order before any user literal, so their offsets are fixed and
// known here without threading a `StringTable` through this module.
const TRUE_OFFSET: i32 = STRINGS_BASE as i32;
const TRUE_LEN: i32 = 4;
const FALSE_OFFSET: i32 = TRUE_OFFSET + TRUE_LEN;
const FALSE_LEN: i32 = 5;
const NIL_OFFSET: i32 = FALSE_OFFSET + FALSE_LEN;
const NIL_LEN: i32 = 3;

pub mod idx {
    pub const PRINT: u32 = 0;
    pub const PRINTLN: u32 = 1;
    pub const BOX_NIL: u32 = 2;
    pub const BOX_BOOL: u32 = 3;
    pub const BOX_NUMBER: u32 = 4;
    pub const BOX_STRING: u32 = 5;
    pub const UNBOX_NUMBER: u32 = 6;
    pub const IS_NIL: u32 = 7;
    pub const IS_BOOL: u32 = 8;
    pub const IS_NUMBER: u32 = 9;
    pub const IS_STRING: u32 = 10;
    pub const IS_TRUTHY: u32 = 11;
    pub const TO_NUMBER: u32 = 12;
    pub const CONCAT: u32 = 13;
    pub const MOD: u32 = 14;
    pub const MATH_POW: u32 = 15;
    pub const MEMCPY_BYTES: u32 = 16;
    pub const STRINGIFY_INTO: u32 = 17;
    pub const NUMBER_TO_STRING: u32 = 18;
}

/// Two imports (`env.print`, `env.println`) precede the runtime catalogue
/// in the function index space; user functions and `main` follow it.
pub const IMPORT_COUNT: u32 = 2;
pub const RUNTIME_COUNT: u32 = 17;
pub const USER_FUNCS_START: u32 = IMPORT_COUNT + RUNTIME_COUNT;

pub struct RuntimeFunction {
    pub name: &'static str,
    pub params: Vec<u8>,
    pub results: Vec<u8>,
    pub locals: Vec<(u32, u8)>,
    pub body: Vec<u8>,
}

fn f(
    name: &'static str,
    params: &[u8],
    results: &[u8],
    locals: &[(u32, u8)],
    body: Emitter,
) -> RuntimeFunction {
    RuntimeFunction {
        name,
        params: params.to_vec(),
        results: results.to_vec(),
        locals: locals.to_vec(),
        body: body.finish(),
    }
}

/// Returns the full catalogue in [`idx`] order.
#[must_use]
pub fn catalogue() -> Vec<RuntimeFunction> {
    vec![
        box_nil(),
        box_bool(),
        box_number(),
        box_string(),
        unbox_number(),
        is_tag(idx::IS_NIL, "is_nil", tag::NIL),
        is_tag(idx::IS_BOOL, "is_bool", tag::BOOL),
        is_tag(idx::IS_NUMBER, "is_number", tag::NUMBER),
        is_tag(idx::IS_STRING, "is_string", tag::STRING),
        is_truthy(),
        to_number(),
        concat(),
        modulo(),
        math_pow(),
        memcpy_bytes(),
        stringify_into(),
        number_to_string(),
    ]
}

fn box_nil() -> RuntimeFunction {
    let mut e = Emitter::new();
    // local 0: ptr
    e.global_get(HEAP_PTR_GLOBAL).local_set(0);
    e.local_get(0).i32_const(tag::NIL).mem_op(op::I32_STORE8, 0, 0);
    e.global_get(HEAP_PTR_GLOBAL)
        .i32_const(size::NIL)
        .op(op::I32_ADD)
        .global_set(HEAP_PTR_GLOBAL);
    e.local_get(0);
    e.end();
    f("box_nil", &[], &[valtype::I32], &[(1, valtype::I32)], e)
}

fn box_bool() -> RuntimeFunction {
    let mut e = Emitter::new();
    // param 0: v, local 1: ptr
    e.global_get(HEAP_PTR_GLOBAL).local_set(1);
    e.local_get(1).i32_const(tag::BOOL).mem_op(op::I32_STORE8, 0, 0);
    e.local_get(1).local_get(0).mem_op(op::I32_STORE8, 0, 1);
    e.global_get(HEAP_PTR_GLOBAL)
        .i32_const(size::BOOL)
        .op(op::I32_ADD)
        .global_set(HEAP_PTR_GLOBAL);
    e.local_get(1);
    e.end();
    f(
        "box_bool",
        &[valtype::I32],
        &[valtype::I32],
        &[(1, valtype::I32)],
        e,
    )
}

fn box_number() -> RuntimeFunction {
    let mut e = Emitter::new();
    // param 0: v (f64), local 1: ptr
    e.global_get(HEAP_PTR_GLOBAL).local_set(1);
    e.local_get(1)
        .i32_const(tag::NUMBER)
        .mem_op(op::I32_STORE8, 0, 0);
    e.local_get(1).local_get(0).mem_op(op::F64_STORE, 0, 1);
    e.global_get(HEAP_PTR_GLOBAL)
        .i32_const(size::NUMBER)
        .op(op::I32_ADD)
        .global_set(HEAP_PTR_GLOBAL);
    e.local_get(1);
    e.end();
    f(
        "box_number",
        &[valtype::F64],
        &[valtype::I32],
        &[(1, valtype::I32)],
        e,
    )
}

fn box_string() -> RuntimeFunction {
    let mut e = Emitter::new();
    // param 0: offset, param 1: len, local 2: ptr
    e.global_get(HEAP_PTR_GLOBAL).local_set(2);
    e.local_get(2)
        .i32_const(tag::STRING)
        .mem_op(op::I32_STORE8, 0, 0);
    e.local_get(2).local_get(0).mem_op(op::I32_STORE, 0, 1);
    e.local_get(2).local_get(1).mem_op(op::I32_STORE, 0, 5);
    e.global_get(HEAP_PTR_GLOBAL)
        .i32_const(size::STRING)
        .op(op::I32_ADD)
        .global_set(HEAP_PTR_GLOBAL);
    e.local_get(2);
    e.end();
    f(
        "box_string",
        &[valtype::I32, valtype::I32],
        &[valtype::I32],
        &[(1, valtype::I32)],
        e,
    )
}

fn unbox_number() -> RuntimeFunction {
    let mut e = Emitter::new();
    e.local_get(0).mem_op(op::F64_LOAD, 0, 1);
    e.end();
    f("unbox_number", &[valtype::I32], &[valtype::F64], &[], e)
}

fn is_tag(_index: u32, name: &'static str, tag_value: i32) -> RuntimeFunction {
    let mut e = Emitter::new();
    e.local_get(0)
        .mem_op(op::I32_LOAD8_U, 0, 0)
        .i32_const(tag_value)
        .op(op::I32_EQ);
    e.end();
    f(name, &[valtype::I32], &[valtype::I32], &[], e)
}

fn is_truthy() -> RuntimeFunction {
    let mut e = Emitter::new();
    // param 0: ptr, local 1: tag
    e.local_get(0).mem_op(op::I32_LOAD8_U, 0, 0).local_set(1);

    e.local_get(1).i32_const(tag::NIL).op(op::I32_EQ);
    e.if_();
    e.i32_const(0).op(op::RETURN);
    e.end();

    e.local_get(1).i32_const(tag::BOOL).op(op::I32_EQ);
    e.if_();
    e.local_get(0).mem_op(op::I32_LOAD8_U, 0, 1).op(op::RETURN);
    e.end();

    e.i32_const(1);
    e.end();
    f(
        "is_truthy",
        &[valtype::I32],
        &[valtype::I32],
        &[(1, valtype::I32)],
        e,
    )
}

/// Locals beyond `param 0: ptr`: 1 tag, 2 off, 3 len, 4 i, 5 neg,
/// 6 seen_digit, 7 byte, 8 digit (all i32); 9 int_part, 10 frac_value,
/// 11 frac_scale (all f64).
fn to_number() -> RuntimeFunction {
    const TAG: u32 = 1;
    const OFF: u32 = 2;
    const LEN: u32 = 3;
    const I: u32 = 4;
    const NEG: u32 = 5;
    const SEEN: u32 = 6;
    const BYTE: u32 = 7;
    const DIGIT: u32 = 8;
    const INT_PART: u32 = 9;
    const FRAC_VALUE: u32 = 10;
    const FRAC_SCALE: u32 = 11;

    let mut e = Emitter::new();
    e.local_get(0).mem_op(op::I32_LOAD8_U, 0, 0).local_set(TAG);

    e.local_get(TAG).i32_const(tag::NUMBER).op(op::I32_EQ);
    e.if_();
    e.local_get(0).mem_op(op::F64_LOAD, 0, 1).op(op::RETURN);
    e.end();

    e.local_get(TAG).i32_const(tag::BOOL).op(op::I32_EQ);
    e.if_();
    e.local_get(0)
        .mem_op(op::I32_LOAD8_U, 0, 1)
        .op(op::F64_CONVERT_I32_U)
        .op(op::RETURN);
    e.end();

    e.local_get(TAG).i32_const(tag::NIL).op(op::I32_EQ);
    e.if_();
    e.f64_const(0.0).op(op::RETURN);
    e.end();

    // string: parse an optional '-', digits, optional '.' and more digits.
    e.local_get(0).mem_op(op::I32_LOAD, 0, 1).local_set(OFF);
    e.local_get(0).mem_op(op::I32_LOAD, 0, 5).local_set(LEN);
    e.i32_const(0).local_set(I);
    e.i32_const(0).local_set(NEG);
    e.i32_const(0).local_set(SEEN);
    e.f64_const(0.0).local_set(INT_PART);
    e.f64_const(0.0).local_set(FRAC_VALUE);
    e.f64_const(1.0).local_set(FRAC_SCALE);

    e.local_get(LEN).i32_const(0).op(op::I32_GT_S);
    e.if_();
    e.local_get(OFF)
        .local_get(I)
        .op(op::I32_ADD)
        .mem_op(op::I32_LOAD8_U, 0, 0)
        .local_set(BYTE);
    e.local_get(BYTE).i32_const(i32::from(b'-')).op(op::I32_EQ);
    e.if_();
    e.i32_const(1).local_set(NEG);
    e.local_get(I).i32_const(1).op(op::I32_ADD).local_set(I);
    e.end();
    e.end();

    e.block();
    e.loop_();
    e.local_get(I).local_get(LEN).op(op::I32_GE_S);
    e.br_if(1);
    e.local_get(OFF)
        .local_get(I)
        .op(op::I32_ADD)
        .mem_op(op::I32_LOAD8_U, 0, 0)
        .local_set(BYTE);
    e.local_get(BYTE).i32_const(i32::from(b'0')).op(op::I32_LT_S);
    e.br_if(1);
    e.local_get(BYTE).i32_const(i32::from(b'9')).op(op::I32_GT_S);
    e.br_if(1);
    e.local_get(BYTE).i32_const(i32::from(b'0')).op(op::I32_SUB).local_set(DIGIT);
    e.local_get(INT_PART)
        .f64_const(10.0)
        .op(op::F64_MUL)
        .local_get(DIGIT)
        .op(op::F64_CONVERT_I32_U)
        .op(op::F64_ADD)
        .local_set(INT_PART);
    e.i32_const(1).local_set(SEEN);
    e.local_get(I).i32_const(1).op(op::I32_ADD).local_set(I);
    e.br(0);
    e.end(); // loop
    e.end(); // block

    e.local_get(I).local_get(LEN).op(op::I32_LT_S);
    e.if_();
    e.local_get(OFF)
        .local_get(I)
        .op(op::I32_ADD)
        .mem_op(op::I32_LOAD8_U, 0, 0)
        .local_set(BYTE);
    e.local_get(BYTE).i32_const(i32::from(b'.')).op(op::I32_EQ);
    e.if_();
    e.local_get(I).i32_const(1).op(op::I32_ADD).local_set(I);

    e.block();
    e.loop_();
    e.local_get(I).local_get(LEN).op(op::I32_GE_S);
    e.br_if(1);
    e.local_get(OFF)
        .local_get(I)
        .op(op::I32_ADD)
        .mem_op(op::I32_LOAD8_U, 0, 0)
        .local_set(BYTE);
    e.local_get(BYTE).i32_const(i32::from(b'0')).op(op::I32_LT_S);
    e.br_if(1);
    e.local_get(BYTE).i32_const(i32::from(b'9')).op(op::I32_GT_S);
    e.br_if(1);
    e.local_get(BYTE).i32_const(i32::from(b'0')).op(op::I32_SUB).local_set(DIGIT);
    e.local_get(FRAC_VALUE)
        .f64_const(10.0)
        .op(op::F64_MUL)
        .local_get(DIGIT)
        .op(op::F64_CONVERT_I32_U)
        .op(op::F64_ADD)
        .local_set(FRAC_VALUE);
    e.local_get(FRAC_SCALE).f64_const(10.0).op(op::F64_MUL).local_set(FRAC_SCALE);
    e.i32_const(1).local_set(SEEN);
    e.local_get(I).i32_const(1).op(op::I32_ADD).local_set(I);
    e.br(0);
    e.end(); // loop
    e.end(); // block
    e.end(); // if '.'
    e.end(); // if i < len

    e.local_get(I).local_get(LEN).op(op::I32_NE);
    e.if_();
    e.f64_const(f64::NAN).op(op::RETURN);
    e.end();

    e.local_get(SEEN).i32_const(0).op(op::I32_EQ);
    e.if_();
    e.f64_const(f64::NAN).op(op::RETURN);
    e.end();

    e.local_get(NEG).i32_const(0).op(op::I32_EQ);
    e.if_();
    e.local_get(INT_PART)
        .local_get(FRAC_VALUE)
        .local_get(FRAC_SCALE)
        .op(op::F64_DIV)
        .op(op::F64_ADD)
        .op(op::RETURN);
    e.end();
    e.local_get(INT_PART)
        .local_get(FRAC_VALUE)
        .local_get(FRAC_SCALE)
        .op(op::F64_DIV)
        .op(op::F64_ADD)
        .op(op::F64_NEG);
    e.end();

    f(
        "to_number",
        &[valtype::I32],
        &[valtype::F64],
        &[(8, valtype::I32), (3, valtype::F64)],
        e,
    )
}

fn concat() -> RuntimeFunction {
    const DEST: u32 = 2;
    const LEN_A: u32 = 3;
    const LEN_B: u32 = 4;
    const TOTAL: u32 = 5;

    let mut e = Emitter::new();
    e.global_get(HEAP_PTR_GLOBAL).local_set(DEST);
    e.local_get(0)
        .local_get(DEST)
        .call(idx::STRINGIFY_INTO)
        .local_set(LEN_A);
    e.local_get(1)
        .local_get(DEST)
        .local_get(LEN_A)
        .op(op::I32_ADD)
        .call(idx::STRINGIFY_INTO)
        .local_set(LEN_B);
    e.local_get(LEN_A).local_get(LEN_B).op(op::I32_ADD).local_set(TOTAL);
    e.local_get(DEST).local_get(TOTAL).op(op::I32_ADD).global_set(HEAP_PTR_GLOBAL);
    e.local_get(DEST).local_get(TOTAL).call(idx::BOX_STRING);
    e.end();
    f(
        "concat",
        &[valtype::I32, valtype::I32],
        &[valtype::I32],
        &[(4, valtype::I32)],
        e,
    )
}

fn modulo() -> RuntimeFunction {
    let mut e = Emitter::new();
    // floored modulus: a - floor(a / b) * b
    e.local_get(0);
    e.local_get(0)
        .local_get(1)
        .op(op::F64_DIV)
        .op(op::F64_FLOOR)
        .local_get(1)
        .op(op::F64_MUL);
    e.op(op::F64_SUB);
    e.end();
    f("mod", &[valtype::F64, valtype::F64], &[valtype::F64], &[], e)
}

fn math_pow() -> RuntimeFunction {
    const N: u32 = 2;
    const NEG: u32 = 3;
    const RESULT: u32 = 4;
    const BASE_ACC: u32 = 5;

    let mut e = Emitter::new();
    // Exponentiation by squaring over the truncated integer exponent.
    // Non-integer exponents are not supported (see DESIGN.md).
    e.local_get(1).op(op::I64_TRUNC_F64_S).local_set(N);
    e.local_get(N).i64_const(0).op(op::I64_LT_S).local_set(NEG);
    e.local_get(NEG).i32_const(0).op(op::I32_NE);
    e.if_();
    e.i64_const(0).local_get(N).op(op::I64_SUB).local_set(N);
    e.end();

    e.f64_const(1.0).local_set(RESULT);
    e.local_get(0).local_set(BASE_ACC);

    e.block();
    e.loop_();
    e.local_get(N).op(op::I64_EQZ);
    e.br_if(1);
    e.local_get(N).i64_const(1).op(op::I64_AND).i64_const(1).op(op::I64_EQ);
    e.if_();
    e.local_get(RESULT).local_get(BASE_ACC).op(op::F64_MUL).local_set(RESULT);
    e.end();
    e.local_get(BASE_ACC).local_get(BASE_ACC).op(op::F64_MUL).local_set(BASE_ACC);
    e.local_get(N).i64_const(1).op(op::I64_SHR_U).local_set(N);
    e.br(0);
    e.end(); // loop
    e.end(); // block

    e.local_get(NEG).i32_const(0).op(op::I32_NE);
    e.if_();
    e.f64_const(1.0).local_get(RESULT).op(op::F64_DIV).op(op::RETURN);
    e.end();
    e.local_get(RESULT);
    e.end();

    f(
        "math_pow",
        &[valtype::F64, valtype::F64],
        &[valtype::F64],
        &[(1, valtype::I64), (1, valtype::I32), (2, valtype::F64)],
        e,
    )
}

fn memcpy_bytes() -> RuntimeFunction {
    const I: u32 = 3;
    let mut e = Emitter::new();
    e.i32_const(0).local_set(I);
    e.block();
    e.loop_();
    e.local_get(I).local_get(2).op(op::I32_GE_S);
    e.br_if(1);
    e.local_get(0).local_get(I).op(op::I32_ADD);
    e.local_get(1).local_get(I).op(op::I32_ADD).mem_op(op::I32_LOAD8_U, 0, 0);
    e.mem_op(op::I32_STORE8, 0, 0);
    e.local_get(I).i32_const(1).op(op::I32_ADD).local_set(I);
    e.br(0);
    e.end(); // loop
    e.end(); // block
    e.local_get(2);
    e.end();
    f(
        "memcpy_bytes",
        &[valtype::I32, valtype::I32, valtype::I32],
        &[valtype::I32],
        &[(1, valtype::I32)],
        e,
    )
}

/// Writes the text form of the boxed value at `ptr` into memory starting
/// at `dest`, returning the number of bytes written. Internal to `concat`;
/// not part of the user-callable surface.
fn stringify_into() -> RuntimeFunction {
    const TAG: u32 = 2;
    const OFF: u32 = 3;
    const LEN: u32 = 4;
    const BVAL: u32 = 5;

    let mut e = Emitter::new();
    e.local_get(0).mem_op(op::I32_LOAD8_U, 0, 0).local_set(TAG);

    e.local_get(TAG).i32_const(tag::STRING).op(op::I32_EQ);
    e.if_();
    e.local_get(0).mem_op(op::I32_LOAD, 0, 1).local_set(OFF);
    e.local_get(0).mem_op(op::I32_LOAD, 0, 5).local_set(LEN);
    e.local_get(1).local_get(OFF).local_get(LEN).call(idx::MEMCPY_BYTES).op(op::DROP);
    e.local_get(LEN).op(op::RETURN);
    e.end();

    e.local_get(TAG).i32_const(tag::BOOL).op(op::I32_EQ);
    e.if_();
    e.local_get(0).mem_op(op::I32_LOAD8_U, 0, 1).local_set(BVAL);
    e.local_get(BVAL).i32_const(0).op(op::I32_NE);
    e.if_();
    e.local_get(1)
        .i32_const(TRUE_OFFSET)
        .i32_const(TRUE_LEN)
        .call(idx::MEMCPY_BYTES)
        .op(op::DROP);
    e.i32_const(TRUE_LEN).op(op::RETURN);
    e.end();
    e.local_get(1)
        .i32_const(FALSE_OFFSET)
        .i32_const(FALSE_LEN)
        .call(idx::MEMCPY_BYTES)
        .op(op::DROP);
    e.i32_const(FALSE_LEN).op(op::RETURN);
    e.end();

    e.local_get(TAG).i32_const(tag::NIL).op(op::I32_EQ);
    e.if_();
    e.local_get(1)
        .i32_const(NIL_OFFSET)
        .i32_const(NIL_LEN)
        .call(idx::MEMCPY_BYTES)
        .op(op::DROP);
    e.i32_const(NIL_LEN).op(op::RETURN);
    e.end();

    // number
    e.local_get(0).mem_op(op::F64_LOAD, 0, 1).local_get(1).call(idx::NUMBER_TO_STRING);
    e.end();

    f(
        "stringify_into",
        &[valtype::I32, valtype::I32],
        &[valtype::I32],
        &[(4, valtype::I32)],
        e,
    )
}

/// Writes the base-10 text form of `value` at `dest`, returning the byte
/// length written. Fixed-point: fractions are rendered to 6 decimal
/// places with trailing zeros trimmed (no exponential notation).
fn number_to_string() -> RuntimeFunction {
    const NEG: u32 = 2;
    const CURSOR: u32 = 3;
    const INT_MAG: u32 = 4;
    const FRAC6: u32 = 5;
    const DIGIT_COUNT: u32 = 6;
    const TMP: u32 = 7;
    const K: u32 = 8;
    const DIGIT: u32 = 9;
    const ABS_VALUE: u32 = 10;
    const FRAC_PART: u32 = 11;

    let mut e = Emitter::new();
    e.local_get(0).op(op::F64_ABS).local_set(ABS_VALUE);
    e.local_get(0).f64_const(0.0).op(op::F64_LT).local_set(NEG);

    e.local_get(ABS_VALUE).op(op::I64_TRUNC_F64_S).local_set(INT_MAG);
    e.local_get(ABS_VALUE)
        .local_get(INT_MAG)
        .op(op::F64_CONVERT_I64_S)
        .op(op::F64_SUB)
        .local_set(FRAC_PART);
    e.local_get(FRAC_PART)
        .f64_const(1_000_000.0)
        .op(op::F64_MUL)
        .f64_const(0.5)
        .op(op::F64_ADD)
        .op(op::I64_TRUNC_F64_S)
        .local_set(FRAC6);

    e.local_get(FRAC6).i64_const(1_000_000).op(op::I64_EQ);
    e.if_();
    e.local_get(INT_MAG).i64_const(1).op(op::I64_ADD).local_set(INT_MAG);
    e.i64_const(0).local_set(FRAC6);
    e.end();

    e.local_get(1).local_set(CURSOR);

    e.local_get(NEG).i32_const(0).op(op::I32_NE);
    e.if_();
    e.local_get(CURSOR).i32_const(i32::from(b'-')).mem_op(op::I32_STORE8, 0, 0);
    e.local_get(CURSOR).i32_const(1).op(op::I32_ADD).local_set(CURSOR);
    e.end();

    // digit_count = max(1, decimal digit count of int_mag)
    e.local_get(INT_MAG).local_set(TMP);
    e.i32_const(1).local_set(DIGIT_COUNT);
    e.local_get(TMP).i64_const(10).op(op::I64_DIV_U).local_set(TMP);
    e.block();
    e.loop_();
    e.local_get(TMP).i64_const(0).op(op::I64_EQ);
    e.br_if(1);
    e.local_get(DIGIT_COUNT).i32_const(1).op(op::I32_ADD).local_set(DIGIT_COUNT);
    e.local_get(TMP).i64_const(10).op(op::I64_DIV_U).local_set(TMP);
    e.br(0);
    e.end();
    e.end();

    // write int_mag's digits backward into cursor[0..digit_count)
    e.local_get(INT_MAG).local_set(TMP);
    e.local_get(DIGIT_COUNT).i32_const(1).op(op::I32_SUB).local_set(K);
    e.block();
    e.loop_();
    e.local_get(K).i32_const(0).op(op::I32_LT_S);
    e.br_if(1);
    e.local_get(TMP).i64_const(10).op(op::I64_REM_U).op(op::I32_WRAP_I64).local_set(DIGIT);
    e.local_get(CURSOR).local_get(K).op(op::I32_ADD);
    e.local_get(DIGIT).i32_const(i32::from(b'0')).op(op::I32_ADD);
    e.mem_op(op::I32_STORE8, 0, 0);
    e.local_get(TMP).i64_const(10).op(op::I64_DIV_U).local_set(TMP);
    e.local_get(K).i32_const(1).op(op::I32_SUB).local_set(K);
    e.br(0);
    e.end();
    e.end();
    e.local_get(CURSOR).local_get(DIGIT_COUNT).op(op::I32_ADD).local_set(CURSOR);

    // fractional part, fixed 6-digit block with trailing zeros trimmed
    e.block();
    e.local_get(FRAC6).i64_const(0).op(op::I64_EQ);
    e.br_if(0);

    e.local_get(CURSOR).i32_const(i32::from(b'.')).mem_op(op::I32_STORE8, 0, 0);
    e.local_get(CURSOR).i32_const(1).op(op::I32_ADD).local_set(CURSOR);

    e.local_get(FRAC6).local_set(TMP);
    e.i32_const(5).local_set(K);
    e.block();
    e.loop_();
    e.local_get(K).i32_const(0).op(op::I32_LT_S);
    e.br_if(1);
    e.local_get(TMP).i64_const(10).op(op::I64_REM_U).op(op::I32_WRAP_I64).local_set(DIGIT);
    e.local_get(CURSOR).local_get(K).op(op::I32_ADD);
    e.local_get(DIGIT).i32_const(i32::from(b'0')).op(op::I32_ADD);
    e.mem_op(op::I32_STORE8, 0, 0);
    e.local_get(TMP).i64_const(10).op(op::I64_DIV_U).local_set(TMP);
    e.local_get(K).i32_const(1).op(op::I32_SUB).local_set(K);
    e.br(0);
    e.end();
    e.end();
    e.local_get(CURSOR).i32_const(6).op(op::I32_ADD).local_set(CURSOR);

    e.block();
    e.loop_();
    e.local_get(CURSOR)
        .i32_const(1)
        .op(op::I32_SUB)
        .mem_op(op::I32_LOAD8_U, 0, 0)
        .i32_const(i32::from(b'0'))
        .op(op::I32_NE);
    e.br_if(1);
    e.local_get(CURSOR).i32_const(1).op(op::I32_SUB).local_set(CURSOR);
    e.br(0);
    e.end();
    e.end();

    e.end(); // fractional block

    e.local_get(CURSOR).local_get(1).op(op::I32_SUB);
    e.end();

    f(
        "number_to_string",
        &[valtype::F64, valtype::I32],
        &[valtype::I32],
        &[
            (2, valtype::I32),
            (2, valtype::I64),
            (1, valtype::I32),
            (1, valtype::I64),
            (2, valtype::I32),
            (2, valtype::F64),
        ],
        e,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_the_documented_function_count() {
        assert_eq!(catalogue().len(), RUNTIME_COUNT as usize);
    }

    #[test]
    fn catalogue_order_matches_idx_constants() {
        let names: Vec<&str> = catalogue().into_iter().map(|rf| rf.name).collect();
        assert_eq!(names[0], "box_nil");
        assert_eq!(names[(idx::CONCAT - IMPORT_COUNT) as usize], "concat");
        assert_eq!(
            names[(idx::NUMBER_TO_STRING - IMPORT_COUNT) as usize],
            "number_to_string"
        );
    }

    #[test]
    fn every_function_body_ends_with_end_opcode() {
        for rf in catalogue() {
            assert_eq!(*rf.body.last().unwrap(), op::END, "{} missing end", rf.name);
        }
    }
}
