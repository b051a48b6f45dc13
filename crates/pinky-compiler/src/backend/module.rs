//! Top-level compile driver: assembles the type/import/function/memory/
//! global/export/code/data sections into the final `.wasm` bytes.
//!
//! Section order follows the WASM binary format's own fixed order: types,
//! then imports, then the function index, then memory, globals, exports,
//! code bodies, and finally the string data segment.

use std::collections::HashMap;

use crate::ast::{Program, Stmt};
use crate::backend::encoder::{emit_section, encode_name, export_kind, section_id, valtype, MODULE_HEADER};
use crate::backend::lower::{Lowerer, DEFAULT_MAX_ITERATIONS};
use crate::backend::runtime::{self, idx, RuntimeFunction, HEAP_PTR_GLOBAL, IMPORT_COUNT, USER_FUNCS_START};
use crate::backend::scope::FunctionTable;
use crate::backend::strings::StringTable;
use crate::error::{CompileError, Pos};

/// One function signature `(params, results)`; deduplicated across the
/// runtime catalogue, user functions and `main` when the type section is
/// assembled, the way a real `wasm-encoder`-style builder would.
type Signature = (Vec<u8>, Vec<u8>);

struct CompiledFunction {
    signature: Signature,
    locals: Vec<(u32, u8)>,
    body: Vec<u8>,
}

/// Knobs that change packaging, never semantics: the memory is pinned to
/// 16 pages and the loop guard to 10,000 iterations by default; embedders
/// that need a smaller sandbox (tests) or a larger one (trusted scripts)
/// can override either without touching lowering logic.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Number of 64 KiB pages backing the exported linear memory.
    pub memory_pages: u32,
    /// Runtime iteration cap compiled into every `while`/`for` loop guard.
    pub max_iterations: i64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            memory_pages: 16,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// The two artifacts a successful compile produces: the module bytes,
/// and the raw string-table blob, useful for tooling and debugging.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub bytes: Vec<u8>,
    pub strings: Vec<u8>,
}

/// Compiles a parsed program into a complete WASM 1.0 binary module using
/// [`CompileOptions::default`].
pub fn compile(program: &Program) -> Result<CompileOutput, CompileError> {
    compile_with_options(program, &CompileOptions::default())
}

/// Compiles a parsed program into a complete WASM 1.0 binary module.
///
/// Top-level `FunctionDecl` statements become WASM functions; every other
/// top-level statement is lowered, in source order, into the body of the
/// exported `main` function.
pub fn compile_with_options(
    program: &Program,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    tracing::trace_span!("compile_module").in_scope(|| compile_inner(program, options))
}

fn compile_inner(program: &Program, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    let mut strings = StringTable::new();
    let functions = register_functions(program)?;

    let mut compiled: Vec<CompiledFunction> = runtime::catalogue()
        .into_iter()
        .map(runtime_to_compiled)
        .collect();

    let mut main_statements = Vec::new();
    for stmt in &program.statements {
        match stmt {
            Stmt::FunctionDecl {
                params, body, ..
            } => {
                compiled.push(compile_function(
                    params,
                    body,
                    &functions,
                    &mut strings,
                    options.max_iterations,
                )?);
            }
            other => main_statements.push(other.clone()),
        }
    }
    debug_assert_eq!(
        compiled.len(),
        (USER_FUNCS_START - IMPORT_COUNT) as usize + functions_declared(program),
        "every registered user function must produce exactly one compiled body"
    );

    compiled.push(compile_function(
        &[],
        &main_statements,
        &functions,
        &mut strings,
        options.max_iterations,
    )?);

    tracing::debug!(
        functions = compiled.len(),
        strings_bytes = strings.data().len(),
        "lowered all functions"
    );

    let bytes = assemble(&compiled, &strings, options.memory_pages);
    Ok(CompileOutput {
        bytes,
        strings: strings.data().to_vec(),
    })
}

fn functions_declared(program: &Program) -> usize {
    program
        .statements
        .iter()
        .filter(|s| matches!(s, Stmt::FunctionDecl { .. }))
        .count()
}

/// Pre-pass populating the call index space for every top-level
/// `FunctionDecl` before any body is lowered, so forward references
/// resolve (see DESIGN.md).
fn register_functions(program: &Program) -> Result<FunctionTable, CompileError> {
    let mut functions = FunctionTable::new();
    let mut next_index = USER_FUNCS_START;
    for stmt in &program.statements {
        if let Stmt::FunctionDecl {
            name, params, pos, ..
        } = stmt
        {
            functions.register(name, next_index, params.len(), *pos)?;
            next_index += 1;
        }
    }
    Ok(functions)
}

fn compile_function(
    params: &[String],
    body: &[Stmt],
    functions: &FunctionTable,
    strings: &mut StringTable,
    max_iterations: i64,
) -> Result<CompiledFunction, CompileError> {
    let param_count = u32::try_from(params.len()).map_err(|_| {
        CompileError::Internal(format!("function has too many parameters: {}", params.len()))
    })?;
    let mut lowerer = Lowerer::new(param_count, functions, strings, max_iterations);
    for (i, name) in params.iter().enumerate() {
        lowerer.scope.bind_param(name, i as u32);
    }
    lowerer.lower_block(body)?;
    let locals_count = lowerer.scope.declared_local_count();
    let body_bytes = lowerer.finish();

    Ok(CompiledFunction {
        signature: (vec![valtype::I32; params.len()], vec![valtype::I32]),
        locals: if locals_count == 0 {
            Vec::new()
        } else {
            vec![(locals_count, valtype::I32)]
        },
        body: body_bytes,
    })
}

fn runtime_to_compiled(rf: RuntimeFunction) -> CompiledFunction {
    CompiledFunction {
        signature: (rf.params, rf.results),
        locals: rf.locals,
        body: rf.body,
    }
}

/// Assembles the section-framed module bytes: type, import, function,
/// memory, global, export, code and data sections, in that order.
fn assemble(functions: &[CompiledFunction], strings: &StringTable, memory_pages: u32) -> Vec<u8> {
    let import_sig: Signature = (vec![valtype::I32, valtype::I32], vec![]);

    let mut type_index_of: HashMap<Signature, u32> = HashMap::new();
    let mut types: Vec<Signature> = Vec::new();
    let mut intern_type = |sig: &Signature, type_index_of: &mut HashMap<Signature, u32>, types: &mut Vec<Signature>| -> u32 {
        if let Some(&idx) = type_index_of.get(sig) {
            return idx;
        }
        let idx = types.len() as u32;
        types.push(sig.clone());
        type_index_of.insert(sig.clone(), idx);
        idx
    };

    let import_type_idx = intern_type(&import_sig, &mut type_index_of, &mut types);
    let function_type_indices: Vec<u32> = functions
        .iter()
        .map(|cf| intern_type(&cf.signature, &mut type_index_of, &mut types))
        .collect();

    // --- Type section ---
    let mut type_body = Vec::new();
    type_body.extend(encode_leb(types.len() as u64));
    for (params, results) in &types {
        type_body.push(0x60); // func type tag
        type_body.extend(encode_leb(params.len() as u64));
        type_body.extend(params);
        type_body.extend(encode_leb(results.len() as u64));
        type_body.extend(results);
    }
    let type_section = emit_section(section_id::TYPE, &type_body);

    // --- Import section: env.print, env.println ---
    let mut import_body = Vec::new();
    import_body.extend(encode_leb(2));
    for name in ["print", "println"] {
        import_body.extend(encode_name("env"));
        import_body.extend(encode_name(name));
        import_body.push(0x00); // func import kind
        import_body.extend(encode_leb(u64::from(import_type_idx)));
    }
    let import_section = emit_section(section_id::IMPORT, &import_body);

    // --- Function section ---
    let mut function_body = Vec::new();
    function_body.extend(encode_leb(function_type_indices.len() as u64));
    for type_idx in &function_type_indices {
        function_body.extend(encode_leb(u64::from(*type_idx)));
    }
    let function_section = emit_section(section_id::FUNCTION, &function_body);

    // --- Memory section: one memory, `memory_pages` initial, no max ---
    let mut memory_body = Vec::new();
    memory_body.extend(encode_leb(1)); // one memory
    memory_body.push(0x00); // flags: no maximum
    memory_body.extend(encode_leb(u64::from(memory_pages)));
    let memory_section = emit_section(section_id::MEMORY, &memory_body);

    // --- Global section: one mutable i32 heap pointer ---
    let mut global_body = Vec::new();
    global_body.extend(encode_leb(1));
    global_body.push(valtype::I32);
    global_body.push(0x01); // mutable
    global_body.push(0x41); // i32.const
    global_body.extend(encode_sleb(i64::from(strings.end_offset())));
    global_body.push(0x0b); // end
    let global_section = emit_section(section_id::GLOBAL, &global_body);

    // --- Export section: main, memory ---
    let main_index = (functions.len() - 1) as u32 + IMPORT_COUNT;
    let mut export_body = Vec::new();
    export_body.extend(encode_leb(2));
    export_body.extend(encode_name("main"));
    export_body.push(export_kind::FUNC);
    export_body.extend(encode_leb(u64::from(main_index)));
    export_body.extend(encode_name("memory"));
    export_body.push(export_kind::MEM);
    export_body.extend(encode_leb(0));
    let export_section = emit_section(section_id::EXPORT, &export_body);

    // --- Code section ---
    let mut code_body = Vec::new();
    code_body.extend(encode_leb(functions.len() as u64));
    for cf in functions {
        let mut func_body = Vec::new();
        func_body.extend(encode_leb(cf.locals.len() as u64));
        for (count, ty) in &cf.locals {
            func_body.extend(encode_leb(u64::from(*count)));
            func_body.push(*ty);
        }
        func_body.extend(&cf.body);
        code_body.extend(encode_leb(func_body.len() as u64));
        code_body.extend(func_body);
    }
    let code_section = emit_section(section_id::CODE, &code_body);

    // --- Data section: the interned string table ---
    let mut data_body = Vec::new();
    data_body.extend(encode_leb(1)); // one active segment
    data_body.push(0x00); // active, memory 0
    data_body.push(0x41); // i32.const
    data_body.extend(encode_sleb(i64::from(crate::backend::strings::STRINGS_BASE)));
    data_body.push(0x0b); // end
    data_body.extend(encode_leb(strings.data().len() as u64));
    data_body.extend(strings.data());
    let data_section = emit_section(section_id::DATA, &data_body);

    let mut out = Vec::new();
    out.extend(MODULE_HEADER);
    out.extend(type_section);
    out.extend(import_section);
    out.extend(function_section);
    out.extend(memory_section);
    out.extend(global_section);
    out.extend(export_section);
    out.extend(code_section);
    out.extend(data_section);
    out
}

fn encode_leb(value: u64) -> Vec<u8> {
    crate::backend::encoder::uleb128(value)
}

fn encode_sleb(value: i64) -> Vec<u8> {
    crate::backend::encoder::sleb128(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend;

    fn compile_src(src: &str) -> Vec<u8> {
        let program = frontend::parse(src).expect("parse");
        compile(&program).expect("compile").bytes
    }

    #[test]
    fn emits_the_wasm_header() {
        let bytes = compile_src("println 1");
        assert_eq!(&bytes[0..8], &MODULE_HEADER);
    }

    #[test]
    fn exports_main_and_memory() {
        let bytes = compile_src("println 1");
        // crude but effective: the export section carries both names as
        // length-prefixed UTF-8, which must appear verbatim in the output.
        let haystack = bytes.as_slice();
        assert!(contains(haystack, b"main"));
        assert!(contains(haystack, b"memory"));
    }

    #[test]
    fn rejects_duplicate_function_names() {
        let program = frontend::parse("func f() ret 1 end\nfunc f() ret 2 end").unwrap();
        assert!(compile(&program).is_err());
    }

    #[test]
    fn rejects_undefined_function_calls() {
        let program = frontend::parse("println g()").unwrap();
        assert!(matches!(
            compile(&program),
            Err(CompileError::UndefinedFunction { .. })
        ));
    }

    #[test]
    fn rejects_arity_mismatch() {
        let program = frontend::parse("func f(a) ret a end\nprintln f(1, 2)").unwrap();
        assert!(matches!(
            compile(&program),
            Err(CompileError::ArityMismatch { .. })
        ));
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }
}
