//! Decode/assert helpers over emitted WASM module bytes.
//!
//! This crate does not embed a WASM execution engine — instantiating and
//! running the module is an external collaborator's job — so tests can't
//! assert on *program output*. They can and do assert on *module shape*:
//! section presence and order, import/export names, memory limits, the
//! heap-pointer global's initial value, and the raw opcode bytes of each
//! function body. `wasmparser` does the structural decoding; this module
//! only reshapes its `Payload` stream into a flat struct tests can match
//! on.

#![allow(clippy::missing_panics_doc)]

use wasmparser::{Parser, Payload};

use crate::error::CompileError;

#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub module: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub name: String,
    pub kind: wasmparser::ExternalKind,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryLimits {
    pub initial_pages: u32,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DataSegment {
    pub offset: Option<i32>,
    pub bytes: Vec<u8>,
}

/// Flat view over a compiled module's sections: everything a test needs
/// to assert that the module's shape and index space agree with what the
/// back end was supposed to emit.
#[derive(Debug, Clone, Default)]
pub struct DecodedModule {
    pub type_count: usize,
    pub imports: Vec<ImportEntry>,
    /// Type index of every defined function, in declaration order
    /// (runtime helpers then user functions then `main`).
    pub function_type_indices: Vec<u32>,
    pub memory: Option<MemoryLimits>,
    /// One entry per global; only `i32.const` initializers are supported
    /// (the only kind this back end ever emits for the heap pointer).
    pub global_init_values: Vec<i32>,
    pub exports: Vec<ExportEntry>,
    pub data_segments: Vec<DataSegment>,
    /// Raw bytes (locals declarations + instructions) of each function
    /// body, in code-section order.
    pub code_bodies: Vec<Vec<u8>>,
}

/// Validates `bytes` as a well-formed WASM 1.0 module and decodes its
/// sections into a [`DecodedModule`]. Returns `CompileError::Internal` on
/// malformed input — this harness assumes it is only ever pointed at this
/// crate's own output.
pub fn decode(bytes: &[u8]) -> Result<DecodedModule, CompileError> {
    wasmparser::validate(bytes)
        .map_err(|e| CompileError::Internal(format!("invalid WASM module: {e}")))?;

    let mut module = DecodedModule::default();

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload.map_err(|e| CompileError::Internal(format!("parse error: {e}")))?;
        match payload {
            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group =
                        rec_group.map_err(|e| CompileError::Internal(format!("{e}")))?;
                    module.type_count += rec_group.into_types().count();
                }
            }
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.map_err(|e| CompileError::Internal(format!("{e}")))?;
                    module.imports.push(ImportEntry {
                        module: import.module.to_string(),
                        name: import.name.to_string(),
                    });
                }
            }
            Payload::FunctionSection(reader) => {
                for type_idx in reader {
                    let type_idx = type_idx.map_err(|e| CompileError::Internal(format!("{e}")))?;
                    module.function_type_indices.push(type_idx);
                }
            }
            Payload::MemorySection(reader) => {
                if let Some(memory) = reader.into_iter().next() {
                    let mem = memory.map_err(|e| CompileError::Internal(format!("{e}")))?;
                    module.memory = Some(MemoryLimits {
                        initial_pages: mem.initial as u32,
                        max_pages: mem.maximum.map(|m| m as u32),
                    });
                }
            }
            Payload::GlobalSection(reader) => {
                for global in reader {
                    let global = global.map_err(|e| CompileError::Internal(format!("{e}")))?;
                    module
                        .global_init_values
                        .push(eval_const_i32(&global.init_expr)?);
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(|e| CompileError::Internal(format!("{e}")))?;
                    module.exports.push(ExportEntry {
                        name: export.name.to_string(),
                        kind: export.kind,
                        index: export.index,
                    });
                }
            }
            Payload::DataSection(reader) => {
                for data in reader {
                    let data = data.map_err(|e| CompileError::Internal(format!("{e}")))?;
                    let offset = match data.kind {
                        wasmparser::DataKind::Active { offset_expr, .. } => {
                            Some(eval_const_i32(&offset_expr)?)
                        }
                        wasmparser::DataKind::Passive => None,
                    };
                    module.data_segments.push(DataSegment {
                        offset,
                        bytes: data.data.to_vec(),
                    });
                }
            }
            Payload::CodeSectionEntry(body) => {
                let range = body.range();
                module.code_bodies.push(bytes[range].to_vec());
            }
            _ => {}
        }
    }

    Ok(module)
}

fn eval_const_i32(expr: &wasmparser::ConstExpr) -> Result<i32, CompileError> {
    let mut reader = expr.get_operators_reader();
    let op = reader
        .read()
        .map_err(|e| CompileError::Internal(format!("{e}")))?;
    match op {
        wasmparser::Operator::I32Const { value } => Ok(value),
        other => Err(CompileError::Internal(format!(
            "unsupported const expression: {other:?}"
        ))),
    }
}

impl DecodedModule {
    #[must_use]
    pub fn find_export(&self, name: &str) -> Option<&ExportEntry> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Number of imported functions, i.e. the function-index offset at
    /// which defined functions (runtime helpers, then user functions,
    /// then `main`) start.
    #[must_use]
    pub fn imported_func_count(&self) -> u32 {
        self.imports.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile_source, CompileOptions};

    #[test]
    fn decodes_header_and_sections_of_a_trivial_program() {
        let output = compile_source("println \"hi\"").expect("compile");
        let module = decode(&output.bytes).expect("decode");

        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[0].name, "print");
        assert_eq!(module.imports[1].name, "println");

        let memory = module.memory.expect("memory section");
        assert_eq!(memory.initial_pages, CompileOptions::default().memory_pages);
        assert_eq!(memory.max_pages, None);

        assert_eq!(module.global_init_values.len(), 1);
        assert!(module.global_init_values[0] > 0);

        assert!(module.find_export("main").is_some());
        assert!(module.find_export("memory").is_some());
    }

    #[test]
    fn memory_pages_override_is_honoured() {
        let options = CompileOptions {
            memory_pages: 4,
            ..CompileOptions::default()
        };
        let output =
            crate::compile_source_with_options("println 1", &options).expect("compile");
        let module = decode(&output.bytes).expect("decode");
        assert_eq!(module.memory.unwrap().initial_pages, 4);
    }

    #[test]
    fn data_segment_matches_the_strings_metadata() {
        let output = compile_source("println \"abc\"").expect("compile");
        let module = decode(&output.bytes).expect("decode");
        assert_eq!(module.data_segments.len(), 1);
        assert_eq!(module.data_segments[0].bytes, output.strings);
    }

    #[test]
    fn every_function_body_ends_with_the_end_opcode() {
        let output = compile_source("func sq(x) ret x * x end\nprintln sq(4)").expect("compile");
        let module = decode(&output.bytes).expect("decode");
        for body in &module.code_bodies {
            assert_eq!(*body.last().unwrap(), 0x0b, "function body missing `end`");
        }
    }
}
