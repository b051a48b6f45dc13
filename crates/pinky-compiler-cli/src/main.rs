use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use pinky_compiler::{CompileOptions, PinkyError};

const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pinky")]
#[command(about = "Pinky language compiler: compiles Pinky source to a WASM 1.0 module")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a `.pinky` source file into a `.wasm` module.
    Compile {
        #[arg(help = "Input .pinky source file")]
        input: PathBuf,

        #[arg(short, long, help = "Output .wasm file (defaults to the input path with a .wasm extension)")]
        output: Option<PathBuf>,

        #[arg(long, help = "Also write the raw interned string table to this file")]
        strings_out: Option<PathBuf>,

        #[arg(long, help = "Print the parsed AST instead of compiling")]
        emit_ast: bool,

        #[arg(long, help = "Report errors as JSON instead of human-readable text")]
        json: bool,

        #[arg(long, help = "Number of 64 KiB pages backing the module's linear memory")]
        memory_pages: Option<u32>,

        #[arg(long, help = "Iteration cap compiled into every while/for loop guard")]
        max_iterations: Option<i64>,
    },
    /// Scaffold a starter `.pinky` file.
    Init {
        #[arg(help = "Path of the .pinky file to create")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            strings_out,
            emit_ast,
            json,
            memory_pages,
            max_iterations,
        } => compile(CompileArgs {
            input,
            output,
            strings_out,
            emit_ast,
            json,
            memory_pages,
            max_iterations,
        }),
        Commands::Init { path } => init(&path),
    }
}

struct CompileArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    strings_out: Option<PathBuf>,
    emit_ast: bool,
    json: bool,
    memory_pages: Option<u32>,
    max_iterations: Option<i64>,
}

fn compile(args: CompileArgs) -> Result<()> {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    if args.emit_ast {
        let program = pinky_compiler::frontend::parse(&source);
        return match program {
            Ok(program) => {
                println!("{program:#?}");
                Ok(())
            }
            Err(err) => report_error(&err, args.json),
        };
    }

    let mut options = CompileOptions::default();
    if let Some(pages) = args.memory_pages {
        options.memory_pages = pages;
    }
    if let Some(max_iterations) = args.max_iterations {
        options.max_iterations = max_iterations;
    }

    let result = pinky_compiler::compile_source_with_options(&source, &options);
    let output = match result {
        Ok(output) => output,
        Err(err) => return report_error(&err, args.json),
    };

    let out_path = args.output.unwrap_or_else(|| with_extension(&args.input, "wasm"));
    fs::write(&out_path, &output.bytes)
        .with_context(|| format!("failed to write output to {}", out_path.display()))?;

    if let Some(strings_path) = &args.strings_out {
        fs::write(strings_path, &output.strings)
            .with_context(|| format!("failed to write strings to {}", strings_path.display()))?;
    }

    println!(
        "compiled {} -> {} ({} bytes, pinky-compiler {})",
        args.input.display(),
        out_path.display(),
        output.bytes.len(),
        COMPILER_VERSION
    );

    Ok(())
}

fn init(path: &Path) -> Result<()> {
    pinky_compiler::init(path)
        .with_context(|| format!("failed to write starter program to {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn with_extension(input: &Path, ext: &str) -> PathBuf {
    let mut out = input.to_path_buf();
    out.set_extension(ext);
    out
}

fn report_error(err: &PinkyError, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "error": err.to_string(),
        });
        eprintln!("{value}");
    } else {
        eprintln!("error: {err}");
    }
    anyhow::bail!("compilation failed");
}
