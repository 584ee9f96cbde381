use std::fs;
use std::process;

use clap::Parser;
use log::error;

use vmscript::compiler;
use vmscript::error::{AppError, CompileError};
use vmscript::vm::Vm;

/// Compile and run a vmscript source file.
#[derive(Parser)]
#[command(name = "vmscript", about = "Compiler and bytecode VM for a small dynamically-typed scripting language")]
struct Cli {
    /// Source file to compile and run.
    path: String,

    /// Emit debug/trace logging for each pipeline stage (tokens, AST, bytecode, opcodes).
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    process::exit(run(&cli.path));
}

fn run(path: &str) -> i32 {
    match run_inner(path) {
        Ok(()) => 0,
        Err(err) => {
            error!("{}", err);
            eprintln!("{}", err);
            1
        }
    }
}

fn run_inner(path: &str) -> Result<(), AppError> {
    let source = fs::read_to_string(path).map_err(|e| AppError::Compile(CompileError::Io(e)))?;
    let program = compiler::compile(&source)?;

    let mut vm = Vm::new();
    let mut out = std::io::stdout();
    vm.run_program(&program, &mut out)?;
    Ok(())
}
