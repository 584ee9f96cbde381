// The compiler façade: lex -> parse -> generate, the single entry point
// both `main.rs` and `bytecode.rs`'s own `using` handler call through.
//
// There is no module cache here. Compiling the same path twice -- whether
// because the top-level program happens to import it twice, or because two
// different imports both transitively import it -- runs the whole pipeline
// twice and produces two independent instruction vectors.
use log::debug;

use crate::bytecode::{self, Instruction};
use crate::error::CompileError;
use crate::lexer;
use crate::parser;

pub fn compile(source: &str) -> Result<Vec<Instruction>, CompileError> {
    let tokens = lexer::lex(source);
    debug!("lexed {} tokens", tokens.len());

    let ast = parser::parse(tokens)?;
    debug!("parsed AST: {:?}", ast);

    let program = bytecode::generate(&ast)?;
    debug!("generated {} instructions", program.len());

    Ok(program)
}
