// The error taxonomy. Lexing never fails -- unrecognized characters
// are silently dropped -- so there is no LexError type here. Parsing,
// compiling, and running a program can each fail, and none of those
// failures are caught anywhere inside the language itself; they all
// bubble straight up to whatever embeds this crate.
use thiserror::Error;

use crate::lexer::TokenKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {found:?} at position {position}, expected one of {expected:?}")]
    UnexpectedToken { expected: Vec<TokenKind>, found: TokenKind, position: usize },

    #[error("unexpected end of input, expected one of {expected:?}")]
    UnexpectedEof { expected: Vec<TokenKind> },
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("could not read imported module: {0}")]
    Io(#[from] std::io::Error),

    #[error("argument in function define statement must be an identifier")]
    NonIdentifierParameter,

    #[error("unknown object to call")]
    UncallableExpression,

    #[error("using operand must be a string literal file path")]
    InvalidImportOperand,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("type mismatch in {opcode}")]
    TypeMismatch { opcode: &'static str },

    #[error("undefined name: {0}")]
    UnknownName(String),

    #[error("undefined function: {0}")]
    UnknownFunction(String),

    #[error("invalid operand for {opcode}")]
    BadOperand { opcode: &'static str },

    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    // A named terminal state, kept even though nothing in this
    // language currently triggers it besides the program running off
    // the end of its top-level block.
    #[error("halted")]
    Halted,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
