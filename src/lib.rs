// vmscript: a compiler and bytecode virtual machine for a small
// dynamically-typed scripting language.
//
// The pipeline is lex -> parse -> generate -> execute, and each stage is
// its own module: `lexer` turns source text into tokens, `parser` turns
// tokens into an AST (`ast`), `bytecode` lowers the AST into a tree of
// instruction sequences, and `vm` (together with `value` and `env`)
// executes that tree against an evaluation stack and a lexical scope.
// `compiler` wires the first three stages together and is also what
// `bytecode`'s `using` handling calls back into to splice an imported
// unit's instructions.
pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod env;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod value;
pub mod vm;

