// The bytecode generator: walks the AST and emits a flat `Vec<Instruction>`
// for the enclosing block. There is no flat jump/offset addressing --
// `if` and function bodies carry their own nested instruction vectors
// as typed operands, so the VM recurses into them rather than jumping
// around a single instruction stream.
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use crate::ast::{AstNode, BinOp, CondOp, Node, UnOp};
use crate::error::CompileError;
use crate::lexer::TokenKind;

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Number(f64),
    Str(Rc<String>),
    Bool(bool),
    Null,
    Array(Rc<Vec<Operand>>),
    Function(Rc<FunctionDecl>),
    If(Rc<IfBranches>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Instruction>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfBranches {
    pub then_body: Vec<Instruction>,
    pub else_body: Option<Vec<Instruction>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    Push,
    GetGlobal,
    SetGlobal,
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Bigger,
    Smaller,
    BiggerOrEq,
    SmallerOrEq,
    And,
    Or,
    LoadFunc,
    Call,
    Return,
    Delay,
    Output,
    If,
    Indexation,
    SetIndex,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub op: Opcode,
    pub operand: Option<Operand>,
}

impl Instruction {
    fn bare(op: Opcode) -> Instruction {
        Instruction { op, operand: None }
    }

    fn with(op: Opcode, operand: Operand) -> Instruction {
        Instruction { op, operand: Some(operand) }
    }
}

// Generates bytecode for one block's worth of statements,
// accumulating into `bytecode`. `using` splices imported instructions
// into the front of *this* accumulator, not the top-level program's --
// each nested block gets its own generator pass.
struct Generator {
    bytecode: Vec<Instruction>,
    array_memo: HashMap<usize, Rc<Vec<Operand>>>,
}

impl Generator {
    fn new() -> Generator {
        Generator { bytecode: Vec::new(), array_memo: HashMap::new() }
    }

    fn generate_block(&mut self, stmts: &[Node]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.visit(stmt)?;
        }
        Ok(())
    }

    fn operand_from(&mut self, node: &Node) -> Result<Operand, CompileError> {
        match &**node {
            AstNode::Identifier(name) => Ok(Operand::Str(Rc::new(name.clone()))),
            AstNode::Literal(token) => match token.kind {
                TokenKind::Number => Ok(Operand::Number(token.text.parse().unwrap_or(0.0))),
                TokenKind::Str => Ok(Operand::Str(Rc::new(token.text.clone()))),
                TokenKind::True => Ok(Operand::Bool(true)),
                TokenKind::False => Ok(Operand::Bool(false)),
                TokenKind::Null => Ok(Operand::Null),
                _ => Ok(Operand::Null),
            },
            AstNode::Array(elements) => {
                let key = Rc::as_ptr(node) as usize;
                if let Some(existing) = self.array_memo.get(&key) {
                    return Ok(Operand::Array(existing.clone()));
                }

                let mut built = Vec::with_capacity(elements.len());
                for element in elements {
                    built.push(self.operand_from(element)?);
                }
                let shared = Rc::new(built);
                self.array_memo.insert(key, shared.clone());
                Ok(Operand::Array(shared))
            }
            _ => Ok(Operand::Null),
        }
    }

    fn visit(&mut self, node: &Node) -> Result<(), CompileError> {
        match &**node {
            AstNode::Block(stmts) => self.generate_block(stmts),

            AstNode::BinaryOperation { left, right, op } => {
                self.visit(left)?;
                self.visit(right)?;
                let opcode = match op {
                    BinOp::Add => Opcode::Add,
                    BinOp::Sub => Opcode::Sub,
                    BinOp::Mul => Opcode::Mul,
                    BinOp::Div => Opcode::Div,
                };
                self.bytecode.push(Instruction::bare(opcode));
                Ok(())
            }

            AstNode::Condition { left, right, op } => {
                self.visit(left)?;
                self.visit(right)?;
                let opcode = match op {
                    CondOp::Eq => Opcode::Eq,
                    CondOp::NotEq => Opcode::NotEq,
                    CondOp::Bigger => Opcode::Bigger,
                    CondOp::Smaller => Opcode::Smaller,
                    CondOp::BiggerOrEq => Opcode::BiggerOrEq,
                    CondOp::SmallerOrEq => Opcode::SmallerOrEq,
                    CondOp::And => Opcode::And,
                    CondOp::Or => Opcode::Or,
                };
                self.bytecode.push(Instruction::bare(opcode));
                Ok(())
            }

            AstNode::Assignment { target, value } => match &**target {
                AstNode::Identifier(name) => {
                    self.visit(value)?;
                    self.bytecode.push(Instruction::with(
                        Opcode::SetGlobal,
                        Operand::Str(Rc::new(name.clone())),
                    ));
                    Ok(())
                }
                AstNode::Indexation { container, index } => {
                    self.visit(container)?;
                    self.visit(value)?;
                    self.visit(index)?;
                    self.bytecode.push(Instruction::bare(Opcode::SetIndex));
                    Ok(())
                }
                _ => Err(CompileError::UncallableExpression),
            },

            AstNode::Literal(_) => {
                let operand = self.operand_from(node)?;
                self.bytecode.push(Instruction::with(Opcode::Push, operand));
                Ok(())
            }

            AstNode::Array(_) => {
                let operand = self.operand_from(node)?;
                self.bytecode.push(Instruction::with(Opcode::Push, operand));
                Ok(())
            }

            AstNode::IfStatement { condition, then_body, else_body } => {
                self.visit(condition)?;

                let mut then_gen = Generator::new();
                then_gen.visit(then_body)?;

                let else_bytecode = match else_body {
                    Some(body) => {
                        let mut else_gen = Generator::new();
                        else_gen.visit(body)?;
                        Some(else_gen.bytecode)
                    }
                    None => None,
                };

                self.bytecode.push(Instruction::with(
                    Opcode::If,
                    Operand::If(Rc::new(IfBranches { then_body: then_gen.bytecode, else_body: else_bytecode })),
                ));
                Ok(())
            }

            AstNode::UnaryOperation { op: UnOp::Using, operand } => {
                let path = match &**operand {
                    AstNode::Literal(token) if token.kind == TokenKind::Str => token.text.clone(),
                    _ => return Err(CompileError::InvalidImportOperand),
                };

                let source = fs::read_to_string(&path)?;
                let imported = crate::compiler::compile(&source)?;

                for (i, instruction) in imported.into_iter().enumerate() {
                    self.bytecode.insert(i, instruction);
                }
                Ok(())
            }

            AstNode::UnaryOperation { op, operand } => {
                self.visit(operand)?;
                let opcode = match op {
                    UnOp::Return => Opcode::Return,
                    UnOp::Delay => Opcode::Delay,
                    UnOp::Output => Opcode::Output,
                    UnOp::Using => unreachable!(),
                };
                self.bytecode.push(Instruction::bare(opcode));
                Ok(())
            }

            AstNode::Identifier(name) => {
                self.bytecode.push(Instruction::with(Opcode::GetGlobal, Operand::Str(Rc::new(name.clone()))));
                Ok(())
            }

            AstNode::Parenthesized(inner) => self.visit(inner),

            AstNode::FnDefine { name, args, body } => {
                let params = match &**args {
                    AstNode::Args(nodes) => {
                        let mut names = Vec::with_capacity(nodes.len());
                        for arg in nodes {
                            match &**arg {
                                AstNode::Identifier(id) => names.push(id.clone()),
                                _ => return Err(CompileError::NonIdentifierParameter),
                            }
                        }
                        names
                    }
                    _ => Vec::new(),
                };

                let mut body_gen = Generator::new();
                body_gen.visit(body)?;

                self.bytecode.push(Instruction::with(
                    Opcode::LoadFunc,
                    Operand::Function(Rc::new(FunctionDecl { name: name.clone(), params, body: body_gen.bytecode })),
                ));
                Ok(())
            }

            AstNode::Call { callee, args } => {
                let mut arg_nodes: Vec<Node> = match &**args {
                    AstNode::Args(nodes) => nodes.clone(),
                    _ => Vec::new(),
                };
                arg_nodes.reverse();

                for arg in &arg_nodes {
                    self.visit(arg)?;
                }

                // The callee itself is never lowered -- only its name
                // is resolved. A bare function-define expression used
                // directly as a callee is not separately registered
                // here; a prior statement must have already loaded it.
                let name = match &**callee {
                    AstNode::Identifier(id) => id.clone(),
                    AstNode::FnDefine { name, .. } => name.clone(),
                    _ => return Err(CompileError::UncallableExpression),
                };

                self.bytecode.push(Instruction::with(Opcode::Call, Operand::Str(Rc::new(name))));
                Ok(())
            }

            AstNode::Indexation { container, index } => {
                self.visit(container)?;
                self.visit(index)?;
                self.bytecode.push(Instruction::bare(Opcode::Indexation));
                Ok(())
            }

            AstNode::Args(_) => Ok(()),
        }
    }
}

pub fn generate(root: &Node) -> Result<Vec<Instruction>, CompileError> {
    let mut gen = Generator::new();
    gen.visit(root)?;
    Ok(gen.bytecode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn gen(source: &str) -> Vec<Instruction> {
        let ast = parse(lex(source)).unwrap();
        generate(&ast).unwrap()
    }

    #[test]
    fn test_non_precedence_lowering_order() {
        // 2 + 3 * 4 parses as Add(2, Mul(3,4)); lowering pushes the
        // left literal, then the whole right sub-tree, then ADD.
        let code = gen("2 + 3 * 4");
        assert_eq!(
            code.iter().map(|i| i.op).collect::<Vec<_>>(),
            vec![Opcode::Push, Opcode::Push, Opcode::Push, Opcode::Mul, Opcode::Add]
        );
    }

    #[test]
    fn test_assignment_emits_setglobal() {
        let code = gen("x := 5");
        assert_eq!(code.last().unwrap().op, Opcode::SetGlobal);
    }

    #[test]
    fn test_call_reverses_args() {
        let code = gen("f(1, 2)");
        // args are lowered in reverse: push 2, push 1, then CALL
        match (&code[0].operand, &code[1].operand) {
            (Some(Operand::Number(a)), Some(Operand::Number(b))) => {
                assert_eq!(*a, 2.0);
                assert_eq!(*b, 1.0);
            }
            other => panic!("unexpected operands: {:?}", other),
        }
        assert_eq!(code.last().unwrap().op, Opcode::Call);
    }

    #[test]
    fn test_indexation_as_statement_leaves_instruction_only() {
        let code = gen("a[0]");
        assert_eq!(code.last().unwrap().op, Opcode::Indexation);
    }

    #[test]
    fn test_fn_define_rejects_non_identifier_params() {
        // A literal in the parameter list is not an identifier.
        let ast = parse(lex("fn f(1): return 1 end")).unwrap();
        assert!(generate(&ast).is_err());
    }
}
