// A tagged-value stack machine for the language this crate compiles.
//
// *Execution model*
//
// A program is a tree of instruction sequences, not a flat stream:
// `if` and function bodies carry their own nested `Vec<Instruction>`
// as operands, so there is no jump/offset addressing anywhere in this
// VM. Running a program means recursing into those nested sequences.
//
// One evaluation stack is shared across every recursive `run` call --
// a function call or an `if` branch does not get a fresh stack, only
// a fresh scope.
//
// *Scoping*
//
// A scope has no parent pointer (see env.rs). At the start of `run`,
// every binding from the calling scope that isn't already shadowed is
// copied into the new scope once. `if` additionally writes back:
// afterward, any name that existed in the calling scope before entry
// gets its value copied back from the child, while names the child
// introduced for the first time are dropped along with the child
// scope.
//
// *Validity*
//
// Every runtime error is represented by `RuntimeError` and is fatal --
// nothing in the executed program can catch it.
use std::rc::Rc;
use std::time::Duration;

use log::trace;

use crate::bytecode::{Instruction, Opcode, Operand};
use crate::env::{self, Scope};
use crate::error::RuntimeError;
use crate::value::{self, Value};

pub type Result<T> = core::result::Result<T, RuntimeError>;

pub trait Output {
    fn emit(&mut self, line: &str);
}

impl Output for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl Output for std::io::Stdout {
    fn emit(&mut self, line: &str) {
        println!("{}", line);
    }
}

#[derive(Debug, PartialEq)]
enum ControlFlow {
    Completed,
    Returned(Value),
}

pub struct Vm {
    stack: Vec<Value>,
}

impl Vm {
    pub fn new() -> Vm {
        Vm { stack: Vec::new() }
    }

    // Compiles and runs a whole program from its top-level
    // instruction sequence, in a fresh, parentless root scope.
    pub fn run_program(&mut self, program: &[Instruction], out: &mut impl Output) -> Result<()> {
        let root = env::new_scope();
        self.run(program, &root, &root, out)?;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    // Pops the two operands of a binary opcode in push order: the
    // right-hand operand was pushed last, so it's popped first.
    fn pop_binary(&mut self) -> Result<(Value, Value)> {
        let right = self.pop()?;
        let left = self.pop()?;
        Ok((left, right))
    }

    fn run(&mut self, body: &[Instruction], scope: &Scope, parent: &Scope, out: &mut impl Output) -> Result<ControlFlow> {
        env::merge_parent(scope, parent);

        for instruction in body {
            trace!("exec {:?}", instruction.op);

            match instruction.op {
                Opcode::Push => {
                    let operand = instruction.operand.as_ref().ok_or(RuntimeError::BadOperand { opcode: "PUSH" })?;
                    self.push(value_from_operand(operand));
                }

                Opcode::GetGlobal => {
                    let name = operand_name(instruction, "GETGLOBAL")?;
                    let value = env::get(scope, name).ok_or_else(|| RuntimeError::UnknownName(name.to_string()))?;
                    self.push(value);
                }

                Opcode::SetGlobal => {
                    let name = operand_name(instruction, "SETGLOBAL")?;
                    let value = self.pop()?;
                    env::set(scope, name, value);
                }

                Opcode::Add => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::add(&a, &b)?);
                }
                Opcode::Sub => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::sub(&a, &b)?);
                }
                Opcode::Mul => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::mul(&a, &b)?);
                }
                Opcode::Div => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::div(&a, &b)?);
                }

                Opcode::Eq => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::lang_eq(&a, &b));
                }
                Opcode::NotEq => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::lang_not_eq(&a, &b));
                }
                Opcode::Bigger => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::bigger(&a, &b)?);
                }
                Opcode::Smaller => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::smaller(&a, &b)?);
                }
                Opcode::BiggerOrEq => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::bigger_or_eq(&a, &b)?);
                }
                Opcode::SmallerOrEq => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::smaller_or_eq(&a, &b)?);
                }

                // Both sides are always evaluated (no short-circuit
                // skipping of side effects). AND requires both
                // operands to already be Bool and fails otherwise; OR
                // never fails and instead selects between the two
                // already-computed values based on the left operand's
                // truthiness.
                Opcode::And => {
                    let (a, b) = self.pop_binary()?;
                    self.push(value::and(&a, &b)?);
                }
                Opcode::Or => {
                    let (a, b) = self.pop_binary()?;
                    self.push(if value::is_falsy(&a) { b } else { a });
                }

                Opcode::LoadFunc => {
                    let operand = instruction.operand.as_ref().ok_or(RuntimeError::BadOperand { opcode: "LOADFUNC" })?;
                    if let Operand::Function(decl) = operand {
                        env::set(scope, &decl.name, Value::FunctionRef(decl.clone(), scope.clone()));
                    } else {
                        return Err(RuntimeError::BadOperand { opcode: "LOADFUNC" });
                    }
                }

                Opcode::Call => {
                    let name = operand_name(instruction, "CALL")?;
                    let callee = env::get(scope, name).ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;

                    let (decl, closure_scope) = match callee {
                        Value::FunctionRef(decl, closure_scope) => (decl, closure_scope),
                        _ => return Err(RuntimeError::UnknownFunction(name.to_string())),
                    };

                    let call_scope = env::new_scope();
                    for param in decl.params.iter() {
                        let arg = self.pop()?;
                        env::set(&call_scope, param, arg);
                    }

                    match self.run(&decl.body, &call_scope, &closure_scope, out)? {
                        ControlFlow::Returned(value) => self.push(value),
                        ControlFlow::Completed => self.push(Value::Null),
                    }
                }

                Opcode::Return => {
                    let value = self.pop()?;
                    return Ok(ControlFlow::Returned(value));
                }

                Opcode::Delay => {
                    let value = self.pop()?;
                    match value {
                        Value::Number(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                            std::thread::sleep(Duration::from_secs_f64(seconds));
                        }
                        _ => return Err(RuntimeError::TypeMismatch { opcode: "DELAY" }),
                    }
                }

                Opcode::Output => {
                    let value = self.pop()?;
                    out.emit(&format!("OUTPUT: {}", value));
                }

                Opcode::If => {
                    let operand = instruction.operand.as_ref().ok_or(RuntimeError::BadOperand { opcode: "IF" })?;
                    let branches = match operand {
                        Operand::If(branches) => branches,
                        _ => return Err(RuntimeError::BadOperand { opcode: "IF" }),
                    };

                    let condition = self.pop()?;
                    let taken = match condition {
                        Value::Bool(true) => Some(&branches.then_body),
                        Value::Bool(false) => branches.else_body.as_ref(),
                        _ => return Err(RuntimeError::TypeMismatch { opcode: "IF" }),
                    };

                    if let Some(body) = taken {
                        if !body.is_empty() {
                            let child_scope = env::new_scope();
                            let existing = env::existing_names(scope);

                            let result = self.run(body, &child_scope, scope, out)?;

                            env::write_back(scope, &child_scope, &existing);

                            if let ControlFlow::Returned(_) = result {
                                return Ok(result);
                            }
                        }
                    }
                }

                Opcode::Indexation => {
                    let index = self.pop()?;
                    let container = self.pop()?;
                    self.push(self.index(&container, &index)?);
                }

                Opcode::SetIndex => {
                    let index = self.pop()?;
                    let value = self.pop()?;
                    let container = self.pop()?;
                    self.set_index(&container, &index, value)?;
                }
            }
        }

        Ok(ControlFlow::Completed)
    }

    fn index(&self, container: &Value, index: &Value) -> Result<Value> {
        match (container, index) {
            (Value::Array(elements), Value::Number(n)) => {
                let elements = elements.borrow();
                let i = *n as i64;
                if i < 0 || i as usize >= elements.len() {
                    return Err(RuntimeError::IndexOutOfBounds { index: i, len: elements.len() });
                }
                Ok(elements[i as usize].clone())
            }
            _ => Err(RuntimeError::TypeMismatch { opcode: "INDEXATION" }),
        }
    }

    fn set_index(&self, container: &Value, index: &Value, value: Value) -> Result<()> {
        match (container, index) {
            (Value::Array(elements), Value::Number(n)) => {
                let mut elements = elements.borrow_mut();
                let i = *n as i64;
                if i < 0 || i as usize >= elements.len() {
                    return Err(RuntimeError::IndexOutOfBounds { index: i, len: elements.len() });
                }
                elements[i as usize] = value;
                Ok(())
            }
            _ => Err(RuntimeError::TypeMismatch { opcode: "SETINDEX" }),
        }
    }
}

fn operand_name<'a>(instruction: &'a Instruction, opcode: &'static str) -> Result<&'a str> {
    match &instruction.operand {
        Some(Operand::Str(name)) => Ok(name.as_str()),
        _ => Err(RuntimeError::BadOperand { opcode }),
    }
}

fn value_from_operand(operand: &Operand) -> Value {
    match operand {
        Operand::Number(n) => Value::Number(*n),
        Operand::Str(s) => Value::Str(s.clone()),
        Operand::Bool(b) => Value::Bool(*b),
        Operand::Null => Value::Null,
        Operand::Array(elements) => {
            let values: Vec<Value> = elements.iter().map(value_from_operand).collect();
            Value::Array(Rc::new(std::cell::RefCell::new(values)))
        }
        // Neither of these is ever the operand of a PUSH instruction;
        // LOADFUNC and IF handle their own operand shapes directly.
        Operand::Function(_) | Operand::If(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    fn run(source: &str) -> Vec<String> {
        let program = compile(source).unwrap();
        let mut vm = Vm::new();
        let mut out: Vec<String> = Vec::new();
        vm.run_program(&program, &mut out).unwrap();
        out
    }

    fn run_err(source: &str) -> RuntimeError {
        let program = compile(source).unwrap();
        let mut vm = Vm::new();
        let mut out: Vec<String> = Vec::new();
        vm.run_program(&program, &mut out).unwrap_err()
    }

    #[test]
    fn test_non_precedence_arithmetic() {
        assert_eq!(run("x := 2 + 3 * 4; output x"), vec!["OUTPUT: 14"]);
    }

    #[test]
    fn test_subtraction_direction() {
        assert_eq!(run("x := 10 - 3; output x"), vec!["OUTPUT: 7"]);
    }

    #[test]
    fn test_if_does_not_leak_new_bindings() {
        let err = run_err("a := 0; if true: b := 5 end; output b");
        assert!(matches!(err, RuntimeError::UnknownName(name) if name == "b"));
    }

    #[test]
    fn test_if_writes_back_existing_binding() {
        assert_eq!(run("a := 0; if true: a := 5 end; output a"), vec!["OUTPUT: 5"]);
    }

    #[test]
    fn test_function_call_and_closure() {
        let out = run("fn add(a, b): return a + b end; output add(2, 5)");
        assert_eq!(out, vec!["OUTPUT: 7"]);
    }

    #[test]
    fn test_array_index_and_setindex() {
        let out = run("a := [1, 2, 3]; a[1] := 9; output a[1]");
        assert_eq!(out, vec!["OUTPUT: 9"]);
    }

    #[test]
    fn test_or_returns_left_when_truthy() {
        assert_eq!(run("output 1 ? 2"), vec!["OUTPUT: 1"]);
    }

    #[test]
    fn test_or_returns_right_when_left_falsy() {
        assert_eq!(run("output null ? 2"), vec!["OUTPUT: 2"]);
    }

    #[test]
    fn test_equality_across_mismatched_tags_is_false_not_error() {
        assert_eq!(run("output 1 == \"1\""), vec!["OUTPUT: false"]);
    }

    #[test]
    fn test_delay_rejects_non_finite_duration_instead_of_panicking() {
        // 1 / 0 is a Number(f64::INFINITY) in this language, not a
        // compile-time or divide-by-zero error -- DELAY must reject it
        // as a RuntimeError rather than handing it to
        // Duration::from_secs_f64, which panics on non-finite input.
        let err = run_err("delay (1 / 0)");
        assert!(matches!(err, RuntimeError::TypeMismatch { opcode: "DELAY" }));
    }
}
