// Runtime values. A closed, tagged union -- there is no static type
// system above this; every opcode that cares about shape checks the
// tag at run time and fails with a RuntimeError if it doesn't match.
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::FunctionDecl;
use crate::env::Scope;
use crate::error::RuntimeError;

pub type Result<T> = core::result::Result<T, RuntimeError>;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<String>),
    Array(Rc<RefCell<Vec<Value>>>),
    // A function carries the declaration it was loaded from and a
    // live, shared handle to the scope it was defined in. Mutations to
    // that scope after the function was defined remain visible inside
    // it -- this is a genuine shared reference, not a snapshot copy.
    FunctionRef(Rc<FunctionDecl>, Scope),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                let rendered: Vec<String> = elements.borrow().iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::FunctionRef(decl, _) => write!(f, "{}", decl.name),
        }
    }
}

// Truthiness used by AND/OR and the IF condition check: only Null and
// Bool(false) are falsy. Every other value, including Number(0.0) and
// an empty array, is truthy.
pub fn is_falsy(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Bool(false))
}

fn mismatch(opcode: &'static str) -> RuntimeError {
    RuntimeError::TypeMismatch { opcode }
}

// Factors out the "match these shapes, else it's a RuntimeError"
// boilerplate shared by every binary numeric/comparison opcode.
macro_rules! operator {
    (bin $name:ident ($opcode:expr) { $( $p:pat => $e:expr ),+ } ) => {
        pub fn $name(a: &Value, b: &Value) -> Result<Value> {
            use Value::*;
            #[allow(unreachable_patterns)]
            match (a, b) {
                $($p => Ok($e)),+ ,
                _ => Err(mismatch($opcode)),
            }
        }
    };
}

operator! { bin add ("ADD") { (Number(a), Number(b)) => Number(a + b) } }

// `x - y` is lowered as `<x> <y> SUB`; the VM pops b (y) then a (x)
// and computes a - b.
operator! { bin sub ("SUB") { (Number(a), Number(b)) => Number(a - b) } }

operator! { bin mul ("MUL") { (Number(a), Number(b)) => Number(a * b) } }

operator! { bin div ("DIV") { (Number(a), Number(b)) => Number(a / b) } }

operator! { bin and ("AND") { (Bool(a), Bool(b)) => Bool(*a && *b) } }

operator! { bin bigger ("BIGGER") { (Number(a), Number(b)) => Bool(a > b) } }
operator! { bin smaller ("SMALLER") { (Number(a), Number(b)) => Bool(a < b) } }
operator! { bin bigger_or_eq ("BIGGER_OR_EQ") { (Number(a), Number(b)) => Bool(a >= b) } }
operator! { bin smaller_or_eq ("SMALLER_OR_EQ") { (Number(a), Number(b)) => Bool(a <= b) } }

// Equality is defined across every value, including mismatched tags:
// the language never raises a type error for `==`/`!=`, it just
// answers `false`.
pub fn lang_eq(a: &Value, b: &Value) -> Value {
    let equal = match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::FunctionRef(x, _), Value::FunctionRef(y, _)) => Rc::ptr_eq(x, y),
        _ => false,
    };
    Value::Bool(equal)
}

pub fn lang_not_eq(a: &Value, b: &Value) -> Value {
    match lang_eq(a, b) {
        Value::Bool(b) => Value::Bool(!b),
        _ => unreachable!(),
    }
}
