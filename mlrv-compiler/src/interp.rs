//! Tree-walking evaluator — the reference semantics the backend is tested
//! against.
//!
//! `and`/`or` short-circuit and division truncates toward zero, exactly as
//! the compiled programs behave.

use crate::ast::Exp;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Value {
    /// The machine encoding of this value: booleans are 1/0.
    pub fn as_word(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Bool(true) => 1,
            Value::Bool(false) => 0,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: &'static str,
        expected: &'static str,
        found: Value,
    },
}

pub type Env = HashMap<String, Value>;

/// Evaluate an expression under an environment of bound variables.
pub fn eval(exp: &Exp, env: &Env) -> Result<Value, EvalError> {
    match exp {
        Exp::Num(n) => Ok(Value::Int(*n)),
        Exp::Bln(b) => Ok(Value::Bool(*b)),

        Exp::Var(name) => env
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),

        Exp::Add(l, r) => {
            let (a, b) = ints(l, r, env, "'+' operand")?;
            Ok(Value::Int(a + b))
        }
        Exp::Sub(l, r) => {
            let (a, b) = ints(l, r, env, "'-' operand")?;
            Ok(Value::Int(a - b))
        }
        Exp::Mul(l, r) => {
            let (a, b) = ints(l, r, env, "'*' operand")?;
            Ok(Value::Int(a * b))
        }
        Exp::Div(l, r) => {
            let (a, b) = ints(l, r, env, "'/' operand")?;
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Int(a / b))
        }

        Exp::Eql(l, r) => {
            let (a, b) = ints(l, r, env, "'=' operand")?;
            Ok(Value::Bool(a == b))
        }
        Exp::Leq(l, r) => {
            let (a, b) = ints(l, r, env, "'<=' operand")?;
            Ok(Value::Bool(a <= b))
        }
        Exp::Lth(l, r) => {
            let (a, b) = ints(l, r, env, "'<' operand")?;
            Ok(Value::Bool(a < b))
        }

        Exp::And(l, r) => {
            // Short-circuit: the right operand only runs when the left is true.
            if !bool_of(l, env, "'and' operand")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(bool_of(r, env, "'and' operand")?))
        }
        Exp::Or(l, r) => {
            if bool_of(l, env, "'or' operand")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(bool_of(r, env, "'or' operand")?))
        }

        Exp::Neg(e) => {
            let n = int_of(e, env, "'~' operand")?;
            Ok(Value::Int(-n))
        }
        Exp::Not(e) => {
            let b = bool_of(e, env, "'not' operand")?;
            Ok(Value::Bool(!b))
        }

        Exp::Let(name, def, body) => {
            let bound = eval(def, env)?;
            let mut inner = env.clone();
            inner.insert(name.clone(), bound);
            eval(body, &inner)
        }

        Exp::IfThenElse(cond, e0, e1) => {
            if bool_of(cond, env, "if condition")? {
                eval(e0, env)
            } else {
                eval(e1, env)
            }
        }
    }
}

fn int_of(exp: &Exp, env: &Env, context: &'static str) -> Result<i64, EvalError> {
    match eval(exp, env)? {
        Value::Int(n) => Ok(n),
        found => Err(EvalError::TypeMismatch {
            context,
            expected: "int",
            found,
        }),
    }
}

fn bool_of(exp: &Exp, env: &Env, context: &'static str) -> Result<bool, EvalError> {
    match eval(exp, env)? {
        Value::Bool(b) => Ok(b),
        found => Err(EvalError::TypeMismatch {
            context,
            expected: "bool",
            found,
        }),
    }
}

fn ints(l: &Exp, r: &Exp, env: &Env, context: &'static str) -> Result<(i64, i64), EvalError> {
    // Left before right; the order is part of the language's semantics.
    let a = int_of(l, env, context)?;
    let b = int_of(r, env, context)?;
    Ok((a, b))
}
