//! Bottom-up type checking over the two base types.
//!
//! The environment is threaded by value: each `let` body is checked in a
//! clone of the enclosing environment extended with the bound name, so
//! shadowing falls out naturally and no state outlives a call.

use crate::ast::Exp;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A type of the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Int,
    Bool,
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Bool => write!(f, "bool"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("{context}: expected {expected}, found {found}")]
    Mismatch {
        context: &'static str,
        expected: Ty,
        found: Ty,
    },

    #[error("if branches disagree: then has type {then_ty}, else has type {else_ty}")]
    BranchMismatch { then_ty: Ty, else_ty: Ty },
}

pub type TypeEnv = HashMap<String, Ty>;

/// Type-check an expression under an environment of bound variables.
pub fn check(exp: &Exp, env: &TypeEnv) -> Result<Ty, TypeError> {
    match exp {
        Exp::Num(_) => Ok(Ty::Int),
        Exp::Bln(_) => Ok(Ty::Bool),

        Exp::Var(name) => env
            .get(name)
            .copied()
            .ok_or_else(|| TypeError::UndefinedVariable(name.clone())),

        Exp::Add(l, r) => arith(l, r, env, "'+' operand"),
        Exp::Sub(l, r) => arith(l, r, env, "'-' operand"),
        Exp::Mul(l, r) => arith(l, r, env, "'*' operand"),
        Exp::Div(l, r) => arith(l, r, env, "'/' operand"),

        Exp::Eql(l, r) => {
            expect(l, env, Ty::Int, "'=' operand")?;
            expect(r, env, Ty::Int, "'=' operand")?;
            Ok(Ty::Bool)
        }
        Exp::Leq(l, r) => {
            expect(l, env, Ty::Int, "'<=' operand")?;
            expect(r, env, Ty::Int, "'<=' operand")?;
            Ok(Ty::Bool)
        }
        Exp::Lth(l, r) => {
            expect(l, env, Ty::Int, "'<' operand")?;
            expect(r, env, Ty::Int, "'<' operand")?;
            Ok(Ty::Bool)
        }

        Exp::And(l, r) => {
            expect(l, env, Ty::Bool, "'and' operand")?;
            expect(r, env, Ty::Bool, "'and' operand")?;
            Ok(Ty::Bool)
        }
        Exp::Or(l, r) => {
            expect(l, env, Ty::Bool, "'or' operand")?;
            expect(r, env, Ty::Bool, "'or' operand")?;
            Ok(Ty::Bool)
        }

        Exp::Neg(e) => {
            expect(e, env, Ty::Int, "'~' operand")?;
            Ok(Ty::Int)
        }
        Exp::Not(e) => {
            expect(e, env, Ty::Bool, "'not' operand")?;
            Ok(Ty::Bool)
        }

        Exp::Let(name, def, body) => {
            let def_ty = check(def, env)?;
            let mut inner = env.clone();
            inner.insert(name.clone(), def_ty);
            check(body, &inner)
        }

        Exp::IfThenElse(cond, e0, e1) => {
            expect(cond, env, Ty::Bool, "if condition")?;
            let then_ty = check(e0, env)?;
            let else_ty = check(e1, env)?;
            if then_ty == else_ty {
                Ok(then_ty)
            } else {
                Err(TypeError::BranchMismatch { then_ty, else_ty })
            }
        }
    }
}

fn arith(l: &Exp, r: &Exp, env: &TypeEnv, context: &'static str) -> Result<Ty, TypeError> {
    expect(l, env, Ty::Int, context)?;
    expect(r, env, Ty::Int, context)?;
    Ok(Ty::Int)
}

fn expect(exp: &Exp, env: &TypeEnv, expected: Ty, context: &'static str) -> Result<(), TypeError> {
    let found = check(exp, env)?;
    if found == expected {
        Ok(())
    } else {
        Err(TypeError::Mismatch {
            context,
            expected,
            found,
        })
    }
}
