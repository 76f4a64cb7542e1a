//! A compiler from a small ML-flavoured expression language to a
//! RISC-V-flavoured abstract register machine.
//!
//! The pipeline: source text → tokens → AST → machine program over unbounded
//! symbolic registers → register allocation onto the four-register bank (with
//! spills to memory) → branch-target resolution → execution. A tree-walking
//! evaluator and a type checker provide the reference semantics the backend
//! is tested against.

pub mod ast;
pub mod backend;
pub mod frontend;
pub mod interp;
pub mod typecheck;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("lexical error: {0}")]
    Lexical(#[from] frontend::lexer::LexicalError),

    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("type error: {0}")]
    Type(#[from] typecheck::TypeError),

    #[error("evaluation error: {0}")]
    Eval(#[from] interp::EvalError),

    #[error("register allocation error: {0}")]
    Alloc(#[from] backend::AllocError),

    #[error("label resolution error: {0}")]
    Label(#[from] backend::ProgramError),
}

/// Parse source text into an AST.
pub fn parse(source: &str) -> Result<ast::Exp, CompileError> {
    let tokens = frontend::lex(source)?;
    frontend::Parser::new(source, tokens).parse()
}

/// Parse, type-check, and compile source text down to a physical-register
/// machine program.
pub fn compile(source: &str) -> Result<backend::Compiled, CompileError> {
    let exp = parse(source)?;
    typecheck::check(&exp, &typecheck::TypeEnv::new())?;
    backend::compile(&exp)
}

/// Parse, type-check, and evaluate source text with the reference
/// interpreter.
pub fn eval_source(source: &str) -> Result<interp::Value, CompileError> {
    let exp = parse(source)?;
    typecheck::check(&exp, &typecheck::TypeEnv::new())?;
    Ok(interp::eval(&exp, &interp::Env::new())?)
}
