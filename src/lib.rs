//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable:
//! - `tokenizer` performs lexical analysis, one token at a time.
//! - `parser` owns all syntactic knowledge and returns an `ast::Expr`.
//! - `ast` holds the tree and its infix / indented renderings.
//! - `eval` computes values directly and serves as the reference result.
//! - `codegen` lowers trees into x87 NASM, using the typed lines in `asm`.
//! - `fpu` executes emitted programs on a model of the x87 stack.
//! - `driver` runs a batch of lines with per-line failures.
//! - `error` centralises the error types shared by the other modules.

pub mod asm;
pub mod ast;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod eval;
pub mod fpu;
pub mod parser;
pub mod tokenizer;

pub use ast::{Expr, pretty_print, render};
pub use codegen::{Program, compile};
pub use error::{CodegenError, CompileError, CompileResult, EvalError, LexError, ParseError, SyntaxError};
pub use eval::evaluate;
pub use parser::parse;

/// Compile a single expression into a complete NASM program.
pub fn generate_assembly(expr: &str) -> CompileResult<String> {
  let expr = parser::parse(expr)?;
  let program = codegen::compile(std::slice::from_ref(&expr))?;
  Ok(program.to_string())
}
