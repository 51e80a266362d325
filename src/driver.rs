//! Batch processing: one expression per line, failures kept local to their line.

use log::{debug, warn};

use crate::ast::Expr;
use crate::codegen::{Emitter, Program};
use crate::error::{CompileError, EvalError};
use crate::eval::evaluate;
use crate::parser::parse;

/// A line that made it through parsing and code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
  pub expr: Expr,
  /// Reference value from the tree-walking evaluator.
  pub value: Result<f64, EvalError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineOutcome {
  /// 1-based line number in the input.
  pub line: usize,
  /// The trimmed source text.
  pub source: String,
  pub result: Result<Compiled, CompileError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
  /// One entry per non-empty line, in input order.
  pub outcomes: Vec<LineOutcome>,
  /// `None` when no line compiled.
  pub program: Option<Program>,
}

impl Batch {
  pub fn compiled(&self) -> impl Iterator<Item = &LineOutcome> {
    self.outcomes.iter().filter(|outcome| outcome.result.is_ok())
  }

  pub fn failed(&self) -> impl Iterator<Item = &LineOutcome> {
    self.outcomes.iter().filter(|outcome| outcome.result.is_err())
  }
}

/// Parse, evaluate and emit every non-empty line into a single program.
pub fn process_lines<I, S>(lines: I) -> Batch
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut emitter = Emitter::new();
  let mut outcomes = Vec::new();

  for (index, line) in lines.into_iter().enumerate() {
    let source = line.as_ref().trim();
    if source.is_empty() {
      continue;
    }
    let line = index + 1;
    let result = compile_line(&mut emitter, source);
    match &result {
      Ok(compiled) => debug!("L{line}: {}", compiled.expr),
      Err(err) => warn!("L{line}: {} error, skipping: {err}", err.stage()),
    }
    outcomes.push(LineOutcome {
      line,
      source: source.to_string(),
      result,
    });
  }

  let program = (emitter.emitted() > 0).then(|| emitter.finish());
  Batch { outcomes, program }
}

fn compile_line(emitter: &mut Emitter, source: &str) -> Result<Compiled, CompileError> {
  let expr = parse(source)?;
  emitter.emit_expression(&expr)?;
  let value = evaluate(&expr);
  Ok(Compiled { expr, value })
}
