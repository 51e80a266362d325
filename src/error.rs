//! Error types for every stage of the pipeline.
//!
//! Each stage owns a small `snafu` enum; `CompileError` wraps the stages that
//! can abort turning one expression into assembly. Diagnostics point at the
//! offending byte with a caret, chibicc style.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Failures raised while scanning characters.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LexError {
  #[snafu(display("invalid character '{ch}' at position {loc}"))]
  InvalidCharacter { ch: char, loc: usize },

  #[snafu(display("malformed number '{text}' at position {loc}: second decimal point"))]
  MalformedNumber { text: String, loc: usize },
}

impl LexError {
  pub fn loc(&self) -> usize {
    match self {
      LexError::InvalidCharacter { loc, .. } | LexError::MalformedNumber { loc, .. } => *loc,
    }
  }
}

/// Failures raised while matching tokens against the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SyntaxError {
  #[snafu(display("expected {expected}, but got {found}"))]
  Expected {
    expected: String,
    found: String,
    loc: usize,
  },

  #[snafu(display("unexpected token {found}"))]
  Unexpected { found: String, loc: usize },

  #[snafu(display("invalid number literal \"{text}\""))]
  InvalidNumber { text: String, loc: usize },

  #[snafu(display("expression nests deeper than {} levels", crate::parser::MAX_DEPTH))]
  TooDeep { loc: usize },
}

impl SyntaxError {
  pub fn loc(&self) -> usize {
    match self {
      SyntaxError::Expected { loc, .. }
      | SyntaxError::Unexpected { loc, .. }
      | SyntaxError::InvalidNumber { loc, .. }
      | SyntaxError::TooDeep { loc } => *loc,
    }
  }
}

/// Everything that can go wrong turning text into a tree.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
  #[snafu(display("lexical error: {source}"), context(false))]
  Lex { source: LexError },

  #[snafu(display("syntax error: {source}"), context(false))]
  Syntax { source: SyntaxError },

  #[snafu(display("syntax error: unexpected trailing input {found}"))]
  TrailingInput { found: String, loc: usize },
}

impl ParseError {
  pub fn loc(&self) -> usize {
    match self {
      ParseError::Lex { source } => source.loc(),
      ParseError::Syntax { source } => source.loc(),
      ParseError::TrailingInput { loc, .. } => *loc,
    }
  }
}

/// Failures of the tree-walking evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EvalError {
  #[snafu(display("arithmetic error: division by zero"))]
  DivisionByZero,
}

impl EvalError {
  pub fn stage(&self) -> &'static str {
    "arithmetic"
  }
}

/// Failures of the instruction emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodegenError {
  #[snafu(display(
    "codegen error: expression needs {depth} FPU stack slots, but only {} are available",
    crate::codegen::FPU_STACK_SLOTS
  ))]
  StackOverflow { depth: usize },
}

/// A failure anywhere between source text and emitted instructions.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{source}"), context(false))]
  Parse { source: ParseError },

  #[snafu(display("{source}"), context(false))]
  Codegen { source: CodegenError },
}

impl CompileError {
  /// Name of the pipeline stage that rejected the input.
  pub fn stage(&self) -> &'static str {
    match self {
      CompileError::Parse {
        source: ParseError::Lex { .. },
      } => "lexical",
      CompileError::Parse { .. } => "syntactic",
      CompileError::Codegen { .. } => "codegen",
    }
  }

  /// Render the error beneath the source line with a caret at the offending byte.
  pub fn with_source(&self, src: &str) -> String {
    match self {
      CompileError::Parse { source } => caret_diagnostic(src, source.loc(), &self.to_string()),
      CompileError::Codegen { .. } => format!("'{src}'\n{self}"),
    }
  }
}

fn caret_diagnostic(expr: &str, loc: usize, message: &str) -> String {
  let safe_loc = loc.min(expr.len());
  let char_offset = expr[..safe_loc].chars().count() + 1; // account for opening quote
  format!("'{expr}'\n{}^ {message}", " ".repeat(char_offset))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn caret_points_at_offending_byte() {
    let err = CompileError::from(ParseError::from(LexError::InvalidCharacter { ch: 'x', loc: 2 }));
    let rendered = err.with_source("1+x");
    assert_eq!(
      rendered,
      "'1+x'\n   ^ lexical error: invalid character 'x' at position 2"
    );
  }

  #[test]
  fn stages_are_named() {
    let lex = CompileError::from(ParseError::from(LexError::MalformedNumber {
      text: "1.2".into(),
      loc: 0,
    }));
    assert_eq!(lex.stage(), "lexical");

    let syntax = CompileError::from(ParseError::TrailingInput {
      found: "\")\"".into(),
      loc: 3,
    });
    assert_eq!(syntax.stage(), "syntactic");

    let codegen = CompileError::from(CodegenError::StackOverflow { depth: 9 });
    assert_eq!(codegen.stage(), "codegen");
    assert_eq!(EvalError::DivisionByZero.stage(), "arithmetic");
  }

  #[test]
  fn caret_is_clamped_to_input_end() {
    let err = CompileError::from(ParseError::from(SyntaxError::Unexpected {
      found: "EOF".into(),
      loc: 99,
    }));
    assert!(err.with_source("1+").starts_with("'1+'\n   ^"));
  }
}
