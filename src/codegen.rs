//! Code generation: lower expression trees into x87 NASM for x86-64 Linux.
//!
//! The x87 unit is a strict stack machine: `fld` pushes, each arithmetic
//! instruction consumes the two top slots and leaves one result. Every
//! expression is emitted right operand first, so when the operator runs the
//! left operand sits in `st0` and the right one in `st1`; subtraction and
//! division therefore use the reversed `fsubrp`/`fdivrp` forms. The finished
//! value is handed to `printf` through `xmm0` as the System V ABI requires for
//! variadic calls.

use std::fmt;

use log::{debug, trace};
use snafu::ensure;

use crate::asm::{Data, FpuOp, Instr};
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{CodegenError, StackOverflowSnafu};

/// Registers on the x87 stack.
pub const FPU_STACK_SLOTS: usize = 8;

/// Format shared by every report call: two decimals, newline appended in `.data`.
const FLOAT_FORMAT: &str = "%.2f";

const PRINTF: &str = "printf";

/// Number of FPU slots needed to evaluate `expr` with right-then-left emission.
pub fn required_depth(expr: &Expr) -> usize {
  match expr {
    Expr::Num { .. } => 1,
    // The right operand's value stays on the stack while the left one is built.
    Expr::Binary { lhs, rhs, .. } => required_depth(rhs).max(1 + required_depth(lhs)),
    Expr::Unary { operand, .. } => required_depth(operand),
  }
}

/// A complete program: the constant pool and the body of `main`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
  pub data: Vec<Data>,
  pub text: Vec<Instr>,
}

impl Program {
  /// Every label defined in the data section, in definition order.
  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.data.iter().map(Data::label)
  }
}

impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "section .data")?;
    for entry in &self.data {
      writeln!(f, "{entry}")?;
    }
    writeln!(f)?;
    writeln!(f, "section .text")?;
    writeln!(f, "global main")?;
    writeln!(f, "extern {PRINTF}")?;
    writeln!(f, "main:")?;
    for instr in &self.text {
      writeln!(f, "{instr}")?;
    }
    writeln!(f, "section .note.GNU-stack noalloc noexec nowrite progbits")
  }
}

/// Per-run emission state. Labels come from one counter shared by constants
/// and temporaries, so they never collide within a program.
pub struct Emitter {
  data: Vec<Data>,
  text: Vec<Instr>,
  label_count: usize,
  format_label: String,
  emitted: usize,
}

impl Default for Emitter {
  fn default() -> Self {
    Self::new()
  }
}

impl Emitter {
  pub fn new() -> Self {
    let mut emitter = Self {
      data: Vec::new(),
      text: vec![Instr::Finit, Instr::Blank],
      label_count: 0,
      format_label: String::new(),
      emitted: 0,
    };
    emitter.format_label = emitter.next_label("LC");
    emitter.data.push(Data::Format {
      label: emitter.format_label.clone(),
      format: FLOAT_FORMAT.to_string(),
    });
    emitter
  }

  /// Number of expressions emitted so far.
  pub fn emitted(&self) -> usize {
    self.emitted
  }

  /// Emit one expression followed by its report sequence.
  ///
  /// On error neither section is touched, so the program stays valid for the
  /// expressions that did compile.
  pub fn emit_expression(&mut self, expr: &Expr) -> Result<(), CodegenError> {
    let depth = required_depth(expr);
    ensure!(depth <= FPU_STACK_SLOTS, StackOverflowSnafu { depth });

    let ordinal = self.emitted + 1;
    debug!("emitting expression {ordinal} (fpu depth {depth}): {expr}");

    self
      .text
      .push(Instr::Comment(format!("--- Expression {ordinal} ---")));
    self.emit_expr(expr);
    self.emit_print_float();
    self.text.push(Instr::Blank);
    self.emitted = ordinal;
    Ok(())
  }

  /// Append the exit sequence and hand back the finished program.
  pub fn finish(mut self) -> Program {
    self.text.push(Instr::Comment("--- Exit program ---".to_string()));
    self.text.push(Instr::XorEax);
    self.text.push(Instr::Ret);
    debug!(
      "program complete: {} expression(s), {} data entries, {} instructions",
      self.emitted,
      self.data.len(),
      self.text.len()
    );
    Program {
      data: self.data,
      text: self.text,
    }
  }

  fn next_label(&mut self, prefix: &str) -> String {
    let label = format!("{prefix}{}", self.label_count);
    self.label_count += 1;
    label
  }

  /// Emit stack-machine code leaving the value of `expr` in `st0`.
  fn emit_expr(&mut self, expr: &Expr) {
    match expr {
      Expr::Num { value } => {
        let label = self.next_label("LC");
        trace!("constant {label} = {value}");
        self.data.push(Data::Double {
          label: label.clone(),
          value: *value,
        });
        self.text.push(Instr::Fld {
          label,
          value: *value,
        });
      }
      Expr::Binary { op, lhs, rhs } => {
        self.emit_expr(rhs);
        self.emit_expr(lhs);
        let instr = match op {
          BinaryOp::Add => FpuOp::Faddp,
          BinaryOp::Sub => FpuOp::Fsubrp,
          BinaryOp::Mul => FpuOp::Fmulp,
          BinaryOp::Div => FpuOp::Fdivrp,
        };
        self.text.push(Instr::Arith(instr));
      }
      Expr::Unary { op, operand } => {
        self.emit_expr(operand);
        match op {
          UnaryOp::Plus => self.text.push(Instr::UnaryPlus),
          UnaryOp::Minus => self.text.push(Instr::Fchs),
        }
      }
    }
  }

  /// Print `st0` with the shared format, popping it.
  fn emit_print_float(&mut self) {
    let temp = self.next_label("temp");
    self.data.push(Data::Temp {
      label: temp.clone(),
    });

    self
      .text
      .push(Instr::Comment("Print value currently in st(0)".to_string()));
    self.text.push(Instr::Fstp {
      label: temp.clone(),
    });
    self.text.push(Instr::MovsdXmm0 { label: temp });
    self.text.push(Instr::MovRdi {
      label: self.format_label.clone(),
    });
    self.text.push(Instr::MovRax(1));
    // main is entered with rsp 8 bytes off a 16-byte boundary.
    self.text.push(Instr::SubRsp(8));
    self.text.push(Instr::Call {
      symbol: PRINTF.to_string(),
    });
    self.text.push(Instr::AddRsp(8));
  }
}

/// Compile a list of expressions into one program, in input order.
pub fn compile(exprs: &[Expr]) -> Result<Program, CodegenError> {
  let mut emitter = Emitter::new();
  for expr in exprs {
    emitter.emit_expression(expr)?;
  }
  Ok(emitter.finish())
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;
  use crate::parser::parse;

  fn exprs(inputs: &[&str]) -> Vec<Expr> {
    inputs.iter().map(|input| parse(input).unwrap()).collect()
  }

  fn body(program: &Program) -> Vec<&Instr> {
    program
      .text
      .iter()
      .filter(|instr| !matches!(instr, Instr::Comment(_) | Instr::Blank))
      .collect()
  }

  #[test]
  fn right_operand_is_loaded_first() {
    let program = compile(&exprs(&["10 - 3"])).unwrap();
    let body = body(&program);
    assert_eq!(
      &body[..4],
      &[
        &Instr::Finit,
        &Instr::Fld {
          label: "LC1".into(),
          value: 3.0
        },
        &Instr::Fld {
          label: "LC2".into(),
          value: 10.0
        },
        &Instr::Arith(FpuOp::Fsubrp),
      ]
    );
  }

  #[test]
  fn operators_map_to_compensated_instructions() {
    let cases = [
      ("1+2", FpuOp::Faddp),
      ("1-2", FpuOp::Fsubrp),
      ("1*2", FpuOp::Fmulp),
      ("1/2", FpuOp::Fdivrp),
    ];
    for (input, expected) in cases {
      let program = compile(&exprs(&[input])).unwrap();
      assert!(program.text.contains(&Instr::Arith(expected)), "{input}");
    }
  }

  #[test]
  fn unary_operators() {
    let program = compile(&exprs(&["-+4"])).unwrap();
    let body = body(&program);
    assert_eq!(body[2], &Instr::UnaryPlus);
    assert_eq!(body[3], &Instr::Fchs);
  }

  #[test]
  fn one_constant_per_literal_and_one_temp_per_expression() {
    let program = compile(&exprs(&["1 + 2 * 3", "4"])).unwrap();
    let doubles = program
      .data
      .iter()
      .filter(|entry| matches!(entry, Data::Double { .. }))
      .count();
    let temps = program
      .data
      .iter()
      .filter(|entry| matches!(entry, Data::Temp { .. }))
      .count();
    assert_eq!(doubles, 4);
    assert_eq!(temps, 2);
  }

  #[test]
  fn labels_are_unique_across_the_batch() {
    let program = compile(&exprs(&["1+2", "3*4-5", "(6)", "-7/8"])).unwrap();
    let labels: Vec<_> = program.labels().collect();
    let unique: HashSet<_> = labels.iter().collect();
    assert_eq!(labels.len(), unique.len());
    // format string + 8 literals + 4 temporaries
    assert_eq!(labels.len(), 13);
  }

  #[test]
  fn one_report_per_expression_in_order() {
    let program = compile(&exprs(&["1", "2", "3"])).unwrap();
    let calls = program
      .text
      .iter()
      .filter(|instr| matches!(instr, Instr::Call { .. }))
      .count();
    assert_eq!(calls, 3);

    let markers: Vec<_> = program
      .text
      .iter()
      .filter_map(|instr| match instr {
        Instr::Comment(text) if text.starts_with("--- Expression") => Some(text.as_str()),
        _ => None,
      })
      .collect();
    assert_eq!(
      markers,
      vec![
        "--- Expression 1 ---",
        "--- Expression 2 ---",
        "--- Expression 3 ---"
      ]
    );
  }

  #[test]
  fn rendered_program_layout() {
    let program = compile(&exprs(&["2 / 4"])).unwrap();
    let expected = "section .data
    LC0: db \"%.2f\", 10, 0
    LC1: dq 4.0
    LC2: dq 2.0
    temp3: dq 0.0

section .text
global main
extern printf
main:
    finit

    ; --- Expression 1 ---
    fld QWORD [LC1]  ; Load 4
    fld QWORD [LC2]  ; Load 2
    fdivrp st1, st0 ; Divide
    ; Print value currently in st(0)
    fstp QWORD [temp3]   ; Store st(0) to memory and pop
    movsd xmm0, QWORD [temp3] ; Load float from memory into xmm0
    mov rdi, LC0       ; 1st arg (format string)
    mov rax, 1          ; Number of XMM registers used
    sub rsp, 8          ; Align stack to 16 bytes for the call
    call printf
    add rsp, 8          ; Restore stack pointer

    ; --- Exit program ---
    xor eax, eax
    ret
section .note.GNU-stack noalloc noexec nowrite progbits
";
    assert_eq!(program.to_string(), expected);
  }

  #[test]
  fn depth_follows_emission_order() {
    assert_eq!(required_depth(&parse("1").unwrap()), 1);
    assert_eq!(required_depth(&parse("1+2").unwrap()), 2);
    // right-nested: the right subtree finishes before the left leaf is pushed
    assert_eq!(required_depth(&parse("1+(2+(3+4))").unwrap()), 2);
    // left-nested: each pending right operand stays on the stack
    assert_eq!(required_depth(&parse("1+2+3+4").unwrap()), 4);
  }

  #[test]
  fn too_deep_expression_is_rejected_without_partial_output() {
    let mut emitter = Emitter::new();
    emitter.emit_expression(&parse("1+1").unwrap()).unwrap();

    let deep = parse("1+2+3+4+5+6+7+8+9").unwrap();
    assert_eq!(
      emitter.emit_expression(&deep),
      Err(CodegenError::StackOverflow { depth: 9 })
    );
    emitter.emit_expression(&parse("2*2").unwrap()).unwrap();
    assert_eq!(emitter.emitted(), 2);

    let program = emitter.finish();
    assert_eq!(
      program
        .text
        .iter()
        .filter(|instr| matches!(instr, Instr::Fld { .. }))
        .count(),
      4
    );
  }

  #[test]
  fn empty_program_still_exits() {
    let program = compile(&[]).unwrap();
    assert_eq!(program.data.len(), 1);
    assert_eq!(program.text.last(), Some(&Instr::Ret));
  }
}
