//! Typed view of the NASM output: data-section entries and the instructions
//! the emitter produces, each rendering itself as one line of Intel syntax.
//!
//! Keeping instructions typed (rather than pushing strings straight into a
//! buffer) lets the FPU simulator execute exactly what gets written out.

use std::fmt;

/// Two-operand x87 arithmetic that combines `st0` and `st1`, stores into
/// `st1` and pops, leaving the result on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpuOp {
  /// `st1 := st1 + st0`
  Faddp,
  /// `st1 := st0 - st1`
  Fsubrp,
  /// `st1 := st1 * st0`
  Fmulp,
  /// `st1 := st0 / st1`
  Fdivrp,
}

impl FpuOp {
  pub fn mnemonic(self) -> &'static str {
    match self {
      FpuOp::Faddp => "faddp",
      FpuOp::Fsubrp => "fsubrp",
      FpuOp::Fmulp => "fmulp",
      FpuOp::Fdivrp => "fdivrp",
    }
  }

  /// Apply the instruction to the two top stack slots.
  pub fn apply(self, st0: f64, st1: f64) -> f64 {
    match self {
      FpuOp::Faddp => st1 + st0,
      FpuOp::Fsubrp => st0 - st1,
      FpuOp::Fmulp => st1 * st0,
      FpuOp::Fdivrp => st0 / st1,
    }
  }

  fn note(self) -> &'static str {
    match self {
      FpuOp::Faddp => "Add",
      FpuOp::Fsubrp => "Subtract",
      FpuOp::Fmulp => "Multiply",
      FpuOp::Fdivrp => "Divide",
    }
  }
}

/// One line of the `main` body.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
  Comment(String),
  Blank,
  /// Reset the FPU.
  Finit,
  /// Push the double stored at `label`.
  Fld { label: String, value: f64 },
  Arith(FpuOp),
  /// Negate `st0` in place.
  Fchs,
  /// Marker left for unary plus; executes nothing.
  UnaryPlus,
  /// Store `st0` to `label` and pop.
  Fstp { label: String },
  /// Load the double at `label` into `xmm0`.
  MovsdXmm0 { label: String },
  /// Address of `label` into `rdi`.
  MovRdi { label: String },
  /// Immediate into `rax`.
  MovRax(u64),
  SubRsp(u64),
  AddRsp(u64),
  Call { symbol: String },
  /// Zero the return value.
  XorEax,
  Ret,
}

impl fmt::Display for Instr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Instr::Comment(text) => write!(f, "    ; {text}"),
      Instr::Blank => Ok(()),
      Instr::Finit => write!(f, "    finit"),
      Instr::Fld { label, value } => write!(f, "    fld QWORD [{label}]  ; Load {value}"),
      Instr::Arith(op) => write!(f, "    {} st1, st0 ; {}", op.mnemonic(), op.note()),
      Instr::Fchs => write!(f, "    fchs             ; Negate"),
      Instr::UnaryPlus => write!(f, "    ; Unary plus (no-op)"),
      Instr::Fstp { label } => write!(f, "    fstp QWORD [{label}]   ; Store st(0) to memory and pop"),
      Instr::MovsdXmm0 { label } => {
        write!(f, "    movsd xmm0, QWORD [{label}] ; Load float from memory into xmm0")
      }
      Instr::MovRdi { label } => write!(f, "    mov rdi, {label}       ; 1st arg (format string)"),
      Instr::MovRax(imm) => write!(f, "    mov rax, {imm}          ; Number of XMM registers used"),
      Instr::SubRsp(n) => write!(f, "    sub rsp, {n}          ; Align stack to 16 bytes for the call"),
      Instr::AddRsp(n) => write!(f, "    add rsp, {n}          ; Restore stack pointer"),
      Instr::Call { symbol } => write!(f, "    call {symbol}"),
      Instr::XorEax => write!(f, "    xor eax, eax"),
      Instr::Ret => write!(f, "    ret"),
    }
  }
}

/// One labelled entry of the `.data` section.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
  /// NUL-terminated `printf` format followed by a newline.
  Format { label: String, format: String },
  /// A literal operand.
  Double { label: String, value: f64 },
  /// Scratch slot used to move `st0` into `xmm0`.
  Temp { label: String },
}

impl Data {
  pub fn label(&self) -> &str {
    match self {
      Data::Format { label, .. } | Data::Double { label, .. } | Data::Temp { label } => label,
    }
  }
}

impl fmt::Display for Data {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Data::Format { label, format } => write!(f, "    {label}: db \"{format}\", 10, 0"),
      Data::Double { label, value } => write!(f, "    {label}: dq {}", nasm_double(*value)),
      Data::Temp { label } => write!(f, "    {label}: dq 0.0"),
    }
  }
}

/// Spell a double so NASM reads it back bit-for-bit as a float constant.
///
/// Debug formatting is the shortest round-trip form; NASM additionally needs a
/// decimal point, otherwise `dq 3` or `dq 1e21` would be taken as integers.
pub fn nasm_double(value: f64) -> String {
  let text = format!("{value:?}");
  if text.contains('.') {
    return text;
  }
  match text.find('e') {
    Some(exp) => format!("{}.0{}", &text[..exp], &text[exp..]),
    None => format!("{text}.0"),
  }
}
