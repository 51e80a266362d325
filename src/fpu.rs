//! A small model of the machine the emitted program runs on: the 8-slot x87
//! register stack, the data section, `xmm0`, `rax`/`rdi`, stack alignment
//! and the `printf` call. Running a `Program` here yields the values the real
//! binary would print, which lets tests compare emitted code against the
//! tree-walking evaluator without an assembler.

use std::collections::HashMap;

use log::trace;
use snafu::{OptionExt, Snafu, ensure};

use crate::asm::{Data, Instr};
use crate::codegen::{FPU_STACK_SLOTS, Program};

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum FpuError {
  #[snafu(display("x87 stack overflow at instruction {index}"))]
  StackOverflow { index: usize },

  #[snafu(display("x87 stack underflow at instruction {index}"))]
  StackUnderflow { index: usize },

  #[snafu(display("instruction {index} references undefined label {label}"))]
  UnknownLabel { index: usize, label: String },

  #[snafu(display("call at instruction {index} with rsp misaligned by {offset} bytes"))]
  MisalignedCall { index: usize, offset: u64 },

  #[snafu(display("printf call at instruction {index} is not set up for one double"))]
  BadPrintfCall { index: usize },

  #[snafu(display("program finished with {depth} value(s) left on the x87 stack"))]
  UnbalancedStack { depth: usize },
}

/// Memory cell of the data section.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell {
  Format,
  Double(f64),
}

/// Machine state for one run.
pub struct Fpu {
  stack: Vec<f64>,
  memory: HashMap<String, Cell>,
  xmm0: Option<f64>,
  rdi: Option<String>,
  rax: Option<u64>,
  /// Bytes `rsp` sits below a 16-byte boundary; `main` starts at 8 (return address).
  rsp_offset: u64,
  printed: Vec<f64>,
}

impl Fpu {
  fn new(data: &[Data]) -> Self {
    let memory = data
      .iter()
      .map(|entry| match entry {
        Data::Format { label, .. } => (label.clone(), Cell::Format),
        Data::Double { label, value } => (label.clone(), Cell::Double(*value)),
        Data::Temp { label } => (label.clone(), Cell::Double(0.0)),
      })
      .collect();
    Self {
      stack: Vec::with_capacity(FPU_STACK_SLOTS),
      memory,
      xmm0: None,
      rdi: None,
      rax: None,
      rsp_offset: 8,
      printed: Vec::new(),
    }
  }

  /// Execute `program` and return every value passed to `printf`, in order.
  pub fn run(program: &Program) -> Result<Vec<f64>, FpuError> {
    let mut fpu = Fpu::new(&program.data);
    for (index, instr) in program.text.iter().enumerate() {
      fpu.step(index, instr)?;
    }
    let depth = fpu.stack.len();
    ensure!(depth == 0, UnbalancedStackSnafu { depth });
    Ok(fpu.printed)
  }

  fn step(&mut self, index: usize, instr: &Instr) -> Result<(), FpuError> {
    trace!("{index:>4}: {instr} | stack {:?}", self.stack);
    match instr {
      Instr::Comment(_) | Instr::Blank | Instr::UnaryPlus | Instr::XorEax | Instr::Ret => {}
      Instr::Finit => self.stack.clear(),
      Instr::Fld { label, .. } => {
        let value = self.load(index, label)?;
        self.push(index, value)?;
      }
      Instr::Arith(op) => {
        let st0 = self.pop(index)?;
        let st1 = self.pop(index)?;
        self.push(index, op.apply(st0, st1))?;
      }
      Instr::Fchs => {
        let st0 = self.pop(index)?;
        self.push(index, -st0)?;
      }
      Instr::Fstp { label } => {
        let st0 = self.pop(index)?;
        let cell = self.memory.get_mut(label).context(UnknownLabelSnafu {
          index,
          label: label.as_str(),
        })?;
        *cell = Cell::Double(st0);
      }
      Instr::MovsdXmm0 { label } => self.xmm0 = Some(self.load(index, label)?),
      Instr::MovRdi { label } => {
        ensure!(
          self.memory.contains_key(label),
          UnknownLabelSnafu {
            index,
            label: label.as_str(),
          }
        );
        self.rdi = Some(label.clone());
      }
      Instr::MovRax(imm) => self.rax = Some(*imm),
      Instr::SubRsp(n) => self.rsp_offset = (self.rsp_offset + n) % 16,
      Instr::AddRsp(n) => self.rsp_offset = (self.rsp_offset + 16 - n % 16) % 16,
      Instr::Call { .. } => self.call_printf(index)?,
    }
    Ok(())
  }

  fn call_printf(&mut self, index: usize) -> Result<(), FpuError> {
    ensure!(
      self.rsp_offset == 0,
      MisalignedCallSnafu {
        index,
        offset: self.rsp_offset,
      }
    );
    let format_ok = self
      .rdi
      .as_ref()
      .is_some_and(|label| self.memory.get(label) == Some(&Cell::Format));
    ensure!(format_ok && self.rax == Some(1), BadPrintfCallSnafu { index });
    let value = self.xmm0.context(BadPrintfCallSnafu { index })?;
    self.printed.push(value);
    // Caller-saved registers are clobbered by the call.
    self.xmm0 = None;
    self.rax = None;
    self.rdi = None;
    Ok(())
  }

  fn load(&self, index: usize, label: &str) -> Result<f64, FpuError> {
    match self.memory.get(label) {
      Some(Cell::Double(value)) => Ok(*value),
      _ => UnknownLabelSnafu { index, label }.fail(),
    }
  }

  fn push(&mut self, index: usize, value: f64) -> Result<(), FpuError> {
    ensure!(
      self.stack.len() < FPU_STACK_SLOTS,
      StackOverflowSnafu { index }
    );
    self.stack.push(value);
    Ok(())
  }

  fn pop(&mut self, index: usize) -> Result<f64, FpuError> {
    self.stack.pop().context(StackUnderflowSnafu { index })
  }
}

/// Format a printed value the way `printf("%.2f\n")` would.
pub fn format_printed(value: f64) -> String {
  format!("{value:.2}")
}
