//! Tree-walking evaluator, used as the reference result for emitted code.

use snafu::ensure;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{DivisionByZeroSnafu, EvalError};

/// Evaluate an expression directly. Dividing by zero (of either sign) is an error.
pub fn evaluate(expr: &Expr) -> Result<f64, EvalError> {
  match expr {
    Expr::Num { value } => Ok(*value),
    Expr::Binary { op, lhs, rhs } => {
      let lhs = evaluate(lhs)?;
      let rhs = evaluate(rhs)?;
      match op {
        BinaryOp::Add => Ok(lhs + rhs),
        BinaryOp::Sub => Ok(lhs - rhs),
        BinaryOp::Mul => Ok(lhs * rhs),
        BinaryOp::Div => {
          ensure!(rhs != 0.0, DivisionByZeroSnafu);
          Ok(lhs / rhs)
        }
      }
    }
    Expr::Unary { op, operand } => {
      let value = evaluate(operand)?;
      match op {
        UnaryOp::Plus => Ok(value),
        UnaryOp::Minus => Ok(-value),
      }
    }
  }
}
