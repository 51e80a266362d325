//! Expression tree produced by the parser, plus its two textual views.
//!
//! `Display` gives a fully parenthesised infix rendering that re-parses to the
//! same tree; `pretty_print` gives an indented, one-node-per-line dump for
//! debugging.

use std::fmt;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  pub fn symbol(self) -> char {
    match self {
      BinaryOp::Add => '+',
      BinaryOp::Sub => '-',
      BinaryOp::Mul => '*',
      BinaryOp::Div => '/',
    }
  }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Plus,
  Minus,
}

impl UnaryOp {
  pub fn symbol(self) -> char {
    match self {
      UnaryOp::Plus => '+',
      UnaryOp::Minus => '-',
    }
  }
}

/// Expression tree. Every child is exclusively owned by its parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Num {
    value: f64,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
}

impl Expr {
  pub fn number(value: f64) -> Self {
    Self::Num { value }
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn unary(op: UnaryOp, operand: Expr) -> Self {
    Self::Unary {
      op,
      operand: Box::new(operand),
    }
  }
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      // f64's Display is the shortest round-trip form and never uses an exponent.
      Expr::Num { value } => write!(f, "{value}"),
      Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
      Expr::Unary { op, operand } => write!(f, "{}{operand}", op.symbol()),
    }
  }
}

/// Fully parenthesised infix notation.
pub fn render(expr: &Expr) -> String {
  expr.to_string()
}

/// Indented tree dump, one line per node.
pub fn pretty_print(expr: &Expr, indent: &str) -> String {
  let mut out = String::new();
  write_tree(expr, indent, &mut out);
  out
}

fn write_tree(expr: &Expr, indent: &str, out: &mut String) {
  let child_indent = format!("{indent}    ");
  match expr {
    Expr::Num { value } => out.push_str(&format!("{indent}Number({value})\n")),
    Expr::Binary { op, lhs, rhs } => {
      out.push_str(&format!("{indent}BinaryOp({})\n", op.symbol()));
      out.push_str(&format!("{indent}  Left:\n"));
      write_tree(lhs, &child_indent, out);
      out.push_str(&format!("{indent}  Right:\n"));
      write_tree(rhs, &child_indent, out);
    }
    Expr::Unary { op, operand } => {
      out.push_str(&format!("{indent}UnaryOp({})\n", op.symbol()));
      out.push_str(&format!("{indent}  Expr:\n"));
      write_tree(operand, &child_indent, out);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Expr {
    // -(1.5 + 2) * 10
    Expr::binary(
      BinaryOp::Mul,
      Expr::unary(
        UnaryOp::Minus,
        Expr::binary(BinaryOp::Add, Expr::number(1.5), Expr::number(2.0)),
      ),
      Expr::number(10.0),
    )
  }

  #[test]
  fn infix_is_fully_parenthesised() {
    assert_eq!(render(&sample()), "(-(1.5 + 2) * 10)");
  }

  #[test]
  fn numbers_use_general_format() {
    assert_eq!(render(&Expr::number(10.0)), "10");
    assert_eq!(render(&Expr::number(123.45)), "123.45");
    assert_eq!(render(&Expr::number(0.1)), "0.1");
    assert_eq!(render(&Expr::number(1e21)), "1000000000000000000000");
  }

  #[test]
  fn unary_has_no_space() {
    let expr = Expr::unary(UnaryOp::Minus, Expr::unary(UnaryOp::Plus, Expr::number(5.0)));
    assert_eq!(render(&expr), "-+5");
  }

  #[test]
  fn pretty_print_indents_by_depth() {
    let expected = "  BinaryOp(*)
    Left:
      UnaryOp(-)
        Expr:
          BinaryOp(+)
            Left:
              Number(1.5)
            Right:
              Number(2)
    Right:
      Number(10)
";
    assert_eq!(pretty_print(&sample(), "  "), expected);
  }

  #[test]
  fn pretty_print_is_restartable() {
    let expr = sample();
    assert_eq!(pretty_print(&expr, ""), pretty_print(&expr, ""));
    assert_eq!(pretty_print(&Expr::number(3.0), ">"), ">Number(3)\n");
  }
}
