//! Recursive-descent parser producing an expression tree.
//!
//! One helper per precedence level, lowest first:
//!
//! ```text
//! expr   = term (("+" | "-") term)*
//! term   = factor (("*" | "/") factor)*
//! factor = num | "(" expr ")" | ("+" | "-") factor
//! ```
//!
//! Binary levels loop so they associate to the left; the unary production
//! recurses so prefix operators nest to the right and bind tighter than `*`.

use snafu::ensure;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{
  ExpectedSnafu, InvalidNumberSnafu, ParseError, SyntaxError, TooDeepSnafu, TrailingInputSnafu,
  UnexpectedSnafu,
};
use crate::tokenizer::{Token, TokenKind, tokenize};

/// Tokenize and parse a single expression.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
  let tokens = tokenize(source)?;
  parse_tokens(tokens)
}

/// Deepest tree, counted in nodes from root to leaf, the parser will build.
/// Later passes recurse over the tree, so this also bounds their stack use.
pub const MAX_DEPTH: usize = 256;

/// Parse a complete token stream. The stream must end in an `Eof` token;
/// a missing terminator is treated as if it were there.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Expr, ParseError> {
  let mut stream = TokenStream::new(tokens);
  let node = parse_expr(&mut stream)?;

  let token = stream.peek();
  ensure!(
    token.kind == TokenKind::Eof,
    TrailingInputSnafu {
      found: token.describe(),
      loc: token.loc,
    }
  );

  Ok(node.expr)
}

/// A parsed subtree and its height.
struct Node {
  expr: Expr,
  height: usize,
}

impl Node {
  fn leaf(expr: Expr) -> Self {
    Self { expr, height: 1 }
  }

  fn binary(op: BinaryOp, lhs: Node, rhs: Node, loc: usize) -> Result<Self, SyntaxError> {
    let height = 1 + lhs.height.max(rhs.height);
    ensure!(height <= MAX_DEPTH, TooDeepSnafu { loc });
    Ok(Self {
      expr: Expr::binary(op, lhs.expr, rhs.expr),
      height,
    })
  }

  fn unary(op: UnaryOp, operand: Node, loc: usize) -> Result<Self, SyntaxError> {
    let height = 1 + operand.height;
    ensure!(height <= MAX_DEPTH, TooDeepSnafu { loc });
    Ok(Self {
      expr: Expr::unary(op, operand.expr),
      height,
    })
  }
}

fn parse_expr(stream: &mut TokenStream) -> Result<Node, SyntaxError> {
  let mut node = parse_term(stream)?;

  loop {
    let op = match stream.peek().kind {
      TokenKind::Plus => BinaryOp::Add,
      TokenKind::Minus => BinaryOp::Sub,
      _ => break,
    };
    let loc = stream.peek().loc;
    stream.advance();
    let rhs = parse_term(stream)?;
    node = Node::binary(op, node, rhs, loc)?;
  }

  Ok(node)
}

fn parse_term(stream: &mut TokenStream) -> Result<Node, SyntaxError> {
  let mut node = parse_factor(stream)?;

  loop {
    let op = match stream.peek().kind {
      TokenKind::Star => BinaryOp::Mul,
      TokenKind::Slash => BinaryOp::Div,
      _ => break,
    };
    let loc = stream.peek().loc;
    stream.advance();
    let rhs = parse_factor(stream)?;
    node = Node::binary(op, node, rhs, loc)?;
  }

  Ok(node)
}

fn parse_factor(stream: &mut TokenStream) -> Result<Node, SyntaxError> {
  let token = stream.peek().clone();

  match token.kind {
    TokenKind::Num => {
      stream.advance();
      number(&token).map(Node::leaf)
    }
    TokenKind::LParen => {
      stream.advance();
      stream.enter(token.loc)?;
      let node = parse_expr(stream)?;
      stream.skip(TokenKind::RParen)?;
      stream.leave();
      Ok(node)
    }
    TokenKind::Plus | TokenKind::Minus => {
      stream.advance();
      let op = if token.kind == TokenKind::Plus {
        UnaryOp::Plus
      } else {
        UnaryOp::Minus
      };
      stream.enter(token.loc)?;
      let operand = parse_factor(stream)?;
      stream.leave();
      Node::unary(op, operand, token.loc)
    }
    _ => UnexpectedSnafu {
      found: token.describe(),
      loc: token.loc,
    }
    .fail(),
  }
}

/// Convert a number token into a leaf. Literals that overflow to infinity or
/// underflow to zero are rejected rather than rounded.
fn number(token: &Token) -> Result<Expr, SyntaxError> {
  let invalid = || {
    InvalidNumberSnafu {
      text: token.text.as_str(),
      loc: token.loc,
    }
    .build()
  };
  let value: f64 = token.text.parse().map_err(|_| invalid())?;
  let underflowed = value == 0.0 && token.text.bytes().any(|b| matches!(b, b'1'..=b'9'));
  if !value.is_finite() || underflowed {
    return Err(invalid());
  }
  Ok(Expr::number(value))
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
  eof: Token,
  /// Open parentheses and prefix operators currently being parsed.
  nesting: usize,
}

impl TokenStream {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>) -> Self {
    let end = tokens
      .last()
      .map(|token| token.loc + token.text.len())
      .unwrap_or(0);
    Self {
      tokens,
      pos: 0,
      eof: Token::new(TokenKind::Eof, "", end),
      nesting: 0,
    }
  }

  /// Current token; past the end of the vector this is a synthetic `Eof`.
  fn peek(&self) -> &Token {
    self.tokens.get(self.pos).unwrap_or(&self.eof)
  }

  fn advance(&mut self) {
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
  }

  /// Descend into a nested factor, failing once the nesting bound is passed.
  fn enter(&mut self, loc: usize) -> Result<(), SyntaxError> {
    ensure!(self.nesting < MAX_DEPTH, TooDeepSnafu { loc });
    self.nesting += 1;
    Ok(())
  }

  fn leave(&mut self) {
    self.nesting -= 1;
  }

  /// Consume a token of the given kind or report what was found instead.
  fn skip(&mut self, kind: TokenKind) -> Result<(), SyntaxError> {
    let token = self.peek();
    ensure!(
      token.kind == kind,
      ExpectedSnafu {
        expected: kind.describe(),
        found: token.describe(),
        loc: token.loc,
      }
    );
    self.advance();
    Ok(())
  }
}
