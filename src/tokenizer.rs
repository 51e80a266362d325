//! Lexical analysis: turns the raw input string into typed tokens.
//!
//! The tokenizer is pulled one token at a time through `next_token`; it knows
//! nothing about the grammar beyond operators, parentheses and numeric
//! literals. `tokenize` drains it into a vector for callers that want the
//! whole stream up front.

use snafu::ensure;

use crate::error::{InvalidCharacterSnafu, LexError, MalformedNumberSnafu};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Num,
  Plus,
  Minus,
  Star,
  Slash,
  LParen,
  RParen,
  Eof,
}

impl TokenKind {
  fn from_byte(c: u8) -> Option<Self> {
    match c {
      b'+' => Some(TokenKind::Plus),
      b'-' => Some(TokenKind::Minus),
      b'*' => Some(TokenKind::Star),
      b'/' => Some(TokenKind::Slash),
      b'(' => Some(TokenKind::LParen),
      b')' => Some(TokenKind::RParen),
      _ => None,
    }
  }

  /// Name used when a production expects this kind of token.
  pub fn describe(self) -> &'static str {
    match self {
      TokenKind::Num => "a number",
      TokenKind::Plus => "\"+\"",
      TokenKind::Minus => "\"-\"",
      TokenKind::Star => "\"*\"",
      TokenKind::Slash => "\"/\"",
      TokenKind::LParen => "\"(\"",
      TokenKind::RParen => "\")\"",
      TokenKind::Eof => "EOF",
    }
  }
}

/// A lexical unit. Number tokens keep their literal text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub loc: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, loc: usize) -> Self {
    Self {
      kind,
      text: text.into(),
      loc,
    }
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(&self) -> String {
    match self.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => format!("\"{}\"", self.text),
    }
  }
}

/// Cursor over the source bytes.
pub struct Tokenizer<'a> {
  input: &'a str,
  pos: usize,
}

impl<'a> Tokenizer<'a> {
  pub fn new(input: &'a str) -> Self {
    Self { input, pos: 0 }
  }

  /// Produce the next token. Once the input is exhausted every call returns `Eof`.
  pub fn next_token(&mut self) -> Result<Token, LexError> {
    let bytes = self.input.as_bytes();

    while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
      self.pos += 1;
    }

    let Some(&c) = bytes.get(self.pos) else {
      return Ok(Token::new(TokenKind::Eof, "", self.input.len()));
    };

    if c.is_ascii_digit() {
      return self.number();
    }

    if let Some(kind) = TokenKind::from_byte(c) {
      let start = self.pos;
      self.pos += 1;
      return Ok(Token::new(kind, &self.input[start..self.pos], start));
    }

    let ch = self.input[self.pos..].chars().next().unwrap_or('\0');
    InvalidCharacterSnafu { ch, loc: self.pos }.fail()
  }

  /// Scan digits with at most one decimal point.
  fn number(&mut self) -> Result<Token, LexError> {
    let bytes = self.input.as_bytes();
    let start = self.pos;
    let mut seen_point = false;

    while let Some(&c) = bytes.get(self.pos) {
      if c == b'.' {
        ensure!(
          !seen_point,
          MalformedNumberSnafu {
            text: &self.input[start..=self.pos],
            loc: start,
          }
        );
        seen_point = true;
      } else if !c.is_ascii_digit() {
        break;
      }
      self.pos += 1;
    }

    Ok(Token::new(TokenKind::Num, &self.input[start..self.pos], start))
  }
}

/// Lex the input into a flat vector of tokens terminated by a single `Eof` marker.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
  let mut tokenizer = Tokenizer::new(input);
  let mut tokens = Vec::new();
  loop {
    let token = tokenizer.next_token()?;
    let done = token.kind == TokenKind::Eof;
    tokens.push(token);
    if done {
      return Ok(tokens);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(input: &str) -> Vec<TokenKind> {
    tokenize(input)
      .unwrap()
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn operators_and_parens() {
    use TokenKind::*;
    assert_eq!(
      kinds("(1 + 2) * 3 / -4"),
      vec![LParen, Num, Plus, Num, RParen, Star, Num, Slash, Minus, Num, Eof]
    );
  }

  #[test]
  fn numbers_keep_their_text() {
    let tokens = tokenize("  3.14 +\t10  5.").unwrap();
    let texts: Vec<_> = tokens.iter().map(|token| token.text.as_str()).collect();
    assert_eq!(texts, vec!["3.14", "+", "10", "5.", ""]);
    assert_eq!(tokens[0].loc, 2);
    assert_eq!(tokens[2].loc, 9);
  }

  #[test]
  fn eof_is_sticky() {
    let mut tokenizer = Tokenizer::new("7");
    assert_eq!(tokenizer.next_token().unwrap().kind, TokenKind::Num);
    for _ in 0..3 {
      assert_eq!(tokenizer.next_token().unwrap().kind, TokenKind::Eof);
    }
  }

  #[test]
  fn empty_input_is_only_eof() {
    assert_eq!(kinds(""), vec![TokenKind::Eof]);
    assert_eq!(kinds("   "), vec![TokenKind::Eof]);
  }

  #[test]
  fn second_decimal_point_is_fatal() {
    let err = tokenize("1 + 1.2.3").unwrap_err();
    assert_eq!(
      err,
      LexError::MalformedNumber {
        text: "1.2.".to_string(),
        loc: 4,
      }
    );
  }

  #[test]
  fn invalid_characters_are_reported_with_position() {
    assert_eq!(
      tokenize("2 ^ 3").unwrap_err(),
      LexError::InvalidCharacter { ch: '^', loc: 2 }
    );
    assert_eq!(
      tokenize("1+é").unwrap_err(),
      LexError::InvalidCharacter { ch: 'é', loc: 2 }
    );
  }

  #[test]
  fn leading_decimal_point_is_not_a_number() {
    assert_eq!(
      tokenize(".5").unwrap_err(),
      LexError::InvalidCharacter { ch: '.', loc: 0 }
    );
  }
}
