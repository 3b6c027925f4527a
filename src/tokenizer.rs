//! Lexical analysis: turns the raw input string into a lazy stream of tokens.
//!
//! The tokenizer is an iterator; tokens are produced on demand as the parser
//! asks for them and the sequence always ends with a single `Eof` token.
//! After the `Eof` token (or the first error) the iterator is exhausted and
//! cannot be restarted.

use std::fmt;

use crate::error::{CompileError, CompileResult};

/// Identifiers are at most this many characters long; a longer run of word
/// characters continues as the next token.
pub const MAX_IDENTIFIER_LEN: usize = 31;

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  LeftBrace,
  RightBrace,
  LeftParen,
  RightParen,
  Semicolon,
  Comma,
  TypeSpecifier,
  Return,
  If,
  Else,
  IntegerConstant,
  DoubleConstant,
  Identifier,
  Assignment,
  ArithmeticOperator,
  Eof,
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::LeftBrace => "'{'",
      Self::RightBrace => "'}'",
      Self::LeftParen => "'('",
      Self::RightParen => "')'",
      Self::Semicolon => "';'",
      Self::Comma => "','",
      Self::TypeSpecifier => "type specifier",
      Self::Return => "'return'",
      Self::If => "'if'",
      Self::Else => "'else'",
      Self::IntegerConstant => "integer constant",
      Self::DoubleConstant => "double constant",
      Self::Identifier => "identifier",
      Self::Assignment => "'='",
      Self::ArithmeticOperator => "arithmetic operator",
      Self::Eof => "end of input",
    };
    f.write_str(text)
  }
}

/// A lexeme together with its kind and 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub value: String,
  pub line: usize,
  pub column: usize,
}

impl Token {
  pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Self {
    Self {
      kind,
      value: value.into(),
      line,
      column,
    }
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(&self) -> String {
    match self.kind {
      TokenKind::Eof => "end of input".to_string(),
      _ => format!("'{}'", self.value),
    }
  }
}

/// Lazy tokenizer over a source string.
pub struct Tokenizer<'a> {
  source: &'a str,
  pos: usize,
  line: usize,
  column: usize,
  finished: bool,
}

impl<'a> Tokenizer<'a> {
  pub fn new(source: &'a str) -> Self {
    Self {
      source,
      pos: 0,
      line: 1,
      column: 1,
      finished: false,
    }
  }

  fn peek_char(&self) -> Option<char> {
    self.source[self.pos..].chars().next()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek_char()?;
    self.pos += c.len_utf8();
    self.column += 1;
    Some(c)
  }

  fn skip_whitespace(&mut self) {
    while let Some(c) = self.peek_char() {
      match c {
        '\n' => {
          self.bump();
          self.line += 1;
          self.column = 1;
        }
        ' ' | '\t' | '\r' => {
          self.bump();
        }
        _ => break,
      }
    }
  }

  fn scan(&mut self) -> CompileResult<Token> {
    self.skip_whitespace();
    let (line, column) = (self.line, self.column);
    let start = self.pos;

    let Some(c) = self.peek_char() else {
      return Ok(Token::new(TokenKind::Eof, "", line, column));
    };

    let kind = match c {
      '{' => TokenKind::LeftBrace,
      '}' => TokenKind::RightBrace,
      '(' => TokenKind::LeftParen,
      ')' => TokenKind::RightParen,
      ';' => TokenKind::Semicolon,
      ',' => TokenKind::Comma,
      '=' => TokenKind::Assignment,
      '+' | '-' | '*' | '/' => TokenKind::ArithmeticOperator,
      '0'..='9' => return self.scan_number(line, column),
      c if c == '_' || c.is_ascii_alphabetic() => return Ok(self.scan_word(line, column)),
      other => {
        return Err(CompileError::lexical(
          line,
          column,
          format!("unexpected character '{other}'"),
        ));
      }
    };

    self.bump();
    Ok(Token::new(kind, &self.source[start..self.pos], line, column))
  }

  fn scan_number(&mut self, line: usize, column: usize) -> CompileResult<Token> {
    let start = self.pos;
    self.eat_digits();

    if self.peek_char() == Some('.') {
      self.bump();
      self.eat_digits();
      let text = &self.source[start..self.pos];
      text.parse::<f64>().map_err(|err| {
        CompileError::lexical(line, column, format!("invalid double constant '{text}': {err}"))
      })?;
      return Ok(Token::new(TokenKind::DoubleConstant, text, line, column));
    }

    let text = &self.source[start..self.pos];
    text.parse::<i32>().map_err(|_| {
      CompileError::lexical(
        line,
        column,
        format!("integer constant '{text}' does not fit in type 'int'"),
      )
    })?;
    Ok(Token::new(TokenKind::IntegerConstant, text, line, column))
  }

  fn eat_digits(&mut self) {
    while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
      self.bump();
    }
  }

  fn scan_word(&mut self, line: usize, column: usize) -> Token {
    let start = self.pos;
    let mut len = 0;
    while len < MAX_IDENTIFIER_LEN
      && self
        .peek_char()
        .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric())
    {
      self.bump();
      len += 1;
    }

    let text = &self.source[start..self.pos];
    let kind = match text {
      "int" | "double" => TokenKind::TypeSpecifier,
      "return" => TokenKind::Return,
      "if" => TokenKind::If,
      "else" => TokenKind::Else,
      _ => TokenKind::Identifier,
    };
    Token::new(kind, text, line, column)
  }
}

impl Iterator for Tokenizer<'_> {
  type Item = CompileResult<Token>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    let result = self.scan();
    if matches!(&result, Ok(token) if token.kind != TokenKind::Eof) {
      return Some(result);
    }
    self.finished = true;
    Some(result)
  }
}

impl std::iter::FusedIterator for Tokenizer<'_> {}

/// Lex the whole input eagerly. Mostly useful for tests and diagnostics.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
  Tokenizer::new(source).collect()
}

#[cfg(test)]
mod tests {
  use super::{Token, TokenKind, tokenize};
  use crate::error::CompileError;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  macro_rules! test_tokenizer {
    ($name:ident, $source:expr, $expected:expr) => {
      #[test]
      fn $name() {
        assert_eq!(kinds($source), $expected);
      }
    };
  }

  test_tokenizer!(
    can_tokenize_function_header,
    "int main(int x)",
    vec![
      TokenKind::TypeSpecifier,
      TokenKind::Identifier,
      TokenKind::LeftParen,
      TokenKind::TypeSpecifier,
      TokenKind::Identifier,
      TokenKind::RightParen,
      TokenKind::Eof,
    ]
  );

  test_tokenizer!(
    can_tokenize_assignment_with_operators,
    "a = 2 + 3.5 * -b / c;",
    vec![
      TokenKind::Identifier,
      TokenKind::Assignment,
      TokenKind::IntegerConstant,
      TokenKind::ArithmeticOperator,
      TokenKind::DoubleConstant,
      TokenKind::ArithmeticOperator,
      TokenKind::ArithmeticOperator,
      TokenKind::Identifier,
      TokenKind::ArithmeticOperator,
      TokenKind::Identifier,
      TokenKind::Semicolon,
      TokenKind::Eof,
    ]
  );

  test_tokenizer!(
    can_tokenize_keywords,
    "if (x) return y; else { f(a, b); }",
    vec![
      TokenKind::If,
      TokenKind::LeftParen,
      TokenKind::Identifier,
      TokenKind::RightParen,
      TokenKind::Return,
      TokenKind::Identifier,
      TokenKind::Semicolon,
      TokenKind::Else,
      TokenKind::LeftBrace,
      TokenKind::Identifier,
      TokenKind::LeftParen,
      TokenKind::Identifier,
      TokenKind::Comma,
      TokenKind::Identifier,
      TokenKind::RightParen,
      TokenKind::Semicolon,
      TokenKind::RightBrace,
      TokenKind::Eof,
    ]
  );

  test_tokenizer!(
    keywords_are_whole_words,
    "integer returned iffy",
    vec![
      TokenKind::Identifier,
      TokenKind::Identifier,
      TokenKind::Identifier,
      TokenKind::Eof,
    ]
  );

  test_tokenizer!(empty_source_is_just_eof, "  \n\t ", vec![TokenKind::Eof]);

  #[test]
  fn positions_reset_at_newline() {
    let tokens = tokenize("int a;\n  a = 10;\n").unwrap();
    let positions: Vec<(usize, usize)> = tokens.iter().map(|t| (t.line, t.column)).collect();
    assert_eq!(
      positions,
      vec![(1, 1), (1, 5), (1, 6), (2, 3), (2, 5), (2, 7), (2, 9), (3, 1)]
    );
    let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
    assert!(lines.windows(2).all(|pair| pair[0] <= pair[1]));
  }

  #[test]
  fn numbers_keep_their_lexeme() {
    let tokens = tokenize("42 3.25 7.").unwrap();
    assert_eq!(tokens[0], Token::new(TokenKind::IntegerConstant, "42", 1, 1));
    assert_eq!(tokens[1], Token::new(TokenKind::DoubleConstant, "3.25", 1, 4));
    assert_eq!(tokens[2], Token::new(TokenKind::DoubleConstant, "7.", 1, 9));
  }

  #[test]
  fn long_identifiers_are_split_after_31_characters() {
    let name = "a".repeat(33);
    let tokens = tokenize(&name).unwrap();
    assert_eq!(tokens[0].value.len(), 31);
    assert_eq!(tokens[1].value, "aa");
    assert_eq!(tokens[1].column, 32);
  }

  #[test]
  fn unexpected_character_reports_position() {
    let err = tokenize("int main() {\n  return 1 % 2;\n}").unwrap_err();
    assert_eq!(
      err,
      CompileError::lexical(2, 12, "unexpected character '%'")
    );
  }

  #[test]
  fn integer_constants_must_fit_int() {
    let err = tokenize("2147483648").unwrap_err();
    assert_eq!(err.position(), Some((1, 1)));
    assert!(tokenize("2147483647").is_ok());
  }

  #[test]
  fn iterator_stops_after_eof() {
    let mut tokenizer = super::Tokenizer::new("x");
    assert!(tokenizer.next().is_some());
    assert_eq!(tokenizer.next().unwrap().unwrap().kind, TokenKind::Eof);
    assert!(tokenizer.next().is_none());
    assert!(tokenizer.next().is_none());
  }
}
