//! Recursive-descent parser producing the syntax tree.
//!
//! One function per grammar rule, each deciding what to do from the kind of
//! the next token alone. Binary operators are folded iteratively so that
//! operators of equal precedence associate to the left. The first mismatch
//! aborts the parse; no partial tree is ever returned.

use crate::ast::{BinaryOp, Node, NodeKind, UnaryOp};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, Tokenizer};
use crate::ty::Type;

/// Parse a whole translation unit.
pub fn parse(source: &str) -> CompileResult<Node> {
  let mut stream = TokenStream::new(Tokenizer::new(source))?;
  parse_translation_unit(&mut stream)
}

fn parse_translation_unit(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut functions = vec![parse_function_definition(stream)?];
  while stream.check(TokenKind::TypeSpecifier) {
    functions.push(parse_function_definition(stream)?);
  }
  let token = stream.eat(TokenKind::Eof)?;
  Ok(Node::new(NodeKind::TranslationUnit { functions }, token))
}

fn parse_function_definition(stream: &mut TokenStream) -> CompileResult<Node> {
  let return_type = parse_type_specifier(stream)?;
  let name = stream.eat(TokenKind::Identifier)?;
  stream.eat(TokenKind::LeftParen)?;
  let parameters = if stream.check(TokenKind::RightParen) {
    Vec::new()
  } else {
    parse_parameter_list(stream)?
  };
  stream.eat(TokenKind::RightParen)?;
  let body = parse_compound_statement(stream)?;

  Ok(Node::new(
    NodeKind::FunctionDefinition {
      return_type,
      name: name.value.clone(),
      parameters,
      body: Box::new(body),
    },
    name,
  ))
}

fn parse_parameter_list(stream: &mut TokenStream) -> CompileResult<Vec<Node>> {
  let mut parameters = vec![parse_parameter(stream)?];
  while stream.check(TokenKind::Comma) {
    stream.eat(TokenKind::Comma)?;
    parameters.push(parse_parameter(stream)?);
  }
  Ok(parameters)
}

fn parse_parameter(stream: &mut TokenStream) -> CompileResult<Node> {
  let ty = parse_type_specifier(stream)?;
  let name = stream.eat(TokenKind::Identifier)?;
  Ok(Node::new(
    NodeKind::Parameter {
      ty,
      name: name.value.clone(),
    },
    name,
  ))
}

fn parse_type_specifier(stream: &mut TokenStream) -> CompileResult<Type> {
  let token = stream.eat(TokenKind::TypeSpecifier)?;
  Type::from_specifier(&token.value).ok_or_else(|| {
    CompileError::syntax(
      token.line,
      token.column,
      format!("unknown type specifier '{}'", token.value),
    )
  })
}

fn parse_compound_statement(stream: &mut TokenStream) -> CompileResult<Node> {
  let token = stream.eat(TokenKind::LeftBrace)?;
  if stream.check(TokenKind::RightBrace) {
    stream.eat(TokenKind::RightBrace)?;
    return Ok(Node::no_operation(token));
  }

  let mut declarations = Vec::new();
  while stream.check(TokenKind::TypeSpecifier) {
    declarations.push(parse_declaration(stream)?);
  }

  let mut statements = Vec::new();
  while !stream.check(TokenKind::RightBrace) {
    statements.push(parse_statement(stream)?);
  }
  stream.eat(TokenKind::RightBrace)?;

  Ok(Node::new(
    NodeKind::CompoundStatement {
      declarations,
      statements,
    },
    token,
  ))
}

fn parse_declaration(stream: &mut TokenStream) -> CompileResult<Node> {
  let ty = parse_type_specifier(stream)?;
  let name = stream.eat(TokenKind::Identifier)?;
  stream.eat(TokenKind::Semicolon)?;
  Ok(Node::new(
    NodeKind::Declaration {
      ty,
      name: name.value.clone(),
    },
    name,
  ))
}

fn parse_statement(stream: &mut TokenStream) -> CompileResult<Node> {
  match stream.peek().kind {
    TokenKind::LeftBrace => parse_compound_statement(stream),
    TokenKind::Return => parse_return_statement(stream),
    TokenKind::If => parse_if_statement(stream),
    _ => parse_expression_statement(stream),
  }
}

fn parse_return_statement(stream: &mut TokenStream) -> CompileResult<Node> {
  let token = stream.eat(TokenKind::Return)?;
  let value = parse_expr(stream)?;
  stream.eat(TokenKind::Semicolon)?;
  Ok(Node::new(
    NodeKind::ReturnStatement {
      value: Box::new(value),
    },
    token,
  ))
}

fn parse_if_statement(stream: &mut TokenStream) -> CompileResult<Node> {
  let token = stream.eat(TokenKind::If)?;
  stream.eat(TokenKind::LeftParen)?;
  let condition = parse_expr(stream)?;
  stream.eat(TokenKind::RightParen)?;
  let consequent = parse_statement(stream)?;
  let alternative = if stream.check(TokenKind::Else) {
    stream.eat(TokenKind::Else)?;
    Some(Box::new(parse_statement(stream)?))
  } else {
    None
  };

  Ok(Node::new(
    NodeKind::IfStatement {
      condition: Box::new(condition),
      consequent: Box::new(consequent),
      alternative,
    },
    token,
  ))
}

fn parse_expression_statement(stream: &mut TokenStream) -> CompileResult<Node> {
  if stream.check(TokenKind::Semicolon) {
    let token = stream.eat(TokenKind::Semicolon)?;
    return Ok(Node::no_operation(token));
  }

  let target = stream.eat(TokenKind::Identifier)?;
  stream.eat(TokenKind::Assignment)?;
  let value = parse_expr(stream)?;
  stream.eat(TokenKind::Semicolon)?;

  Ok(Node::new(
    NodeKind::Assignment {
      target: target.value.clone(),
      value: Box::new(value),
    },
    target,
  ))
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_add(stream)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut node = parse_mul(stream)?;

  while let Some(op) = stream.peek_operator(&["+", "-"]).and_then(BinaryOp::from_symbol) {
    let token = stream.eat(TokenKind::ArithmeticOperator)?;
    let rhs = parse_mul(stream)?;
    node = Node::binary(token, op, node, rhs);
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut node = parse_unary(stream)?;

  while let Some(op) = stream.peek_operator(&["*", "/"]).and_then(BinaryOp::from_symbol) {
    let token = stream.eat(TokenKind::ArithmeticOperator)?;
    let rhs = parse_unary(stream)?;
    node = Node::binary(token, op, node, rhs);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Node> {
  if let Some(op) = stream.peek_operator(&["+", "-"]).and_then(UnaryOp::from_symbol) {
    let token = stream.eat(TokenKind::ArithmeticOperator)?;
    let operand = parse_unary(stream)?;
    return Ok(Node::unary(token, op, operand));
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Node> {
  match stream.peek().kind {
    TokenKind::LeftParen => {
      stream.eat(TokenKind::LeftParen)?;
      let node = parse_expr(stream)?;
      stream.eat(TokenKind::RightParen)?;
      Ok(node)
    }
    TokenKind::Identifier => {
      let token = stream.eat(TokenKind::Identifier)?;
      if !stream.check(TokenKind::LeftParen) {
        return Ok(Node::identifier(token));
      }
      stream.eat(TokenKind::LeftParen)?;
      let arguments = if stream.check(TokenKind::RightParen) {
        Vec::new()
      } else {
        parse_argument_list(stream)?
      };
      stream.eat(TokenKind::RightParen)?;
      Ok(Node::new(
        NodeKind::FunctionCall {
          callee: Box::new(Node::identifier(token.clone())),
          arguments,
        },
        token,
      ))
    }
    TokenKind::IntegerConstant => {
      let token = stream.eat(TokenKind::IntegerConstant)?;
      let value = token.value.parse::<i32>().map_err(|err| {
        CompileError::syntax(
          token.line,
          token.column,
          format!("invalid integer constant '{}': {err}", token.value),
        )
      })?;
      Ok(Node::new(NodeKind::IntegerConstant { value }, token))
    }
    TokenKind::DoubleConstant => {
      let token = stream.eat(TokenKind::DoubleConstant)?;
      let value = token.value.parse::<f64>().map_err(|err| {
        CompileError::syntax(
          token.line,
          token.column,
          format!("invalid double constant '{}': {err}", token.value),
        )
      })?;
      Ok(Node::new(NodeKind::RealConstant { value }, token))
    }
    _ => {
      let token = stream.peek();
      Err(CompileError::syntax(
        token.line,
        token.column,
        format!("expected an expression, but got {}", token.describe()),
      ))
    }
  }
}

fn parse_argument_list(stream: &mut TokenStream) -> CompileResult<Vec<Node>> {
  let mut arguments = vec![parse_expr(stream)?];
  while stream.check(TokenKind::Comma) {
    stream.eat(TokenKind::Comma)?;
    arguments.push(parse_expr(stream)?);
  }
  Ok(arguments)
}

/// One-token lookahead cursor over the lazy tokenizer.
struct TokenStream<'a> {
  tokens: Tokenizer<'a>,
  current: Token,
}

impl<'a> TokenStream<'a> {
  fn new(mut tokens: Tokenizer<'a>) -> CompileResult<Self> {
    let current = match tokens.next() {
      Some(token) => token?,
      None => Token::new(TokenKind::Eof, "", 1, 1),
    };
    Ok(Self { tokens, current })
  }

  fn peek(&self) -> &Token {
    &self.current
  }

  fn check(&self, kind: TokenKind) -> bool {
    self.current.kind == kind
  }

  /// The current arithmetic operator, if it is one of `symbols`.
  fn peek_operator<'s>(&self, symbols: &[&'s str]) -> Option<&'s str> {
    if self.current.kind != TokenKind::ArithmeticOperator {
      return None;
    }
    symbols
      .iter()
      .copied()
      .find(|symbol| *symbol == self.current.value)
  }

  /// Consume the current token if it has the expected kind.
  fn eat(&mut self, kind: TokenKind) -> CompileResult<Token> {
    if self.current.kind != kind {
      return Err(CompileError::syntax(
        self.current.line,
        self.current.column,
        format!("expected {kind}, but got {}", self.current.describe()),
      ));
    }
    // Past the end the stream keeps answering with the final Eof token.
    let next = match self.tokens.next() {
      Some(token) => token?,
      None => self.current.clone(),
    };
    Ok(std::mem::replace(&mut self.current, next))
  }
}
