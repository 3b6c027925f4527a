//! Abstract syntax tree produced by the parser.
//!
//! The tree is a closed sum type: every pass matches exhaustively on
//! `NodeKind`, so adding a node kind forces every pass to handle it. Each
//! node owns its children, keeps the token it was built from for
//! diagnostics, and carries the scope the resolver attached to it. Nodes
//! never point at their parent.

use std::fmt;

use crate::symtab::ScopeId;
use crate::tokenizer::Token;
use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "+" => Some(Self::Add),
      "-" => Some(Self::Sub),
      "*" => Some(Self::Mul),
      "/" => Some(Self::Div),
      _ => None,
    }
  }

  pub fn symbol(&self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Plus,
  Minus,
}

impl UnaryOp {
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    match symbol {
      "+" => Some(Self::Plus),
      "-" => Some(Self::Minus),
      _ => None,
    }
  }

  pub fn symbol(&self) -> &'static str {
    match self {
      Self::Plus => "+",
      Self::Minus => "-",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  NoOperation,
  TranslationUnit {
    functions: Vec<Node>,
  },
  FunctionDefinition {
    return_type: Type,
    name: String,
    parameters: Vec<Node>,
    body: Box<Node>,
  },
  Parameter {
    ty: Type,
    name: String,
  },
  FunctionCall {
    callee: Box<Node>,
    arguments: Vec<Node>,
  },
  ReturnStatement {
    value: Box<Node>,
  },
  CompoundStatement {
    declarations: Vec<Node>,
    statements: Vec<Node>,
  },
  Declaration {
    ty: Type,
    name: String,
  },
  Assignment {
    target: String,
    value: Box<Node>,
  },
  IfStatement {
    condition: Box<Node>,
    consequent: Box<Node>,
    alternative: Option<Box<Node>>,
  },
  BinaryOperator {
    op: BinaryOp,
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  UnaryOperator {
    op: UnaryOp,
    operand: Box<Node>,
  },
  Identifier {
    name: String,
  },
  IntegerConstant {
    value: i32,
  },
  RealConstant {
    value: f64,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub kind: NodeKind,
  pub token: Token,
  pub scope: Option<ScopeId>,
}

impl Node {
  pub fn new(kind: NodeKind, token: Token) -> Self {
    Self {
      kind,
      token,
      scope: None,
    }
  }

  pub fn no_operation(token: Token) -> Self {
    Self::new(NodeKind::NoOperation, token)
  }

  pub fn identifier(token: Token) -> Self {
    let name = token.value.clone();
    Self::new(NodeKind::Identifier { name }, token)
  }

  pub fn binary(token: Token, op: BinaryOp, lhs: Node, rhs: Node) -> Self {
    Self::new(
      NodeKind::BinaryOperator {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      token,
    )
  }

  pub fn unary(token: Token, op: UnaryOp, operand: Node) -> Self {
    Self::new(
      NodeKind::UnaryOperator {
        op,
        operand: Box::new(operand),
      },
      token,
    )
  }

  /// Name of the node kind, as used in dumps and graphs.
  pub fn kind_name(&self) -> &'static str {
    match &self.kind {
      NodeKind::NoOperation => "NoOperation",
      NodeKind::TranslationUnit { .. } => "TranslationUnit",
      NodeKind::FunctionDefinition { .. } => "FunctionDefinition",
      NodeKind::Parameter { .. } => "Parameter",
      NodeKind::FunctionCall { .. } => "FunctionCall",
      NodeKind::ReturnStatement { .. } => "ReturnStatement",
      NodeKind::CompoundStatement { .. } => "CompoundStatement",
      NodeKind::Declaration { .. } => "Declaration",
      NodeKind::Assignment { .. } => "Assignment",
      NodeKind::IfStatement { .. } => "IfStatement",
      NodeKind::BinaryOperator { .. } => "BinaryOperator",
      NodeKind::UnaryOperator { .. } => "UnaryOperator",
      NodeKind::Identifier { .. } => "Identifier",
      NodeKind::IntegerConstant { .. } => "IntegerConstant",
      NodeKind::RealConstant { .. } => "RealConstant",
    }
  }

  /// Children in source order.
  pub fn children(&self) -> Vec<&Node> {
    match &self.kind {
      NodeKind::NoOperation
      | NodeKind::Parameter { .. }
      | NodeKind::Declaration { .. }
      | NodeKind::Identifier { .. }
      | NodeKind::IntegerConstant { .. }
      | NodeKind::RealConstant { .. } => Vec::new(),
      NodeKind::TranslationUnit { functions } => functions.iter().collect(),
      NodeKind::FunctionDefinition {
        parameters, body, ..
      } => parameters
        .iter()
        .chain(std::iter::once(body.as_ref()))
        .collect(),
      NodeKind::FunctionCall { callee, arguments } => std::iter::once(callee.as_ref())
        .chain(arguments.iter())
        .collect(),
      NodeKind::ReturnStatement { value } | NodeKind::Assignment { value, .. } => {
        vec![value.as_ref()]
      }
      NodeKind::CompoundStatement {
        declarations,
        statements,
      } => declarations.iter().chain(statements.iter()).collect(),
      NodeKind::IfStatement {
        condition,
        consequent,
        alternative,
      } => {
        let mut children = vec![condition.as_ref(), consequent.as_ref()];
        if let Some(alternative) = alternative {
          children.push(alternative.as_ref());
        }
        children
      }
      NodeKind::BinaryOperator { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
      NodeKind::UnaryOperator { operand, .. } => vec![operand.as_ref()],
    }
  }

  /// Visit this node and all its descendants in pre-order.
  pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
    visit(self);
    for child in self.children() {
      child.walk(visit);
    }
  }

  /// Pre-order list of every node in the tree.
  pub fn descendants(&self) -> Vec<&Node> {
    let mut nodes = Vec::new();
    self.walk(&mut |node| nodes.push(node));
    nodes
  }
}

/// Parenthesised source-like rendering, handy for checking associativity.
impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      NodeKind::NoOperation => write!(f, ";"),
      NodeKind::TranslationUnit { functions } => {
        for function in functions {
          writeln!(f, "{function}")?;
        }
        Ok(())
      }
      NodeKind::FunctionDefinition {
        return_type,
        name,
        parameters,
        body,
      } => {
        let parameters: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
        write!(f, "{return_type} {name}({}) {body}", parameters.join(", "))
      }
      NodeKind::Parameter { ty, name } => write!(f, "{ty} {name}"),
      NodeKind::FunctionCall { callee, arguments } => {
        let arguments: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
        write!(f, "{callee}({})", arguments.join(", "))
      }
      NodeKind::ReturnStatement { value } => write!(f, "return {value};"),
      NodeKind::CompoundStatement {
        declarations,
        statements,
      } => {
        write!(f, "{{")?;
        for item in declarations.iter().chain(statements.iter()) {
          write!(f, " {item}")?;
        }
        write!(f, " }}")
      }
      NodeKind::Declaration { ty, name } => write!(f, "{ty} {name};"),
      NodeKind::Assignment { target, value } => write!(f, "{target} = {value};"),
      NodeKind::IfStatement {
        condition,
        consequent,
        alternative,
      } => {
        write!(f, "if ({condition}) {consequent}")?;
        match alternative {
          Some(alternative) => write!(f, " else {alternative}"),
          None => Ok(()),
        }
      }
      NodeKind::BinaryOperator { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
      NodeKind::UnaryOperator { op, operand } => write!(f, "({}{operand})", op.symbol()),
      NodeKind::Identifier { name } => write!(f, "{name}"),
      NodeKind::IntegerConstant { value } => write!(f, "{value}"),
      NodeKind::RealConstant { value } => write!(f, "{value:?}"),
    }
  }
}
