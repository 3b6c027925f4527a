//! Semantic analysis.
//!
//! Two independent passes over a resolved tree. The declaration pass checks
//! that the entry point exists and that every referenced name is declared;
//! the type pass computes a static type for every expression and checks it
//! against its context. Both stop at the first violation.

use crate::ast::{Node, NodeKind};
use crate::error::{CompileError, CompileResult};
use crate::resolver::scope_of;
use crate::symtab::{Symbol, SymbolId, SymbolTable};
use crate::ty::Type;

pub const ENTRY_POINT: &str = "main";

/// Run the declaration pass, then the type pass.
pub fn analyze(unit: &Node, table: &SymbolTable) -> CompileResult<()> {
  check_declarations(unit, table)?;
  check_types(unit, table)
}

/// Verify that `main` exists and that every name used is declared.
pub fn check_declarations(unit: &Node, table: &SymbolTable) -> CompileResult<()> {
  let NodeKind::TranslationUnit { functions } = &unit.kind else {
    return Err(CompileError::internal(
      "declaration pass must start at a translation unit",
    ));
  };
  let has_main = functions.iter().any(|function| {
    matches!(&function.kind, NodeKind::FunctionDefinition { name, .. } if name == ENTRY_POINT)
  });
  if !has_main {
    return Err(CompileError::semantic(
      unit.token.line,
      unit.token.column,
      format!("missing main: no '{ENTRY_POINT}' function is defined"),
    ));
  }

  DeclarationPass {
    table,
    ordinal: None,
  }
  .visit(unit)
}

/// Compute and check the static type of every expression.
pub fn check_types(unit: &Node, table: &SymbolTable) -> CompileResult<()> {
  TypePass {
    table,
    return_type: None,
  }
  .visit(unit)
  .map(|_| ())
}

fn lookup(table: &SymbolTable, node: &Node, name: &str) -> CompileResult<SymbolId> {
  let scope = scope_of(node)?;
  table.lookup(scope, name).ok_or_else(|| {
    CompileError::semantic(
      node.token.line,
      node.token.column,
      format!("undeclared identifier '{name}'"),
    )
  })
}

struct DeclarationPass<'a> {
  table: &'a SymbolTable,
  /// Definition ordinal of the function being checked.
  ordinal: Option<usize>,
}

impl DeclarationPass<'_> {
  fn visit(&mut self, node: &Node) -> CompileResult<()> {
    match &node.kind {
      NodeKind::FunctionDefinition { name, .. } => {
        // Parameters may shadow the function's own name inside its scope.
        let function = self
          .table
          .lookup_local(self.table.global(), name)
          .ok_or_else(|| CompileError::internal(format!("function '{name}' is not in the global scope")))?;
        if let Symbol::Function { ordinal, .. } = self.table.symbol(function) {
          self.ordinal = Some(*ordinal);
        }
        self.visit_children(node)?;
        self.ordinal = None;
      }
      NodeKind::FunctionCall { callee, .. } => {
        if let NodeKind::Identifier { name } = &callee.kind {
          let symbol = lookup(self.table, callee, name)?;
          if let (Symbol::Function { ordinal, .. }, Some(current)) =
            (self.table.symbol(symbol), self.ordinal)
            && *ordinal > current
          {
            return Err(CompileError::semantic(
              callee.token.line,
              callee.token.column,
              format!("function '{name}' is called before its definition"),
            ));
          }
        }
        self.visit_children(node)?;
      }
      NodeKind::Assignment { target, .. } => {
        lookup(self.table, node, target)?;
        self.visit_children(node)?;
      }
      NodeKind::Identifier { name } => {
        lookup(self.table, node, name)?;
      }
      NodeKind::NoOperation
      | NodeKind::TranslationUnit { .. }
      | NodeKind::Parameter { .. }
      | NodeKind::ReturnStatement { .. }
      | NodeKind::CompoundStatement { .. }
      | NodeKind::Declaration { .. }
      | NodeKind::IfStatement { .. }
      | NodeKind::BinaryOperator { .. }
      | NodeKind::UnaryOperator { .. }
      | NodeKind::IntegerConstant { .. }
      | NodeKind::RealConstant { .. } => self.visit_children(node)?,
    }
    Ok(())
  }

  fn visit_children(&mut self, node: &Node) -> CompileResult<()> {
    for child in node.children() {
      self.visit(child)?;
    }
    Ok(())
  }
}

struct TypePass<'a> {
  table: &'a SymbolTable,
  /// Declared return type of the function being checked.
  return_type: Option<Type>,
}

impl TypePass<'_> {
  /// Returns the type of expressions and `None` for everything else.
  fn visit(&mut self, node: &Node) -> CompileResult<Option<Type>> {
    let ty = match &node.kind {
      NodeKind::NoOperation | NodeKind::Parameter { .. } | NodeKind::Declaration { .. } => None,
      NodeKind::TranslationUnit { .. } | NodeKind::CompoundStatement { .. } => {
        for child in node.children() {
          self.visit(child)?;
        }
        None
      }
      NodeKind::FunctionDefinition {
        return_type,
        parameters,
        body,
        ..
      } => {
        let outer = self.return_type.replace(*return_type);
        for parameter in parameters {
          self.visit(parameter)?;
        }
        self.visit(body)?;
        self.return_type = outer;
        None
      }
      NodeKind::ReturnStatement { value } => {
        let actual = self.expression_type(value)?;
        let expected = self.return_type.ok_or_else(|| {
          CompileError::internal("return statement outside of a function")
        })?;
        if actual != expected {
          return Err(CompileError::semantic(
            node.token.line,
            node.token.column,
            format!(
              "type mismatch: returning '{actual}' from a function declared to return '{expected}'"
            ),
          ));
        }
        None
      }
      NodeKind::Assignment { target, value } => {
        let symbol = self.table.symbol(lookup(self.table, node, target)?);
        let Some(expected) = symbol.value_type() else {
          return Err(CompileError::semantic(
            node.token.line,
            node.token.column,
            format!("'{target}' is not a variable"),
          ));
        };
        let actual = self.expression_type(value)?;
        if actual != expected {
          return Err(CompileError::semantic(
            node.token.line,
            node.token.column,
            format!("type mismatch: cannot assign '{actual}' to '{target}' of type '{expected}'"),
          ));
        }
        None
      }
      NodeKind::IfStatement {
        condition,
        consequent,
        alternative,
      } => {
        self.expression_type(condition)?;
        self.visit(consequent)?;
        if let Some(alternative) = alternative {
          self.visit(alternative)?;
        }
        None
      }
      NodeKind::FunctionCall { callee, arguments } => Some(self.call_type(node, callee, arguments)?),
      NodeKind::BinaryOperator { op, lhs, rhs } => {
        let left = self.expression_type(lhs)?;
        let right = self.expression_type(rhs)?;
        if left != right {
          return Err(CompileError::semantic(
            node.token.line,
            node.token.column,
            format!(
              "incompatible types '{left}' and '{right}' for operator '{}'",
              op.symbol()
            ),
          ));
        }
        Some(left)
      }
      NodeKind::UnaryOperator { operand, .. } => Some(self.expression_type(operand)?),
      NodeKind::Identifier { name } => {
        let symbol = self.table.symbol(lookup(self.table, node, name)?);
        let ty = symbol.value_type().ok_or_else(|| {
          CompileError::semantic(
            node.token.line,
            node.token.column,
            format!("'{name}' is not a variable"),
          )
        })?;
        Some(ty)
      }
      NodeKind::IntegerConstant { .. } => Some(Type::Int),
      NodeKind::RealConstant { .. } => Some(Type::Double),
    };
    Ok(ty)
  }

  fn expression_type(&mut self, node: &Node) -> CompileResult<Type> {
    self.visit(node)?.ok_or_else(|| {
      CompileError::internal(format!("{} is not an expression", node.kind_name()))
    })
  }

  fn call_type(&mut self, node: &Node, callee: &Node, arguments: &[Node]) -> CompileResult<Type> {
    let NodeKind::Identifier { name } = &callee.kind else {
      return Err(CompileError::internal("callee must be an identifier"));
    };
    let table = self.table;
    let Symbol::Function {
      return_type,
      parameters,
      ..
    } = table.symbol(lookup(table, callee, name)?)
    else {
      return Err(CompileError::semantic(
        node.token.line,
        node.token.column,
        format!("'{name}' is not a function"),
      ));
    };

    if arguments.len() != parameters.len() {
      return Err(CompileError::semantic(
        node.token.line,
        node.token.column,
        format!(
          "function '{name}' expects {} argument(s), but {} were given",
          parameters.len(),
          arguments.len()
        ),
      ));
    }

    for (position, (argument, parameter)) in arguments.iter().zip(parameters).enumerate() {
      let actual = self.expression_type(argument)?;
      let expected = table.symbol(*parameter).value_type();
      if Some(actual) != expected {
        let expected = expected.map_or("?", |ty| ty.name());
        return Err(CompileError::semantic(
          argument.token.line,
          argument.token.column,
          format!(
            "type mismatch: argument {} of '{name}' is '{actual}', expected '{expected}'",
            position + 1
          ),
        ));
      }
    }

    Ok(*return_type)
  }
}
