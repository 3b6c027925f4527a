//! Scope resolution: builds the symbol table and attaches scopes to nodes.
//!
//! A single pre-order walk. The global scope exists from the start; every
//! function definition and every compound statement opens a child scope,
//! which is also the scope attached to that node. Every other node gets the
//! scope that is current when it is visited. A function's symbol goes into
//! the enclosing scope before its body is walked, so a function can call
//! itself.

use crate::ast::{Node, NodeKind};
use crate::error::{CompileError, CompileResult};
use crate::symtab::{ScopeId, SymbolId, SymbolTable};
use crate::tokenizer::Token;

/// Build the symbol table for a translation unit, attaching a scope to
/// every node along the way.
pub fn resolve(unit: &mut Node) -> CompileResult<SymbolTable> {
  let table = SymbolTable::new();
  let mut resolver = Resolver {
    current: table.global(),
    table,
    function: None,
  };
  resolver.visit(unit)?;
  Ok(resolver.table)
}

/// Scope attached to `node` by `resolve`.
pub fn scope_of(node: &Node) -> CompileResult<ScopeId> {
  node.scope.ok_or_else(|| {
    CompileError::internal(format!(
      "{} at {}:{} has no scope attached",
      node.kind_name(),
      node.token.line,
      node.token.column
    ))
  })
}

struct Resolver {
  table: SymbolTable,
  current: ScopeId,
  function: Option<SymbolId>,
}

impl Resolver {
  fn visit(&mut self, node: &mut Node) -> CompileResult<()> {
    node.scope = Some(self.current);

    match &mut node.kind {
      NodeKind::TranslationUnit { functions } => {
        for function in functions {
          self.visit(function)?;
        }
      }
      NodeKind::FunctionDefinition {
        return_type,
        name,
        parameters,
        body,
      } => {
        self.ensure_undefined(name, &node.token)?;
        let function = self
          .table
          .define_function(self.current, name, *return_type)?;
        let scope = self.table.push_scope(self.current);
        node.scope = Some(scope);

        let outer = std::mem::replace(&mut self.current, scope);
        let outer_function = self.function.replace(function);
        for parameter in parameters {
          self.visit(parameter)?;
        }
        self.visit(body)?;
        self.current = outer;
        self.function = outer_function;
      }
      NodeKind::Parameter { ty, name } => {
        self.ensure_undefined(name, &node.token)?;
        let function = self.enclosing_function(&node.token)?;
        self
          .table
          .define_parameter(self.current, function, name, *ty)?;
      }
      NodeKind::CompoundStatement {
        declarations,
        statements,
      } => {
        let scope = self.table.push_scope(self.current);
        node.scope = Some(scope);

        let outer = std::mem::replace(&mut self.current, scope);
        for declaration in declarations {
          self.visit(declaration)?;
        }
        for statement in statements {
          self.visit(statement)?;
        }
        self.current = outer;
      }
      NodeKind::Declaration { ty, name } => {
        self.ensure_undefined(name, &node.token)?;
        let function = self.enclosing_function(&node.token)?;
        self
          .table
          .define_variable(self.current, function, name, *ty)?;
      }
      NodeKind::FunctionCall { callee, arguments } => {
        self.visit(callee)?;
        for argument in arguments {
          self.visit(argument)?;
        }
      }
      NodeKind::ReturnStatement { value } | NodeKind::Assignment { value, .. } => {
        self.visit(value)?;
      }
      NodeKind::IfStatement {
        condition,
        consequent,
        alternative,
      } => {
        self.visit(condition)?;
        self.visit(consequent)?;
        if let Some(alternative) = alternative {
          self.visit(alternative)?;
        }
      }
      NodeKind::BinaryOperator { lhs, rhs, .. } => {
        self.visit(lhs)?;
        self.visit(rhs)?;
      }
      NodeKind::UnaryOperator { operand, .. } => self.visit(operand)?,
      NodeKind::NoOperation
      | NodeKind::Identifier { .. }
      | NodeKind::IntegerConstant { .. }
      | NodeKind::RealConstant { .. } => {}
    }

    Ok(())
  }

  fn ensure_undefined(&self, name: &str, token: &Token) -> CompileResult<()> {
    if self.table.lookup_local(self.current, name).is_some() {
      return Err(CompileError::semantic(
        token.line,
        token.column,
        format!("redefinition of '{name}'"),
      ));
    }
    Ok(())
  }

  fn enclosing_function(&self, token: &Token) -> CompileResult<SymbolId> {
    self.function.ok_or_else(|| {
      CompileError::internal(format!(
        "'{}' at {}:{} is declared outside of a function",
        token.value, token.line, token.column
      ))
    })
  }
}

#[cfg(test)]
mod tests {
  use super::{resolve, scope_of};
  use crate::ast::NodeKind;
  use crate::error::CompileError;
  use crate::parser::parse;
  use crate::symtab::Symbol;

  #[test]
  fn every_node_gets_a_scope() {
    let mut unit = parse(
      "int f(int a) { return a; }\n\
       int main(int x) { int y; y = f(x) + 1; if (y) { int z; z = -y; } return y; }",
    )
    .unwrap();
    resolve(&mut unit).unwrap();
    for node in unit.descendants() {
      assert!(node.scope.is_some(), "{} has no scope", node.kind_name());
    }
  }

  #[test]
  fn builds_one_scope_per_function_and_block() {
    let mut unit = parse("int f(int a) { { int b; } return a; } int main(int x) {}").unwrap();
    let table = resolve(&mut unit).unwrap();
    // global, f, f's body, nested block, main (its empty body opens none)
    assert_eq!(table.scope_count(), 5);
    let global = table.scope(table.global());
    assert_eq!(global.inner().len(), 2);
    assert_eq!(global.symbols().len(), 4);
  }

  #[test]
  fn repeated_lookups_yield_the_same_symbol() {
    let mut unit = parse("int main(int x) { int a; a = x; return a; }").unwrap();
    let table = resolve(&mut unit).unwrap();
    for node in unit.descendants() {
      if let NodeKind::Identifier { name } = &node.kind {
        let scope = scope_of(node).unwrap();
        let first = table.lookup(scope, name).unwrap();
        let second = table.lookup(scope, name).unwrap();
        assert_eq!(first, second);
      }
    }
  }

  #[test]
  fn declarations_must_precede_statements() {
    let err = parse("int main(int x) { int a; { int b; } int c; return x; }").unwrap_err();
    assert!(matches!(err, CompileError::Syntax { .. }));
  }

  #[test]
  fn locals_across_nested_blocks_share_one_frame() {
    let mut unit =
      parse("int main(int x) { int a; int c; { int b; { int a; a = 1; } } return x; }").unwrap();
    let table = resolve(&mut unit).unwrap();
    let main = table.lookup(table.global(), "main").unwrap();
    let indices: Vec<(String, usize)> = table
      .variables(main)
      .unwrap()
      .iter()
      .map(|id| match table.symbol(*id) {
        Symbol::Variable {
          name, frame_index, ..
        } => (name.clone(), *frame_index),
        other => panic!("unexpected symbol {other}"),
      })
      .collect();
    assert_eq!(
      indices,
      vec![
        ("a".to_string(), 0),
        ("c".to_string(), 1),
        ("b".to_string(), 2),
        ("a".to_string(), 3)
      ]
    );
  }

  #[test]
  fn function_symbols_are_global_and_ordered() {
    let mut unit = parse("int f(int a) { return a; } int main(int x) { return f(x); }").unwrap();
    let table = resolve(&mut unit).unwrap();
    let ordinal = |name: &str| match table.symbol(table.lookup(table.global(), name).unwrap()) {
      Symbol::Function { ordinal, .. } => *ordinal,
      other => panic!("unexpected symbol {other}"),
    };
    assert_eq!(ordinal("f"), 0);
    assert_eq!(ordinal("main"), 1);
  }

  #[test]
  fn redefinitions_in_one_scope_are_rejected() {
    let mut unit = parse("int main(int x) { int a; int a; return a; }").unwrap();
    let err = resolve(&mut unit).unwrap_err();
    assert_eq!(err, CompileError::semantic(1, 30, "redefinition of 'a'"));

    let mut unit = parse("int f(int x, int x) { return x; } int main() { return 0; }").unwrap();
    assert!(resolve(&mut unit).is_err());

    let mut unit = parse("int main() { return 0; } int main() { return 1; }").unwrap();
    let err = resolve(&mut unit).unwrap_err();
    assert_eq!(err.position(), Some((1, 30)));
  }

  #[test]
  fn shadowing_in_an_inner_block_is_allowed() {
    let mut unit = parse("int main(int x) { int x; x = 1; return x; }").unwrap();
    assert!(resolve(&mut unit).is_ok());
  }
}
