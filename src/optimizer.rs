//! Constant folding.
//!
//! One post-order rewrite of the tree. Every step takes a node by value and
//! returns either that node (with folded children) or a freshly built
//! constant that replaces it; the parent installs whatever comes back. A
//! replacement keeps the token and the scope of the node it replaces.
//!
//! Integer arithmetic follows the target: 32-bit wrapping `+ - *` and `/`
//! truncating toward zero like `idivl`. Divisions the target would trap on
//! (by zero, or `i32::MIN / -1`) are left in place.

use log::trace;

use crate::ast::{BinaryOp, Node, NodeKind, UnaryOp};

/// Fold every constant subexpression of `node`.
pub fn fold_constants(node: Node) -> Node {
  let Node { kind, token, scope } = node;

  let kind = match kind {
    NodeKind::TranslationUnit { functions } => NodeKind::TranslationUnit {
      functions: fold_all(functions),
    },
    NodeKind::FunctionDefinition {
      return_type,
      name,
      parameters,
      body,
    } => NodeKind::FunctionDefinition {
      return_type,
      name,
      parameters,
      body: fold_boxed(body),
    },
    NodeKind::FunctionCall { callee, arguments } => NodeKind::FunctionCall {
      callee,
      arguments: fold_all(arguments),
    },
    NodeKind::ReturnStatement { value } => NodeKind::ReturnStatement {
      value: fold_boxed(value),
    },
    NodeKind::CompoundStatement {
      declarations,
      statements,
    } => NodeKind::CompoundStatement {
      declarations,
      statements: fold_all(statements),
    },
    NodeKind::Assignment { target, value } => NodeKind::Assignment {
      target,
      value: fold_boxed(value),
    },
    NodeKind::IfStatement {
      condition,
      consequent,
      alternative,
    } => NodeKind::IfStatement {
      condition: fold_boxed(condition),
      consequent: fold_boxed(consequent),
      alternative: alternative.map(fold_boxed),
    },
    NodeKind::BinaryOperator { op, lhs, rhs } => {
      let lhs = fold_boxed(lhs);
      let rhs = fold_boxed(rhs);
      match fold_binary(op, &lhs.kind, &rhs.kind) {
        Some(folded) => {
          trace!(
            "folded ({lhs} {} {rhs}) at {}:{}",
            op.symbol(),
            token.line,
            token.column
          );
          folded
        }
        None => NodeKind::BinaryOperator { op, lhs, rhs },
      }
    }
    NodeKind::UnaryOperator { op, operand } => {
      let operand = fold_boxed(operand);
      match fold_unary(op, &operand.kind) {
        Some(folded) => {
          trace!(
            "folded ({}{operand}) at {}:{}",
            op.symbol(),
            token.line,
            token.column
          );
          folded
        }
        None => NodeKind::UnaryOperator { op, operand },
      }
    }
    kind @ (NodeKind::NoOperation
    | NodeKind::Parameter { .. }
    | NodeKind::Declaration { .. }
    | NodeKind::Identifier { .. }
    | NodeKind::IntegerConstant { .. }
    | NodeKind::RealConstant { .. }) => kind,
  };

  Node { kind, token, scope }
}

fn fold_all(nodes: Vec<Node>) -> Vec<Node> {
  nodes.into_iter().map(fold_constants).collect()
}

fn fold_boxed(node: Box<Node>) -> Box<Node> {
  Box::new(fold_constants(*node))
}

fn fold_binary(op: BinaryOp, lhs: &NodeKind, rhs: &NodeKind) -> Option<NodeKind> {
  match (lhs, rhs) {
    (NodeKind::IntegerConstant { value: a }, NodeKind::IntegerConstant { value: b }) => {
      let value = apply_integer(op, *a, *b)?;
      Some(NodeKind::IntegerConstant { value })
    }
    (NodeKind::RealConstant { value: a }, NodeKind::RealConstant { value: b }) => {
      let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
      };
      Some(NodeKind::RealConstant { value })
    }
    _ => None,
  }
}

fn fold_unary(op: UnaryOp, operand: &NodeKind) -> Option<NodeKind> {
  match (op, operand) {
    (UnaryOp::Plus, NodeKind::IntegerConstant { .. } | NodeKind::RealConstant { .. }) => {
      Some(operand.clone())
    }
    (UnaryOp::Minus, NodeKind::IntegerConstant { value }) => Some(NodeKind::IntegerConstant {
      value: value.wrapping_neg(),
    }),
    (UnaryOp::Minus, NodeKind::RealConstant { value }) => {
      Some(NodeKind::RealConstant { value: -value })
    }
    _ => None,
  }
}

/// Evaluate an integer operation the way the generated code does, or `None`
/// when the target instruction would fault.
pub fn apply_integer(op: BinaryOp, a: i32, b: i32) -> Option<i32> {
  match op {
    BinaryOp::Add => Some(a.wrapping_add(b)),
    BinaryOp::Sub => Some(a.wrapping_sub(b)),
    BinaryOp::Mul => Some(a.wrapping_mul(b)),
    BinaryOp::Div => a.checked_div(b),
  }
}

#[cfg(test)]
mod tests {
  use super::{apply_integer, fold_constants};
  use crate::ast::{BinaryOp, Node, NodeKind};
  use crate::parser::parse;
  use crate::resolver::resolve;
  use crate::sema::analyze;

  fn folded(source: &str) -> Node {
    let mut unit = parse(source).unwrap();
    resolve(&mut unit).unwrap();
    fold_constants(unit)
  }

  fn main_source(body: &str) -> String {
    format!("int main(int x) {{ {body} }}")
  }

  fn render(source: &str) -> String {
    folded(source).to_string()
  }

  #[test]
  fn folds_nested_integer_arithmetic() {
    assert_eq!(
      render("int main(int x) { int a; a = 2 + 3 * 4; return a; }"),
      "int main(int x) { int a; a = 14; return a; }\n"
    );
  }

  #[test]
  fn integer_division_truncates_toward_zero() {
    assert_eq!(
      render(&main_source("return -7 / 2;")),
      "int main(int x) { return -3; }\n"
    );
    assert_eq!(
      render(&main_source("return 7 / -2;")),
      "int main(int x) { return -3; }\n"
    );
  }

  #[test]
  fn folds_real_arithmetic() {
    assert_eq!(
      render("double main(int x) { return 1.0 / 4.0 - -0.5; }"),
      "double main(int x) { return 0.75; }\n"
    );
  }

  #[test]
  fn leaves_mixed_and_variable_operands_alone() {
    assert_eq!(
      render(&main_source("return x * (2 + 3) - 1;")),
      "int main(int x) { return ((x * 5) - 1); }\n"
    );
    assert_eq!(
      render("double main(int x) { return 1 + 2.0; }"),
      "double main(int x) { return (1 + 2.0); }\n"
    );
  }

  #[test]
  fn unary_plus_and_minus_fold() {
    assert_eq!(
      render(&main_source("return +(-(3));")),
      "int main(int x) { return -3; }\n"
    );
  }

  #[test]
  fn faulting_divisions_are_not_folded() {
    assert_eq!(
      render(&main_source("return 1 / 0;")),
      "int main(int x) { return (1 / 0); }\n"
    );
    assert_eq!(apply_integer(BinaryOp::Div, i32::MIN, -1), None);
    assert_eq!(apply_integer(BinaryOp::Add, i32::MAX, 1), Some(i32::MIN));
  }

  #[test]
  fn folds_inside_calls_and_conditionals() {
    let source = "int f(int a) { return a; }\n\
                  int main(int x) { if (1 - 1) return f(2 * 3); else { x = -(4 / 2); } return x; }";
    assert_eq!(
      render(source),
      "int f(int a) { return a; }\n\
       int main(int x) { if (0) return f(6); else { x = -2; } return x; }\n"
    );
  }

  #[test]
  fn replacements_keep_the_original_scope_and_token() {
    let before = {
      let mut unit = parse(&main_source("return 2 + 3;")).unwrap();
      resolve(&mut unit).unwrap();
      unit
    };
    let plus = before
      .descendants()
      .into_iter()
      .find(|node| matches!(node.kind, NodeKind::BinaryOperator { .. }))
      .cloned()
      .unwrap();
    let after = fold_constants(before);
    let constant = after
      .descendants()
      .into_iter()
      .find(|node| matches!(node.kind, NodeKind::IntegerConstant { value: 5 }))
      .cloned()
      .unwrap();
    assert_eq!(constant.scope, plus.scope);
    assert_eq!(constant.token, plus.token);
  }

  #[test]
  fn folding_is_idempotent() {
    let once = folded("int main(int x) { int a; a = (1 + 2) * x - 4 / 2 * -3; return a + 0; }");
    let twice = fold_constants(once.clone());
    assert_eq!(once, twice);
  }

  #[test]
  fn folding_preserves_static_types() {
    let sources = [
      "int main(int x) { int a; a = 2 + 3 * 4; return a; }",
      "double main(int x) { double d; d = 1.5 * 2.0 - 0.5; return d; }",
      "int f(int a) { return a; } int main(int x) { return f(-(2 - 5)) / 2; }",
    ];
    for source in sources {
      let mut unit = parse(source).unwrap();
      let table = resolve(&mut unit).unwrap();
      analyze(&unit, &table).unwrap();
      let unit = fold_constants(unit);
      analyze(&unit, &table).unwrap();
    }
  }
}
