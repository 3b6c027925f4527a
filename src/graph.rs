//! Graphviz export of the syntax tree and the symbol table.
//!
//! Both graphs only read the finished structures. Node ids are assigned in
//! pre-order, so the root is always `node0`.

use crate::ast::{Node, NodeKind};
use crate::symtab::{ScopeId, SymbolTable};

/// Render the syntax tree rooted at `root`, one graph node per tree node.
pub fn syntax_tree_to_dot(root: &Node) -> String {
  let mut dot = String::from("digraph SyntaxTree {\n");
  let mut next_id = 0;
  write_node(root, &mut next_id, &mut dot);
  dot.push_str("}\n");
  dot
}

fn write_node(node: &Node, next_id: &mut usize, dot: &mut String) -> usize {
  let id = *next_id;
  *next_id += 1;
  dot.push_str(&format!("  node{id} [label=\"{}\"];\n", escape(&node_label(node))));
  for child in node.children() {
    let child_id = write_node(child, next_id, dot);
    dot.push_str(&format!("  node{id} -> node{child_id};\n"));
  }
  id
}

fn node_label(node: &Node) -> String {
  let kind = node.kind_name();
  match &node.kind {
    NodeKind::NoOperation
    | NodeKind::TranslationUnit { .. }
    | NodeKind::FunctionCall { .. }
    | NodeKind::ReturnStatement { .. }
    | NodeKind::CompoundStatement { .. }
    | NodeKind::IfStatement { .. } => kind.to_string(),
    NodeKind::FunctionDefinition {
      return_type, name, ..
    } => format!("{kind}\n{return_type} {name}"),
    NodeKind::Parameter { ty, name } | NodeKind::Declaration { ty, name } => {
      format!("{kind}\n{ty} {name}")
    }
    NodeKind::Assignment { target, .. } => format!("{kind}\n{target} ="),
    NodeKind::BinaryOperator { op, .. } => format!("{kind}\n{}", op.symbol()),
    NodeKind::UnaryOperator { op, .. } => format!("{kind}\n{}", op.symbol()),
    NodeKind::Identifier { name } => format!("{kind}\n{name}"),
    NodeKind::IntegerConstant { value } => format!("{kind}\n{value}"),
    NodeKind::RealConstant { value } => format!("{kind}\n{value:?}"),
  }
}

/// Render the scope tree, one graph node per scope listing its symbols.
pub fn symbol_table_to_dot(table: &SymbolTable) -> String {
  let mut dot = String::from("digraph SymbolTable {\n");
  write_scope(table, table.global(), &mut dot);
  dot.push_str("}\n");
  dot
}

fn write_scope(table: &SymbolTable, id: ScopeId, dot: &mut String) {
  let scope = table.scope(id);
  let mut label = format!("L{}", scope.level());
  for symbol in scope.symbols() {
    label.push('\n');
    label.push_str(&table.symbol(symbol).to_string());
  }
  dot.push_str(&format!(
    "  node{} [label=\"{}\"];\n",
    id.index(),
    escape(&label)
  ));
  for inner in scope.inner() {
    dot.push_str(&format!("  node{} -> node{};\n", id.index(), inner.index()));
    write_scope(table, *inner, dot);
  }
}

fn escape(label: &str) -> String {
  let mut escaped = String::with_capacity(label.len());
  for c in label.chars() {
    match c {
      '"' => escaped.push_str("\\\""),
      '\\' => escaped.push_str("\\\\"),
      '\n' => escaped.push_str("\\n"),
      c => escaped.push(c),
    }
  }
  escaped
}
