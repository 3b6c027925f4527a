//! Quadruple intermediate code.
//!
//! Every function body is lowered to a flat list of four-field instructions
//! `(op, operand1, operand2, result)`. Each quadruple also records the scope
//! its names must be looked up in, so later stages can map a name back to
//! the parameter or local slot it lives in.
//!
//! Literals never appear as arithmetic operands: `q_load` first puts them into
//! a fresh temporary. Temporaries are named `$0`, `$1`, ... and are declared as
//! `int` locals of the function they appear in, so they get frame slots like
//! any user variable. Every function ends with the `q_label` its `q_return`
//! instructions jump to.

use std::fmt;

use log::debug;

use crate::ast::{BinaryOp, Node, NodeKind, UnaryOp};
use crate::error::{CompileError, CompileResult};
use crate::resolver::scope_of;
use crate::symtab::{ScopeId, SymbolId, SymbolTable};
use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
  Load,
  Assign,
  Plus,
  Minus,
  Mult,
  Div,
  UPlus,
  UMinus,
  Param,
  Call,
  Return,
  Label,
  Jmp,
  JmpIfNot,
}

impl Opcode {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Load => "q_load",
      Self::Assign => "q_assign",
      Self::Plus => "q_plus",
      Self::Minus => "q_minus",
      Self::Mult => "q_mult",
      Self::Div => "q_div",
      Self::UPlus => "q_uplus",
      Self::UMinus => "q_uminus",
      Self::Param => "q_param",
      Self::Call => "q_call",
      Self::Return => "q_return",
      Self::Label => "q_label",
      Self::Jmp => "q_jmp",
      Self::JmpIfNot => "q_jmpifnot",
    }
  }

  fn binary(op: BinaryOp) -> Self {
    match op {
      BinaryOp::Add => Self::Plus,
      BinaryOp::Sub => Self::Minus,
      BinaryOp::Mul => Self::Mult,
      BinaryOp::Div => Self::Div,
    }
  }

  fn unary(op: UnaryOp) -> Self {
    match op {
      UnaryOp::Plus => Self::UPlus,
      UnaryOp::Minus => Self::UMinus,
    }
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Jump target. Numbering is shared by every function of a compilation, so
/// labels are unique in the emitted assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(usize);

impl Label {
  pub fn index(&self) -> usize {
    self.0
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "label{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
  /// A parameter, local, temporary or function name.
  Name(String),
  /// Immediate value of a `q_load`.
  Constant(i32),
  Label(Label),
  /// Argument count of a `q_call`.
  Count(usize),
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Name(name) => f.write_str(name),
      Self::Constant(value) => write!(f, "{value}"),
      Self::Label(label) => write!(f, "{label}"),
      Self::Count(count) => write!(f, "{count}"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Operand1,
  Operand2,
  Result,
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Operand1 => write!(f, "operand 1"),
      Self::Operand2 => write!(f, "operand 2"),
      Self::Result => write!(f, "result"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quadruple {
  pub op: Opcode,
  pub operand1: Option<Operand>,
  pub operand2: Option<Operand>,
  pub result: Option<Operand>,
  pub scope: ScopeId,
}

impl Quadruple {
  pub fn field(&self, field: Field) -> Option<&Operand> {
    match field {
      Field::Operand1 => self.operand1.as_ref(),
      Field::Operand2 => self.operand2.as_ref(),
      Field::Result => self.result.as_ref(),
    }
  }

  pub fn name(&self, field: Field) -> CompileResult<&str> {
    match self.field(field) {
      Some(Operand::Name(name)) => Ok(name),
      _ => Err(self.malformed(field, "a name")),
    }
  }

  pub fn label(&self, field: Field) -> CompileResult<Label> {
    match self.field(field) {
      Some(Operand::Label(label)) => Ok(*label),
      _ => Err(self.malformed(field, "a label")),
    }
  }

  pub fn constant(&self, field: Field) -> CompileResult<i32> {
    match self.field(field) {
      Some(Operand::Constant(value)) => Ok(*value),
      _ => Err(self.malformed(field, "a constant")),
    }
  }

  pub fn count(&self, field: Field) -> CompileResult<usize> {
    match self.field(field) {
      Some(Operand::Count(count)) => Ok(*count),
      _ => Err(self.malformed(field, "an argument count")),
    }
  }

  fn malformed(&self, field: Field, expected: &str) -> CompileError {
    CompileError::internal(format!(
      "malformed quadruple '{}': expected {expected} in {field}",
      self.to_string().trim_end()
    ))
  }
}

/// Four columns, ten characters wide, `-` for an absent field.
impl fmt::Display for Quadruple {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:<10}", self.op.name())?;
    for operand in [&self.operand1, &self.operand2, &self.result] {
      match operand {
        Some(operand) => write!(f, "{:<10}", operand.to_string())?,
        None => write!(f, "{:<10}", "-")?,
      }
    }
    Ok(())
  }
}

/// Quadruples of every function, in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateCode {
  functions: Vec<(String, Vec<Quadruple>)>,
}

impl IntermediateCode {
  pub fn functions(&self) -> impl Iterator<Item = (&str, &[Quadruple])> {
    self
      .functions
      .iter()
      .map(|(name, body)| (name.as_str(), body.as_slice()))
  }

  pub fn function(&self, name: &str) -> Option<&[Quadruple]> {
    self
      .functions
      .iter()
      .find(|(candidate, _)| candidate == name)
      .map(|(_, body)| body.as_slice())
  }

  /// Total number of quadruples.
  pub fn len(&self) -> usize {
    self.functions.iter().map(|(_, body)| body.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl fmt::Display for IntermediateCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (name, body) in &self.functions {
      writeln!(f, "{name}:")?;
      for quad in body {
        writeln!(f, "\t{quad}")?;
      }
    }
    Ok(())
  }
}

/// Lower a resolved, checked translation unit. Temporaries are added to
/// `table` as locals of the function they belong to.
pub fn generate(unit: &Node, table: &mut SymbolTable) -> CompileResult<IntermediateCode> {
  let mut generator = Generator {
    table,
    code: IntermediateCode::default(),
    quads: Vec::new(),
    temps: 0,
    labels: 0,
    function: None,
  };
  generator.translation_unit(unit)?;
  Ok(generator.code)
}

/// The function being lowered.
struct Frame {
  symbol: SymbolId,
  scope: ScopeId,
  exit: Label,
}

struct Generator<'t> {
  table: &'t mut SymbolTable,
  code: IntermediateCode,
  quads: Vec<Quadruple>,
  temps: usize,
  labels: usize,
  function: Option<Frame>,
}

impl Generator<'_> {
  fn translation_unit(&mut self, unit: &Node) -> CompileResult<()> {
    let NodeKind::TranslationUnit { functions } = &unit.kind else {
      return Err(CompileError::internal(format!(
        "expected a translation unit, found {}",
        unit.kind_name()
      )));
    };
    for function in functions {
      self.function_definition(function)?;
    }
    Ok(())
  }

  fn function_definition(&mut self, node: &Node) -> CompileResult<()> {
    let NodeKind::FunctionDefinition {
      return_type,
      name,
      parameters,
      body,
    } = &node.kind
    else {
      return Err(CompileError::internal(format!(
        "expected a function definition, found {}",
        node.kind_name()
      )));
    };
    require_int(*return_type, || format!("function '{name}' returns"))?;

    let symbol = self
      .table
      .lookup_local(self.table.global(), name)
      .ok_or_else(|| CompileError::internal(format!("function '{name}' is not in the global scope")))?;
    let scope = scope_of(node)?;
    let exit = self.new_label();
    self.function = Some(Frame {
      symbol,
      scope,
      exit,
    });

    for parameter in parameters {
      if let NodeKind::Parameter { ty, name } = &parameter.kind {
        require_int(*ty, || format!("parameter '{name}' has"))?;
      }
    }
    self.statement(body)?;
    self.emit(Opcode::Label, Some(Operand::Label(exit)), None, None, scope);

    self.function = None;
    let quads = std::mem::take(&mut self.quads);
    debug!("lowered '{name}' to {} quadruples", quads.len());
    self.code.functions.push((name.clone(), quads));
    Ok(())
  }

  fn statement(&mut self, node: &Node) -> CompileResult<()> {
    let scope = scope_of(node)?;
    match &node.kind {
      NodeKind::NoOperation => {}
      NodeKind::CompoundStatement {
        declarations,
        statements,
      } => {
        for declaration in declarations {
          if let NodeKind::Declaration { ty, name } = &declaration.kind {
            require_int(*ty, || format!("variable '{name}' has"))?;
          }
        }
        for statement in statements {
          self.statement(statement)?;
        }
      }
      NodeKind::ReturnStatement { value } => {
        let value = self.expression(value)?;
        let exit = self.frame()?.exit;
        self.emit(
          Opcode::Return,
          Some(Operand::Label(exit)),
          Some(Operand::Name(value)),
          None,
          scope,
        );
      }
      NodeKind::Assignment { target, value } => {
        let value = self.expression(value)?;
        self.emit(
          Opcode::Assign,
          Some(Operand::Name(value)),
          None,
          Some(Operand::Name(target.clone())),
          scope,
        );
      }
      NodeKind::IfStatement {
        condition,
        consequent,
        alternative,
      } => {
        let predicate = self.expression(condition)?;
        let otherwise = self.new_label();
        self.emit(
          Opcode::JmpIfNot,
          Some(Operand::Name(predicate)),
          Some(Operand::Label(otherwise)),
          None,
          scope,
        );
        self.statement(consequent)?;
        match alternative {
          Some(alternative) => {
            let end = self.new_label();
            self.emit(Opcode::Jmp, Some(Operand::Label(end)), None, None, scope);
            self.emit(Opcode::Label, Some(Operand::Label(otherwise)), None, None, scope);
            self.statement(alternative)?;
            self.emit(Opcode::Label, Some(Operand::Label(end)), None, None, scope);
          }
          None => {
            self.emit(Opcode::Label, Some(Operand::Label(otherwise)), None, None, scope);
          }
        }
      }
      _ => {
        return Err(CompileError::internal(format!(
          "{} at {}:{} is not a statement",
          node.kind_name(),
          node.token.line,
          node.token.column
        )));
      }
    }
    Ok(())
  }

  /// Lower an expression and return the name holding its value.
  fn expression(&mut self, node: &Node) -> CompileResult<String> {
    let scope = scope_of(node)?;
    match &node.kind {
      NodeKind::Identifier { name } => Ok(name.clone()),
      NodeKind::IntegerConstant { value } => {
        let temp = self.new_temp()?;
        self.emit(
          Opcode::Load,
          Some(Operand::Constant(*value)),
          None,
          Some(Operand::Name(temp.clone())),
          scope,
        );
        Ok(temp)
      }
      NodeKind::RealConstant { value } => Err(CompileError::unsupported(format!(
        "intermediate code generation supports only 'int' values; found real constant {value:?} at {}:{}",
        node.token.line, node.token.column
      ))),
      NodeKind::BinaryOperator { op, lhs, rhs } => {
        let lhs = self.expression(lhs)?;
        let rhs = self.expression(rhs)?;
        let temp = self.new_temp()?;
        self.emit(
          Opcode::binary(*op),
          Some(Operand::Name(lhs)),
          Some(Operand::Name(rhs)),
          Some(Operand::Name(temp.clone())),
          scope,
        );
        Ok(temp)
      }
      NodeKind::UnaryOperator { op, operand } => {
        let operand = self.expression(operand)?;
        let temp = self.new_temp()?;
        self.emit(
          Opcode::unary(*op),
          Some(Operand::Name(operand)),
          None,
          Some(Operand::Name(temp.clone())),
          scope,
        );
        Ok(temp)
      }
      NodeKind::FunctionCall { callee, arguments } => {
        let NodeKind::Identifier { name: callee } = &callee.kind else {
          return Err(CompileError::internal(format!(
            "call at {}:{} has no callee name",
            node.token.line, node.token.column
          )));
        };
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
          values.push(self.expression(argument)?);
        }
        // Last argument is pushed first so the first one ends up nearest
        // to the callee's frame.
        for value in values.iter().rev() {
          self.emit(Opcode::Param, Some(Operand::Name(value.clone())), None, None, scope);
        }
        let temp = self.new_temp()?;
        self.emit(
          Opcode::Call,
          Some(Operand::Name(callee.clone())),
          Some(Operand::Count(values.len())),
          Some(Operand::Name(temp.clone())),
          scope,
        );
        Ok(temp)
      }
      _ => Err(CompileError::internal(format!(
        "{} at {}:{} is not an expression",
        node.kind_name(),
        node.token.line,
        node.token.column
      ))),
    }
  }

  fn emit(
    &mut self,
    op: Opcode,
    operand1: Option<Operand>,
    operand2: Option<Operand>,
    result: Option<Operand>,
    scope: ScopeId,
  ) {
    self.quads.push(Quadruple {
      op,
      operand1,
      operand2,
      result,
      scope,
    });
  }

  fn frame(&self) -> CompileResult<&Frame> {
    self
      .function
      .as_ref()
      .ok_or_else(|| CompileError::internal("code emitted outside of a function"))
  }

  fn new_temp(&mut self) -> CompileResult<String> {
    let (symbol, scope) = {
      let frame = self.frame()?;
      (frame.symbol, frame.scope)
    };
    let name = format!("${}", self.temps);
    self.temps += 1;
    self.table.define_variable(scope, symbol, &name, Type::Int)?;
    Ok(name)
  }

  fn new_label(&mut self) -> Label {
    let label = Label(self.labels);
    self.labels += 1;
    label
  }
}

fn require_int(ty: Type, subject: impl FnOnce() -> String) -> CompileResult<()> {
  if ty.is_integer() {
    return Ok(());
  }
  Err(CompileError::unsupported(format!(
    "intermediate code generation supports only 'int' values; {} type '{ty}'",
    subject()
  )))
}
