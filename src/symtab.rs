//! Lexical scopes and the symbols declared in them.
//!
//! Scopes and symbols live in two arenas owned by `SymbolTable` and are
//! referenced through `ScopeId`/`SymbolId` handles. A scope only knows its
//! outer scope and the inner scopes opened inside it, so the structure is a
//! tree and lookups walk outward until the global scope. Two lookups of the
//! same name from the same scope always yield the same `SymbolId`.

use std::collections::HashMap;
use std::fmt;

use crate::error::{CompileError, CompileResult};
use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
  pub fn index(&self) -> usize {
    self.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(usize);

impl SymbolId {
  pub fn index(&self) -> usize {
    self.0
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
  BuiltinType {
    name: String,
    ty: Type,
  },
  Function {
    name: String,
    return_type: Type,
    parameters: Vec<SymbolId>,
    variables: Vec<SymbolId>,
    /// Position of the definition among the translation unit's functions.
    ordinal: usize,
  },
  Parameter {
    name: String,
    ty: Type,
    frame_index: usize,
  },
  Variable {
    name: String,
    ty: Type,
    frame_index: usize,
  },
}

impl Symbol {
  pub fn name(&self) -> &str {
    match self {
      Self::BuiltinType { name, .. }
      | Self::Function { name, .. }
      | Self::Parameter { name, .. }
      | Self::Variable { name, .. } => name,
    }
  }

  /// Type of the value stored under this name, for parameters and variables.
  pub fn value_type(&self) -> Option<Type> {
    match self {
      Self::Parameter { ty, .. } | Self::Variable { ty, .. } => Some(*ty),
      _ => None,
    }
  }

  pub fn kind_name(&self) -> &'static str {
    match self {
      Self::BuiltinType { .. } => "BuiltinType",
      Self::Function { .. } => "Function",
      Self::Parameter { .. } => "Parameter",
      Self::Variable { .. } => "Variable",
    }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::BuiltinType { name, .. } => write!(f, "BuiltinType<{name}>"),
      Self::Function {
        name, return_type, ..
      } => write!(f, "Function<{name}: {return_type}>"),
      Self::Parameter {
        name,
        ty,
        frame_index,
      } => write!(f, "Parameter<{name}: {ty} #{frame_index}>"),
      Self::Variable {
        name,
        ty,
        frame_index,
      } => write!(f, "Variable<{name}: {ty} #{frame_index}>"),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
  symbols: HashMap<String, SymbolId>,
  outer: Option<ScopeId>,
  inner: Vec<ScopeId>,
  level: usize,
}

impl Scope {
  pub fn outer(&self) -> Option<ScopeId> {
    self.outer
  }

  pub fn inner(&self) -> &[ScopeId] {
    &self.inner
  }

  /// Nesting depth; the global scope is level 0.
  pub fn level(&self) -> usize {
    self.level
  }

  /// Symbols declared directly in this scope, in declaration order.
  pub fn symbols(&self) -> Vec<SymbolId> {
    let mut symbols: Vec<SymbolId> = self.symbols.values().copied().collect();
    symbols.sort();
    symbols
  }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
  scopes: Vec<Scope>,
  symbols: Vec<Symbol>,
}

impl Default for SymbolTable {
  fn default() -> Self {
    Self::new()
  }
}

impl SymbolTable {
  /// A table holding only the global scope with the built-in types.
  pub fn new() -> Self {
    let mut table = Self {
      scopes: vec![Scope::default()],
      symbols: Vec::new(),
    };
    for ty in Type::BUILTINS {
      let id = SymbolId(table.symbols.len());
      table.symbols.push(Symbol::BuiltinType {
        name: ty.name().to_string(),
        ty,
      });
      table.scopes[0].symbols.insert(ty.name().to_string(), id);
    }
    table
  }

  pub fn global(&self) -> ScopeId {
    ScopeId(0)
  }

  pub fn scope(&self, id: ScopeId) -> &Scope {
    &self.scopes[id.0]
  }

  pub fn scope_count(&self) -> usize {
    self.scopes.len()
  }

  pub fn symbol(&self, id: SymbolId) -> &Symbol {
    &self.symbols[id.0]
  }

  /// Open a new scope nested inside `outer`.
  pub fn push_scope(&mut self, outer: ScopeId) -> ScopeId {
    let id = ScopeId(self.scopes.len());
    let level = self.scopes[outer.0].level + 1;
    self.scopes.push(Scope {
      outer: Some(outer),
      level,
      ..Scope::default()
    });
    self.scopes[outer.0].inner.push(id);
    id
  }

  /// Find `name` in `scope` or any of its ancestors.
  pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
    let mut current = Some(scope);
    while let Some(id) = current {
      let scope = &self.scopes[id.0];
      if let Some(symbol) = scope.symbols.get(name) {
        return Some(*symbol);
      }
      current = scope.outer;
    }
    None
  }

  /// Find `name` in `scope` only, without walking outward.
  pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
    self.scopes[scope.0].symbols.get(name).copied()
  }

  fn define(&mut self, scope: ScopeId, symbol: Symbol) -> CompileResult<SymbolId> {
    if self.lookup_local(scope, symbol.name()).is_some() {
      return Err(CompileError::internal(format!(
        "'{}' is already defined in scope {}",
        symbol.name(),
        scope.0
      )));
    }
    let id = SymbolId(self.symbols.len());
    self.scopes[scope.0]
      .symbols
      .insert(symbol.name().to_string(), id);
    self.symbols.push(symbol);
    Ok(id)
  }

  pub fn define_function(
    &mut self,
    scope: ScopeId,
    name: &str,
    return_type: Type,
  ) -> CompileResult<SymbolId> {
    let ordinal = self
      .symbols
      .iter()
      .filter(|symbol| matches!(symbol, Symbol::Function { .. }))
      .count();
    self.define(
      scope,
      Symbol::Function {
        name: name.to_string(),
        return_type,
        parameters: Vec::new(),
        variables: Vec::new(),
        ordinal,
      },
    )
  }

  /// Declare a parameter of `function`, giving it the next parameter slot.
  pub fn define_parameter(
    &mut self,
    scope: ScopeId,
    function: SymbolId,
    name: &str,
    ty: Type,
  ) -> CompileResult<SymbolId> {
    let frame_index = self.parameters(function)?.len();
    let id = self.define(
      scope,
      Symbol::Parameter {
        name: name.to_string(),
        ty,
        frame_index,
      },
    )?;
    if let Symbol::Function { parameters, .. } = &mut self.symbols[function.0] {
      parameters.push(id);
    }
    Ok(id)
  }

  /// Declare a local variable of `function`, giving it the next local slot.
  pub fn define_variable(
    &mut self,
    scope: ScopeId,
    function: SymbolId,
    name: &str,
    ty: Type,
  ) -> CompileResult<SymbolId> {
    let frame_index = self.variables(function)?.len();
    let id = self.define(
      scope,
      Symbol::Variable {
        name: name.to_string(),
        ty,
        frame_index,
      },
    )?;
    if let Symbol::Function { variables, .. } = &mut self.symbols[function.0] {
      variables.push(id);
    }
    Ok(id)
  }

  pub fn parameters(&self, function: SymbolId) -> CompileResult<&[SymbolId]> {
    match &self.symbols[function.0] {
      Symbol::Function { parameters, .. } => Ok(parameters),
      other => Err(CompileError::internal(format!(
        "'{}' is not a function",
        other.name()
      ))),
    }
  }

  pub fn variables(&self, function: SymbolId) -> CompileResult<&[SymbolId]> {
    match &self.symbols[function.0] {
      Symbol::Function { variables, .. } => Ok(variables),
      other => Err(CompileError::internal(format!(
        "'{}' is not a function",
        other.name()
      ))),
    }
  }

  fn write_scope(&self, f: &mut fmt::Formatter<'_>, id: ScopeId) -> fmt::Result {
    let scope = &self.scopes[id.0];
    let symbols: Vec<String> = scope
      .symbols()
      .into_iter()
      .map(|symbol| self.symbol(symbol).to_string())
      .collect();
    writeln!(
      f,
      "{}L{}: {}",
      "  ".repeat(scope.level),
      scope.level,
      symbols.join(", ")
    )?;
    for inner in &scope.inner {
      self.write_scope(f, *inner)?;
    }
    Ok(())
  }
}

/// Indented dump of the scope tree, one line per scope.
impl fmt::Display for SymbolTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.write_scope(f, self.global())
  }
}
