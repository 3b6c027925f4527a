//! Crate root: wires together the compilation pipeline.
//!
//! Sea Sub is a small statically typed subset of C (`int` and `double`
//! scalars, functions, blocks, assignment, arithmetic, `if`/`else`, `return`).
//! The stages run strictly in order and the first error aborts the run:
//! - `tokenizer` lazily splits the source into tokens.
//! - `parser` builds the syntax tree defined in `ast`.
//! - `resolver` builds the `symtab` scope tree and attaches a scope to every node.
//! - `sema` checks declarations, the entry point and static types.
//! - `optimizer` folds constant expressions when optimization is enabled.
//! - `ir` lowers every function to quadruples; `eval` can run them directly.
//! - `codegen` translates the quadruples into x86-64 assembly.
//! - `graph` exports the tree and the scopes as Graphviz documents.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod eval;
pub mod graph;
pub mod ir;
pub mod optimizer;
pub mod parser;
pub mod resolver;
pub mod sema;
pub mod symtab;
pub mod tokenizer;
pub mod ty;

use log::debug;

pub use ast::Node;
pub use error::{CompileError, CompileResult};
pub use ir::IntermediateCode;
pub use symtab::SymbolTable;

/// Settings of one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
  /// `0` compiles as written; anything above folds constants.
  pub optimization_level: u32,
  /// Recorded in the `.file` directive of the output.
  pub file_name: String,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      optimization_level: 0,
      file_name: "a.c".to_string(),
    }
  }
}

impl Options {
  pub fn folds_constants(&self) -> bool {
    self.optimization_level > 0
  }
}

/// Everything a successful compilation produces.
#[derive(Debug, Clone)]
pub struct Compilation {
  /// The tree after optimization.
  pub ast: Node,
  /// Scopes and symbols, including the temporaries added by lowering.
  pub symbol_table: SymbolTable,
  pub intermediate_code: IntermediateCode,
  pub assembly: String,
}

/// Parse, resolve and check `source`, returning the annotated tree and its
/// symbol table.
pub fn analyze(source: &str) -> CompileResult<(Node, SymbolTable)> {
  let mut unit = parser::parse(source)?;
  debug!("parsed {} syntax tree nodes", unit.descendants().len());
  let table = resolver::resolve(&mut unit)?;
  debug!("resolved {} scopes", table.scope_count());
  sema::analyze(&unit, &table)?;
  debug!("semantic analysis passed");
  Ok((unit, table))
}

/// Optimize and lower an analyzed tree down to assembly.
pub fn lower(unit: Node, mut table: SymbolTable, options: &Options) -> CompileResult<Compilation> {
  let unit = if options.folds_constants() {
    debug!("folding constants (level {})", options.optimization_level);
    optimizer::fold_constants(unit)
  } else {
    unit
  };
  let code = ir::generate(&unit, &mut table)?;
  debug!("generated {} quadruples", code.len());
  let assembly = codegen::generate(&code, &table, &options.file_name)?;
  debug!("emitted {} lines of assembly", assembly.lines().count());
  Ok(Compilation {
    ast: unit,
    symbol_table: table,
    intermediate_code: code,
    assembly,
  })
}

/// Run the whole pipeline on `source`.
pub fn compile(source: &str, options: &Options) -> CompileResult<Compilation> {
  let (unit, table) = analyze(source)?;
  lower(unit, table, options)
}

/// Compile a source string into AT&T assembly with default options.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  compile(source, &Options::default()).map(|compilation| compilation.assembly)
}
