use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::info;

use seasub::{Options, graph};

/// Compiler for Sea Sub, a small subset of C, targeting x86-64 assembly.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
  /// Source file to compile
  source: PathBuf,
  /// Optimization level; anything above 0 folds constant expressions
  #[arg(short = 'O', long = "optimize", default_value_t = 0)]
  optimization_level: u32,
  /// Assembly output path [default: the source path with a `.s` extension]
  #[arg(short, long)]
  output: Option<PathBuf>,
  /// Write the syntax tree as a Graphviz document
  #[arg(long)]
  ast_graph: Option<PathBuf>,
  /// Write the scope tree as a Graphviz document
  #[arg(long)]
  symbol_table_graph: Option<PathBuf>,
  /// Write the intermediate code as text
  #[arg(long)]
  intermediate_code: Option<PathBuf>,
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
  let args = Args::parse();

  let source = fs::read_to_string(&args.source).unwrap_or_else(|err| {
    eprintln!("error: cannot read '{}': {err}", args.source.display());
    process::exit(1);
  });

  if let Err(message) = run(&args, &source) {
    eprintln!("{message}");
    process::exit(1);
  }
}

/// Compile `source` and write every requested output. The error is the text
/// to print before exiting.
fn run(args: &Args, source: &str) -> Result<(), String> {
  let options = Options {
    optimization_level: args.optimization_level,
    file_name: args
      .source
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| args.source.display().to_string()),
  };

  let (unit, table) = seasub::analyze(source).map_err(|err| err.render(source))?;
  if let Some(path) = &args.ast_graph {
    write_output(path, &graph::syntax_tree_to_dot(&unit))?;
  }
  if let Some(path) = &args.symbol_table_graph {
    write_output(path, &graph::symbol_table_to_dot(&table))?;
  }

  let compilation = seasub::lower(unit, table, &options).map_err(|err| err.render(source))?;
  if let Some(path) = &args.intermediate_code {
    write_output(path, &compilation.intermediate_code.to_string())?;
  }

  let output = args
    .output
    .clone()
    .unwrap_or_else(|| args.source.with_extension("s"));
  write_output(&output, &compilation.assembly)
}

fn write_output(path: &Path, contents: &str) -> Result<(), String> {
  fs::write(path, contents)
    .map_err(|err| format!("error: cannot write '{}': {err}", path.display()))?;
  info!("wrote {}", path.display());
  Ok(())
}
