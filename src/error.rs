//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage fails fast: the first violation becomes a `CompileError` and
//! the pipeline aborts. The three diagnosable kinds (lexical, syntax and
//! semantic) carry a 1-based source position so the driver can point at the
//! offending character with a caret.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum CompileError {
  #[snafu(display("{line}:{column}: lexical error: {message}"))]
  Lexical {
    line: usize,
    column: usize,
    message: String,
  },

  #[snafu(display("{line}:{column}: syntax error: {message}"))]
  Syntax {
    line: usize,
    column: usize,
    message: String,
  },

  #[snafu(display("{line}:{column}: semantic error: {message}"))]
  Semantic {
    line: usize,
    column: usize,
    message: String,
  },

  /// A construct the back end deliberately does not lower.
  #[snafu(display("not supported: {message}"))]
  Unsupported { message: String },

  /// The reference evaluator could not finish running the program.
  #[snafu(display("evaluation failed: {message}"))]
  Evaluation { message: String },

  #[snafu(display("internal compiler error: {message}"))]
  Internal { message: String },
}

impl CompileError {
  pub fn lexical(line: usize, column: usize, message: impl Into<String>) -> Self {
    LexicalSnafu {
      line,
      column,
      message,
    }
    .build()
  }

  pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
    SyntaxSnafu {
      line,
      column,
      message,
    }
    .build()
  }

  pub fn semantic(line: usize, column: usize, message: impl Into<String>) -> Self {
    SemanticSnafu {
      line,
      column,
      message,
    }
    .build()
  }

  pub fn unsupported(message: impl Into<String>) -> Self {
    UnsupportedSnafu { message }.build()
  }

  pub fn evaluation(message: impl Into<String>) -> Self {
    EvaluationSnafu { message }.build()
  }

  pub fn internal(message: impl Into<String>) -> Self {
    InternalSnafu { message }.build()
  }

  /// Source position of a diagnostic, if it has one.
  pub fn position(&self) -> Option<(usize, usize)> {
    match self {
      Self::Lexical { line, column, .. }
      | Self::Syntax { line, column, .. }
      | Self::Semantic { line, column, .. } => Some((*line, *column)),
      _ => None,
    }
  }

  /// Whether this is a user-facing diagnostic rather than a compiler limitation.
  pub fn is_diagnostic(&self) -> bool {
    self.position().is_some()
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Lexical { message, .. }
      | Self::Syntax { message, .. }
      | Self::Semantic { message, .. }
      | Self::Unsupported { message }
      | Self::Evaluation { message }
      | Self::Internal { message } => message,
    }
  }

  /// Format the error together with the offending source line and a caret
  /// under the reported column.
  pub fn render(&self, source: &str) -> String {
    let Some((line, column)) = self.position() else {
      return self.to_string();
    };
    let Some(source_line) = source.lines().nth(line.saturating_sub(1)) else {
      return self.to_string();
    };
    let marker = format!("{}^", " ".repeat(column.saturating_sub(1)));
    format!("{self}\n  {source_line}\n  {marker} {}", self.message())
  }
}

#[cfg(test)]
mod tests {
  use super::CompileError;

  #[test]
  fn display_includes_position_and_kind() {
    let err = CompileError::syntax(3, 7, "unexpected ';'");
    assert_eq!(err.to_string(), "3:7: syntax error: unexpected ';'");
    assert_eq!(err.position(), Some((3, 7)));
    assert!(err.is_diagnostic());
  }

  #[test]
  fn render_points_at_column() {
    let source = "int main() {\n  return @;\n}\n";
    let err = CompileError::lexical(2, 10, "unexpected character '@'");
    let rendered = err.render(source);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[1], "    return @;");
    assert_eq!(lines[2], "           ^ unexpected character '@'");
  }

  #[test]
  fn limitations_have_no_position() {
    let err = CompileError::unsupported("real values");
    assert_eq!(err.position(), None);
    assert!(!err.is_diagnostic());
    assert_eq!(err.render("int main() {}"), "not supported: real values");
  }
}
