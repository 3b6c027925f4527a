use std::fmt;

/// Static types of the language. Both are built-in; there are no user types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
  Int,
  Double,
}

impl Type {
  pub const BUILTINS: [Type; 2] = [Type::Int, Type::Double];

  pub fn from_specifier(specifier: &str) -> Option<Self> {
    match specifier {
      "int" => Some(Self::Int),
      "double" => Some(Self::Double),
      _ => None,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Int => "int",
      Self::Double => "double",
    }
  }

  pub fn is_integer(&self) -> bool {
    matches!(self, Self::Int)
  }

  /// Size in bytes of a value of this type on the target.
  pub fn size(&self) -> usize {
    match self {
      Self::Int => 4,
      Self::Double => 8,
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
