//! Reference evaluator for intermediate code.
//!
//! Runs quadruples with the same integer semantics as the emitted x86-64:
//! 32-bit two's complement `addl`/`subl`/`imull`/`negl`, `idivl` truncating
//! toward zero and faulting on a zero divisor or `i32::MIN / -1`, and a
//! `%eax` that keeps whatever was last returned when a function runs off its
//! end. Every call gets a fresh frame of zeroed slots indexed the same way
//! the code generator addresses them.

use std::collections::HashMap;

use log::trace;

use crate::error::{CompileError, CompileResult};
use crate::ir::{Field, IntermediateCode, Label, Opcode, Quadruple};
use crate::symtab::{Symbol, SymbolTable};

/// Deepest call chain the evaluator follows before giving up.
pub const MAX_CALL_DEPTH: usize = 1000;

/// Call `function` with `arguments` and return the value left in `%eax`.
pub fn run(
  code: &IntermediateCode,
  table: &SymbolTable,
  function: &str,
  arguments: &[i32],
) -> CompileResult<i32> {
  let evaluator = Evaluator { code, table };
  evaluator.call(function, arguments, 0)
}

struct Evaluator<'a> {
  code: &'a IntermediateCode,
  table: &'a SymbolTable,
}

struct Activation {
  parameters: Vec<i32>,
  variables: Vec<i32>,
}

#[derive(Clone, Copy)]
enum Slot {
  Parameter(usize),
  Variable(usize),
}

impl Evaluator<'_> {
  fn call(&self, function: &str, arguments: &[i32], depth: usize) -> CompileResult<i32> {
    if depth >= MAX_CALL_DEPTH {
      return Err(CompileError::evaluation(format!(
        "call depth exceeded {MAX_CALL_DEPTH} while calling '{function}'"
      )));
    }
    let body = self
      .code
      .function(function)
      .ok_or_else(|| CompileError::evaluation(format!("no code for function '{function}'")))?;
    let symbol = self
      .table
      .lookup_local(self.table.global(), function)
      .ok_or_else(|| CompileError::evaluation(format!("unknown function '{function}'")))?;
    let parameters = self.table.parameters(symbol)?.len();
    if parameters != arguments.len() {
      return Err(CompileError::evaluation(format!(
        "'{function}' takes {parameters} argument(s), but {} were passed",
        arguments.len()
      )));
    }

    let mut frame = Activation {
      parameters: arguments.to_vec(),
      variables: vec![0; self.table.variables(symbol)?.len()],
    };
    let labels: HashMap<Label, usize> = body
      .iter()
      .enumerate()
      .filter(|(_, quad)| quad.op == Opcode::Label)
      .map(|(index, quad)| quad.label(Field::Operand1).map(|label| (label, index)))
      .collect::<CompileResult<_>>()?;

    let mut eax = 0;
    let mut pushed: Vec<i32> = Vec::new();
    let mut pc = 0;
    while let Some(quad) = body.get(pc) {
      pc += 1;
      match quad.op {
        Opcode::Load => {
          let value = quad.constant(Field::Operand1)?;
          self.store(&mut frame, quad, Field::Result, value)?;
        }
        Opcode::Assign | Opcode::UPlus => {
          let value = self.load(&frame, quad, Field::Operand1)?;
          self.store(&mut frame, quad, Field::Result, value)?;
        }
        Opcode::UMinus => {
          let value = self.load(&frame, quad, Field::Operand1)?;
          self.store(&mut frame, quad, Field::Result, negl(value))?;
        }
        Opcode::Plus | Opcode::Minus | Opcode::Mult | Opcode::Div => {
          let lhs = self.load(&frame, quad, Field::Operand1)?;
          let rhs = self.load(&frame, quad, Field::Operand2)?;
          let value = match quad.op {
            Opcode::Plus => addl(lhs, rhs),
            Opcode::Minus => subl(lhs, rhs),
            Opcode::Mult => imull(lhs, rhs),
            _ => idivl(lhs, rhs).ok_or_else(|| {
              CompileError::evaluation(format!("division fault: {lhs} / {rhs} in '{function}'"))
            })?,
          };
          self.store(&mut frame, quad, Field::Result, value)?;
        }
        Opcode::Param => pushed.push(self.load(&frame, quad, Field::Operand1)?),
        Opcode::Call => {
          let callee = quad.name(Field::Operand1)?;
          let count = quad.count(Field::Operand2)?;
          if count > pushed.len() {
            return Err(CompileError::evaluation(format!(
              "call to '{callee}' expects {count} pushed argument(s), found {}",
              pushed.len()
            )));
          }
          let mut arguments = pushed.split_off(pushed.len() - count);
          arguments.reverse();
          trace!("{function} -> {callee}{arguments:?}");
          eax = self.call(callee, &arguments, depth + 1)?;
          self.store(&mut frame, quad, Field::Result, eax)?;
        }
        Opcode::Return => {
          eax = self.load(&frame, quad, Field::Operand2)?;
          pc = self.target(&labels, quad, Field::Operand1)?;
        }
        Opcode::Jmp => pc = self.target(&labels, quad, Field::Operand1)?,
        Opcode::JmpIfNot => {
          if self.load(&frame, quad, Field::Operand1)? == 0 {
            pc = self.target(&labels, quad, Field::Operand2)?;
          }
        }
        Opcode::Label => {}
      }
    }
    Ok(eax)
  }

  fn target(
    &self,
    labels: &HashMap<Label, usize>,
    quad: &Quadruple,
    field: Field,
  ) -> CompileResult<usize> {
    let label = quad.label(field)?;
    labels
      .get(&label)
      .copied()
      .ok_or_else(|| CompileError::evaluation(format!("jump to undefined label '{label}'")))
  }

  /// Frame slot a quadruple field refers to.
  fn locate(&self, quad: &Quadruple, field: Field) -> CompileResult<Slot> {
    let name = quad.name(field)?;
    let symbol = self
      .table
      .lookup(quad.scope, name)
      .ok_or_else(|| CompileError::evaluation(format!("unknown name '{name}'")))?;
    match self.table.symbol(symbol) {
      Symbol::Parameter { frame_index, .. } => Ok(Slot::Parameter(*frame_index)),
      Symbol::Variable { frame_index, .. } => Ok(Slot::Variable(*frame_index)),
      other => Err(CompileError::evaluation(format!(
        "'{name}' is a {}, not a storage location",
        other.kind_name()
      ))),
    }
  }

  fn load(&self, frame: &Activation, quad: &Quadruple, field: Field) -> CompileResult<i32> {
    let slot = self.locate(quad, field)?;
    let value = match slot {
      Slot::Parameter(index) => frame.parameters.get(index),
      Slot::Variable(index) => frame.variables.get(index),
    };
    value.copied().ok_or_else(|| missing_slot(quad, field))
  }

  fn store(
    &self,
    frame: &mut Activation,
    quad: &Quadruple,
    field: Field,
    value: i32,
  ) -> CompileResult<()> {
    let slot = self.locate(quad, field)?;
    let target = match slot {
      Slot::Parameter(index) => frame.parameters.get_mut(index),
      Slot::Variable(index) => frame.variables.get_mut(index),
    };
    *target.ok_or_else(|| missing_slot(quad, field))? = value;
    Ok(())
  }
}

// 32-bit ALU instructions, computed in 64 bits and truncated to the low
// half of the destination register.

fn addl(lhs: i32, rhs: i32) -> i32 {
  (i64::from(lhs) + i64::from(rhs)) as i32
}

fn subl(lhs: i32, rhs: i32) -> i32 {
  (i64::from(lhs) - i64::from(rhs)) as i32
}

fn imull(lhs: i32, rhs: i32) -> i32 {
  (i64::from(lhs) * i64::from(rhs)) as i32
}

fn negl(value: i32) -> i32 {
  (-i64::from(value)) as i32
}

/// `cltd; idivl`: divides the sign-extended `%edx:%eax` and raises #DE when
/// the divisor is zero or the quotient does not fit in `%eax`.
fn idivl(dividend: i32, divisor: i32) -> Option<i32> {
  if divisor == 0 {
    return None;
  }
  let quotient = i64::from(dividend) / i64::from(divisor);
  i32::try_from(quotient).ok()
}

fn missing_slot(quad: &Quadruple, field: Field) -> CompileError {
  let name = quad.name(field).unwrap_or("?");
  CompileError::evaluation(format!("'{name}' has no slot in the current frame"))
}

#[cfg(test)]
mod tests {
  use super::{MAX_CALL_DEPTH, run};
  use crate::error::{CompileError, CompileResult};
  use crate::ir::{IntermediateCode, generate};
  use crate::parser::parse;
  use crate::resolver::resolve;
  use crate::sema::analyze;
  use crate::symtab::SymbolTable;

  fn lower(source: &str) -> (IntermediateCode, SymbolTable) {
    let mut unit = parse(source).unwrap();
    let mut table = resolve(&mut unit).unwrap();
    analyze(&unit, &table).unwrap();
    let code = generate(&unit, &mut table).unwrap();
    (code, table)
  }

  fn run_main(source: &str, x: i32) -> CompileResult<i32> {
    let (code, table) = lower(source);
    run(&code, &table, "main", &[x])
  }

  #[test]
  fn evaluates_arithmetic_with_target_semantics() {
    assert_eq!(run_main("int main(int x) { return 2 + 3 * 4; }", 0), Ok(14));
    assert_eq!(run_main("int main(int x) { return x / 2; }", -7), Ok(-3));
    assert_eq!(
      run_main("int main(int x) { return x + 1; }", i32::MAX),
      Ok(i32::MIN)
    );
    assert_eq!(run_main("int main(int x) { return -x; }", i32::MIN), Ok(i32::MIN));
  }

  #[test]
  fn alu_helpers_follow_the_hardware() {
    use super::{addl, idivl, imull, negl, subl};
    assert_eq!(addl(i32::MAX, 1), i32::MIN);
    assert_eq!(subl(i32::MIN, 1), i32::MAX);
    assert_eq!(imull(65536, 65536), 0);
    assert_eq!(imull(-3, 7), -21);
    assert_eq!(negl(i32::MIN), i32::MIN);
    assert_eq!(idivl(-7, 2), Some(-3));
    assert_eq!(idivl(7, -2), Some(-3));
    assert_eq!(idivl(-7, -2), Some(3));
    assert_eq!(idivl(1, 0), None);
    assert_eq!(idivl(i32::MIN, -1), None);
    assert_eq!(idivl(i32::MIN, 1), Some(i32::MIN));
  }

  #[test]
  fn arguments_bind_in_declaration_order() {
    let source = "int sub(int a, int b) { return a - b; } int main(int x) { return sub(x, 3); }";
    assert_eq!(run_main(source, 10), Ok(7));
  }

  #[test]
  fn recursion_and_conditionals() {
    let source = "int factorial(int x) { if (x) { int next; next = x - 1; return x * factorial(next); } else return 1; }\n\
                  int main(int x) { return factorial(x); }";
    assert_eq!(run_main(source, 5), Ok(120));
    assert_eq!(run_main(source, 0), Ok(1));
  }

  #[test]
  fn locals_start_zeroed_and_shadowing_uses_distinct_slots() {
    let source = "int main(int x) { int a; { int a; a = 5; } return a; }";
    assert_eq!(run_main(source, 1), Ok(0));
  }

  #[test]
  fn falling_off_the_end_keeps_the_last_returned_value() {
    let source = "int f(int a) { return a; } int main(int x) { int r; r = f(x); }";
    assert_eq!(run_main(source, 42), Ok(42));
  }

  #[test]
  fn division_faults_are_reported() {
    let err = run_main("int main(int x) { return 1 / x; }", 0).unwrap_err();
    assert!(matches!(err, CompileError::Evaluation { .. }));
    assert!(err.to_string().contains("division fault: 1 / 0"));

    let err = run_main("int main(int x) { return x / -1; }", i32::MIN).unwrap_err();
    assert!(matches!(err, CompileError::Evaluation { .. }));
  }

  #[test]
  fn unbounded_recursion_hits_the_depth_limit() {
    let err = run_main("int main(int x) { return main(x); }", 1).unwrap_err();
    assert_eq!(
      err,
      CompileError::evaluation(format!(
        "call depth exceeded {MAX_CALL_DEPTH} while calling 'main'"
      ))
    );
  }

  #[test]
  fn rejects_unknown_functions_and_wrong_arity() {
    let (code, table) = lower("int main(int x) { return x; }");
    assert!(matches!(
      run(&code, &table, "missing", &[]),
      Err(CompileError::Evaluation { .. })
    ));
    assert!(matches!(
      run(&code, &table, "main", &[1, 2]),
      Err(CompileError::Evaluation { .. })
    ));
  }
}
