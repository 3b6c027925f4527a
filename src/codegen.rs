//! Code generation: translate quadruples into GNU-assembler x86-64 text.
//!
//! Nothing stays in a register between quadruples. Each one loads its
//! operands from the stack frame into `%eax`/`%ecx`/`%edx`, computes, and
//! stores the result back. Arguments are pushed as 8-byte slots by the caller
//! and popped by it after the call; the callee finds them above its saved
//! `%rbp` and return address:
//!
//! ```text
//!   24(%rbp)   second parameter
//!   16(%rbp)   first parameter
//!    8(%rbp)   return address
//!    0(%rbp)   caller's %rbp
//!   -4(%rbp)   first local
//!   -8(%rbp)   second local
//! ```

use log::debug;

use crate::error::{CompileError, CompileResult};
use crate::ir::{Field, IntermediateCode, Opcode, Quadruple};
use crate::symtab::{Symbol, SymbolTable};
use crate::ty::Type;

/// Bytes a pushed argument occupies on the stack.
const ARGUMENT_SLOT: usize = 8;

/// Emit the assembly file for all functions in `code`.
pub fn generate(
  code: &IntermediateCode,
  table: &SymbolTable,
  file_name: &str,
) -> CompileResult<String> {
  let mut asm = String::new();
  asm.push_str(&format!("\t.file \"{file_name}\"\n"));
  asm.push_str("\t.text\n");

  for (name, body) in code.functions() {
    asm.push_str(&format!("\t.globl {name}\n"));
    asm.push_str(&format!("\t.type {name}, @function\n"));
    asm.push_str(&format!("{name}:\n"));
    emit_function(name, body, table, &mut asm)?;
    asm.push_str(&format!("\t.size {name}, .-{name}\n"));
  }

  Ok(asm)
}

fn emit_function(
  name: &str,
  body: &[Quadruple],
  table: &SymbolTable,
  asm: &mut String,
) -> CompileResult<()> {
  let function = table
    .lookup_local(table.global(), name)
    .ok_or_else(|| CompileError::internal(format!("no symbol for function '{name}'")))?;
  let locals = table.variables(function)?.len();
  let frame_size = (locals * Type::Int.size()).next_multiple_of(8);
  debug!("'{name}': {locals} local slot(s), {frame_size} byte frame");

  asm.push_str("\tpushq %rbp\n");
  asm.push_str("\tmovq %rsp, %rbp\n");
  asm.push_str(&format!("\tsubq ${frame_size}, %rsp\n"));

  for quad in body {
    emit_quad(quad, table, asm)?;
  }

  asm.push_str("\tmovq %rbp, %rsp\n");
  asm.push_str("\tpopq %rbp\n");
  asm.push_str("\tret\n");
  Ok(())
}

/// Emit the fixed instruction template of a single quadruple.
fn emit_quad(quad: &Quadruple, table: &SymbolTable, asm: &mut String) -> CompileResult<()> {
  match quad.op {
    Opcode::Load => {
      let value = quad.constant(Field::Operand1)?;
      let result = address(quad, Field::Result, table)?;
      asm.push_str(&format!("\tmovl ${value}, {result}\n"));
    }
    Opcode::Assign | Opcode::UPlus => {
      let value = address(quad, Field::Operand1, table)?;
      let result = address(quad, Field::Result, table)?;
      asm.push_str(&format!("\tmovl {value}, %eax\n"));
      asm.push_str(&format!("\tmovl %eax, {result}\n"));
    }
    Opcode::UMinus => {
      let operand = address(quad, Field::Operand1, table)?;
      let result = address(quad, Field::Result, table)?;
      asm.push_str(&format!("\tmovl {operand}, %eax\n"));
      asm.push_str("\tnegl %eax\n");
      asm.push_str(&format!("\tmovl %eax, {result}\n"));
    }
    Opcode::Plus => emit_binary("addl", quad, table, asm)?,
    Opcode::Minus => emit_binary("subl", quad, table, asm)?,
    Opcode::Mult => emit_binary("imull", quad, table, asm)?,
    Opcode::Div => {
      let lhs = address(quad, Field::Operand1, table)?;
      let rhs = address(quad, Field::Operand2, table)?;
      let result = address(quad, Field::Result, table)?;
      asm.push_str(&format!("\tmovl {lhs}, %eax\n"));
      asm.push_str("\tcltd\n");
      asm.push_str(&format!("\tmovl {rhs}, %ecx\n"));
      asm.push_str("\tidivl %ecx\n");
      asm.push_str(&format!("\tmovl %eax, {result}\n"));
    }
    Opcode::Param => {
      let value = address(quad, Field::Operand1, table)?;
      // Pushing all of %rax keeps every argument slot 8 bytes wide.
      asm.push_str(&format!("\tmovl {value}, %eax\n"));
      asm.push_str("\tpushq %rax\n");
    }
    Opcode::Call => {
      let callee = quad.name(Field::Operand1)?;
      let count = quad.count(Field::Operand2)?;
      let result = address(quad, Field::Result, table)?;
      let is_function = table
        .lookup_local(table.global(), callee)
        .is_some_and(|id| matches!(table.symbol(id), Symbol::Function { .. }));
      if !is_function {
        return Err(CompileError::internal(format!(
          "call to '{callee}', which is not a function"
        )));
      }
      asm.push_str(&format!("\tcall {callee}\n"));
      if count > 0 {
        asm.push_str(&format!("\taddq ${}, %rsp\n", count * ARGUMENT_SLOT));
      }
      asm.push_str(&format!("\tmovl %eax, {result}\n"));
    }
    Opcode::Return => {
      let exit = quad.label(Field::Operand1)?;
      let value = address(quad, Field::Operand2, table)?;
      asm.push_str(&format!("\tmovl {value}, %eax\n"));
      asm.push_str(&format!("\tjmp {exit}\n"));
    }
    Opcode::Label => {
      let label = quad.label(Field::Operand1)?;
      asm.push_str(&format!("{label}:\n"));
    }
    Opcode::Jmp => {
      let label = quad.label(Field::Operand1)?;
      asm.push_str(&format!("\tjmp {label}\n"));
    }
    Opcode::JmpIfNot => {
      let predicate = address(quad, Field::Operand1, table)?;
      let label = quad.label(Field::Operand2)?;
      asm.push_str(&format!("\tmovl {predicate}, %eax\n"));
      asm.push_str("\tcmpl $0, %eax\n");
      asm.push_str(&format!("\tje {label}\n"));
    }
  }
  Ok(())
}

fn emit_binary(
  instruction: &str,
  quad: &Quadruple,
  table: &SymbolTable,
  asm: &mut String,
) -> CompileResult<()> {
  let lhs = address(quad, Field::Operand1, table)?;
  let rhs = address(quad, Field::Operand2, table)?;
  let result = address(quad, Field::Result, table)?;
  asm.push_str(&format!("\tmovl {rhs}, %edx\n"));
  asm.push_str(&format!("\tmovl {lhs}, %eax\n"));
  asm.push_str(&format!("\t{instruction} %edx, %eax\n"));
  asm.push_str(&format!("\tmovl %eax, {result}\n"));
  Ok(())
}

/// `%rbp`-relative address of the parameter or local named in `field`.
fn address(quad: &Quadruple, field: Field, table: &SymbolTable) -> CompileResult<String> {
  let name = quad.name(field)?;
  let symbol = table
    .lookup(quad.scope, name)
    .ok_or_else(|| CompileError::internal(format!("'{name}' is not in scope")))?;
  match table.symbol(symbol) {
    Symbol::Parameter { frame_index, .. } => {
      Ok(format!("{}(%rbp)", frame_index * ARGUMENT_SLOT + 16))
    }
    Symbol::Variable { frame_index, .. } => {
      Ok(format!("-{}(%rbp)", (frame_index + 1) * Type::Int.size()))
    }
    other => Err(CompileError::internal(format!(
      "{} '{name}' has no stack slot",
      other.kind_name()
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::generate;
  use crate::ir;
  use crate::parser::parse;
  use crate::resolver::resolve;
  use crate::sema::analyze;

  fn compile(source: &str) -> String {
    let mut unit = parse(source).unwrap();
    let mut table = resolve(&mut unit).unwrap();
    analyze(&unit, &table).unwrap();
    let code = ir::generate(&unit, &mut table).unwrap();
    generate(&code, &table, "test.c").unwrap()
  }

  fn lines(asm: &str) -> Vec<&str> {
    asm.lines().map(str::trim).collect()
  }

  #[test]
  fn emits_file_header_and_function_block() {
    let asm = compile("int main(int x) { return x; }");
    assert_eq!(
      asm,
      "\t.file \"test.c\"\n\
       \t.text\n\
       \t.globl main\n\
       \t.type main, @function\n\
       main:\n\
       \tpushq %rbp\n\
       \tmovq %rsp, %rbp\n\
       \tsubq $0, %rsp\n\
       \tmovl 16(%rbp), %eax\n\
       \tjmp label0\n\
       label0:\n\
       \tmovq %rbp, %rsp\n\
       \tpopq %rbp\n\
       \tret\n\
       \t.size main, .-main\n"
    );
  }

  #[test]
  fn frame_size_rounds_up_to_eight_bytes() {
    // a, b and one temporary: 12 bytes of locals
    let asm = compile("int main(int x) { int a; int b; a = 1; b = a; return b; }");
    assert!(lines(&asm).contains(&"subq $16, %rsp"));
    // two temporaries
    let asm = compile("int main(int x) { return 1 + x; }");
    assert!(lines(&asm).contains(&"subq $8, %rsp"));
  }

  #[test]
  fn addresses_parameters_above_and_locals_below_the_frame_pointer() {
    let asm = compile("int main(int x) { return x; } int f(int a, int b) { int c; c = b; return a; }");
    let lines = lines(&asm);
    let f = lines.iter().position(|line| *line == "f:").unwrap();
    assert_eq!(
      &lines[f + 4..f + 8],
      &["movl 24(%rbp), %eax", "movl %eax, -4(%rbp)", "movl 16(%rbp), %eax", "jmp label1"]
    );
  }

  #[test]
  fn lowers_arithmetic_templates() {
    let asm = compile("int main(int x) { return (x + x) * x / -x - x; }");
    let lines = lines(&asm);
    for expected in [
      "addl %edx, %eax",
      "imull %edx, %eax",
      "subl %edx, %eax",
      "negl %eax",
      "cltd",
      "idivl %ecx",
    ] {
      assert!(lines.contains(&expected), "missing {expected}");
    }
    let add = lines.iter().position(|line| *line == "addl %edx, %eax").unwrap();
    assert_eq!(
      &lines[add - 2..=add + 1],
      &["movl 16(%rbp), %edx", "movl 16(%rbp), %eax", "addl %edx, %eax", "movl %eax, -4(%rbp)"]
    );
  }

  #[test]
  fn calls_push_arguments_and_pop_them_afterwards() {
    let asm = compile(
      "int f(int a, int b) { return a - b; } int main(int x) { return f(x, 2); }",
    );
    let lines = lines(&asm);
    let main = lines.iter().position(|line| *line == "main:").unwrap();
    assert_eq!(
      &lines[main + 4..main + 12],
      &[
        "movl $2, -4(%rbp)",
        "movl -4(%rbp), %eax",
        "pushq %rax",
        "movl 16(%rbp), %eax",
        "pushq %rax",
        "call f",
        "addq $16, %rsp",
        "movl %eax, -8(%rbp)",
      ]
    );
  }

  #[test]
  fn calls_without_arguments_pop_nothing() {
    let asm = compile("int one() { return 1; } int main() { return one(); }");
    let lines = lines(&asm);
    let call = lines.iter().position(|line| *line == "call one").unwrap();
    assert_eq!(lines[call + 1], "movl %eax, -4(%rbp)");
  }

  #[test]
  fn conditionals_compare_against_zero() {
    let asm = compile("int main(int x) { if (x) x = 1; else x = 2; return x; }");
    let lines = lines(&asm);
    let test = lines.iter().position(|line| *line == "cmpl $0, %eax").unwrap();
    assert_eq!(lines[test - 1], "movl 16(%rbp), %eax");
    assert_eq!(lines[test + 1], "je label1");
    assert!(lines.contains(&"jmp label2"));
    assert!(lines.contains(&"label1:"));
    assert!(lines.contains(&"label2:"));
  }

  #[test]
  fn unary_plus_copies_its_operand() {
    let asm = compile("int main(int x) { return +x; }");
    let lines = lines(&asm);
    let body = lines.iter().position(|line| *line == "subq $8, %rsp").unwrap();
    assert_eq!(
      &lines[body + 1..body + 4],
      &["movl 16(%rbp), %eax", "movl %eax, -4(%rbp)", "movl -4(%rbp), %eax"]
    );
  }
}
