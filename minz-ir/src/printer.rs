//! The `.mir` textual dump written alongside assembly when `-d` is
//! passed (spec.md §6.4). Not otherwise part of the spec; supplemented
//! because a debug IR dump is the natural counterpart to the teacher's
//! `vex`/`vexfile` container inspection tools and to `vasm`'s own
//! assembly-text output — a compiler with an optimizer pipeline that
//! cannot show its work before/after a pass is unreviewable in practice.

use std::fmt::Write as _;

use minz_support::MnemonicName;

use crate::module::{Function, Instruction, Module};
use crate::opcode::Opcode;

pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    for (i, global) in module.globals.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "global {}: T{} = {:?}", global.name, global.ty.0, global.init);
    }
    if !module.globals.is_empty() {
        out.push('\n');
    }
    for (i, function) in module.functions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        print_function(&mut out, function);
    }
    out
}

fn print_function(out: &mut String, function: &Function) {
    let params: Vec<String> = function
        .params
        .iter()
        .map(|p| format!("{}: T{}", p.name, p.ty.0))
        .collect();
    let _ = write!(
        out,
        "fn {}({}) -> T{}",
        function.name,
        params.join(", "),
        function.return_type.0
    );
    if let Some(err) = function.error_type {
        let _ = write!(out, " ? T{}", err.0);
    }
    let mut flags = Vec::new();
    if function.requires_context {
        flags.push("requires_context");
    }
    if !function.is_smc_default {
        flags.push("no_smc");
    }
    if !flags.is_empty() {
        let _ = write!(out, " [{}]", flags.join(", "));
    }
    let _ = writeln!(out, " {{");
    for instr in &function.instructions {
        print_instruction(out, instr);
    }
    let _ = writeln!(out, "}}");
}

fn print_instruction(out: &mut String, instr: &Instruction) {
    if instr.op == Opcode::Label {
        let _ = writeln!(out, "{}:", instr.label);
        return;
    }

    let _ = write!(out, "    ");
    if !instr.dest.is_unused() {
        let _ = write!(out, "{} = ", instr.dest);
    }
    let _ = write!(out, "{}", instr.op.mnemonic());

    let mut operands = Vec::new();
    if !instr.src1.is_unused() {
        operands.push(instr.src1.to_string());
    }
    if !instr.src2.is_unused() {
        operands.push(instr.src2.to_string());
    }
    if instr.imm != 0 || matches!(instr.op, Opcode::LoadConst) {
        operands.push(format!("#{}", instr.imm));
    }
    if !instr.label.is_empty() {
        operands.push(instr.label.clone());
    }
    if !instr.symbol.is_empty() {
        operands.push(instr.symbol.clone());
    }
    if !operands.is_empty() {
        let _ = write!(out, " {}", operands.join(", "));
    }
    if !instr.comment.is_empty() {
        let _ = write!(out, "  ; {}", instr.comment);
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::module::Param;
    use crate::types::Type;
    use crate::vreg::Vreg;

    #[test]
    fn prints_a_two_instruction_function() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("add", u8_ty);
        function.params.push(Param { name: "a".into(), ty: u8_ty });
        function.num_params = 1;
        function.instructions.push(
            Instruction::new(Opcode::LoadConst, u8_ty)
                .with_dest(Vreg(1))
                .with_imm(5),
        );
        function.instructions.push(
            Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(1)),
        );
        module.functions.push(function);

        let text = print_module(&module);
        assert!(text.contains("fn add(a: T0) -> T0"));
        assert!(text.contains("%1 = LoadConst #5"));
        assert!(text.contains("Return %1"));
    }
}
