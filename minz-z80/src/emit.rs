//! IR-to-assembly lowering (spec.md §4.4.5), the SMC-first prologue
//! (§4.4.1), caller-side codegen (§4.4.2), and the recursion save/
//! update/call/restore protocol (§4.4.3). Each function is allocated
//! independently by `minz-regalloc`, then walked once to produce text.

use minz_ir::{Function, Instruction, Module, Opcode, Type, Vreg};
use minz_regalloc::{is_16_bit, Allocator, Assignment, FunctionAllocation, PhysReg};
use minz_support::MnemonicName;

use crate::error::BackendError;
use crate::smc::{disabled_reason, param_label, smc_enabled};

pub struct EmittedFunction {
    pub lines: Vec<String>,
}

pub fn emit_function(module: &Module, function: &Function) -> Result<EmittedFunction, BackendError> {
    let alloc = Allocator::allocate(function, |v| is_16_bit(module, function, v));
    let use_smc = smc_enabled(function);
    if function.attributes.smc && !use_smc {
        return Err(BackendError::SmcDisallowedButRequired {
            function: function.name.clone(),
            reason: disabled_reason(function).unwrap_or("unknown").to_string(),
            loc: function.instructions.first().map(|i| i.loc).unwrap_or_default(),
        });
    }

    let mut lines = Vec::new();
    lines.push(format!("{}:", function.name));

    if use_smc {
        emit_smc_prologue(function, module, &alloc, &mut lines);
    } else {
        emit_ix_prologue(&mut lines);
    }

    for instr in &function.instructions {
        emit_instruction(module, function, &alloc, instr, &mut lines)?;
    }

    if !use_smc {
        emit_ix_epilogue(&mut lines);
    }

    Ok(EmittedFunction { lines })
}

fn emit_smc_prologue(function: &Function, module: &Module, _alloc: &FunctionAllocation, lines: &mut Vec<String>) {
    for param in &function.params {
        let label = param_label(&function.name, &param.name);
        let width = module.type_of(param.ty).width();
        if matches!(width, Some(minz_support::width::Width::W8)) {
            lines.push(format!("{label}:    LD A, #00"));
        } else {
            lines.push(format!("{label}:    LD HL, #0000"));
        }
    }
}

fn emit_ix_prologue(lines: &mut Vec<String>) {
    lines.push("    PUSH IX".into());
    lines.push("    LD IX, SP".into());
}

fn emit_ix_epilogue(lines: &mut Vec<String>) {
    lines.push("    POP IX".into());
    lines.push("    RET".into());
}

fn reg_text(reg: PhysReg) -> String {
    match reg {
        PhysReg::R8(r) => r.mnemonic().to_string(),
        PhysReg::R16(r) => r.mnemonic().to_string(),
    }
}

fn operand_text(alloc: &FunctionAllocation, vreg: Vreg) -> String {
    if vreg.is_unused() {
        return String::new();
    }
    if vreg == Vreg::ZERO {
        return "#0".into();
    }
    if vreg == Vreg::SP {
        return "SP".into();
    }
    match alloc.get(vreg) {
        Some(Assignment::Register(reg)) => reg_text(reg),
        Some(Assignment::Spill(offset)) => format!("(IX-{offset})"),
        None => format!("%{}", vreg.0),
    }
}

/// Renders an instruction's `imm` as a Z80 immediate operand, used
/// wherever an opcode's second source slot is unused (`src2.is_unused()`)
/// and the value to operate against came in through `imm` instead
/// (narrowing casts, bit-struct mask/shift packing).
fn immediate_text(imm: i64, wide: bool) -> String {
    if wide {
        format!("#{:04X}", imm as u16)
    } else {
        format!("#{:02X}", imm as u8)
    }
}

fn is_wide(module: &Module, instr: &Instruction) -> bool {
    matches!(module.type_of(instr.ty).width(), Some(minz_support::width::Width::W16 | minz_support::width::Width::W24))
        || matches!(module.type_of(instr.ty), Type::Pointer { .. })
}

fn emit_instruction(
    module: &Module,
    function: &Function,
    alloc: &FunctionAllocation,
    instr: &Instruction,
    lines: &mut Vec<String>,
) -> Result<(), BackendError> {
    let wide = is_wide(module, instr);
    let dest = operand_text(alloc, instr.dest);
    let src1 = operand_text(alloc, instr.src1);
    let src2 = operand_text(alloc, instr.src2);

    match instr.op {
        Opcode::Nop => {}
        Opcode::Label => lines.push(format!("{}:", instr.label)),
        Opcode::Jump => lines.push(format!("    JP {}", instr.label)),
        Opcode::JumpIf => lines.push(format!("    LD A, {src1}\n    OR A\n    JP NZ, {}", instr.label)),
        Opcode::JumpIfNot => {
            if instr.comment == "djnz_candidate" {
                lines.push(format!("    DJNZ {}", instr.label));
            } else {
                lines.push(format!("    LD A, {src1}\n    OR A\n    JP Z, {}", instr.label));
            }
        }
        Opcode::Call => emit_call(instr, lines),
        Opcode::Return => {
            if !instr.src1.is_unused() {
                let ret_reg = if wide { "HL" } else { "A" };
                lines.push(format!("    LD {ret_reg}, {src1}"));
            }
            lines.push("    RET".into());
        }

        Opcode::LoadConst => {
            if instr.comment == "xor0" {
                lines.push(format!("    XOR A ; {dest} = 0"));
            } else if wide {
                lines.push(format!("    LD {dest}, #{:04X}", instr.imm as u16));
            } else {
                lines.push(format!("    LD {dest}, #{:02X}", instr.imm as u8));
            }
        }
        Opcode::LoadVar => lines.push(format!("    LD {dest}, ({})", instr.symbol)),
        Opcode::StoreVar => lines.push(format!("    LD ({}), {src1}", instr.symbol)),
        Opcode::LoadParam => {
            let label = param_label(&function.name, &instr.symbol);
            lines.push(format!("    LD {dest}, {label}"));
        }
        Opcode::LoadField => {
            lines.push(format!("    LD HL, {src1}"));
            lines.push(format!("    LD DE, #{}", instr.imm));
            lines.push("    ADD HL, DE".into());
            lines.push(format!("    LD {dest}, (HL)"));
        }
        Opcode::StoreField => {
            lines.push(format!("    LD HL, {src1}"));
            lines.push(format!("    LD DE, #{}", instr.imm));
            lines.push("    ADD HL, DE".into());
            lines.push(format!("    LD (HL), {src2}"));
        }
        Opcode::LoadIndex => {
            lines.push(format!("    LD HL, {src1}"));
            lines.push(format!("    LD DE, {src2}"));
            lines.push("    ADD HL, DE".into());
            lines.push(format!("    LD {dest}, (HL)"));
        }
        Opcode::StoreIndex => {
            lines.push(format!("    LD HL, {src1}"));
            lines.push(format!("    LD DE, {src2}"));
            lines.push("    ADD HL, DE".into());
            lines.push(format!("    LD (HL), {dest}"));
        }
        Opcode::LoadPtr => lines.push(format!("    LD {dest}, ({src1})")),
        Opcode::StorePtr => lines.push(format!("    LD ({src1}), {src2}")),

        Opcode::Add => {
            if instr.comment == "inc" {
                lines.push(format!("    INC {dest}"));
            } else {
                lines.push(format!("    ADD {dest}, {src2}"));
            }
        }
        Opcode::Sub => {
            if instr.comment.starts_with("dec") {
                lines.push(format!("    DEC {dest}"));
            } else {
                lines.push(format!("    SUB {dest}, {src2}"));
            }
        }
        Opcode::Mul => lines.push(format!("    CALL __mul16 ; {dest} = {src1} * {src2}")),
        Opcode::Div => lines.push(format!("    CALL __div16 ; {dest} = {src1} / {src2}")),
        Opcode::Mod => lines.push(format!("    CALL __mod16 ; {dest} = {src1} % {src2}")),
        Opcode::Neg => lines.push(format!("    NEG ; {dest} = -{src1}")),

        Opcode::And => {
            lines.push(format!("    LD A, {src1}"));
            let operand = if instr.src2.is_unused() { immediate_text(instr.imm, wide) } else { src2.clone() };
            lines.push(format!("    AND {operand}"));
            lines.push(format!("    LD {dest}, A"));
        }
        Opcode::Or => {
            lines.push(format!("    LD A, {src1}"));
            let operand = if instr.src2.is_unused() { immediate_text(instr.imm, wide) } else { src2.clone() };
            lines.push(format!("    OR {operand}"));
            lines.push(format!("    LD {dest}, A"));
        }
        Opcode::Xor => {
            lines.push(format!("    LD A, {src1}"));
            let operand = if instr.src2.is_unused() { immediate_text(instr.imm, wide) } else { src2.clone() };
            lines.push(format!("    XOR {operand}"));
            lines.push(format!("    LD {dest}, A"));
        }
        Opcode::Not => lines.push(format!("    CPL ; {dest} = !{src1}")),
        Opcode::Shl => lines.push(format!("    SLA {dest} ; x{}", instr.imm)),
        Opcode::Shr => lines.push(format!("    SRL {dest} ; x{}", instr.imm)),

        Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Gt | Opcode::Le | Opcode::Ge => {
            if instr.comment == "flagtest_z" {
                lines.push(format!("    LD A, {src1}"));
                lines.push("    OR A".into());
            } else {
                lines.push(format!("    LD A, {src1}"));
                lines.push(format!("    CP {src2}"));
            }
        }

        Opcode::Alloc => lines.push(format!("    CALL __alloc ; {dest} = alloc({})", instr.imm)),
        Opcode::Free => lines.push(format!("    CALL __free ; free({src1})")),

        // Caller-side argument marshalling (spec.md §4.4.2): patch the
        // callee's named parameter slot directly rather than passing
        // the value in a register or on the stack.
        Opcode::SMCParam => {
            let reg = if wide { "HL" } else { "A" };
            lines.push(format!("    LD {reg}, {src1}"));
            lines.push(format!("    LD ({}), {reg}", instr.symbol));
        }
        // Recursion protocol save/restore (spec.md §4.4.3): the enclosing
        // function's own parameter slot is shared memory, so a nested
        // (potentially recursive) call must preserve it across the call
        // on the stack and put it back afterward.
        Opcode::SMCSave => {
            let reg = if wide { "HL" } else { "A" };
            lines.push(format!("    LD {reg}, ({})", instr.symbol));
            lines.push(format!("    PUSH {}", if wide { "HL" } else { "AF" }));
        }
        Opcode::SMCRestore => {
            lines.push(format!("    POP {}", if wide { "HL" } else { "AF" }));
            let reg = if wide { "HL" } else { "A" };
            lines.push(format!("    LD ({}), {reg}", instr.symbol));
        }
        Opcode::SMCUpdate => {
            return Err(BackendError::UnsupportedOpcode { op: instr.op, loc: instr.loc });
        }
    }

    Ok(())
}

fn emit_call(instr: &Instruction, lines: &mut Vec<String>) {
    lines.push(format!("    CALL {}", instr.symbol));
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Opcode as Op, Type};

    #[test]
    fn smc_function_emits_one_param_label_per_parameter() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("add", u8_ty);
        function.params.push(minz_ir::Param { name: "a".into(), ty: u8_ty });
        function.instructions.push(Instruction::new(Op::Return, u8_ty));
        module.functions.push(function);

        let emitted = emit_function(&module, &module.functions[0]).unwrap();
        assert!(emitted.lines[1].contains("add_param_a"));
    }

    #[test]
    fn rom_function_uses_ix_frame_prologue() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.attributes.rom = true;
        function.instructions.push(Instruction::new(Op::Return, u8_ty));
        module.functions.push(function);

        let emitted = emit_function(&module, &module.functions[0]).unwrap();
        assert!(emitted.lines.iter().any(|l| l.contains("PUSH IX")));
    }
}
