//! The shared stack-based emitter (spec.md §4.5). Every opcode pushes
//! and pops an explicit operand stack rather than naming physical
//! registers — there is no register allocator in this crate, since none
//! of these targets need the Z80's SMC-driven register discipline.
//! Interface-only per spec.md §4.5: enough to prove the `Module` input
//! contract and the fail-fast failure policy, not a tuned code
//! generator per target.

use minz_ir::{Function, Instruction, Module, Opcode};
use tracing::debug;

use crate::dialect::Target;
use crate::error::BackendError;

pub fn emit(target: Target, module: &Module) -> Result<String, BackendError> {
    debug!(target = target.name(), functions = module.functions.len(), "emitting alternative backend stub");
    let mut lines = Vec::new();
    let comment = target.comment_prefix();

    lines.push(format!("{comment} target: {}", target.name()));
    if target.is_source_level() {
        lines.push(format!("{comment} stack-based calling convention, no SMC"));
    }

    for function in &module.functions {
        emit_function(target, function, &mut lines)?;
    }

    Ok(lines.join("\n"))
}

fn emit_function(target: Target, function: &Function, lines: &mut Vec<String>) -> Result<(), BackendError> {
    let comment = target.comment_prefix();
    lines.push(format!("{}:", function.name));
    lines.push(format!("    {comment} prologue: push frame, bind {} param(s) from stack", function.params.len()));

    for instr in &function.instructions {
        emit_instruction(target, instr, lines)?;
    }
    Ok(())
}

fn emit_instruction(target: Target, instr: &Instruction, lines: &mut Vec<String>) -> Result<(), BackendError> {
    let line = match instr.op {
        Opcode::Nop => "    NOP".to_string(),
        Opcode::Label => format!("{}:", instr.label),
        Opcode::Jump => format!("    JMP {}", instr.label),
        Opcode::JumpIf => format!("    JMP.IF {}", instr.label),
        Opcode::JumpIfNot => format!("    JMP.IFNOT {}", instr.label),
        Opcode::Call => format!("    CALL {}", instr.symbol),
        Opcode::Return => "    RETURN".to_string(),

        Opcode::LoadConst => format!("    PUSH #{}", instr.imm),
        Opcode::LoadVar => format!("    PUSH [{}]", instr.symbol),
        Opcode::StoreVar => format!("    POP [{}]", instr.symbol),
        Opcode::LoadParam => format!("    PUSH.PARAM {}", instr.symbol),
        Opcode::LoadField => format!("    PUSH.FIELD +{}", instr.imm),
        Opcode::StoreField => format!("    POP.FIELD +{}", instr.imm),
        Opcode::LoadIndex => "    PUSH.INDEX".to_string(),
        Opcode::StoreIndex => "    POP.INDEX".to_string(),
        Opcode::LoadPtr => "    PUSH.DEREF".to_string(),
        Opcode::StorePtr => "    POP.DEREF".to_string(),

        Opcode::Add => "    ADD".to_string(),
        Opcode::Sub => "    SUB".to_string(),
        Opcode::Mul => "    MUL".to_string(),
        Opcode::Div => "    DIV".to_string(),
        Opcode::Mod => "    MOD".to_string(),
        Opcode::Neg => "    NEG".to_string(),

        Opcode::And => "    AND".to_string(),
        Opcode::Or => "    OR".to_string(),
        Opcode::Xor => "    XOR".to_string(),
        Opcode::Not => "    NOT".to_string(),
        Opcode::Shl => "    SHL".to_string(),
        Opcode::Shr => "    SHR".to_string(),

        Opcode::Eq => "    CMP.EQ".to_string(),
        Opcode::Ne => "    CMP.NE".to_string(),
        Opcode::Lt => "    CMP.LT".to_string(),
        Opcode::Gt => "    CMP.GT".to_string(),
        Opcode::Le => "    CMP.LE".to_string(),
        Opcode::Ge => "    CMP.GE".to_string(),

        Opcode::Alloc => format!("    ALLOC {}", instr.imm),
        Opcode::Free => "    FREE".to_string(),

        // SMC pseudo-ops have no stack-based equivalent on any of these
        // targets (spec.md §4.5: "none are required to implement SMC").
        Opcode::SMCParam | Opcode::SMCSave | Opcode::SMCRestore | Opcode::SMCUpdate => {
            return Err(BackendError::UnsupportedOpcode { target: target.name(), op: instr.op, loc: instr.loc });
        }
    };
    lines.push(line);
    Ok(())
}
