//! Z80 instruction selection at the IR level (spec.md §4.2 pass 3,
//! "Z80 backend only"): pattern-matches IR idioms to cheaper forms.
//! The opcode set stays closed (spec.md §3) — idioms that need a
//! dedicated Z80 mnemonic later (`INC`, `XOR A`, a flag-only compare)
//! are recorded as a `comment` hint on the existing instruction rather
//! than invented as new opcodes, and read back by `minz-z80`'s emit
//! step.

use minz_ir::{Diagnostics, Module, Opcode, Vreg};

use crate::pass::{Pass, PassReport};

pub struct Z80InstructionSelection;

impl Pass for Z80InstructionSelection {
    fn name(&self) -> &'static str {
        "z80-instruction-selection"
    }

    fn run(&self, module: &mut Module, _diags: &mut Diagnostics) -> PassReport {
        let mut total = 0;
        for fi in 0..module.functions.len() {
            loop {
                let delta = select_one_pass(module, fi);
                total += delta;
                if delta == 0 {
                    break;
                }
            }
        }
        PassReport::of(total)
    }
}

fn select_one_pass(module: &mut Module, fi: usize) -> usize {
    let mut changed = 0;
    let n = module.functions[fi].instructions.len();

    for i in 0..n {
        let instr = module.functions[fi].instructions[i].clone();

        match instr.op {
            // `Add x, 1` -> increment pseudo: hinted via comment, the
            // dest/src1 vregs already coincide once the allocator
            // assigns them the same physical register for a true
            // read-modify-write increment.
            Opcode::Add if is_const_one(module, fi, i, &instr) && instr.comment.is_empty() => {
                module.functions[fi].instructions[i].comment = "inc".into();
                changed += 1;
            }
            Opcode::Sub if is_const_one(module, fi, i, &instr) && instr.comment.is_empty() => {
                module.functions[fi].instructions[i].comment = "dec".into();
                changed += 1;
            }
            // `Mul x, 2^k` -> `Shl x, k`.
            Opcode::Mul => {
                if let Some(k) = power_of_two_rhs(module, fi, i, &instr) {
                    let entry = &mut module.functions[fi].instructions[i];
                    entry.op = Opcode::Shl;
                    entry.src2 = Vreg::UNUSED;
                    entry.imm = k as i64;
                    changed += 1;
                }
            }
            // `LoadConst 0` kept, flagged for `XOR A` materialization.
            Opcode::LoadConst if instr.imm == 0 && instr.comment.is_empty() => {
                module.functions[fi].instructions[i].comment = "xor0".into();
                changed += 1;
            }
            // `Eq x, 0` -> flag-only test (`OR A` equivalent at emit time).
            Opcode::Eq if is_zero_rhs(module, fi, i, &instr) && instr.comment.is_empty() => {
                module.functions[fi].instructions[i].comment = "flagtest_z".into();
                changed += 1;
            }
            _ => {}
        }
    }

    changed
}

fn find_const(module: &Module, fi: usize, before: usize, v: minz_ir::Vreg) -> Option<i64> {
    module.functions[fi].instructions[..before]
        .iter()
        .rev()
        .find(|i| i.op == Opcode::LoadConst && i.dest == v)
        .map(|i| i.imm)
}

fn is_const_one(module: &Module, fi: usize, i: usize, instr: &minz_ir::Instruction) -> bool {
    find_const(module, fi, i, instr.src2) == Some(1)
}

fn is_zero_rhs(module: &Module, fi: usize, i: usize, instr: &minz_ir::Instruction) -> bool {
    find_const(module, fi, i, instr.src2) == Some(0)
}

fn power_of_two_rhs(module: &Module, fi: usize, i: usize, instr: &minz_ir::Instruction) -> Option<u32> {
    let value = find_const(module, fi, i, instr.src2)?;
    if value > 0 && (value & (value - 1)) == 0 {
        Some(value.trailing_zeros())
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Type, Vreg};

    #[test]
    fn rewrites_power_of_two_multiply_to_shift() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(4));
        function.instructions.push(
            Instruction::new(Opcode::Mul, u8_ty).with_dest(Vreg(2)).with_src1(Vreg(1)).with_src2(Vreg(1)),
        );
        module.functions.push(function);

        let mut diags = Diagnostics::new();
        Z80InstructionSelection.run(&mut module, &mut diags);

        let rewritten = &module.functions[0].instructions[1];
        assert_eq!(rewritten.op, Opcode::Shl);
        assert_eq!(rewritten.imm, 2);
    }
}
