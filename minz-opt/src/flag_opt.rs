//! Flag optimization (spec.md §4.2 pass 4): co-locates flag-producing
//! with flag-consuming instructions, and recognizes the `Dec B;
//! JumpIfNot end` idiom reserved for the backend's `DJNZ` emission.
//! This pass only tags candidates (via `comment`); `minz-z80`'s
//! assembly-level peephole (spec.md §4.4.6) performs the actual
//! mnemonic fusion once registers are assigned.

use minz_ir::{Diagnostics, Module, Opcode};

use crate::pass::{Pass, PassReport};

pub struct FlagOptimization;

impl Pass for FlagOptimization {
    fn name(&self) -> &'static str {
        "flag-optimization"
    }

    fn run(&self, module: &mut Module, _diags: &mut Diagnostics) -> PassReport {
        let mut total = 0;
        for fi in 0..module.functions.len() {
            total += tag_djnz_candidates(module, fi);
        }
        PassReport::of(total)
    }
}

/// The DJNZ shape spec.md §8 scenario 5 describes, as lowering actually
/// produces it: a `Sub x, 1` (tagged `dec` by instruction selection),
/// optionally followed by the `StoreVar` writing the new counter back,
/// then the unconditional `Jump` closing the loop body back to its top
/// `Label`. The `JumpIfNot` that tests the loop condition lives at that
/// label, past whatever `LoadVar`/`LoadConst`/comparison chain
/// re-evaluates it — that's the instruction DJNZ actually replaces.
fn tag_djnz_candidates(module: &mut Module, fi: usize) -> usize {
    let mut tagged = 0;
    let n = module.functions[fi].instructions.len();
    for i in 0..n {
        let is_dec = {
            let instr = &module.functions[fi].instructions[i];
            instr.op == Opcode::Sub && instr.comment.starts_with("dec")
        };
        if !is_dec {
            continue;
        }

        let mut j = i + 1;
        if j < n && module.functions[fi].instructions[j].op == Opcode::StoreVar {
            j += 1;
        }
        if j >= n || module.functions[fi].instructions[j].op != Opcode::Jump {
            continue;
        }
        let target = module.functions[fi].instructions[j].label.clone();

        let label_pos = match module.functions[fi].label_positions().get(target.as_str()) {
            Some(&pos) => pos,
            None => continue,
        };

        let mut k = label_pos + 1;
        while k < n
            && matches!(
                module.functions[fi].instructions[k].op,
                Opcode::LoadVar
                    | Opcode::LoadConst
                    | Opcode::Eq
                    | Opcode::Ne
                    | Opcode::Lt
                    | Opcode::Gt
                    | Opcode::Le
                    | Opcode::Ge
            )
        {
            k += 1;
        }
        if k < n && module.functions[fi].instructions[k].op == Opcode::JumpIfNot {
            module.functions[fi].instructions[k].comment = "djnz_candidate".into();
            // Renamed so `minz-regalloc`'s allocator can find the
            // counter vreg and pin it to `B`, the register `DJNZ`
            // hard-codes as its loop counter.
            module.functions[fi].instructions[i].comment = "dec_djnz_counter".into();
            tagged += 1;
        }
    }
    tagged
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Type, Vreg};

    #[test]
    fn tags_decrement_then_jumpifnot_as_djnz_candidate() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);

        // dec i
        let mut dec = Instruction::new(Opcode::Sub, u8_ty).with_dest(Vreg(1)).with_src1(Vreg(1)).with_src2(Vreg(2));
        dec.comment = "dec".into();
        function.instructions.push(dec); // 0
        function.instructions.push(Instruction::new(Opcode::StoreVar, u8_ty).with_src1(Vreg(1)).with_symbol("i".into())); // 1
        function.instructions.push(Instruction::new(Opcode::Jump, u8_ty).with_label("loop".into())); // 2

        // loop: i != 0 -> back to body
        function.instructions.push(Instruction::new(Opcode::Label, u8_ty).with_label("loop".into())); // 3
        function.instructions.push(Instruction::new(Opcode::LoadVar, u8_ty).with_dest(Vreg(3)).with_symbol("i".into())); // 4
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(4)).with_imm(0)); // 5
        function.instructions.push(
            Instruction::new(Opcode::Ne, u8_ty).with_dest(Vreg(5)).with_src1(Vreg(3)).with_src2(Vreg(4)),
        ); // 6
        function.instructions.push(
            Instruction::new(Opcode::JumpIfNot, u8_ty).with_src1(Vreg(5)).with_label("end".into()),
        ); // 7
        module.functions.push(function);

        let mut diags = Diagnostics::new();
        FlagOptimization.run(&mut module, &mut diags);

        assert_eq!(module.functions[0].instructions[7].comment, "djnz_candidate");
        assert_eq!(module.functions[0].instructions[0].comment, "dec_djnz_counter");
    }
}
