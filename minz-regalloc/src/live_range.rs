//! Live-range computation (spec.md §4.3: "compute live ranges by a
//! single backward walk marking first/last use of each vreg").

use std::collections::HashMap;

use minz_ir::{Function, Vreg};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveRange {
    pub vreg: Vreg,
    pub start: usize,
    pub end: usize,
}

impl LiveRange {
    pub fn len(&self) -> u32 {
        (self.end - self.start) as u32 + 1
    }

    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// One backward walk recording, per vreg, the lowest index it is
/// written or read at (`start`) and the highest (`end`). Special vregs
/// (`FP`/`SP`/`RET`/`ZERO`) are excluded: they are pre-assigned, never
/// allocated (spec.md §4.3).
pub fn compute_live_ranges(function: &Function) -> Vec<LiveRange> {
    let mut bounds: HashMap<Vreg, (usize, usize)> = HashMap::new();

    for (i, instr) in function.instructions.iter().enumerate() {
        let mut touch = |v: Vreg| {
            if v.is_unused() || v.is_special() {
                return;
            }
            bounds
                .entry(v)
                .and_modify(|(_, end)| *end = i)
                .or_insert((i, i));
        };
        if let Some(d) = instr.writes() {
            touch(d);
        }
        for r in instr.reads() {
            touch(r);
        }
    }

    let mut ranges: Vec<LiveRange> = bounds
        .into_iter()
        .map(|(vreg, (start, end))| LiveRange { vreg, start, end })
        .collect();
    ranges.sort_by_key(|r| r.start);
    ranges
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Instruction, Module, Opcode, Type};

    #[test]
    fn tracks_first_and_last_use() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(1));
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(2)).with_imm(2));
        function.instructions.push(
            Instruction::new(Opcode::Add, u8_ty).with_dest(Vreg(3)).with_src1(Vreg(1)).with_src2(Vreg(2)),
        );
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(3)));

        let ranges = compute_live_ranges(&function);
        let v1 = ranges.iter().find(|r| r.vreg == Vreg(1)).unwrap();
        assert_eq!((v1.start, v1.end), (0, 2));
        let v3 = ranges.iter().find(|r| r.vreg == Vreg(3)).unwrap();
        assert_eq!((v3.start, v3.end), (2, 3));
    }
}
