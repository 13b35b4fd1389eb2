//! Linear-scan assignment (spec.md §4.3): walk live ranges in start
//! order, assign the lowest-cost free register of the right class,
//! spilling the active range with the latest end point when none is
//! free. Purely annotative — never rewrites `function.instructions`.

use std::collections::HashMap;

use minz_ir::{Function, Type, Vreg};
use tracing::debug;

use crate::live_range::{compute_live_ranges, LiveRange};
use crate::register::{cost_for_range_length, PhysReg, Reg16, Reg8, R16_ORDER, R8_ORDER};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    Register(PhysReg),
    /// Byte offset from `FP`, growing downward (spec.md §4.4.4's
    /// `IX`-relative frame is the addressing mode this slot assumes).
    Spill(u32),
}

#[derive(Debug, Default)]
pub struct FunctionAllocation {
    pub assignments: HashMap<Vreg, Assignment>,
    pub spill_slots: u32,
}

impl FunctionAllocation {
    pub fn get(&self, vreg: Vreg) -> Option<Assignment> {
        if vreg == Vreg::FP {
            return Some(Assignment::Register(PhysReg::R16(Reg16::IX)));
        }
        if vreg == Vreg::RET {
            // Caller picks the concrete half (`HL` vs `A`) from the
            // return type's width at emit time; see `minz-z80`.
            return Some(Assignment::Register(PhysReg::R16(Reg16::HL)));
        }
        self.assignments.get(&vreg).copied()
    }
}

/// One allocator instance per compilation; reused across functions so
/// spill-slot bookkeeping (bytes, not vregs) resets cleanly per function.
pub struct Allocator;

impl Allocator {
    pub fn allocate(function: &Function, vreg_width: impl Fn(Vreg) -> bool) -> FunctionAllocation {
        let ranges = compute_live_ranges(function);
        let pinned = djnz_pinned_vreg(function);
        let mut alloc = FunctionAllocation::default();
        let mut active: Vec<LiveRange> = Vec::new();
        let mut free8: Vec<_> = R8_ORDER.to_vec();
        let mut free16: Vec<_> = R16_ORDER.to_vec();
        let mut next_spill_offset = 0u32;

        for range in ranges {
            active.retain(|a| {
                if a.end < range.start {
                    release(&mut free8, &mut free16, alloc.assignments[&a.vreg]);
                    false
                } else {
                    true
                }
            });

            let is_16 = vreg_width(range.vreg);
            // The loop counter `flag_opt`'s DJNZ-candidate pass tags
            // (spec.md §4.4.6) must land in `B`, the only register
            // `DJNZ` decrements — overriding the usual short-range
            // preference for `A`.
            let chosen = if !is_16 && pinned == Some(range.vreg) && free8.contains(&Reg8::B) {
                Some(PhysReg::R8(Reg8::B))
            } else if is_16 {
                best_of(&free16, range.len(), |r| PhysReg::R16(*r))
            } else {
                best_of(&free8, range.len(), |r| PhysReg::R8(*r))
            };

            match chosen {
                Some(reg) => {
                    remove_reg(&mut free8, &mut free16, reg);
                    alloc.assignments.insert(range.vreg, Assignment::Register(reg));
                    active.push(range);
                }
                None => {
                    // Spill the active range with the latest end point
                    // (spec.md §4.3), freeing its register for this one.
                    if let Some((idx, _)) = active
                        .iter()
                        .enumerate()
                        .filter(|(_, a)| vreg_width(a.vreg) == is_16)
                        .max_by_key(|(_, a)| a.end)
                    {
                        if active[idx].end > range.end {
                            let victim = active.remove(idx);
                            let victim_reg = alloc.assignments[&victim.vreg];
                            alloc.assignments.insert(victim.vreg, Assignment::Spill(next_spill_offset));
                            next_spill_offset += if is_16 { 2 } else { 1 };
                            remove_reg(&mut free8, &mut free16, match victim_reg {
                                Assignment::Register(r) => r,
                                Assignment::Spill(_) => unreachable!(),
                            });
                            // The register just vacated by the victim is
                            // now free for `range`.
                            let reg = match victim_reg {
                                Assignment::Register(r) => r,
                                Assignment::Spill(_) => unreachable!(),
                            };
                            alloc.assignments.insert(range.vreg, Assignment::Register(reg));
                            active.push(range);
                            continue;
                        }
                    }
                    alloc.assignments.insert(range.vreg, Assignment::Spill(next_spill_offset));
                    next_spill_offset += if is_16 { 2 } else { 1 };
                }
            }
        }

        alloc.spill_slots = next_spill_offset;
        debug!(function = %function.name, spill_bytes = next_spill_offset, "register allocation complete");
        alloc
    }
}

fn best_of<R: Copy>(free: &[R], length: u32, wrap: impl Fn(&R) -> PhysReg) -> Option<PhysReg> {
    free.iter()
        .map(|r| wrap(r))
        .min_by_key(|r| cost_for_range_length(*r, length))
}

fn remove_reg(free8: &mut Vec<crate::register::Reg8>, free16: &mut Vec<Reg16>, reg: PhysReg) {
    match reg {
        PhysReg::R8(r) => free8.retain(|x| *x != r),
        PhysReg::R16(r) => {
            free16.retain(|x| *x != r);
            if let Some((h, l)) = r.halves() {
                free8.retain(|x| *x != h && *x != l);
            }
        }
    }
}

fn release(free8: &mut Vec<crate::register::Reg8>, free16: &mut Vec<Reg16>, assignment: Assignment) {
    if let Assignment::Register(reg) = assignment {
        match reg {
            PhysReg::R8(r) => {
                if !free8.contains(&r) {
                    free8.push(r);
                }
            }
            PhysReg::R16(r) => {
                if !free16.contains(&r) {
                    free16.push(r);
                }
                if let Some((h, l)) = r.halves() {
                    for half in [h, l] {
                        if !free8.contains(&half) {
                            free8.push(half);
                        }
                    }
                }
            }
        }
    }
}

/// A vreg is 16-bit if its declared type (recovered from the first
/// instruction that writes it) is wider than a byte; defaults to 8-bit
/// for vregs whose only appearance is as a read of an unwritten
/// parameter (spec.md §3: parameter vregs carry their declared width).
pub fn is_16_bit(module: &minz_ir::Module, function: &Function, vreg: Vreg) -> bool {
    for instr in &function.instructions {
        if instr.writes() == Some(vreg) {
            return width_is_16(module.type_of(instr.ty));
        }
    }
    false
}

fn width_is_16(ty: &Type) -> bool {
    matches!(ty.leaf_size_bytes(), Some(n) if n > 1)
}

/// The vreg `flag_opt::FlagOptimization` renamed to `dec_djnz_counter`,
/// if this function has one — the loop counter a `DJNZ` emission needs
/// pinned to `B` (spec.md §4.4.6).
fn djnz_pinned_vreg(function: &Function) -> Option<Vreg> {
    function.instructions.iter().find(|i| i.comment == "dec_djnz_counter").and_then(|i| i.writes())
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Instruction, Module, Opcode, Type};

    #[test]
    fn disjoint_ranges_share_the_same_register() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(1));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(1)));
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(2)).with_imm(2));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(2)));

        let alloc = Allocator::allocate(&function, |v| is_16_bit(&module, &function, v));
        assert_eq!(alloc.get(Vreg(1)), alloc.get(Vreg(2)));
    }

    #[test]
    fn overlapping_ranges_get_distinct_registers_or_a_spill() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(1));
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(2)).with_imm(2));
        function.instructions.push(
            Instruction::new(Opcode::Add, u8_ty).with_dest(Vreg(3)).with_src1(Vreg(1)).with_src2(Vreg(2)),
        );
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(3)));

        let alloc = Allocator::allocate(&function, |v| is_16_bit(&module, &function, v));
        let a1 = alloc.get(Vreg(1)).unwrap();
        let a2 = alloc.get(Vreg(2)).unwrap();
        assert_ne!(a1, a2, "overlapping ranges must not share a register or slot");
    }

    #[test]
    fn djnz_counter_is_pinned_to_b_over_the_usual_short_range_preference() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        let mut dec = Instruction::new(Opcode::Sub, u8_ty).with_dest(Vreg(1)).with_src1(Vreg(1)).with_src2(Vreg(2));
        dec.comment = "dec_djnz_counter".into();
        function.instructions.push(dec);
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(1)));

        let alloc = Allocator::allocate(&function, |v| is_16_bit(&module, &function, v));
        assert_eq!(alloc.get(Vreg(1)), Some(Assignment::Register(PhysReg::R8(Reg8::B))));
    }
}
