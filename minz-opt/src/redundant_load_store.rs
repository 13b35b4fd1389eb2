//! Redundant load/store elimination (spec.md §4.2 pass 6): a shallow
//! abstract-state walk tracking which vreg last held which named
//! location's value. Reloading a location already resident in the same
//! vreg is removed; a store immediately overwritten by another store to
//! the same location with no intervening read is removed. State is
//! flushed wholesale across `Call` and any write through an unknown
//! address (`StoreIndex`/`StorePtr`), since those may alias anything.

use std::collections::HashMap;

use minz_ir::{Diagnostics, Module, Opcode, Vreg};

use crate::pass::{Pass, PassReport};

pub struct RedundantLoadStoreElimination;

impl Pass for RedundantLoadStoreElimination {
    fn name(&self) -> &'static str {
        "redundant-load-store-elimination"
    }

    fn run(&self, module: &mut Module, _diags: &mut Diagnostics) -> PassReport {
        let mut total = 0;
        for fi in 0..module.functions.len() {
            loop {
                let delta = eliminate_one_pass(module, fi);
                total += delta;
                if delta == 0 {
                    break;
                }
            }
        }
        PassReport::of(total)
    }
}

/// A named location: a local/global variable, or a struct field keyed
/// by its base vreg and byte offset.
#[derive(Clone, PartialEq, Eq, Hash)]
enum Location {
    Var(String),
    Field(Vreg, i64),
}

fn eliminate_one_pass(module: &mut Module, fi: usize) -> usize {
    // Location -> vreg currently known to hold its value.
    let mut resident: HashMap<Location, Vreg> = HashMap::new();
    // Location -> index of the last store to it with no read since.
    let mut pending_store: HashMap<Location, usize> = HashMap::new();
    let mut to_remove = Vec::new();

    let instrs = &module.functions[fi].instructions;
    for (i, instr) in instrs.iter().enumerate() {
        match instr.op {
            Opcode::Label | Opcode::JumpIf | Opcode::JumpIfNot | Opcode::Jump => {
                resident.clear();
                pending_store.clear();
            }
            Opcode::Call => {
                resident.clear();
                pending_store.clear();
            }
            Opcode::LoadVar => {
                let loc = Location::Var(instr.symbol.clone());
                if resident.get(&loc) == Some(&instr.dest) {
                    to_remove.push(i);
                } else {
                    resident.insert(loc.clone(), instr.dest);
                    pending_store.remove(&loc);
                }
            }
            Opcode::StoreVar => {
                let loc = Location::Var(instr.symbol.clone());
                if let Some(&prev) = pending_store.get(&loc) {
                    to_remove.push(prev);
                }
                resident.insert(loc.clone(), instr.src1);
                pending_store.insert(loc, i);
            }
            Opcode::LoadField => {
                let loc = Location::Field(instr.src1, instr.imm);
                if resident.get(&loc) == Some(&instr.dest) {
                    to_remove.push(i);
                } else {
                    resident.insert(loc.clone(), instr.dest);
                    pending_store.remove(&loc);
                }
            }
            Opcode::StoreField => {
                let loc = Location::Field(instr.src1, instr.imm);
                if let Some(&prev) = pending_store.get(&loc) {
                    to_remove.push(prev);
                }
                resident.insert(loc.clone(), instr.src2);
                pending_store.insert(loc, i);
            }
            // Indexed/pointer stores may alias any variable or field;
            // conservatively drop everything we know.
            Opcode::LoadIndex | Opcode::LoadPtr | Opcode::StoreIndex | Opcode::StorePtr => {
                resident.clear();
                pending_store.clear();
            }
            _ => {
                // Any other instruction reading a vreg that happens to
                // be a pending store's source cancels that pending
                // removal candidate: it's no longer dead, it fed a use.
                for v in instr.reads() {
                    pending_store.retain(|_, &mut idx| module.functions[fi].instructions[idx].src1 != v);
                }
            }
        }
    }

    if to_remove.is_empty() {
        return 0;
    }
    sweep_dead_producers(module, fi, &mut to_remove);
    to_remove.sort_unstable();
    to_remove.dedup();
    let removed = to_remove.len();
    let instrs = &mut module.functions[fi].instructions;
    for &i in to_remove.iter().rev() {
        instrs.remove(i);
    }
    removed
}

/// Removing a redundant store can orphan the instruction that computed
/// its value — DCE never catches this, since from its perspective every
/// `Store*` reads its source unconditionally and keeps it alive. Once a
/// store is gone, anything that fed only that store (and nothing still
/// standing) is dead too; fixed-point, since dropping one producer can
/// orphan the producer that fed *it*.
fn sweep_dead_producers(module: &Module, fi: usize, to_remove: &mut Vec<usize>) {
    let instrs = &module.functions[fi].instructions;
    let mut removed: std::collections::HashSet<usize> = to_remove.iter().copied().collect();

    loop {
        let mut newly_dead = Vec::new();
        for (i, instr) in instrs.iter().enumerate() {
            if removed.contains(&i) || instr.op.has_observable_side_effect() {
                continue;
            }
            let Some(dest) = instr.writes() else { continue };
            let still_read = instrs
                .iter()
                .enumerate()
                .any(|(j, other)| !removed.contains(&j) && other.reads().any(|v| v == dest));
            if !still_read {
                newly_dead.push(i);
            }
        }
        if newly_dead.is_empty() {
            break;
        }
        removed.extend(newly_dead);
    }

    *to_remove = removed.into_iter().collect();
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Type};

    #[test]
    fn reloading_the_same_variable_into_the_same_vreg_is_removed() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadVar, u8_ty).with_dest(Vreg(1)).with_symbol("x"));
        function.instructions.push(Instruction::new(Opcode::LoadVar, u8_ty).with_dest(Vreg(1)).with_symbol("x"));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(1)));
        module.functions.push(function);

        let mut diags = Diagnostics::new();
        RedundantLoadStoreElimination.run(&mut module, &mut diags);

        assert_eq!(module.functions[0].instructions.len(), 2);
        assert_eq!(module.functions[0].instructions[0].op, Opcode::LoadVar);
        assert_eq!(module.functions[0].instructions[1].op, Opcode::Return);
    }

    #[test]
    fn store_overwritten_with_no_intervening_read_is_removed() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(1));
        function.instructions.push(Instruction::new(Opcode::StoreVar, u8_ty).with_src1(Vreg(1)).with_symbol("x"));
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(2)).with_imm(2));
        function.instructions.push(Instruction::new(Opcode::StoreVar, u8_ty).with_src1(Vreg(2)).with_symbol("x"));
        module.functions.push(function);

        let mut diags = Diagnostics::new();
        RedundantLoadStoreElimination.run(&mut module, &mut diags);

        let stores: Vec<_> = module.functions[0]
            .instructions
            .iter()
            .filter(|i| i.op == Opcode::StoreVar)
            .collect();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].src1, Vreg(2));

        // The `LoadConst 1` that only ever fed the now-removed store is
        // orphaned by its removal and swept away too.
        assert_eq!(module.functions[0].instructions.len(), 2);
        assert!(!module.functions[0].instructions.iter().any(|i| i.op == Opcode::LoadConst && i.imm == 1));
    }
}
