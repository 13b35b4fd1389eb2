//! Dead-code elimination (spec.md §4.2 pass 2): mark-and-sweep over
//! instructions. An instruction is live if it has an observable side
//! effect or its `dest` is read by a live instruction; parameters are
//! live by definition. Removes unreachable code after `Return`/`Jump`,
//! labels with no remaining references, and jumps to the immediately
//! following label.

use std::collections::HashSet;

use minz_ir::{Diagnostics, Module, Opcode};

use crate::pass::{Pass, PassReport};

pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&self, module: &mut Module, _diags: &mut Diagnostics) -> PassReport {
        let mut total = 0;
        for fi in 0..module.functions.len() {
            loop {
                let delta = sweep_unreachable(module, fi) + mark_and_sweep(module, fi) + remove_dead_labels(module, fi)
                    + remove_noop_jumps(module, fi);
                total += delta;
                if delta == 0 {
                    break;
                }
            }
        }
        PassReport::of(total)
    }
}

/// Removes instructions following a `Return`/unconditional `Jump`
/// before the next `Label` (spec.md §4.2: unreachable code).
fn sweep_unreachable(module: &mut Module, fi: usize) -> usize {
    let instrs = &mut module.functions[fi].instructions;
    let mut out = Vec::with_capacity(instrs.len());
    let mut removed = 0;
    let mut dead = false;
    for instr in instrs.drain(..) {
        if instr.op == Opcode::Label {
            dead = false;
        }
        if dead {
            removed += 1;
            continue;
        }
        if matches!(instr.op, Opcode::Return | Opcode::Jump) {
            dead = true;
        }
        out.push(instr);
    }
    *instrs = out;
    removed
}

fn mark_and_sweep(module: &mut Module, fi: usize) -> usize {
    let function = &module.functions[fi];
    let n = function.instructions.len();
    let mut live = vec![false; n];

    // Seed: everything with an observable side effect, plus every
    // `Label` that a live jump references (computed by fixed point
    // below since liveness of a jump can depend on liveness of its
    // target label's surrounding block only through the side-effect
    // rule, which already marks jumps live unconditionally).
    for (i, instr) in function.instructions.iter().enumerate() {
        if instr.op.has_observable_side_effect() {
            live[i] = true;
        }
    }

    // Label liveness: a Label is live if some live Jump*/Call targets it.
    let referenced_labels: HashSet<&str> = function
        .instructions
        .iter()
        .enumerate()
        .filter(|(i, instr)| {
            live[*i] && matches!(instr.op, Opcode::Jump | Opcode::JumpIf | Opcode::JumpIfNot)
        })
        .map(|(_, instr)| instr.label.as_str())
        .collect();
    for (i, instr) in function.instructions.iter().enumerate() {
        if instr.op == Opcode::Label && referenced_labels.contains(instr.label.as_str()) {
            live[i] = true;
        }
    }

    // Backward data-flow closure: a dest written by instruction i is
    // live if some live instruction reads it.
    let mut changed_any = true;
    while changed_any {
        changed_any = false;
        let mut read_vregs = HashSet::new();
        for (i, instr) in function.instructions.iter().enumerate() {
            if live[i] {
                for v in instr.reads() {
                    read_vregs.insert(v);
                }
            }
        }
        for (i, instr) in function.instructions.iter().enumerate() {
            if !live[i] {
                if let Some(dest) = instr.writes() {
                    if read_vregs.contains(&dest) {
                        live[i] = true;
                        changed_any = true;
                    }
                }
            }
        }
    }

    let function = &mut module.functions[fi];
    let before = function.instructions.len();
    let mut kept = Vec::with_capacity(before);
    for (i, instr) in function.instructions.drain(..).enumerate() {
        if live[i] {
            kept.push(instr);
        }
    }
    function.instructions = kept;
    before - function.instructions.len()
}

/// Removes `Label`s with zero remaining jump references.
fn remove_dead_labels(module: &mut Module, fi: usize) -> usize {
    let function = &module.functions[fi];
    let referenced: HashSet<&str> = function
        .instructions
        .iter()
        .filter(|i| matches!(i.op, Opcode::Jump | Opcode::JumpIf | Opcode::JumpIfNot))
        .map(|i| i.label.as_str())
        .collect();

    let function = &mut module.functions[fi];
    let before = function.instructions.len();
    function
        .instructions
        .retain(|instr| instr.op != Opcode::Label || referenced.contains(instr.label.as_str()));
    before - function.instructions.len()
}

/// Removes `Jump L` immediately followed by `Label L` (spec.md §4.2).
fn remove_noop_jumps(module: &mut Module, fi: usize) -> usize {
    let instrs = &mut module.functions[fi].instructions;
    let mut removed = 0;
    let mut i = 0;
    while i + 1 < instrs.len() {
        if instrs[i].op == Opcode::Jump
            && instrs[i + 1].op == Opcode::Label
            && instrs[i].label == instrs[i + 1].label
        {
            instrs.remove(i);
            removed += 1;
            continue;
        }
        i += 1;
    }
    removed
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Type, Vreg};

    #[test]
    fn keeps_store_overwritten_before_any_read() {
        // Every `StoreVar` has an observable side effect (spec.md §4.2
        // pass 2), so DCE alone cannot tell that the first store to `x`
        // is overwritten before anything reads it — that's
        // `RedundantLoadStoreElimination`'s job. Both stores, and the
        // literal each one feeds, survive this pass untouched.
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(1));
        function.instructions.push(
            Instruction::new(Opcode::StoreVar, u8_ty).with_src1(Vreg(1)).with_symbol("x".into()),
        );
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(2)).with_imm(2));
        function.instructions.push(
            Instruction::new(Opcode::StoreVar, u8_ty).with_src1(Vreg(2)).with_symbol("x".into()),
        );
        function.instructions.push(Instruction::new(Opcode::LoadVar, u8_ty).with_dest(Vreg(3)).with_symbol("x".into()));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(3)));
        module.functions.push(function);

        let mut diags = Diagnostics::new();
        DeadCodeElimination.run(&mut module, &mut diags);

        let ops: Vec<_> = module.functions[0].instructions.iter().map(|i| (i.op, i.imm)).collect();
        assert!(ops.contains(&(Opcode::LoadConst, 1)), "DCE alone must not remove the overwritten literal");
        assert!(ops.contains(&(Opcode::LoadConst, 2)));
    }

    #[test]
    fn is_idempotent() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(1));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(1)));
        module.functions.push(function);

        let mut diags = Diagnostics::new();
        DeadCodeElimination.run(&mut module, &mut diags);
        let after_first = module.functions[0].instructions.clone();
        let report = DeadCodeElimination.run(&mut module, &mut diags);

        assert_eq!(module.functions[0].instructions, after_first);
        assert!(!report.changed);
    }
}
