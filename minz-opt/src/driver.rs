//! Ordered pipeline driver (spec.md §4.2/§5): runs each of the six
//! passes exactly once, in declared order. There is no cross-pass fixed
//! point — only a pass's own internal loop (where it has one) runs to
//! convergence before the driver moves to the next pass.

use minz_ir::{Diagnostics, Module};
use tracing::{debug, info};

use crate::addr_mode::AddressingModeRewriting;
use crate::constant_fold::ConstantFolding;
use crate::dce::DeadCodeElimination;
use crate::flag_opt::FlagOptimization;
use crate::pass::{Pass, PassReport};
use crate::redundant_load_store::RedundantLoadStoreElimination;
use crate::z80_select::Z80InstructionSelection;

pub struct PipelineReport {
    pub per_pass: Vec<(&'static str, PassReport)>,
}

impl PipelineReport {
    pub fn total_transformations(&self) -> usize {
        self.per_pass.iter().map(|(_, r)| r.transformations).sum()
    }
}

/// Runs the six passes in spec order: constant folding, dead-code
/// elimination, Z80 instruction selection, flag optimization,
/// addressing-mode rewriting, redundant load/store elimination.
pub fn optimize(module: &mut Module, diags: &mut Diagnostics) -> PipelineReport {
    let passes: Vec<Box<dyn Pass>> = vec![
        Box::new(ConstantFolding),
        Box::new(DeadCodeElimination),
        Box::new(Z80InstructionSelection),
        Box::new(FlagOptimization),
        Box::new(AddressingModeRewriting),
        Box::new(RedundantLoadStoreElimination),
    ];

    info!(pass_count = passes.len(), "running optimizer pipeline");
    let mut per_pass = Vec::with_capacity(passes.len());
    for pass in passes {
        let report = pass.run(module, diags);
        debug!(pass = pass.name(), changed = report.changed, transformations = report.transformations, "pass complete");
        per_pass.push((pass.name(), report));
    }
    PipelineReport { per_pass }
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Opcode, Type, Vreg};

    #[test]
    fn runs_all_six_passes_in_order() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_dest(Vreg(1)).with_imm(2));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(Vreg(1)));
        module.functions.push(function);

        let mut diags = Diagnostics::new();
        let report = optimize(&mut module, &mut diags);

        let names: Vec<&str> = report.per_pass.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "constant-folding",
                "dead-code-elimination",
                "z80-instruction-selection",
                "flag-optimization",
                "addressing-mode-rewriting",
                "redundant-load-store-elimination",
            ]
        );
    }
}
