//! The optimizer pipeline (spec.md §4.2): six passes, each run exactly
//! once by [`driver::optimize`] in declared order. Each pass may loop
//! internally to its own fixed point; there is no cross-pass fixed
//! point (spec.md §5).

mod addr_mode;
mod constant_fold;
mod dce;
mod flag_opt;
mod pass;
mod redundant_load_store;
mod z80_select;

pub mod driver;

pub use addr_mode::AddressingModeRewriting;
pub use constant_fold::ConstantFolding;
pub use dce::DeadCodeElimination;
pub use driver::{optimize, PipelineReport};
pub use flag_opt::FlagOptimization;
pub use pass::{Pass, PassReport};
pub use redundant_load_store::RedundantLoadStoreElimination;
pub use z80_select::Z80InstructionSelection;
