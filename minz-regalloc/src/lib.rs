//! Linear-scan register allocation over the Z80 physical register file
//! (spec.md §4.3). Annotative only: [`Allocator::allocate`] returns a
//! [`FunctionAllocation`] mapping vregs to physical registers or spill
//! slots without touching the function's instructions.

mod alloc;
mod live_range;
pub mod register;

pub use alloc::{is_16_bit, Allocator, Assignment, FunctionAllocation};
pub use live_range::{compute_live_ranges, LiveRange};
pub use register::{PhysReg, Reg16, Reg8};
