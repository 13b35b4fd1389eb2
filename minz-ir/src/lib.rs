//! The MinZ intermediate representation (spec.md §3): the closed type
//! sum, the closed opcode set, virtual registers, and the `Module`/
//! `Function`/`Instruction` triple the analyzer produces, the optimizer
//! rewrites in place, and the backends consume read-only (spec.md §3
//! "Lifecycle").

pub mod error;
pub mod interp;
pub mod module;
pub mod opcode;
pub mod printer;
pub mod types;
pub mod vreg;

pub use error::{Diagnostic, Diagnostics};
pub use module::{Attributes, Function, Global, Instruction, Module, Param};
pub use opcode::Opcode;
pub use types::{BitStructWidth, FixedPointFormat, Type, TypeId};
pub use vreg::{Vreg, VregAllocator};
