//! Backend failure semantics (spec.md §4.4.7): structural failures are
//! fatal and each cites the offending op and source location. Grounded
//! on `vasm::error::{AssembleError, Error}`, generalized from the
//! teacher's single `Misc` catch-all to the named causes §4.4.7 lists.

use minz_ir::Opcode;
use minz_support::SourceLoc;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{loc}: backend: opcode {op:?} has no Z80 lowering")]
    UnsupportedOpcode { op: Opcode, loc: SourceLoc },

    #[error("{loc}: backend: register allocation exhausted for function `{function}` with no spill slot available")]
    RegisterExhausted { function: String, loc: SourceLoc },

    #[error("{loc}: backend: SMC disallowed for `{function}` but required ({reason})")]
    SmcDisallowedButRequired { function: String, reason: String, loc: SourceLoc },

    #[error("{loc}: backend: duplicate label `{label}` in function `{function}`")]
    DuplicateLabel { function: String, label: String, loc: SourceLoc },
}

impl BackendError {
    pub fn loc(&self) -> SourceLoc {
        match self {
            BackendError::UnsupportedOpcode { loc, .. }
            | BackendError::RegisterExhausted { loc, .. }
            | BackendError::SmcDisallowedButRequired { loc, .. }
            | BackendError::DuplicateLabel { loc, .. } => *loc,
        }
    }
}
