//! Failure semantics for alternative backends (spec.md §4.5): the same
//! fail-fast-on-first-structural-failure policy as `minz-z80`
//! (spec.md §4.4.7), reused here since every backend shares one
//! `Module` input contract.

use minz_ir::Opcode;
use minz_support::SourceLoc;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{loc}: backend({target}): opcode {op:?} has no mapping for this target")]
    UnsupportedOpcode { target: &'static str, op: Opcode, loc: SourceLoc },
}

impl BackendError {
    pub fn loc(&self) -> SourceLoc {
        match self {
            BackendError::UnsupportedOpcode { loc, .. } => *loc,
        }
    }
}
