//! The Z80 physical register file (spec.md §4.3): eight 8-bit registers
//! and five 16-bit pairs, two of which overlap the 8-bit halves.
//! Grounded on the teacher's `Register`/`RegisterId` enum
//! (`src/register.rs`) — same derive stack, generalized from the
//! teacher's single flat 32-register file to the Z80's split 8/16-bit
//! classes with explicit overlap.

use minz_macros::{EnumFromStr, MnemonicName};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, MnemonicName, EnumFromStr)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, MnemonicName, EnumFromStr)]
pub enum Reg16 {
    BC,
    DE,
    HL,
    IX,
    IY,
}

impl Reg16 {
    /// `H`/`L` overlap `HL`; `IX`/`IY` have no addressable 8-bit halves
    /// on the Z80, so allocating either blocks the whole pair at once.
    pub fn halves(self) -> Option<(Reg8, Reg8)> {
        match self {
            Reg16::BC => Some((Reg8::B, Reg8::C)),
            Reg16::DE => Some((Reg8::D, Reg8::E)),
            Reg16::HL => Some((Reg8::H, Reg8::L)),
            Reg16::IX | Reg16::IY => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PhysReg {
    R8(Reg8),
    R16(Reg16),
}

impl PhysReg {
    pub fn is_caller_saved(self) -> bool {
        matches!(self, PhysReg::R8(Reg8::A) | PhysReg::R16(Reg16::HL))
    }
}

/// Cost ordering for the assignment rule (spec.md §4.3): caller-saved
/// registers are preferred for short live ranges (cheap to clobber
/// across the range's few uses), callee-held pairs for longer ones
/// (worth the save/restore to keep a value resident).
pub fn cost_for_range_length(reg: PhysReg, length: u32) -> u32 {
    const SHORT_RANGE: u32 = 4;
    match (reg.is_caller_saved(), length <= SHORT_RANGE) {
        (true, true) => 0,
        (false, false) => 0,
        (true, false) => 1,
        (false, true) => 1,
    }
}

pub const R8_ORDER: [Reg8; 7] = [Reg8::A, Reg8::B, Reg8::C, Reg8::D, Reg8::E, Reg8::H, Reg8::L];
pub const R16_ORDER: [Reg16; 5] = [Reg16::HL, Reg16::BC, Reg16::DE, Reg16::IX, Reg16::IY];
