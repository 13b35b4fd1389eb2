//! The IR's closed opcode set (spec.md §3). Same derive stack as the
//! teacher's `OpCode`/`RegisterId` (`src/enums.rs`): `FromPrimitive`/
//! `ToPrimitive` for compact storage and table dispatch in the
//! optimizer/regalloc, `MnemonicName`/`EnumFromStr` for the `.mir`
//! text round-trip.

use minz_macros::{EnumFromStr, MnemonicName};
use num_derive::{FromPrimitive, ToPrimitive};

#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Debug, FromPrimitive, ToPrimitive, MnemonicName, EnumFromStr,
)]
pub enum Opcode {
    Nop,
    Label,
    Jump,
    JumpIf,
    JumpIfNot,
    Call,
    Return,

    LoadConst,
    LoadVar,
    StoreVar,
    LoadParam,
    LoadField,
    StoreField,
    LoadIndex,
    StoreIndex,
    LoadPtr,
    StorePtr,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    Alloc,
    Free,

    // SMC-specific pseudo-ops (spec.md §3, §4.4.3).
    SMCParam,
    SMCSave,
    SMCRestore,
    SMCUpdate,
}

impl Opcode {
    /// Instructions with no source-visible side effect beyond writing
    /// `dest`: every opcode NOT in this list is live unconditionally in
    /// DCE (spec.md §4.2 pass 2 — `Store*`, `Call`, `Return`, `Jump*`
    /// and referenced `Label`s always survive).
    pub fn has_observable_side_effect(self) -> bool {
        matches!(
            self,
            Opcode::StoreVar
                | Opcode::StoreField
                | Opcode::StoreIndex
                | Opcode::StorePtr
                | Opcode::Call
                | Opcode::Return
                | Opcode::Jump
                | Opcode::JumpIf
                | Opcode::JumpIfNot
                | Opcode::Label
                | Opcode::Alloc
                | Opcode::Free
                | Opcode::SMCParam
                | Opcode::SMCSave
                | Opcode::SMCRestore
                | Opcode::SMCUpdate
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod | Opcode::Neg
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Not | Opcode::Shl | Opcode::Shr
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Gt | Opcode::Le | Opcode::Ge
        )
    }

    /// Foldable by the constant-folding pass when every source operand is
    /// itself a folded constant (spec.md §4.2 pass 1).
    pub fn is_foldable(self) -> bool {
        self.is_arithmetic() || self.is_bitwise() || self.is_comparison()
    }

    pub fn is_unconditional_jump(self) -> bool {
        matches!(self, Opcode::Jump)
    }

    pub fn is_conditional_jump(self) -> bool {
        matches!(self, Opcode::JumpIf | Opcode::JumpIfNot)
    }
}
