//! The seven alternative targets (spec.md §4.5). Each is an interface
//! stub over a shared stack-based calling convention: arguments and
//! locals live on an explicit operand stack rather than the Z80
//! backend's SMC parameter slots, since "none are required to
//! implement SMC; they emit a standard stack-based convention."

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Target {
    Mos6502,
    Intel8080,
    GameBoy,
    M68k,
    C,
    Wasm,
    LlvmIr,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Target::Mos6502 => "6502",
            Target::Intel8080 => "8080",
            Target::GameBoy => "gb",
            Target::M68k => "m68k",
            Target::C => "c",
            Target::Wasm => "wasm",
            Target::LlvmIr => "llvm",
        }
    }

    /// True for the two text-based, non-assembly targets whose syntax
    /// diverges enough (braces and semicolons, S-expression-ish module
    /// form) that the generic mnemonic-line emitter doesn't fit; those
    /// get their own minimal header/footer wrapping instead of raw
    /// assembly mnemonics.
    pub fn is_source_level(self) -> bool {
        matches!(self, Target::C | Target::Wasm | Target::LlvmIr)
    }

    pub fn comment_prefix(self) -> &'static str {
        match self {
            Target::C | Target::Wasm | Target::LlvmIr => ";;",
            _ => ";",
        }
    }
}
