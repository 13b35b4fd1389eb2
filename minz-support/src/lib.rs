//! Small pieces shared by every other `minz-*` crate: source locations,
//! the enum-name round-trip used by derive macros in [`minz-macros`], and
//! the declared-width numeric rules that both the semantic analyzer and
//! the optimizer's constant folder rely on (spec.md §4.2 "Numeric
//! semantics").

use std::fmt;

pub mod width;

/// A `file:line:col` position, attached to every diagnostic (spec.md §7).
///
/// Mirrors the teacher's `vasm::source_map::SourceMapItem`, but tracks a
/// single point rather than a line span, since diagnostics point at one
/// token while the teacher's source map associates a whole instruction
/// with the source lines it was assembled from. `file` stays `&'static
/// str` rather than an owned `String` so `SourceLoc` keeps the `Copy`
/// bound every AST/IR node relies on when carrying one by value —
/// source file names are known at parse time and never built at
/// runtime, so a borrowed static fits without an intern table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct SourceLoc {
    pub file: &'static str,
    pub line: u32,
    pub col: u32,
}

impl SourceLoc {
    pub const UNKNOWN: SourceLoc = SourceLoc { file: "", line: 0, col: 0 };

    pub fn new(file: &'static str, line: u32, col: u32) -> Self {
        SourceLoc { file, line, col }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = if self.file.is_empty() { "<unknown>" } else { self.file };
        write!(f, "{}:{}:{}", file, self.line, self.col)
    }
}

/// One assembled instruction's provenance: the contiguous source lines it
/// came from. Kept distinct from [`SourceLoc`] because a single lowered
/// IR instruction can span a range (e.g. a struct literal lowers to
/// several `StoreField`s, all attributed to one source statement).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceSpan {
    pub start_line: u32,
    pub line_count: u32,
}

/// Error produced when a fixed, closed enum (an opcode mnemonic, a
/// register name, an attribute key) fails to parse from text.
///
/// Used by the `#[derive(EnumFromStr)]` macro in `minz-macros`, directly
/// generalized from the teacher's `util::ParseEnumError`.
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
#[error("failed to parse \"{value}\" as {enum_name}")]
pub struct ParseEnumError {
    pub value: String,
    pub enum_name: &'static str,
}

/// Implemented by `#[derive(EnumFromStr)]` for every fieldless enum that
/// needs to round-trip through text: IR opcodes in the `.mir` dump,
/// physical Z80 register names, attribute keys.
pub trait EnumFromStr: Sized {
    fn from_str(s: &str) -> Result<Self, ParseEnumError>;
}

/// Implemented by `#[derive(MnemonicName)]` for the reverse direction:
/// stable textual names for a fieldless enum, independent of `Debug`
/// formatting (so renaming a variant's `Debug` output never silently
/// changes an on-disk `.mir` dump or assembly mnemonic).
pub trait MnemonicName {
    fn mnemonic(&self) -> &'static str;
}
