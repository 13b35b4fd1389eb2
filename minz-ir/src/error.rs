//! The error taxonomy of spec.md §7. Each variant carries a source
//! location and a human message; `thiserror` generates the
//! `file:line:col: <kind>: <message>` formatting from `#[error(...)]`
//! templates, replacing the teacher's hand-rolled `Display` impls in
//! `vasm::error` with one derive per variant.

use minz_support::SourceLoc;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Diagnostic {
    #[error("{loc}: error: parse error: {message}")]
    Parse { loc: SourceLoc, message: String },

    #[error("{loc}: error: {message}")]
    Name { loc: SourceLoc, message: String },

    #[error("{loc}: error: {message}")]
    Type { loc: SourceLoc, message: String },

    #[error("{loc}: error: {message}")]
    Layout { loc: SourceLoc, message: String },

    #[error("{loc}: error: {message}")]
    ControlFlow { loc: SourceLoc, message: String },

    #[error("{loc}: error: {message}")]
    Backend { loc: SourceLoc, message: String },

    #[error("{loc}: internal error: {message}")]
    Internal { loc: SourceLoc, message: String },

    #[error("{loc}: warning: {message}")]
    Warning { loc: SourceLoc, message: String },
}

impl Diagnostic {
    pub fn loc(&self) -> SourceLoc {
        match self {
            Diagnostic::Parse { loc, .. }
            | Diagnostic::Name { loc, .. }
            | Diagnostic::Type { loc, .. }
            | Diagnostic::Layout { loc, .. }
            | Diagnostic::ControlFlow { loc, .. }
            | Diagnostic::Backend { loc, .. }
            | Diagnostic::Internal { loc, .. }
            | Diagnostic::Warning { loc, .. } => *loc,
        }
    }

    /// Warnings never change the CLI exit code (spec.md §6.4); everything
    /// else is a fatal error once analysis is done (spec.md §7 propagation
    /// policy).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Diagnostic::Warning { .. })
    }
}

/// Accumulates diagnostics without unwinding, matching spec.md §7's
/// "analyzer and optimizer accumulate errors into a vector and attempt
/// to continue" policy. Grounded on the teacher's flat `Error` sum
/// (`vasm::error::Error`), generalized from "one error per parse" to a
/// running bag collected across an entire analysis pass.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    pub fn has_fatal(&self) -> bool {
        self.items.iter().any(Diagnostic::is_fatal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }
}
