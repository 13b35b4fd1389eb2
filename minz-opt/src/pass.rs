//! The `Pass` trait (spec.md §4.2): "each pass exposes `name()` and
//! `run(module) -> (changed: bool, errors)`." Internal iteration to a
//! fixed point is the pass's own business; the driver invokes each
//! pass exactly once per compilation unit (spec.md §5: "the optimizer
//! is the only place with internal iteration").

use minz_ir::{Diagnostics, Module};

pub trait Pass {
    fn name(&self) -> &'static str;

    /// Runs this pass to its own internal fixed point (if any) and
    /// reports whether it changed the module at all, plus the number
    /// of individual transformations applied (spec.md §4.2: "passes
    /// report the number of transformations for telemetry").
    fn run(&self, module: &mut Module, diags: &mut Diagnostics) -> PassReport;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassReport {
    pub changed: bool,
    pub transformations: usize,
}

impl PassReport {
    pub fn unchanged() -> Self {
        PassReport::default()
    }

    pub fn of(transformations: usize) -> Self {
        PassReport { changed: transformations > 0, transformations }
    }
}
