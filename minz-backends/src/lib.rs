//! Alternative-backend interface (spec.md §4.5): seven targets sharing
//! one `Module` input and one `emit(module) -> assembly_text` contract.
//! None implement the Z80 backend's SMC convention.

mod dialect;
mod emit;
mod error;

pub use dialect::Target;
pub use error::BackendError;

use minz_ir::Module;

/// Implemented once per target by [`StubBackend`]; kept as a trait
/// (rather than a bare function) so a future target-specific backend
/// can replace the generic stub without touching call sites.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn emit(&self, module: &Module) -> Result<String, BackendError>;
}

pub struct StubBackend(pub Target);

impl Backend for StubBackend {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn emit(&self, module: &Module) -> Result<String, BackendError> {
        emit::emit(self.0, module)
    }
}

pub fn all_targets() -> [StubBackend; 7] {
    [
        StubBackend(Target::Mos6502),
        StubBackend(Target::Intel8080),
        StubBackend(Target::GameBoy),
        StubBackend(Target::M68k),
        StubBackend(Target::C),
        StubBackend(Target::Wasm),
        StubBackend(Target::LlvmIr),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Opcode, Type};

    #[test]
    fn every_target_emits_the_same_function_skeleton() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("f", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadConst, u8_ty).with_imm(1));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty));
        module.functions.push(function);

        for backend in all_targets() {
            let asm = backend.emit(&module).unwrap();
            assert!(asm.contains("f:"), "target {} missing function label", backend.name());
        }
    }
}
