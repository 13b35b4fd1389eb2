//! The Z80 backend (spec.md §4.4): SMC-first calling convention,
//! IR-to-assembly lowering, the fallback `IX`-frame convention, and the
//! post-emission peephole. [`emit_module`] is the crate's one public
//! entry point; everything else is plumbing for it.

mod data;
mod emit;
mod error;
mod peephole;
mod smc;

pub use emit::EmittedFunction;
pub use error::BackendError;

use minz_ir::Module;
use tracing::info;

/// Emits Z80 assembly text for every function in `module`, followed by
/// the `.data` section (spec.md §6.3). Fails fast on the first
/// `BackendError` (spec.md §4.4.7: "backends fail fast on the first
/// BackendError").
pub fn emit_module(module: &Module) -> Result<String, BackendError> {
    info!(functions = module.functions.len(), "emitting Z80 assembly");
    let mut lines = Vec::new();

    for function in &module.functions {
        let emitted = emit::emit_function(module, function)?;
        lines.extend(emitted.lines);
    }

    let mut peepholed = peephole::run(lines);
    peepholed.extend(data::emit_data_section(module));

    Ok(peepholed.join("\n"))
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Function, Instruction, Opcode, Type};

    #[test]
    fn emits_assembly_for_a_minimal_function() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        let mut function = Function::new("identity", u8_ty);
        function.instructions.push(Instruction::new(Opcode::LoadParam, u8_ty).with_dest(minz_ir::Vreg(1)).with_symbol("x"));
        function.instructions.push(Instruction::new(Opcode::Return, u8_ty).with_src1(minz_ir::Vreg(1)));
        module.functions.push(function);

        let asm = emit_module(&module).unwrap();
        assert!(asm.contains("identity:"));
        assert!(asm.contains("RET"));
    }
}
