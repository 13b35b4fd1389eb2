//! Whether a function uses the SMC calling convention or the fallback
//! `IX`-frame convention (spec.md §4.4.4), and the SMC parameter-slot
//! layout for functions that do (spec.md §4.4.1).

use minz_ir::Function;

pub fn smc_enabled(function: &Function) -> bool {
    let attrs = &function.attributes;
    function.is_smc_default && !attrs.rom && !attrs.interrupt && !attrs.addr_taken && !attrs.abi_stack
}

/// Why SMC was disabled, for `BackendError::SmcDisallowedButRequired`
/// when a caller forces it via `@smc` over an incompatible attribute.
pub fn disabled_reason(function: &Function) -> Option<&'static str> {
    let attrs = &function.attributes;
    if attrs.rom {
        Some("function is placed in ROM")
    } else if attrs.interrupt {
        Some("function is an interrupt handler")
    } else if attrs.addr_taken {
        Some("function's address is taken for an indirect call")
    } else if attrs.abi_stack {
        Some("@abi(stack) requested explicitly")
    } else {
        None
    }
}

/// One SMC-parameter label: `<fn>_param_<name>`, pointing at the byte
/// immediately past the opcode of that parameter's `LD` instruction
/// (spec.md §4.4.1).
pub fn param_label(function_name: &str, param_name: &str) -> String {
    format!("{function_name}_param_{param_name}")
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Attributes, Type, TypeId};

    fn function_with(attrs: Attributes) -> Function {
        let mut f = Function::new("f", TypeId(0));
        f.attributes = attrs;
        f
    }

    #[test]
    fn rom_attribute_disables_smc() {
        let f = function_with(Attributes { rom: true, ..Default::default() });
        assert!(!smc_enabled(&f));
        assert_eq!(disabled_reason(&f), Some("function is placed in ROM"));
        let _ = Type::Void;
    }

    #[test]
    fn plain_function_uses_smc_by_default() {
        let f = Function::new("f", TypeId(0));
        assert!(smc_enabled(&f));
    }
}
