//! `.data` section builder (spec.md §6.3): `DB`/`DW` directives for
//! global variables, length-prefixed string literals. Direct
//! generalization of `vasm::data::process_data` — accumulate into one
//! buffer with a label per element — replacing its binary little-endian
//! encoding with textual directive emission.

use minz_ir::Module;

pub fn emit_data_section(module: &Module) -> Vec<String> {
    let mut lines = Vec::new();
    if module.globals.is_empty() && module.strings.is_empty() {
        return lines;
    }

    lines.push(".data".into());
    for global in &module.globals {
        lines.push(format!("{}:", global.name));
        lines.push(directive_for(module, global));
    }
    for (i, s) in module.strings.iter().enumerate() {
        lines.push(format!("__str_{i}:"));
        lines.push(format!("    DW {}", s.len()));
        let bytes: Vec<String> = s.bytes().map(|b| format!("0x{b:02X}")).collect();
        if bytes.is_empty() {
            lines.push("    ; (empty)".into());
        } else {
            lines.push(format!("    DB {}", bytes.join(", ")));
        }
    }
    lines
}

fn directive_for(module: &Module, global: &minz_ir::Global) -> String {
    let wide = matches!(module.type_of(global.ty).width(), Some(minz_support::width::Width::W16));
    if global.init.is_empty() {
        return format!("    {} 0", if wide { "DW" } else { "DB" });
    }
    let values: Vec<String> = if wide {
        global
            .init
            .chunks(2)
            .map(|c| {
                let lo = *c.first().unwrap_or(&0) as u16;
                let hi = *c.get(1).unwrap_or(&0) as u16;
                format!("0x{:04X}", lo | (hi << 8))
            })
            .collect()
    } else {
        global.init.iter().map(|b| format!("0x{b:02X}")).collect()
    };
    format!("    {} {}", if wide { "DW" } else { "DB" }, values.join(", "))
}

#[cfg(test)]
mod test {
    use super::*;
    use minz_ir::{Global, Type};

    #[test]
    fn byte_global_emits_db_directive() {
        let mut module = Module::new();
        let u8_ty = module.intern_type(Type::U8);
        module.globals.push(Global { name: "counter".into(), ty: u8_ty, init: vec![7] });

        let lines = emit_data_section(&module);
        assert!(lines.contains(&"counter:".to_string()));
        assert!(lines.iter().any(|l| l.contains("DB") && l.contains("0x07")));
    }

    #[test]
    fn string_literal_is_length_prefixed() {
        let mut module = Module::new();
        module.intern_string("hi");
        let lines = emit_data_section(&module);
        assert!(lines.iter().any(|l| l.contains("DW 2")));
    }
}
