//! Drives one compilation: `analyze` → `optimize` → backend `emit`,
//! plus the `-d` `.mir` dump. Grounded on `vasm::main::vasm`'s shape
//! (read input, run the library, write output(s), map every failure
//! mode into one local error enum) but generalized from a single parse
//! step to the multi-stage pipeline spec.md §2 describes.

use std::fs;
use std::path::{Path, PathBuf};

use minz_backends::Backend as _;
use minz_ir::{Diagnostic, Diagnostics};
use tracing::info;

use crate::cli::{OptLevel, TargetArg};
use crate::frontend::{DemoFrontend, Frontend};

pub struct CompileOptions {
    pub input: String,
    pub output: Option<PathBuf>,
    pub opt_level: OptLevel,
    pub dump_ir: bool,
    pub target: TargetArg,
}

pub struct CompileOutcome {
    pub assembly_path: PathBuf,
    pub mir_path: Option<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the full pipeline. Returns the diagnostics gathered regardless
/// of success; the caller decides the process exit code from them
/// (spec.md §6.4: warnings never change it, any fatal error does).
pub fn compile(options: &CompileOptions) -> Result<CompileOutcome, Vec<Diagnostic>> {
    let mut diagnostics = Diagnostics::new();

    let ast_file = match DemoFrontend.load(&options.input) {
        Ok(file) => file,
        Err(diag) => return Err(vec![diag]),
    };

    let analysis = minz_sema::analyze(&ast_file);
    let mut module = analysis.module;
    diagnostics.extend(analysis.diagnostics);

    // spec.md §7: "once any error is present after analysis, code
    // generation is skipped" — but the optimizer still runs first, since
    // it operates purely on the IR the analyzer already produced and its
    // own diagnostics (if any) are worth surfacing in the same run.
    if options.opt_level != OptLevel::O0 {
        let report = minz_opt::optimize(&mut module, &mut diagnostics);
        info!(transformations = report.total_transformations(), "optimization complete");
    }

    if diagnostics.has_fatal() {
        return Err(diagnostics.into_vec());
    }

    let output_path = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&options.input, options.target));

    let assembly = match options.target {
        TargetArg::Z80 => minz_z80::emit_module(&module).map_err(|err| {
            diagnostics.push(Diagnostic::Backend { loc: err.loc(), message: err.to_string() });
            diagnostics.clone().into_vec()
        })?,
        other => {
            let target = other.as_backend_target().expect("non-z80 TargetArg maps to a backend target");
            minz_backends::StubBackend(target).emit(&module).map_err(|err| {
                diagnostics.push(Diagnostic::Backend { loc: err.loc(), message: err.to_string() });
                diagnostics.clone().into_vec()
            })?
        }
    };

    fs::write(&output_path, &assembly).map_err(|err| {
        vec![Diagnostic::Internal {
            loc: minz_support::SourceLoc::UNKNOWN,
            message: format!("failed to write {}: {err}", output_path.display()),
        }]
    })?;

    let mir_path = if options.dump_ir {
        let path = output_path.with_extension("mir");
        let text = minz_ir::printer::print_module(&module);
        fs::write(&path, text).map_err(|err| {
            vec![Diagnostic::Internal {
                loc: minz_support::SourceLoc::UNKNOWN,
                message: format!("failed to write {}: {err}", path.display()),
            }]
        })?;
        Some(path)
    } else {
        None
    };

    Ok(CompileOutcome { assembly_path: output_path, mir_path, diagnostics: diagnostics.into_vec() })
}

fn default_output_path(input: &str, target: TargetArg) -> PathBuf {
    let stem = input.strip_prefix("demo:").unwrap_or(input);
    let stem = Path::new(stem).file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    PathBuf::from(format!("{stem}.{}", extension_for(target)))
}

fn extension_for(target: TargetArg) -> &'static str {
    match target {
        TargetArg::Z80 | TargetArg::Mos6502 | TargetArg::Intel8080 | TargetArg::Gb | TargetArg::M68k => "asm",
        TargetArg::C => "c",
        TargetArg::Wasm => "wat",
        TargetArg::Llvm => "ll",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_add_demo_compiles_to_z80_assembly_with_smc_params() {
        let out_path = std::env::temp_dir().join("minz_cli_test_identity_add");
        let options = CompileOptions {
            input: "demo:identity-add".into(),
            output: Some(out_path),
            opt_level: OptLevel::O1,
            dump_ir: false,
            target: TargetArg::Z80,
        };
        let outcome = compile(&options).expect("compilation should succeed");
        let asm = fs::read_to_string(&outcome.assembly_path).unwrap();
        assert!(asm.contains("add_param_a:"));
        assert!(asm.contains("add_param_b:"));
        let _ = fs::remove_file(&outcome.assembly_path);
    }

    #[test]
    fn fibonacci_demo_marks_function_as_requiring_context() {
        let out_path = std::env::temp_dir().join("minz_cli_test_fib.mir");
        let options = CompileOptions {
            input: "demo:fibonacci".into(),
            output: Some(out_path),
            opt_level: OptLevel::O1,
            dump_ir: true,
            target: TargetArg::Z80,
        };
        let outcome = compile(&options).expect("compilation should succeed");
        let mir_path = outcome.mir_path.expect("dump_ir was set");
        let mir = fs::read_to_string(&mir_path).unwrap();
        assert!(mir.contains("requires_context"));
        let _ = fs::remove_file(&outcome.assembly_path);
        let _ = fs::remove_file(&mir_path);
    }

    #[test]
    fn constfold_demo_folds_the_whole_expression_to_a_single_literal() {
        let out_path = std::env::temp_dir().join("minz_cli_test_constfold.mir");
        let options = CompileOptions {
            input: "demo:constfold".into(),
            output: Some(out_path),
            opt_level: OptLevel::O1,
            dump_ir: true,
            target: TargetArg::Z80,
        };
        let outcome = compile(&options).expect("compilation should succeed");
        let mir_path = outcome.mir_path.expect("dump_ir was set");
        let mir = fs::read_to_string(&mir_path).unwrap();
        assert!(mir.contains("#70"), "10 + 20 * 3 should fold to the single literal 70:\n{mir}");
        assert!(!mir.contains("Mul"), "the multiply should be gone once folded:\n{mir}");
        assert!(!mir.contains("Add"), "the add should be gone once folded:\n{mir}");
        let _ = fs::remove_file(&outcome.assembly_path);
        let _ = fs::remove_file(&mir_path);
    }

    #[test]
    fn deadstore_demo_removes_the_overwritten_store_and_its_literal() {
        let out_path = std::env::temp_dir().join("minz_cli_test_deadstore.mir");
        let options = CompileOptions {
            input: "demo:deadstore".into(),
            output: Some(out_path),
            opt_level: OptLevel::O1,
            dump_ir: true,
            target: TargetArg::Z80,
        };
        let outcome = compile(&options).expect("compilation should succeed");
        let mir_path = outcome.mir_path.expect("dump_ir was set");
        let mir = fs::read_to_string(&mir_path).unwrap();
        assert!(!mir.contains("#1"), "the overwritten `x = 1` literal should be swept away:\n{mir}");
        assert!(mir.contains("#2"), "the surviving `x = 2` literal should remain:\n{mir}");
        let _ = fs::remove_file(&outcome.assembly_path);
        let _ = fs::remove_file(&mir_path);
    }

    #[test]
    fn djnz_demo_emits_a_djnz_loop() {
        let out_path = std::env::temp_dir().join("minz_cli_test_djnz");
        let options = CompileOptions {
            input: "demo:djnz".into(),
            output: Some(out_path),
            opt_level: OptLevel::O1,
            dump_ir: false,
            target: TargetArg::Z80,
        };
        let outcome = compile(&options).expect("compilation should succeed");
        let asm = fs::read_to_string(&outcome.assembly_path).unwrap();
        assert!(asm.contains("DJNZ"), "the counted loop should fuse to a DJNZ:\n{asm}");
        let _ = fs::remove_file(&outcome.assembly_path);
    }

    #[test]
    fn bitstruct_demo_packs_both_fields_into_the_same_byte() {
        let out_path = std::env::temp_dir().join("minz_cli_test_bitstruct.mir");
        let options = CompileOptions {
            input: "demo:bitstruct".into(),
            output: Some(out_path),
            opt_level: OptLevel::O1,
            dump_ir: true,
            target: TargetArg::Z80,
        };
        let outcome = compile(&options).expect("compilation should succeed");
        let mir_path = outcome.mir_path.expect("dump_ir was set");
        let mir = fs::read_to_string(&mir_path).unwrap();
        // `flags.a = 5` masks `5` against a 3-bit field (`5 & 0x07`) and
        // `flags.b = 17` masks `17` against a 5-bit field (`17 & 0x1f`);
        // both operands are compile-time constants, so constant folding
        // computes each mask-and against the field's real mask. The only
        // `LoadConst #0` in the whole function is `flags`'s own initial
        // value — if the fold instead treated the field mask as an
        // implicit zero it would produce two more.
        let zero_loads = mir.matches("LoadConst #0").count();
        assert_eq!(zero_loads, 1, "only flags's own init should fold to zero:\n{mir}");
        assert!(mir.contains("#5"), "flags.a's masked value should fold to 5:\n{mir}");
        assert!(mir.contains("#17"), "flags.b's masked value should fold to 17:\n{mir}");
        let _ = fs::remove_file(&outcome.assembly_path);
        let _ = fs::remove_file(&mir_path);
    }

    #[test]
    fn unknown_input_is_reported_as_a_parse_error_naming_the_frontend_seam() {
        let options = CompileOptions {
            input: "some_real_file.minz".into(),
            output: None,
            opt_level: OptLevel::O1,
            dump_ir: false,
            target: TargetArg::Z80,
        };
        let diags = compile(&options).unwrap_err();
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::Parse { .. }));
    }
}
