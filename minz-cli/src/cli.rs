//! Argument parsing (spec.md §6.4), upgraded from the teacher's
//! `vasm/main.rs` clap 2.x builder API to the derive API the way
//! modern `clap`-based CLIs do, per SPEC_FULL.md's configuration note.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use minz_backends::Target as BackendTarget;

#[derive(Parser, Debug)]
#[command(name = "minzc", version, about = "MinZ ahead-of-time compiler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity; repeat for more detail (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a MinZ program to assembly.
    Compile {
        /// Input source. `demo:<name>` selects a bundled fixture
        /// (identity-add, fibonacci, constfold, deadstore, djnz,
        /// bitstruct); anything else is read as a file path.
        input: String,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short = 'O', long = "opt-level", value_enum, default_value_t = OptLevel::O1)]
        opt_level: OptLevel,

        /// Write the post-optimization IR alongside the assembly, as
        /// `<output>.mir`.
        #[arg(short = 'd', long)]
        dump_ir: bool,

        #[arg(long, value_enum, default_value_t = TargetArg::Z80)]
        target: TargetArg,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OptLevel {
    O0,
    O1,
    O2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    Z80,
    #[value(name = "6502")]
    Mos6502,
    #[value(name = "8080")]
    Intel8080,
    Gb,
    M68k,
    C,
    Wasm,
    Llvm,
}

impl TargetArg {
    /// `None` for the Z80 target, which has its own crate with the SMC
    /// convention instead of being a `minz-backends` stub.
    pub fn as_backend_target(self) -> Option<BackendTarget> {
        match self {
            TargetArg::Z80 => None,
            TargetArg::Mos6502 => Some(BackendTarget::Mos6502),
            TargetArg::Intel8080 => Some(BackendTarget::Intel8080),
            TargetArg::Gb => Some(BackendTarget::GameBoy),
            TargetArg::M68k => Some(BackendTarget::M68k),
            TargetArg::C => Some(BackendTarget::C),
            TargetArg::Wasm => Some(BackendTarget::Wasm),
            TargetArg::Llvm => Some(BackendTarget::LlvmIr),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TargetArg::Z80 => "z80",
            _ => self.as_backend_target().expect("non-z80 target maps to a backend").name(),
        }
    }
}
