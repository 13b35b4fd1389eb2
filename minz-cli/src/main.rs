//! The `minzc` binary (spec.md §6.4). Grounded on `vasm/main.rs`: read
//! an input, drive the library, write the output(s), print one line per
//! diagnostic, and set the process exit code from the diagnostic kinds
//! rather than from catching a panic.

mod cli;
mod frontend;
mod pipeline;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use cli::{Cli, Command};
use pipeline::CompileOptions;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Command::Compile { input, output, opt_level, dump_ir, target } = cli.command;
    let options = CompileOptions { input, output, opt_level, dump_ir, target };

    match pipeline::compile(&options) {
        Ok(outcome) => {
            for diag in &outcome.diagnostics {
                eprintln!("{diag}");
            }
            println!("wrote {}", outcome.assembly_path.display());
            if let Some(mir_path) = &outcome.mir_path {
                println!("wrote {}", mir_path.display());
            }
        }
        Err(diagnostics) => {
            for diag in &diagnostics {
                eprintln!("{diag}");
            }
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}
