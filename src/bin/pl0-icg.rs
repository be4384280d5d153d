use std::path::PathBuf;

use clap::Parser;

use pl0::cli;

/// Lower a PL/0 source file and print its numbered IR listing.
#[derive(Parser)]
#[command(name = "pl0-icg", version)]
struct Cli {
    /// Path to the PL/0 source file
    source: PathBuf,
}

fn main() {
    let args: Cli = cli::parse_args();
    let source = cli::read_source(&args.source);

    match pl0::compile(&source) {
        Ok(ir) => print!("{}", pl0::ir::dump(&ir)),
        Err(diagnostics) => cli::exit_with_diagnostics(&diagnostics, &args.source, &source),
    }
}
