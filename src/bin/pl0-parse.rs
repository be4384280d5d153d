use std::path::PathBuf;

use clap::Parser;

use pl0::cli;

/// Parse a PL/0 source file and print its AST.
#[derive(Parser)]
#[command(name = "pl0-parse", version)]
struct Cli {
    /// Path to the PL/0 source file
    source: PathBuf,
}

fn main() {
    let args: Cli = cli::parse_args();
    let source = cli::read_source(&args.source);

    match pl0::parse_source(&source) {
        Ok(program) => println!("{:#?}", program),
        Err(diagnostics) => cli::exit_with_diagnostics(&diagnostics, &args.source, &source),
    }
}
