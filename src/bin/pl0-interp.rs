use std::io;
use std::path::PathBuf;

use clap::Parser;

use pl0::cli;
use pl0::interp::Interp;

/// Execute a PL/0 source file by walking its AST.
#[derive(Parser)]
#[command(name = "pl0-interp", version)]
struct Cli {
    /// Path to the PL/0 source file
    source: PathBuf,
    /// Echo each statement to stderr before executing it
    #[arg(long)]
    trace: bool,
}

fn main() {
    let args: Cli = cli::parse_args();
    let source = cli::read_source(&args.source);

    let program = match pl0::parse_source(&source) {
        Ok(program) => program,
        Err(diagnostics) => cli::exit_with_diagnostics(&diagnostics, &args.source, &source),
    };

    let mut interp = Interp::new(io::stdin().lock(), io::stdout().lock()).with_trace(args.trace);
    if let Err(err) = interp.run(&program) {
        cli::exit_with_runtime_error(&err);
    }
}
