use std::io;
use std::path::PathBuf;

use clap::Parser;

use pl0::cli;
use pl0::vm::Vm;

/// Execute a PL/0 source file on the IR virtual machine.
#[derive(Parser)]
#[command(name = "pl0-run", version)]
struct Cli {
    /// Path to the PL/0 source file
    source: PathBuf,
    /// Echo each instruction to stderr before executing it
    #[arg(long)]
    trace: bool,
}

fn main() {
    let args: Cli = cli::parse_args();
    let source = cli::read_source(&args.source);

    let ir = match pl0::compile(&source) {
        Ok(ir) => ir,
        Err(diagnostics) => cli::exit_with_diagnostics(&diagnostics, &args.source, &source),
    };

    let mut vm = Vm::new(&ir, io::stdin().lock(), io::stdout().lock()).with_trace(args.trace);
    if let Err(err) = vm.run() {
        cli::exit_with_runtime_error(&err);
    }
}
