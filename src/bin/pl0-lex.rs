use std::path::PathBuf;

use clap::Parser;

use pl0::cli;
use pl0::lexer::Lexer;

/// Dump the token stream of a PL/0 source file.
#[derive(Parser)]
#[command(name = "pl0-lex", version)]
struct Cli {
    /// Path to the PL/0 source file
    source: PathBuf,
}

fn main() {
    let args: Cli = cli::parse_args();
    let source = cli::read_source(&args.source);

    let (tokens, diagnostics) = Lexer::new(&source).tokenize();
    if !diagnostics.is_empty() {
        cli::exit_with_diagnostics(&diagnostics, &args.source, &source);
    }

    for token in &tokens {
        println!("{:4}..{:<4} {:?}", token.span.start, token.span.end, token.node);
    }
}
