//! Shared plumbing for the per-stage executables.

use std::path::Path;
use std::process;

use crate::diagnostic::{render_diagnostics, Diagnostic};
use crate::error::RuntimeError;

/// Parse command-line arguments, printing usage and exiting with code 1
/// on absent or extra arguments. `--help`/`--version` exit with 0.
pub fn parse_args<T: clap::Parser>() -> T {
    use clap::error::ErrorKind;

    T::try_parse().unwrap_or_else(|err| {
        let code = match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => 1,
        };
        let _ = err.print();
        process::exit(code);
    })
}

/// Read a source file, or exit with a one-line error.
pub fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {}: {}", path.display(), err);
            process::exit(1);
        }
    }
}

/// Render translation diagnostics to stderr and exit nonzero.
pub fn exit_with_diagnostics(diagnostics: &[Diagnostic], path: &Path, source: &str) -> ! {
    render_diagnostics(diagnostics, &path.display().to_string(), source);
    process::exit(1);
}

/// Print an execution error on one line and exit nonzero.
pub fn exit_with_runtime_error(err: &RuntimeError) -> ! {
    eprintln!("error: {}", err);
    process::exit(1);
}
