use thiserror::Error;

/// Execution-time failures, shared by the VM and the AST interpreter.
///
/// The front end performs no semantic checks, so name errors and kind
/// mismatches only surface here.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("'{0}' is already declared in this scope")]
    DuplicateIdentifier(String),

    #[error("'{0}' is not defined")]
    UndefinedIdentifier(String),

    #[error("'{ident}' is a {found}, expected a {expected}")]
    KindMismatch {
        ident: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("variable '{0}' is read before being assigned")]
    UninitializedRead(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("input '{0}' is not an integer")]
    InvalidInput(String),

    #[error("input channel is exhausted")]
    InputExhausted,

    /// Execution ran past the end of the instruction list. The generator
    /// always terminates a program with `halt`, so this indicates a
    /// malformed IR list, not a user error.
    #[error("execution ran past the end of the program")]
    MissingHalt,

    /// An instruction popped from an empty value stack; as with
    /// [`RuntimeError::MissingHalt`], only malformed IR can trigger it.
    #[error("value stack underflow")]
    StackUnderflow,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
