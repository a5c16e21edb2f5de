use thiserror::Error;

/// Result type for tryflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the try-construct engine.
///
/// Ordinary semantic problems (unreachable catch, bad ordering, ...) are *not*
/// errors: they are recorded as diagnostics and analysis continues on a
/// best-effort model. `Error` is reserved for the fatal abort channel and for
/// hard code generation limits.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Code generation error: {message}")]
    CodeGen { message: String },

    #[error("Internal compiler error: {message}")]
    Internal { message: String },

    /// Fatal, non-recoverable condition elsewhere in the compilation unit.
    /// Unwinds through the engine; per-unit state is discarded wholesale.
    #[error("Compilation aborted: {message}")]
    Abort { message: String },
}

impl Error {
    /// Create a code generation error
    pub fn codegen_error(message: impl Into<String>) -> Self {
        Self::CodeGen { message: message.into() }
    }

    /// Create an internal compiler error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Create an abort signal
    pub fn abort(message: impl Into<String>) -> Self {
        Self::Abort { message: message.into() }
    }
}
