//! Error handling for PathLens
//!
//! Errors are grouped by how far they propagate:
//! - Parse errors (structurally invalid top-level input)
//! - Load errors (nothing drawable, compiler rejection, resource failure)
//! - Render errors (GPU resource failures, including context loss)
//! - Compile errors (the external compiler boundary)
//!
//! Per-line and per-query problems are never errors; the parser records them
//! as warnings and pick queries return `None`.

use thiserror::Error;

/// Top-level input could not be tokenized at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input is not valid UTF-8 text
    #[error("Input is not valid UTF-8 text (first invalid byte at offset {offset})")]
    InvalidUtf8 {
        /// Byte offset of the first invalid sequence.
        offset: usize,
    },

    /// Input contains binary data
    #[error("Input looks like binary data (NUL byte at offset {offset})")]
    BinaryData {
        /// Byte offset of the first NUL byte.
        offset: usize,
    },
}

/// Error raised by the external source compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The compiler rejected the source
    #[error("Compilation failed: {message}")]
    Rejected {
        /// Diagnostic produced by the compiler.
        message: String,
    },

    /// The compiler could not be reached
    #[error("Compiler unavailable: {reason}")]
    Unavailable {
        /// Why the compiler could not be reached.
        reason: String,
    },
}

/// GPU resource error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The graphics context was lost; GPU state cannot be recovered mid-session
    #[error("Graphics context lost, a full reload is required")]
    ContextLost,

    /// Buffer or vertex array creation failed
    #[error("Buffer error: {0}")]
    Buffer(String),

    /// Shader compilation or linking failed
    #[error("Shader error: {0}")]
    Shader(String),

    /// A handle did not refer to a live resource
    #[error("Unknown GPU resource handle {0}")]
    UnknownHandle(u64),
}

/// Failure to load a toolpath into a viewer session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Input could not be tokenized
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The program parsed but produced no drawable segments
    #[error("Nothing to display: {lines} lines produced no motion")]
    NothingToDisplay {
        /// Number of source lines examined.
        lines: usize,
    },

    /// The source compiler failed
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// GPU resources could not be created
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl LoadError {
    /// True when the host must recreate the graphics context before retrying.
    pub fn requires_reload(&self) -> bool {
        matches!(self, LoadError::Render(RenderError::ContextLost))
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// Parse error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Load error
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Render error
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Compile error
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this error means GPU state is gone for good
    pub fn is_fatal_resource(&self) -> bool {
        matches!(
            self,
            Error::Render(RenderError::ContextLost)
                | Error::Load(LoadError::Render(RenderError::ContextLost))
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoadError::NothingToDisplay { lines: 3 };
        assert_eq!(
            err.to_string(),
            "Nothing to display: 3 lines produced no motion"
        );

        let err = ParseError::BinaryData { offset: 7 };
        assert_eq!(
            err.to_string(),
            "Input looks like binary data (NUL byte at offset 7)"
        );
    }

    #[test]
    fn test_context_loss_requires_reload() {
        let err: LoadError = RenderError::ContextLost.into();
        assert!(err.requires_reload());

        let err: Error = err.into();
        assert!(err.is_fatal_resource());

        let err: Error = RenderError::Buffer("oom".to_string()).into();
        assert!(!err.is_fatal_resource());
    }
}
