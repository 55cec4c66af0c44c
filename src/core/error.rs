// ! Error types for the plugin invocation host
// !
// ! Module defines all error types surfaced by the invocation core,
// ! providing structured error handling with detailed context.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the plugin host
#[derive(Error, Debug, Clone)]
pub enum HostError {
    /// The plugin module has no owning package in the graph
    #[error("could not find package for plugin '{0}'")]
    CouldNotFindPackage(String),

    /// A filesystem precondition failed before the plugin was started
    #[error("could not create output directory '{}': {underlying}", path.display())]
    CouldNotCreateOutputDirectory {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying failure description
        underlying: String,
    },

    /// The context serializer failed (missing id, malformed path)
    #[error("could not serialize plugin input: {0}")]
    CouldNotSerializePluginInput(String),

    /// Child spawn or I/O error inside a running session
    #[error("running the plugin failed: {0}")]
    RunningPluginFailed(String),

    /// The wire codec rejected an inbound frame
    #[error("could not decode plugin output: {underlying}")]
    DecodingPluginOutputFailed {
        /// The raw frame payload that failed to decode
        payload: Vec<u8>,
        /// Underlying decode failure description
        underlying: String,
    },

    /// A command configuration declared an unsupported interface version
    #[error("plugin produced a command with interface version {actual}, expected {expected}")]
    IncompatibleVersion {
        /// Version the host supports
        expected: u32,
        /// Version the plugin declared
        actual: u32,
    },

    /// Compiling the plugin sources failed
    #[error("plugin compilation failed: {0}")]
    CompilationFailed(String),

    /// A product dependency did not resolve to a single executable module
    #[error("no such product: {0}")]
    NoSuchProduct(String),

    /// A delegate-served request kind has no implementation
    #[error("request not implemented: {0}")]
    Unimplemented(String),
}

// Manual From implementations for types that don't implement Clone
impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::CouldNotSerializePluginInput(err.to_string())
    }
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::RunningPluginFailed(err.to_string())
    }
}

/// Result type alias for plugin host operations
pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::CouldNotSerializePluginInput(message.into())
    }

    /// Create a new runtime error for a failed plugin run
    pub fn running<S: Into<String>>(message: S) -> Self {
        Self::RunningPluginFailed(message.into())
    }

    /// Create a new decode error from a rejected frame
    pub fn decoding(payload: &[u8], err: serde_json::Error) -> Self {
        Self::DecodingPluginOutputFailed {
            payload: payload.to_vec(),
            underlying: err.to_string(),
        }
    }

    /// Create a new compilation error
    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::CompilationFailed(message.into())
    }

    /// Check if this error occurred before the child process was started
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            HostError::CouldNotFindPackage(_)
                | HostError::CouldNotCreateOutputDirectory { .. }
                | HostError::CouldNotSerializePluginInput(_)
                | HostError::CompilationFailed(_)
                | HostError::NoSuchProduct(_)
        )
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            HostError::CouldNotFindPackage(_) => "graph",
            HostError::CouldNotCreateOutputDirectory { .. } => "filesystem",
            HostError::CouldNotSerializePluginInput(_) => "serialization",
            HostError::RunningPluginFailed(_) => "runtime",
            HostError::DecodingPluginOutputFailed { .. } => "protocol",
            HostError::IncompatibleVersion { .. } => "protocol",
            HostError::CompilationFailed(_) => "compilation",
            HostError::NoSuchProduct(_) => "graph",
            HostError::Unimplemented(_) => "delegate",
        }
    }
}
