// ! Diagnostics emitted by running plugins
// !
// ! Module defines the host-side diagnostic type that plugin-emitted
// ! diagnostics are converted into before they reach delegates and results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity of a plugin diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Hard failure reported by the plugin
    Error,
    /// Something the user should look at but that does not fail the run
    Warning,
    /// Informational note
    Remark,
}

/// A diagnostic captured from a plugin
///
/// The optional file/line location is best effort: a plugin may send a
/// location the host cannot validate, in which case the message is kept and
/// the location is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Diagnostic message
    pub message: String,
    /// File the diagnostic refers to (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Line number within the file (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    /// Create an error diagnostic with no location
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Create a warning diagnostic with no location
    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Create a remark diagnostic with no location
    pub fn remark<S: Into<String>>(message: S) -> Self {
        Self {
            severity: Severity::Remark,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Attach a file/line location
    pub fn at(mut self, file: PathBuf, line: Option<u32>) -> Self {
        self.file = Some(file);
        self.line = line;
        self
    }
}
