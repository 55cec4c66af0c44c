//! Core abstractions shared across the plugin host
//!
//! This module holds the error taxonomy, the diagnostic and command types
//! captured from running plugins, and logging setup.

pub mod command;
pub mod diagnostics;
pub mod error;
pub mod logging;

pub use command::{
    BuildCommand, CommandConfiguration, GeneratedFileKind, PluginInvocationResult,
    PrebuildCommand, PrebuildCommandResult,
};
pub use diagnostics::{Diagnostic, Severity};
pub use error::{HostError, HostResult};
