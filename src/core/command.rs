// ! Command descriptions captured from plugins
// !
// ! Module defines the host-side command configuration types that a session
// ! records for later execution by the enclosing build graph, and the
// ! aggregate result type handed back to callers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::diagnostics::Diagnostic;

/// A command's invocation parameters, shared by build and prebuild commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfiguration {
    /// Name shown in build logs while the command runs
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Absolute path of the executable to run
    pub executable: PathBuf,
    /// Arguments to the executable
    pub arguments: Vec<String>,
    /// Environment variables for the command
    pub environment: HashMap<String, String>,
    /// Working directory (optional)
    #[serde(rename = "workingDirectory", skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

/// A command recorded for later execution by the build graph
///
/// `input_files` always starts with every declared tool path for the plugin,
/// in sorted order, so the build graph re-runs the command when any tool
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildCommand {
    /// Invocation parameters
    pub configuration: CommandConfiguration,
    /// Files the command reads
    #[serde(rename = "inputFiles")]
    pub input_files: Vec<PathBuf>,
    /// Files the command produces
    #[serde(rename = "outputFiles")]
    pub output_files: Vec<PathBuf>,
}

/// A command executed before each build
///
/// Its outputs are discovered by scanning `output_files_directory` after the
/// command has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrebuildCommand {
    /// Invocation parameters
    pub configuration: CommandConfiguration,
    /// Directory the build graph scans for produced files
    #[serde(rename = "outputFilesDirectory")]
    pub output_files_directory: PathBuf,
}

/// The result of running one prebuild command, as reported by the build graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrebuildCommandResult {
    /// Files found by scanning the command's output directory
    pub output_files: Vec<PathBuf>,
}

/// Everything captured from one end-to-end plugin invocation
#[derive(Debug, Clone)]
pub struct PluginInvocationResult {
    /// Whether the plugin exited cleanly and reported no errors
    pub succeeded: bool,
    /// Wall-clock duration of the invocation
    pub duration: Duration,
    /// Diagnostics in arrival order
    pub diagnostics: Vec<Diagnostic>,
    /// Free-form plugin output decoded as UTF-8 (lossy)
    pub text_output: String,
    /// Build commands in arrival order
    pub build_commands: Vec<BuildCommand>,
    /// Prebuild commands in arrival order
    pub prebuild_commands: Vec<PrebuildCommand>,
}

/// Classification of a plugin-generated output path
///
/// The host's file-rules resolver decides which bucket a generated file
/// belongs to; unknown files are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedFileKind {
    /// Compiled as a source file
    Source,
    /// Processed as a resource
    Resource,
    /// Not part of the build
    Ignored,
}
