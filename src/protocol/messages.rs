// ! Wire Protocol Messages
// !
// ! Module defines the message types exchanged between the host and a
// ! running plugin. The on-wire schema is stable: variant and field names
// ! are an ABI boundary shared with the plugin-side shim, and renames here
// ! require coordinated plugin-side changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::protocol::input::{PackageId, PathId, ProjectId, ProjectTargetId, TargetId, WireInput};

/// Interface version the host requires in command configurations
pub const COMMAND_CONFIGURATION_VERSION: u32 = 2;

// ============================================================================
// Host → Plugin
// ============================================================================

/// Messages sent from the host to the plugin
///
/// The first four variants are the session-opening action messages; the
/// remaining four terminate outstanding plugin-initiated requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostToPlugin {
    /// Invoke the plugin's build-tool entry point for a package target
    CreateBuildToolCommands {
        /// Flattened context snapshot
        context: WireInput,
        /// Package the target belongs to
        #[serde(rename = "rootPackageId")]
        root_package_id: PackageId,
        /// Target to create commands for
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Pre-existing generated source paths
        #[serde(rename = "generatedSourceIds")]
        generated_source_ids: Vec<PathId>,
        /// Pre-existing generated resource paths
        #[serde(rename = "generatedResourceIds")]
        generated_resource_ids: Vec<PathId>,
    },
    /// Invoke the plugin's build-tool entry point for a project target
    CreateProjectBuildToolCommands {
        /// Flattened context snapshot
        context: WireInput,
        /// Project the target belongs to
        #[serde(rename = "rootProjectId")]
        root_project_id: ProjectId,
        /// Target to create commands for
        #[serde(rename = "targetId")]
        target_id: ProjectTargetId,
        /// Pre-existing generated source paths
        #[serde(rename = "generatedSourceIds")]
        generated_source_ids: Vec<PathId>,
        /// Pre-existing generated resource paths
        #[serde(rename = "generatedResourceIds")]
        generated_resource_ids: Vec<PathId>,
    },
    /// Invoke the plugin's command entry point for a package
    PerformCommand {
        /// Flattened context snapshot
        context: WireInput,
        /// Package the command runs against
        #[serde(rename = "rootPackageId")]
        root_package_id: PackageId,
        /// Free-form arguments passed through to the plugin
        arguments: Vec<String>,
    },
    /// Invoke the plugin's command entry point for a project
    PerformProjectCommand {
        /// Flattened context snapshot
        context: WireInput,
        /// Project the command runs against
        #[serde(rename = "rootProjectId")]
        root_project_id: ProjectId,
        /// Free-form arguments passed through to the plugin
        arguments: Vec<String>,
    },
    /// Completes an outstanding build request
    BuildOperationResponse {
        /// Outcome of the nested build
        result: BuildResult,
    },
    /// Completes an outstanding test request
    TestOperationResponse {
        /// Outcome of the nested test run
        result: TestResult,
    },
    /// Completes an outstanding symbol-graph request
    SymbolGraphResponse {
        /// Location of the generated symbol graph
        result: SymbolGraphResult,
    },
    /// Completes any outstanding request with an error
    ErrorResponse {
        /// Display string of the host-side error
        error: String,
    },
}

// ============================================================================
// Plugin → Host
// ============================================================================

/// Messages sent from the plugin to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginToHost {
    /// Report a diagnostic
    EmitDiagnostic {
        /// One of `error`, `warning`, `remark`
        severity: WireDiagnosticSeverity,
        /// Diagnostic message
        message: String,
        /// File the diagnostic refers to (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// Line within the file (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
    /// Report coarse progress for display
    EmitProgress {
        /// Progress message
        message: String,
    },
    /// Define a command to run during the build
    DefineBuildCommand {
        /// Invocation parameters, including the interface version
        configuration: WireCommandConfiguration,
        /// Files the command reads
        #[serde(rename = "inputFiles")]
        input_files: Vec<PathBuf>,
        /// Files the command produces
        #[serde(rename = "outputFiles")]
        output_files: Vec<PathBuf>,
    },
    /// Define a command to run before each build
    DefinePrebuildCommand {
        /// Invocation parameters, including the interface version
        configuration: WireCommandConfiguration,
        /// Directory scanned for outputs after the command runs
        #[serde(rename = "outputFilesDirectory")]
        output_files_directory: PathBuf,
    },
    /// Ask the host to run a nested build
    BuildOperationRequest {
        /// What to build
        subset: BuildSubset,
        /// How to build it
        parameters: BuildParameters,
    },
    /// Ask the host to run a nested test
    TestOperationRequest {
        /// Which tests to run
        subset: TestSubset,
        /// How to run them
        parameters: TestParameters,
    },
    /// Ask the host to generate a symbol graph
    SymbolGraphRequest {
        /// Target to generate the graph for
        #[serde(rename = "targetName")]
        target_name: String,
        /// Generation options
        options: SymbolGraphOptions,
    },
}

/// Diagnostic severity as spelled on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireDiagnosticSeverity {
    Error,
    Warning,
    Remark,
}

/// Command configuration as sent by the plugin
///
/// Identical to the host-side configuration plus the interface `version`
/// field the host validates before accepting the command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommandConfiguration {
    /// Interface version; must equal [`COMMAND_CONFIGURATION_VERSION`]
    pub version: u32,
    /// Name shown in build logs
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Absolute path of the executable
    pub executable: PathBuf,
    /// Arguments to the executable
    pub arguments: Vec<String>,
    /// Environment variables
    pub environment: HashMap<String, String>,
    /// Working directory (optional)
    #[serde(rename = "workingDirectory", skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

// ============================================================================
// Request Payloads
// ============================================================================

/// What part of the package a nested build covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildSubset {
    /// Build everything
    All,
    /// Build a single product
    Product {
        /// Product name
        name: String,
    },
    /// Build a single target
    Target {
        /// Target name
        name: String,
    },
}

/// Configuration requested for a nested build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildRequestConfiguration {
    /// Debug build
    Debug,
    /// Release build
    Release,
    /// Whatever the enclosing build uses
    Inherit,
}

/// Log verbosity requested for a nested build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildLogVerbosity {
    Concise,
    Verbose,
    Debug,
}

/// Parameters for a nested build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildParameters {
    /// Requested configuration
    pub configuration: BuildRequestConfiguration,
    /// Requested log verbosity
    #[serde(rename = "logVerbosity")]
    pub log_verbosity: BuildLogVerbosity,
    /// Whether build logs should be echoed to the plugin's output
    #[serde(rename = "echoLogs")]
    pub echo_logs: bool,
    /// Additional flags passed to the build
    #[serde(rename = "otherFlags", default)]
    pub other_flags: Vec<String>,
}

/// Which tests a nested test run covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestSubset {
    /// Run every test
    All,
    /// Run only tests matching the given specifiers
    Filtered {
        /// Test specifiers of the form `TargetName.TestCase` or similar
        filters: Vec<String>,
    },
}

/// Parameters for a nested test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestParameters {
    /// Whether code coverage data should be collected
    #[serde(rename = "enableCodeCoverage")]
    pub enable_code_coverage: bool,
}

/// Options for symbol-graph generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolGraphOptions {
    /// Lowest access level included in the graph
    #[serde(rename = "minimumAccessLevel")]
    pub minimum_access_level: String,
    /// Whether synthesized members are included
    #[serde(rename = "includeSynthesized")]
    pub include_synthesized: bool,
    /// Whether SPI symbols are included
    #[serde(rename = "includeSPI")]
    pub include_spi: bool,
    /// Whether extension block symbols are emitted
    #[serde(rename = "emitExtensionBlocks")]
    pub emit_extension_blocks: bool,
}

// ============================================================================
// Response Payloads
// ============================================================================

/// Kind of a built artifact reported back to the plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuiltArtifactKind {
    Executable,
    DynamicLibrary,
    StaticLibrary,
}

/// One artifact produced by a nested build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltArtifact {
    /// Absolute path of the artifact
    pub path: PathBuf,
    /// Artifact kind
    pub kind: BuiltArtifactKind,
}

/// Outcome of a nested build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Whether the build succeeded
    pub succeeded: bool,
    /// Captured build log text
    #[serde(rename = "logText")]
    pub log_text: String,
    /// Artifacts the build produced
    #[serde(rename = "builtArtifacts", default)]
    pub built_artifacts: Vec<BuiltArtifact>,
}

/// Result of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Test case name
    pub name: String,
    /// Whether the case passed
    pub passed: bool,
}

/// Results for one test target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTargetResult {
    /// Test target name
    pub name: String,
    /// Per-case outcomes
    #[serde(rename = "testCases", default)]
    pub test_cases: Vec<TestCaseResult>,
}

/// Outcome of a nested test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Whether all tests passed
    pub succeeded: bool,
    /// Coverage data file, when coverage was requested
    #[serde(
        rename = "codeCoverageDataFile",
        skip_serializing_if = "Option::is_none"
    )]
    pub code_coverage_data_file: Option<PathBuf>,
    /// Per-target results
    #[serde(rename = "testTargets", default)]
    pub test_targets: Vec<TestTargetResult>,
}

/// Outcome of symbol-graph generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolGraphResult {
    /// Directory holding the generated graph, in file-URL form
    #[serde(rename = "directoryPath")]
    pub directory_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_host_message_variant_names() {
        let message = HostToPlugin::ErrorResponse {
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("errorResponse").is_some());

        let message = HostToPlugin::SymbolGraphResponse {
            result: SymbolGraphResult {
                directory_path: "file:///sg".to_string(),
            },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["symbolGraphResponse"]["result"]["directoryPath"], "file:///sg");
    }

    #[test]
    fn test_plugin_message_variant_names() {
        let message = PluginToHost::EmitDiagnostic {
            severity: WireDiagnosticSeverity::Warning,
            message: "careful".to_string(),
            file: None,
            line: None,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["emitDiagnostic"]["severity"], "warning");
        assert!(json["emitDiagnostic"].get("file").is_none());
    }

    #[test]
    fn test_define_build_command_round_trip() {
        let message = PluginToHost::DefineBuildCommand {
            configuration: WireCommandConfiguration {
                version: COMMAND_CONFIGURATION_VERSION,
                display_name: "gen".to_string(),
                executable: PathBuf::from("/u/gen"),
                arguments: vec!["--in".to_string(), "/x".to_string()],
                environment: HashMap::new(),
                working_directory: None,
            },
            input_files: vec![PathBuf::from("/x")],
            output_files: vec![PathBuf::from("/y")],
        };
        let bytes = serde_json::to_vec(&message).unwrap();
        let back: PluginToHost = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_build_subset_shape() {
        let subset = BuildSubset::Product {
            name: "tool".to_string(),
        };
        let json = serde_json::to_value(&subset).unwrap();
        assert_eq!(json["product"]["name"], "tool");
        assert_eq!(
            serde_json::to_string(&BuildSubset::All).unwrap(),
            "\"all\""
        );
    }
}
