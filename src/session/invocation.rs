// ! Invocation session
// !
// ! Owns one plugin run end to end: it receives every inbound message from
// ! the script runner in wire order, validates and records what the plugin
// ! produced, fans requests out to the host delegate, and packages the final
// ! outcome when the child exits. All state mutation happens from the
// ! runner's pump, one message at a time, so arrival order is result order.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::core::command::{BuildCommand, CommandConfiguration, PrebuildCommand};
use crate::core::diagnostics::{Diagnostic, Severity};
use crate::core::error::{HostError, HostResult};
use crate::host::runner::{MessageResponder, ScriptRunnerDelegate};
use crate::protocol::codec;
use crate::protocol::messages::{
    COMMAND_CONFIGURATION_VERSION, HostToPlugin, PluginToHost, SymbolGraphResult,
    WireCommandConfiguration, WireDiagnosticSeverity,
};
use crate::session::delegate::PluginInvocationDelegate;
use crate::tools::{AccessibleToolMap, ToolOrigin};

/// Everything a finished session hands back to the caller
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// `exit_code == 0` and the session was not cut short
    pub exited_cleanly: bool,
    /// Raw output bytes in arrival order
    pub output: Vec<u8>,
    /// Diagnostics in arrival order, including any synthesized exit
    /// diagnostic
    pub diagnostics: Vec<Diagnostic>,
    /// Build commands in arrival order
    pub build_commands: Vec<BuildCommand>,
    /// Prebuild commands in arrival order
    pub prebuild_commands: Vec<PrebuildCommand>,
}

#[derive(Default)]
struct SessionState {
    output: Vec<u8>,
    diagnostics: Vec<Diagnostic>,
    build_commands: Vec<BuildCommand>,
    prebuild_commands: Vec<PrebuildCommand>,
    has_reported_error: bool,
    exit_early: bool,
}

/// State for one live plugin run
pub struct InvocationSession {
    session_id: Uuid,
    delegate: Arc<dyn PluginInvocationDelegate>,
    /// Every declared tool path, pre-sorted; prefixed onto each build
    /// command's inputs
    sorted_tool_paths: Vec<PathBuf>,
    /// Paths of build-produced tools; forbidden as prebuild executables
    built_tool_paths: Vec<PathBuf>,
    state: Mutex<SessionState>,
}

impl InvocationSession {
    /// Create the session state for one run
    pub fn new(
        delegate: Arc<dyn PluginInvocationDelegate>,
        accessible_tools: &AccessibleToolMap,
    ) -> Self {
        let mut sorted_tool_paths: Vec<PathBuf> =
            accessible_tools.values().map(|t| t.path.clone()).collect();
        sorted_tool_paths.sort();
        let built_tool_paths: Vec<PathBuf> = accessible_tools
            .values()
            .filter(|t| t.origin == ToolOrigin::Built)
            .map(|t| t.path.clone())
            .collect();

        Self {
            session_id: Uuid::new_v4(),
            delegate,
            sorted_tool_paths,
            built_tool_paths,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Compute the final outcome once the child has exited
    ///
    /// A dirty exit with no error diagnostic gets one synthesized so the
    /// failure is never silent.
    pub fn finalize(&self, exit_code: i32) -> SessionOutcome {
        let mut state = self.state.lock().expect("session lock poisoned");
        let state = std::mem::take(&mut *state);
        let SessionState {
            output,
            mut diagnostics,
            build_commands,
            prebuild_commands,
            has_reported_error,
            exit_early,
        } = state;

        let exited_cleanly = exit_code == 0 && !exit_early;
        if !exited_cleanly && !has_reported_error {
            let synthesized = Diagnostic::error(format!("Plugin ended with exit code {exit_code}"));
            self.delegate.plugin_emitted_diagnostic(&synthesized);
            diagnostics.push(synthesized);
        }

        tracing::debug!(
            session = %self.session_id,
            exit_code,
            exited_cleanly,
            "plugin session finished"
        );

        SessionOutcome {
            exited_cleanly,
            output,
            diagnostics,
            build_commands,
            prebuild_commands,
        }
    }

    fn record_diagnostic(
        &self,
        severity: WireDiagnosticSeverity,
        message: String,
        file: Option<String>,
        line: Option<u32>,
    ) {
        let severity = match severity {
            WireDiagnosticSeverity::Error => Severity::Error,
            WireDiagnosticSeverity::Warning => Severity::Warning,
            WireDiagnosticSeverity::Remark => Severity::Remark,
        };
        let mut diagnostic = Diagnostic {
            severity,
            message,
            file: None,
            line: None,
        };
        // Unusable location metadata is a soft error: keep the message,
        // drop the location.
        if let Some(file) = file {
            let path = Path::new(&file);
            if path.is_absolute() {
                diagnostic.file = Some(path.to_path_buf());
                diagnostic.line = line;
            } else {
                tracing::debug!(session = %self.session_id, file, "dropping invalid diagnostic location");
            }
        }

        let mut state = self.state.lock().expect("session lock poisoned");
        if severity == Severity::Error {
            state.has_reported_error = true;
        }
        state.diagnostics.push(diagnostic.clone());
        drop(state);
        self.delegate.plugin_emitted_diagnostic(&diagnostic);
    }

    fn validate_version(&self, configuration: &WireCommandConfiguration) -> HostResult<()> {
        if configuration.version != COMMAND_CONFIGURATION_VERSION {
            return Err(HostError::IncompatibleVersion {
                expected: COMMAND_CONFIGURATION_VERSION,
                actual: configuration.version,
            });
        }
        Ok(())
    }

    fn accept_build_command(
        &self,
        configuration: WireCommandConfiguration,
        input_files: Vec<PathBuf>,
        output_files: Vec<PathBuf>,
    ) -> HostResult<()> {
        self.validate_version(&configuration)?;

        // Tool paths lead the input list so the build graph re-runs the
        // command whenever any declared tool changes.
        let mut inputs = self.sorted_tool_paths.clone();
        inputs.extend(input_files);

        let command = BuildCommand {
            configuration: host_configuration(configuration),
            input_files: inputs,
            output_files,
        };
        self.state
            .lock()
            .expect("session lock poisoned")
            .build_commands
            .push(command.clone());
        self.delegate.plugin_defined_build_command(&command);
        Ok(())
    }

    fn accept_prebuild_command(
        &self,
        configuration: WireCommandConfiguration,
        output_files_directory: PathBuf,
    ) -> HostResult<()> {
        self.validate_version(&configuration)?;

        if self.built_tool_paths.contains(&configuration.executable) {
            let basename = configuration
                .executable
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| configuration.executable.display().to_string());
            let diagnostic = Diagnostic::error(format!(
                "prebuild command '{}' cannot use the build-produced executable '{basename}'",
                configuration.display_name
            ));
            let mut state = self.state.lock().expect("session lock poisoned");
            state.has_reported_error = true;
            state.exit_early = true;
            state.diagnostics.push(diagnostic.clone());
            drop(state);
            self.delegate.plugin_emitted_diagnostic(&diagnostic);
            return Ok(());
        }

        let command = PrebuildCommand {
            configuration: host_configuration(configuration),
            output_files_directory,
        };
        if !self.delegate.plugin_defined_prebuild_command(&command) {
            self.state
                .lock()
                .expect("session lock poisoned")
                .exit_early = true;
            return Ok(());
        }
        self.state
            .lock()
            .expect("session lock poisoned")
            .prebuild_commands
            .push(command);
        Ok(())
    }
}

fn host_configuration(configuration: WireCommandConfiguration) -> CommandConfiguration {
    CommandConfiguration {
        display_name: configuration.display_name,
        executable: configuration.executable,
        arguments: configuration.arguments,
        environment: configuration.environment,
        working_directory: configuration.working_directory,
    }
}

#[async_trait]
impl ScriptRunnerDelegate for InvocationSession {
    fn compilation_started(&self, plugin_name: &str) {
        self.delegate.plugin_compilation_started(plugin_name);
    }

    fn compilation_ended(
        &self,
        plugin_name: &str,
        result: &crate::compiler::cache::PluginCompilationResult,
    ) {
        self.delegate.plugin_compilation_ended(plugin_name, result);
    }

    fn compilation_skipped(
        &self,
        plugin_name: &str,
        result: &crate::compiler::cache::PluginCompilationResult,
    ) {
        self.delegate.plugin_compilation_skipped(plugin_name, result);
    }

    async fn handle_output(&self, data: &[u8]) {
        self.state
            .lock()
            .expect("session lock poisoned")
            .output
            .extend_from_slice(data);
        self.delegate.plugin_emitted_output(data);
    }

    async fn handle_message(
        &self,
        payload: &[u8],
        responder: &MessageResponder,
    ) -> HostResult<()> {
        match codec::decode(payload)? {
            PluginToHost::EmitDiagnostic {
                severity,
                message,
                file,
                line,
            } => {
                self.record_diagnostic(severity, message, file, line);
            }
            PluginToHost::EmitProgress { message } => {
                self.delegate.plugin_emitted_progress(&message);
            }
            PluginToHost::DefineBuildCommand {
                configuration,
                input_files,
                output_files,
            } => {
                self.accept_build_command(configuration, input_files, output_files)?;
            }
            PluginToHost::DefinePrebuildCommand {
                configuration,
                output_files_directory,
            } => {
                self.accept_prebuild_command(configuration, output_files_directory)?;
            }
            PluginToHost::BuildOperationRequest { subset, parameters } => {
                let delegate = self.delegate.clone();
                let responder = responder.clone();
                tokio::spawn(async move {
                    let reply = match delegate
                        .plugin_requested_build_operation(subset, parameters)
                        .await
                    {
                        Ok(result) => HostToPlugin::BuildOperationResponse { result },
                        Err(e) => HostToPlugin::ErrorResponse {
                            error: e.to_string(),
                        },
                    };
                    responder.send(reply);
                });
            }
            PluginToHost::TestOperationRequest { subset, parameters } => {
                let delegate = self.delegate.clone();
                let responder = responder.clone();
                tokio::spawn(async move {
                    let reply = match delegate
                        .plugin_requested_test_operation(subset, parameters)
                        .await
                    {
                        Ok(result) => HostToPlugin::TestOperationResponse { result },
                        Err(e) => HostToPlugin::ErrorResponse {
                            error: e.to_string(),
                        },
                    };
                    responder.send(reply);
                });
            }
            PluginToHost::SymbolGraphRequest {
                target_name,
                options,
            } => {
                let delegate = self.delegate.clone();
                let responder = responder.clone();
                tokio::spawn(async move {
                    let reply = match delegate
                        .plugin_requested_symbol_graph(target_name, options)
                        .await
                    {
                        Ok(directory) => match url::Url::from_file_path(&directory) {
                            Ok(url) => HostToPlugin::SymbolGraphResponse {
                                result: SymbolGraphResult {
                                    directory_path: url.to_string(),
                                },
                            },
                            Err(()) => HostToPlugin::ErrorResponse {
                                error: format!(
                                    "symbol graph directory '{}' is not an absolute path",
                                    directory.display()
                                ),
                            },
                        },
                        Err(e) => HostToPlugin::ErrorResponse {
                            error: e.to_string(),
                        },
                    };
                    responder.send(reply);
                });
            }
        }
        Ok(())
    }
}
