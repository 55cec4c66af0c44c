// ! Invocation delegate
// !
// ! The delegate is the host-supplied capability set for one invocation:
// ! observers for compilation events and plugin output, plus responders for
// ! the three request kinds a plugin may issue. All methods have defaults,
// ! so callers implement only what they care about; the request responders
// ! default to failing with an "unimplemented" error.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::compiler::cache::PluginCompilationResult;
use crate::core::command::{BuildCommand, PrebuildCommand};
use crate::core::diagnostics::Diagnostic;
use crate::core::error::{HostError, HostResult};
use crate::protocol::messages::{
    BuildParameters, BuildResult, BuildSubset, SymbolGraphOptions, TestParameters, TestResult,
    TestSubset,
};

/// Host-supplied observers and responders for one plugin invocation
#[async_trait]
pub trait PluginInvocationDelegate: Send + Sync {
    /// The plugin's sources started compiling
    fn plugin_compilation_started(&self, _plugin_name: &str) {}

    /// The plugin's sources finished compiling
    fn plugin_compilation_ended(&self, _plugin_name: &str, _result: &PluginCompilationResult) {}

    /// Compilation was skipped because the cache was hit
    fn plugin_compilation_skipped(&self, _plugin_name: &str, _result: &PluginCompilationResult) {}

    /// The plugin wrote free-form output bytes
    fn plugin_emitted_output(&self, _data: &[u8]) {}

    /// The plugin emitted a diagnostic
    fn plugin_emitted_diagnostic(&self, _diagnostic: &Diagnostic) {}

    /// The plugin reported coarse progress
    fn plugin_emitted_progress(&self, _message: &str) {}

    /// The plugin defined a build command
    fn plugin_defined_build_command(&self, _command: &BuildCommand) {}

    /// The plugin defined a prebuild command
    ///
    /// Returning `false` vetoes the command and ends the session early; the
    /// vetoing delegate is expected to have emitted its own diagnostic.
    fn plugin_defined_prebuild_command(&self, _command: &PrebuildCommand) -> bool {
        true
    }

    /// The plugin asked for a nested build
    async fn plugin_requested_build_operation(
        &self,
        _subset: BuildSubset,
        _parameters: BuildParameters,
    ) -> HostResult<BuildResult> {
        Err(HostError::Unimplemented("build operation".to_string()))
    }

    /// The plugin asked for a nested test run
    async fn plugin_requested_test_operation(
        &self,
        _subset: TestSubset,
        _parameters: TestParameters,
    ) -> HostResult<TestResult> {
        Err(HostError::Unimplemented("test operation".to_string()))
    }

    /// The plugin asked for symbol-graph generation
    ///
    /// On success the returned directory is sent back to the plugin in
    /// file-URL form.
    async fn plugin_requested_symbol_graph(
        &self,
        _target_name: String,
        _options: SymbolGraphOptions,
    ) -> HostResult<PathBuf> {
        Err(HostError::Unimplemented("symbol graph".to_string()))
    }
}

/// Delegate that records everything it observes
///
/// Used by the module-level invoke wrapper, and useful for callers that
/// want partial output even when an invocation fails: the captures survive
/// the error.
#[derive(Default)]
pub struct AccumulatingDelegate {
    state: Mutex<AccumulatedState>,
}

#[derive(Default)]
struct AccumulatedState {
    output: Vec<u8>,
    diagnostics: Vec<Diagnostic>,
    progress: Vec<String>,
    build_commands: Vec<BuildCommand>,
    prebuild_commands: Vec<PrebuildCommand>,
}

impl AccumulatingDelegate {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// All output bytes observed so far, in arrival order
    pub fn output(&self) -> Vec<u8> {
        self.state.lock().expect("delegate lock poisoned").output.clone()
    }

    /// All diagnostics observed so far, in arrival order
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .diagnostics
            .clone()
    }

    /// All progress messages observed so far
    pub fn progress(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .progress
            .clone()
    }

    /// All build commands observed so far, in arrival order
    pub fn build_commands(&self) -> Vec<BuildCommand> {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .build_commands
            .clone()
    }

    /// All prebuild commands observed so far, in arrival order
    pub fn prebuild_commands(&self) -> Vec<PrebuildCommand> {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .prebuild_commands
            .clone()
    }
}

#[async_trait]
impl PluginInvocationDelegate for AccumulatingDelegate {
    fn plugin_emitted_output(&self, data: &[u8]) {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .output
            .extend_from_slice(data);
    }

    fn plugin_emitted_diagnostic(&self, diagnostic: &Diagnostic) {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .diagnostics
            .push(diagnostic.clone());
    }

    fn plugin_emitted_progress(&self, message: &str) {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .progress
            .push(message.to_string());
    }

    fn plugin_defined_build_command(&self, command: &BuildCommand) {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .build_commands
            .push(command.clone());
    }

    fn plugin_defined_prebuild_command(&self, command: &PrebuildCommand) -> bool {
        self.state
            .lock()
            .expect("delegate lock poisoned")
            .prebuild_commands
            .push(command.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    #[async_trait]
    impl PluginInvocationDelegate for Bare {}

    #[tokio::test]
    async fn test_request_responders_default_to_unimplemented() {
        let delegate = Bare;
        let result = delegate
            .plugin_requested_symbol_graph(
                "t".to_string(),
                SymbolGraphOptions {
                    minimum_access_level: "public".to_string(),
                    include_synthesized: false,
                    include_spi: false,
                    emit_extension_blocks: false,
                },
            )
            .await;
        assert!(matches!(result, Err(HostError::Unimplemented(_))));
    }

    #[test]
    fn test_accumulator_keeps_arrival_order() {
        let delegate = AccumulatingDelegate::new();
        delegate.plugin_emitted_diagnostic(&Diagnostic::warning("first"));
        delegate.plugin_emitted_diagnostic(&Diagnostic::error("second"));
        delegate.plugin_emitted_output(b"hel");
        delegate.plugin_emitted_output(b"lo");

        let diagnostics = delegate.diagnostics();
        assert_eq!(diagnostics[0].message, "first");
        assert_eq!(diagnostics[1].message, "second");
        assert_eq!(delegate.output(), b"hello");
    }
}
