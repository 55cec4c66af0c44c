// ! Unit tests driving the session delegate surface directly

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::diagnostics::Severity;
use crate::host::runner::{MessageResponder, ScriptRunnerDelegate};
use crate::protocol::messages::{PluginToHost, WireCommandConfiguration, WireDiagnosticSeverity};
use crate::session::delegate::{AccumulatingDelegate, PluginInvocationDelegate};
use crate::session::invocation::InvocationSession;
use crate::tools::{AccessibleToolMap, ResolvedTool, ToolOrigin};

fn tools(entries: &[(&str, &str, ToolOrigin)]) -> AccessibleToolMap {
    entries
        .iter()
        .map(|(name, path, origin)| {
            (
                name.to_string(),
                ResolvedTool {
                    path: PathBuf::from(path),
                    supported_triples: None,
                    origin: *origin,
                },
            )
        })
        .collect()
}

fn config(display_name: &str, executable: &str) -> WireCommandConfiguration {
    WireCommandConfiguration {
        version: 2,
        display_name: display_name.to_string(),
        executable: PathBuf::from(executable),
        arguments: vec![],
        environment: HashMap::new(),
        working_directory: None,
    }
}

async fn send(session: &InvocationSession, message: PluginToHost) {
    let (responder, _rx) = MessageResponder::channel();
    let payload = serde_json::to_vec(&message).unwrap();
    session.handle_message(&payload, &responder).await.unwrap();
}

#[tokio::test]
async fn test_garbage_frame_aborts_with_decode_error() {
    let session = InvocationSession::new(
        Arc::new(AccumulatingDelegate::new()),
        &AccessibleToolMap::new(),
    );
    let (responder, _rx) = MessageResponder::channel();
    let result = session.handle_message(b"not json at all", &responder).await;
    assert!(matches!(
        result,
        Err(crate::core::error::HostError::DecodingPluginOutputFailed { .. })
    ));
}

#[tokio::test]
async fn test_delegate_veto_ends_session_early_without_diagnostic() {
    struct Veto;
    #[async_trait::async_trait]
    impl PluginInvocationDelegate for Veto {
        fn plugin_defined_prebuild_command(
            &self,
            _command: &crate::core::command::PrebuildCommand,
        ) -> bool {
            false
        }
    }

    let session = InvocationSession::new(Arc::new(Veto), &AccessibleToolMap::new());
    send(
        &session,
        PluginToHost::DefinePrebuildCommand {
            configuration: config("prepare", "/u/prepare"),
            output_files_directory: PathBuf::from("/out"),
        },
    )
    .await;

    // Exit 0 still counts as cut short; the veto emitted no diagnostic so
    // the exit one is synthesized.
    let outcome = session.finalize(0);
    assert!(!outcome.exited_cleanly);
    assert!(outcome.prebuild_commands.is_empty());
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].message, "Plugin ended with exit code 0");
}

#[tokio::test]
async fn test_vended_tool_is_allowed_as_prebuild_executable() {
    // Only build-produced tools are forbidden; vended ones are fine.
    let session = InvocationSession::new(
        Arc::new(AccumulatingDelegate::new()),
        &tools(&[("kit", "/artifacts/kit/bin/kit", ToolOrigin::Vended)]),
    );
    send(
        &session,
        PluginToHost::DefinePrebuildCommand {
            configuration: config("prepare", "/artifacts/kit/bin/kit"),
            output_files_directory: PathBuf::from("/out"),
        },
    )
    .await;

    let outcome = session.finalize(0);
    assert!(outcome.exited_cleanly);
    assert_eq!(outcome.prebuild_commands.len(), 1);
}

#[tokio::test]
async fn test_error_diagnostic_sets_reported_flag_but_not_failure() {
    // An error diagnostic alone does not fail the run; the exit code does.
    let session = InvocationSession::new(
        Arc::new(AccumulatingDelegate::new()),
        &AccessibleToolMap::new(),
    );
    send(
        &session,
        PluginToHost::EmitDiagnostic {
            severity: WireDiagnosticSeverity::Error,
            message: "something odd".to_string(),
            file: None,
            line: None,
        },
    )
    .await;

    let outcome = session.finalize(0);
    assert!(outcome.exited_cleanly);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Error);
}

#[tokio::test]
async fn test_progress_goes_to_delegate_only() {
    struct ProgressProbe(AtomicBool);
    #[async_trait::async_trait]
    impl PluginInvocationDelegate for ProgressProbe {
        fn plugin_emitted_progress(&self, message: &str) {
            assert_eq!(message, "halfway");
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let probe = Arc::new(ProgressProbe(AtomicBool::new(false)));
    let session = InvocationSession::new(probe.clone(), &AccessibleToolMap::new());
    send(
        &session,
        PluginToHost::EmitProgress {
            message: "halfway".to_string(),
        },
    )
    .await;
    assert!(probe.0.load(Ordering::SeqCst));

    // Progress is transient; it leaves no trace in the outcome.
    let outcome = session.finalize(0);
    assert!(outcome.diagnostics.is_empty());
    assert!(outcome.output.is_empty());
}

#[tokio::test]
async fn test_output_is_recorded_and_forwarded() {
    let delegate = Arc::new(AccumulatingDelegate::new());
    let session = InvocationSession::new(delegate.clone(), &AccessibleToolMap::new());
    session.handle_output(b"chunk one|").await;
    session.handle_output(b"chunk two").await;

    assert_eq!(delegate.output(), b"chunk one|chunk two");
    let outcome = session.finalize(0);
    assert_eq!(outcome.output, b"chunk one|chunk two");
}
