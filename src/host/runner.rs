// ! Plugin script runner
// !
// ! The runner encapsulates "make it runnable and run it": compile the
// ! plugin sources (through the cache) and pump the sandboxed child's
// ! streams until it exits. The session talks to the runner through
// ! [`ScriptRunnerDelegate`], which keeps the session testable against a
// ! scripted runner with no real process underneath.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::compiler::cache::{
    CompilationObserver, PluginCompilationResult, PluginCompilerCache,
};
use crate::core::error::HostResult;
use crate::protocol::codec;
use crate::protocol::messages::HostToPlugin;
use crate::sandbox::launcher::SandboxLauncher;
use crate::sandbox::policy::SandboxPolicy;

/// Sends reply messages back to a running plugin
///
/// Cloneable so request handlers can answer after the pump has moved on.
/// Replies are framed by a single writer, so concurrent responders never
/// interleave partial payloads.
#[derive(Debug, Clone)]
pub struct MessageResponder {
    tx: mpsc::UnboundedSender<HostToPlugin>,
}

impl MessageResponder {
    /// Create a responder and the receiving end of its reply queue
    ///
    /// The production runner drains the receiver into the child's framed
    /// stdin; a scripted runner can drain it directly in tests.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostToPlugin>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a reply for the plugin
    ///
    /// Replies queued after the plugin has exited are dropped silently;
    /// there is no one left to read them.
    pub fn send(&self, message: HostToPlugin) {
        if self.tx.send(message).is_err() {
            tracing::debug!("plugin reply dropped; writer already closed");
        }
    }
}

/// Session-facing callbacks from a running script
#[async_trait]
pub trait ScriptRunnerDelegate: Send + Sync {
    /// Compilation started
    fn compilation_started(&self, _plugin_name: &str) {}

    /// Compilation finished
    fn compilation_ended(&self, _plugin_name: &str, _result: &PluginCompilationResult) {}

    /// Compilation was skipped on a cache hit
    fn compilation_skipped(&self, _plugin_name: &str, _result: &PluginCompilationResult) {}

    /// The child produced free-form output bytes
    async fn handle_output(&self, data: &[u8]);

    /// The child sent a framed message
    ///
    /// Returning an error aborts the session: the child is killed and the
    /// error propagates to the caller.
    async fn handle_message(
        &self,
        payload: &[u8],
        responder: &MessageResponder,
    ) -> HostResult<()>;
}

/// Compiles and runs a plugin end to end
#[async_trait]
pub trait PluginScriptRunner: Send + Sync {
    /// Run the plugin and return its exit code
    ///
    /// Returns only after the child has exited and both of its streams are
    /// fully drained.
    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        sources: &[PathBuf],
        plugin_root: &Path,
        plugin_name: &str,
        initial_message: Vec<u8>,
        tools_version: &str,
        working_directory: &Path,
        policy: &SandboxPolicy,
        delegate: Arc<dyn ScriptRunnerDelegate>,
    ) -> HostResult<i32>;
}

/// The production runner: compiler cache + sandbox launcher
pub struct DefaultPluginScriptRunner {
    cache: Arc<PluginCompilerCache>,
    launcher: SandboxLauncher,
    compile_flags: Vec<String>,
}

impl DefaultPluginScriptRunner {
    /// Create a runner over the given cache
    pub fn new(cache: Arc<PluginCompilerCache>) -> Self {
        Self {
            cache,
            launcher: SandboxLauncher::new(),
            compile_flags: Vec::new(),
        }
    }

    /// Add flags passed to every plugin compile (and into the cache key)
    pub fn with_compile_flags(mut self, flags: Vec<String>) -> Self {
        self.compile_flags = flags;
        self
    }

    fn child_environment(policy: &SandboxPolicy) -> HashMap<String, String> {
        // The child starts from a scrubbed environment; tools are found
        // through PATH assembled from the policy's search directories.
        let mut environment = HashMap::new();
        if let Ok(path) = std::env::join_paths(&policy.tool_search_directories) {
            environment.insert("PATH".to_string(), path.to_string_lossy().into_owned());
        }
        environment
    }
}

struct ForwardingObserver(Arc<dyn ScriptRunnerDelegate>);

impl CompilationObserver for ForwardingObserver {
    fn compilation_started(&self, plugin_name: &str) {
        self.0.compilation_started(plugin_name);
    }

    fn compilation_ended(&self, plugin_name: &str, result: &PluginCompilationResult) {
        self.0.compilation_ended(plugin_name, result);
    }

    fn compilation_skipped(&self, plugin_name: &str, result: &PluginCompilationResult) {
        self.0.compilation_skipped(plugin_name, result);
    }
}

#[async_trait]
impl PluginScriptRunner for DefaultPluginScriptRunner {
    async fn run(
        &self,
        sources: &[PathBuf],
        plugin_root: &Path,
        plugin_name: &str,
        initial_message: Vec<u8>,
        tools_version: &str,
        working_directory: &Path,
        policy: &SandboxPolicy,
        delegate: Arc<dyn ScriptRunnerDelegate>,
    ) -> HostResult<i32> {
        let compiled = self
            .cache
            .compile(
                plugin_root,
                sources,
                plugin_name,
                tools_version,
                &self.compile_flags,
                &ForwardingObserver(delegate.clone()),
            )
            .await?;

        let child = self.launcher.spawn(
            &compiled.executable,
            &[],
            &Self::child_environment(policy),
            working_directory,
            policy,
        )?;
        let (mut writer, mut reader, mut stderr, mut process) = child.split()?;

        // The initial message must reach the plugin before any inbound
        // message is processed, so it is written inline rather than queued.
        writer.write_frame(&initial_message).await?;

        let (responder, mut reply_rx) = MessageResponder::channel();

        // Single writer task: every reply is framed here, in queue order.
        let writer_task = tokio::spawn(async move {
            while let Some(message) = reply_rx.recv().await {
                let payload = match codec::encode(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("failed to encode reply: {e}");
                        continue;
                    }
                };
                if writer.write_frame(&payload).await.is_err() {
                    // The child went away; drain and drop the rest.
                    break;
                }
            }
        });

        // Free-form output drains concurrently with the message pump.
        let output_delegate = delegate.clone();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = [0u8; 8192];
            loop {
                match stderr.read(&mut buffer).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => output_delegate.handle_output(&buffer[..n]).await,
                }
            }
        });

        // The message pump: inbound frames are handled strictly in order.
        let mut pump_error = None;
        loop {
            match reader.read_frame().await {
                Ok(Some(payload)) => {
                    if let Err(e) = delegate.handle_message(&payload, &responder).await {
                        pump_error = Some(e);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    pump_error = Some(e);
                    break;
                }
            }
        }

        drop(responder);

        if let Some(error) = pump_error {
            process.kill().await;
            writer_task.abort();
            stderr_task.abort();
            return Err(error);
        }

        let exit_code = process.wait().await?;
        // All output must be drained before the exit code is reported.
        let _ = stderr_task.await;
        writer_task.abort();

        tracing::debug!(plugin = plugin_name, exit_code, "plugin exited");
        Ok(exit_code)
    }
}
