// ! Sandbox launcher
// !
// ! Spawns a compiled plugin executable under a [`SandboxPolicy`] with its
// ! stdio piped for the framed transport. Policy enforcement is delegated
// ! to the platform wrapper; the launcher itself only assembles and starts
// ! the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::core::error::{HostError, HostResult};
use crate::sandbox::child::PluginChild;
use crate::sandbox::policy::SandboxPolicy;

/// Spawns plugin processes
#[derive(Debug, Default, Clone)]
pub struct SandboxLauncher;

impl SandboxLauncher {
    /// Create a launcher
    pub fn new() -> Self {
        Self
    }

    /// Spawn an executable under the given policy
    ///
    /// The child starts with exactly the environment passed here. Stdio is
    /// fully piped: stdin/stdout carry frames, stderr carries free-form
    /// output. The child is killed if the handle is dropped before exit.
    pub fn spawn(
        &self,
        executable: &Path,
        arguments: &[String],
        environment: &HashMap<String, String>,
        working_directory: &Path,
        policy: &SandboxPolicy,
    ) -> HostResult<PluginChild> {
        let (wrapped_executable, wrapped_arguments) =
            policy.wrap_command(executable.to_path_buf(), arguments.to_vec());

        tracing::debug!(
            executable = %wrapped_executable.display(),
            cwd = %working_directory.display(),
            "spawning plugin"
        );

        let child = Command::new(&wrapped_executable)
            .args(&wrapped_arguments)
            .env_clear()
            .envs(environment)
            .current_dir(working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HostError::running(format!(
                    "failed to start plugin process {}: {e}",
                    executable.display()
                ))
            })?;

        Ok(PluginChild { child })
    }
}

/// Standard writable directories for a plugin work dir
///
/// Convenience for callers assembling a policy: the plugin's own work
/// directory plus the system temporary directory.
pub fn default_writable_directories(plugin_work_directory: &Path) -> Vec<PathBuf> {
    vec![plugin_work_directory.to_path_buf(), std::env::temp_dir()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_failure_maps_to_running_error() {
        let launcher = SandboxLauncher::new();
        let result = launcher.spawn(
            Path::new("/nonexistent/plugin-binary"),
            &[],
            &HashMap::new(),
            Path::new("/"),
            &SandboxPolicy::default(),
        );
        match result {
            Err(HostError::RunningPluginFailed(message)) => {
                assert!(message.contains("failed to start plugin process"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_drain_real_child() {
        // `cat` with closed stdin exits 0 without writing frames, which is
        // exactly a clean end-of-stream for the frame reader.
        let launcher = SandboxLauncher::new();
        let child = launcher
            .spawn(
                Path::new("/bin/cat"),
                &[],
                &HashMap::new(),
                Path::new("/"),
                &SandboxPolicy::default(),
            )
            .unwrap();
        let (mut writer, mut reader, _stderr, mut process) = child.split().unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(reader.read_frame().await.unwrap(), None);
        assert_eq!(process.wait().await.unwrap(), 0);
    }
}
