// ! Sandbox policy
// !
// ! The policy is a value: three path lists plus permitted network
// ! destinations, fixed for the duration of one invocation. Enforcement is
// ! a launcher concern; the protocol never sees sandbox semantics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A network destination the sandboxed plugin may reach
///
/// An empty allow-list means no network access at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkDestination {
    /// Local unix domain sockets
    UnixDomainSockets,
    /// TCP on localhost, optionally limited to specific ports
    LocalTcp {
        /// Permitted ports (empty = any localhost port)
        ports: Vec<u16>,
    },
    /// The local Docker daemon socket
    DockerSocket,
    /// Any host matching the given pattern
    Hosts {
        /// Host pattern, e.g. `*.example.com`
        pattern: String,
    },
}

/// The sandbox a plugin process runs under
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    /// Directories the plugin may write to
    #[serde(rename = "writableDirectories")]
    pub writable_directories: Vec<PathBuf>,
    /// Directories explicitly forced read-only even inside writable trees
    #[serde(rename = "readOnlyDirectories")]
    pub read_only_directories: Vec<PathBuf>,
    /// Directories searched for tools the plugin invokes
    #[serde(rename = "toolSearchDirectories")]
    pub tool_search_directories: Vec<PathBuf>,
    /// Permitted network destinations (empty = none)
    #[serde(rename = "allowedNetwork")]
    pub allowed_network: Vec<NetworkDestination>,
}

impl SandboxPolicy {
    /// Whether the policy permits any network access
    pub fn allows_network(&self) -> bool {
        !self.allowed_network.is_empty()
    }

    /// Render the policy as a seatbelt profile
    ///
    /// This is the macOS enforcement vehicle: the launcher wraps the child
    /// in `sandbox-exec -p <profile>`. Rendering is pure so it can be
    /// tested everywhere.
    pub fn seatbelt_profile(&self) -> String {
        let mut profile = String::new();
        profile.push_str("(version 1)\n");
        profile.push_str("(deny default)\n");
        profile.push_str("(import \"system.sb\")\n");
        // Reading and process management stay open; writes are opt-in.
        profile.push_str("(allow file-read*)\n");
        profile.push_str("(allow process*)\n");
        profile.push_str("(allow sysctl-read)\n");

        for destination in &self.allowed_network {
            match destination {
                NetworkDestination::UnixDomainSockets => {
                    profile.push_str("(allow network* (local unix) (remote unix))\n");
                }
                NetworkDestination::LocalTcp { ports } if ports.is_empty() => {
                    profile.push_str("(allow network* (local tcp \"localhost:*\"))\n");
                }
                NetworkDestination::LocalTcp { ports } => {
                    for port in ports {
                        profile.push_str(&format!(
                            "(allow network* (local tcp \"localhost:{port}\"))\n"
                        ));
                    }
                }
                NetworkDestination::DockerSocket => {
                    profile.push_str(
                        "(allow network* (remote unix (path-literal \"/var/run/docker.sock\")))\n",
                    );
                }
                NetworkDestination::Hosts { pattern } => {
                    profile.push_str(&format!("(allow network* (remote tcp \"{pattern}:*\"))\n"));
                }
            }
        }

        if !self.writable_directories.is_empty() {
            profile.push_str("(allow file-write*\n");
            for directory in &self.writable_directories {
                profile.push_str(&format!("    (subpath \"{}\")\n", directory.display()));
            }
            profile.push_str(")\n");
        }
        if !self.read_only_directories.is_empty() {
            profile.push_str("(deny file-write*\n");
            for directory in &self.read_only_directories {
                profile.push_str(&format!("    (subpath \"{}\")\n", directory.display()));
            }
            profile.push_str(")\n");
        }

        profile
    }

    /// Wrap a command line in the platform's enforcement mechanism
    ///
    /// On macOS the command is re-rooted through `sandbox-exec`. On other
    /// platforms the policy travels as data only and the command passes
    /// through unchanged.
    pub fn wrap_command(
        &self,
        executable: PathBuf,
        arguments: Vec<String>,
    ) -> (PathBuf, Vec<String>) {
        #[cfg(target_os = "macos")]
        {
            let mut wrapped = vec![
                "-p".to_string(),
                self.seatbelt_profile(),
                executable.to_string_lossy().into_owned(),
            ];
            wrapped.extend(arguments);
            (PathBuf::from("/usr/bin/sandbox-exec"), wrapped)
        }
        #[cfg(not(target_os = "macos"))]
        {
            tracing::debug!("no sandbox enforcement on this platform; policy carried as data");
            (executable, arguments)
        }
    }
}
