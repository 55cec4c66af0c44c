// ! Script compiler cache
// !
// ! Compiles plugin sources to an executable, hitting a content-addressed
// ! cache when nothing relevant changed. The cache key digests the source
// ! contents, their paths relative to the plugin root, the declared tools
// ! version, the toolchain identity and the compilation flags. A
// ! process-wide per-fingerprint lock coalesces concurrent identical
// ! compiles into one.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::core::error::{HostError, HostResult};
use crate::utils::fs::FileSystem;

/// Observer for compilation lifecycle events
pub trait CompilationObserver: Send + Sync {
    /// A compile is about to start for the named plugin
    fn compilation_started(&self, _plugin_name: &str) {}

    /// A compile finished (successfully or not)
    fn compilation_ended(&self, _plugin_name: &str, _result: &PluginCompilationResult) {}

    /// The cache was hit and compilation was skipped
    fn compilation_skipped(&self, _plugin_name: &str, _result: &PluginCompilationResult) {}
}

/// No-op observer
pub struct NullCompilationObserver;

impl CompilationObserver for NullCompilationObserver {}

/// The toolchain used to compile plugin scripts
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Path of the compiler executable
    pub compiler_path: PathBuf,
    /// Toolchain identity string; participates in the cache key so cached
    /// artifacts are invalidated by toolchain updates
    pub version: String,
    /// Flags always passed to the compiler
    pub extra_flags: Vec<String>,
}

/// Outcome of one compile (fresh or cached)
#[derive(Debug, Clone)]
pub struct PluginCompilationResult {
    /// Whether an executable is available
    pub succeeded: bool,
    /// Whether the executable came from the cache
    pub cached: bool,
    /// Time spent producing the result
    pub duration: Duration,
    /// Raw compiler output (empty on cache hits)
    pub compiler_output: Vec<u8>,
    /// Path of the produced executable
    pub executable: PathBuf,
}

// Process-wide registry of per-fingerprint locks. Two sessions compiling
// the same plugin with the same inputs serialize here; the loser observes
// the winner's artifact as a cache hit.
static INFLIGHT: Lazy<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn inflight_lock(fingerprint: &str) -> Arc<tokio::sync::Mutex<()>> {
    let mut registry = INFLIGHT.lock().expect("inflight registry poisoned");
    registry
        .entry(fingerprint.to_string())
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
        .clone()
}

/// Content-addressed cache of compiled plugin executables
pub struct PluginCompilerCache {
    cache_directory: PathBuf,
    toolchain: Toolchain,
    fs: Arc<dyn FileSystem>,
}

impl PluginCompilerCache {
    /// Create a cache rooted at the given directory
    pub fn new(cache_directory: PathBuf, toolchain: Toolchain, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            cache_directory,
            toolchain,
            fs,
        }
    }

    /// Compute the cache fingerprint for a compile
    ///
    /// Sources are digested in sorted relative-path order so directory
    /// enumeration order cannot perturb the key.
    pub async fn fingerprint(
        &self,
        plugin_root: &Path,
        sources: &[PathBuf],
        tools_version: &str,
        flags: &[String],
    ) -> HostResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(tools_version.as_bytes());
        hasher.update([0]);
        hasher.update(self.toolchain.version.as_bytes());
        hasher.update([0]);
        hasher.update(self.toolchain.compiler_path.to_string_lossy().as_bytes());
        hasher.update([0]);
        for flag in self.toolchain.extra_flags.iter().chain(flags) {
            hasher.update(flag.as_bytes());
            hasher.update([0]);
        }

        let mut ordered: Vec<&PathBuf> = sources.iter().collect();
        ordered.sort();
        for source in ordered {
            let relative = source.strip_prefix(plugin_root).unwrap_or(source);
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0]);
            let contents = self.fs.read(source).await?;
            hasher.update(&contents);
            hasher.update([0]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Return an executable for the given sources, compiling if needed
    pub async fn compile(
        &self,
        plugin_root: &Path,
        sources: &[PathBuf],
        plugin_name: &str,
        tools_version: &str,
        flags: &[String],
        observer: &dyn CompilationObserver,
    ) -> HostResult<PluginCompilationResult> {
        let started = Instant::now();
        let fingerprint = self
            .fingerprint(plugin_root, sources, tools_version, flags)
            .await?;

        // At most one concurrent compile per fingerprint.
        let lock = inflight_lock(&fingerprint);
        let _guard = lock.lock().await;

        let artifact_directory = self
            .cache_directory
            .join(format!("{plugin_name}-{}", &fingerprint[..16]));
        let executable = artifact_directory.join(plugin_name);
        let fingerprint_file = artifact_directory.join("fingerprint");

        if self.fs.exists(&executable).await {
            if let Ok(recorded) = self.fs.read(&fingerprint_file).await {
                if recorded == fingerprint.as_bytes() {
                    let result = PluginCompilationResult {
                        succeeded: true,
                        cached: true,
                        duration: started.elapsed(),
                        compiler_output: Vec::new(),
                        executable,
                    };
                    tracing::debug!(plugin = plugin_name, "plugin compile cache hit");
                    observer.compilation_skipped(plugin_name, &result);
                    return Ok(result);
                }
            }
        }

        observer.compilation_started(plugin_name);
        self.fs.create_directory(&artifact_directory, true).await?;

        tracing::debug!(
            plugin = plugin_name,
            compiler = %self.toolchain.compiler_path.display(),
            "compiling plugin"
        );
        let output = Command::new(&self.toolchain.compiler_path)
            .args(&self.toolchain.extra_flags)
            .args(flags)
            .args(sources)
            .arg("-o")
            .arg(&executable)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| HostError::compilation(format!("failed to run compiler: {e}")))?;

        let mut compiler_output = output.stdout;
        compiler_output.extend_from_slice(&output.stderr);

        let result = PluginCompilationResult {
            succeeded: output.status.success(),
            cached: false,
            duration: started.elapsed(),
            compiler_output,
            executable: executable.clone(),
        };
        observer.compilation_ended(plugin_name, &result);

        if !result.succeeded {
            return Err(HostError::compilation(format!(
                "compiler exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&result.compiler_output)
            )));
        }

        // Record the key only after a successful compile so a partial
        // artifact can never satisfy a later probe.
        self.fs
            .write(&fingerprint_file, fingerprint.as_bytes())
            .await?;

        Ok(result)
    }
}
