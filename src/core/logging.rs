// ! Logging setup for host executables
// !
// ! Module provides an opt-in tracing subscriber initializer for binaries
// ! embedding the host. The library itself only emits `tracing` events and
// ! never installs a subscriber on its own.

#[cfg(feature = "tracing-subscriber")]
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize a formatted tracing subscriber with env-filter support
///
/// Reads the conventional `RUST_LOG` environment variable, defaulting to
/// `info` for this crate and `warn` elsewhere. Safe to call once per
/// process; later calls are ignored.
#[cfg(feature = "tracing-subscriber")]
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,anvil_plugin_rs=info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
