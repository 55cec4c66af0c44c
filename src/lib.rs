// Copyright (c) 2025 Anvil Build Tools Contributors
// SPDX-License-Identifier: MIT

//! # Anvil Plugin Host SDK
//!
//! A Rust SDK for the plugin invocation core of a package-build system:
//! take a declared build plugin and a structured action, compile the plugin
//! if needed, launch it in a sandbox, and mediate the bidirectional message
//! protocol until it exits.
//!
//! ## Features
//!
//! - **Framed wire protocol**: length-prefixed JSON messages over the
//!   child's stdio, with a pure codec and a stable schema
//! - **Content-addressed compile cache**: unchanged plugin sources never
//!   recompile; concurrent identical compiles coalesce
//! - **Declarative sandbox**: writable/read-only directories and a network
//!   allow-list, carried as data and enforced by the launcher
//! - **Ordered results**: diagnostics, build commands and output bytes come
//!   back in wire arrival order
//! - **In-band requests**: plugins can ask the host for nested builds,
//!   nested tests and symbol graphs while they run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use anvil_plugin_rs::prelude::*;
//!
//! # async fn example(
//! #     graph: Arc<ModuleGraph>,
//! #     plugin: Arc<ResolvedModule>,
//! #     package: Arc<ResolvedPackage>,
//! #     target: Arc<ResolvedModule>,
//! # ) -> HostResult<()> {
//! let toolchain = Toolchain {
//!     compiler_path: PathBuf::from("/usr/bin/rustc"),
//!     version: "1.85.0".to_string(),
//!     extra_flags: vec![],
//! };
//! let fs = Arc::new(LocalFileSystem);
//! let cache = Arc::new(PluginCompilerCache::new(
//!     PathBuf::from("/cache/plugins"),
//!     toolchain,
//!     fs.clone(),
//! ));
//! let runner = Arc::new(DefaultPluginScriptRunner::new(cache));
//! let host = PluginHost::new(graph, runner, fs);
//!
//! let action = PluginAction::CreateBuildToolCommands {
//!     package,
//!     target,
//!     generated_sources: vec![],
//!     generated_resources: vec![],
//! };
//! let environment = BuildEnvironment {
//!     platform: Platform::Linux,
//!     configuration: BuildConfiguration::Debug,
//! };
//! let result = host
//!     .invoke_module(
//!         &plugin,
//!         action,
//!         environment,
//!         PathBuf::from("/work/gen-plugin"),
//!         "x86_64-unknown-linux-gnu",
//!         "2",
//!         vec![],
//!         &|_name, _relative| None,
//!     )
//!     .await?;
//! println!("succeeded: {}", result.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`core`]: error taxonomy, diagnostics, command types, logging
//! - [`graph`]: the resolved module graph the host consumes
//! - [`protocol`]: wire schema and pure codec
//! - [`context`]: graph-to-wire flattening
//! - [`compiler`]: plugin script compilation and caching
//! - [`sandbox`]: policy, launcher and framed child transport
//! - [`session`]: the per-run message-routing state machine
//! - [`tools`]: accessible-tool discovery and merging
//! - [`host`]: the `invoke` facade and the script runner seam
//! - [`utils`]: filesystem abstraction

pub mod compiler;
pub mod context;
pub mod core;
pub mod graph;
pub mod host;
pub mod protocol;
pub mod sandbox;
pub mod session;
pub mod tools;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::core::error::{HostError, HostResult};
pub use crate::host::accessor::{PluginAction, PluginHost};

/// Prelude module for convenient imports
///
/// Re-exports the most commonly used types and traits. Use
/// `use anvil_plugin_rs::prelude::*;` to import everything you need.
pub mod prelude {
    // Core types
    pub use crate::core::{
        command::{
            BuildCommand, CommandConfiguration, GeneratedFileKind, PluginInvocationResult,
            PrebuildCommand, PrebuildCommandResult,
        },
        diagnostics::{Diagnostic, Severity},
        error::{HostError, HostResult},
    };

    // Graph model
    pub use crate::graph::{
        BuildConfiguration, BuildEnvironment, Dependency, ModuleGraph, ModuleKind, Platform,
        Project, ProjectTarget, ResolvedModule, ResolvedPackage, ResolvedProduct,
    };

    // Protocol types
    pub use crate::protocol::messages::*;
    pub use crate::protocol::input::WireInput;

    // Host facade and runner
    pub use crate::host::accessor::{
        InvocationRequest, PluginAction, PluginHost, compute_plugin_generated_files,
    };
    pub use crate::host::runner::{
        DefaultPluginScriptRunner, MessageResponder, PluginScriptRunner, ScriptRunnerDelegate,
    };

    // Session and delegate
    pub use crate::session::delegate::{AccumulatingDelegate, PluginInvocationDelegate};
    pub use crate::session::invocation::{InvocationSession, SessionOutcome};

    // Compilation and sandbox
    pub use crate::compiler::cache::{PluginCompilationResult, PluginCompilerCache, Toolchain};
    pub use crate::sandbox::policy::{NetworkDestination, SandboxPolicy};

    // Tools
    pub use crate::tools::{AccessibleTool, AccessibleToolMap, ResolvedTool, ToolOrigin};

    // Filesystem
    pub use crate::utils::fs::{FileSystem, InMemoryFileSystem, LocalFileSystem};

    // Essential external types
    pub use async_trait::async_trait;
    pub use std::collections::HashMap;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Basic smoke test to ensure all modules are accessible
        let _error = HostError::RunningPluginFailed("test".to_string());
    }
}
