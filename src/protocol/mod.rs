//! Wire protocol between host and plugin
//!
//! This module defines the stable on-wire schema: the flattened context
//! snapshot ([`input`]), the bidirectional message types ([`messages`]) and
//! the pure byte-level codec ([`codec`]). Framing is supplied by the
//! transport in the sandbox layer, not here.

pub mod codec;
pub mod input;
pub mod messages;

// Re-export commonly used types
pub use input::{
    PackageId, PathId, ProductId, ProjectId, ProjectTargetId, TargetId, WireInput, WirePath,
    WireTool, WireToolSource,
};
pub use messages::{
    BuildParameters, BuildResult, BuildSubset, COMMAND_CONFIGURATION_VERSION, HostToPlugin,
    PluginToHost, SymbolGraphOptions, SymbolGraphResult, TestParameters, TestResult, TestSubset,
    WireCommandConfiguration, WireDiagnosticSeverity,
};
