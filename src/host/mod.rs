//! Host facade and script runner
//!
//! The accessor combines tool discovery, context serialization, plugin
//! compilation and the invocation session behind one `invoke` surface; the
//! runner abstracts "compile and run" so sessions can be driven without a
//! real process in tests.

pub mod accessor;
pub mod runner;

pub use accessor::{
    InvocationRequest, PluginAction, PluginHost, compute_plugin_generated_files,
};
pub use runner::{
    DefaultPluginScriptRunner, MessageResponder, PluginScriptRunner, ScriptRunnerDelegate,
};
