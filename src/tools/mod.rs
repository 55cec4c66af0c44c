//! Tool discovery for plugins
//!
//! This module computes the set of executables a plugin is permitted to
//! invoke, merging tools built by the enclosing build with tools vended by
//! prebuilt binary artifacts.

pub mod broker;

pub use broker::{
    AccessibleTool, AccessibleToolMap, BuiltToolResolver, ResolvedTool, ToolOrigin,
    accessible_tools, resolve_tools, strip_triple_version,
};
