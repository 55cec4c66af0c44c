//! Plugin script compilation
//!
//! Turns plugin sources into a runnable executable, with a
//! content-addressed cache so unchanged plugins never recompile.

pub mod cache;

pub use cache::{
    CompilationObserver, NullCompilationObserver, PluginCompilationResult, PluginCompilerCache,
    Toolchain,
};
