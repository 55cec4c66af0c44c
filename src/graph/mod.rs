//! Module graph model consumed by the plugin host
//!
//! The host does not build or resolve package graphs itself; it consumes a
//! resolved graph produced elsewhere. This module defines just enough
//! structure for the invocation core: packages, modules, products and
//! IDE-style projects, plus the build environment used to filter
//! conditional dependencies.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Platform a build targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Apple macOS
    MacOs,
    /// Linux
    Linux,
    /// Microsoft Windows
    Windows,
}

/// Build configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildConfiguration {
    /// Unoptimized build with debug info
    Debug,
    /// Optimized build
    Release,
}

/// The environment a plugin invocation is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    /// Target platform
    pub platform: Platform,
    /// Build configuration
    pub configuration: BuildConfiguration,
}

/// What kind of module a graph node is
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleKind {
    /// An ordinary library module
    Library,
    /// A module producing an executable
    Executable,
    /// A test module
    Test,
    /// A prebuilt binary artifact with a metadata manifest on disk
    Binary {
        /// Path of the artifact's metadata manifest
        artifact_path: PathBuf,
    },
    /// A build plugin
    Plugin,
}

/// A dependency edge, optionally restricted to certain platforms
///
/// An empty platform list means the dependency applies everywhere.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// Dependency on another module in the graph
    Module {
        /// The module depended on
        module: Arc<ResolvedModule>,
        /// Platforms the edge applies to (empty = all)
        platforms: Vec<Platform>,
    },
    /// Dependency on a product
    Product {
        /// The product depended on
        product: Arc<ResolvedProduct>,
        /// Platforms the edge applies to (empty = all)
        platforms: Vec<Platform>,
    },
}

impl Dependency {
    /// Whether this edge applies in the given build environment
    pub fn satisfies(&self, environment: &BuildEnvironment) -> bool {
        let platforms = match self {
            Dependency::Module { platforms, .. } => platforms,
            Dependency::Product { platforms, .. } => platforms,
        };
        platforms.is_empty() || platforms.contains(&environment.platform)
    }
}

/// A module in the resolved graph
#[derive(Debug)]
pub struct ResolvedModule {
    /// Module name, unique within its package
    pub name: String,
    /// Module kind
    pub kind: ModuleKind,
    /// Directory holding the module's sources
    pub directory: PathBuf,
    /// The module's source files
    pub source_files: Vec<PathBuf>,
    /// Outgoing dependency edges
    pub dependencies: Vec<Dependency>,
}

impl ResolvedModule {
    /// Dependencies that apply in the given build environment
    pub fn dependencies_satisfying<'a>(
        &'a self,
        environment: &'a BuildEnvironment,
    ) -> impl Iterator<Item = &'a Dependency> {
        self.dependencies.iter().filter(|d| d.satisfies(environment))
    }

    /// Whether this module is a build plugin
    pub fn is_plugin(&self) -> bool {
        matches!(self.kind, ModuleKind::Plugin)
    }
}

/// A product exported by a package
#[derive(Debug)]
pub struct ResolvedProduct {
    /// Product name
    pub name: String,
    /// Modules composing the product
    pub modules: Vec<Arc<ResolvedModule>>,
}

impl ResolvedProduct {
    /// The product's single executable module, if it has exactly one
    pub fn executable_module(&self) -> Option<&Arc<ResolvedModule>> {
        let mut executables = self
            .modules
            .iter()
            .filter(|m| matches!(m.kind, ModuleKind::Executable));
        match (executables.next(), executables.next()) {
            (Some(module), None) => Some(module),
            _ => None,
        }
    }
}

/// A package in the resolved graph
#[derive(Debug)]
pub struct ResolvedPackage {
    /// Stable package identity (lowercased registry/URL identity)
    pub identity: String,
    /// Display name from the package manifest
    pub display_name: String,
    /// Package root directory
    pub directory: PathBuf,
    /// Modules belonging to this package
    pub modules: Vec<Arc<ResolvedModule>>,
    /// Products exported by this package
    pub products: Vec<Arc<ResolvedProduct>>,
}

/// A target inside an IDE-style project
#[derive(Debug)]
pub struct ProjectTarget {
    /// Target name, unique within its project
    pub name: String,
    /// The target's source files
    pub source_files: Vec<PathBuf>,
}

/// An IDE-style project that can also host plugin invocations
#[derive(Debug)]
pub struct Project {
    /// Project name
    pub name: String,
    /// Project root directory
    pub directory: PathBuf,
    /// Targets contained in the project
    pub targets: Vec<Arc<ProjectTarget>>,
}

/// The resolved module graph the host operates over
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All packages in dependency order
    pub packages: Vec<Arc<ResolvedPackage>>,
    /// IDE-style projects known to the host (often empty)
    pub projects: Vec<Arc<Project>>,
}

impl ModuleGraph {
    /// The package that owns the given module, if any
    pub fn package_for_module(&self, module: &Arc<ResolvedModule>) -> Option<Arc<ResolvedPackage>> {
        self.packages
            .iter()
            .find(|p| p.modules.iter().any(|m| Arc::ptr_eq(m, module)))
            .cloned()
    }

    /// All modules in the graph, in package order
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ResolvedModule>> {
        self.packages.iter().flat_map(|p| p.modules.iter())
    }
}
