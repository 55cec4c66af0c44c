// ! Tool broker
// !
// ! Computes the set of executables a plugin is permitted to invoke: tools
// ! built by the enclosing build and tools vended inside prebuilt binary
// ! artifacts, filtered by the host triple. The broker is stateless; it
// ! walks the plugin's dependencies for the given build environment and
// ! merges same-name entries under the documented rules.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::{HostError, HostResult};
use crate::graph::{BuildEnvironment, Dependency, ModuleKind, ResolvedModule};
use crate::utils::fs::FileSystem;

/// A named executable a plugin may invoke
#[derive(Debug, Clone, PartialEq)]
pub enum AccessibleTool {
    /// Produced by the enclosing build; the path is relative to the build
    /// products directory and resolved later by the host scheduler
    Built {
        /// Tool name
        name: String,
        /// Path relative to the build products directory
        executable: PathBuf,
    },
    /// Shipped inside a binary artifact at an absolute path
    Vended {
        /// Tool name
        name: String,
        /// Absolute path of the executable
        path: PathBuf,
        /// Triples the executable supports, version suffixes stripped
        /// (empty = unrestricted)
        supported_triples: Vec<String>,
    },
}

impl AccessibleTool {
    /// The tool's name
    pub fn name(&self) -> &str {
        match self {
            AccessibleTool::Built { name, .. } => name,
            AccessibleTool::Vended { name, .. } => name,
        }
    }
}

/// Origin of a resolved tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOrigin {
    /// Produced by the enclosing build
    Built,
    /// Shipped inside a binary artifact
    Vended,
}

/// A tool with its final absolute path
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTool {
    /// Absolute path of the executable
    pub path: PathBuf,
    /// Triples the executable supports (`None` for built tools)
    pub supported_triples: Option<Vec<String>>,
    /// Where the tool came from
    pub origin: ToolOrigin,
}

/// Accessible tools keyed by name, with resolved absolute paths
pub type AccessibleToolMap = BTreeMap<String, ResolvedTool>;

/// Maps a built tool to the location the build scheduler will produce it at
///
/// `None` means the tool is not available and is omitted from the map.
pub type BuiltToolResolver<'a> = dyn Fn(&str, &Path) -> Option<PathBuf> + Send + Sync + 'a;

// ============================================================================
// Artifact Metadata
// ============================================================================

/// Top-level binary artifact manifest
#[derive(Debug, Deserialize)]
struct ArtifactManifest {
    #[serde(rename = "schemaVersion")]
    #[allow(dead_code)]
    schema_version: String,
    artifacts: HashMap<String, ArtifactEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtifactEntry {
    #[serde(rename = "type")]
    kind: String,
    variants: Vec<ArtifactVariant>,
}

#[derive(Debug, Deserialize)]
struct ArtifactVariant {
    path: String,
    #[serde(rename = "supportedTriples", default)]
    supported_triples: Vec<String>,
}

/// Strip the trailing version number from a triple's OS component
///
/// `x86_64-apple-macosx12.0` becomes `x86_64-apple-macosx`; triples without
/// a version suffix pass through unchanged.
pub fn strip_triple_version(triple: &str) -> String {
    match triple.rfind('-') {
        Some(split) => {
            let (head, os) = triple.split_at(split);
            let os = os.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
            format!("{head}{os}")
        }
        None => triple.to_string(),
    }
}

// ============================================================================
// Broker
// ============================================================================

/// Compute the accessible tools for a plugin module
///
/// Walks the plugin's dependencies satisfying `environment`:
/// - executable module dependencies become built tools named after the module
/// - product dependencies become built tools named after the product, backed
///   by the product's single executable module
/// - binary module dependencies are expanded by reading their artifact
///   manifest and keeping executables that support `host_triple`
pub async fn accessible_tools(
    plugin: &ResolvedModule,
    environment: &BuildEnvironment,
    host_triple: &str,
    fs: &dyn FileSystem,
) -> HostResult<BTreeMap<String, AccessibleTool>> {
    let mut tools = BTreeMap::new();

    for dependency in plugin.dependencies_satisfying(environment) {
        match dependency {
            Dependency::Module { module, .. } => match &module.kind {
                ModuleKind::Executable => {
                    insert_tool(
                        &mut tools,
                        AccessibleTool::Built {
                            name: module.name.clone(),
                            executable: PathBuf::from(&module.name),
                        },
                    );
                }
                ModuleKind::Binary { artifact_path } => {
                    for tool in vended_tools(module, artifact_path, host_triple, fs).await? {
                        insert_tool(&mut tools, tool);
                    }
                }
                _ => {}
            },
            Dependency::Product { product, .. } => {
                let module = product
                    .executable_module()
                    .ok_or_else(|| HostError::NoSuchProduct(product.name.clone()))?;
                insert_tool(
                    &mut tools,
                    AccessibleTool::Built {
                        name: product.name.clone(),
                        executable: PathBuf::from(&module.name),
                    },
                );
            }
        }
    }

    Ok(tools)
}

/// Expand a binary module into vended tools for the host triple
async fn vended_tools(
    module: &Arc<ResolvedModule>,
    artifact_path: &Path,
    host_triple: &str,
    fs: &dyn FileSystem,
) -> HostResult<Vec<AccessibleTool>> {
    let manifest_bytes = fs.read(artifact_path).await.map_err(|e| {
        HostError::serialization(format!(
            "could not read artifact metadata for '{}': {e}",
            module.name
        ))
    })?;
    let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes).map_err(|e| {
        HostError::serialization(format!(
            "malformed artifact metadata for '{}': {e}",
            module.name
        ))
    })?;

    let artifact_root = artifact_path.parent().unwrap_or(Path::new("/"));
    let host = strip_triple_version(host_triple);
    let mut tools = Vec::new();

    for (name, entry) in manifest.artifacts {
        if entry.kind != "executable" {
            continue;
        }
        for variant in entry.variants {
            let triples: Vec<String> = variant
                .supported_triples
                .iter()
                .map(|t| strip_triple_version(t))
                .collect();
            if !triples.is_empty() && !triples.iter().any(|t| t == &host) {
                continue;
            }
            tools.push(AccessibleTool::Vended {
                name: name.clone(),
                path: artifact_root.join(&variant.path),
                supported_triples: triples,
            });
        }
    }

    Ok(tools)
}

/// Insert a tool under the name-merge rules
///
/// A vended entry with an empty triple list never overwrites an existing
/// entry; same-name vended entries with non-empty lists accumulate triples.
fn insert_tool(tools: &mut BTreeMap<String, AccessibleTool>, new: AccessibleTool) {
    use std::collections::btree_map::Entry;

    let name = new.name().to_string();
    match tools.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(new);
        }
        Entry::Occupied(mut slot) => match (slot.get_mut(), new) {
            (
                AccessibleTool::Vended {
                    path: existing_path,
                    supported_triples: existing_triples,
                    ..
                },
                AccessibleTool::Vended {
                    path,
                    supported_triples: new_triples,
                    ..
                },
            ) => {
                if new_triples.is_empty() {
                    // Unrestricted duplicate loses to whatever is already there.
                } else if existing_triples.is_empty() {
                    *existing_path = path;
                    *existing_triples = new_triples;
                } else {
                    existing_triples.extend(new_triples);
                }
            }
            (existing, new) => {
                tracing::debug!("duplicate tool name; keeping {:?} over {:?}", existing, new);
            }
        },
    }
}

/// Resolve the broker's output into absolute paths
///
/// Built tools go through the caller's resolver; a `None` answer omits the
/// tool. Vended tools already carry absolute paths.
pub fn resolve_tools(
    tools: BTreeMap<String, AccessibleTool>,
    resolver: &BuiltToolResolver<'_>,
) -> AccessibleToolMap {
    let mut resolved = AccessibleToolMap::new();
    for (name, tool) in tools {
        match tool {
            AccessibleTool::Built { executable, .. } => {
                if let Some(path) = resolver(&name, &executable) {
                    resolved.insert(
                        name,
                        ResolvedTool {
                            path,
                            supported_triples: None,
                            origin: ToolOrigin::Built,
                        },
                    );
                } else {
                    tracing::debug!(tool = %name, "built tool not available; omitting");
                }
            }
            AccessibleTool::Vended {
                path,
                supported_triples,
                ..
            } => {
                resolved.insert(
                    name,
                    ResolvedTool {
                        path,
                        supported_triples: Some(supported_triples),
                        origin: ToolOrigin::Vended,
                    },
                );
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BuildConfiguration, Platform, ResolvedProduct};
    use crate::utils::fs::InMemoryFileSystem;
    use pretty_assertions::assert_eq;

    fn environment() -> BuildEnvironment {
        BuildEnvironment {
            platform: Platform::Linux,
            configuration: BuildConfiguration::Debug,
        }
    }

    fn executable(name: &str) -> Arc<ResolvedModule> {
        Arc::new(ResolvedModule {
            name: name.to_string(),
            kind: ModuleKind::Executable,
            directory: PathBuf::from("/pkg").join(name),
            source_files: vec![],
            dependencies: vec![],
        })
    }

    fn plugin_with(dependencies: Vec<Dependency>) -> ResolvedModule {
        ResolvedModule {
            name: "gen-plugin".to_string(),
            kind: ModuleKind::Plugin,
            directory: PathBuf::from("/pkg/Plugins/gen-plugin"),
            source_files: vec![],
            dependencies,
        }
    }

    #[test]
    fn test_strip_triple_version() {
        assert_eq!(
            strip_triple_version("x86_64-apple-macosx12.0"),
            "x86_64-apple-macosx"
        );
        assert_eq!(
            strip_triple_version("aarch64-unknown-linux-gnu"),
            "aarch64-unknown-linux-gnu"
        );
        assert_eq!(strip_triple_version("arm64-apple-macosx"), "arm64-apple-macosx");
    }

    #[tokio::test]
    async fn test_executable_dependency_becomes_built_tool() {
        let plugin = plugin_with(vec![Dependency::Module {
            module: executable("codegen"),
            platforms: vec![],
        }]);
        let fs = InMemoryFileSystem::new();
        let tools = accessible_tools(&plugin, &environment(), "aarch64-unknown-linux-gnu", &fs)
            .await
            .unwrap();
        assert_eq!(
            tools["codegen"],
            AccessibleTool::Built {
                name: "codegen".to_string(),
                executable: PathBuf::from("codegen"),
            }
        );
    }

    #[tokio::test]
    async fn test_product_dependency_requires_single_executable() {
        let product = Arc::new(ResolvedProduct {
            name: "bundle".to_string(),
            modules: vec![],
        });
        let plugin = plugin_with(vec![Dependency::Product {
            product,
            platforms: vec![],
        }]);
        let fs = InMemoryFileSystem::new();
        let result =
            accessible_tools(&plugin, &environment(), "aarch64-unknown-linux-gnu", &fs).await;
        assert!(matches!(result, Err(HostError::NoSuchProduct(name)) if name == "bundle"));
    }

    #[tokio::test]
    async fn test_binary_dependency_filters_by_host_triple() {
        let fs = InMemoryFileSystem::new();
        fs.seed(
            "/artifacts/kit/info.json",
            br#"{
                "schemaVersion": "1.0",
                "artifacts": {
                    "kit": {
                        "type": "executable",
                        "variants": [
                            {"path": "kit-arm/bin/kit", "supportedTriples": ["aarch64-unknown-linux-gnu"]},
                            {"path": "kit-x86/bin/kit", "supportedTriples": ["x86_64-unknown-linux-gnu"]}
                        ]
                    }
                }
            }"#,
        );
        let binary = Arc::new(ResolvedModule {
            name: "kit".to_string(),
            kind: ModuleKind::Binary {
                artifact_path: PathBuf::from("/artifacts/kit/info.json"),
            },
            directory: PathBuf::from("/artifacts/kit"),
            source_files: vec![],
            dependencies: vec![],
        });
        let plugin = plugin_with(vec![Dependency::Module {
            module: binary,
            platforms: vec![],
        }]);

        let tools = accessible_tools(&plugin, &environment(), "aarch64-unknown-linux-gnu", &fs)
            .await
            .unwrap();
        match &tools["kit"] {
            AccessibleTool::Vended { path, supported_triples, .. } => {
                assert_eq!(path, &PathBuf::from("/artifacts/kit/kit-arm/bin/kit"));
                assert_eq!(supported_triples, &vec!["aarch64-unknown-linux-gnu".to_string()]);
            }
            other => panic!("unexpected tool: {other:?}"),
        }
    }

    #[test]
    fn test_unrestricted_vended_entry_never_wins() {
        // An empty-triples entry followed by a restricted one: the
        // restricted entry replaces it entirely.
        let mut tools = BTreeMap::new();
        insert_tool(
            &mut tools,
            AccessibleTool::Vended {
                name: "x".to_string(),
                path: PathBuf::from("/a"),
                supported_triples: vec![],
            },
        );
        insert_tool(
            &mut tools,
            AccessibleTool::Vended {
                name: "x".to_string(),
                path: PathBuf::from("/b"),
                supported_triples: vec!["arm64".to_string()],
            },
        );
        assert_eq!(tools.len(), 1);
        match &tools["x"] {
            AccessibleTool::Vended { path, supported_triples, .. } => {
                assert_eq!(path, &PathBuf::from("/b"));
                assert_eq!(supported_triples, &vec!["arm64".to_string()]);
            }
            other => panic!("unexpected tool: {other:?}"),
        }

        // And in the opposite order the unrestricted entry is dropped.
        let mut tools = BTreeMap::new();
        insert_tool(
            &mut tools,
            AccessibleTool::Vended {
                name: "x".to_string(),
                path: PathBuf::from("/b"),
                supported_triples: vec!["arm64".to_string()],
            },
        );
        insert_tool(
            &mut tools,
            AccessibleTool::Vended {
                name: "x".to_string(),
                path: PathBuf::from("/a"),
                supported_triples: vec![],
            },
        );
        match &tools["x"] {
            AccessibleTool::Vended { path, .. } => assert_eq!(path, &PathBuf::from("/b")),
            other => panic!("unexpected tool: {other:?}"),
        }
    }

    #[test]
    fn test_same_name_restricted_entries_accumulate() {
        let mut tools = BTreeMap::new();
        insert_tool(
            &mut tools,
            AccessibleTool::Vended {
                name: "x".to_string(),
                path: PathBuf::from("/a"),
                supported_triples: vec!["arm64-apple-macosx".to_string()],
            },
        );
        insert_tool(
            &mut tools,
            AccessibleTool::Vended {
                name: "x".to_string(),
                path: PathBuf::from("/b"),
                supported_triples: vec!["x86_64-apple-macosx".to_string()],
            },
        );
        match &tools["x"] {
            AccessibleTool::Vended { supported_triples, .. } => {
                assert_eq!(
                    supported_triples,
                    &vec![
                        "arm64-apple-macosx".to_string(),
                        "x86_64-apple-macosx".to_string()
                    ]
                );
            }
            other => panic!("unexpected tool: {other:?}"),
        }
    }

    #[test]
    fn test_resolver_omits_unavailable_built_tools() {
        let mut tools = BTreeMap::new();
        insert_tool(
            &mut tools,
            AccessibleTool::Built {
                name: "gone".to_string(),
                executable: PathBuf::from("gone"),
            },
        );
        insert_tool(
            &mut tools,
            AccessibleTool::Built {
                name: "here".to_string(),
                executable: PathBuf::from("here"),
            },
        );
        let resolved = resolve_tools(tools, &|name, relative| {
            (name == "here").then(|| PathBuf::from("/products").join(relative))
        });
        assert!(!resolved.contains_key("gone"));
        assert_eq!(resolved["here"].path, PathBuf::from("/products/here"));
        assert_eq!(resolved["here"].origin, ToolOrigin::Built);
    }
}
