// ! Flattened context snapshot sent to plugins at session start
// !
// ! The live package/module graph is flattened into dense id-keyed tables so
// ! the wire payload stays acyclic and bounded, and the plugin side can
// ! resolve references without walking pointers. Ids are indices into the
// ! backing tables and are only stable within a single session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Id Types
// ============================================================================

/// Index into the serialized path table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathId(pub u32);

/// Index into the serialized target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u32);

/// Index into the serialized product table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u32);

/// Index into the serialized package table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId(pub u32);

/// Index into the serialized project table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub u32);

/// Index into the serialized project-target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectTargetId(pub u32);

// ============================================================================
// Table Entries
// ============================================================================

/// A path expressed as an optional base id plus a subpath
///
/// Sharing common prefixes through base ids keeps the table compact when
/// many paths live under the same few directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePath {
    /// Path this entry is relative to (absent for roots)
    #[serde(rename = "baseId", skip_serializing_if = "Option::is_none")]
    pub base_id: Option<PathId>,
    /// Path fragment appended to the base
    pub subpath: String,
}

/// Kind of a serialized target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireTargetKind {
    Library,
    Executable,
    Test,
    Binary,
    Plugin,
}

/// A target row in the serialized context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTarget {
    /// Target name
    pub name: String,
    /// Kind of target
    pub kind: WireTargetKind,
    /// Directory holding the target's sources
    #[serde(rename = "directoryId")]
    pub directory_id: PathId,
    /// Source file ids
    #[serde(rename = "sourceFileIds")]
    pub source_file_ids: Vec<PathId>,
    /// Ids of targets this one depends on in the current environment
    #[serde(rename = "dependencyIds")]
    pub dependency_ids: Vec<TargetId>,
}

/// A product row in the serialized context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProduct {
    /// Product name
    pub name: String,
    /// Ids of targets composing the product
    #[serde(rename = "targetIds")]
    pub target_ids: Vec<TargetId>,
}

/// A package row in the serialized context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePackage {
    /// Stable package identity
    pub identity: String,
    /// Manifest display name
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Package root directory
    #[serde(rename = "directoryId")]
    pub directory_id: PathId,
    /// Ids of the package's targets
    #[serde(rename = "targetIds")]
    pub target_ids: Vec<TargetId>,
    /// Ids of the package's products
    #[serde(rename = "productIds")]
    pub product_ids: Vec<ProductId>,
}

/// A project-target row in the serialized context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProjectTarget {
    /// Target name
    pub name: String,
    /// Source file ids
    #[serde(rename = "sourceFileIds")]
    pub source_file_ids: Vec<PathId>,
}

/// A project row in the serialized context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProject {
    /// Project name
    pub name: String,
    /// Project root directory
    #[serde(rename = "directoryId")]
    pub directory_id: PathId,
    /// Ids of the project's targets
    #[serde(rename = "targetIds")]
    pub target_ids: Vec<ProjectTargetId>,
}

/// Where an accessible tool comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireToolSource {
    /// Produced by the enclosing build
    Built,
    /// Shipped inside a binary artifact
    Vended,
}

/// An accessible tool restated with serialized path ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTool {
    /// Resolved absolute path of the tool
    #[serde(rename = "pathId")]
    pub path_id: PathId,
    /// Triples the tool supports (absent for built tools)
    #[serde(rename = "supportedTriples", skip_serializing_if = "Option::is_none")]
    pub supported_triples: Option<Vec<String>>,
    /// Tool origin
    pub source: WireToolSource,
}

// ============================================================================
// Snapshot
// ============================================================================

/// The flattened context snapshot sent once at session start
///
/// Invariant: every id referenced by the accompanying action message
/// resolves in one of these tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireInput {
    /// Path table
    pub paths: Vec<WirePath>,
    /// Target table
    pub targets: Vec<WireTarget>,
    /// Product table
    pub products: Vec<WireProduct>,
    /// Package table
    pub packages: Vec<WirePackage>,
    /// Project-target table
    #[serde(rename = "projectTargets")]
    pub project_targets: Vec<WireProjectTarget>,
    /// Project table
    pub projects: Vec<WireProject>,
    /// Id of the plugin's writable work directory
    #[serde(rename = "pluginWorkDirectoryId")]
    pub plugin_work_directory_id: PathId,
    /// Ids of the directories searched for tools
    #[serde(rename = "toolSearchDirectoryIds")]
    pub tool_search_directory_ids: Vec<PathId>,
    /// Accessible tools keyed by name
    #[serde(rename = "accessibleTools")]
    pub accessible_tools: BTreeMap<String, WireTool>,
}

impl Default for WirePath {
    fn default() -> Self {
        Self {
            base_id: None,
            subpath: String::new(),
        }
    }
}

impl Default for PathId {
    fn default() -> Self {
        PathId(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        assert_eq!(serde_json::to_string(&PathId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&TargetId(0)).unwrap(), "0");
    }

    #[test]
    fn test_input_round_trip() {
        let input = WireInput {
            paths: vec![
                WirePath {
                    base_id: None,
                    subpath: "/work".to_string(),
                },
                WirePath {
                    base_id: Some(PathId(0)),
                    subpath: "out".to_string(),
                },
            ],
            plugin_work_directory_id: PathId(1),
            tool_search_directory_ids: vec![PathId(0)],
            accessible_tools: [(
                "gen".to_string(),
                WireTool {
                    path_id: PathId(1),
                    supported_triples: None,
                    source: WireToolSource::Built,
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let json = serde_json::to_string(&input).unwrap();
        let back: WireInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn test_wire_field_names() {
        let input = WireInput::default();
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("pluginWorkDirectoryId").is_some());
        assert!(json.get("toolSearchDirectoryIds").is_some());
        assert!(json.get("accessibleTools").is_some());
        assert!(json.get("projectTargets").is_some());
    }
}
