//! Wire schema round-trip coverage
//!
//! Every message kind in the schema is encoded and decoded once, and the
//! decoded value must equal the original. Schema stability matters more
//! than the exact JSON text, but a few spot checks pin the names that form
//! the plugin-side ABI.

use std::collections::HashMap;
use std::path::PathBuf;

use anvil_plugin_rs::protocol::codec;
use anvil_plugin_rs::protocol::input::*;
use anvil_plugin_rs::protocol::messages::*;
use pretty_assertions::assert_eq;

fn sample_context() -> WireInput {
    WireInput {
        paths: vec![
            WirePath {
                base_id: None,
                subpath: "/".to_string(),
            },
            WirePath {
                base_id: Some(PathId(0)),
                subpath: "work".to_string(),
            },
        ],
        targets: vec![WireTarget {
            name: "t".to_string(),
            kind: WireTargetKind::Library,
            directory_id: PathId(1),
            source_file_ids: vec![PathId(1)],
            dependency_ids: vec![],
        }],
        products: vec![WireProduct {
            name: "tool".to_string(),
            target_ids: vec![TargetId(0)],
        }],
        packages: vec![WirePackage {
            identity: "p".to_string(),
            display_name: "P".to_string(),
            directory_id: PathId(0),
            target_ids: vec![TargetId(0)],
            product_ids: vec![ProductId(0)],
        }],
        project_targets: vec![],
        projects: vec![],
        plugin_work_directory_id: PathId(1),
        tool_search_directory_ids: vec![PathId(0)],
        accessible_tools: [(
            "gen".to_string(),
            WireTool {
                path_id: PathId(1),
                supported_triples: Some(vec!["aarch64-unknown-linux-gnu".to_string()]),
                source: WireToolSource::Vended,
            },
        )]
        .into_iter()
        .collect(),
    }
}

fn host_messages() -> Vec<HostToPlugin> {
    vec![
        HostToPlugin::CreateBuildToolCommands {
            context: sample_context(),
            root_package_id: PackageId(0),
            target_id: TargetId(0),
            generated_source_ids: vec![PathId(1)],
            generated_resource_ids: vec![],
        },
        HostToPlugin::CreateProjectBuildToolCommands {
            context: sample_context(),
            root_project_id: ProjectId(0),
            target_id: ProjectTargetId(0),
            generated_source_ids: vec![],
            generated_resource_ids: vec![PathId(0)],
        },
        HostToPlugin::PerformCommand {
            context: sample_context(),
            root_package_id: PackageId(0),
            arguments: vec!["--fix".to_string()],
        },
        HostToPlugin::PerformProjectCommand {
            context: sample_context(),
            root_project_id: ProjectId(0),
            arguments: vec![],
        },
        HostToPlugin::BuildOperationResponse {
            result: BuildResult {
                succeeded: true,
                log_text: "ok".to_string(),
                built_artifacts: vec![BuiltArtifact {
                    path: PathBuf::from("/products/tool"),
                    kind: BuiltArtifactKind::Executable,
                }],
            },
        },
        HostToPlugin::TestOperationResponse {
            result: TestResult {
                succeeded: false,
                code_coverage_data_file: Some(PathBuf::from("/cov/data.json")),
                test_targets: vec![TestTargetResult {
                    name: "t-tests".to_string(),
                    test_cases: vec![TestCaseResult {
                        name: "case".to_string(),
                        passed: false,
                    }],
                }],
            },
        },
        HostToPlugin::SymbolGraphResponse {
            result: SymbolGraphResult {
                directory_path: "file:///sg".to_string(),
            },
        },
        HostToPlugin::ErrorResponse {
            error: "boom".to_string(),
        },
    ]
}

fn plugin_messages() -> Vec<PluginToHost> {
    vec![
        PluginToHost::EmitDiagnostic {
            severity: WireDiagnosticSeverity::Error,
            message: "broken".to_string(),
            file: Some("/pkg/src/lib.rs".to_string()),
            line: Some(12),
        },
        PluginToHost::EmitProgress {
            message: "generating".to_string(),
        },
        PluginToHost::DefineBuildCommand {
            configuration: WireCommandConfiguration {
                version: COMMAND_CONFIGURATION_VERSION,
                display_name: "gen".to_string(),
                executable: PathBuf::from("/u/gen"),
                arguments: vec!["--in".to_string()],
                environment: HashMap::from([("K".to_string(), "V".to_string())]),
                working_directory: Some(PathBuf::from("/work")),
            },
            input_files: vec![PathBuf::from("/x")],
            output_files: vec![PathBuf::from("/y")],
        },
        PluginToHost::DefinePrebuildCommand {
            configuration: WireCommandConfiguration {
                version: COMMAND_CONFIGURATION_VERSION,
                display_name: "prepare".to_string(),
                executable: PathBuf::from("/u/prepare"),
                arguments: vec![],
                environment: HashMap::new(),
                working_directory: None,
            },
            output_files_directory: PathBuf::from("/work/out"),
        },
        PluginToHost::BuildOperationRequest {
            subset: BuildSubset::Target {
                name: "t".to_string(),
            },
            parameters: BuildParameters {
                configuration: BuildRequestConfiguration::Release,
                log_verbosity: BuildLogVerbosity::Verbose,
                echo_logs: true,
                other_flags: vec!["--foo".to_string()],
            },
        },
        PluginToHost::TestOperationRequest {
            subset: TestSubset::Filtered {
                filters: vec!["t.case".to_string()],
            },
            parameters: TestParameters {
                enable_code_coverage: true,
            },
        },
        PluginToHost::SymbolGraphRequest {
            target_name: "t".to_string(),
            options: SymbolGraphOptions {
                minimum_access_level: "public".to_string(),
                include_synthesized: true,
                include_spi: false,
                emit_extension_blocks: true,
            },
        },
    ]
}

#[test]
fn test_host_messages_round_trip() {
    for original in host_messages() {
        let bytes = codec::encode(&original).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let back: HostToPlugin = serde_json::from_value(json).unwrap();
        assert_eq!(back, original);
    }
}

#[test]
fn test_plugin_messages_round_trip() {
    for original in plugin_messages() {
        let bytes = serde_json::to_vec(&original).unwrap();
        let back = codec::decode(&bytes).unwrap();
        assert_eq!(back, original);
    }
}

#[test]
fn test_abi_variant_spellings() {
    // These names are shared with the plugin-side shim; a rename here is a
    // breaking protocol change.
    let bytes = codec::encode(&HostToPlugin::PerformCommand {
        context: WireInput::default(),
        root_package_id: PackageId(0),
        arguments: vec![],
    })
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json.get("performCommand").is_some());
    assert!(json["performCommand"].get("rootPackageId").is_some());

    let message = PluginToHost::DefineBuildCommand {
        configuration: WireCommandConfiguration {
            version: 2,
            display_name: "gen".to_string(),
            executable: PathBuf::from("/u/gen"),
            arguments: vec![],
            environment: HashMap::new(),
            working_directory: None,
        },
        input_files: vec![],
        output_files: vec![],
    };
    let json = serde_json::to_value(&message).unwrap();
    assert!(json.get("defineBuildCommand").is_some());
    assert_eq!(json["defineBuildCommand"]["configuration"]["version"], 2);
    assert!(json["defineBuildCommand"].get("inputFiles").is_some());
}

#[test]
fn test_context_table_round_trip() {
    let context = sample_context();
    let json = serde_json::to_string(&context).unwrap();
    let back: WireInput = serde_json::from_str(&json).unwrap();
    assert_eq!(back, context);
}
