// ! Plugin host facade
// !
// ! Single entry point tying the pieces together: collect tools, flatten
// ! context, ensure a compiled executable, run the session, hand the
// ! outcome back. Exposes a native async form and a completion-callback
// ! adapter over it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::core::command::{
    GeneratedFileKind, PluginInvocationResult, PrebuildCommandResult,
};
use crate::core::error::{HostError, HostResult};
use crate::graph::{
    BuildEnvironment, Dependency, ModuleGraph, Project, ProjectTarget, ResolvedModule,
    ResolvedPackage,
};
use crate::host::runner::PluginScriptRunner;
use crate::protocol::codec;
use crate::protocol::input::{PackageId, PathId, ProjectId, ProjectTargetId, TargetId};
use crate::protocol::messages::HostToPlugin;
use crate::sandbox::launcher::default_writable_directories;
use crate::sandbox::policy::SandboxPolicy;
use crate::session::delegate::{AccumulatingDelegate, PluginInvocationDelegate};
use crate::session::invocation::InvocationSession;
use crate::context::serializer::WireInputSerializer;
use crate::tools::{AccessibleToolMap, BuiltToolResolver, accessible_tools, resolve_tools};
use crate::utils::fs::FileSystem;

/// The entry point a plugin invocation selects
#[derive(Debug, Clone)]
pub enum PluginAction {
    /// Create build commands for a package target
    CreateBuildToolCommands {
        /// Package the target belongs to
        package: Arc<ResolvedPackage>,
        /// Target the plugin generates for
        target: Arc<ResolvedModule>,
        /// Already-generated source paths from earlier plugins
        generated_sources: Vec<PathBuf>,
        /// Already-generated resource paths from earlier plugins
        generated_resources: Vec<PathBuf>,
    },
    /// Create build commands for a project target
    CreateProjectBuildToolCommands {
        /// Project the target belongs to
        project: Arc<Project>,
        /// Target the plugin generates for
        target: Arc<ProjectTarget>,
        /// Already-generated source paths from earlier plugins
        generated_sources: Vec<PathBuf>,
        /// Already-generated resource paths from earlier plugins
        generated_resources: Vec<PathBuf>,
    },
    /// Run a user command against a package
    PerformCommand {
        /// Package the command runs against
        package: Arc<ResolvedPackage>,
        /// Free-form arguments passed through to the plugin
        arguments: Vec<String>,
    },
    /// Run a user command against a project
    PerformProjectCommand {
        /// Project the command runs against
        project: Arc<Project>,
        /// Free-form arguments passed through to the plugin
        arguments: Vec<String>,
    },
}

/// Everything one invocation needs, bundled for both call forms
#[derive(Clone)]
pub struct InvocationRequest {
    /// The plugin module to run
    pub plugin: Arc<ResolvedModule>,
    /// The entry point to invoke
    pub action: PluginAction,
    /// Environment conditional dependencies are filtered by
    pub environment: BuildEnvironment,
    /// Writable work directory for the plugin (created if missing)
    pub work_directory: PathBuf,
    /// Directories searched for tools the plugin invokes
    pub tool_search_directories: Vec<PathBuf>,
    /// Resolved accessible tools, keyed by name
    pub accessible_tools: AccessibleToolMap,
    /// Tools version the plugin declared
    pub tools_version: String,
    /// Sandbox the plugin process runs under
    pub policy: SandboxPolicy,
}

// Action ids are resolved before the serializer is consumed by `finish`.
enum EncodedAction {
    CreateBuildTool {
        package: PackageId,
        target: TargetId,
        sources: Vec<PathId>,
        resources: Vec<PathId>,
    },
    CreateProjectBuildTool {
        project: ProjectId,
        target: ProjectTargetId,
        sources: Vec<PathId>,
        resources: Vec<PathId>,
    },
    Perform {
        package: PackageId,
        arguments: Vec<String>,
    },
    PerformProject {
        project: ProjectId,
        arguments: Vec<String>,
    },
}

/// The facade callers invoke plugins through
pub struct PluginHost {
    graph: Arc<ModuleGraph>,
    runner: Arc<dyn PluginScriptRunner>,
    fs: Arc<dyn FileSystem>,
}

impl PluginHost {
    /// Create a host over a resolved graph
    pub fn new(
        graph: Arc<ModuleGraph>,
        runner: Arc<dyn PluginScriptRunner>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self { graph, runner, fs }
    }

    /// Run one plugin invocation to completion
    ///
    /// The returned bool is whether the plugin exited cleanly: exit code
    /// zero and the session not cut short. Everything the plugin produced
    /// reaches the caller through `delegate`, in wire arrival order.
    pub async fn invoke(
        &self,
        request: &InvocationRequest,
        delegate: Arc<dyn PluginInvocationDelegate>,
    ) -> HostResult<bool> {
        self.fs
            .create_directory(&request.work_directory, true)
            .await?;

        let initial_message = self.encode_initial_message(request)?;

        let session = Arc::new(InvocationSession::new(
            delegate,
            &request.accessible_tools,
        ));
        let exit_code = self
            .runner
            .run(
                &request.plugin.source_files,
                &request.plugin.directory,
                &request.plugin.name,
                initial_message,
                &request.tools_version,
                &request.work_directory,
                &request.policy,
                session.clone(),
            )
            .await?;

        let outcome = session.finalize(exit_code);
        Ok(outcome.exited_cleanly)
    }

    /// Completion-callback form of [`invoke`](Self::invoke)
    ///
    /// A thin adapter over the async form: the work is spawned on `handle`
    /// and `completion` runs there exactly once, after the child has exited
    /// and its streams are drained.
    pub fn invoke_with_completion(
        self: &Arc<Self>,
        request: InvocationRequest,
        delegate: Arc<dyn PluginInvocationDelegate>,
        handle: tokio::runtime::Handle,
        completion: Box<dyn FnOnce(HostResult<bool>) + Send + 'static>,
    ) {
        let host = self.clone();
        handle.spawn(async move {
            let result = host.invoke(&request, delegate).await;
            completion(result);
        });
    }

    /// Resolve tools, run the plugin, and package the full result
    ///
    /// Convenience wrapper for callers that want the captured output
    /// rather than a delegate: resolves the plugin's owning package,
    /// derives the accessible tools for `host_triple`, installs an
    /// accumulating delegate and times the run.
    #[allow(clippy::too_many_arguments)]
    pub async fn invoke_module(
        &self,
        plugin: &Arc<ResolvedModule>,
        action: PluginAction,
        environment: BuildEnvironment,
        work_directory: PathBuf,
        host_triple: &str,
        tools_version: &str,
        extra_tool_search_directories: Vec<PathBuf>,
        resolver: &BuiltToolResolver<'_>,
    ) -> HostResult<PluginInvocationResult> {
        let _package = self
            .graph
            .package_for_module(plugin)
            .ok_or_else(|| HostError::CouldNotFindPackage(plugin.name.clone()))?;

        let tools = accessible_tools(plugin, &environment, host_triple, self.fs.as_ref()).await?;
        let accessible_tools = resolve_tools(tools, resolver);

        let mut tool_search_directories = extra_tool_search_directories;
        for tool in accessible_tools.values() {
            if let Some(parent) = tool.path.parent() {
                let parent = parent.to_path_buf();
                if !tool_search_directories.contains(&parent) {
                    tool_search_directories.push(parent);
                }
            }
        }

        let policy = SandboxPolicy {
            writable_directories: default_writable_directories(&work_directory),
            tool_search_directories: tool_search_directories.clone(),
            ..Default::default()
        };

        let request = InvocationRequest {
            plugin: plugin.clone(),
            action,
            environment,
            work_directory,
            tool_search_directories,
            accessible_tools,
            tools_version: tools_version.to_string(),
            policy,
        };

        let delegate = Arc::new(AccumulatingDelegate::new());
        let started = Instant::now();
        let succeeded = self.invoke(&request, delegate.clone()).await?;
        let duration = started.elapsed();

        Ok(PluginInvocationResult {
            succeeded,
            duration,
            diagnostics: delegate.diagnostics(),
            text_output: String::from_utf8_lossy(&delegate.output()).into_owned(),
            build_commands: delegate.build_commands(),
            prebuild_commands: delegate.prebuild_commands(),
        })
    }

    /// Modules that use plugins, with the plugins each uses
    ///
    /// Pure query over the graph: walks every module's dependencies
    /// satisfying `environment` and keeps those that are plugin modules.
    /// Modules without plugin dependencies are omitted.
    pub fn plugins_per_module(
        &self,
        environment: &BuildEnvironment,
    ) -> Vec<(Arc<ResolvedModule>, Vec<Arc<ResolvedModule>>)> {
        let mut result = Vec::new();
        for module in self.graph.modules() {
            let plugins: Vec<Arc<ResolvedModule>> = module
                .dependencies_satisfying(environment)
                .filter_map(|dependency| match dependency {
                    Dependency::Module { module, .. } if module.is_plugin() => {
                        Some(module.clone())
                    }
                    _ => None,
                })
                .collect();
            if !plugins.is_empty() {
                result.push((module.clone(), plugins));
            }
        }
        result
    }

    fn encode_initial_message(&self, request: &InvocationRequest) -> HostResult<Vec<u8>> {
        let mut serializer = WireInputSerializer::new(&self.graph, request.environment);

        let encoded = match &request.action {
            PluginAction::CreateBuildToolCommands {
                package,
                target,
                generated_sources,
                generated_resources,
            } => {
                let package_id = serializer.serialize_package(package)?;
                let target_id = serializer.serialize_module(target)?.ok_or_else(|| {
                    HostError::serialization(format!(
                        "target '{}' has no wire representation",
                        target.name
                    ))
                })?;
                EncodedAction::CreateBuildTool {
                    package: package_id,
                    target: target_id,
                    sources: serialize_paths(&mut serializer, generated_sources)?,
                    resources: serialize_paths(&mut serializer, generated_resources)?,
                }
            }
            PluginAction::CreateProjectBuildToolCommands {
                project,
                target,
                generated_sources,
                generated_resources,
            } => {
                let project_id = serializer.serialize_project(project)?;
                let target_id = serializer.serialize_project_target(target)?.ok_or_else(|| {
                    HostError::serialization(format!(
                        "project target '{}' has no wire representation",
                        target.name
                    ))
                })?;
                EncodedAction::CreateProjectBuildTool {
                    project: project_id,
                    target: target_id,
                    sources: serialize_paths(&mut serializer, generated_sources)?,
                    resources: serialize_paths(&mut serializer, generated_resources)?,
                }
            }
            PluginAction::PerformCommand { package, arguments } => EncodedAction::Perform {
                package: serializer.serialize_package(package)?,
                arguments: arguments.clone(),
            },
            PluginAction::PerformProjectCommand { project, arguments } => {
                EncodedAction::PerformProject {
                    project: serializer.serialize_project(project)?,
                    arguments: arguments.clone(),
                }
            }
        };

        let context = serializer.finish(
            &request.work_directory,
            &request.tool_search_directories,
            &request.accessible_tools,
        )?;

        let message = match encoded {
            EncodedAction::CreateBuildTool {
                package,
                target,
                sources,
                resources,
            } => HostToPlugin::CreateBuildToolCommands {
                context,
                root_package_id: package,
                target_id: target,
                generated_source_ids: sources,
                generated_resource_ids: resources,
            },
            EncodedAction::CreateProjectBuildTool {
                project,
                target,
                sources,
                resources,
            } => HostToPlugin::CreateProjectBuildToolCommands {
                context,
                root_project_id: project,
                target_id: target,
                generated_source_ids: sources,
                generated_resource_ids: resources,
            },
            EncodedAction::Perform { package, arguments } => HostToPlugin::PerformCommand {
                context,
                root_package_id: package,
                arguments,
            },
            EncodedAction::PerformProject { project, arguments } => {
                HostToPlugin::PerformProjectCommand {
                    context,
                    root_project_id: project,
                    arguments,
                }
            }
        };

        codec::encode(&message)
    }
}

fn serialize_paths(
    serializer: &mut WireInputSerializer<'_>,
    paths: &[PathBuf],
) -> HostResult<Vec<PathId>> {
    let mut ids = Vec::with_capacity(paths.len());
    for path in paths {
        ids.push(serializer.serialize_path(path)?);
    }
    Ok(ids)
}

/// Aggregate generated files from completed invocations
///
/// Collects the output paths of every captured build command and every
/// prebuild result, and classifies each through the host's file-rules
/// resolver into derived sources and derived resources.
pub fn compute_plugin_generated_files(
    results: &[PluginInvocationResult],
    prebuild_results: &[PrebuildCommandResult],
    classify: impl Fn(&Path) -> GeneratedFileKind,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut sources = Vec::new();
    let mut resources = Vec::new();

    let outputs = results
        .iter()
        .flat_map(|r| r.build_commands.iter())
        .flat_map(|c| c.output_files.iter())
        .chain(prebuild_results.iter().flat_map(|r| r.output_files.iter()));

    for output in outputs {
        match classify(output) {
            GeneratedFileKind::Source => sources.push(output.clone()),
            GeneratedFileKind::Resource => resources.push(output.clone()),
            GeneratedFileKind::Ignored => {}
        }
    }

    (sources, resources)
}
