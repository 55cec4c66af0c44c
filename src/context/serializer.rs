// ! Context serializer
// !
// ! Flattens the live module graph into the dense id-keyed tables of
// ! [`WireInput`]. Each table interns its entries, so serializing the same
// ! path, module or package twice yields the same id. Ids are stable only
// ! within a single serializer instance and never across sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::{HostError, HostResult};
use crate::graph::{
    BuildEnvironment, Dependency, ModuleGraph, ModuleKind, Project, ProjectTarget,
    ResolvedModule, ResolvedPackage, ResolvedProduct,
};
use crate::protocol::input::{
    PackageId, PathId, ProductId, ProjectId, ProjectTargetId, TargetId, WireInput, WirePackage,
    WirePath, WireProduct, WireProject, WireProjectTarget, WireTarget, WireTargetKind, WireTool,
    WireToolSource,
};
use crate::tools::{AccessibleToolMap, ResolvedTool, ToolOrigin};

/// Builds a [`WireInput`] snapshot from a resolved module graph
///
/// The serializer walks the graph lazily: only entities reachable from the
/// ids the caller asks for end up in the tables.
pub struct WireInputSerializer<'a> {
    graph: &'a ModuleGraph,
    environment: BuildEnvironment,

    paths: Vec<WirePath>,
    path_ids: HashMap<PathBuf, PathId>,
    targets: Vec<WireTarget>,
    target_ids: HashMap<usize, Option<TargetId>>,
    products: Vec<WireProduct>,
    product_ids: HashMap<usize, ProductId>,
    packages: Vec<WirePackage>,
    package_ids: HashMap<String, PackageId>,
    project_targets: Vec<WireProjectTarget>,
    project_target_ids: HashMap<usize, ProjectTargetId>,
    projects: Vec<WireProject>,
    project_ids: HashMap<usize, ProjectId>,
}

impl<'a> WireInputSerializer<'a> {
    /// Create a serializer for one session over the given graph
    pub fn new(graph: &'a ModuleGraph, environment: BuildEnvironment) -> Self {
        Self {
            graph,
            environment,
            paths: Vec::new(),
            path_ids: HashMap::new(),
            targets: Vec::new(),
            target_ids: HashMap::new(),
            products: Vec::new(),
            product_ids: HashMap::new(),
            packages: Vec::new(),
            package_ids: HashMap::new(),
            project_targets: Vec::new(),
            project_target_ids: HashMap::new(),
            projects: Vec::new(),
            project_ids: HashMap::new(),
        }
    }

    /// Intern an absolute path, splitting it into base id + subpath
    pub fn serialize_path(&mut self, path: &Path) -> HostResult<PathId> {
        if !path.is_absolute() {
            return Err(HostError::serialization(format!(
                "cannot serialize relative path '{}'",
                path.display()
            )));
        }
        if let Some(id) = self.path_ids.get(path) {
            return Ok(*id);
        }

        let entry = match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => {
                let base_id = self.serialize_path(parent)?;
                WirePath {
                    base_id: Some(base_id),
                    subpath: name.to_string_lossy().into_owned(),
                }
            }
            // Filesystem root
            _ => WirePath {
                base_id: None,
                subpath: path.to_string_lossy().into_owned(),
            },
        };

        let id = PathId(self.paths.len() as u32);
        self.paths.push(entry);
        self.path_ids.insert(path.to_path_buf(), id);
        Ok(id)
    }

    /// Serialize a module, yielding `None` for kinds with no wire form
    ///
    /// Binary and plugin modules have no source representation the plugin
    /// side can use; callers that require a target id must treat `None` as
    /// a hard failure.
    pub fn serialize_module(
        &mut self,
        module: &Arc<ResolvedModule>,
    ) -> HostResult<Option<TargetId>> {
        let key = Arc::as_ptr(module) as usize;
        if let Some(id) = self.target_ids.get(&key) {
            return Ok(*id);
        }

        let kind = match module.kind {
            ModuleKind::Library => WireTargetKind::Library,
            ModuleKind::Executable => WireTargetKind::Executable,
            ModuleKind::Test => WireTargetKind::Test,
            ModuleKind::Binary { .. } | ModuleKind::Plugin => {
                self.target_ids.insert(key, None);
                return Ok(None);
            }
        };

        // Reserve the slot before recursing so the id order matches the
        // discovery order even for deep dependency chains.
        let id = TargetId(self.targets.len() as u32);
        self.targets.push(WireTarget {
            name: module.name.clone(),
            kind,
            directory_id: PathId(0),
            source_file_ids: Vec::new(),
            dependency_ids: Vec::new(),
        });
        self.target_ids.insert(key, Some(id));

        let directory_id = self.serialize_path(&module.directory)?;
        let mut source_file_ids = Vec::with_capacity(module.source_files.len());
        for file in &module.source_files {
            source_file_ids.push(self.serialize_path(file)?);
        }

        let mut dependency_ids = Vec::new();
        let environment = self.environment;
        for dependency in module.dependencies.iter().filter(|d| d.satisfies(&environment)) {
            match dependency {
                Dependency::Module { module, .. } => {
                    if let Some(dep_id) = self.serialize_module(module)? {
                        dependency_ids.push(dep_id);
                    }
                }
                Dependency::Product { product, .. } => {
                    for member in &product.modules {
                        if let Some(dep_id) = self.serialize_module(member)? {
                            dependency_ids.push(dep_id);
                        }
                    }
                }
            }
        }

        let entry = &mut self.targets[id.0 as usize];
        entry.directory_id = directory_id;
        entry.source_file_ids = source_file_ids;
        entry.dependency_ids = dependency_ids;
        Ok(Some(id))
    }

    /// Serialize a product and its member targets
    pub fn serialize_product(&mut self, product: &Arc<ResolvedProduct>) -> HostResult<ProductId> {
        let key = Arc::as_ptr(product) as usize;
        if let Some(id) = self.product_ids.get(&key) {
            return Ok(*id);
        }

        let mut target_ids = Vec::new();
        for module in &product.modules {
            if let Some(id) = self.serialize_module(module)? {
                target_ids.push(id);
            }
        }

        let id = ProductId(self.products.len() as u32);
        self.products.push(WireProduct {
            name: product.name.clone(),
            target_ids,
        });
        self.product_ids.insert(key, id);
        Ok(id)
    }

    /// Serialize a package, its targets and its products
    pub fn serialize_package(&mut self, package: &Arc<ResolvedPackage>) -> HostResult<PackageId> {
        if let Some(id) = self.package_ids.get(&package.identity) {
            return Ok(*id);
        }

        let directory_id = self.serialize_path(&package.directory)?;
        let mut target_ids = Vec::new();
        for module in &package.modules {
            if let Some(id) = self.serialize_module(module)? {
                target_ids.push(id);
            }
        }
        let mut product_ids = Vec::new();
        for product in &package.products {
            product_ids.push(self.serialize_product(product)?);
        }

        let id = PackageId(self.packages.len() as u32);
        self.packages.push(WirePackage {
            identity: package.identity.clone(),
            display_name: package.display_name.clone(),
            directory_id,
            target_ids,
            product_ids,
        });
        self.package_ids.insert(package.identity.clone(), id);
        Ok(id)
    }

    /// Serialize a project target
    pub fn serialize_project_target(
        &mut self,
        target: &Arc<ProjectTarget>,
    ) -> HostResult<Option<ProjectTargetId>> {
        let key = Arc::as_ptr(target) as usize;
        if let Some(id) = self.project_target_ids.get(&key) {
            return Ok(Some(*id));
        }

        let mut source_file_ids = Vec::with_capacity(target.source_files.len());
        for file in &target.source_files {
            source_file_ids.push(self.serialize_path(file)?);
        }

        let id = ProjectTargetId(self.project_targets.len() as u32);
        self.project_targets.push(WireProjectTarget {
            name: target.name.clone(),
            source_file_ids,
        });
        self.project_target_ids.insert(key, id);
        Ok(Some(id))
    }

    /// Serialize a project and its targets
    pub fn serialize_project(&mut self, project: &Arc<Project>) -> HostResult<ProjectId> {
        let key = Arc::as_ptr(project) as usize;
        if let Some(id) = self.project_ids.get(&key) {
            return Ok(*id);
        }

        let directory_id = self.serialize_path(&project.directory)?;
        let mut target_ids = Vec::new();
        for target in &project.targets {
            if let Some(id) = self.serialize_project_target(target)? {
                target_ids.push(id);
            }
        }

        let id = ProjectId(self.projects.len() as u32);
        self.projects.push(WireProject {
            name: project.name.clone(),
            directory_id,
            target_ids,
        });
        self.project_ids.insert(key, id);
        Ok(id)
    }

    /// The graph this serializer reads from
    pub fn graph(&self) -> &ModuleGraph {
        self.graph
    }

    /// Consume the serializer and assemble the final snapshot
    ///
    /// Serializes the plugin work directory, the tool search directories
    /// and the accessible-tool map, then freezes all tables.
    pub fn finish(
        mut self,
        plugin_work_directory: &Path,
        tool_search_directories: &[PathBuf],
        accessible_tools: &AccessibleToolMap,
    ) -> HostResult<WireInput> {
        let plugin_work_directory_id = self.serialize_path(plugin_work_directory)?;
        let mut tool_search_directory_ids = Vec::with_capacity(tool_search_directories.len());
        for directory in tool_search_directories {
            tool_search_directory_ids.push(self.serialize_path(directory)?);
        }

        let mut tools = std::collections::BTreeMap::new();
        for (name, tool) in accessible_tools {
            let ResolvedTool {
                path,
                supported_triples,
                origin,
            } = tool;
            let path_id = self.serialize_path(path)?;
            tools.insert(
                name.clone(),
                WireTool {
                    path_id,
                    supported_triples: supported_triples.clone(),
                    source: match origin {
                        ToolOrigin::Built => WireToolSource::Built,
                        ToolOrigin::Vended => WireToolSource::Vended,
                    },
                },
            );
        }

        Ok(WireInput {
            paths: self.paths,
            targets: self.targets,
            products: self.products,
            packages: self.packages,
            project_targets: self.project_targets,
            projects: self.projects,
            plugin_work_directory_id,
            tool_search_directory_ids,
            accessible_tools: tools,
        })
    }
}
