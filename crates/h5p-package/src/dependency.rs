//! Dependency resolution over package and stored libraries
//!
//! Two concerns live here: finding the constraints a package cannot
//! satisfy from its own libraries (pruned against host storage), and the
//! transitive usage walk that classifies each reachable library as
//! preloaded or dynamic for one content item.

use h5p_core::error::{Error, Result};
use h5p_core::host::HostAdapter;
use h5p_core::schema::ValidationIssue;
use h5p_core::types::{LibraryUsage, PackageManifest, ResolvedLibrarySet};
use h5p_core::version::Dependency;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Resolves dependency constraints for one package.
pub struct DependencyResolver;

impl DependencyResolver {
    /// Union of unmet constraints across every library's three
    /// dependency lists and the manifest's two, keyed by machine name.
    ///
    /// A constraint satisfied by a same-major/minor library inside the
    /// package is not missing. Redundant declarations of the same
    /// missing dependency collapse to one entry.
    pub fn find_missing(
        libraries: &ResolvedLibrarySet,
        manifest: &PackageManifest,
    ) -> BTreeMap<String, Dependency> {
        let mut missing = BTreeMap::new();

        for library in libraries.values() {
            for (_, dependencies) in library.dependency_lists() {
                Self::collect_missing(dependencies, libraries, &mut missing);
            }
        }
        Self::collect_missing(&manifest.preloaded_dependencies, libraries, &mut missing);
        Self::collect_missing(&manifest.dynamic_dependencies, libraries, &mut missing);

        debug!(count = missing.len(), "unmet constraints inside the package");
        missing
    }

    fn collect_missing(
        dependencies: &[Dependency],
        libraries: &ResolvedLibrarySet,
        missing: &mut BTreeMap<String, Dependency>,
    ) {
        for dependency in dependencies {
            let satisfied = libraries
                .get(&dependency.machine_name)
                .map(|lib| lib.satisfies(dependency))
                .unwrap_or(false);
            if !satisfied {
                missing
                    .entry(dependency.machine_name.clone())
                    .or_insert_with(|| dependency.clone());
            }
        }
    }

    /// Drop entries the host confirms are already installed (lookup by
    /// machine name and exact major/minor).
    pub fn prune_installed(
        missing: &mut BTreeMap<String, Dependency>,
        host: &dyn HostAdapter,
    ) {
        missing.retain(|_, dependency| {
            let installed = host
                .get_library_id(
                    &dependency.machine_name,
                    dependency.major_version,
                    dependency.minor_version,
                )
                .is_some();
            if installed {
                debug!(%dependency, "constraint satisfied by host storage");
            }
            !installed
        });
    }

    /// Transitive usage walk for one content item.
    ///
    /// Starting from the manifest's dependency lists, recurse through
    /// each stored library's own preloaded/dynamic lists. Every machine
    /// name is visited exactly once; the first visit decides the
    /// preloaded classification. Recursion below a dynamic edge is fully
    /// dynamic, no matter how the child declares its own dependencies.
    pub fn resolve_usage(
        manifest: &PackageManifest,
        host: &dyn HostAdapter,
    ) -> Result<BTreeMap<String, LibraryUsage>> {
        let mut usage = BTreeMap::new();
        for dependency in &manifest.preloaded_dependencies {
            Self::visit(dependency, false, &mut usage, host)?;
        }
        for dependency in &manifest.dynamic_dependencies {
            Self::visit(dependency, true, &mut usage, host)?;
        }
        debug!(libraries = usage.len(), "usage resolution complete");
        Ok(usage)
    }

    fn visit(
        dependency: &Dependency,
        dynamic: bool,
        usage: &mut BTreeMap<String, LibraryUsage>,
        host: &dyn HostAdapter,
    ) -> Result<()> {
        if usage.contains_key(&dependency.machine_name) {
            return Ok(());
        }

        let library = host
            .load_library(
                &dependency.machine_name,
                dependency.major_version,
                dependency.minor_version,
            )
            .ok_or_else(|| Error::library_not_installed(dependency.clone()))?;

        usage.insert(
            dependency.machine_name.clone(),
            LibraryUsage {
                library: dependency.clone(),
                preloaded: !dynamic,
            },
        );

        for child in &library.preloaded_dependencies {
            Self::visit(child, dynamic, usage, host)?;
        }
        for child in &library.dynamic_dependencies {
            Self::visit(child, true, usage, host)?;
        }
        Ok(())
    }

    /// Preloaded edges inside one package must be acyclic and never
    /// self-referential. Dynamic and editor edges may form cycles at the
    /// graph level; they are bounded by once-only visitation instead.
    pub fn check_preloaded_acyclic(libraries: &ResolvedLibrarySet) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut graph = DiGraph::<&str, ()>::new();
        let mut nodes = HashMap::new();

        for name in libraries.keys() {
            let index = graph.add_node(name.as_str());
            nodes.insert(name.as_str(), index);
        }
        for (name, library) in libraries {
            for dependency in &library.preloaded_dependencies {
                if dependency.machine_name == *name {
                    issues.push(ValidationIssue::PreloadedCycle {
                        cycle: name.clone(),
                    });
                    continue;
                }
                // Only edges inside the package can cycle here
                if let Some(&target) = nodes.get(dependency.machine_name.as_str()) {
                    graph.add_edge(nodes[name.as_str()], target, ());
                }
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let name = graph[cycle.node_id()].to_string();
            warn!(library = %name, "preloaded dependency cycle in package");
            issues.push(ValidationIssue::PreloadedCycle { cycle: name });
        }
        issues
    }
}
