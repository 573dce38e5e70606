// src/catalog/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::catalog::model::{Catalog, ResourceId};
use crate::errors::CatalogError;

/// Run structural validation against a decoded catalog.
///
/// This checks:
/// - every resource id is nonzero
/// - ids are unique within the catalog
/// - all `dependencies` refer to resources present in the catalog
/// - no resource depends on itself
/// - the dependency graph has no cycles
///
/// Any violation aborts the run before a single resource is applied.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), CatalogError> {
    ensure_unique_ids(catalog)?;
    ensure_dependencies_resolve(catalog)?;
    ensure_acyclic(catalog)?;
    Ok(())
}

fn ensure_unique_ids(catalog: &Catalog) -> Result<(), CatalogError> {
    let mut seen = std::collections::HashSet::new();
    for resource in &catalog.resources {
        if resource.id == 0 {
            return Err(CatalogError::ZeroId {
                comment: resource.comment.clone(),
            });
        }
        if !seen.insert(resource.id) {
            return Err(CatalogError::DuplicateId(resource.id));
        }
    }
    Ok(())
}

fn ensure_dependencies_resolve(catalog: &Catalog) -> Result<(), CatalogError> {
    let known: std::collections::HashSet<ResourceId> =
        catalog.resources.iter().map(|r| r.id).collect();

    for resource in &catalog.resources {
        for &dep in &resource.dependencies {
            if dep == resource.id {
                return Err(CatalogError::SelfDependency(resource.id));
            }
            if !known.contains(&dep) {
                return Err(CatalogError::UnknownDependency {
                    id: resource.id,
                    dep,
                });
            }
        }
    }
    Ok(())
}

fn ensure_acyclic(catalog: &Catalog) -> Result<(), CatalogError> {
    // Edge direction: dependency -> dependent, so a topological order is an
    // apply order. `toposort` fails on the first cycle it finds and names a
    // participating node.
    let mut graph: DiGraphMap<ResourceId, ()> = DiGraphMap::new();

    for resource in &catalog.resources {
        graph.add_node(resource.id);
    }
    for resource in &catalog.resources {
        for &dep in &resource.dependencies {
            graph.add_edge(dep, resource.id, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(CatalogError::Cycle(cycle.node_id())),
    }
}
