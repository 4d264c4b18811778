use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use revolve_domain::{Resource, ResourceDependency, ResourceId};

use crate::error::GraphError;

/// A validated, cycle-free dependency graph over a set of resources.
///
/// Edges run `depends_on -> resource`: a resource cannot leave
/// `dependencies_pending` until every resource it depends on is healthy.
#[derive(Debug)]
pub struct ResolvedGraph {
    /// Resources in an order where every dependency precedes its dependents.
    pub topo_order: Vec<ResourceId>,
    forward: HashMap<ResourceId, Vec<ResourceId>>,
    reverse: HashMap<ResourceId, Vec<ResourceId>>,
}

impl ResolvedGraph {
    /// Resources that `resource_id` depends on (must be healthy first).
    pub fn dependencies_of(&self, resource_id: &ResourceId) -> &[ResourceId] {
        self.forward.get(resource_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Resources that depend on `resource_id` (must be deleted first, when
    /// `resource_id` itself is being deleted — `ensure_forward_dependencies_deleted`).
    pub fn dependents_of(&self, resource_id: &ResourceId) -> &[ResourceId] {
        self.reverse.get(resource_id).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Validate a fully-loaded set of resources and their declared dependency
/// edges.
///
/// Checks:
/// 1. Duplicate resource ids
/// 2. Dangling dependencies (the `depends_on` resource exists in the set)
/// 3. Self-dependency
/// 4. Cycle detection
pub fn validate(
    resources: &[Resource],
    dependencies: &[ResourceDependency],
) -> Result<ResolvedGraph, GraphError> {
    let mut errors: Vec<GraphError> = Vec::new();

    let mut seen: HashSet<&ResourceId> = HashSet::new();
    for r in resources {
        if !seen.insert(&r.id) {
            errors.push(GraphError::DuplicateResourceId(r.id.clone()));
        }
    }

    let known: HashSet<&ResourceId> = resources.iter().map(|r| &r.id).collect();

    for dep in dependencies {
        if dep.resource_id == dep.depends_on {
            errors.push(GraphError::SelfDependency(dep.resource_id.clone()));
            continue;
        }
        if !known.contains(&dep.resource_id) {
            errors.push(GraphError::DanglingDependency {
                resource: dep.resource_id.clone(),
                depends_on: dep.depends_on.clone(),
            });
            continue;
        }
        if !known.contains(&dep.depends_on) {
            errors.push(GraphError::DanglingDependency {
                resource: dep.resource_id.clone(),
                depends_on: dep.depends_on.clone(),
            });
        }
    }

    if !errors.is_empty() {
        if errors.len() == 1 {
            return Err(errors.remove(0));
        }
        return Err(GraphError::Multiple(errors));
    }

    let mut graph: DiGraph<&ResourceId, ()> = DiGraph::new();
    let node_map: HashMap<&ResourceId, NodeIndex> =
        resources.iter().map(|r| (&r.id, graph.add_node(&r.id))).collect();

    let mut forward: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();
    let mut reverse: HashMap<ResourceId, Vec<ResourceId>> = HashMap::new();

    for dep in dependencies {
        let from = node_map[&dep.depends_on];
        let to = node_map[&dep.resource_id];
        graph.add_edge(from, to, ());

        forward.entry(dep.resource_id.clone()).or_default().push(dep.depends_on.clone());
        reverse.entry(dep.depends_on.clone()).or_default().push(dep.resource_id.clone());
    }

    if is_cyclic_directed(&graph) {
        return Err(GraphError::CycleDetected);
    }

    let topo = petgraph::algo::toposort(&graph, None).map_err(|_| GraphError::CycleDetected)?;
    let topo_order = topo.into_iter().map(|idx| graph[idx].clone()).collect();

    Ok(ResolvedGraph {
        topo_order,
        forward,
        reverse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use revolve_domain::ProjectId;

    fn make_resource(id: &str) -> Resource {
        let mut r = Resource::new(ProjectId::new("proj"), "vpc_network", id, serde_json::json!({}));
        r.id = ResourceId::new(id);
        r
    }

    fn dep(resource: &str, depends_on: &str) -> ResourceDependency {
        ResourceDependency {
            resource_id: ResourceId::new(resource),
            depends_on: ResourceId::new(depends_on),
        }
    }

    #[test]
    fn valid_graph_passes() {
        let resources = vec![make_resource("vpc"), make_resource("subnet")];
        let deps = vec![dep("subnet", "vpc")];
        let result = validate(&resources, &deps);
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn dangling_dependency_detected() {
        let resources = vec![make_resource("subnet")];
        let deps = vec![dep("subnet", "nonexistent-vpc")];
        let result = validate(&resources, &deps);
        assert!(matches!(result, Err(GraphError::DanglingDependency { .. })));
    }

    #[test]
    fn self_dependency_detected() {
        let resources = vec![make_resource("vpc")];
        let deps = vec![dep("vpc", "vpc")];
        let result = validate(&resources, &deps);
        assert!(matches!(result, Err(GraphError::SelfDependency(_))));
    }

    #[test]
    fn cycle_detected() {
        let resources = vec![make_resource("a"), make_resource("b")];
        let deps = vec![dep("a", "b"), dep("b", "a")];
        let result = validate(&resources, &deps);
        assert!(matches!(result, Err(GraphError::CycleDetected)));
    }

    #[test]
    fn topo_sort_order_and_adjacency() {
        let resources = vec![make_resource("vpc"), make_resource("subnet"), make_resource("instance")];
        let deps = vec![dep("subnet", "vpc"), dep("instance", "subnet")];
        let graph = validate(&resources, &deps).unwrap();

        let pos_vpc = graph.topo_order.iter().position(|n| n.as_str() == "vpc").unwrap();
        let pos_subnet = graph.topo_order.iter().position(|n| n.as_str() == "subnet").unwrap();
        let pos_instance = graph.topo_order.iter().position(|n| n.as_str() == "instance").unwrap();
        assert!(pos_vpc < pos_subnet);
        assert!(pos_subnet < pos_instance);

        assert_eq!(graph.dependencies_of(&ResourceId::new("subnet")), &[ResourceId::new("vpc")]);
        assert_eq!(graph.dependents_of(&ResourceId::new("vpc")), &[ResourceId::new("subnet")]);
    }

    #[test]
    fn duplicate_resource_id_detected() {
        let resources = vec![make_resource("vpc"), make_resource("vpc")];
        let result = validate(&resources, &[]);
        assert!(matches!(result, Err(GraphError::DuplicateResourceId(_))));
    }
}
