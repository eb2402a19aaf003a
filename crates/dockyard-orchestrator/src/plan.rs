//! Deployment plans — dependency graph, cycle detection, execution order.
//!
//! `create_plan` runs two independent cycle checks: a depth-first walk with
//! a recursion stack, then Kahn's algorithm, whose order must cover every
//! node. Zero in-degree ties are broken FIFO by input order, so the same
//! resource list always yields the same order.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dockyard_core::Configuration;

use crate::error::{OrchestratorError, OrchestratorResult};

/// One node of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub provider: String,
    #[serde(default, alias = "dependsOn")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub configuration: Configuration,
}

impl DeploymentResource {
    pub fn new(id: &str, resource_type: &str, provider: &str, depends_on: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            resource_type: resource_type.to_string(),
            provider: provider.to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            configuration: Configuration::new(),
        }
    }
}

/// Adjacency map: resource id → ids it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Node ids in input order.
    nodes: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    fn from_resources(resources: &[DeploymentResource]) -> Self {
        let mut graph = Self::default();
        for resource in resources {
            graph.nodes.push(resource.id.clone());
            graph
                .edges
                .insert(resource.id.clone(), resource.depends_on.clone());
        }
        graph
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn dependencies(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Depth-first cycle check. Returns the first node found on the stack.
    fn find_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        self.nodes
            .iter()
            .find_map(|node| self.visit(node, &mut visited, &mut on_stack))
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> Option<String> {
        if on_stack.contains(node) {
            return Some(node.to_string());
        }
        if !visited.insert(node) {
            return None;
        }
        on_stack.insert(node);
        for dep in self.dependencies(node) {
            if let Some(cycle) = self.visit(dep, visited, on_stack) {
                return Some(cycle);
            }
        }
        on_stack.remove(node);
        None
    }

    /// Kahn's algorithm. Fails with the first input-order node left with
    /// residual in-degree.
    fn topological_order(&self) -> OrchestratorResult<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &self.nodes {
            let deps = self.dependencies(node);
            in_degree.insert(node.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(node.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree.get(n) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());
            for dependent in dependents.get(node).map(Vec::as_slice).unwrap_or_default() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .find(|n| in_degree.get(n.as_str()).is_some_and(|d| *d > 0))
                .cloned()
                .unwrap_or_default();
            return Err(OrchestratorError::CircularDependency(stuck));
        }
        Ok(order)
    }
}

/// An immutable, cycle-free execution sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    resources: Vec<DeploymentResource>,
    graph: DependencyGraph,
    order: Vec<String>,
}

impl Plan {
    /// Resources in input order.
    pub fn resources(&self) -> &[DeploymentResource] {
        &self.resources
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Topologically sorted resource ids.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn resource(&self, id: &str) -> Option<&DeploymentResource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Group the order into tiers: each resource lands one tier after its
    /// deepest dependency. Tier contents keep plan order.
    pub fn tiers(&self) -> Vec<Vec<String>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut tiers: Vec<Vec<String>> = Vec::new();
        for id in &self.order {
            let tier = self
                .graph
                .dependencies(id)
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id.as_str(), tier);
            if tiers.len() <= tier {
                tiers.resize_with(tier + 1, Vec::new);
            }
            tiers[tier].push(id.clone());
        }
        tiers
    }

    #[cfg(test)]
    pub(crate) fn from_parts(resources: Vec<DeploymentResource>, order: Vec<String>) -> Self {
        let graph = DependencyGraph::from_resources(&resources);
        Self {
            resources,
            graph,
            order,
        }
    }
}

/// Build a plan from a deployment's resources.
pub fn create_plan(resources: Vec<DeploymentResource>) -> OrchestratorResult<Plan> {
    let mut seen = HashSet::new();
    for resource in &resources {
        if !seen.insert(resource.id.as_str()) {
            return Err(OrchestratorError::DuplicateResource(resource.id.clone()));
        }
    }

    let graph = DependencyGraph::from_resources(&resources);
    if let Some(node) = graph.find_cycle() {
        return Err(OrchestratorError::CircularDependency(node));
    }

    for resource in &resources {
        if let Some(dep) = resource.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
            return Err(OrchestratorError::UnknownDependency {
                resource_id: resource.id.clone(),
                dependency: dep.clone(),
            });
        }
    }

    let order = graph.topological_order()?;
    debug!(?order, "computed execution order");
    info!(resources = order.len(), "deployment plan created");

    Ok(Plan {
        resources,
        graph,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(id: &str, deps: &[&str]) -> DeploymentResource {
        DeploymentResource::new(id, "server", "dry-run", deps)
    }

    #[test]
    fn dependency_comes_first() {
        let plan = create_plan(vec![res("db", &[]), res("web", &["db"])]).unwrap();
        assert_eq!(plan.order(), ["db", "web"]);
    }

    #[test]
    fn order_is_fifo_by_input_for_ties() {
        let plan = create_plan(vec![
            res("web", &["db", "cache"]),
            res("cache", &[]),
            res("dns", &[]),
            res("db", &[]),
        ])
        .unwrap();
        assert_eq!(plan.order(), ["cache", "dns", "db", "web"]);
    }

    #[test]
    fn every_resource_follows_its_dependencies() {
        let resources = vec![
            res("e", &["c", "d"]),
            res("d", &["b"]),
            res("c", &["a", "b"]),
            res("b", &[]),
            res("a", &[]),
        ];
        let plan = create_plan(resources.clone()).unwrap();
        assert_eq!(plan.len(), resources.len());
        let pos = |id: &str| plan.order().iter().position(|o| o == id).unwrap();
        for r in &resources {
            for dep in &r.depends_on {
                assert!(pos(dep) < pos(&r.id), "{dep} must precede {}", r.id);
            }
        }
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let err = create_plan(vec![res("a", &["b"]), res("b", &["a"])]).unwrap_err();
        assert!(matches!(err, OrchestratorError::CircularDependency(ref n) if n == "a"));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = create_plan(vec![res("a", &[]), res("b", &["b"])]).unwrap_err();
        assert!(matches!(err, OrchestratorError::CircularDependency(ref n) if n == "b"));
    }

    #[test]
    fn deep_cycle_names_node_revisited_on_stack() {
        let err = create_plan(vec![
            res("root", &["x"]),
            res("x", &["y"]),
            res("y", &["z"]),
            res("z", &["x"]),
        ])
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::CircularDependency(ref n) if n == "x"));
    }

    #[test]
    fn kahn_pass_catches_residual_in_degree() {
        let graph = DependencyGraph::from_resources(&[res("a", &["b"]), res("b", &["a"])]);
        let err = graph.topological_order().unwrap_err();
        assert!(matches!(err, OrchestratorError::CircularDependency(ref n) if n == "a"));
    }

    #[test]
    fn duplicates_and_unknown_dependencies_are_rejected() {
        let err = create_plan(vec![res("a", &[]), res("a", &[])]).unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateResource(ref n) if n == "a"));

        let err = create_plan(vec![res("web", &["db"])]).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::UnknownDependency { ref resource_id, ref dependency }
                if resource_id == "web" && dependency == "db"
        ));
    }

    #[test]
    fn empty_deployment_yields_empty_plan() {
        let plan = create_plan(Vec::new()).unwrap();
        assert!(plan.is_empty());
        assert!(plan.tiers().is_empty());
    }

    #[test]
    fn tiers_group_independent_branches() {
        let plan = create_plan(vec![
            res("db", &[]),
            res("dns", &[]),
            res("api", &["db"]),
            res("web", &["api", "dns"]),
            res("worker", &["db"]),
        ])
        .unwrap();
        assert_eq!(
            plan.tiers(),
            vec![
                vec!["db".to_string(), "dns".to_string()],
                vec!["api".to_string(), "worker".to_string()],
                vec!["web".to_string()],
            ]
        );
    }

    #[test]
    fn deserializes_camel_case_depends_on() {
        let resource: DeploymentResource = serde_json::from_value(serde_json::json!({
            "id": "web",
            "type": "web-service",
            "provider": "vercel",
            "dependsOn": ["db"]
        }))
        .unwrap();
        assert_eq!(resource.depends_on, ["db"]);
        assert!(resource.configuration.is_empty());
    }
}
