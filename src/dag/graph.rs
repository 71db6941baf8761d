// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Control, DfsEvent, depth_first_search};

use crate::dag::spec::ServiceSpec;
use crate::errors::{Result, StackError};
use crate::types::ServiceName;

/// Validated dependency graph over a stack's services.
///
/// Holds the specs in declaration order plus the stable start order
/// computed by [`validate_declaration`].
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    specs: Vec<ServiceSpec>,
    index: HashMap<ServiceName, usize>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Validate `specs` and build the graph.
    ///
    /// Fails with [`StackError::DuplicateName`], [`StackError::UnknownDependency`]
    /// or [`StackError::Cycle`], checked in that order.
    pub fn build(specs: Vec<ServiceSpec>) -> Result<Self> {
        let mut specs = specs;
        for spec in specs.iter_mut() {
            dedup_preserving_order(&mut spec.depends_on);
        }

        let declared: Vec<(&str, &[ServiceName])> = specs
            .iter()
            .map(|s| (s.name.as_str(), s.depends_on.as_slice()))
            .collect();
        let order = validate_declaration(&declared)?;

        let index = specs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        Ok(Self {
            specs,
            index,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Look up a service by name.
    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    /// Services in declaration order.
    pub fn specs(&self) -> &[ServiceSpec] {
        &self.specs
    }

    /// Start sequence: every dependency before its dependents, ties broken by
    /// declaration order.
    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.specs[i].name.as_str()).collect()
    }

    /// Shutdown sequence: the exact reverse of [`topological_order`](Self::topological_order).
    pub fn shutdown_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .rev()
            .map(|&i| self.specs[i].name.as_str())
            .collect()
    }
}

/// Check a declaration given as `(name, depends_on)` pairs and return the
/// stable topological order as indices into `declared`.
///
/// Shared by [`DependencyGraph::build`] and manifest validation, so a bad
/// manifest is rejected at load time with the same errors.
pub fn validate_declaration(declared: &[(&str, &[ServiceName])]) -> Result<Vec<usize>> {
    let graph = dependency_graph(declared)?;

    if let Some(cycle) = find_cycle(&graph) {
        return Err(StackError::Cycle(
            cycle.into_iter().map(|n| graph[n].to_string()).collect(),
        ));
    }

    Ok(stable_topological_order(&graph))
}

/// Edge direction is dependent -> dependency: `api.depends_on = ["db"]`
/// gives `api -> db`. Node indices follow declaration order.
fn dependency_graph<'a>(declared: &[(&'a str, &[ServiceName])]) -> Result<DiGraph<&'a str, ()>> {
    let mut graph = DiGraph::with_capacity(declared.len(), 0);
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(declared.len());
    for (name, _) in declared.iter() {
        let node = graph.add_node(*name);
        if index.insert(*name, node).is_some() {
            return Err(StackError::DuplicateName(name.to_string()));
        }
    }

    for (name, depends_on) in declared.iter() {
        let from = index[*name];
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(depends_on.len());
        for dep in depends_on.iter() {
            let Some(&to) = index.get(dep.as_str()) else {
                return Err(StackError::UnknownDependency {
                    service: name.to_string(),
                    dependency: dep.clone(),
                });
            };
            if seen.insert(to) {
                targets.push(to);
            }
        }
        // `neighbors` yields the most recently added edge first.
        for &to in targets.iter().rev() {
            graph.add_edge(from, to, ());
        }
    }

    Ok(graph)
}

/// Depth-first search along dependency edges, in declaration order. Returns
/// the nodes on the recursion stack from the target of the first back edge
/// onwards.
fn find_cycle(graph: &DiGraph<&str, ()>) -> Option<Vec<NodeIndex>> {
    let mut stack: Vec<NodeIndex> = Vec::new();

    let outcome = depth_first_search(graph, graph.node_indices(), |event| match event {
        DfsEvent::Discover(node, _) => {
            stack.push(node);
            Control::Continue
        }
        DfsEvent::Finish(_, _) => {
            stack.pop();
            Control::Continue
        }
        DfsEvent::BackEdge(_, target) => {
            let from = stack.iter().position(|&n| n == target).unwrap_or(0);
            Control::Break(stack[from..].to_vec())
        }
        _ => Control::Continue,
    });

    outcome.break_value()
}

/// Kahn's algorithm with a min-heap on declaration index. Assumes `graph` is
/// acyclic.
fn stable_topological_order(graph: &DiGraph<&str, ()>) -> Vec<usize> {
    let mut remaining: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors(n).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = graph
        .node_indices()
        .filter(|n| remaining[n.index()] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node.index());
        for dependent in graph.neighbors_directed(node, Direction::Incoming) {
            remaining[dependent.index()] -= 1;
            if remaining[dependent.index()] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}

fn dedup_preserving_order(names: &mut Vec<ServiceName>) {
    let mut seen = HashSet::new();
    names.retain(|n| seen.insert(n.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(decl: &[(&str, Vec<&str>)]) -> Result<Vec<String>> {
        let owned: Vec<(&str, Vec<ServiceName>)> = decl
            .iter()
            .map(|(n, d)| (*n, d.iter().map(|s| s.to_string()).collect()))
            .collect();
        let borrowed: Vec<(&str, &[ServiceName])> =
            owned.iter().map(|(n, d)| (*n, d.as_slice())).collect();
        let order = validate_declaration(&borrowed)?;
        Ok(order.into_iter().map(|i| decl[i].0.to_string()).collect())
    }

    #[test]
    fn ties_follow_declaration_order() {
        let order = check(&[
            ("web", vec!["api"]),
            ("cache", vec![]),
            ("api", vec!["db", "cache"]),
            ("db", vec![]),
        ])
        .unwrap();
        assert_eq!(order, vec!["cache", "db", "api", "web"]);
    }

    #[test]
    fn two_node_cycle_is_reported_in_traversal_order() {
        match check(&[("a", vec!["b"]), ("b", vec!["a"])]) {
            Err(StackError::Cycle(cycle)) => assert_eq!(cycle, vec!["a", "b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        match check(&[("a", vec!["a"])]) {
            Err(StackError::Cycle(cycle)) => assert_eq!(cycle, vec!["a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn cycle_excludes_the_acyclic_prefix() {
        match check(&[
            ("x", vec!["a"]),
            ("a", vec!["b"]),
            ("b", vec!["c"]),
            ("c", vec!["a"]),
        ]) {
            Err(StackError::Cycle(cycle)) => assert_eq!(cycle, vec!["a", "b", "c"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn dependencies_are_followed_in_declaration_order() {
        // Both `b` and `c` close a loop through `a`; `b` is declared first.
        match check(&[
            ("a", vec!["b", "c"]),
            ("b", vec!["a"]),
            ("c", vec!["a"]),
        ]) {
            Err(StackError::Cycle(cycle)) => assert_eq!(cycle, vec!["a", "b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn duplicates_are_reported_before_unknown_dependencies() {
        match check(&[("a", vec!["ghost"]), ("a", vec![])]) {
            Err(StackError::DuplicateName(name)) => assert_eq!(name, "a"),
            other => panic!("expected duplicate name, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_names_both_sides() {
        match check(&[("api", vec!["db"])]) {
            Err(StackError::UnknownDependency { service, dependency }) => {
                assert_eq!(service, "api");
                assert_eq!(dependency, "db");
            }
            other => panic!("expected unknown dependency, got {other:?}"),
        }
    }

    #[test]
    fn repeated_dependency_entries_are_harmless() {
        let order = check(&[("db", vec![]), ("api", vec!["db", "db"])]).unwrap();
        assert_eq!(order, vec!["db", "api"]);
    }

    fn spec(name: &str, deps: &[&str]) -> ServiceSpec {
        let launcher = std::sync::Arc::new(crate::exec::CommandLauncher::new(name, "true"));
        ServiceSpec::new(name, launcher).depends_on(deps.iter().copied())
    }

    #[test]
    fn built_graph_exposes_start_and_shutdown_order() {
        let graph = DependencyGraph::build(vec![
            spec("web", &["api"]),
            spec("api", &["db", "cache", "db"]),
            spec("worker", &["db"]),
            spec("db", &[]),
            spec("cache", &[]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 5);
        assert_eq!(
            graph.topological_order(),
            vec!["db", "worker", "cache", "api", "web"]
        );
        assert_eq!(
            graph.shutdown_order(),
            vec!["web", "api", "cache", "worker", "db"]
        );
        assert_eq!(graph.get("api").unwrap().depends_on, vec!["db", "cache"]);
        assert!(graph.get("ghost").is_none());
    }
}
