//! Dependency graph and ordering

use crate::error::{PlanError, Result};
use crate::model::Stack;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Directed graph: each id maps to the ids it references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
    /// Ids this node depends on
    pub fn dependencies(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }
}

/// Descriptor ids with every dependency before its dependents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub order: Vec<String>,
}

impl Plan {
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|o| o == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Build the graph from every reference in the stack
#[instrument(skip(stack), fields(stack = %stack.name()))]
pub fn build_graph(stack: &Stack) -> Result<Graph> {
    let mut edges = BTreeMap::new();
    for descriptor in stack.iter() {
        let mut targets = BTreeSet::new();
        for target in descriptor.dependencies() {
            if !stack.contains(target) {
                return Err(PlanError::UnknownReference {
                    consumer: descriptor.id().to_string(),
                    target: target.to_string(),
                });
            }
            targets.insert(target.to_string());
        }
        edges.insert(descriptor.id().to_string(), targets);
    }

    let graph = Graph { edges };
    debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        "Built dependency graph"
    );
    Ok(graph)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order the graph, failing with the full cycle path if there is one
///
/// Ties are broken by id, so the result is the lexicographically smallest
/// valid order and identical across runs.
#[instrument(skip(graph))]
pub fn topo_sort(graph: &Graph) -> Result<Plan> {
    if let Some(path) = find_cycle(graph) {
        return Err(PlanError::Cycle { path });
    }

    let mut remaining: BTreeMap<&str, usize> = graph
        .edges
        .iter()
        .map(|(id, deps)| (id.as_str(), deps.len()))
        .collect();

    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (id, deps) in &graph.edges {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(id.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != graph.len() {
        // find_cycle already ruled this out
        let stuck: Vec<String> = remaining
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        return Err(PlanError::Cycle { path: stuck });
    }

    debug!(order = ?order, "Ordered plan");
    Ok(Plan { order })
}

fn find_cycle(graph: &Graph) -> Option<Vec<String>> {
    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    let mut stack: Vec<&str> = Vec::new();

    for start in graph.edges.keys() {
        if !marks.contains_key(start.as_str())
            && let Some(path) = visit(graph, start, &mut marks, &mut stack)
        {
            return Some(path);
        }
    }
    None
}

fn visit<'g>(
    graph: &'g Graph,
    id: &'g str,
    marks: &mut BTreeMap<&'g str, Mark>,
    stack: &mut Vec<&'g str>,
) -> Option<Vec<String>> {
    marks.insert(id, Mark::Visiting);
    stack.push(id);

    for dep in graph.edges.get(id).into_iter().flatten() {
        match marks.get(dep.as_str()) {
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|s| *s == dep.as_str()).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                path.push(dep.clone());
                return Some(path);
            }
            Some(Mark::Done) => {}
            None => {
                if let Some(path) = visit(graph, dep, marks, stack) {
                    return Some(path);
                }
            }
        }
    }

    stack.pop();
    marks.insert(id, Mark::Done);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Properties, PropertyValue, ResourceKind};

    fn role_with_refs(stack: &mut Stack, id: &str, refs: &[&str]) {
        let mut props = Properties::new();
        for (i, target) in refs.iter().enumerate() {
            props.insert(
                format!("dep{}", i),
                PropertyValue::reference(*target, "arn"),
            );
        }
        stack
            .define_resource(ResourceKind::Role, id, props, None)
            .unwrap();
    }

    #[test]
    fn test_order_respects_edges() {
        let mut stack = Stack::new("test");
        role_with_refs(&mut stack, "p1", &["s1", "r1"]);
        role_with_refs(&mut stack, "r1", &["s1"]);
        role_with_refs(&mut stack, "s1", &[]);
        role_with_refs(&mut stack, "a1", &[]);

        let graph = build_graph(&stack).unwrap();
        let plan = topo_sort(&graph).unwrap();
        assert_eq!(plan.order, vec!["a1", "s1", "r1", "p1"]);

        for id in graph.nodes() {
            for dep in graph.dependencies(id).unwrap() {
                assert!(plan.position(dep) < plan.position(id));
            }
        }
    }

    #[test]
    fn test_order_is_deterministic() {
        let mut stack = Stack::new("test");
        role_with_refs(&mut stack, "c", &["a"]);
        role_with_refs(&mut stack, "b", &["a"]);
        role_with_refs(&mut stack, "a", &[]);
        role_with_refs(&mut stack, "d", &["b", "c"]);

        let graph = build_graph(&stack).unwrap();
        let first = topo_sort(&graph).unwrap();
        for _ in 0..10 {
            assert_eq!(topo_sort(&graph).unwrap(), first);
        }
        assert_eq!(first.order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_cycle_reports_full_path() {
        let mut stack = Stack::new("test");
        role_with_refs(&mut stack, "a", &["b"]);
        role_with_refs(&mut stack, "b", &["c"]);
        role_with_refs(&mut stack, "c", &["a"]);
        role_with_refs(&mut stack, "z", &[]);

        let graph = build_graph(&stack).unwrap();
        let err = topo_sort(&graph).unwrap_err();
        match &err {
            PlanError::Cycle { path } => assert_eq!(path, &vec!["a", "b", "c", "a"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> c -> a");
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let mut stack = Stack::new("test");
        role_with_refs(&mut stack, "a", &["a"]);
        let graph = build_graph(&stack).unwrap();
        assert!(matches!(
            topo_sort(&graph),
            Err(PlanError::Cycle { path }) if path == vec!["a", "a"]
        ));
    }

    #[test]
    fn test_unknown_reference() {
        let mut stack = Stack::new("test");
        role_with_refs(&mut stack, "a", &["ghost"]);
        let err = build_graph(&stack).unwrap_err();
        assert!(matches!(
            err,
            PlanError::UnknownReference { consumer, target } if consumer == "a" && target == "ghost"
        ));
    }
}
