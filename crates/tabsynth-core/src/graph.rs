use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::resolve::ResolvedTable;

/// Summary of the table dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Dependency ordering for a set of tables.
///
/// `levels` groups tables whose references are all satisfied by earlier
/// levels; tables inside one level do not depend on each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencySummary,
    pub topo_order: Option<Vec<String>>,
    pub levels: Option<Vec<Vec<String>>>,
    pub cycle: Option<Vec<String>>,
}

/// Build a deterministic dependency report (referenced tables first).
pub fn build_dependency_report(tables: &[ResolvedTable]) -> DependencyReport {
    let graph = build_adjacency(tables);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = DependencySummary { nodes, edges };

    match toposort_levels(&graph) {
        Ok(levels) => DependencyReport {
            summary,
            topo_order: Some(levels.iter().flatten().cloned().collect()),
            levels: Some(levels),
            cycle: None,
        },
        Err(cycle) => DependencyReport {
            summary,
            topo_order: None,
            levels: None,
            cycle: Some(cycle),
        },
    }
}

/// Edges run from a referenced table to the tables that depend on it.
fn build_adjacency(tables: &[ResolvedTable]) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table in tables {
        graph.entry(table.name.clone()).or_default();
        for (_, reference) in table.foreign_keys() {
            graph
                .entry(reference.table.clone())
                .or_default()
                .insert(table.name.clone());
        }
    }

    graph
}

fn toposort_levels(
    graph: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<Vec<String>>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = graph.keys().map(|node| (node.as_str(), 0)).collect();
    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then_some(*node))
        .collect();
    let mut levels = Vec::new();
    let mut placed = 0;

    while !ready.is_empty() {
        let mut next = BTreeSet::new();
        for node in &ready {
            if let Some(targets) = graph.get(*node) {
                for target in targets {
                    if let Some(count) = indegree.get_mut(target.as_str()) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next.insert(target.as_str());
                        }
                    }
                }
            }
        }
        placed += ready.len();
        levels.push(ready.iter().map(|node| node.to_string()).collect());
        ready = next.into_iter().collect();
    }

    if placed == indegree.len() {
        return Ok(levels);
    }

    // Unplaced nodes are cycle members plus tables downstream of a cycle;
    // peel off the latter until every remaining node feeds another one.
    let mut remaining: BTreeSet<&str> = indegree
        .into_iter()
        .filter_map(|(node, count)| (count > 0).then_some(node))
        .collect();
    loop {
        let sinks: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|node| {
                !graph.get(*node).is_some_and(|targets| {
                    targets
                        .iter()
                        .any(|target| remaining.contains(target.as_str()))
                })
            })
            .collect();
        if sinks.is_empty() {
            break;
        }
        for sink in sinks {
            remaining.remove(sink);
        }
    }
    Err(remaining.into_iter().map(str::to_string).collect())
}
