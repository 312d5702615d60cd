//! Foreign-key dependency graph and migration ordering.
//!
//! Tables must be created and populated with every table they reference
//! already in place, so FK constraints pointing at earlier tables always
//! resolve. The order comes from a depth-first post-order walk over the
//! dependency edges, implemented iteratively with an explicit stack and a
//! three-state mark per table. Cycles are tolerated: a dependency that is
//! still mid-visit is skipped, which breaks the chain at that edge.

use crate::source::TableSchema;
use std::collections::HashMap;
use tracing::{debug, info};

/// Directed dependency structure over the selected table set.
///
/// Maps each table to the tables it depends on through its foreign keys.
/// Edges to tables outside the set are dropped: the referenced table is
/// either already present in the target or a dangling reference, and neither
/// affects ordering.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Tables in selection order.
    tables: Vec<String>,

    /// Table -> in-set dependencies, FK discovery order, deduped.
    deps: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph from the selected tables and their schemas.
    pub fn build(tables: &[String], schemas: &HashMap<String, TableSchema>) -> Self {
        let mut deps: HashMap<String, Vec<String>> = HashMap::new();

        for table in tables {
            let table_deps = schemas
                .get(table)
                .map(|schema| {
                    schema
                        .referenced_tables()
                        .into_iter()
                        .filter(|dep| tables.contains(dep))
                        .collect()
                })
                .unwrap_or_default();
            deps.insert(table.clone(), table_deps);
        }

        Self {
            tables: tables.to_vec(),
            deps,
        }
    }

    /// Tables in selection order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// In-set dependencies of a table.
    pub fn dependencies_of(&self, table: &str) -> &[String] {
        self.deps.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.deps.values().map(Vec::len).sum()
    }
}

/// Visit state for the topological sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Ordered sequence of table names safe for creation and insertion.
///
/// For every edge A -> B (A depends on B) inside the set, B appears before A,
/// except where a cycle forced an arbitrary break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    order: Vec<String>,
}

impl MigrationPlan {
    /// Compute the migration order for a graph.
    ///
    /// Deterministic for a fixed graph: roots are visited in selection order
    /// and dependencies in FK discovery order. Every table appears exactly
    /// once, cycles or not.
    pub fn resolve(graph: &DependencyGraph) -> Self {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut order: Vec<String> = Vec::with_capacity(graph.tables().len());

        for root in graph.tables() {
            if marks.contains_key(root.as_str()) {
                continue;
            }

            // Frame: (table, index of the next dependency to visit).
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            marks.insert(root.as_str(), Mark::InProgress);

            while let Some(frame) = stack.last_mut() {
                let (table, next) = (frame.0, &mut frame.1);
                let deps = graph.dependencies_of(table);

                if *next < deps.len() {
                    let dep = deps[*next].as_str();
                    *next += 1;

                    match marks.get(dep) {
                        None => {
                            marks.insert(dep, Mark::InProgress);
                            stack.push((dep, 0));
                        }
                        Some(Mark::InProgress) => {
                            // Cycle: break it here, keep going.
                            debug!("Dependency cycle broken at {} -> {}", table, dep);
                        }
                        Some(Mark::Done) => {}
                    }
                } else {
                    marks.insert(table, Mark::Done);
                    order.push(table.to_string());
                    stack.pop();
                }
            }
        }

        info!(
            "Resolved migration order for {} tables ({} edges)",
            order.len(),
            graph.edge_count()
        );
        Self { order }
    }

    /// Tables in migration order.
    pub fn tables(&self) -> &[String] {
        &self.order
    }

    /// Number of tables in the plan.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl IntoIterator for MigrationPlan {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}
