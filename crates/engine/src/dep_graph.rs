//! Dependency graph for formula cells.
//!
//! Tracks, for every formula cell, the cells its formula reads and, indexed
//! from the other end, the cells that read it.
//!
//! # Edge Direction
//!
//! ```text
//! refs[B] ∋ A  means  "B reads A"
//! deps[A] ∋ B  means  the same edge, seen from A
//! ```

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::CycleError;
use crate::position::Position;

/// Bidirectional adjacency over cell positions.
///
/// # Invariants
///
/// 1. **Edge symmetry:** A ∈ refs[B] iff B ∈ deps[A].
/// 2. **No dangling entries:** empty sets are removed, not stored.
/// 3. **No duplicate edges:** set semantics enforced by FxHashSet.
/// 4. **Acyclicity:** `find_cycle` is consulted before every edge commit,
///    so the reference relation never contains a cycle.
#[derive(Debug, Default, Clone)]
pub struct DepGraph {
    /// For each formula cell, the cells its formula reads.
    refs: FxHashMap<Position, FxHashSet<Position>>,

    /// For each referenced cell, the formula cells that read it.
    deps: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells read by `cell`'s formula.
    pub fn referenced(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.refs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Formula cells that read `cell`.
    pub fn dependents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.deps
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True when at least one formula reads `cell`.
    pub fn is_referenced(&self, cell: Position) -> bool {
        self.deps.contains_key(&cell)
    }

    /// Number of cells currently holding outgoing edges.
    pub fn formula_cell_count(&self) -> usize {
        self.refs.len()
    }

    /// Number of cells read by at least one formula.
    pub fn referenced_cell_count(&self) -> usize {
        self.deps.len()
    }

    /// Replace all outgoing edges of `cell` atomically.
    ///
    /// 1. Removes `cell` from all its old references' dependent sets
    /// 2. Clears `cell`'s reference set
    /// 3. Adds `cell` to all new references' dependent sets
    /// 4. Stores the new reference set
    ///
    /// Pass an empty set to clear the cell's edges.
    pub fn replace_edges(&mut self, cell: Position, new_refs: FxHashSet<Position>) {
        if let Some(old_refs) = self.refs.remove(&cell) {
            for referenced in old_refs {
                if let Some(readers) = self.deps.get_mut(&referenced) {
                    readers.remove(&cell);
                    // invariant: no empty sets stored
                    if readers.is_empty() {
                        self.deps.remove(&referenced);
                    }
                }
            }
        }

        if new_refs.is_empty() {
            return;
        }

        for &referenced in &new_refs {
            self.deps.entry(referenced).or_default().insert(cell);
        }
        self.refs.insert(cell, new_refs);
    }

    /// Clear all outgoing edges of `cell` (content is no longer a formula,
    /// or the cell is being removed). Incoming edges belong to the readers
    /// and stay put.
    pub fn clear_cell(&mut self, cell: Position) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Check whether assigning `target` a formula reading `candidate_refs`
    /// would close a cycle.
    ///
    /// Breadth-first traversal rooted at the candidate references, following
    /// current reference edges; fails iff `target` is reached. Runs against
    /// the graph as it stands, before any mutation, so a rejected assignment
    /// leaves no trace. O(V+E) over the reachable subgraph.
    pub fn find_cycle(&self, target: Position, candidate_refs: &[Position]) -> Option<CycleError> {
        if candidate_refs.contains(&target) {
            return Some(CycleError::self_reference(target));
        }

        // parent links reconstruct an actual reference chain for the report
        let mut parent: FxHashMap<Position, Position> = FxHashMap::default();
        let mut queue: VecDeque<Position> = VecDeque::new();
        for &start in candidate_refs {
            if !parent.contains_key(&start) {
                parent.insert(start, start);
                queue.push_back(start);
            }
        }

        while let Some(current) = queue.pop_front() {
            for referenced in self.referenced(current) {
                if referenced == target {
                    // target reads the chain head, the chain tail reads target
                    let mut upstream = vec![current];
                    let mut at = current;
                    while parent[&at] != at {
                        at = parent[&at];
                        upstream.push(at);
                    }
                    let mut cells = Vec::with_capacity(upstream.len() + 2);
                    cells.push(target);
                    cells.extend(upstream.into_iter().rev());
                    cells.push(target);
                    return Some(CycleError::cycle(cells));
                }
                if !parent.contains_key(&referenced) {
                    parent.insert(referenced, current);
                    queue.push_back(referenced);
                }
            }
        }

        None
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (cell, refs) in &self.refs {
            for referenced in refs {
                assert!(
                    self.deps
                        .get(referenced)
                        .map_or(false, |readers| readers.contains(cell)),
                    "missing dependent edge: {:?} should list {:?}",
                    referenced,
                    cell
                );
            }
        }

        for (cell, readers) in &self.deps {
            for reader in readers {
                assert!(
                    self.refs
                        .get(reader)
                        .map_or(false, |refs| refs.contains(cell)),
                    "missing reference edge: {:?} should list {:?}",
                    reader,
                    cell
                );
            }
        }

        for (cell, refs) in &self.refs {
            assert!(!refs.is_empty(), "empty reference set stored for {:?}", cell);
        }
        for (cell, readers) in &self.deps {
            assert!(!readers.is_empty(), "empty dependent set stored for {:?}", cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(a1: &str) -> Position {
        Position::from_a1(a1)
    }

    fn set(cells: &[Position]) -> FxHashSet<Position> {
        cells.iter().copied().collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = DepGraph::new();

        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.referenced_cell_count(), 0);
        assert!(!graph.is_referenced(pos("A1")));
        assert_eq!(graph.referenced(pos("A1")).count(), 0);
        assert_eq!(graph.dependents(pos("A1")).count(), 0);

        graph.assert_consistent();
    }

    #[test]
    fn test_single_edge() {
        // B1 reads A1
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.assert_consistent();

        assert_eq!(graph.referenced(pos("B1")).collect::<Vec<_>>(), vec![pos("A1")]);
        assert_eq!(graph.dependents(pos("A1")).collect::<Vec<_>>(), vec![pos("B1")]);
        assert!(graph.is_referenced(pos("A1")));
        assert!(!graph.is_referenced(pos("B1")));
    }

    #[test]
    fn test_multiple_references() {
        // C1 reads A1 and B1
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("C1"), set(&[pos("A1"), pos("B1")]));
        graph.assert_consistent();

        let mut refs: Vec<_> = graph.referenced(pos("C1")).collect();
        refs.sort();
        assert_eq!(refs, vec![pos("A1"), pos("B1")]);

        assert_eq!(graph.dependents(pos("A1")).collect::<Vec<_>>(), vec![pos("C1")]);
        assert_eq!(graph.dependents(pos("B1")).collect::<Vec<_>>(), vec![pos("C1")]);
    }

    #[test]
    fn test_multiple_dependents() {
        // B1 and C1 both read A1
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.replace_edges(pos("C1"), set(&[pos("A1")]));
        graph.assert_consistent();

        let mut deps: Vec<_> = graph.dependents(pos("A1")).collect();
        deps.sort();
        assert_eq!(deps, vec![pos("B1"), pos("C1")]);
        assert_eq!(graph.formula_cell_count(), 2);
        assert_eq!(graph.referenced_cell_count(), 1);
    }

    #[test]
    fn test_rewiring() {
        // B1 reads A1, then B1 reads A2 instead
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.replace_edges(pos("B1"), set(&[pos("A2")]));
        graph.assert_consistent();

        assert_eq!(graph.referenced(pos("B1")).collect::<Vec<_>>(), vec![pos("A2")]);
        assert_eq!(graph.dependents(pos("A2")).collect::<Vec<_>>(), vec![pos("B1")]);
        assert_eq!(graph.dependents(pos("A1")).count(), 0);
        assert!(!graph.is_referenced(pos("A1")));
    }

    #[test]
    fn test_unwiring() {
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.clear_cell(pos("B1"));
        graph.assert_consistent();

        assert_eq!(graph.referenced(pos("B1")).count(), 0);
        assert_eq!(graph.dependents(pos("A1")).count(), 0);
        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.referenced_cell_count(), 0);
    }

    #[test]
    fn test_clear_keeps_incoming_edges() {
        // B1 reads A1; C1 reads B1. Clearing B1's own edges must not detach C1.
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.replace_edges(pos("C1"), set(&[pos("B1")]));

        graph.clear_cell(pos("B1"));
        graph.assert_consistent();

        assert!(graph.is_referenced(pos("B1")));
        assert_eq!(graph.dependents(pos("B1")).collect::<Vec<_>>(), vec![pos("C1")]);
        assert!(!graph.is_referenced(pos("A1")));
    }

    #[test]
    fn test_diamond() {
        //     A1
        //    /  \
        //   B1   C1
        //    \  /
        //     D1
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.replace_edges(pos("C1"), set(&[pos("A1")]));
        graph.replace_edges(pos("D1"), set(&[pos("B1"), pos("C1")]));
        graph.assert_consistent();

        let mut a1_deps: Vec<_> = graph.dependents(pos("A1")).collect();
        a1_deps.sort();
        assert_eq!(a1_deps, vec![pos("B1"), pos("C1")]);
        assert_eq!(graph.formula_cell_count(), 3);
        assert_eq!(graph.referenced_cell_count(), 3);
    }

    #[test]
    fn test_cycle_self_reference() {
        let graph = DepGraph::new();
        let report = graph.find_cycle(pos("A1"), &[pos("A1")]);
        assert!(report.is_some());
        assert!(report.unwrap().message.contains("references itself"));
    }

    #[test]
    fn test_cycle_two_cells() {
        // A1 reads B1; assigning B1 a formula reading A1 closes the loop
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("A1"), set(&[pos("B1")]));

        let report = graph.find_cycle(pos("B1"), &[pos("A1")]);
        let report = report.expect("cycle expected");
        assert_eq!(report.cells, vec![pos("B1"), pos("A1"), pos("B1")]);
    }

    #[test]
    fn test_cycle_indirect() {
        // A1 reads B1, B1 reads C1; C1 reading A1 closes the loop
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("A1"), set(&[pos("B1")]));
        graph.replace_edges(pos("B1"), set(&[pos("C1")]));

        let report = graph.find_cycle(pos("C1"), &[pos("A1")]);
        let report = report.expect("cycle expected");
        assert_eq!(
            report.cells,
            vec![pos("C1"), pos("A1"), pos("B1"), pos("C1")]
        );
    }

    #[test]
    fn test_no_cycle_on_valid_assignment() {
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.replace_edges(pos("C1"), set(&[pos("B1")]));

        assert!(graph.find_cycle(pos("D1"), &[pos("C1")]).is_none());
        // re-reading an upstream cell is fine as long as the target is not reached
        assert!(graph.find_cycle(pos("C1"), &[pos("A1")]).is_none());
    }

    #[test]
    fn test_no_cycle_on_diamond() {
        // shared upstream cells are not cycles
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("B1"), set(&[pos("A1")]));
        graph.replace_edges(pos("C1"), set(&[pos("A1")]));

        assert!(graph.find_cycle(pos("D1"), &[pos("B1"), pos("C1")]).is_none());
    }

    #[test]
    fn test_find_cycle_does_not_mutate() {
        let mut graph = DepGraph::new();
        graph.replace_edges(pos("A1"), set(&[pos("B1")]));

        let before_refs = graph.formula_cell_count();
        let before_deps = graph.referenced_cell_count();
        let _ = graph.find_cycle(pos("B1"), &[pos("A1")]);
        assert_eq!(graph.formula_cell_count(), before_refs);
        assert_eq!(graph.referenced_cell_count(), before_deps);
        graph.assert_consistent();
    }
}
