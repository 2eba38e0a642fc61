//! Sparse sheet: the position-keyed cell table and its dependency graph.
//!
//! Writes flow through `set_cell`, which parses formulas, rejects cycles
//! before mutating anything, rewires dependency edges, and invalidates the
//! caches of every transitive dependent. Reads are demand-driven: a formula
//! cell evaluates on first read and serves the memoized result until a
//! referenced cell changes.

use std::io::{self, Write};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::{Cell, CellContent, FormulaContent};
use crate::dep_graph::DepGraph;
use crate::error::SheetError;
use crate::formula::{Formula, SheetView};
use crate::position::{Position, Size};
use crate::value::Value;

/// A sparse two-dimensional grid of cells.
///
/// Cells are owned exclusively by the table; the dependency graph stores
/// position handles only, so no back-reference can outlive its cell. Not
/// safe for multi-threaded mutation; callers share it behind their own
/// synchronization if needed.
#[derive(Debug, Default)]
pub struct Sheet {
    table: FxHashMap<Position, Cell>,
    deps: DepGraph,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `text` to the cell at `pos`, creating the cell if absent.
    ///
    /// Empty text empties the cell; `=` followed by a non-empty expression
    /// installs a formula; anything else becomes a text literal. Assigning
    /// the current text, or a formula that canonicalizes to it, is a no-op
    /// that preserves caches.
    ///
    /// A formula write materializes its referenced cells as empty
    /// placeholders, so the key set may grow beyond `pos` itself.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }

        let current_text = self.table.get(&pos).map(Cell::text);
        if current_text.as_deref() == Some(text) {
            return Ok(());
        }

        let content = if text.is_empty() {
            CellContent::Empty
        } else if let Some(expr) = text.strip_prefix('=').filter(|e| !e.is_empty()) {
            let formula = Formula::parse(expr).map_err(SheetError::Formula)?;

            // reparenthesized input can canonicalize to the current text
            let canonical = format!("={}", formula.expression());
            if current_text.as_deref() == Some(canonical.as_str()) {
                return Ok(());
            }

            // the cycle check runs against the untouched graph; a rejection
            // leaves both table and edges exactly as they were
            if let Some(cycle) = self.deps.find_cycle(pos, formula.referenced_cells()) {
                return Err(SheetError::CircularDependency(cycle));
            }

            CellContent::Formula(FormulaContent::new(formula))
        } else {
            CellContent::Text(text.to_string())
        };

        self.commit(pos, content);
        Ok(())
    }

    /// Install new content: swap the variant wholesale, materialize
    /// referenced cells, rewire edges, invalidate all transitive dependents.
    fn commit(&mut self, pos: Position, content: CellContent) {
        self.table.entry(pos).or_default().replace_content(content);

        let new_refs: Vec<Position> = self.table[&pos].referenced_cells().to_vec();
        for &referenced in &new_refs {
            self.table.entry(referenced).or_default();
        }
        self.deps.replace_edges(pos, new_refs.into_iter().collect());

        self.invalidate_from(pos);
    }

    /// Clear the cell at `pos`. Absent cells are a no-op.
    ///
    /// A referenced cell is emptied but kept, so its dependents keep reading
    /// zero; an unreferenced cell is removed outright. Cells the cleared
    /// formula used to read are removed too when that leaves them empty and
    /// unread.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        if !self.table.contains_key(&pos) {
            return Ok(());
        }

        let old_refs: Vec<Position> = self.deps.referenced(pos).collect();
        self.deps.clear_cell(pos);

        if self.deps.is_referenced(pos) {
            if let Some(cell) = self.table.get_mut(&pos) {
                cell.replace_content(CellContent::Empty);
            }
            self.invalidate_from(pos);
        } else {
            self.table.remove(&pos);
        }

        for referenced in old_refs {
            self.remove_if_orphaned(referenced);
        }
        Ok(())
    }

    /// Drop an auto-materialized placeholder once nothing reads it.
    fn remove_if_orphaned(&mut self, pos: Position) {
        let orphaned = self.table.get(&pos).map_or(false, Cell::is_empty)
            && !self.deps.is_referenced(pos);
        if orphaned {
            self.table.remove(&pos);
        }
    }

    /// The cell at `pos`, if present. Plain reads never materialize.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        Ok(self.table.get(&pos))
    }

    /// The value at `pos`. Absent cells read as the empty value.
    pub fn value(&self, pos: Position) -> Result<Value, SheetError> {
        Ok(match self.cell(pos)? {
            Some(cell) => cell.value(self),
            None => Value::empty(),
        })
    }

    /// The text at `pos`. Absent cells read as the empty string.
    pub fn text(&self, pos: Position) -> Result<String, SheetError> {
        Ok(match self.cell(pos)? {
            Some(cell) => cell.text(),
            None => String::new(),
        })
    }

    /// True when at least one formula reads `pos`.
    pub fn is_referenced(&self, pos: Position) -> bool {
        self.deps.is_referenced(pos)
    }

    /// The dependency graph, read-only.
    pub fn dep_graph(&self) -> &DepGraph {
        &self.deps
    }

    /// Number of stored cells, empty placeholders included.
    pub fn cell_count(&self) -> usize {
        self.table.len()
    }

    /// Smallest rectangle anchored at the origin containing every stored
    /// cell. Empty placeholders count; `(0, 0)` when the table is empty.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for pos in self.table.keys() {
            size.rows = size.rows.max(pos.row + 1);
            size.cols = size.cols.max(pos.col + 1);
        }
        size
    }

    /// Write cell values over the printable area, tab-separated.
    pub fn print_values<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print(out, |sheet, cell| cell.value(sheet).to_string())
    }

    /// Write cell texts over the printable area, tab-separated.
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print(out, |_, cell| cell.text())
    }

    /// Row-major print driver: a tab between columns, a newline per row,
    /// absent cells as empty fields.
    fn print<W, F>(&self, out: &mut W, render: F) -> io::Result<()>
    where
        W: Write,
        F: Fn(&Sheet, &Cell) -> String,
    {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col != 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.table.get(&Position::new(row, col)) {
                    out.write_all(render(self, cell).as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Clear the cache at `start` and of every transitive dependent.
    ///
    /// A cell can be reachable along several paths, so a visited set bounds
    /// the walk; acyclicity guarantees termination regardless.
    fn invalidate_from(&self, start: Position) {
        let mut visited: FxHashSet<Position> = FxHashSet::default();
        let mut stack = vec![start];
        while let Some(pos) = stack.pop() {
            if !visited.insert(pos) {
                continue;
            }
            if let Some(cell) = self.table.get(&pos) {
                cell.invalidate_cache();
            }
            stack.extend(self.deps.dependents(pos));
        }
    }
}

impl SheetView for Sheet {
    fn cell_value(&self, pos: Position) -> Option<Value> {
        self.table.get(&pos).map(|cell| cell.value(self))
    }
}
