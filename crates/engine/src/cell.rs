//! Cell content variants and the per-cell value cache.

use std::cell::RefCell;

use crate::formula::{Formula, SheetView};
use crate::position::Position;
use crate::value::{FormulaError, Value};

/// Leading character marking a text literal; `value()` strips a single
/// occurrence, `text()` keeps it.
pub const ESCAPE_SIGN: char = '\'';

/// Formula content: the parsed formula plus its memoized result.
///
/// The cache is interior-mutable so a logically-const read can populate it.
/// Single-threaded discipline applies: a sheet is never mutated from two
/// threads, so a `RefCell` is sufficient.
#[derive(Debug)]
pub struct FormulaContent {
    formula: Formula,
    cache: RefCell<Option<Result<f64, FormulaError>>>,
}

impl FormulaContent {
    pub(crate) fn new(formula: Formula) -> Self {
        Self {
            formula,
            cache: RefCell::new(None),
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// The memoized result, evaluating on miss.
    fn result(&self, view: &dyn SheetView) -> Result<f64, FormulaError> {
        if let Some(cached) = *self.cache.borrow() {
            return cached;
        }
        let result = self.formula.evaluate(view);
        *self.cache.borrow_mut() = Some(result);
        result
    }

    /// The currently cached result, if any.
    pub fn cached(&self) -> Option<Result<f64, FormulaError>> {
        *self.cache.borrow()
    }
}

/// A cell's content. Replaced as a whole unit on every write; a cell never
/// partially mutates its content.
#[derive(Debug, Default)]
pub enum CellContent {
    #[default]
    Empty,
    Text(String),
    Formula(FormulaContent),
}

/// A single cell.
///
/// Owns its content only; adjacency (referenced/dependent sets) lives in the
/// sheet's dependency graph, keyed by position.
#[derive(Debug, Default)]
pub struct Cell {
    content: CellContent,
}

impl Cell {
    pub fn new(content: CellContent) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub(crate) fn replace_content(&mut self, content: CellContent) {
        self.content = content;
    }

    /// The text form: empty string, the stored literal (escape retained), or
    /// `=` followed by the canonical expression.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(text) => text.clone(),
            CellContent::Formula(fc) => format!("={}", fc.formula().expression()),
        }
    }

    /// The observable value. Formula cells evaluate lazily and memoize the
    /// result; text literals drop a single leading escape character.
    pub fn value(&self, view: &dyn SheetView) -> Value {
        match &self.content {
            CellContent::Empty => Value::empty(),
            CellContent::Text(text) => {
                let display = text.strip_prefix(ESCAPE_SIGN).unwrap_or(text);
                Value::Text(display.to_string())
            }
            CellContent::Formula(fc) => Value::from(fc.result(view)),
        }
    }

    /// Positions this cell's formula reads. Empty for non-formula content.
    pub fn referenced_cells(&self) -> &[Position] {
        match &self.content {
            CellContent::Formula(fc) => fc.formula().referenced_cells(),
            _ => &[],
        }
    }

    /// Drop the memoized formula result. No-op for non-formula content.
    pub fn invalidate_cache(&self) {
        if let CellContent::Formula(fc) = &self.content {
            fc.cache.borrow_mut().take();
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, CellContent::Empty)
    }
}
