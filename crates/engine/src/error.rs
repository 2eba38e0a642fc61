//! Control-flow errors raised by sheet mutators.
//!
//! These are distinct from [`crate::value::FormulaError`]: that one is an
//! in-band value a cell read can produce, while the types here are returned
//! as `Err` from `Sheet` operations and leave the sheet unchanged.

use std::fmt;

use crate::position::Position;

/// The formula parser rejected an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Report when the cycle check finds a circular reference.
#[derive(Debug, Clone)]
pub struct CycleError {
    /// Cells participating in the cycle, in reference order.
    /// May be a subset for large cycles.
    pub cells: Vec<Position>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleError {
    /// Cycle report for a formula referencing its own cell.
    pub fn self_reference(cell: Position) -> Self {
        Self {
            cells: vec![cell],
            message: format!("Cell {} references itself", cell),
        }
    }

    /// Cycle report for a multi-cell chain.
    pub fn cycle(cells: Vec<Position>) -> Self {
        let cell_list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = if cells.len() <= 6 {
            format!("Circular reference: {}", cell_list.join(" → "))
        } else {
            format!(
                "Circular reference involving {} cells: {} → ... → {}",
                cells.len(),
                cell_list[0],
                cell_list.last().unwrap()
            )
        };
        Self { cells, message }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleError {}

/// Errors raised by `Sheet` mutators.
///
/// On any of these the sheet is left in its pre-call state.
#[derive(Debug)]
pub enum SheetError {
    /// Operation addressed a position outside the sheet bounds.
    InvalidPosition(Position),
    /// The formula parser rejected the expression.
    Formula(ParseError),
    /// The assignment would introduce a circular dependency.
    CircularDependency(CycleError),
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPosition(pos) => {
                write!(f, "invalid position ({}, {})", pos.row, pos.col)
            }
            Self::Formula(e) => write!(f, "formula parse error: {}", e),
            Self::CircularDependency(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SheetError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let e = ParseError::new("unexpected character '#'");
        assert_eq!(e.to_string(), "unexpected character '#'");
        assert_eq!(e.message(), "unexpected character '#'");
    }

    #[test]
    fn test_cycle_error_self_reference() {
        let e = CycleError::self_reference(Position::new(0, 0));
        assert_eq!(e.cells.len(), 1);
        assert!(e.message.contains("references itself"));
        assert!(e.message.contains("A1"));
    }

    #[test]
    fn test_cycle_error_small_chain() {
        let e = CycleError::cycle(vec![
            Position::new(0, 1),
            Position::new(0, 0),
            Position::new(0, 1),
        ]);
        assert_eq!(e.to_string(), "Circular reference: B1 → A1 → B1");
    }

    #[test]
    fn test_cycle_error_large_chain_truncated() {
        let cells: Vec<Position> = (0..10).map(|row| Position::new(row, 0)).collect();
        let e = CycleError::cycle(cells);
        assert!(e.message.contains("10 cells"));
        assert!(e.message.contains("..."));
    }

    #[test]
    fn test_sheet_error_display() {
        let e = SheetError::InvalidPosition(Position::new(-1, 2));
        assert_eq!(e.to_string(), "invalid position (-1, 2)");

        let e = SheetError::Formula(ParseError::new("empty formula"));
        assert_eq!(e.to_string(), "formula parse error: empty formula");

        let e = SheetError::CircularDependency(CycleError::self_reference(Position::new(0, 0)));
        assert!(e.to_string().contains("references itself"));
    }
}
