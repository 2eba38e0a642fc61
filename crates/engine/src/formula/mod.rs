// Formula parsing and evaluation

pub mod eval;
pub mod parser;

use rustc_hash::FxHashSet;

use crate::error::ParseError;
use crate::position::Position;
use crate::value::FormulaError;

pub use eval::SheetView;

use parser::Expr;

/// A parsed formula: the expression behind the leading `=` of a cell.
///
/// Holds the AST together with its canonical printout and the deduplicated
/// list of in-range referenced positions, both fixed at parse time.
#[derive(Debug, Clone)]
pub struct Formula {
    expr: Expr,
    expression: String,
    referenced: Vec<Position>,
}

impl Formula {
    /// Parse an expression (without the leading `=`).
    pub fn parse(text: &str) -> Result<Formula, ParseError> {
        let expr = parser::parse(text).map_err(ParseError::new)?;
        let expression = parser::print(&expr);
        let referenced = collect_referenced(&expr);
        Ok(Formula {
            expr,
            expression,
            referenced,
        })
    }

    /// Evaluate against a sheet view. Errors come back in-band.
    pub fn evaluate(&self, view: &dyn SheetView) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, view)
    }

    /// Canonical expression text: redundant parentheses removed, operand
    /// order preserved. Reparsing and reprinting yields the same string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// In-range referenced positions, deduplicated, first-seen order.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.referenced
    }
}

/// Collect in-range references in first-seen order, left to right.
fn collect_referenced(expr: &Expr) -> Vec<Position> {
    fn walk(expr: &Expr, seen: &mut FxHashSet<Position>, out: &mut Vec<Position>) {
        match expr {
            Expr::Number(_) => {}
            Expr::CellRef(pos) => {
                if pos.is_valid() && seen.insert(*pos) {
                    out.push(*pos);
                }
            }
            Expr::Unary { operand, .. } => walk(operand, seen, out),
            Expr::Binary { left, right, .. } => {
                walk(left, seen, out);
                walk(right, seen, out);
            }
        }
    }

    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    walk(expr, &mut seen, &mut out);
    out
}
