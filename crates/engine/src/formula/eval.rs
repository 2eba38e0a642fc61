// Formula evaluator - walks the AST against a read-only sheet view

use crate::position::Position;
use crate::value::{FormulaError, Value};

use super::parser::{BinaryOp, Expr, UnaryOp};

/// Read-only view of a sheet, consumed during evaluation.
///
/// Implementations must not materialize cells on this path; an absent cell
/// simply contributes zero to arithmetic.
pub trait SheetView {
    /// The value at `pos`, or `None` when no cell exists there.
    fn cell_value(&self, pos: Position) -> Option<Value>;
}

/// Evaluate an expression. Errors are returned in-band, never panicked;
/// the left-to-right fold yields the first error encountered.
pub(crate) fn evaluate(expr: &Expr, view: &dyn SheetView) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => reference_value(*pos, view),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, view)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, view)?;
            let r = evaluate(right, view)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => {
                    let v = l / r;
                    if v.is_finite() {
                        Ok(v)
                    } else {
                        Err(FormulaError::Arithmetic)
                    }
                }
            }
        }
    }
}

/// Coerce the value at a referenced position to a number.
fn reference_value(pos: Position, view: &dyn SheetView) -> Result<f64, FormulaError> {
    if !pos.is_valid() {
        return Err(FormulaError::Ref);
    }
    match view.cell_value(pos) {
        None => Ok(0.0),
        Some(Value::Number(n)) => Ok(n),
        Some(Value::Text(text)) => {
            if text.is_empty() {
                Ok(0.0)
            } else {
                text.parse::<f64>().map_err(|_| FormulaError::Value)
            }
        }
        Some(Value::Error(e)) => Err(e),
    }
}
