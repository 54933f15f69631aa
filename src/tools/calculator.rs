//! Two-operand arithmetic for conversions and quick sums

use super::{ensure_object_parameters, Tool};
use crate::models::{ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalculationError {
    #[error("Division by zero.")]
    DivisionByZero,

    #[error("Invalid expression format.")]
    InvalidFormat,

    #[error("Unsupported operator '{0}'.")]
    UnsupportedOperator(String),

    #[error("Invalid numbers.")]
    InvalidNumbers,
}

/// Evaluate `a op b` where op is one of `+ - * /`.
/// Operands and operator must be whitespace separated.
pub fn evaluate(expression: &str) -> std::result::Result<f64, CalculationError> {
    let tokens: Vec<&str> = expression.split_whitespace().collect();

    let [lhs, op, rhs] = tokens.as_slice() else {
        return Err(CalculationError::InvalidFormat);
    };

    if !matches!(*op, "+" | "-" | "*" | "/") {
        return Err(CalculationError::UnsupportedOperator(op.to_string()));
    }

    let (a, b) = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => (a, b),
        _ => return Err(CalculationError::InvalidNumbers),
    };

    match *op {
        "+" => Ok(a + b),
        "-" => Ok(a - b),
        "*" => Ok(a * b),
        _ if b == 0.0 => Err(CalculationError::DivisionByZero),
        _ => Ok(a / b),
    }
}

pub struct BasicCalculatorTool;

#[async_trait::async_trait]
impl Tool for BasicCalculatorTool {
    fn name(&self) -> &'static str {
        "basic_calculator"
    }

    fn description(&self) -> &'static str {
        "Evaluates a simple arithmetic expression of the form 'a op b' with op one of + - * /."
    }

    fn parameters(&self) -> Value {
        json!({ "expression": "string, required, e.g. '100 * 3.64'" })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;

        // A missing expression is the same format error as an empty one.
        let expression = input
            .parameters
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(match evaluate(expression) {
            Ok(result) => ToolOutput::ok(json!([{
                "Expression": expression.trim(),
                "Result": result
            }])),
            Err(e) => ToolOutput::error(e.to_string()),
        })
    }
}
