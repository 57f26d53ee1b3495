use std::{fmt, str::FromStr};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MathvizError, MathvizResult};

pub const DEFAULT_STYLE: &str = "default";
pub const NUMBERLINE_STYLE: &str = "numberline";

/// Arithmetic operation a problem exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Subtraction => "subtraction",
            Self::Multiplication => "multiplication",
            Self::Division => "division",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = MathvizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addition" => Ok(Self::Addition),
            "subtraction" => Ok(Self::Subtraction),
            "multiplication" => Ok(Self::Multiplication),
            "division" => Ok(Self::Division),
            other => Err(MathvizError::validation(format!("Unknown type: {other}"))),
        }
    }
}

/// One visualization request. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProblemDescriptor {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub operand1: i64,
    pub operand2: i64,
    pub answer: i64,
    pub style: String,
}

impl ProblemDescriptor {
    pub fn new(kind: OperationKind, operand1: i64, operand2: i64, answer: i64) -> Self {
        Self {
            kind,
            operand1,
            operand2,
            answer,
            style: DEFAULT_STYLE.to_string(),
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Parse a descriptor from raw request text.
    pub fn from_json_str(raw: &str) -> MathvizResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| MathvizError::validation(format!("Invalid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Validate field presence and types, then the operation kind.
    ///
    /// Missing fields are reported in declaration order before the kind is inspected, so a
    /// request with an unknown kind and a missing operand reports the operand.
    pub fn from_value(value: &Value) -> MathvizResult<Self> {
        let Value::Object(map) = value else {
            return Err(MathvizError::validation(
                "Invalid JSON: expected an object describing the problem",
            ));
        };

        let kind_value = map
            .get("type")
            .or_else(|| map.get("kind"))
            .ok_or_else(|| MathvizError::validation("Missing field: type"))?;
        let op1 = required(map, "operand1")?;
        let op2 = required(map, "operand2")?;
        let answer = required(map, "answer")?;

        let operand1 = integer_field("operand1", op1)?;
        let operand2 = integer_field("operand2", op2)?;
        let answer = integer_field("answer", answer)?;

        let style = match map.get("style") {
            None | Some(Value::Null) => DEFAULT_STYLE.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(MathvizError::validation(format!(
                    "Invalid style: {other}"
                )));
            }
        };

        let kind = match kind_value {
            Value::String(s) => s.parse::<OperationKind>()?,
            other => {
                return Err(MathvizError::validation(format!("Unknown type: {other}")));
            }
        };

        Ok(Self {
            kind,
            operand1,
            operand2,
            answer,
            style,
        })
    }

    pub fn to_json(&self) -> MathvizResult<String> {
        serde_json::to_string(self)
            .map_err(|e| MathvizError::internal(format!("failed to serialize descriptor: {e}")))
    }
}

fn required<'a>(map: &'a Map<String, Value>, field: &str) -> MathvizResult<&'a Value> {
    map.get(field)
        .ok_or_else(|| MathvizError::validation(format!("Missing field: {field}")))
}

fn integer_field(field: &str, value: &Value) -> MathvizResult<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| MathvizError::validation(format!("Invalid integer for {field}: {value}")))
}

#[cfg(test)]
#[path = "../tests/unit/descriptor.rs"]
mod tests;
