//! Free-text value lists and typed CSV cell parsing

use crate::error::{EngineError, EngineResult};
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::str::FromStr;

/// Whether `c` separates two entries of a pasted value list
fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | '|')
}

/// Ordered list of non-empty, trimmed values pasted by an operator.
///
/// Entries keep their original order (including repeats) for reporting;
/// [`RawValueList::deduplicated`] is what the engines consume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawValueList {
    values: Vec<String>,
}

impl RawValueList {
    /// Split on spaces, commas, semicolons, pipes and newlines
    pub fn parse(input: &str) -> Self {
        let values = input
            .split(is_separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { values }
    }

    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values = values
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { values }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First occurrence of every value, in input order
    pub fn deduplicated(&self) -> Vec<String> {
        let mut seen = HashSet::with_capacity(self.values.len());
        self.values
            .iter()
            .filter(|v| seen.insert(v.as_str()))
            .cloned()
            .collect()
    }

    /// Fail with `EmptyInput` when nothing usable was supplied
    pub fn require_non_empty(&self, what: &str) -> EngineResult<()> {
        if self.is_empty() {
            return Err(EngineError::empty_input(what));
        }
        Ok(())
    }
}

impl FromStr for RawValueList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Declared type of an update column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    /// Infer per cell
    #[default]
    Auto,
    String,
    Number,
    Boolean,
    Json,
}

impl FromStr for ColumnType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "string" | "str" | "text" => Ok(Self::String),
            "number" | "num" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "json" => Ok(Self::Json),
            other => Err(EngineError::validation(format!(
                "unknown column type '{}'",
                other
            ))),
        }
    }
}

/// A single cell of an update table.
///
/// `Clear` is an explicit request to null the field. It is distinct from a
/// cell that is absent from the row, which leaves the field untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Clear,
    Boolean(bool),
    Number(Number),
    Json(Value),
    String(String),
}

impl CellValue {
    /// Infer the cell type from its text
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Self::Clear;
        }
        match text {
            "true" => return Self::Boolean(true),
            "false" => return Self::Boolean(false),
            _ => {}
        }
        let bracketed = (text.starts_with('[') && text.ends_with(']'))
            || (text.starts_with('{') && text.ends_with('}'));
        if bracketed && let Ok(json) = serde_json::from_str::<Value>(text) {
            return Self::Json(json);
        }
        if let Some(number) = parse_number(text) {
            return Self::Number(number);
        }
        Self::String(raw.to_string())
    }

    /// Parse against a declared column type; empty cells always clear
    pub fn parse_as(raw: &str, column_type: ColumnType) -> EngineResult<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(Self::Clear);
        }
        match column_type {
            ColumnType::Auto => Ok(Self::parse(raw)),
            ColumnType::String => Ok(Self::String(raw.to_string())),
            ColumnType::Number => text
                .parse::<i64>()
                .ok()
                .map(Number::from)
                .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
                .map(Self::Number)
                .ok_or_else(|| EngineError::validation(format!("'{}' is not a number", text))),
            ColumnType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Self::Boolean(true)),
                "false" | "0" | "no" => Ok(Self::Boolean(false)),
                _ => Err(EngineError::validation(format!(
                    "'{}' is not a boolean",
                    text
                ))),
            },
            ColumnType::Json => serde_json::from_str(text)
                .map(Self::Json)
                .map_err(|e| EngineError::validation(format!("invalid JSON '{}': {}", text, e))),
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }

    /// Value sent to the service; `Clear` becomes JSON null
    pub fn into_json(self) -> Value {
        match self {
            Self::Clear => Value::Null,
            Self::Boolean(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::Json(v) => v,
            Self::String(s) => Value::String(s),
        }
    }
}

/// Decimal numbers only; leading zeros stay strings so identifiers survive
fn parse_number(text: &str) -> Option<Number> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if leading_zero || digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}
