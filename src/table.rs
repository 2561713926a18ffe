// Update table - `;`-delimited CSV whose first column keys each row
use crate::error::{EngineError, EngineResult};
use crate::values::{CellValue, ColumnType};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Per-column type declarations; undeclared columns are inferred
#[derive(Debug, Clone, Default)]
pub struct ColumnSchema {
    types: HashMap<String, ColumnType>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.types.insert(column.into(), column_type);
        self
    }

    /// Parse `name=type` declarations
    pub fn parse_declarations<I, S>(declarations: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schema = Self::new();
        for decl in declarations {
            let decl = decl.as_ref();
            let (name, ty) = decl.split_once('=').ok_or_else(|| {
                EngineError::validation(format!("column declaration '{}' must be name=type", decl))
            })?;
            schema = schema.declare(name.trim(), ty.parse()?);
        }
        Ok(schema)
    }

    pub fn column_type(&self, column: &str) -> ColumnType {
        self.types.get(column).copied().unwrap_or_default()
    }
}

/// One data row: the key cell plus the fields present on that row
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRow {
    /// 1-based line number in the source file (header = 1)
    pub line: usize,
    pub key: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTable {
    pub key_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<UpdateRow>,
}

impl UpdateTable {
    /// Parse CSV content.
    ///
    /// A cell that is present but empty becomes an explicit null. A cell
    /// missing from a short row is left out of that row's fields entirely.
    pub fn parse(content: &str, delimiter: u8, schema: &ColumnSchema) -> EngineResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.len() < 2 {
            return Err(EngineError::validation(
                "update file needs a key column and at least one field column",
            ));
        }
        if let Some(pos) = headers.iter().position(|h| h.is_empty()) {
            return Err(EngineError::validation(format!(
                "column {} has an empty header",
                pos + 1
            )));
        }

        let key_column = headers[0].clone();
        let columns = headers[1..].to_vec();
        let mut rows = Vec::new();

        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 2);
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let key = record.get(0).map(str::trim).unwrap_or_default();
            if key.is_empty() {
                return Err(EngineError::validation(format!(
                    "line {}: every row must include a value for '{}'",
                    line, key_column
                )));
            }

            let mut fields = Map::new();
            for (col_idx, column) in columns.iter().enumerate() {
                let Some(raw) = record.get(col_idx + 1) else {
                    break;
                };
                let cell = CellValue::parse_as(raw, schema.column_type(column)).map_err(|e| {
                    EngineError::validation(format!("line {}, column '{}': {}", line, column, e))
                })?;
                fields.insert(column.clone(), cell.into_json());
            }

            rows.push(UpdateRow {
                line,
                key: key.to_string(),
                fields,
            });
        }

        if rows.is_empty() {
            return Err(EngineError::empty_input("update rows"));
        }

        Ok(Self {
            key_column,
            columns,
            rows,
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.key.clone()).collect()
    }
}
