// Export - render resolved records as `;`-delimited CSV
use super::{BatchMutator, MutationTarget, require_targets};
use crate::client::Record;
use crate::constants;
use crate::error::{EngineError, EngineResult};
use crate::resolver::{IdentifierResolver, Selection};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static LINE_BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("Invalid regex pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub selection: Selection,
    /// Explicit column order; `None` exports the sorted union of all keys
    pub columns: Option<Vec<String>>,
    /// Date stamped into the filename (defaults to today, UTC)
    pub date: Option<NaiveDate>,
}

impl ExportRequest {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            columns: None,
            date: None,
        }
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = (!columns.is_empty()).then_some(columns);
        self
    }

    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// A rendered export ready to be written or downloaded
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub index_name: String,
    pub filename: String,
    pub content: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

impl BatchMutator {
    /// Export every target; one file per index.
    ///
    /// A target that resolves to zero records fails the whole export with
    /// `NothingToExport`.
    pub async fn export(
        &self,
        targets: &[MutationTarget],
        request: &ExportRequest,
    ) -> EngineResult<Vec<ExportFile>> {
        require_targets(targets).map_err(|e| self.fatal(e))?;
        let date = request.date.unwrap_or_else(|| Utc::now().date_naive());

        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let resolver = IdentifierResolver::new(self.client(target.tenant), &self.config, &self.log);
            let resolution = resolver
                .resolve_selection(&target.index_name, &request.selection, request.columns.as_deref())
                .await
                .map_err(|e| self.fatal(e))?;
            if resolution.is_empty() {
                return Err(self.fatal(EngineError::NothingToExport));
            }
            resolved.push((target, resolution.records));
        }

        let mut files = Vec::with_capacity(resolved.len());
        for (target, records) in resolved {
            let records = self.apply_transform(records);
            let columns = match &request.columns {
                Some(columns) => columns.clone(),
                None => union_columns(&records),
            };
            let content = render_csv(&records, &columns, self.config.csv_delimiter)?;
            let filename = constants::export_filename("export", &target.index_name, date);
            self.log.success(
                Some(&target.index_name),
                format!("exported {} rows to {}", records.len(), filename),
            );
            files.push(ExportFile {
                index_name: target.index_name.clone(),
                filename,
                content,
                rows: records.len(),
                columns,
            });
        }
        Ok(files)
    }
}

/// Sorted union of every key seen on any record
pub fn union_columns(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Flatten a value to single-line cell text; quoting is left to the writer
pub fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let text = LINE_BREAK_TAG.replace_all(&text, " ");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// Header plus one row per record over `columns`.
///
/// Cells holding the delimiter or a quote are quoted with doubled quotes.
pub fn render_csv(records: &[Record], columns: &[String], delimiter: u8) -> EngineResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| cell_text(record.get(c).as_ref())))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| EngineError::validation(format!("export is not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_union_columns_sorted() {
        let records = vec![
            Record::new("1").with("price", 10),
            Record::new("2").with("price", 12),
            Record::new("3").with("color", "red"),
        ];
        assert_eq!(union_columns(&records), vec!["color", "objectID", "price"]);
    }

    #[test]
    fn test_cell_text_flattens() {
        assert_eq!(cell_text(None), "");
        assert_eq!(cell_text(Some(&Value::Null)), "");
        assert_eq!(cell_text(Some(&json!("a<BR/>b<br>c"))), "a b c");
        assert_eq!(cell_text(Some(&json!("line\r\n\n  two "))), "line two");
        assert_eq!(cell_text(Some(&json!(["x", 1]))), "[\"x\",1]");
        assert_eq!(cell_text(Some(&json!({"k": true}))), "{\"k\":true}");
        assert_eq!(cell_text(Some(&json!(4.5))), "4.5");
    }

    #[test]
    fn test_render_quotes_delimiters_and_quotes() {
        let records = vec![
            Record::new("1").with("title", "Shoes; red").with("note", "say \"hi\""),
            Record::new("2").with("title", "plain"),
        ];
        let columns = vec!["objectID".to_string(), "title".to_string(), "note".to_string()];
        let csv = render_csv(&records, &columns, b';').unwrap();
        assert_eq!(
            csv,
            "objectID;title;note\n1;\"Shoes; red\";\"say \"\"hi\"\"\"\n2;plain;\n"
        );
    }

    #[test]
    fn test_request_builder() {
        let request = ExportRequest::new(Selection::ids(Default::default())).columns(vec![]);
        assert!(request.columns.is_none());
    }
}
