// Identifier resolution - turn operator input into concrete records
use crate::client::{BrowseParams, IndexClient, Record};
use crate::config::EngineConfig;
use crate::constants;
use crate::error::{EngineError, EngineResult};
use crate::progress::ProgressLog;
use crate::values::RawValueList;
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Selection
// ============================================================================

/// How raw values map to records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Values are object identifiers
    ByIdentifier,
    /// Values are matched against an attribute; `None` means the index's
    /// configured distinct attribute
    ByAttribute(Option<String>),
}

impl ResolutionMode {
    pub fn by_distinct() -> Self {
        Self::ByAttribute(None)
    }

    pub fn by_attribute(name: impl Into<String>) -> Self {
        Self::ByAttribute(Some(name.into()))
    }
}

/// One `attribute:"value"` condition of a filtered browse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub attribute: String,
    pub value: String,
}

impl FilterClause {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Parse `attribute:value` (or `attribute=value`)
    pub fn parse(input: &str) -> EngineResult<Self> {
        let (attribute, value) = input
            .split_once(':')
            .or_else(|| input.split_once('='))
            .ok_or_else(|| {
                EngineError::validation(format!("filter '{}' must be attribute:value", input))
            })?;
        let attribute = attribute.trim();
        let value = value.trim().trim_matches('"');
        if attribute.is_empty() || value.is_empty() {
            return Err(EngineError::validation(format!(
                "filter '{}' needs both an attribute and a value",
                input
            )));
        }
        Ok(Self::new(attribute, value))
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:\"{}\"", self.attribute, self.value.replace('"', "\\\""))
    }
}

/// Everything an operation can be pointed at
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Values {
        raw: RawValueList,
        mode: ResolutionMode,
    },
    /// Conjunction of filter clauses; `distinct` keeps one record per
    /// distinct-attribute value
    Filters {
        clauses: Vec<FilterClause>,
        distinct: bool,
    },
}

impl Selection {
    pub fn ids(raw: RawValueList) -> Self {
        Self::Values {
            raw,
            mode: ResolutionMode::ByIdentifier,
        }
    }

    pub fn attribute(raw: RawValueList, attribute: Option<String>) -> Self {
        Self::Values {
            raw,
            mode: ResolutionMode::ByAttribute(attribute),
        }
    }
}

// ============================================================================
// Resolution result
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub index: String,
    /// Matched records, deduplicated by identifier, in resolution order
    pub records: Vec<Record>,
    /// Attribute values were matched against, for attribute and filter modes
    pub attribute: Option<String>,
    /// Deduplicated inputs that were looked up
    pub requested: usize,
    /// Inputs with zero matches
    pub unmatched: Vec<String>,
}

impl Resolution {
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.object_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Filter expression matching `value` on `attribute`
pub fn attribute_filter(attribute: &str, value: &str) -> String {
    FilterClause::new(attribute, value).to_string()
}

/// Keep the first record seen for each identifier
pub fn dedup_by_id(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.object_id.clone()))
        .collect()
}

// ============================================================================
// Resolver
// ============================================================================

/// Read-only resolver bound to one client.
///
/// Network errors are surfaced as-is; callers decide whether to retry.
pub struct IdentifierResolver<'a> {
    client: &'a dyn IndexClient,
    config: &'a EngineConfig,
    log: &'a ProgressLog,
}

impl<'a> IdentifierResolver<'a> {
    pub fn new(client: &'a dyn IndexClient, config: &'a EngineConfig, log: &'a ProgressLog) -> Self {
        Self { client, config, log }
    }

    pub async fn resolve_selection(
        &self,
        index: &str,
        selection: &Selection,
        attributes: Option<&[String]>,
    ) -> EngineResult<Resolution> {
        match selection {
            Selection::Values { raw, mode } => self.resolve(index, raw, mode, attributes).await,
            Selection::Filters { clauses, distinct } => {
                self.resolve_filters(index, clauses, *distinct, attributes)
                    .await
            }
        }
    }

    /// Resolve raw values to records.
    ///
    /// `attributes` limits the fields fetched; `None` fetches whole records.
    pub async fn resolve(
        &self,
        index: &str,
        raw: &RawValueList,
        mode: &ResolutionMode,
        attributes: Option<&[String]>,
    ) -> EngineResult<Resolution> {
        require_index(index)?;
        let what = match mode {
            ResolutionMode::ByIdentifier => "identifiers",
            ResolutionMode::ByAttribute(_) => "attribute values",
        };
        raw.require_non_empty(what)?;
        let values = raw.deduplicated();

        match mode {
            ResolutionMode::ByIdentifier => self.by_identifier(index, values, attributes).await,
            ResolutionMode::ByAttribute(explicit) => {
                let attribute = self.resolve_attribute(index, explicit.as_deref()).await?;
                self.by_attribute(index, &attribute, values, attributes)
                    .await
            }
        }
    }

    /// Explicit attribute, else the index's configured distinct attribute
    pub async fn resolve_attribute(&self, index: &str, explicit: Option<&str>) -> EngineResult<String> {
        if let Some(name) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(name.to_string());
        }
        let settings = self.client.get_settings(index).await?;
        match settings.distinct_attribute() {
            Some(attribute) => {
                log::debug!("{}: distinct attribute is '{}'", index, attribute);
                Ok(attribute.to_string())
            }
            None => Err(EngineError::configuration(
                index,
                "no distinct attribute is configured and none was given",
            )),
        }
    }

    async fn by_identifier(
        &self,
        index: &str,
        ids: Vec<String>,
        attributes: Option<&[String]>,
    ) -> EngineResult<Resolution> {
        let mut records = Vec::with_capacity(ids.len());
        let mut unmatched = Vec::new();

        for chunk in ids.chunks(self.config.multi_get_chunk) {
            let found = self.client.get_objects(index, chunk, attributes).await?;
            for (id, record) in chunk.iter().zip(found) {
                match record {
                    Some(record) => records.push(record),
                    None => unmatched.push(id.clone()),
                }
            }
        }

        self.log.info(
            Some(index),
            format!("{} of {} identifiers found", records.len(), ids.len()),
        );
        if !unmatched.is_empty() {
            log::debug!("{}: not found: {}", index, unmatched.join(", "));
        }

        Ok(Resolution {
            index: index.to_string(),
            records: dedup_by_id(records),
            attribute: None,
            requested: ids.len(),
            unmatched,
        })
    }

    async fn by_attribute(
        &self,
        index: &str,
        attribute: &str,
        values: Vec<String>,
        attributes: Option<&[String]>,
    ) -> EngineResult<Resolution> {
        let mut records = Vec::new();
        let mut unmatched = Vec::new();

        for value in &values {
            let params = BrowseParams::filtered(attribute_filter(attribute, value))
                .retrieve(attributes.map(<[String]>::to_vec));
            let mut matched = 0usize;
            self.client
                .browse_objects(index, &params, &mut |batch: Vec<Record>| {
                    matched += batch.len();
                    records.extend(batch);
                })
                .await?;

            if matched == 0 {
                self.log.notice(
                    Some(index),
                    format!("no matching objects for {} \"{}\"", attribute, value),
                );
                unmatched.push(value.clone());
            } else {
                self.log.info(
                    Some(index),
                    format!("{} = \"{}\": {} objects", attribute, value, matched),
                );
            }
        }

        let total = records.len();
        let records = dedup_by_id(records);
        if records.len() < total {
            log::debug!(
                "{}: dropped {} records matched by more than one value",
                index,
                total - records.len()
            );
        }

        Ok(Resolution {
            index: index.to_string(),
            records,
            attribute: Some(attribute.to_string()),
            requested: values.len(),
            unmatched,
        })
    }

    /// Browse with every clause ANDed together
    pub async fn resolve_filters(
        &self,
        index: &str,
        clauses: &[FilterClause],
        distinct: bool,
        attributes: Option<&[String]>,
    ) -> EngineResult<Resolution> {
        require_index(index)?;
        if clauses.is_empty() {
            return Err(EngineError::empty_input("filters"));
        }

        let distinct_attribute = if distinct {
            Some(self.resolve_attribute(index, None).await?)
        } else {
            None
        };

        // the distinct attribute must be fetched even when columns are restricted
        let retrieve = attributes.map(|attrs| {
            let mut attrs = attrs.to_vec();
            if let Some(attr) = &distinct_attribute
                && !attrs.contains(attr)
            {
                attrs.push(attr.clone());
            }
            attrs
        });

        let filters = clauses
            .iter()
            .map(FilterClause::to_string)
            .collect::<Vec<_>>()
            .join(" AND ");
        let params = BrowseParams::filtered(filters.clone()).retrieve(retrieve);
        let mut records = Vec::new();
        self.client
            .browse_objects(index, &params, &mut |batch: Vec<Record>| records.extend(batch))
            .await?;
        let mut records = dedup_by_id(records);

        if let Some(attr) = &distinct_attribute {
            let before = records.len();
            records = keep_first_per_value(records, attr);
            log::debug!(
                "{}: distinct on '{}' kept {} of {}",
                index,
                attr,
                records.len(),
                before
            );
        }

        if records.is_empty() {
            self.log
                .notice(Some(index), format!("no matching objects for {}", filters));
        } else {
            self.log
                .info(Some(index), format!("{}: {} objects", filters, records.len()));
        }

        Ok(Resolution {
            index: index.to_string(),
            unmatched: if records.is_empty() { vec![filters] } else { Vec::new() },
            records,
            attribute: distinct_attribute,
            requested: clauses.len(),
        })
    }
}

/// One record per value of `attribute`; records lacking it are all kept
fn keep_first_per_value(records: Vec<Record>, attribute: &str) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| match r.get(attribute) {
            Some(value) if !value.is_null() => seen.insert(value.to_string()),
            _ => true,
        })
        .collect()
}

fn require_index(index: &str) -> EngineResult<()> {
    if index.trim().is_empty() {
        return Err(EngineError::validation("an index name is required"));
    }
    if index.contains(char::is_whitespace) {
        return Err(EngineError::validation(format!(
            "index name '{}' must not contain whitespace",
            index
        )));
    }
    Ok(())
}

/// Attributes to retrieve when only identifiers matter
pub fn identifiers_only() -> Vec<String> {
    vec![constants::OBJECT_ID.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_filter_quotes_value() {
        assert_eq!(attribute_filter("group_id", "G1"), "group_id:\"G1\"");
        assert_eq!(attribute_filter("title", "a \"b\""), "title:\"a \\\"b\\\"\"");
    }

    #[test]
    fn test_filter_clause_parse() {
        let clause = FilterClause::parse("brand: \"acme\"").unwrap();
        assert_eq!(clause, FilterClause::new("brand", "acme"));
        assert_eq!(FilterClause::parse("color=red").unwrap().value, "red");
        assert!(FilterClause::parse("brand").is_err());
        assert!(FilterClause::parse(":x").is_err());
    }

    #[test]
    fn test_dedup_by_id_keeps_first() {
        let records = vec![
            Record::new("1").with("v", "a"),
            Record::new("2"),
            Record::new("1").with("v", "b"),
        ];
        let deduped = dedup_by_id(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].get("v"), Some("a".into()));
    }

    #[test]
    fn test_keep_first_per_value() {
        let records = vec![
            Record::new("1").with("group", "G1"),
            Record::new("2").with("group", "G1"),
            Record::new("3"),
            Record::new("4").with("group", "G2"),
        ];
        let kept: Vec<String> = keep_first_per_value(records, "group")
            .into_iter()
            .map(|r| r.object_id)
            .collect();
        assert_eq!(kept, vec!["1", "3", "4"]);
    }

    #[test]
    fn test_require_index() {
        assert!(require_index("").is_err());
        assert!(require_index("my index").is_err());
        assert!(require_index("products").is_ok());
    }
}
