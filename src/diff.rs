//! Side-by-side comparison of one configuration facet across indexes
//!
//! The first index is the base: every other column is classified against it
//! by presence. Fetches are independent reads and run concurrently.

use crate::client::{IndexClient, Rule, collect_rules};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::format::locale_cmp;
use crate::progress::ProgressLog;
use crate::retry::with_read_retry;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// Placeholder shown where a base value is missing from another index
pub const MISSING_MARKER: &str = "(missing)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Facet {
    SearchableAttributes,
    Facets,
    Rules,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Facet::SearchableAttributes => "searchable attributes",
            Facet::Facets => "facets",
            Facet::Rules => "rules",
        };
        f.write_str(s)
    }
}

impl FromStr for Facet {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "searchable" | "searchableattributes" => Ok(Facet::SearchableAttributes),
            "facets" | "facet" | "attributesforfaceting" => Ok(Facet::Facets),
            "rules" | "rule" => Ok(Facet::Rules),
            other => Err(EngineError::validation(format!("unknown facet '{}'", other))),
        }
    }
}

/// Raw facet configuration of one index
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FacetConfig {
    Attributes(Vec<String>),
    Rules(Vec<Rule>),
}

impl FacetConfig {
    /// Row keys in configuration order
    pub fn keys(&self) -> Vec<&str> {
        match self {
            FacetConfig::Attributes(attrs) => attrs.iter().map(String::as_str).collect(),
            FacetConfig::Rules(rules) => rules.iter().map(|r| r.object_id.as_str()).collect(),
        }
    }

    /// Rendered value for `key`, if this index has it
    pub fn render(&self, key: &str) -> Option<String> {
        match self {
            FacetConfig::Attributes(attrs) => attrs
                .iter()
                .find(|a| a.as_str() == key)
                .map(|a| display_key(a)),
            FacetConfig::Rules(rules) => rules
                .iter()
                .find(|r| r.object_id == key)
                .map(render_rule),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FacetConfig::Attributes(attrs) => attrs.len(),
            FacetConfig::Rules(rules) => rules.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    /// Column of the base index
    Base,
    Added,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffCell {
    pub index_name: String,
    /// Rendered value; `None` when the index lacks this row
    pub value: Option<String>,
    pub classification: Classification,
}

impl DiffCell {
    /// Text for a table cell: the value, a missing marker, or nothing
    pub fn display(&self) -> &str {
        match (&self.value, self.classification) {
            (Some(value), _) => value,
            (None, Classification::Removed) => MISSING_MARKER,
            (None, _) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRow {
    /// Raw key used for comparison
    pub key: String,
    /// Normalized key used for ordering and display
    pub display_key: String,
    /// One cell per compared index, base first
    pub cells: Vec<DiffCell>,
}

impl DiffRow {
    pub fn has_difference(&self) -> bool {
        self.cells
            .iter()
            .any(|c| matches!(c.classification, Classification::Added | Classification::Removed))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub facet: Facet,
    pub indexes: Vec<String>,
    /// Raw configuration per index, aligned with `indexes`
    pub configs: Vec<FacetConfig>,
    pub rows: Vec<DiffRow>,
}

/// `unordered(x)` displays as `x - Unordered`; anything else is unchanged
pub fn display_key(raw: &str) -> String {
    match raw
        .strip_prefix("unordered(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => format!("{} - Unordered", inner),
        None => raw.to_string(),
    }
}

/// Identifier, enabled flag and condition filters, one per line
pub fn render_rule(rule: &Rule) -> String {
    let filters = rule.condition_filters();
    let filters = if filters.is_empty() {
        "(none)".to_string()
    } else {
        filters.join("\n  ")
    };
    format!(
        "objectID: {}\nenabled: {}\nconditions.filters:\n  {}",
        rule.object_id,
        rule.is_enabled(),
        filters
    )
}

/// Build aligned rows from per-index configurations, base first
pub fn build_rows(indexes: &[String], configs: &[FacetConfig], differences_only: bool) -> Vec<DiffRow> {
    let keys: BTreeSet<&str> = configs.iter().flat_map(FacetConfig::keys).collect();
    let mut keyed: Vec<(String, &str)> = keys.into_iter().map(|k| (display_key(k), k)).collect();
    keyed.sort_by(|a, b| locale_cmp(&a.0, &b.0).then_with(|| a.1.cmp(b.1)));

    let base_keys: HashSet<&str> = configs
        .first()
        .map(|c| c.keys().into_iter().collect())
        .unwrap_or_default();

    keyed
        .into_iter()
        .map(|(display, key)| {
            let in_base = base_keys.contains(key);
            let cells = indexes
                .iter()
                .zip(configs)
                .enumerate()
                .map(|(pos, (name, config))| {
                    let value = config.render(key);
                    let classification = match (pos, in_base, value.is_some()) {
                        (0, _, _) => Classification::Base,
                        (_, false, true) => Classification::Added,
                        (_, true, false) => Classification::Removed,
                        _ => Classification::Unchanged,
                    };
                    DiffCell {
                        index_name: name.clone(),
                        value,
                        classification,
                    }
                })
                .collect();
            DiffRow {
                key: key.to_string(),
                display_key: display,
                cells,
            }
        })
        .filter(|row| !differences_only || row.has_difference())
        .collect()
}

/// Collapse repeats keeping first occurrence, then enforce the index bounds
pub fn validate_selection(indexes: &[String], max: usize) -> EngineResult<Vec<String>> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = indexes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect();
    if unique.len() < 2 {
        return Err(EngineError::validation(
            "select at least 2 distinct indexes to compare",
        ));
    }
    if unique.len() > max {
        return Err(EngineError::validation(format!(
            "at most {} indexes can be compared at once ({} selected)",
            max,
            unique.len()
        )));
    }
    Ok(unique)
}

pub struct ConfigDiffEngine<'a> {
    client: &'a dyn IndexClient,
    config: &'a EngineConfig,
    log: &'a ProgressLog,
}

impl<'a> ConfigDiffEngine<'a> {
    pub fn new(client: &'a dyn IndexClient, config: &'a EngineConfig, log: &'a ProgressLog) -> Self {
        Self { client, config, log }
    }

    /// Fetch `facet` from every index concurrently and diff against the first
    pub async fn compare(
        &self,
        indexes: &[String],
        facet: Facet,
        differences_only: bool,
    ) -> EngineResult<Comparison> {
        let indexes = match validate_selection(indexes, self.config.max_compare_indexes) {
            Ok(indexes) => indexes,
            Err(e) => {
                self.log.error(e.to_string());
                return Err(e);
            }
        };

        self.log.info(
            None,
            format!("fetching {} from {} indexes", facet, indexes.len()),
        );
        let fetches = indexes.iter().map(|index| self.fetch(index, facet));
        let configs = join_all(fetches)
            .await
            .into_iter()
            .collect::<EngineResult<Vec<_>>>()
            .inspect_err(|e| self.log.error(e.to_string()))?;

        let rows = build_rows(&indexes, &configs, differences_only);
        let differing = rows.iter().filter(|r| r.has_difference()).count();
        self.log.success(
            None,
            format!("{} rows, {} with differences", rows.len(), differing),
        );

        Ok(Comparison {
            facet,
            indexes,
            configs,
            rows,
        })
    }

    async fn fetch(&self, index: &str, facet: Facet) -> EngineResult<FacetConfig> {
        let client = self.client;
        let what = format!("read {} of {}", facet, index);
        let config = match facet {
            Facet::Rules => {
                let rules = with_read_retry(self.config, &what, || collect_rules(client, index)).await?;
                FacetConfig::Rules(rules)
            }
            Facet::SearchableAttributes | Facet::Facets => {
                let settings =
                    with_read_retry(self.config, &what, || client.get_settings(index)).await?;
                let attrs = match facet {
                    Facet::SearchableAttributes => settings.searchable_attributes(),
                    _ => settings.attributes_for_faceting(),
                };
                FacetConfig::Attributes(attrs)
            }
        };
        log::debug!("{}: {} {} entries", index, config.len(), facet);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(values: &[&str]) -> FacetConfig {
        FacetConfig::Attributes(values.iter().map(|s| s.to_string()).collect())
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_display_key() {
        assert_eq!(display_key("unordered(brand)"), "brand - Unordered");
        assert_eq!(display_key("title"), "title");
        assert_eq!(display_key("unordered(brand"), "unordered(brand");
    }

    #[test]
    fn test_classification_against_base() {
        let indexes = names(&["A", "B"]);
        let configs = vec![attrs(&["title", "brand"]), attrs(&["title", "color"])];
        let rows = build_rows(&indexes, &configs, false);

        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["brand", "color", "title"]);

        assert_eq!(rows[0].cells[1].classification, Classification::Removed);
        assert_eq!(rows[0].cells[1].display(), MISSING_MARKER);
        assert_eq!(rows[1].cells[1].classification, Classification::Added);
        assert_eq!(rows[1].cells[0].display(), "");
        assert_eq!(rows[2].cells[1].classification, Classification::Unchanged);
        assert_eq!(rows[2].cells[0].classification, Classification::Base);

        let diff_only = build_rows(&indexes, &configs, true);
        assert_eq!(diff_only.len(), 2);
        assert!(diff_only.iter().all(|r| r.key != "title"));
    }

    #[test]
    fn test_unordered_sorts_by_display_key() {
        let indexes = names(&["A", "B"]);
        let configs = vec![attrs(&["unordered(zeta)", "alpha"]), attrs(&["Beta"])];
        let rows = build_rows(&indexes, &configs, false);
        let display: Vec<&str> = rows.iter().map(|r| r.display_key.as_str()).collect();
        assert_eq!(display, vec!["alpha", "Beta", "zeta - Unordered"]);
        assert_eq!(rows[2].key, "unordered(zeta)");
    }

    #[test]
    fn test_render_rule() {
        let mut rule = Rule::new("promo");
        rule.enabled = Some(false);
        assert_eq!(
            render_rule(&rule),
            "objectID: promo\nenabled: false\nconditions.filters:\n  (none)"
        );
        rule.conditions = vec![
            crate::client::RuleCondition {
                filters: Some("brand:acme".into()),
                ..Default::default()
            },
            crate::client::RuleCondition {
                filters: Some("color:red".into()),
                ..Default::default()
            },
        ];
        assert!(render_rule(&rule).ends_with("conditions.filters:\n  brand:acme\n  color:red"));
    }

    #[test]
    fn test_validate_selection() {
        assert!(validate_selection(&names(&["A"]), 100).is_err());
        assert!(validate_selection(&names(&["A", "A"]), 100).is_err());
        assert_eq!(
            validate_selection(&names(&["B", "A", "B", "C"]), 100).unwrap(),
            names(&["B", "A", "C"])
        );
        assert!(validate_selection(&names(&["A", "B", "C"]), 2).is_err());
    }

    #[test]
    fn test_facet_parse() {
        assert_eq!("searchable".parse::<Facet>().unwrap(), Facet::SearchableAttributes);
        assert_eq!("attributes-for-faceting".parse::<Facet>().unwrap(), Facet::Facets);
        assert!("synonyms".parse::<Facet>().is_err());
    }
}
