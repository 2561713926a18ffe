// Index catalog and attribute discovery
use crate::client::{IndexClient, SearchParams};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::retry::with_read_retry;
use std::collections::BTreeSet;

/// Primary index names, trimmed, deduplicated and sorted; replicas are skipped
pub async fn list_primary_indexes(
    client: &dyn IndexClient,
    config: &EngineConfig,
) -> EngineResult<Vec<String>> {
    let indices = with_read_retry(config, "list indexes", || client.list_indices()).await?;
    let total = indices.len();
    let names: BTreeSet<String> = indices
        .into_iter()
        .filter(|info| !info.is_replica())
        .map(|info| info.name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    log::debug!("{} indexes listed, {} primary", total, names.len());
    Ok(names.into_iter().collect())
}

/// Case-insensitive substring matches, in catalog order
pub fn suggest<'a>(names: &'a [String], query: &str, limit: usize) -> Vec<&'a str> {
    let needle = query.trim().to_lowercase();
    names
        .iter()
        .filter(|name| needle.is_empty() || name.to_lowercase().contains(&needle))
        .take(limit)
        .map(String::as_str)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeDiscovery {
    pub index: String,
    /// Configured distinct attribute, if any
    pub distinct_attribute: Option<String>,
    /// Sorted union of attribute names over the sampled hits
    pub attributes: Vec<String>,
    pub sampled: usize,
}

/// Read the distinct attribute and sample the first hits of an empty query
pub async fn discover_attributes(
    client: &dyn IndexClient,
    config: &EngineConfig,
    index: &str,
) -> EngineResult<AttributeDiscovery> {
    let settings = with_read_retry(config, "read settings", || client.get_settings(index)).await?;
    let params = SearchParams {
        hits_per_page: config.attribute_sample_size,
        filters: None,
    };
    let response = with_read_retry(config, "sample records", || client.search(index, "", &params)).await?;

    let attributes: BTreeSet<&str> = response.hits.iter().flat_map(|hit| hit.keys()).collect();
    Ok(AttributeDiscovery {
        index: index.to_string(),
        distinct_attribute: settings.distinct_attribute().map(str::to_string),
        attributes: attributes.into_iter().map(str::to_string).collect(),
        sampled: response.hits.len(),
    })
}
