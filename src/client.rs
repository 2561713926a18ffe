//! Remote index client abstraction
//!
//! [`IndexClient`] is the seam between the engines and the hosted search
//! service. Every call is a suspension point; implementations must drain all
//! pages of a browse before returning.

use crate::constants;
use crate::credentials::Tenant;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A record as stored in an index: its identifier plus arbitrary attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            attributes: Map::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute lookup that also answers for the identifier column
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == constants::OBJECT_ID {
            return Some(Value::String(self.object_id.clone()));
        }
        self.attributes.get(name).cloned()
    }

    /// Every key present on the record, identifier included
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(constants::OBJECT_ID).chain(self.attributes.keys().map(String::as_str))
    }
}

/// Options for a paginated browse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowseParams {
    pub filters: Option<String>,
    pub attributes_to_retrieve: Option<Vec<String>>,
}

impl BrowseParams {
    pub fn filtered(filters: impl Into<String>) -> Self {
        Self {
            filters: Some(filters.into()),
            ..Default::default()
        }
    }

    pub fn retrieve(mut self, attributes: Option<Vec<String>>) -> Self {
        self.attributes_to_retrieve = attributes;
        self
    }
}

/// Options for a single search page
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub hits_per_page: usize,
    pub filters: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            hits_per_page: constants::DEFAULT_ATTRIBUTE_SAMPLE_SIZE,
            filters: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<Record>,
    #[serde(default)]
    pub nb_hits: u64,
}

/// Entry of the index listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    /// Set when this index is a replica of `primary`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default)]
    pub entries: u64,
}

impl IndexInfo {
    pub fn is_replica(&self) -> bool {
        self.primary.is_some()
    }
}

/// Index settings document, kept as an open JSON map so unknown keys round-trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexSettings(pub Map<String, Value>);

impl IndexSettings {
    /// Configured distinct attribute; blank values count as unset
    pub fn distinct_attribute(&self) -> Option<&str> {
        self.0
            .get(constants::DISTINCT_SETTING)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn searchable_attributes(&self) -> Vec<String> {
        self.string_list(constants::SEARCHABLE_SETTING)
    }

    pub fn attributes_for_faceting(&self) -> Vec<String> {
        self.string_list(constants::FACETING_SETTING)
    }

    pub fn replicas(&self) -> Vec<String> {
        self.string_list(constants::REPLICAS_SETTING)
    }

    /// Copy of the settings with replica references removed
    pub fn without_replicas(&self) -> Self {
        let mut settings = self.0.clone();
        settings.remove(constants::REPLICAS_SETTING);
        Self(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query rule; only the fields the engines inspect are typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RuleCondition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Rule {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            enabled: None,
            conditions: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Rules without an explicit flag are live
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Non-empty filter expressions of every condition, in order
    pub fn condition_filters(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .filter_map(|c| c.filters.as_deref())
            .filter(|f| !f.is_empty())
            .collect()
    }

    pub fn without_search_metadata(mut self) -> Self {
        strip_search_metadata(&mut self.extra);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synonym {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Synonym {
    pub fn without_search_metadata(mut self) -> Self {
        strip_search_metadata(&mut self.body);
        self
    }
}

/// Remove the highlight and metadata blocks search endpoints attach to hits
pub fn strip_search_metadata(fields: &mut Map<String, Value>) {
    for key in constants::SEARCH_METADATA_KEYS {
        fields.remove(key);
    }
}

/// Recommendation model whose rules are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RecommendModel {
    #[default]
    RelatedProducts,
    BoughtTogether,
    LookingSimilar,
    TrendingItems,
}

impl RecommendModel {
    /// Path segment used by the service
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendModel::RelatedProducts => "related-products",
            RecommendModel::BoughtTogether => "bought-together",
            RecommendModel::LookingSimilar => "looking-similar",
            RecommendModel::TrendingItems => "trending-items",
        }
    }
}

impl fmt::Display for RecommendModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendModel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "related-products" | "related" => Ok(RecommendModel::RelatedProducts),
            "bought-together" | "frequently-bought-together" => Ok(RecommendModel::BoughtTogether),
            "looking-similar" => Ok(RecommendModel::LookingSimilar),
            "trending-items" => Ok(RecommendModel::TrendingItems),
            other => Err(EngineError::validation(format!(
                "unknown recommend model '{}'",
                other
            ))),
        }
    }
}

/// Rule attached to a recommendation model; the body is kept opaque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendRule {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl RecommendRule {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            body: Map::new(),
        }
    }

    pub fn without_search_metadata(mut self) -> Self {
        strip_search_metadata(&mut self.body);
        self
    }
}

/// Per-page callback used by the browse primitives
pub type BatchSink<'a, T> = &'a mut (dyn FnMut(Vec<T>) + Send);

/// Primitives of the hosted index service consumed by the engines
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Tenant application this client is bound to
    fn tenant_id(&self) -> &str;

    async fn list_indices(&self) -> EngineResult<Vec<IndexInfo>>;

    async fn search(
        &self,
        index: &str,
        query: &str,
        params: &SearchParams,
    ) -> EngineResult<SearchResponse>;

    /// Stream every matching record, invoking `on_batch` once per page
    async fn browse_objects(
        &self,
        index: &str,
        params: &BrowseParams,
        on_batch: BatchSink<'_, Record>,
    ) -> EngineResult<()>;

    /// Bounded multi-get; missing identifiers come back as `None` in request order
    async fn get_objects(
        &self,
        index: &str,
        ids: &[String],
        attributes_to_retrieve: Option<&[String]>,
    ) -> EngineResult<Vec<Option<Record>>>;

    /// Full upsert keeping the supplied identifiers
    async fn save_objects(&self, index: &str, records: &[Record]) -> EngineResult<()>;

    /// Merge supplied fields into existing records
    async fn partial_update_objects(
        &self,
        index: &str,
        updates: &[Record],
        create_if_not_exists: bool,
    ) -> EngineResult<()>;

    async fn delete_objects(&self, index: &str, ids: &[String]) -> EngineResult<()>;

    async fn get_settings(&self, index: &str) -> EngineResult<IndexSettings>;

    async fn set_settings(&self, index: &str, settings: &IndexSettings) -> EngineResult<()>;

    async fn browse_rules(&self, index: &str, on_batch: BatchSink<'_, Rule>) -> EngineResult<()>;

    async fn save_rules(
        &self,
        index: &str,
        rules: &[Rule],
        clear_existing_rules: bool,
    ) -> EngineResult<()>;

    async fn browse_synonyms(
        &self,
        index: &str,
        on_batch: BatchSink<'_, Synonym>,
    ) -> EngineResult<()>;

    async fn save_synonyms(
        &self,
        index: &str,
        synonyms: &[Synonym],
        clear_existing_synonyms: bool,
    ) -> EngineResult<()>;

    async fn browse_recommend_rules(
        &self,
        index: &str,
        model: RecommendModel,
        on_batch: BatchSink<'_, RecommendRule>,
    ) -> EngineResult<()>;

    /// Upsert by identifier; rules not in `rules` are left alone
    async fn save_recommend_rules(
        &self,
        index: &str,
        model: RecommendModel,
        rules: &[RecommendRule],
    ) -> EngineResult<()>;

    async fn delete_recommend_rule(
        &self,
        index: &str,
        model: RecommendModel,
        object_id: &str,
    ) -> EngineResult<()>;
}

/// Drain a browse into memory
pub async fn collect_objects(
    client: &dyn IndexClient,
    index: &str,
    params: &BrowseParams,
) -> EngineResult<Vec<Record>> {
    let mut records = Vec::new();
    client
        .browse_objects(index, params, &mut |batch: Vec<Record>| records.extend(batch))
        .await?;
    Ok(records)
}

pub async fn collect_rules(client: &dyn IndexClient, index: &str) -> EngineResult<Vec<Rule>> {
    let mut rules = Vec::new();
    client
        .browse_rules(index, &mut |batch: Vec<Rule>| rules.extend(batch))
        .await?;
    Ok(rules)
}

pub async fn collect_synonyms(
    client: &dyn IndexClient,
    index: &str,
) -> EngineResult<Vec<Synonym>> {
    let mut synonyms = Vec::new();
    client
        .browse_synonyms(index, &mut |batch: Vec<Synonym>| synonyms.extend(batch))
        .await?;
    Ok(synonyms)
}

pub async fn collect_recommend_rules(
    client: &dyn IndexClient,
    index: &str,
    model: RecommendModel,
) -> EngineResult<Vec<RecommendRule>> {
    let mut rules = Vec::new();
    client
        .browse_recommend_rules(index, model, &mut |batch: Vec<RecommendRule>| {
            rules.extend(batch)
        })
        .await?;
    Ok(rules)
}

/// Source and optional destination handles for one operation.
///
/// Copy sources are always read through `source`. Everything addressed to a
/// [`Tenant::Secondary`] target goes through `destination` when one is set.
#[derive(Clone)]
pub struct ClientPair {
    source: Arc<dyn IndexClient>,
    destination: Option<Arc<dyn IndexClient>>,
}

impl ClientPair {
    pub fn new(source: Arc<dyn IndexClient>) -> Self {
        Self {
            source,
            destination: None,
        }
    }

    pub fn with_destination(mut self, destination: Arc<dyn IndexClient>) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn source(&self) -> &dyn IndexClient {
        self.source.as_ref()
    }

    pub fn for_tenant(&self, tenant: Tenant) -> &dyn IndexClient {
        match (tenant, &self.destination) {
            (Tenant::Secondary, Some(destination)) => destination.as_ref(),
            _ => self.source.as_ref(),
        }
    }

    pub fn is_cross_tenant(&self) -> bool {
        self.destination
            .as_ref()
            .is_some_and(|d| d.tenant_id() != self.source.tenant_id())
    }
}
