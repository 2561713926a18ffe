#![allow(dead_code)]

use async_trait::async_trait;
use idxsync::{
    BatchMutator, BatchSink, BrowseParams, ClientPair, EngineConfig, EngineError, EngineResult,
    IndexClient, IndexInfo, IndexSettings, ProgressLog, RecommendModel, RecommendRule, Record,
    Rule, RuleCondition, SearchParams, SearchResponse, Synonym,
};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Client primitive, used to inject failures and inspect calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListIndices,
    Search,
    Browse,
    GetObjects,
    SaveObjects,
    PartialUpdate,
    Delete,
    GetSettings,
    SetSettings,
    BrowseRules,
    SaveRules,
    BrowseSynonyms,
    SaveSynonyms,
    BrowseRecommendRules,
    SaveRecommendRules,
    DeleteRecommendRule,
}

impl Op {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Op::SaveObjects
                | Op::PartialUpdate
                | Op::Delete
                | Op::SetSettings
                | Op::SaveRules
                | Op::SaveSynonyms
                | Op::SaveRecommendRules
                | Op::DeleteRecommendRule
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    pub records: Vec<Record>,
    pub settings: IndexSettings,
    pub rules: Vec<Rule>,
    pub synonyms: Vec<Synonym>,
    pub recommend_rules: BTreeMap<RecommendModel, Vec<RecommendRule>>,
    pub primary: Option<String>,
}

impl MemoryIndex {
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn distinct(mut self, attribute: &str) -> Self {
        self.settings
            .0
            .insert("attributeForDistinct".to_string(), json!(attribute));
        self
    }

    pub fn setting(mut self, key: &str, value: Value) -> Self {
        self.settings.0.insert(key.to_string(), value);
        self
    }

    pub fn rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn synonyms(mut self, synonyms: Vec<Synonym>) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn recommend_rules(mut self, model: RecommendModel, rules: Vec<RecommendRule>) -> Self {
        self.recommend_rules.insert(model, rules);
        self
    }

    pub fn recommend_ids(&self, model: RecommendModel) -> Vec<String> {
        self.recommend_rules
            .get(&model)
            .map(|rules| rules.iter().map(|r| r.object_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn replica_of(mut self, primary: &str) -> Self {
        self.primary = Some(primary.to_string());
        self
    }
}

struct Failure {
    status: u16,
    remaining: u32,
}

/// In-memory stand-in for the hosted service
pub struct MemoryIndexClient {
    tenant: String,
    indexes: Mutex<BTreeMap<String, MemoryIndex>>,
    failures: Mutex<HashMap<(String, Op), Failure>>,
    calls: Mutex<Vec<(Op, String)>>,
    page_size: usize,
}

impl MemoryIndexClient {
    pub fn new(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            indexes: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            page_size: 2,
        }
    }

    pub fn with_index(self, name: &str, index: MemoryIndex) -> Self {
        self.indexes.lock().unwrap().insert(name.to_string(), index);
        self
    }

    /// Every call of `op` on `index` fails with `status`
    pub fn fail(&self, index: &str, op: Op, status: u16) {
        self.fail_times(index, op, status, u32::MAX);
    }

    /// The next `times` calls of `op` on `index` fail with `status`
    pub fn fail_times(&self, index: &str, op: Op, status: u16, times: u32) {
        self.failures.lock().unwrap().insert(
            (index.to_string(), op),
            Failure {
                status,
                remaining: times,
            },
        );
    }

    pub fn index(&self, name: &str) -> Option<MemoryIndex> {
        self.indexes.lock().unwrap().get(name).cloned()
    }

    pub fn record(&self, index: &str, id: &str) -> Option<Record> {
        self.index(index)?
            .records
            .into_iter()
            .find(|r| r.object_id == id)
    }

    pub fn record_count(&self, index: &str) -> usize {
        self.index(index).map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<(Op, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(Op, String)> {
        self.calls()
            .into_iter()
            .filter(|(op, _)| op.is_write())
            .collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|(o, _)| *o == op).count()
    }

    fn enter(&self, op: Op, index: &str) -> EngineResult<()> {
        self.calls.lock().unwrap().push((op, index.to_string()));
        let mut failures = self.failures.lock().unwrap();
        if let Some(failure) = failures.get_mut(&(index.to_string(), op))
            && failure.remaining > 0
        {
            failure.remaining -= 1;
            return Err(EngineError::remote(
                failure.status,
                format!("injected {:?} failure", op),
            ));
        }
        Ok(())
    }

    fn read<T>(&self, index: &str, f: impl FnOnce(&MemoryIndex) -> T) -> EngineResult<T> {
        let indexes = self.indexes.lock().unwrap();
        match indexes.get(index) {
            Some(idx) => Ok(f(idx)),
            None => Err(EngineError::remote(404, format!("index {} does not exist", index))),
        }
    }

    fn write<T>(&self, index: &str, f: impl FnOnce(&mut MemoryIndex) -> T) -> T {
        let mut indexes = self.indexes.lock().unwrap();
        f(indexes.entry(index.to_string()).or_default())
    }
}

fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Array(items) => items.iter().any(|v| value_matches(v, expected)),
        _ => false,
    }
}

/// Evaluate `attr:"value" AND attr:"value"` against a record
fn filter_matches(record: &Record, filters: &str) -> bool {
    filters.split(" AND ").all(|clause| {
        let Some((attribute, value)) = clause.split_once(':') else {
            return false;
        };
        let value = value
            .trim()
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value)
            .replace("\\\"", "\"");
        record
            .get(attribute.trim())
            .is_some_and(|v| value_matches(&v, &value))
    })
}

fn project(record: &Record, attributes: Option<&[String]>) -> Record {
    let Some(attributes) = attributes else {
        return record.clone();
    };
    let mut projected = Record::new(record.object_id.clone());
    for name in attributes {
        if let Some(value) = record.attributes.get(name) {
            projected.attributes.insert(name.clone(), value.clone());
        }
    }
    projected
}

#[async_trait]
impl IndexClient for MemoryIndexClient {
    fn tenant_id(&self) -> &str {
        &self.tenant
    }

    async fn list_indices(&self) -> EngineResult<Vec<IndexInfo>> {
        self.enter(Op::ListIndices, "*")?;
        let indexes = self.indexes.lock().unwrap();
        Ok(indexes
            .iter()
            .map(|(name, index)| IndexInfo {
                name: name.clone(),
                primary: index.primary.clone(),
                entries: index.records.len() as u64,
            })
            .collect())
    }

    async fn search(
        &self,
        index: &str,
        _query: &str,
        params: &SearchParams,
    ) -> EngineResult<SearchResponse> {
        self.enter(Op::Search, index)?;
        self.read(index, |idx| {
            let matching: Vec<&Record> = idx
                .records
                .iter()
                .filter(|r| params.filters.as_deref().is_none_or(|f| filter_matches(r, f)))
                .collect();
            SearchResponse {
                nb_hits: matching.len() as u64,
                hits: matching
                    .into_iter()
                    .take(params.hits_per_page)
                    .cloned()
                    .collect(),
            }
        })
    }

    async fn browse_objects(
        &self,
        index: &str,
        params: &BrowseParams,
        on_batch: BatchSink<'_, Record>,
    ) -> EngineResult<()> {
        self.enter(Op::Browse, index)?;
        let records = self.read(index, |idx| {
            idx.records
                .iter()
                .filter(|r| params.filters.as_deref().is_none_or(|f| filter_matches(r, f)))
                .map(|r| project(r, params.attributes_to_retrieve.as_deref()))
                .collect::<Vec<_>>()
        })?;
        for page in records.chunks(self.page_size) {
            on_batch(page.to_vec());
        }
        Ok(())
    }

    async fn get_objects(
        &self,
        index: &str,
        ids: &[String],
        attributes_to_retrieve: Option<&[String]>,
    ) -> EngineResult<Vec<Option<Record>>> {
        self.enter(Op::GetObjects, index)?;
        self.read(index, |idx| {
            ids.iter()
                .map(|id| {
                    idx.records
                        .iter()
                        .find(|r| &r.object_id == id)
                        .map(|r| project(r, attributes_to_retrieve))
                })
                .collect()
        })
    }

    async fn save_objects(&self, index: &str, records: &[Record]) -> EngineResult<()> {
        self.enter(Op::SaveObjects, index)?;
        self.write(index, |idx| {
            for record in records {
                match idx.records.iter_mut().find(|r| r.object_id == record.object_id) {
                    Some(existing) => *existing = record.clone(),
                    None => idx.records.push(record.clone()),
                }
            }
        });
        Ok(())
    }

    async fn partial_update_objects(
        &self,
        index: &str,
        updates: &[Record],
        create_if_not_exists: bool,
    ) -> EngineResult<()> {
        self.enter(Op::PartialUpdate, index)?;
        self.write(index, |idx| {
            for update in updates {
                match idx.records.iter_mut().find(|r| r.object_id == update.object_id) {
                    Some(existing) => {
                        for (name, value) in &update.attributes {
                            existing.attributes.insert(name.clone(), value.clone());
                        }
                    }
                    None if create_if_not_exists => idx.records.push(update.clone()),
                    None => {}
                }
            }
        });
        Ok(())
    }

    async fn delete_objects(&self, index: &str, ids: &[String]) -> EngineResult<()> {
        self.enter(Op::Delete, index)?;
        self.write(index, |idx| idx.records.retain(|r| !ids.contains(&r.object_id)));
        Ok(())
    }

    async fn get_settings(&self, index: &str) -> EngineResult<IndexSettings> {
        self.enter(Op::GetSettings, index)?;
        self.read(index, |idx| idx.settings.clone())
    }

    async fn set_settings(&self, index: &str, settings: &IndexSettings) -> EngineResult<()> {
        self.enter(Op::SetSettings, index)?;
        self.write(index, |idx| idx.settings = settings.clone());
        Ok(())
    }

    async fn browse_rules(&self, index: &str, on_batch: BatchSink<'_, Rule>) -> EngineResult<()> {
        self.enter(Op::BrowseRules, index)?;
        let rules = self.read(index, |idx| idx.rules.clone())?;
        for page in rules.chunks(self.page_size) {
            on_batch(page.to_vec());
        }
        Ok(())
    }

    async fn save_rules(
        &self,
        index: &str,
        rules: &[Rule],
        clear_existing_rules: bool,
    ) -> EngineResult<()> {
        self.enter(Op::SaveRules, index)?;
        self.write(index, |idx| {
            if clear_existing_rules {
                idx.rules.clear();
            }
            idx.rules.extend(rules.iter().cloned());
        });
        Ok(())
    }

    async fn browse_synonyms(
        &self,
        index: &str,
        on_batch: BatchSink<'_, Synonym>,
    ) -> EngineResult<()> {
        self.enter(Op::BrowseSynonyms, index)?;
        let synonyms = self.read(index, |idx| idx.synonyms.clone())?;
        for page in synonyms.chunks(self.page_size) {
            on_batch(page.to_vec());
        }
        Ok(())
    }

    async fn save_synonyms(
        &self,
        index: &str,
        synonyms: &[Synonym],
        clear_existing_synonyms: bool,
    ) -> EngineResult<()> {
        self.enter(Op::SaveSynonyms, index)?;
        self.write(index, |idx| {
            if clear_existing_synonyms {
                idx.synonyms.clear();
            }
            idx.synonyms.extend(synonyms.iter().cloned());
        });
        Ok(())
    }

    async fn browse_recommend_rules(
        &self,
        index: &str,
        model: RecommendModel,
        on_batch: BatchSink<'_, RecommendRule>,
    ) -> EngineResult<()> {
        self.enter(Op::BrowseRecommendRules, index)?;
        let rules = self.read(index, |idx| {
            idx.recommend_rules.get(&model).cloned().unwrap_or_default()
        })?;
        for page in rules.chunks(self.page_size) {
            on_batch(page.to_vec());
        }
        Ok(())
    }

    async fn save_recommend_rules(
        &self,
        index: &str,
        model: RecommendModel,
        rules: &[RecommendRule],
    ) -> EngineResult<()> {
        self.enter(Op::SaveRecommendRules, index)?;
        self.write(index, |idx| {
            let stored = idx.recommend_rules.entry(model).or_default();
            for rule in rules {
                match stored.iter_mut().find(|r| r.object_id == rule.object_id) {
                    Some(existing) => *existing = rule.clone(),
                    None => stored.push(rule.clone()),
                }
            }
        });
        Ok(())
    }

    async fn delete_recommend_rule(
        &self,
        index: &str,
        model: RecommendModel,
        object_id: &str,
    ) -> EngineResult<()> {
        self.enter(Op::DeleteRecommendRule, index)?;
        self.write(index, |idx| {
            if let Some(stored) = idx.recommend_rules.get_mut(&model) {
                stored.retain(|r| r.object_id != object_id);
            }
        });
        Ok(())
    }
}

/// Config with a short retry delay so retrying tests stay fast
pub fn test_config() -> EngineConfig {
    EngineConfig::builder()
        .read_retry_delay(Duration::from_millis(1))
        .build()
}

pub fn mutator(client: Arc<MemoryIndexClient>) -> BatchMutator {
    BatchMutator::new(ClientPair::new(client), test_config(), ProgressLog::new())
}

pub fn cross_tenant_mutator(
    source: Arc<MemoryIndexClient>,
    destination: Arc<MemoryIndexClient>,
) -> BatchMutator {
    BatchMutator::new(
        ClientPair::new(source).with_destination(destination),
        test_config(),
        ProgressLog::new(),
    )
}

pub fn product(id: &str, group: &str, color: &str, price: f64) -> Record {
    Record::new(id)
        .with("group", group)
        .with("color", color)
        .with("price", price)
}

/// Catalog of variants grouped by `group`, distinct on `group`
pub fn catalog() -> MemoryIndex {
    MemoryIndex::with_records(vec![
        product("1", "G1", "red", 10.0),
        product("2", "G1", "blue", 11.0),
        product("3", "G1", "green", 12.0),
        product("4", "G1", "black", 13.0),
        product("5", "G1", "white", 14.0),
        product("6", "G4", "red", 20.0),
        product("7", "G3", "red", 30.0),
    ])
    .distinct("group")
}

pub fn rule(id: &str, enabled: Option<bool>, filters: &[&str]) -> Rule {
    let mut rule = Rule::new(id);
    rule.enabled = enabled;
    rule.conditions = filters
        .iter()
        .map(|f| RuleCondition {
            filters: Some(f.to_string()),
            extra: Map::new(),
        })
        .collect();
    rule
}

pub fn synonym(id: &str, words: &[&str]) -> Synonym {
    let mut body = Map::new();
    body.insert("type".to_string(), json!("synonym"));
    body.insert("synonyms".to_string(), json!(words));
    Synonym {
        object_id: id.to_string(),
        body,
    }
}

pub fn recommend_rule(id: &str, item: &str) -> RecommendRule {
    let mut rule = RecommendRule::new(id);
    rule.body
        .insert("condition".to_string(), json!({ "context": item }));
    rule.body
        .insert("consequence".to_string(), json!({ "promote": [{ "objectID": item }] }));
    rule
}
