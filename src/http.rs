// HTTP adapters for the hosted search and analytics REST APIs
use crate::analytics::{AnalyticsClient, SearchStat, TopSearchesQuery};
use crate::client::{
    BatchSink, BrowseParams, ClientPair, IndexClient, IndexInfo, IndexSettings, RecommendModel,
    RecommendRule, Record, Rule, SearchParams, SearchResponse, Synonym,
};
use crate::config::EngineConfig;
use crate::constants;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const APPLICATION_ID_HEADER: &str = "X-Algolia-Application-Id";
const API_KEY_HEADER: &str = "X-Algolia-API-Key";

/// Objects per batch request
const WRITE_BATCH_SIZE: usize = 1_000;

#[derive(Debug, Clone, Copy)]
enum Host {
    Read,
    Write,
}

/// `IndexClient` over the service's REST API
pub struct HttpIndexClient {
    http: reqwest::Client,
    credentials: Credentials,
    read_host: Url,
    write_host: Url,
}

impl HttpIndexClient {
    /// Client for the tenant's hosted endpoints (`<app>-dsn` for reads, `<app>` for writes)
    pub fn new(credentials: Credentials, config: &EngineConfig) -> EngineResult<Self> {
        let app = credentials.tenant_id.to_lowercase();
        let read = format!("https://{}-dsn.algolia.net", app);
        let write = format!("https://{}.algolia.net", app);
        Self::with_hosts(credentials, config, &read, &write)
    }

    /// Client that sends every request to `base_url`
    pub fn with_base_url(
        credentials: Credentials,
        config: &EngineConfig,
        base_url: &str,
    ) -> EngineResult<Self> {
        Self::with_hosts(credentials, config, base_url, base_url)
    }

    fn with_hosts(
        credentials: Credentials,
        config: &EngineConfig,
        read: &str,
        write: &str,
    ) -> EngineResult<Self> {
        let parse = |raw: &str| {
            Url::parse(raw)
                .map_err(|e| EngineError::validation(format!("invalid service URL '{}': {}", raw, e)))
        };
        Ok(Self {
            http: build_http(config)?,
            read_host: parse(read)?,
            write_host: parse(write)?,
            credentials,
        })
    }

    fn url(&self, host: Host, segments: &[&str]) -> EngineResult<Url> {
        let mut url = match host {
            Host::Read => self.read_host.clone(),
            Host::Write => self.write_host.clone(),
        };
        url.path_segments_mut()
            .map_err(|_| EngineError::validation("service URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        log::debug!("{} {}", method, url.path());
        self.http
            .request(method, url)
            .header(APPLICATION_ID_HEADER, &self.credentials.tenant_id)
            .header(API_KEY_HEADER, &self.credentials.api_key)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        host: Host,
        segments: &[&str],
        body: Option<&Value>,
    ) -> EngineResult<T> {
        let url = self.url(host, segments)?;
        let mut request = self.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        send(request).await
    }

    /// Walk a page-numbered search endpoint (rules, synonyms, recommend rules)
    /// until `nbPages` is reached
    async fn drain_search_pages<T, F>(
        &self,
        segments: &[&str],
        page_size: usize,
        mut emit: F,
    ) -> EngineResult<()>
    where
        T: DeserializeOwned + Send,
        F: FnMut(Vec<T>) + Send,
    {
        let mut page = 0u32;
        loop {
            let body = json!({ "query": "", "page": page, "hitsPerPage": page_size });
            let response: SearchPage<T> = self
                .call(Method::POST, Host::Read, segments, Some(&body))
                .await?;
            emit(response.hits);
            page += 1;
            if page >= response.nb_pages {
                return Ok(());
            }
        }
    }

    /// Send write requests in chunks to the index batch endpoint
    async fn batch(&self, index: &str, requests: Vec<Value>) -> EngineResult<()> {
        for chunk in requests.chunks(WRITE_BATCH_SIZE) {
            let body = json!({ "requests": chunk });
            let task: TaskResponse = self
                .call(Method::POST, Host::Write, &["1", "indexes", index, "batch"], Some(&body))
                .await?;
            log::debug!("{}: batch of {} accepted (task {:?})", index, chunk.len(), task.task_id);
        }
        Ok(())
    }
}

fn build_http(config: &EngineConfig) -> EngineResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(constants::user_agent())
        .build()?)
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> EngineResult<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        return Err(EngineError::remote(status.as_u16(), message));
    }
    Ok(response.json().await?)
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct TaskResponse {
    #[serde(rename = "taskID")]
    task_id: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListIndicesResponse {
    #[serde(default)]
    items: Vec<IndexInfo>,
    #[serde(default)]
    nb_pages: u32,
}

#[derive(Deserialize)]
struct BrowseResponse {
    #[serde(default)]
    hits: Vec<Record>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct MultiGetResponse {
    results: Vec<Option<Record>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    hits: Vec<T>,
    #[serde(default)]
    nb_pages: u32,
}

fn record_body(record: &Record) -> EngineResult<Value> {
    Ok(serde_json::to_value(record)?)
}

#[async_trait]
impl IndexClient for HttpIndexClient {
    fn tenant_id(&self) -> &str {
        &self.credentials.tenant_id
    }

    async fn list_indices(&self) -> EngineResult<Vec<IndexInfo>> {
        let mut items = Vec::new();
        let mut page = 0u32;
        loop {
            let mut url = self.url(Host::Read, &["1", "indexes"])?;
            url.query_pairs_mut().append_pair("page", &page.to_string());
            let response: ListIndicesResponse = send(self.request(Method::GET, url)).await?;
            items.extend(response.items);
            page += 1;
            if page >= response.nb_pages {
                break;
            }
        }
        Ok(items)
    }

    async fn search(
        &self,
        index: &str,
        query: &str,
        params: &SearchParams,
    ) -> EngineResult<SearchResponse> {
        let mut body = json!({ "query": query, "hitsPerPage": params.hits_per_page });
        if let Some(filters) = &params.filters {
            body["filters"] = json!(filters);
        }
        self.call(Method::POST, Host::Read, &["1", "indexes", index, "query"], Some(&body))
            .await
    }

    async fn browse_objects(
        &self,
        index: &str,
        params: &BrowseParams,
        on_batch: BatchSink<'_, Record>,
    ) -> EngineResult<()> {
        let mut body = Map::new();
        body.insert("hitsPerPage".into(), json!(constants::BROWSE_PAGE_SIZE));
        if let Some(filters) = &params.filters {
            body.insert("filters".into(), json!(filters));
        }
        if let Some(attrs) = &params.attributes_to_retrieve {
            body.insert("attributesToRetrieve".into(), json!(attrs));
        }

        let mut pages = 0usize;
        loop {
            let page: BrowseResponse = self
                .call(
                    Method::POST,
                    Host::Read,
                    &["1", "indexes", index, "browse"],
                    Some(&Value::Object(body.clone())),
                )
                .await?;
            pages += 1;
            on_batch(page.hits);
            match page.cursor {
                Some(cursor) => {
                    body.insert("cursor".into(), json!(cursor));
                }
                None => break,
            }
        }
        log::debug!("{}: browse drained {} page(s)", index, pages);
        Ok(())
    }

    async fn get_objects(
        &self,
        index: &str,
        ids: &[String],
        attributes_to_retrieve: Option<&[String]>,
    ) -> EngineResult<Vec<Option<Record>>> {
        let requests: Vec<Value> = ids
            .iter()
            .map(|id| {
                let mut request = json!({ "indexName": index, "objectID": id });
                if let Some(attrs) = attributes_to_retrieve {
                    request["attributesToRetrieve"] = json!(attrs);
                }
                request
            })
            .collect();
        let body = json!({ "requests": requests });
        let response: MultiGetResponse = self
            .call(Method::POST, Host::Read, &["1", "indexes", "*", "objects"], Some(&body))
            .await?;
        Ok(response.results)
    }

    async fn save_objects(&self, index: &str, records: &[Record]) -> EngineResult<()> {
        let requests = records
            .iter()
            .map(|r| -> EngineResult<Value> {
                Ok(json!({ "action": "updateObject", "body": record_body(r)? }))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        self.batch(index, requests).await
    }

    async fn partial_update_objects(
        &self,
        index: &str,
        updates: &[Record],
        create_if_not_exists: bool,
    ) -> EngineResult<()> {
        let action = if create_if_not_exists {
            "partialUpdateObject"
        } else {
            "partialUpdateObjectNoCreate"
        };
        let requests = updates
            .iter()
            .map(|r| -> EngineResult<Value> {
                Ok(json!({ "action": action, "body": record_body(r)? }))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        self.batch(index, requests).await
    }

    async fn delete_objects(&self, index: &str, ids: &[String]) -> EngineResult<()> {
        let requests = ids
            .iter()
            .map(|id| json!({ "action": "deleteObject", "body": { "objectID": id } }))
            .collect();
        self.batch(index, requests).await
    }

    async fn get_settings(&self, index: &str) -> EngineResult<IndexSettings> {
        self.call(Method::GET, Host::Read, &["1", "indexes", index, "settings"], None)
            .await
    }

    async fn set_settings(&self, index: &str, settings: &IndexSettings) -> EngineResult<()> {
        let body = serde_json::to_value(settings)?;
        let _: TaskResponse = self
            .call(Method::PUT, Host::Write, &["1", "indexes", index, "settings"], Some(&body))
            .await?;
        Ok(())
    }

    async fn browse_rules(&self, index: &str, on_batch: BatchSink<'_, Rule>) -> EngineResult<()> {
        self.drain_search_pages(
            &["1", "indexes", index, "rules", "search"],
            constants::BROWSE_PAGE_SIZE,
            |hits: Vec<Rule>| {
                on_batch(hits.into_iter().map(Rule::without_search_metadata).collect())
            },
        )
        .await
    }

    async fn save_rules(
        &self,
        index: &str,
        rules: &[Rule],
        clear_existing_rules: bool,
    ) -> EngineResult<()> {
        let mut url = self.url(Host::Write, &["1", "indexes", index, "rules", "batch"])?;
        url.query_pairs_mut()
            .append_pair("clearExistingRules", &clear_existing_rules.to_string());
        let _: TaskResponse = send(self.request(Method::POST, url).json(rules)).await?;
        Ok(())
    }

    async fn browse_synonyms(
        &self,
        index: &str,
        on_batch: BatchSink<'_, Synonym>,
    ) -> EngineResult<()> {
        self.drain_search_pages(
            &["1", "indexes", index, "synonyms", "search"],
            constants::BROWSE_PAGE_SIZE,
            |hits: Vec<Synonym>| {
                on_batch(hits.into_iter().map(Synonym::without_search_metadata).collect())
            },
        )
        .await
    }

    async fn save_synonyms(
        &self,
        index: &str,
        synonyms: &[Synonym],
        clear_existing_synonyms: bool,
    ) -> EngineResult<()> {
        let mut url = self.url(Host::Write, &["1", "indexes", index, "synonyms", "batch"])?;
        url.query_pairs_mut()
            .append_pair("replaceExistingSynonyms", &clear_existing_synonyms.to_string());
        let _: TaskResponse = send(self.request(Method::POST, url).json(synonyms)).await?;
        Ok(())
    }

    async fn browse_recommend_rules(
        &self,
        index: &str,
        model: RecommendModel,
        on_batch: BatchSink<'_, RecommendRule>,
    ) -> EngineResult<()> {
        self.drain_search_pages(
            &["1", "indexes", index, model.as_str(), "recommend", "rules", "search"],
            constants::RECOMMEND_RULES_PAGE_SIZE,
            |hits: Vec<RecommendRule>| {
                on_batch(
                    hits.into_iter()
                        .map(RecommendRule::without_search_metadata)
                        .collect(),
                )
            },
        )
        .await
    }

    async fn save_recommend_rules(
        &self,
        index: &str,
        model: RecommendModel,
        rules: &[RecommendRule],
    ) -> EngineResult<()> {
        let body = serde_json::to_value(rules)?;
        let _: TaskResponse = self
            .call(
                Method::POST,
                Host::Write,
                &["1", "indexes", index, model.as_str(), "recommend", "rules", "batch"],
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn delete_recommend_rule(
        &self,
        index: &str,
        model: RecommendModel,
        object_id: &str,
    ) -> EngineResult<()> {
        let _: TaskResponse = self
            .call(
                Method::DELETE,
                Host::Write,
                &["1", "indexes", index, model.as_str(), "recommend", "rules", object_id],
                None,
            )
            .await?;
        Ok(())
    }
}

/// Source client from the primary pair, plus a destination client when a
/// distinct destination pair is stored
pub fn connect(store: &CredentialStore, config: &EngineConfig) -> EngineResult<ClientPair> {
    let source = HttpIndexClient::new(store.primary()?, config)?;
    let mut pair = ClientPair::new(Arc::new(source));
    if let Some(destination) = store.destination() {
        log::debug!("destination tenant {}", destination.tenant_id);
        pair = pair.with_destination(Arc::new(HttpIndexClient::new(destination, config)?));
    }
    Ok(pair)
}

/// `AnalyticsClient` over the regional analytics API
pub struct HttpAnalyticsClient {
    http: reqwest::Client,
    credentials: Credentials,
    base: Url,
}

#[derive(Deserialize)]
struct NoResultsResponse {
    #[serde(default)]
    searches: Vec<SearchStat>,
}

impl HttpAnalyticsClient {
    pub fn new(credentials: Credentials, region: &str, config: &EngineConfig) -> EngineResult<Self> {
        let region = region.trim().to_lowercase();
        if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(EngineError::validation(format!(
                "invalid analytics region '{}'",
                region
            )));
        }
        Self::with_base_url(credentials, config, &format!("https://analytics.{}.algolia.com", region))
    }

    pub fn with_base_url(
        credentials: Credentials,
        config: &EngineConfig,
        base_url: &str,
    ) -> EngineResult<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            EngineError::validation(format!("invalid analytics URL '{}': {}", base_url, e))
        })?;
        Ok(Self {
            http: build_http(config)?,
            credentials,
            base,
        })
    }
}

#[async_trait]
impl AnalyticsClient for HttpAnalyticsClient {
    async fn top_searches(&self, query: &TopSearchesQuery) -> EngineResult<Vec<SearchStat>> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::validation("analytics URL cannot be a base"))?
            .pop_if_empty()
            .extend(if query.with_no_results {
                ["2", "searches", "noResults"].as_slice()
            } else {
                ["2", "searches"].as_slice()
            });
        url.query_pairs_mut()
            .append_pair("index", &query.index)
            .append_pair("startDate", &query.start_date.format("%Y-%m-%d").to_string())
            .append_pair("endDate", &query.end_date.format("%Y-%m-%d").to_string())
            .append_pair("limit", &query.limit.to_string());

        log::debug!("GET {}", url.path());
        let request = self
            .http
            .get(url)
            .header(APPLICATION_ID_HEADER, &self.credentials.tenant_id)
            .header(API_KEY_HEADER, &self.credentials.api_key);
        let response: NoResultsResponse = send(request).await?;
        Ok(response.searches)
    }
}
