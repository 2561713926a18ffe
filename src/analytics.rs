//! Search analytics: most frequent queries that returned nothing

use crate::config::EngineConfig;
use crate::constants;
use crate::error::{EngineError, EngineResult};
use crate::progress::ProgressLog;
use crate::retry::with_read_retry;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopSearchesQuery {
    pub index: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub limit: usize,
    pub with_no_results: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStat {
    pub search: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub nb_hits: u64,
}

#[async_trait]
pub trait AnalyticsClient: Send + Sync {
    async fn top_searches(&self, query: &TopSearchesQuery) -> EngineResult<Vec<SearchStat>>;
}

/// Queries with zero hits over the `days` days ending at `today`.
///
/// The fetch is retried on transient errors; blank queries and entries that
/// did return hits are dropped.
pub async fn top_no_result_searches(
    client: &dyn AnalyticsClient,
    config: &EngineConfig,
    log: &ProgressLog,
    index: &str,
    days: u32,
    today: NaiveDate,
) -> EngineResult<Vec<SearchStat>> {
    let index = index.trim();
    if index.is_empty() {
        let e = EngineError::validation("an index name is required");
        log.error(e.to_string());
        return Err(e);
    }

    let query = TopSearchesQuery {
        index: index.to_string(),
        start_date: today - Duration::days(i64::from(days.max(1))),
        end_date: today,
        limit: constants::ANALYTICS_RESULT_LIMIT,
        with_no_results: true,
    };
    log.info(Some(index), format!("fetching top searches for the last {} days", days.max(1)));

    let searches = with_read_retry(config, "top searches", || client.top_searches(&query))
        .await
        .inspect_err(|e| log.error(format!("analytics fetch failed after retries: {}", e)))?;

    let searches: Vec<SearchStat> = searches
        .into_iter()
        .filter(|s| !s.search.trim().is_empty() && s.nb_hits == 0)
        .collect();

    if searches.is_empty() {
        log.notice(Some(index), "no searches with zero results for this period");
    } else {
        log.success(
            Some(index),
            format!("{} searches with no results", searches.len()),
        );
    }
    Ok(searches)
}
