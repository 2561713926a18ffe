//! idxsync - bulk record operations and configuration diffs for hosted search indexes
//!
//! The library is organised around three engines:
//!
//! - [`IdentifierResolver`] turns pasted values into concrete records, either by
//!   identifier or by matching an attribute (the index's distinct attribute by default).
//! - [`BatchMutator`] exports, partially updates, deletes or clones records across
//!   a list of target indexes, one target at a time, isolating per-target failures.
//!   It also copies recommendation rules from one index onto many.
//! - [`ConfigDiffEngine`] fetches one configuration facet from several indexes
//!   concurrently and classifies every entry against the first index.
//!
//! All remote access goes through the [`IndexClient`] trait; [`HttpIndexClient`]
//! implements it over the service's REST API. Progress is recorded in a
//! [`ProgressLog`].
//!
//! ```no_run
//! use idxsync::*;
//!
//! # async fn run() -> EngineResult<()> {
//! let store = CredentialStore::with_primary(Credentials::new("APPID", "key")?);
//! let config = EngineConfig::default();
//! let mutator = BatchMutator::new(connect(&store, &config)?, config, ProgressLog::new());
//!
//! let selection = Selection::attribute(RawValueList::parse("G1, G2"), None);
//! let report = mutator
//!     .delete(&[MutationTarget::primary("products")], &selection, true)
//!     .await?;
//! println!("{}", report.status);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod catalog;
pub mod client;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod diff;
pub mod error;
pub mod format;
pub mod http;
pub mod mutator;
pub mod progress;
pub mod resolver;
pub mod retry;
pub mod table;
pub mod values;

pub use analytics::{AnalyticsClient, SearchStat, TopSearchesQuery, top_no_result_searches};
pub use catalog::{AttributeDiscovery, discover_attributes, list_primary_indexes, suggest};
pub use client::{
    BatchSink, BrowseParams, ClientPair, IndexClient, IndexInfo, IndexSettings, RecommendModel,
    RecommendRule, Record, Rule, RuleCondition, SearchParams, SearchResponse, Synonym,
};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use credentials::{CredentialStore, Credentials, Tenant};
pub use diff::{
    Classification, Comparison, ConfigDiffEngine, DiffCell, DiffRow, Facet, FacetConfig,
};
pub use error::{EngineError, EngineResult};
pub use http::{HttpAnalyticsClient, HttpIndexClient, connect};
pub use mutator::{
    BatchMutator, CopyPhase, CopyPhases, CopyRequest, ExportFile, ExportRequest, MutationResult,
    MutationTarget, Operation, OperationReport, OperationStatus, Outcome, RecommendCopyMode,
    RecommendCopyRequest, TargetStatus, UpdatePayload, UpdateRequest,
};
pub use progress::{Channel, EventKind, LogEvent, ProgressLog};
pub use resolver::{FilterClause, IdentifierResolver, Resolution, ResolutionMode, Selection};
pub use table::{ColumnSchema, UpdateRow, UpdateTable};
pub use values::{CellValue, ColumnType, RawValueList};
