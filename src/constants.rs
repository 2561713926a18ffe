//! Global constants and helpers for identification, networking defaults, CSV output and export filenames
use chrono::NaiveDate;

/// Binary name used in user agents and log prefixes
pub const BINARY_NAME: &str = "idxsync";

/// Package version from Cargo.toml (set at compile time)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the user agent string for HTTP requests
pub fn user_agent() -> String {
    format!("{}/{}", BINARY_NAME, VERSION)
}

// ============================================================================
// Retry Constants
// ============================================================================

/// Attempts made for read-heavy calls (analytics, clone source reads) before giving up
pub const DEFAULT_READ_ATTEMPTS: u32 = 3;

/// Fixed delay between read attempts
pub const DEFAULT_READ_RETRY_DELAY_MS: u64 = 1_000;

// ============================================================================
// Timeout Constants (in seconds)
// ============================================================================

/// Default HTTP request timeout
pub const HTTP_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Limits
// ============================================================================

/// Identifiers sent per multi-get request
pub const DEFAULT_MULTI_GET_CHUNK: usize = 1_000;

/// Hits sampled from an empty query when discovering attribute names
pub const DEFAULT_ATTRIBUTE_SAMPLE_SIZE: usize = 10;

/// Upper bound on the number of indexes in a single comparison
pub const MAX_COMPARE_INDEXES: usize = 100;

/// Row limit requested from the analytics endpoint
pub const ANALYTICS_RESULT_LIMIT: usize = 1_000;

/// Records per browse page requested from the service
pub const BROWSE_PAGE_SIZE: usize = 1_000;

/// Hits per page when listing recommend rules
pub const RECOMMEND_RULES_PAGE_SIZE: usize = 100;

// ============================================================================
// Export Constants
// ============================================================================

/// Field delimiter for every CSV file read or written
pub const CSV_DELIMITER: u8 = b';';

/// Name of the identifier attribute on every record
pub const OBJECT_ID: &str = "objectID";

/// Settings key naming the distinct attribute
pub const DISTINCT_SETTING: &str = "attributeForDistinct";

/// Settings key listing replica indexes
pub const REPLICAS_SETTING: &str = "replicas";

/// Settings key listing searchable attributes
pub const SEARCHABLE_SETTING: &str = "searchableAttributes";

/// Settings key listing faceting attributes
pub const FACETING_SETTING: &str = "attributesForFaceting";

/// Keys the rule and synonym search endpoints add to each hit; never written back
pub const SEARCH_METADATA_KEYS: [&str; 2] = ["_highlightResult", "_metadata"];

/// Returns the download filename for an export: `<operation>_<index>_<YYYY-MM-DD>.csv`
pub fn export_filename(operation: &str, index_name: &str, date: NaiveDate) -> String {
    format!("{}_{}_{}.csv", operation, index_name, date.format("%Y-%m-%d"))
}

// ============================================================================
// Analytics Constants
// ============================================================================

/// Default analytics region
pub const DEFAULT_ANALYTICS_REGION: &str = "us";

/// Default lookback window for analytics queries
pub const DEFAULT_ANALYTICS_DAYS: u32 = 7;
