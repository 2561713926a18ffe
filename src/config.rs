use crate::constants;
use std::time::Duration;

/// Tunables shared by the resolver, the mutator and the diff engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attempts for read-heavy calls (1 = no retry)
    pub read_attempts: u32,
    /// Fixed delay between read attempts
    pub read_retry_delay: Duration,
    /// CSV field delimiter
    pub csv_delimiter: u8,
    /// Hits sampled when discovering attribute names
    pub attribute_sample_size: usize,
    /// Maximum indexes accepted by a comparison
    pub max_compare_indexes: usize,
    /// Identifiers per multi-get call
    pub multi_get_chunk: usize,
    /// HTTP request timeout
    pub http_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_attempts: constants::DEFAULT_READ_ATTEMPTS,
            read_retry_delay: Duration::from_millis(constants::DEFAULT_READ_RETRY_DELAY_MS),
            csv_delimiter: constants::CSV_DELIMITER,
            attribute_sample_size: constants::DEFAULT_ATTRIBUTE_SAMPLE_SIZE,
            max_compare_indexes: constants::MAX_COMPARE_INDEXES,
            multi_get_chunk: constants::DEFAULT_MULTI_GET_CHUNK,
            http_timeout: Duration::from_secs(constants::HTTP_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

/// Builder for EngineConfig
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn read_attempts(mut self, attempts: u32) -> Self {
        self.config.read_attempts = attempts.max(1);
        self
    }

    pub fn read_retry_delay(mut self, delay: Duration) -> Self {
        self.config.read_retry_delay = delay;
        self
    }

    pub fn csv_delimiter(mut self, delimiter: u8) -> Self {
        self.config.csv_delimiter = delimiter;
        self
    }

    pub fn attribute_sample_size(mut self, size: usize) -> Self {
        self.config.attribute_sample_size = size.max(1);
        self
    }

    pub fn max_compare_indexes(mut self, max: usize) -> Self {
        self.config.max_compare_indexes = max;
        self
    }

    pub fn multi_get_chunk(mut self, chunk: usize) -> Self {
        self.config.multi_get_chunk = chunk.max(1);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
