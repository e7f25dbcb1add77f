//! Service configuration read from the environment.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::retry::RetryPolicy;

/// Connection mode for OpenSearch at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Some(Self::FailFast),
            "retry" => Some(Self::Retry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub opensearch_url: String,
    pub index_alias: String,
    pub database_url: String,
    pub prison_api_url: String,
    pub prison_api_timeout: Duration,
    pub kafka_broker: String,
    pub kafka_group_id: String,
    pub inbound_topic: String,
    pub dead_letter_topic: String,
    pub outbound_topic: String,
    /// Minimum document count before a rebuild may be marked complete.
    pub index_complete_threshold: u64,
    pub populate_page_size: u64,
    pub worker_count: usize,
    pub retry_max_attempts: usize,
    pub retry_base_delay: Duration,
    pub hash_retention_days: u32,
    pub admin_bind_address: SocketAddr,
    pub connection_mode: ConnectionMode,
    pub opensearch_retry_interval: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            opensearch_url: "http://localhost:9200".to_string(),
            index_alias: "prisoner-search".to_string(),
            database_url: "postgres://localhost/prisoner_indexer".to_string(),
            prison_api_url: "http://localhost:8080".to_string(),
            prison_api_timeout: Duration::from_millis(10_000),
            kafka_broker: "localhost:9092".to_string(),
            kafka_group_id: "prisoner-indexer".to_string(),
            inbound_topic: "prisoner.offender.events".to_string(),
            dead_letter_topic: "prisoner.offender.events.dlq".to_string(),
            outbound_topic: "prisoner.domain.events".to_string(),
            index_complete_threshold: 0,
            populate_page_size: 1000,
            worker_count: 4,
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(50),
            hash_retention_days: 180,
            admin_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            connection_mode: ConnectionMode::Retry,
            opensearch_retry_interval: Duration::from_secs(15),
        }
    }
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    ///
    /// Unset variables take their defaults; invalid values are logged and
    /// also fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        let connection_mode = match lookup("OPENSEARCH_CONNECTION_MODE") {
            Some(value) => ConnectionMode::parse(&value).unwrap_or_else(|| {
                warn!(value = %value, "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                defaults.connection_mode
            }),
            None => defaults.connection_mode,
        };

        Self {
            opensearch_url: string("OPENSEARCH_URL", defaults.opensearch_url),
            index_alias: string("INDEX_ALIAS", defaults.index_alias),
            database_url: string("DATABASE_URL", defaults.database_url),
            prison_api_url: string("PRISON_API_URL", defaults.prison_api_url),
            prison_api_timeout: Duration::from_millis(parsed(
                &lookup,
                "PRISON_API_TIMEOUT_MS",
                defaults.prison_api_timeout.as_millis() as u64,
            )),
            kafka_broker: string("KAFKA_BROKER", defaults.kafka_broker),
            kafka_group_id: string("KAFKA_GROUP_ID", defaults.kafka_group_id),
            inbound_topic: string("INBOUND_TOPIC", defaults.inbound_topic),
            dead_letter_topic: string("DEAD_LETTER_TOPIC", defaults.dead_letter_topic),
            outbound_topic: string("OUTBOUND_TOPIC", defaults.outbound_topic),
            index_complete_threshold: parsed(
                &lookup,
                "INDEX_COMPLETE_THRESHOLD",
                defaults.index_complete_threshold,
            ),
            populate_page_size: parsed(&lookup, "POPULATE_PAGE_SIZE", defaults.populate_page_size),
            worker_count: parsed(&lookup, "WORKER_COUNT", defaults.worker_count),
            retry_max_attempts: parsed(&lookup, "RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_base_delay: Duration::from_millis(parsed(
                &lookup,
                "RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            hash_retention_days: parsed(&lookup, "HASH_RETENTION_DAYS", defaults.hash_retention_days),
            admin_bind_address: parsed(&lookup, "ADMIN_BIND_ADDRESS", defaults.admin_bind_address),
            connection_mode,
            opensearch_retry_interval: Duration::from_secs(parsed(
                &lookup,
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                defaults.opensearch_retry_interval.as_secs(),
            )),
        }
    }

    /// Retry policy for upstream and document-store calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            self.retry_base_delay,
            self.prison_api_timeout,
        )
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %value, "Invalid value, using default");
            default
        }),
        None => default,
    }
}
