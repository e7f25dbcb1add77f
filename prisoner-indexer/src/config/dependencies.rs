//! Dependency initialization and wiring for the prisoner indexer.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::admin::AdminState;
use crate::config::{ConnectionMode, IndexerConfig};
use crate::consumer::KafkaConsumer;
use crate::ingest::{spawn_workers, DocumentBuilder, IngestionPipeline, JobHandler, JobQueue};
use crate::lifecycle::IndexLifecycleManager;
use crate::notifier::{EventPublisher, KafkaEventPublisher};
use crate::orchestrator::Orchestrator;
use crate::sync::{DedupGate, PrisonerSynchroniser};
use crate::upstream::{PrisonApi, PrisonApiClient};
use crate::IndexingError;
use prisoner_indexer_repository::opensearch::IndexConfig;
use prisoner_indexer_repository::{
    run_migrations, DocumentIndexProvider, EntityHashRepository, IndexStatusRepository,
    OpenSearchProvider, PostgresEntityHashRepository, PostgresIndexStatusRepository,
};

/// Capacity of the page job channel.
const JOB_QUEUE_CAPACITY: usize = 10_000;

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub config: IndexerConfig,
    /// State served by the admin HTTP surface.
    pub admin: AdminState,
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator<KafkaConsumer>,
    /// Dedup store, for the retention task.
    pub hashes: Arc<dyn EntityHashRepository>,
    /// Page job workers.
    pub workers: Vec<JoinHandle<()>>,
}

impl Dependencies {
    /// Initialize all dependencies from the configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (OpenSearch only fails fast in fail-fast mode)
    pub async fn new(config: IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            index_alias = %config.index_alias,
            prison_api_url = %config.prison_api_url,
            kafka_broker = %config.kafka_broker,
            kafka_group_id = %config.kafka_group_id,
            connection_mode = ?config.connection_mode,
            "Initializing dependencies"
        );

        let documents: Arc<dyn DocumentIndexProvider> = Arc::new(
            Self::connect_to_opensearch(
                &config.opensearch_url,
                IndexConfig::new(config.index_alias.clone()),
                config.connection_mode,
                config.opensearch_retry_interval,
            )
            .await?,
        );
        info!("OpenSearch connection established");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&config.database_url)
            .await
            .map_err(|e| IndexingError::config(format!("Failed to connect to database: {}", e)))?;
        run_migrations(&pool)
            .await
            .map_err(|e| IndexingError::config(format!("Failed to run migrations: {}", e)))?;
        let statuses: Arc<dyn IndexStatusRepository> = Arc::new(
            PostgresIndexStatusRepository::new(pool.clone())
                .await
                .map_err(|e| IndexingError::config(e.to_string()))?,
        );
        let hashes: Arc<dyn EntityHashRepository> = Arc::new(
            PostgresEntityHashRepository::new(pool)
                .await
                .map_err(|e| IndexingError::config(e.to_string()))?,
        );
        info!("Database ready");

        let prison_api: Arc<dyn PrisonApi> = Arc::new(
            PrisonApiClient::new(config.prison_api_url.clone(), config.prison_api_timeout)
                .map_err(|e| IndexingError::config(format!("Failed to create prison API client: {}", e)))?,
        );
        let publisher: Arc<dyn EventPublisher> = Arc::new(
            KafkaEventPublisher::new(&config.kafka_broker, config.outbound_topic.clone())
                .map_err(|e| IndexingError::config(format!("Failed to create event publisher: {}", e)))?,
        );
        let consumer = KafkaConsumer::new(
            &config.kafka_broker,
            &config.kafka_group_id,
            &config.inbound_topic,
            &config.dead_letter_topic,
        )
        .map_err(|e| IndexingError::config(format!("Failed to create Kafka consumer: {}", e)))?;
        info!("Kafka clients created");

        let retry = config.retry_policy();
        let builder = DocumentBuilder::new(prison_api, retry.clone());
        let lifecycle = Arc::new(IndexLifecycleManager::new(
            statuses,
            documents.clone(),
            config.index_complete_threshold,
        ));
        let synchroniser = Arc::new(PrisonerSynchroniser::new(
            builder.clone(),
            documents.clone(),
            lifecycle.clone(),
            DedupGate::new(hashes.clone(), retry.clone()),
            publisher,
            retry.clone(),
        ));

        let (queue, receiver) = JobQueue::new(JOB_QUEUE_CAPACITY);
        let pipeline = Arc::new(IngestionPipeline::new(
            builder,
            documents,
            lifecycle.clone(),
            synchroniser.clone(),
            queue.clone(),
            config.populate_page_size,
        ));
        let handler: Arc<dyn JobHandler> = pipeline.clone();
        let workers = spawn_workers(
            config.worker_count,
            receiver,
            queue,
            handler,
            config.retry_max_attempts,
        );

        let orchestrator = Orchestrator::new(consumer, synchroniser);
        let admin = AdminState {
            lifecycle,
            pipeline,
            hashes: hashes.clone(),
            hash_retention_days: config.hash_retention_days,
        };

        Ok(Self {
            config,
            admin,
            orchestrator,
            hashes,
            workers,
        })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        index_config: IndexConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, IndexingError> {
        loop {
            match OpenSearchProvider::new(url, index_config.clone()).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}
