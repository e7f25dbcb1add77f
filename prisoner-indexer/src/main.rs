//! Prisoner Indexer Main Entry Point
//!
//! Serves the admin surface, runs the page job workers and the dedup
//! retention task, and consumes change notifications until shut down.

use std::env;

use dotenv::dotenv;
use prisoner_indexer::admin::{create_app, run_server};
use prisoner_indexer::retention::{spawn_retention_task, RETENTION_PERIOD};
use prisoner_indexer::{Dependencies, IndexerConfig, IndexingError};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
///
/// `LOG_FORMAT=json` switches to structured JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("prisoner_indexer=info,prisoner_indexer_repository=info")
    });

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();
    }

    info!(
        service_name = "prisoner-indexer",
        service_version = env!("CARGO_PKG_VERSION"),
        json = json,
        "Tracing initialized"
    );
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv().ok();
    init_tracing();

    info!("Starting prisoner indexer");

    let config = IndexerConfig::from_env();
    let deps = match Dependencies::new(config).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let retention = spawn_retention_task(
        deps.hashes.clone(),
        deps.config.hash_retention_days,
        RETENTION_PERIOD,
    );

    let app = create_app(deps.admin.clone());
    let addr = deps.config.admin_bind_address;
    let server = tokio::spawn(async move {
        if let Err(e) = run_server(app, addr).await {
            error!(error = %e, "Admin server failed");
        }
    });

    let result = deps.orchestrator.run().await;

    server.abort();
    retention.abort();
    for worker in &deps.workers {
        worker.abort();
    }

    match result {
        Ok(()) => {
            info!("Prisoner indexer stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Prisoner indexer failed");
            Err(e.into())
        }
    }
}
