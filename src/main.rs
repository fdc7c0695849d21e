use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use kitchen_cloud::{
    config::DatabaseConfig,
    create_app,
    handlers::{AppState, RequestLimits},
    init_observability,
    models::{Collection, StorageBackend},
    repositories::{DocumentRepository, DynamoDbDocumentRepository, InMemoryDocumentRepository},
    services::TokenService,
    shutdown_observability, Config, Metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::from_environment()
        .await
        .context("Failed to load configuration")?;

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref(),
        &config.observability.log_level,
        config.observability.enable_json_logging,
    )?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!(
        "Storage backend: {}, tables: services={}, reviews={}, food={}",
        config.database.storage_backend,
        config.database.services_table,
        config.database.reviews_table,
        config.database.food_table
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let tokens = Arc::new(TokenService::new_with_metrics(
        config.access_token_secret(),
        config.auth.token_ttl_seconds,
        metrics.clone(),
    ));

    let repository = |collection: Collection| build_repository(&config, collection);
    let state = AppState::new(
        repository(Collection::Services)?,
        repository(Collection::Reviews)?,
        repository(Collection::FoodList)?,
        tokens,
        metrics,
    );
    info!("Services initialized successfully");

    // An unreachable store is logged; the server still starts
    let mut statuses = state.catalog.check_stores().await;
    statuses.extend(state.reviews.check_stores().await);
    for (collection, status) in statuses {
        match status {
            Ok(()) => info!(collection = %collection, "Document store reachable"),
            Err(e) => warn!(collection = %collection, error = %e, "Document store unreachable"),
        }
    }

    let app = create_app(
        state,
        RequestLimits {
            max_request_size: config.server.max_request_size,
        },
    );

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host address: {}", config.server.host))?,
        config.server.port,
    );
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Kitchen-Cloud server running on port {}", config.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_observability().await;
    info!("Server shutdown complete");
    Ok(())
}

fn build_repository(
    config: &Config,
    collection: Collection,
) -> anyhow::Result<Arc<dyn DocumentRepository>> {
    let database: &DatabaseConfig = &config.database;

    match database.storage_backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryDocumentRepository::new(collection))),
        StorageBackend::DynamoDb => {
            let aws = config
                .aws
                .as_ref()
                .context("DynamoDB backend selected but AWS configuration is missing")?;

            Ok(Arc::new(DynamoDbDocumentRepository::new(
                Arc::new(aws.dynamodb_client.clone()),
                collection,
                database.table_for(collection).to_string(),
                aws.region.clone(),
            )))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
