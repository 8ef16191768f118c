//! Eval Hub API server
//!
//! Control plane for model evaluation jobs: admits jobs, fans benchmarks
//! out to provider workers, and aggregates their status callbacks.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

use shared::providers::ProviderRegistry;
use shared::signals::{write_ready_file, write_termination_file, BuildInfo};
use shared::Settings;

mod handlers;
mod middleware;
mod models;
mod openapi;
mod routes;
mod services;
mod storage;

use handlers::helpers::{json_error_handler, query_error_handler};
use middleware::{PrometheusMetrics, TransactionIdMiddleware};
use services::EvaluationService;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing();

    tracing::info!("Starting Eval Hub...");

    let settings = Settings::load().context("Failed to load configuration")?;
    let signals = settings.signals.clone();

    if let Err(err) = run(settings).await {
        if let Err(e) = write_termination_file(&signals, &format!("{err:#}")) {
            tracing::error!(error = %e, "Failed to write termination file");
        }
        return Err(err);
    }
    Ok(())
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    // Provider catalog is loaded once and read-only afterward.
    let registry = Arc::new(
        ProviderRegistry::from_yaml_file(&settings.providers.catalog_path)
            .context("Failed to load provider catalog")?,
    );
    tracing::info!(providers = registry.providers().len(), "Provider registry loaded");

    let storage = storage::new_storage(&settings.database)
        .await
        .context("Failed to create storage")?;
    storage.ping().await.context("Storage health check failed")?;

    let runtime = eval_runtime::new_runtime(&settings.runtime, Arc::clone(&registry))
        .await
        .context("Failed to create runtime")?;
    tracing::info!(runtime = runtime.name(), "Runtime backend ready");

    let tracker =
        services::new_tracker(&settings.tracker).context("Failed to create experiment tracker")?;

    let service = web::Data::new(EvaluationService::new(
        Arc::clone(&storage),
        runtime,
        tracker,
    ));
    let storage_data = web::Data::new(Arc::clone(&storage));
    let registry_data = web::Data::from(Arc::clone(&registry));

    middleware::init_metrics();

    write_ready_file(
        &settings.signals,
        &BuildInfo::current(env!("CARGO_PKG_VERSION")),
    )
    .context("Failed to write ready file")?;

    let server_addr = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("Eval Hub listening on {}", server_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(PrometheusMetrics::new())
            .wrap(TracingLogger::default())
            .wrap(TransactionIdMiddleware::new())
            .app_data(
                web::JsonConfig::default()
                    .limit(1_048_576)
                    .error_handler(json_error_handler),
            )
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(service.clone())
            .app_data(storage_data.clone())
            .app_data(registry_data.clone())
            .configure(routes::configure)
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind to {server_addr}"))?
    .shutdown_timeout(settings.server.shutdown_timeout_seconds)
    .run()
    .await
    .context("Server error")?;

    storage.close().await;
    tracing::info!("Eval Hub shutdown complete");
    Ok(())
}
