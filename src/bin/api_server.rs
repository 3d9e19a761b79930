// src/bin/api_server.rs

use record_repository::infra::config::{InitTables, Settings};
use record_repository::infra::logging::{init_logging, LogConfig};
use record_repository::storage::KeyGeneratorRegistry;
use record_repository::transport;
use record_repository::DatabaseService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    init_logging(LogConfig {
        format: settings.log_format,
        ..LogConfig::default()
    })?;

    // --- Service Initialization ---
    tracing::info!(engine = %settings.engine, keys = %settings.key_generator, "Initializing DatabaseService");
    let db_service = DatabaseService::connect(&settings, &KeyGeneratorRegistry::builtin()).await?;

    if settings.init_tables != InitTables::Off {
        let drop_first = settings.init_tables == InitTables::Recreate;
        for (table, created) in db_service.init_tables(drop_first).await {
            if !created {
                anyhow::bail!("failed to initialize table '{}'", table);
            }
        }
    }
    if db_service.catalog().is_empty() {
        tracing::info!("No table definitions loaded; repositories run without field typing");
    }

    let app_state = transport::http::AppState {
        db_service: Arc::new(db_service),
    };

    // --- API Server Initialization ---
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let listener = tokio::net::TcpListener::bind(&settings.api_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "API server listening; Swagger UI at /swagger-ui");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received (Ctrl+C)");
        }
    }

    Ok(())
}
