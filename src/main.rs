use totalis::{
    clock::SystemClock,
    config::{
        session::{validate_production_config, SESSION_TABLE},
        AppConfig, SessionConfig,
    },
    db, routes, services, AppState,
};

use std::sync::Arc;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "totalis=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    validate_production_config(config.environment)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let email_service = services::create_email_service();
    let app_state = AppState::new(
        pool.clone(),
        email_service,
        Arc::new(SystemClock),
        &config.base_url,
        &config.support_email,
    );

    let purge_task =
        services::spawn_purge_task(app_state.recovery_service.clone(), config.purge_interval);

    // Session store
    let session_store = SqliteStore::new(pool.clone())
        .with_table_name(SESSION_TABLE)
        .map_err(anyhow::Error::msg)?;
    session_store.migrate().await?;
    let session_layer =
        SessionConfig::for_environment(config.environment).create_layer(session_store);

    let app = routes::build_router(app_state, session_layer, &config.static_dir);

    let addr = config.socket_addr()?;
    tracing::info!(base_url = %config.base_url, "Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge_task.abort();
    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
