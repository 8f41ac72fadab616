#![forbid(unsafe_code)]

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use valuation_benchmarks::BenchmarkStore;
use valuation_core::Config;
use valuation_estimator::ValuationEstimator;
use valuation_ingestion::source_from_config;
use valuation_service::{refresh, router, QueryService, RefreshJob};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let addr: SocketAddr = config
        .service
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.service.bind))?;

    let store = Arc::new(BenchmarkStore::new(config.benchmarks.clone()));
    let estimator = ValuationEstimator::new(config.estimator.clone())?;
    let source = source_from_config(&config.dataset)?;
    info!(source = %source.describe(), "benchmark dataset configured");

    let job = Arc::new(RefreshJob::new(
        Arc::clone(&store),
        source,
        estimator.clone(),
        config.normalizer.clone(),
    ));
    if let Err(e) = refresh::run_refresh(Arc::clone(&job)).await {
        warn!(error = %e, "initial benchmark load failed, requests get 503 until a refresh succeeds");
    }
    if config.scheduler.enabled {
        refresh::spawn_daily(job, config.scheduler.clone())?;
    }

    let service = Arc::new(QueryService::new(
        store,
        estimator,
        config.normalizer.clone(),
        config.service.round_to_dollars,
    ));
    let app = router(service);

    info!(%addr, "valuation service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    let mut config = match env::var("VALUATION_CONFIG") {
        Ok(path) => Config::from_json_file(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        Err(_) => Config::default(),
    };
    if let Ok(bind) = env::var("VALUATION_HTTP_BIND") {
        config.service.bind = bind;
    }
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
