//! BreatheEasy forecast agent
//!
//! Serves calibrated AQI forecasts over HTTP and samples host resource usage
//! in the background for the monitoring view.

use anyhow::{Context, Result};
use breathe_agent::{api, aqicn::AqicnClient, config::AgentConfig};
use breathe_lib::{
    calibration::CalibrationEngine,
    health::{components, HealthRegistry},
    history::HistoryStore,
    observability::{AgentMetrics, StructuredLogger},
    observation::{InMemoryObservations, LiveObservationSource},
    predictor::ModelRegistry,
    sampler::{HostSampler, SamplingLoopBuilder},
    service::ForecastService,
    store::TimeSeriesStore,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting breathe-agent");

    let config = AgentConfig::load()?;
    info!(node_name = %config.node_name, api_port = config.api_port, "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SAMPLER).await;
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::OBSERVATIONS).await;
    health_registry.register(components::STORE).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    // Fail fast on bad calibration parameters
    let engine = CalibrationEngine::new(config.calibration_config()?)
        .context("Invalid calibration configuration")?;
    let store = Arc::new(TimeSeriesStore::from_config(&config.store_config())?);

    let models = Arc::new(ModelRegistry::new());
    match models.load_dir(&config.model_dir) {
        Ok(0) => {
            health_registry
                .set_unhealthy(components::PREDICTOR, "No models found")
                .await
        }
        Ok(count) => logger.log_models_loaded(count, &config.model_dir.display().to_string()),
        Err(e) => {
            health_registry
                .set_unhealthy(components::PREDICTOR, e.to_string())
                .await
        }
    }
    metrics.set_models_loaded(models.len());

    let history = Arc::new(HistoryStore::new(config.history_retention_days));
    if let Err(e) = history.load_dir(&config.history_dir) {
        warn!(error = %e, "No daily history loaded; forecasts need live anchors to build it");
    }

    let pushed = Arc::new(InMemoryObservations::new());
    let observations: Arc<dyn LiveObservationSource> = match config.aqicn_token() {
        Some(token) => Arc::new(
            AqicnClient::new(&config.aqicn_base_url, token, config.observation_timeout())?
                .with_health(health_registry.clone()),
        ),
        None => {
            info!("No AQICN token configured; accepting pushed observations");
            pushed.clone()
        }
    };
    let source_name = observations.name();

    let forecasts = Arc::new(ForecastService::new(
        engine,
        models,
        observations,
        history,
        logger.clone(),
    ));

    let mut app_state = api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        forecasts,
        store.clone(),
    );
    if config.aqicn_token().is_none() {
        app_state = app_state.with_pushed_observations(pushed);
    }
    let app_state = Arc::new(app_state);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sampling = SamplingLoopBuilder::new()
        .source(Arc::new(HostSampler::new()))
        .store(store)
        .period(config.sampler_config().period)
        .health(health_registry.clone())
        .node_name(&config.node_name)
        .build()?;
    let sampling_handle = tokio::spawn(sampling.run(shutdown_tx.subscribe()));

    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    logger.log_startup(AGENT_VERSION, source_name);
    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    report_sampler_exit(sampling_handle.await);
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server exited with an error"),
        Err(e) => warn!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}

/// Log a sampler task that panicked or was cancelled. Returns true if it did.
fn report_sampler_exit(result: Result<(), tokio::task::JoinError>) -> bool {
    match result {
        Ok(()) => false,
        Err(e) => {
            warn!(error = %e, "Sampling task failed");
            true
        }
    }
}
