// duration-estimator-rs/src/main.rs
// Duration Estimator - HTTP prediction service
// Port 8000 - accepts construction task descriptions and returns an
// estimated duration from the loaded regression model

use std::sync::Arc;

use config_rs::EstimatorConfig;
use duration_estimator::cors::cors_layer;
use duration_estimator::logging::init_logging;
use duration_estimator::model::load_predictor;
use duration_estimator::shutdown::shutdown_signal;
use duration_estimator::Estimator;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EstimatorConfig::load()?;
    init_logging(&config.logging)?;
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(model_path = %config.model_path.display(), "Loading model");
    let predictor = match load_predictor(&config.model_path) {
        Ok(predictor) => predictor,
        Err(err) => {
            tracing::error!(error = %err, "Failed to load model, refusing to start");
            return Err(err.into());
        }
    };

    if config.cors.allows_any_origin() {
        tracing::warn!("CORS allows any origin; restrict DURATION_ESTIMATOR_CORS_ORIGINS outside development");
    }
    let cors = cors_layer(&config.cors)?;

    let estimator = Arc::new(Estimator::new(predictor, config.max_batch_size));
    let app = estimator.create_router(cors, config.max_payload_bytes);

    let listener = TcpListener::bind(config.bind_address).await?;
    tracing::info!(
        addr = %config.bind_address,
        max_payload_bytes = config.max_payload_bytes,
        max_batch_size = config.max_batch_size,
        "Duration estimator listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Duration estimator stopped");
    Ok(())
}
