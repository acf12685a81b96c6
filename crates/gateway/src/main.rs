use anyhow::Context;
use caption::HttpCaptioner;
use capture::{CameraConfig, FrameSource, V4lCamera};
use common::Environment;
use detect::DetrDetector;
use gateway::{config::get_configuration, routes::app, state::AppState};
use session::{SessionConfig, WebcamSession};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration().context("failed to load configuration")?;
    common::setup_logging(Environment::from_env());

    let camera_config = CameraConfig {
        device_id: config.device_id,
        fps: config.capture_fps,
    };
    let factory: capture::SourceFactory = Box::new(move || {
        let camera = V4lCamera::open(&camera_config)?;
        Ok(Box::new(camera) as Box<dyn FrameSource>)
    });

    let detector = DetrDetector::load(&config.model_path, config.confidence_threshold)
        .context("failed to load detection model")?;
    let captioner = HttpCaptioner::new(config.caption_url.clone());

    let session = Arc::new(WebcamSession::new(
        factory,
        Box::new(detector),
        Box::new(captioner),
        SessionConfig {
            detection_interval: config.detection_interval,
            jpeg_quality: config.jpeg_quality,
        },
    ));

    let state = AppState::new(session.clone());
    let router = app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release the camera before exiting.
    session.stop();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {}", e);
    }
    tracing::info!("shutdown requested");
}
