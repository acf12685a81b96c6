use crate::state::AppState;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use session::{SessionError, frame_stream};
use tower_http::cors::CorsLayer;

const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

pub fn app(state: AppState) -> Router {
    let webcam = Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/start", get(start))
        .route("/stop", get(stop))
        .route("/stream", get(stream))
        .route("/description", get(description));

    Router::new()
        .nest("/api/webcam", webcam)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub enum ApiError {
    Session(SessionError),
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        ApiError::Session(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Session(error) => {
                let status = match &error {
                    SessionError::NotActive => StatusCode::CONFLICT,
                    SessionError::NoFrameAvailable => StatusCode::NOT_FOUND,
                    SessionError::DescriptionFailed(_) => StatusCode::BAD_GATEWAY,
                    SessionError::DeviceUnavailable(_) | SessionError::CaptureFailed(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, error.to_string())
            }
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Session operations block on the device and the model, so they run on
/// the blocking pool rather than the async workers.
async fn run_blocking<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SessionError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_error) => Err(ApiError::Internal(join_error.to_string())),
    }
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "The webcam object recognition server is up and running"
    }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "is_active": state.session.is_active() }))
}

async fn start(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.session.clone();
    run_blocking(move || session.start()).await?;
    tracing::info!("webcam session started");
    Ok(Json(json!({ "message": "Webcam started successfully!" })))
}

async fn stop(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.session.clone();
    run_blocking(move || {
        session.stop();
        Ok(())
    })
    .await?;
    tracing::info!("webcam session stopped");
    Ok(Json(json!({ "message": "Webcam stopped successfully!" })))
}

async fn stream(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = Body::from_stream(frame_stream(state.session.clone()));

    Response::builder()
        .header(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn description(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.session.clone();
    let caption = run_blocking(move || session.describe_snapshot()).await?;
    Ok(Json(json!({ "description": caption })))
}
