use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use capture::{CaptureError, FrameSource, RgbFrame, SourceFactory};
use futures::StreamExt;
use gateway::{routes::app, state::AppState};
use http_body_util::BodyExt;
use session::{Captioner, Detection, Detector, SessionConfig, WebcamSession};
use std::sync::Arc;
use tower::ServiceExt;

struct SyntheticSource;

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
        Ok(RgbFrame::new(32, 24, vec![90; 32 * 24 * 3]))
    }
}

struct NoopDetector;

impl Detector for NoopDetector {
    fn detect(&mut self, _frame: &RgbFrame) -> anyhow::Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

struct FixedCaptioner;

impl Captioner for FixedCaptioner {
    fn describe(&self, _frame: &RgbFrame) -> anyhow::Result<String> {
        Ok("a test pattern".to_string())
    }
}

fn test_app() -> (Router, Arc<WebcamSession>) {
    let factory: SourceFactory = Box::new(|| Ok(Box::new(SyntheticSource) as Box<dyn FrameSource>));
    let session = Arc::new(WebcamSession::new(
        factory,
        Box::new(NoopDetector),
        Box::new(FixedCaptioner),
        SessionConfig::default(),
    ));
    (app(AppState::new(session.clone())), session)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn index_reports_server_running() {
    let (router, _session) = test_app();

    let response = router
        .oneshot(
            Request::get("/api/webcam/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "The webcam object recognition server is up and running"
    );
}

#[tokio::test]
async fn status_reflects_session_lifecycle() {
    let (router, session) = test_app();

    let response = router
        .clone()
        .oneshot(Request::get("/api/webcam/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["is_active"], false);

    session.start().unwrap();

    let response = router
        .oneshot(Request::get("/api/webcam/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["is_active"], true);
}

#[tokio::test]
async fn start_then_stop_round_trip() {
    let (router, session) = test_app();

    let response = router
        .clone()
        .oneshot(Request::get("/api/webcam/start").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Webcam started successfully!");
    assert!(session.is_active());

    let response = router
        .clone()
        .oneshot(Request::get("/api/webcam/stop").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Webcam stopped successfully!");
    assert!(!session.is_active());

    // Stopping again is a no-op, not an error.
    let response = router
        .oneshot(Request::get("/api/webcam/stop").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn description_without_frame_is_not_found() {
    let (router, _session) = test_app();

    let response = router
        .oneshot(
            Request::get("/api/webcam/description")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert!(json["detail"].is_string());
}

#[tokio::test]
async fn description_after_capture_returns_caption() {
    let (router, session) = test_app();
    session.start().unwrap();
    session.capture_frame().unwrap();

    let response = router
        .oneshot(
            Request::get("/api/webcam/description")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["description"], "a test pattern");
}

#[tokio::test]
async fn stream_emits_multipart_jpeg_chunks() {
    let (router, session) = test_app();
    session.start().unwrap();

    let response = router
        .oneshot(Request::get("/api/webcam/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut data = response.into_body().into_data_stream();
    let first = data.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));

    session.stop();
}
