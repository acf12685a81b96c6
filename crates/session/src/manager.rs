use crate::collaborators::{Captioner, Detection, Detector};
use crate::error::SessionError;
use crate::render;
use capture::{FrameSource, RgbFrame, SourceFactory};
use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frames between detection refreshes; inference is amortized across
    /// this many captures.
    pub detection_interval: u64,
    pub jpeg_quality: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detection_interval: 3,
            jpeg_quality: 70,
        }
    }
}

struct SessionState {
    source: Option<Box<dyn FrameSource>>,
    detector: Box<dyn Detector>,
    frame_count: u64,
    last_detections: Option<Vec<Detection>>,
    last_raw_frame: Option<RgbFrame>,
}

/// Owns the camera handle and all mutable session state.
///
/// All state transitions and the whole capture step (read, detect, render,
/// encode) are serialized under one mutex; `is_active` reads an atomic so
/// status polling never waits behind a capture or an inference pass.
/// Holding the lock across detection trades stream-side concurrency for
/// correctness simplicity.
pub struct WebcamSession {
    state: Mutex<SessionState>,
    active: AtomicBool,
    factory: SourceFactory,
    captioner: Box<dyn Captioner>,
    detection_interval: u64,
    jpeg_quality: u8,
}

impl WebcamSession {
    pub fn new(
        factory: SourceFactory,
        detector: Box<dyn Detector>,
        captioner: Box<dyn Captioner>,
        config: SessionConfig,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState {
                source: None,
                detector,
                frame_count: 0,
                last_detections: None,
                last_raw_frame: None,
            }),
            active: AtomicBool::new(false),
            factory,
            captioner,
            detection_interval: config.detection_interval.max(1),
            jpeg_quality: config.jpeg_quality,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // A panic while holding the lock leaves valid state behind
        // (the handle is released by Drop), so recover rather than poison.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the camera device and reset per-session state.
    ///
    /// Restart while active is not an error: the existing handle is
    /// released before reacquiring, so at most one handle ever exists.
    pub fn start(&self) -> Result<(), SessionError> {
        let mut state = self.state();

        if state.source.take().is_some() {
            tracing::debug!("released previous camera handle before restart");
        }

        match (self.factory)() {
            Ok(source) => {
                state.source = Some(source);
                state.frame_count = 0;
                state.last_detections = None;
                state.last_raw_frame = None;
                self.active.store(true, Ordering::SeqCst);
                tracing::info!("webcam session started");
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                tracing::error!(error = %e, "unable to open camera device");
                Err(SessionError::DeviceUnavailable(e.to_string()))
            }
        }
    }

    /// Release the device and flip the session inactive. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state();
        self.active.store(false, Ordering::SeqCst);
        if state.source.take().is_some() {
            tracing::info!("webcam session stopped");
        } else {
            tracing::debug!("stop requested on an already inactive session");
        }
    }

    /// Lock-free read of the session lifecycle state.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Capture one frame, refresh detections on schedule, render the
    /// overlay and encode to JPEG.
    ///
    /// Detections refresh every `detection_interval`-th frame, and on the
    /// first frame of a session so the stream is never indefinitely
    /// unannotated when the interval is large.
    pub fn capture_frame(&self) -> Result<Vec<u8>, SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotActive);
        }

        let mut state = self.state();

        let frame = match state.source.as_mut() {
            Some(source) => source
                .read_frame()
                .map_err(|e| SessionError::CaptureFailed(e.to_string()))?,
            // Stopped between the active check and taking the lock.
            None => return Err(SessionError::NotActive),
        };

        state.frame_count += 1;
        state.last_raw_frame = Some(frame.clone());

        if state.frame_count % self.detection_interval == 0 || state.last_detections.is_none() {
            let detections = state
                .detector
                .detect(&frame)
                .map_err(|e| SessionError::CaptureFailed(format!("detection failed: {e}")))?;
            tracing::debug!(
                frame = state.frame_count,
                detections = detections.len(),
                "detection results refreshed"
            );
            state.last_detections = Some(detections);
        }

        let rendered = render::annotate(&frame, state.last_detections.as_deref().unwrap_or(&[]));
        render::encode_jpeg(&rendered, self.jpeg_quality)
            .map_err(|e| SessionError::CaptureFailed(format!("JPEG encoding failed: {e}")))
    }

    /// Caption the most recently captured frame (no new capture).
    ///
    /// The frame is cloned out under the lock and the collaborator runs
    /// outside it, so a slow captioning call never stalls the stream.
    pub fn describe_snapshot(&self) -> Result<String, SessionError> {
        let frame = self
            .state()
            .last_raw_frame
            .clone()
            .ok_or(SessionError::NoFrameAvailable)?;

        let caption = self
            .captioner
            .describe(&frame)
            .map_err(|e| SessionError::DescriptionFailed(e.to_string()))?;
        tracing::debug!(caption = %caption, "snapshot described");
        Ok(caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::CaptureError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn test_frame(width: u32, height: u32) -> RgbFrame {
        RgbFrame::new(width, height, vec![128u8; (width * height * 3) as usize])
    }

    /// Fake device tracking open handles and reads; read can be made to
    /// fail or block to simulate device faults.
    #[derive(Default)]
    struct FakeDeviceStats {
        open_handles: AtomicUsize,
        opens: AtomicUsize,
        reads: AtomicUsize,
    }

    struct FakeSource {
        stats: Arc<FakeDeviceStats>,
        fail_reads: bool,
        block_reads: Option<Arc<AtomicBool>>,
    }

    impl FrameSource for FakeSource {
        fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
            if let Some(release) = &self.block_reads {
                while !release.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
            self.stats.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err(CaptureError::Read("simulated disconnect".to_string()));
            }
            Ok(test_frame(32, 24))
        }
    }

    impl Drop for FakeSource {
        fn drop(&mut self) {
            self.stats.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn fake_factory(stats: Arc<FakeDeviceStats>) -> SourceFactory {
        fake_factory_with(stats, false, None)
    }

    fn fake_factory_with(
        stats: Arc<FakeDeviceStats>,
        fail_reads: bool,
        block_reads: Option<Arc<AtomicBool>>,
    ) -> SourceFactory {
        Box::new(move || {
            stats.opens.fetch_add(1, Ordering::SeqCst);
            stats.open_handles.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSource {
                stats: stats.clone(),
                fail_reads,
                block_reads: block_reads.clone(),
            }) as Box<dyn FrameSource>)
        })
    }

    fn failing_factory() -> SourceFactory {
        Box::new(|| Err(CaptureError::Open("no camera".to_string())))
    }

    struct CountingDetector {
        calls: Arc<AtomicUsize>,
    }

    impl Detector for CountingDetector {
        fn detect(&mut self, _frame: &RgbFrame) -> anyhow::Result<Vec<Detection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Detection {
                label: "person".to_string(),
                score: 0.95,
                bbox: [2.0, 2.0, 20.0, 20.0],
            }])
        }
    }

    struct NoopDetector;

    impl Detector for NoopDetector {
        fn detect(&mut self, _frame: &RgbFrame) -> anyhow::Result<Vec<Detection>> {
            Ok(Vec::new())
        }
    }

    struct RecordingCaptioner {
        calls: Arc<AtomicUsize>,
    }

    impl Captioner for RecordingCaptioner {
        fn describe(&self, frame: &RgbFrame) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("a {}x{} scene", frame.width, frame.height))
        }
    }

    fn session_with(
        factory: SourceFactory,
        detector: Box<dyn Detector>,
        config: SessionConfig,
    ) -> WebcamSession {
        WebcamSession::new(
            factory,
            detector,
            Box::new(RecordingCaptioner {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            config,
        )
    }

    fn default_session(factory: SourceFactory) -> WebcamSession {
        session_with(factory, Box::new(NoopDetector), SessionConfig::default())
    }

    #[test]
    fn start_reports_active_and_opens_one_handle() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory(stats.clone()));

        assert!(!session.is_active());
        session.start().unwrap();
        assert!(session.is_active());
        assert_eq!(stats.open_handles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn restart_releases_previous_handle_first() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory(stats.clone()));

        session.start().unwrap();
        session.start().unwrap();
        session.start().unwrap();

        assert_eq!(stats.opens.load(Ordering::SeqCst), 3);
        assert_eq!(stats.open_handles.load(Ordering::SeqCst), 1);
        assert!(session.is_active());
    }

    #[test]
    fn stop_is_idempotent_and_releases_the_handle() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory(stats.clone()));

        session.stop();
        assert!(!session.is_active());

        session.start().unwrap();
        session.stop();
        session.stop();

        assert!(!session.is_active());
        assert_eq!(stats.open_handles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_start_stays_inactive() {
        let session = default_session(failing_factory());
        let err = session.start().unwrap_err();
        assert!(matches!(err, SessionError::DeviceUnavailable(_)));
        assert!(!session.is_active());
    }

    #[test]
    fn capture_while_inactive_fails_without_device_io() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory(stats.clone()));

        let err = session.capture_frame().unwrap_err();
        assert!(matches!(err, SessionError::NotActive));
        assert_eq!(stats.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn capture_produces_jpeg_bytes() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory(stats));
        session.start().unwrap();

        let jpeg = session.capture_frame().unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn detection_refreshes_on_first_frame_then_every_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(FakeDeviceStats::default());
        let session = session_with(
            fake_factory(stats),
            Box::new(CountingDetector {
                calls: calls.clone(),
            }),
            SessionConfig {
                detection_interval: 3,
                jpeg_quality: 70,
            },
        );
        session.start().unwrap();

        let mut refreshed_at = Vec::new();
        let mut seen = 0;
        for frame_no in 1..=10u64 {
            session.capture_frame().unwrap();
            let now = calls.load(Ordering::SeqCst);
            if now > seen {
                refreshed_at.push(frame_no);
                seen = now;
            }
        }

        // First-ever frame plus every 3rd frame thereafter.
        assert_eq!(refreshed_at, vec![1, 3, 6, 9]);
    }

    #[test]
    fn restart_clears_cached_detections() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(FakeDeviceStats::default());
        let session = session_with(
            fake_factory(stats),
            Box::new(CountingDetector {
                calls: calls.clone(),
            }),
            SessionConfig {
                detection_interval: 100,
                jpeg_quality: 70,
            },
        );

        session.start().unwrap();
        session.capture_frame().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // With a huge interval, only the first-frame rule triggers; after a
        // restart the cache is stale so it must trigger again.
        session.start().unwrap();
        session.capture_frame().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn read_failure_is_capture_failed_and_session_stays_active() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory_with(stats, true, None));
        session.start().unwrap();

        let err = session.capture_frame().unwrap_err();
        assert!(matches!(err, SessionError::CaptureFailed(_)));
        assert!(session.is_active());
    }

    #[test]
    fn snapshot_before_any_capture_fails_with_no_frame() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory(stats));
        session.start().unwrap();

        let err = session.describe_snapshot().unwrap_err();
        assert!(matches!(err, SessionError::NoFrameAvailable));
    }

    #[test]
    fn snapshot_reuses_last_frame_without_a_new_capture() {
        let captioner_calls = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(FakeDeviceStats::default());
        let session = WebcamSession::new(
            fake_factory(stats.clone()),
            Box::new(NoopDetector),
            Box::new(RecordingCaptioner {
                calls: captioner_calls.clone(),
            }),
            SessionConfig::default(),
        );
        session.start().unwrap();
        session.capture_frame().unwrap();
        let reads_before = stats.reads.load(Ordering::SeqCst);

        let caption = session.describe_snapshot().unwrap();

        assert_eq!(caption, "a 32x24 scene");
        assert_eq!(captioner_calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.reads.load(Ordering::SeqCst), reads_before);
    }

    #[test]
    fn snapshot_frame_is_cleared_on_restart() {
        let stats = Arc::new(FakeDeviceStats::default());
        let session = default_session(fake_factory(stats));
        session.start().unwrap();
        session.capture_frame().unwrap();
        assert!(session.describe_snapshot().is_ok());

        session.start().unwrap();
        assert!(matches!(
            session.describe_snapshot().unwrap_err(),
            SessionError::NoFrameAvailable
        ));
    }

    #[test]
    fn status_is_not_blocked_by_a_slow_capture() {
        let release = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(FakeDeviceStats::default());
        let session = Arc::new(default_session(fake_factory_with(
            stats,
            false,
            Some(release.clone()),
        )));
        session.start().unwrap();

        let capture_session = session.clone();
        let capture_thread = std::thread::spawn(move || {
            let _ = capture_session.capture_frame();
        });

        // Let the capture thread take the lock and block inside the read.
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        let active = session.is_active();
        assert!(active);
        assert!(started.elapsed() < Duration::from_millis(50));

        release.store(true, Ordering::SeqCst);
        capture_thread.join().unwrap();
    }
}
