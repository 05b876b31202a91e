use std::cell::RefCell;
use std::rc::Rc;

use image::{Rgba, RgbaImage};

use super::*;
use crate::camera::memory::MemoryCamera;
use crate::camera::stream::{CameraError, CameraFrame, CameraRequest};
use crate::encode::sink::InMemorySink;
use crate::marker::descriptor::{MarkerDescriptor, StaticMarkerLoader};
use crate::media::memory::MemoryMediaBackend;
use crate::media::policy::AutoplayPolicy;

const DT: Duration = Duration::from_millis(40);

fn marker() -> MarkerDescriptor {
    let img = RgbaImage::from_fn(32, 32, |x, y| {
        let v = match (x < 16, y < 16) {
            (true, true) => 255,
            (false, true) => 40,
            (true, false) => 120,
            (false, false) => 200,
        };
        Rgba([v, v, v, 255])
    });
    MarkerDescriptor::from_image("m.png", &image::DynamicImage::ImageRgba8(img)).unwrap()
}

fn blank() -> CameraFrame {
    CameraFrame::solid(160, 120, [250, 250, 250, 255])
}

fn with_marker() -> CameraFrame {
    let mut canvas = RgbaImage::from_pixel(320, 240, Rgba([250, 250, 250, 255]));
    image::imageops::overlay(&mut canvas, &marker().printable(120), 100, 60);
    CameraFrame::from_image(&canvas)
}

fn config() -> SessionConfig {
    let mut cfg = SessionConfig::new("m.png", "v.mp4");
    cfg.viewport = Viewport::new(160, 120).unwrap();
    cfg
}

fn platform(frames: Vec<CameraFrame>) -> Platform {
    Platform::new(
        Box::new(MemoryCamera::new(frames)),
        Box::new(MemoryMediaBackend::new(4, 4, vec![[255, 0, 0, 255]])),
        Box::new(StaticMarkerLoader::new().with("m.png", marker())),
    )
    .with_code_decoder(|| Box::new(Fixed(None)) as Box<dyn CodeDecoder>)
}

struct Fixed(Option<String>);

impl CodeDecoder for Fixed {
    fn decode(&mut self, _gray: &image::GrayImage) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

#[derive(Default)]
struct Log {
    states: Vec<String>,
    errors: Vec<ErrorCode>,
    advisories: Vec<Advisory>,
    frames: usize,
}

struct Recorder(Rc<RefCell<Log>>);

impl SessionListener for Recorder {
    fn on_state(&mut self, state: &SessionState) {
        self.0.borrow_mut().states.push(state.name().to_string());
    }
    fn on_error(&mut self, code: ErrorCode, _message: &str) {
        self.0.borrow_mut().errors.push(code);
    }
    fn on_advisory(&mut self, advisory: Advisory) {
        self.0.borrow_mut().advisories.push(advisory);
    }
    fn on_frame(&mut self, _index: FrameIndex, _frame: &FrameRGBA) {
        self.0.borrow_mut().frames += 1;
    }
}

#[test]
fn listener_sees_states_frames_and_errors() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut session = ArSession::new(config(), platform(vec![blank()]))
        .with_listener(Box::new(Recorder(log.clone())));
    session.start().unwrap();
    session.tick(DT).unwrap();
    session.tick(DT).unwrap();
    assert_eq!(log.borrow().states, vec!["checking-compatibility", "ready"]);
    assert_eq!(log.borrow().frames, 2);

    let mut bad = ArSession::new(SessionConfig::new("missing.png", "v.mp4"), platform(vec![blank()]))
        .with_listener(Box::new(Recorder(log.clone())));
    assert!(bad.start().is_err());
    assert_eq!(log.borrow().errors, vec![ErrorCode::ArInitFailed]);
    assert_eq!(bad.state().error_code(), Some(ErrorCode::ArInitFailed));
}

#[test]
fn invalid_config_fails_before_acquiring() {
    let cam = MemoryCamera::new(vec![blank()]);
    let counters = cam.counters();
    let mut cfg = config();
    cfg.video_url = String::new();
    let mut session = ArSession::new(
        cfg,
        Platform::new(
            Box::new(cam),
            Box::new(MemoryMediaBackend::new(4, 4, vec![])),
            Box::new(StaticMarkerLoader::new()),
        ),
    );
    assert!(session.start().is_err());
    assert_eq!(counters.acquisitions(), 0);
}

#[test]
fn blocked_autoplay_is_an_advisory_until_a_gesture() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut cfg = config();
    cfg.autoplay = true;
    cfg.autoplay_policy = AutoplayPolicy::GestureRequired;
    let mut session = ArSession::new(cfg, platform(vec![blank()]))
        .with_listener(Box::new(Recorder(log.clone())));
    session.start().unwrap();
    assert_eq!(session.state(), &SessionState::Ready);
    assert!(!session.is_playing());
    assert_eq!(log.borrow().advisories, vec![Advisory::AutoplayBlocked]);

    assert_eq!(session.user_gesture(), Some(PlayOutcome::Started));
    assert!(session.is_playing());
}

#[test]
fn debug_overlay_outlines_the_marker() {
    let mut cfg = config();
    cfg.viewport = Viewport::new(320, 240).unwrap();
    let mut plain = ArSession::new(cfg.clone(), platform(vec![with_marker()]));
    plain.start().unwrap();
    plain.tick(DT).unwrap();
    assert_eq!(plain.stats().frames_with_marker, 1);
    cfg.debug_overlay = true;
    let mut debug = ArSession::new(cfg, platform(vec![with_marker()]));
    debug.start().unwrap();
    debug.tick(DT).unwrap();
    assert_ne!(plain.last_frame(), debug.last_frame());
}

#[test]
fn frames_are_forwarded_to_the_sink() {
    let mut session = ArSession::new(config(), platform(vec![blank()]));
    session.set_sink(Box::new(InMemorySink::new())).unwrap();
    session.start().unwrap();
    for _ in 0..3 {
        assert_eq!(session.tick(DT).unwrap(), TickOutcome::Rendered);
    }
    assert_eq!(session.stats().frames_rendered, 3);
    assert!(session.teardown());
}

#[test]
fn resize_changes_output_size() {
    let mut session = ArSession::new(config(), platform(vec![blank()]));
    session.start().unwrap();
    session.resize(Viewport::new(80, 160).unwrap()).unwrap();
    session.tick(DT).unwrap();
    let frame = session.last_frame().unwrap();
    assert_eq!((frame.width, frame.height), (80, 160));
    assert_eq!(session.config().viewport, Viewport::new(80, 160).unwrap());
}

/// Cancels the session token when the `nth` acquisition resolves.
struct CancelOnAcquire {
    inner: MemoryCamera,
    token: Rc<RefCell<Option<CancelToken>>>,
    nth: usize,
    seen: usize,
}

impl CameraDevice for CancelOnAcquire {
    fn acquire(&mut self, req: &CameraRequest) -> Result<CameraStream, CameraError> {
        let stream = self.inner.acquire(req)?;
        self.seen += 1;
        if self.seen == self.nth
            && let Some(token) = self.token.borrow().as_ref()
        {
            token.cancel();
        }
        Ok(stream)
    }
}

#[test]
fn acquisition_after_cancellation_is_released() {
    let cam = MemoryCamera::new(vec![blank()]);
    let counters = cam.counters();
    let slot = Rc::new(RefCell::new(None));
    let log = Rc::new(RefCell::new(Log::default()));
    // The compatibility check is the first acquisition, the pipeline stream the second.
    let camera = CancelOnAcquire {
        inner: cam,
        token: slot.clone(),
        nth: 2,
        seen: 0,
    };
    let mut session = ArSession::new(
        config(),
        Platform::new(
            Box::new(camera),
            Box::new(MemoryMediaBackend::new(4, 4, vec![])),
            Box::new(StaticMarkerLoader::new().with("m.png", marker())),
        ),
    )
    .with_listener(Box::new(Recorder(log.clone())));
    *slot.borrow_mut() = Some(session.cancel_token());

    assert!(session.start().is_err());
    assert!(session.is_torn_down());
    assert!(!session.has_pipeline());
    assert_eq!(session.state(), &SessionState::CheckingCompatibility);
    assert_eq!(counters.acquisitions(), 2);
    assert_eq!(counters.live_streams(), 0);
    assert!(log.borrow().errors.is_empty());
    assert_eq!(log.borrow().states, vec!["checking-compatibility"]);

    assert!(session.begin_scan().is_err());
    assert!(!session.is_scanning());
    assert_eq!(counters.acquisitions(), 2);
}

#[test]
fn cancelled_session_acquires_nothing() {
    let cam = MemoryCamera::new(vec![blank()]);
    let counters = cam.counters();
    let mut session = ArSession::new(
        config(),
        Platform::new(
            Box::new(cam),
            Box::new(MemoryMediaBackend::new(4, 4, vec![])),
            Box::new(StaticMarkerLoader::new().with("m.png", marker())),
        ),
    );
    session.cancel_token().cancel();
    assert!(session.start().is_err());
    assert!(session.begin_scan().is_err());
    assert!(session.retry().is_err());
    assert_eq!(counters.acquisitions(), 0);

    let mut live = ArSession::new(config(), platform(vec![blank()]));
    live.start().unwrap();
    live.begin_scan().unwrap();
    live.cancel_token().cancel();
    assert!(live.cancel_scan().is_err());
    assert!(!live.has_pipeline());
}

#[test]
fn scanned_campaign_that_fails_to_load_reports_once() {
    let log = Rc::new(RefCell::new(Log::default()));
    let code = r#"{"videoUrl":"v.mp4","markerUrl":"unknown.png"}"#.to_string();
    let platform = platform(vec![blank()])
        .with_code_decoder(move || Box::new(Fixed(Some(code.clone()))) as Box<dyn CodeDecoder>);
    let mut session = ArSession::new(config(), platform).with_listener(Box::new(Recorder(log.clone())));
    session.start().unwrap();
    session.begin_scan().unwrap();

    let err = session.tick(DT).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ArInitFailed);
    assert_eq!(session.state().error_code(), Some(ErrorCode::ArInitFailed));
    assert_eq!(log.borrow().errors, vec![ErrorCode::ArInitFailed]);
    assert_eq!(
        log.borrow().states,
        vec!["checking-compatibility", "ready", "scanning", "error"]
    );
    assert!(!session.is_scanning());
    assert!(!session.has_pipeline());
}

#[test]
fn mode_switches_require_the_matching_state() {
    let mut session = ArSession::new(config(), platform(vec![blank()]));
    session.start().unwrap();
    session.begin_scan().unwrap();
    assert!(session.begin_scan().is_err());
    session.cancel_scan().unwrap();
    assert!(session.cancel_scan().is_err());
    assert!(session.retry().is_err());
    assert_eq!(session.state(), &SessionState::Ready);
    assert!(session.has_pipeline());
}

#[test]
fn denied_camera_is_a_camera_failure() {
    let mut denied = ArSession::new(
        config(),
        Platform::new(
            Box::new(MemoryCamera::failing(CameraError::DeviceUnavailable("busy".into()))),
            Box::new(MemoryMediaBackend::new(4, 4, vec![])),
            Box::new(StaticMarkerLoader::new()),
        ),
    );
    let err = denied.start().unwrap_err();
    assert_eq!(err.code(), ErrorCode::CameraFailed);
}

#[test]
fn run_stops_when_the_session_is_cancelled() {
    let mut session = ArSession::new(config(), platform(vec![blank()]));
    session.start().unwrap();
    let lp = RenderLoop::new(session.config().fps).unpaced().with_max_ticks(4);
    let summary = session.run(&lp).unwrap();
    assert_eq!(summary.ticks, 4);
    assert_eq!(session.stats().frames_rendered, 4);

    session.cancel_token().cancel();
    let summary = session.run(&lp).unwrap();
    assert_eq!(summary.ticks, 1);
    assert_eq!(session.stats().frames_rendered, 4);
}
