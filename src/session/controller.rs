use std::time::Duration;

use crate::camera::ffmpeg::FfmpegCamera;
use crate::camera::stream::{CameraDevice, CameraStream};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, Viewport};
use crate::foundation::error::{ArError, ArResult, ErrorCode};
use crate::marker::descriptor::{DefaultMarkerLoader, MarkerLoader};
use crate::marker::detector::{Detection, MarkerTracker, PatternTracker};
use crate::marker::pose::PoseTransform;
use crate::media::decoder::{FfmpegMediaBackend, MediaBackend};
use crate::media::source::{MediaEvent, PlayOutcome, StreamingVideoSource};
use crate::render::backend::FrameRGBA;
use crate::render::compositor::VideoCompositor;
use crate::render::device::{RenderDevice, SoftwareDevice};
use crate::scan::payload::ScanPayload;
use crate::scan::scanner::{CodeDecoder, CodeScanner, RqrrDecoder, ScanTick};
use crate::session::config::{SessionConfig, VideoPlacement};
use crate::session::frame_loop::{CancelToken, LoopControl, LoopSummary, RenderLoop};
use crate::session::state::{SessionEvent, SessionState, next_state};
use crate::tracking::bridge::{PlaybackEffect, PlaybackMode, PoseBridge, Visibility};

/// Builds a fresh render device for each compositor.
pub type RenderDeviceFactory = Box<dyn FnMut() -> Box<dyn RenderDevice> + Send>;
/// Builds a fresh code decoder for each scan.
pub type CodeDecoderFactory = Box<dyn FnMut() -> Box<dyn CodeDecoder> + Send>;

/// Platform services a session runs on.
pub struct Platform {
    /// Camera source.
    pub camera: Box<dyn CameraDevice>,
    /// Render context factory.
    pub render_device: RenderDeviceFactory,
    /// Video decoding backend.
    pub media: Box<dyn MediaBackend>,
    /// Marker image loader.
    pub markers: Box<dyn MarkerLoader>,
    /// QR decoder factory.
    pub code_decoder: CodeDecoderFactory,
}

impl Platform {
    /// Platform with the software render device and `rqrr` decoding.
    pub fn new(
        camera: Box<dyn CameraDevice>,
        media: Box<dyn MediaBackend>,
        markers: Box<dyn MarkerLoader>,
    ) -> Self {
        Self {
            camera,
            render_device: Box::new(|| Box::new(SoftwareDevice::new()) as Box<dyn RenderDevice>),
            media,
            markers,
            code_decoder: Box::new(|| Box::new(RqrrDecoder) as Box<dyn CodeDecoder>),
        }
    }

    /// ffmpeg camera and decoder, HTTP/file marker loading.
    pub fn native(camera: FfmpegCamera) -> Self {
        Self::new(
            Box::new(camera),
            Box::new(FfmpegMediaBackend::new()),
            Box::new(DefaultMarkerLoader::default()),
        )
    }

    /// Replace the render device factory.
    pub fn with_render_device(
        mut self,
        factory: impl FnMut() -> Box<dyn RenderDevice> + Send + 'static,
    ) -> Self {
        self.render_device = Box::new(factory);
        self
    }

    /// Replace the code decoder factory.
    pub fn with_code_decoder(
        mut self,
        factory: impl FnMut() -> Box<dyn CodeDecoder> + Send + 'static,
    ) -> Self {
        self.code_decoder = Box::new(factory);
        self
    }
}

/// Non-fatal notices for the hosting UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Advisory {
    /// Playback waits for a user gesture.
    AutoplayBlocked,
    /// Video decoder is starved.
    Buffering,
    /// Video data arrived again.
    Buffered,
}

/// Receives session notifications. Every method has an empty default.
pub trait SessionListener {
    /// State changed.
    fn on_state(&mut self, _state: &SessionState) {}
    /// Fatal error; the session is now in [`SessionState::Error`].
    fn on_error(&mut self, _code: ErrorCode, _message: &str) {}
    /// Non-fatal notice.
    fn on_advisory(&mut self, _advisory: Advisory) {}
    /// A campaign code was scanned.
    fn on_scan(&mut self, _payload: &ScanPayload) {}
    /// A frame was composited.
    fn on_frame(&mut self, _index: FrameIndex, _frame: &FrameRGBA) {}
}

/// Counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SessionStats {
    /// Ticks processed in `Ready` or `Scanning`.
    pub ticks: u64,
    /// Frames composited.
    pub frames_rendered: u64,
    /// Frames in which the marker was found.
    pub frames_with_marker: u64,
    /// Found/lost edges observed.
    pub transitions: u64,
    /// Play commands issued to the video.
    pub play_commands: u64,
    /// Pause commands issued to the video.
    pub pause_commands: u64,
    /// Frames handed to the code scanner.
    pub scan_attempts: u64,
}

/// Result of one [`ArSession::tick`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do in the current state, or no camera frame yet.
    Idle,
    /// A frame was composited; see [`ArSession::last_frame`].
    Rendered,
    /// Scanning, no code yet.
    Scanning,
    /// A payload was scanned and the pipeline rebuilt for it.
    Scanned(ScanPayload),
}

/// Live marker pipeline. Fields drop in declaration order, but [`Pipeline::dispose`] is the
/// normal exit.
struct Pipeline {
    video: StreamingVideoSource,
    compositor: VideoCompositor,
    tracker: PatternTracker,
    bridge: PoseBridge,
    stream: CameraStream,
}

impl Pipeline {
    fn dispose(mut self) {
        self.video.teardown();
        self.compositor.teardown();
        self.stream.release();
    }
}

/// Orchestrates camera, detector, bridge, video and compositor for one campaign.
pub struct ArSession {
    config: SessionConfig,
    platform: Platform,
    state: SessionState,
    pipeline: Option<Pipeline>,
    scanner: Option<CodeScanner>,
    listener: Option<Box<dyn SessionListener>>,
    sink: Option<Box<dyn FrameSink>>,
    token: CancelToken,
    stats: SessionStats,
    last_frame: Option<FrameRGBA>,
    next_frame_index: u64,
    torn_down: bool,
}

impl ArSession {
    /// Session for `config` on `platform`. Nothing is acquired until [`ArSession::start`].
    pub fn new(config: SessionConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            state: SessionState::CheckingCompatibility,
            pipeline: None,
            scanner: None,
            listener: None,
            sink: None,
            token: CancelToken::new(),
            stats: SessionStats::default(),
            last_frame: None,
            next_frame_index: 0,
            torn_down: false,
        }
    }

    /// Attach a listener for state, error, advisory, scan and frame notifications.
    pub fn with_listener(mut self, listener: Box<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Forward every composited frame to `sink`.
    pub fn set_sink(&mut self, mut sink: Box<dyn FrameSink>) -> ArResult<()> {
        sink.begin(SinkConfig {
            width: self.config.viewport.width,
            height: self.config.viewport.height,
            fps: self.config.fps,
        })?;
        if let Some(mut old) = self.sink.replace(sink) {
            old.end()?;
        }
        Ok(())
    }

    /// Check compatibility, then bring up the marker pipeline.
    ///
    /// On failure the session is in [`SessionState::Error`] with everything released, and the
    /// error is returned. A cancelled session is refused; cancellation that lands while the
    /// camera is being acquired tears the session down instead.
    #[tracing::instrument(level = "info", skip(self), fields(marker = %self.config.marker_url, video = %self.config.video_url))]
    pub fn start(&mut self) -> ArResult<()> {
        self.ensure_active()?;
        if self.state != SessionState::CheckingCompatibility {
            return Err(ArError::validation(format!(
                "start() requires checking-compatibility, session is {}",
                self.state.name()
            )));
        }
        self.notify_state();
        if let Err(e) = self.config.validate() {
            return Err(self.fail(e));
        }
        if let Err(e) = self.check_compatibility() {
            return Err(self.fail(e));
        }
        self.enter_ready(SessionEvent::CompatibilityPassed)
    }

    fn check_compatibility(&mut self) -> ArResult<()> {
        let device = (self.platform.render_device)();
        let caps = device.probe()?;
        tracing::debug!(device = %caps.name, "render device available");
        let mut probe = self.platform.camera.acquire(&self.config.camera)?;
        probe.release();
        Ok(())
    }

    fn enter_ready(&mut self, event: SessionEvent) -> ArResult<()> {
        self.open_pipeline(event).map_err(|e| self.fail(e))
    }

    /// Build the pipeline, then apply `event` to reach `Ready`. Errors are returned unreported.
    ///
    /// A camera stream that resolves after cancellation is released and the session is torn
    /// down without ever reaching `Ready`.
    fn open_pipeline(&mut self, event: SessionEvent) -> ArResult<()> {
        let Some(mut pipeline) = self.build_pipeline()? else {
            self.teardown();
            return Err(ArError::validation(
                "session was cancelled while the camera was being acquired",
            ));
        };
        self.transition(event);
        if self.config.autoplay {
            Self::issue_play(&mut pipeline.video, &mut self.stats);
        }
        self.pipeline = Some(pipeline);
        self.forward_media_events();
        tracing::info!(autoplay = self.config.autoplay, "session ready");
        Ok(())
    }

    /// Acquire everything in order. Partially built pieces are released by their `Drop`.
    fn build_pipeline(&mut self) -> ArResult<Option<Pipeline>> {
        let mut stream = self.platform.camera.acquire(&self.config.camera)?;
        if self.token.is_cancelled() {
            stream.release();
            tracing::debug!("camera acquired after cancellation; released");
            return Ok(None);
        }

        let desc = self
            .platform
            .markers
            .load(&self.config.marker_url)
            .map_err(|e| {
                if matches!(e, ArError::InitFailed(_)) {
                    e
                } else {
                    ArError::init_failed(e.to_string())
                }
            })?;
        let mut tracker = PatternTracker::new(desc, self.config.detector.clone());
        tracker.set_viewport(self.config.viewport);

        let device = (self.platform.render_device)();
        let mut compositor = VideoCompositor::new(device, self.config.viewport)?;

        let meta = self.config.video_metadata();
        let video = StreamingVideoSource::load(
            &meta.url,
            self.platform.media.as_mut(),
            self.config.source_options(),
        )?;
        compositor.attach_video(&meta)?;

        Ok(Some(Pipeline {
            video,
            compositor,
            tracker,
            bridge: PoseBridge::new(PlaybackMode::from_autoplay(self.config.autoplay)),
            stream,
        }))
    }

    /// Run one frame of the active mode. `dt` advances the video clock.
    ///
    /// A fatal error moves the session to [`SessionState::Error`] and is returned.
    pub fn tick(&mut self, dt: Duration) -> ArResult<TickOutcome> {
        if self.torn_down {
            return Ok(TickOutcome::Idle);
        }
        match self.state {
            SessionState::Ready => match self.tick_ready(dt) {
                Ok(out) => Ok(out),
                Err(e) => Err(self.fail(e)),
            },
            SessionState::Scanning => match self.tick_scanning() {
                Ok(out) => Ok(out),
                Err(e) => Err(self.fail(e)),
            },
            _ => Ok(TickOutcome::Idle),
        }
    }

    fn tick_ready(&mut self, dt: Duration) -> ArResult<TickOutcome> {
        let Some(p) = self.pipeline.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        self.stats.ticks += 1;
        let Some(frame) = p.stream.next_frame()? else {
            return Ok(TickOutcome::Idle);
        };

        let detection = p.tracker.detect(&frame);
        let step = p.bridge.update(&detection);
        if detection.is_found() {
            self.stats.frames_with_marker += 1;
        }
        if step.transition.is_some() {
            self.stats.transitions += 1;
        }
        match step.effect {
            Some(PlaybackEffect::Play) => Self::issue_play(&mut p.video, &mut self.stats),
            Some(PlaybackEffect::Pause) => {
                p.video.pause();
                self.stats.pause_commands += 1;
            }
            None => {}
        }
        if self.config.debug_overlay {
            p.compositor.set_debug_quad(match &detection {
                Detection::Found(hit) => Some(hit.corners),
                Detection::NotFound => None,
            });
        }

        p.video.advance(dt);
        if let Some(msg) = p.video.failure() {
            return Err(ArError::media_load(format!(
                "video '{}' failed: {msg}",
                p.video.url()
            )));
        }
        self.forward_media_events();

        let Some(p) = self.pipeline.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        let out = p
            .compositor
            .render(&frame, p.bridge.anchor(), p.video.current_frame())?;
        let index = FrameIndex(self.next_frame_index);
        self.next_frame_index += 1;
        self.stats.frames_rendered += 1;
        if let Some(sink) = self.sink.as_mut() {
            sink.push_frame(index, out)?;
        }
        if let Some(l) = self.listener.as_mut() {
            l.on_frame(index, out);
        }
        match self.last_frame.as_mut() {
            Some(last) => last.copy_from(out),
            None => self.last_frame = Some(out.clone()),
        }
        Ok(TickOutcome::Rendered)
    }

    fn tick_scanning(&mut self) -> ArResult<TickOutcome> {
        let Some(scanner) = self.scanner.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        self.stats.ticks += 1;
        self.stats.scan_attempts += 1;
        match scanner.tick()? {
            ScanTick::Pending => Ok(TickOutcome::Scanning),
            ScanTick::Stopped => Ok(TickOutcome::Idle),
            ScanTick::Found(payload) => {
                self.scanner = None;
                if let Some(l) = self.listener.as_mut() {
                    l.on_scan(&payload);
                }
                self.config.marker_url = payload.marker_url.clone();
                self.config.video_url = payload.video_url.clone();
                self.config.video = VideoPlacement::default();
                self.open_pipeline(SessionEvent::ScanCompleted)
                    .map(|()| TickOutcome::Scanned(payload))
            }
        }
    }

    /// Leave the marker pipeline and scan for a campaign code with a fresh camera stream.
    pub fn begin_scan(&mut self) -> ArResult<()> {
        self.ensure_active()?;
        if self.state != SessionState::Ready {
            return Err(ArError::validation(format!(
                "scan can only start from ready, session is {}",
                self.state.name()
            )));
        }
        self.dispose_pipeline();
        let decoder = (self.platform.code_decoder)();
        match CodeScanner::start(self.platform.camera.as_mut(), &self.config.camera, decoder) {
            Ok(scanner) => {
                self.scanner = Some(scanner);
                self.transition(SessionEvent::ScanRequested);
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Stop scanning and rebuild the pipeline for the current campaign.
    pub fn cancel_scan(&mut self) -> ArResult<()> {
        self.ensure_active()?;
        if self.state != SessionState::Scanning {
            return Err(ArError::validation(format!(
                "no scan in progress, session is {}",
                self.state.name()
            )));
        }
        if let Some(mut scanner) = self.scanner.take() {
            scanner.stop();
        }
        self.enter_ready(SessionEvent::ScanCancelled)
    }

    /// Full reset out of [`SessionState::Error`]: a new compatibility check and acquisition.
    pub fn retry(&mut self) -> ArResult<()> {
        self.ensure_active()?;
        if self.state.error_code().is_none() {
            return Err(ArError::validation(format!(
                "retry requires the error state, session is {}",
                self.state.name()
            )));
        }
        self.release_all();
        self.token = CancelToken::new();
        self.transition(SessionEvent::Retry);
        self.start()
    }

    /// Record a user interaction; resumes playback blocked by the autoplay policy.
    pub fn user_gesture(&mut self) -> Option<PlayOutcome> {
        let p = self.pipeline.as_mut()?;
        let out = p.video.user_gesture();
        if out == Some(PlayOutcome::Started) {
            self.stats.play_commands += 1;
        }
        self.forward_media_events();
        out
    }

    /// Follow a viewport change.
    pub fn resize(&mut self, viewport: Viewport) -> ArResult<()> {
        if let Some(p) = self.pipeline.as_mut() {
            p.compositor.resize(viewport)?;
            p.tracker.set_viewport(viewport);
        }
        self.config.viewport = viewport;
        Ok(())
    }

    /// Drive ticks with `render_loop` until it ends, the session errors, or it is torn down.
    pub fn run(&mut self, render_loop: &RenderLoop) -> ArResult<LoopSummary> {
        let session_token = self.token.clone();
        render_loop.run(|_, dt| {
            if session_token.is_cancelled() || self.torn_down {
                return Ok(LoopControl::Stop);
            }
            self.tick(dt)?;
            Ok(LoopControl::Continue)
        })
    }

    /// Cancel the loop, stop camera tracks, dispose media and GPU resources. Idempotent;
    /// returns `false` when already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.token.cancel();
        self.release_all();
        if let Some(mut sink) = self.sink.take()
            && let Err(e) = sink.end()
        {
            tracing::warn!(error = %e, "frame sink failed to finish");
        }
        self.torn_down = true;
        tracing::info!(ticks = self.stats.ticks, frames = self.stats.frames_rendered, "session torn down");
        true
    }

    /// Token cancelling this session's loop and pending acquisitions.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current configuration, updated by scans and resizes.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Most recent composited frame.
    pub fn last_frame(&self) -> Option<&FrameRGBA> {
        self.last_frame.as_ref()
    }

    /// `true` while the campaign video plays.
    pub fn is_playing(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| p.video.is_playing())
    }

    /// Marker visibility, `NotFound` outside `Ready`.
    pub fn visibility(&self) -> Visibility {
        self.pipeline
            .as_ref()
            .map_or(Visibility::NotFound, |p| p.bridge.visibility())
    }

    /// Anchor pose of the last frame.
    pub fn anchor(&self) -> Option<&PoseTransform> {
        self.pipeline.as_ref().and_then(|p| p.bridge.anchor())
    }

    /// `true` while the marker pipeline holds a camera stream.
    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    /// `true` while the code scanner holds a camera stream.
    pub fn is_scanning(&self) -> bool {
        self.scanner.as_ref().is_some_and(|s| s.is_active())
    }

    /// `true` after [`ArSession::teardown`].
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Entry points that acquire the camera refuse to run once the session is torn down or
    /// its token is cancelled.
    fn ensure_active(&self) -> ArResult<()> {
        if self.torn_down {
            return Err(ArError::validation("session has been torn down"));
        }
        if self.token.is_cancelled() {
            return Err(ArError::validation("session has been cancelled"));
        }
        Ok(())
    }

    fn issue_play(video: &mut StreamingVideoSource, stats: &mut SessionStats) {
        stats.play_commands += 1;
        match video.play() {
            PlayOutcome::Started | PlayOutcome::AlreadyPlaying | PlayOutcome::Blocked => {}
            PlayOutcome::Unavailable => tracing::warn!("play requested on an unavailable video"),
        }
    }

    fn forward_media_events(&mut self) {
        let Some(p) = self.pipeline.as_mut() else {
            return;
        };
        for event in p.video.drain_events() {
            let advisory = match event {
                MediaEvent::AutoplayBlocked => Advisory::AutoplayBlocked,
                MediaEvent::Waiting => Advisory::Buffering,
                MediaEvent::CanPlay => Advisory::Buffered,
                _ => continue,
            };
            if let Some(l) = self.listener.as_mut() {
                l.on_advisory(advisory);
            }
        }
    }

    fn dispose_pipeline(&mut self) {
        if let Some(p) = self.pipeline.take() {
            p.dispose();
        }
    }

    fn release_all(&mut self) {
        self.dispose_pipeline();
        if let Some(mut scanner) = self.scanner.take() {
            scanner.stop();
        }
    }

    fn transition(&mut self, event: SessionEvent) {
        if let Some(next) = next_state(&self.state, &event) {
            self.state = next;
            self.notify_state();
        }
    }

    fn notify_state(&mut self) {
        tracing::debug!(state = self.state.name(), "session state");
        if let Some(l) = self.listener.as_mut() {
            l.on_state(&self.state);
        }
    }

    /// Release everything, enter `Error`, notify, and hand the error back.
    /// A torn-down session only releases; it no longer changes state or notifies.
    fn fail(&mut self, err: ArError) -> ArError {
        self.release_all();
        if self.torn_down {
            return err;
        }
        let code = err.code();
        let message = err.to_string();
        tracing::warn!(code = %code, error = %message, "session failed");
        let was_error = self.state.error_code().is_some();
        self.transition(SessionEvent::Failed {
            code,
            message: message.clone(),
        });
        if !was_error && let Some(l) = self.listener.as_mut() {
            l.on_error(code, &message);
        }
        err
    }
}

impl Drop for ArSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ArSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArSession")
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/controller.rs"]
mod tests;
