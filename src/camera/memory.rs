use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::camera::stream::{
    CameraDevice, CameraDriver, CameraError, CameraFrame, CameraRequest, CameraStream, StreamInfo,
    TrackId,
};

/// Counters shared between a [`MemoryCamera`] and the streams it hands out.
#[derive(Debug, Default)]
pub struct CameraCounters {
    acquisitions: AtomicUsize,
    tracks_stopped: AtomicUsize,
    live_streams: AtomicUsize,
}

impl CameraCounters {
    /// Successful acquisitions so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Total `stop_track` calls received.
    pub fn tracks_stopped(&self) -> usize {
        self.tracks_stopped.load(Ordering::SeqCst)
    }

    /// Streams acquired and not yet released.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

/// Camera that replays a fixed list of frames in a loop.
///
/// Used for offline sessions and as the injectable camera in tests. It can also be told to
/// fail acquisition with a given [`CameraError`].
pub struct MemoryCamera {
    frames: Arc<Vec<CameraFrame>>,
    failure: Option<CameraError>,
    counters: Arc<CameraCounters>,
    label: String,
}

impl MemoryCamera {
    /// Camera producing `frames` in order, wrapping around at the end.
    pub fn new(frames: Vec<CameraFrame>) -> Self {
        Self {
            frames: Arc::new(frames),
            failure: None,
            counters: Arc::new(CameraCounters::default()),
            label: "memory".to_string(),
        }
    }

    /// Camera whose every acquisition fails with `err`.
    pub fn failing(err: CameraError) -> Self {
        let mut cam = Self::new(Vec::new());
        cam.failure = Some(err);
        cam
    }

    /// Shared counters for leak assertions.
    pub fn counters(&self) -> Arc<CameraCounters> {
        self.counters.clone()
    }
}

impl CameraDevice for MemoryCamera {
    fn acquire(&mut self, req: &CameraRequest) -> Result<CameraStream, CameraError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.frames.is_empty() {
            return Err(CameraError::DeviceUnavailable(
                "memory camera has no frames".to_string(),
            ));
        }
        self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.counters.live_streams.fetch_add(1, Ordering::SeqCst);

        let first = &self.frames[0];
        let info = StreamInfo {
            width: first.width,
            height: first.height,
            facing: req.facing,
            label: self.label.clone(),
        };
        let driver = MemoryDriver {
            frames: self.frames.clone(),
            cursor: 0,
            counters: self.counters.clone(),
            stopped: false,
        };
        Ok(CameraStream::new(info, &[TrackId(0)], Box::new(driver)))
    }
}

struct MemoryDriver {
    frames: Arc<Vec<CameraFrame>>,
    cursor: usize,
    counters: Arc<CameraCounters>,
    stopped: bool,
}

impl CameraDriver for MemoryDriver {
    fn read_frame(&mut self) -> Result<Option<CameraFrame>, CameraError> {
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Ok(Some(frame))
    }

    fn stop_track(&mut self, _track: TrackId) {
        self.counters.tracks_stopped.fetch_add(1, Ordering::SeqCst);
        if !self.stopped {
            self.stopped = true;
            self.counters.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
