use crate::foundation::core::{FacingMode, Fps};
use crate::foundation::error::{ArError, ArResult};
use crate::foundation::math::luma;

/// Why a camera could not be acquired or read.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The user or platform refused camera access.
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    /// The device is missing, busy, or stopped producing frames.
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The platform has no usable camera API at all.
    #[error("camera unsupported: {0}")]
    Unsupported(String),
}

impl From<CameraError> for ArError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::Unsupported(_) => ArError::unsupported(err.to_string()),
            CameraError::PermissionDenied(_) | CameraError::DeviceUnavailable(_) => {
                ArError::camera_failed(err.to_string())
            }
        }
    }
}

/// Parameters for a camera acquisition.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraRequest {
    /// Requested facing mode; environment (rear) by default.
    pub facing: FacingMode,
    /// Requested capture width in pixels.
    pub width: u32,
    /// Requested capture height in pixels.
    pub height: u32,
    /// Requested capture rate.
    pub fps: Fps,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            width: 640,
            height: 480,
            fps: Fps::default(),
        }
    }
}

/// One captured camera image, straight-alpha RGBA8, row-major, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 bytes.
    pub data: Vec<u8>,
    /// Monotonic sequence number within the stream.
    pub seq: u64,
}

impl CameraFrame {
    /// Wrap raw RGBA8 bytes, checking the buffer length.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> ArResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(ArError::validation(format!(
                "camera frame {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            seq: 0,
        })
    }

    /// Solid-color frame, mostly useful for tests and placeholders.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
            seq: 0,
        }
    }

    /// Convert an `image` buffer into a camera frame.
    pub fn from_image(img: &image::RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().clone(),
            seq: 0,
        }
    }

    /// Luma plane of the frame.
    pub fn to_gray(&self) -> image::GrayImage {
        let luma: Vec<u8> = self.data.chunks_exact(4).map(luma).collect();
        image::GrayImage::from_raw(self.width, self.height, luma)
            .unwrap_or_else(|| image::GrayImage::new(self.width, self.height))
    }
}

/// Identifier of one media track inside a [`CameraStream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(pub u32);

/// Negotiated properties of an acquired stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    /// Delivered width in pixels.
    pub width: u32,
    /// Delivered height in pixels.
    pub height: u32,
    /// Facing mode actually used.
    pub facing: FacingMode,
    /// Human-readable device label.
    pub label: String,
}

/// Device-specific side of an open stream.
pub trait CameraDriver: Send {
    /// Return the newest frame, `None` if no new frame is available yet.
    fn read_frame(&mut self) -> Result<Option<CameraFrame>, CameraError>;
    /// Stop one track. Called at most once per track by [`CameraStream`].
    fn stop_track(&mut self, track: TrackId);
}

struct Track {
    id: TrackId,
    live: bool,
}

/// Active handle to a capture device.
///
/// Owns its tracks: [`CameraStream::release`] stops each live track exactly once and is
/// idempotent. Dropping an unreleased stream releases it.
pub struct CameraStream {
    info: StreamInfo,
    tracks: Vec<Track>,
    driver: Box<dyn CameraDriver>,
    next_seq: u64,
}

impl CameraStream {
    /// Assemble a stream from a driver and its track ids.
    pub fn new(info: StreamInfo, tracks: &[TrackId], driver: Box<dyn CameraDriver>) -> Self {
        Self {
            info,
            tracks: tracks.iter().map(|&id| Track { id, live: true }).collect(),
            driver,
            next_seq: 0,
        }
    }

    /// Negotiated stream properties.
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// `true` while at least one track is live.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| t.live)
    }

    /// Pull the newest frame from the device.
    pub fn next_frame(&mut self) -> Result<Option<CameraFrame>, CameraError> {
        if !self.is_active() {
            return Err(CameraError::DeviceUnavailable(
                "camera stream already released".to_string(),
            ));
        }
        let frame = self.driver.read_frame()?;
        Ok(frame.map(|mut f| {
            f.seq = self.next_seq;
            self.next_seq += 1;
            f
        }))
    }

    /// Stop every live track. Returns how many tracks this call stopped.
    pub fn release(&mut self) -> usize {
        let mut stopped = 0;
        for track in self.tracks.iter_mut().filter(|t| t.live) {
            self.driver.stop_track(track.id);
            track.live = false;
            stopped += 1;
        }
        if stopped > 0 {
            tracing::debug!(label = %self.info.label, stopped, "camera stream released");
        }
        stopped
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("info", &self.info)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Source of camera streams.
pub trait CameraDevice {
    /// Acquire a new stream. May block on a platform permission prompt.
    fn acquire(&mut self, req: &CameraRequest) -> Result<CameraStream, CameraError>;
}

#[cfg(test)]
#[path = "../../tests/unit/camera/stream.rs"]
mod tests;
