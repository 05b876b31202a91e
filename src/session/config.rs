use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::camera::stream::CameraRequest;
use crate::foundation::core::{Fps, Vec3, Viewport};
use crate::foundation::error::{ArError, ArResult};
use crate::marker::detector::DetectorOptions;
use crate::media::hls::HlsConfig;
use crate::media::metadata::{DEFAULT_VIDEO_HEIGHT, DEFAULT_VIDEO_WIDTH, VideoMetadata};
use crate::media::policy::AutoplayPolicy;
use crate::media::source::SourceOptions;

/// Optional placement overrides for the video plane.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoPlacement {
    /// Plane center in anchor space.
    pub position: Vec3,
    /// Euler rotation in degrees; absent means none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    /// Plane width in world units.
    pub width: f64,
    /// Plane height in world units.
    pub height: f64,
}

impl Default for VideoPlacement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: None,
            width: DEFAULT_VIDEO_WIDTH,
            height: DEFAULT_VIDEO_HEIGHT,
        }
    }
}

/// Everything a session needs to run one campaign.
///
/// Loaded from JSON:
///
/// ```json
/// { "markerUrl": "marker.png", "videoUrl": "https://cdn.example.com/v/master.m3u8", "autoplay": false }
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Marker image reference.
    pub marker_url: String,
    /// Campaign video reference.
    pub video_url: String,
    /// Play as soon as the session is ready instead of when the marker is found.
    #[serde(default)]
    pub autoplay: bool,
    /// Video plane placement.
    #[serde(default)]
    pub video: VideoPlacement,
    /// Camera acquisition parameters.
    #[serde(default)]
    pub camera: CameraRequest,
    /// Output size.
    #[serde(default)]
    pub viewport: Viewport,
    /// Render loop cadence.
    #[serde(default)]
    pub fps: Fps,
    /// Autoplay rule applied to the video.
    #[serde(default)]
    pub autoplay_policy: AutoplayPolicy,
    /// Start the video muted.
    #[serde(default = "default_true")]
    pub muted: bool,
    /// Loop the video.
    #[serde(default = "default_true", rename = "loop")]
    pub looping: bool,
    /// Let a backend with native playlist support play `.m3u8` URLs itself.
    #[serde(default)]
    pub prefer_native_hls: bool,
    /// Adaptive-streaming settings.
    #[serde(default)]
    pub hls: HlsConfig,
    /// Marker detector tuning.
    #[serde(default)]
    pub detector: DetectorOptions,
    /// Outline the detected marker on output frames.
    #[serde(default)]
    pub debug_overlay: bool,
}

fn default_true() -> bool {
    true
}

impl SessionConfig {
    /// Config for one campaign with defaults everywhere else.
    pub fn new(marker_url: impl Into<String>, video_url: impl Into<String>) -> Self {
        Self {
            marker_url: marker_url.into(),
            video_url: video_url.into(),
            autoplay: false,
            video: VideoPlacement::default(),
            camera: CameraRequest::default(),
            viewport: Viewport::default(),
            fps: Fps::default(),
            autoplay_policy: AutoplayPolicy::default(),
            muted: true,
            looping: true,
            prefer_native_hls: false,
            hls: HlsConfig::default(),
            detector: DetectorOptions::default(),
            debug_overlay: false,
        }
    }

    /// Parse a config from JSON.
    pub fn from_reader<R: std::io::Read>(r: R) -> ArResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| ArError::serde(format!("parse session config JSON: {e}")))
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> ArResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ArError::validation(format!("open session config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check the config is usable before any resource is acquired.
    pub fn validate(&self) -> ArResult<()> {
        if self.marker_url.trim().is_empty() {
            return Err(ArError::validation("markerUrl must not be empty"));
        }
        self.video_metadata().validate()?;
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ArError::validation("viewport width/height must be non-zero"));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(ArError::validation("fps must be non-zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ArError::validation("camera width/height must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(ArError::validation(format!(
                "detector.minConfidence must be within 0..=1, got {}",
                self.detector.min_confidence
            )));
        }
        Ok(())
    }

    /// Video metadata derived from the URL and placement overrides.
    pub fn video_metadata(&self) -> VideoMetadata {
        VideoMetadata {
            url: self.video_url.clone(),
            position: self.video.position,
            rotation: self.video.rotation,
            width: self.video.width,
            height: self.video.height,
        }
    }

    /// Options for the video source.
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            looping: self.looping,
            muted: self.muted,
            prefer_native_hls: self.prefer_native_hls,
            autoplay_policy: self.autoplay_policy,
            hls: self.hls.clone(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
