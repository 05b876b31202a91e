use crate::foundation::core::Vec3;
use crate::foundation::error::{ArError, ArResult};

/// Default plane width in world units.
pub const DEFAULT_VIDEO_WIDTH: f64 = 1.6;
/// Default plane height in world units.
pub const DEFAULT_VIDEO_HEIGHT: f64 = 0.9;

/// Placement of the campaign video relative to the marker anchor.
///
/// Rotation is in degrees; a missing rotation means no rotation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// Video reference.
    pub url: String,
    /// Plane center in anchor space.
    #[serde(default)]
    pub position: Vec3,
    /// Euler rotation in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    /// Plane width in world units.
    #[serde(default = "default_width")]
    pub width: f64,
    /// Plane height in world units.
    #[serde(default = "default_height")]
    pub height: f64,
}

fn default_width() -> f64 {
    DEFAULT_VIDEO_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_VIDEO_HEIGHT
}

impl VideoMetadata {
    /// Metadata for `url` with default size and placement.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            position: Vec3::ZERO,
            rotation: None,
            width: DEFAULT_VIDEO_WIDTH,
            height: DEFAULT_VIDEO_HEIGHT,
        }
    }

    /// Rotation in radians, zero when unset.
    pub fn rotation_radians(&self) -> Vec3 {
        self.rotation.unwrap_or(Vec3::ZERO).to_radians()
    }

    /// Check the metadata is usable.
    pub fn validate(&self) -> ArResult<()> {
        if self.url.trim().is_empty() {
            return Err(ArError::validation("video url must not be empty"));
        }
        if !(self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0)
        {
            return Err(ArError::validation(format!(
                "video plane size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.position.is_finite() || !self.rotation.unwrap_or(Vec3::ZERO).is_finite() {
            return Err(ArError::validation("video placement must be finite"));
        }
        Ok(())
    }
}
