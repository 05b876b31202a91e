//! Marker descriptors, detection and pose estimation.

pub(crate) mod descriptor;
pub(crate) mod detector;
pub(crate) mod pose;
pub(crate) mod quad;

pub use descriptor::{
    DEFAULT_PATTERN_RATIO, DefaultMarkerLoader, MarkerDescriptor, MarkerLoader,
    StaticMarkerLoader, TEMPLATE_SIZE,
};
pub use detector::{Detection, DetectorOptions, MarkerHit, MarkerTracker, PatternTracker};
pub use pose::{CameraIntrinsics, PoseTransform, Quat, RENDER_FOV_DEG, estimate_pose};
