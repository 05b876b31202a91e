//! Video compositor: camera background, the marker-anchored video plane, and the device
//! allocations behind them.

pub(crate) mod backend;
pub(crate) mod camera;
pub(crate) mod compositor;
pub(crate) mod device;
pub(crate) mod overlay;
pub(crate) mod raster;
pub(crate) mod resources;

pub use backend::FrameRGBA;
pub use camera::{FAR_PLANE, NEAR_PLANE, PerspectiveCamera};
pub use compositor::VideoCompositor;
pub use device::{DeviceCaps, GpuHandle, HandleLedger, RenderDevice, ResourceKind, SoftwareDevice};
pub use raster::CoverFit;
pub use resources::{MeshTransform, Scene, TextureData, VideoMesh};
