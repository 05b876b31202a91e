use nalgebra::{Matrix4, Point3, Vector3};

use crate::foundation::core::{Point, Vec3, Viewport};
use crate::foundation::error::ArResult;
use crate::foundation::math::premultiply_in_place;
use crate::marker::pose::{PoseTransform, Quat};
use crate::media::decoder::VideoFrame;
use crate::media::metadata::VideoMetadata;
use crate::render::backend::FrameRGBA;
use crate::render::device::{GpuHandle, RenderDevice, ResourceKind};

/// Bytes charged for the plane's vertex buffer (4 vertices of position + uv, f32).
const PLANE_GEOMETRY_BYTES: usize = 4 * 5 * 4;
const MATERIAL_BYTES: usize = 64;

/// Placement of the video plane relative to the marker anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshTransform {
    /// Plane center in anchor space.
    pub position: Vec3,
    /// Euler rotation in radians.
    pub rotation: Vec3,
    /// Plane width in world units.
    pub width: f64,
    /// Plane height in world units.
    pub height: f64,
}

impl MeshTransform {
    /// Transform described by video metadata; a missing rotation means none.
    pub fn from_metadata(meta: &VideoMetadata) -> Self {
        Self {
            position: meta.position,
            rotation: meta.rotation_radians(),
            width: meta.width,
            height: meta.height,
        }
    }

    /// Model matrix taking unit-plane points into anchor space.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let rot = Quat::from_euler(self.rotation).to_na().to_homogeneous();
        Matrix4::new_translation(&self.position.to_na())
            * rot
            * Matrix4::new_nonuniform_scaling(&Vector3::new(self.width, self.height, 1.0))
    }

    /// Plane corners in camera space once attached to `anchor`, ordered top-left, top-right,
    /// bottom-right, bottom-left.
    pub fn world_corners(&self, anchor: &PoseTransform) -> [Point3<f64>; 4] {
        let m = anchor.to_matrix() * self.to_matrix();
        PLANE_CORNERS.map(|c| m.transform_point(&Point3::new(c.x, c.y, 0.0)))
    }
}

const PLANE_CORNERS: [Point; 4] = [
    Point::new(-0.5, 0.5),
    Point::new(0.5, 0.5),
    Point::new(0.5, -0.5),
    Point::new(-0.5, -0.5),
];

/// Video texture contents, premultiplied RGBA8.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes.
    pub data: Vec<u8>,
}

impl TextureData {
    pub(crate) fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub(crate) fn sample_bilinear(&self, u: f64, v: f64) -> [u8; 4] {
        let w = self.width as usize;
        let h = self.height as usize;
        let x = (u * self.width as f64 - 0.5).clamp(0.0, (w - 1) as f64);
        let y = (v * self.height as f64 - 0.5).clamp(0.0, (h - 1) as f64);
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
        let (fx, fy) = (x - x0 as f64, y - y0 as f64);
        let at = |xx: usize, yy: usize, c: usize| f64::from(self.data[(yy * w + xx) * 4 + c]);
        let mut out = [0u8; 4];
        for (c, o) in out.iter_mut().enumerate() {
            let top = at(x0, y0, c) * (1.0 - fx) + at(x1, y0, c) * fx;
            let bottom = at(x0, y1, c) * (1.0 - fx) + at(x1, y1, c) * fx;
            *o = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}

/// The video plane mesh: geometry, material and texture handles plus its transform.
#[derive(Debug)]
pub struct VideoMesh {
    /// Placement relative to the anchor.
    pub transform: MeshTransform,
    geometry: GpuHandle,
    material: GpuHandle,
    texture: Option<GpuHandle>,
    texture_data: TextureData,
}

impl VideoMesh {
    pub(crate) fn create(device: &mut dyn RenderDevice, transform: MeshTransform) -> ArResult<Self> {
        let geometry = device.allocate(ResourceKind::Geometry, PLANE_GEOMETRY_BYTES)?;
        let material = match device.allocate(ResourceKind::Material, MATERIAL_BYTES) {
            Ok(m) => m,
            Err(e) => {
                device.release(geometry);
                return Err(e);
            }
        };
        Ok(Self {
            transform,
            geometry,
            material,
            texture: None,
            texture_data: TextureData::default(),
        })
    }

    /// Upload a decoded frame into the texture, reallocating when the size changes.
    pub(crate) fn upload(&mut self, device: &mut dyn RenderDevice, frame: &VideoFrame) -> ArResult<()> {
        let len = (frame.width as usize) * (frame.height as usize) * 4;
        if frame.width == 0 || frame.height == 0 || frame.data.len() != len {
            return Ok(());
        }
        if self.texture.is_none()
            || self.texture_data.width != frame.width
            || self.texture_data.height != frame.height
        {
            if let Some(old) = self.texture.take() {
                device.release(old);
            }
            self.texture = Some(device.allocate(ResourceKind::Texture, len)?);
            self.texture_data.width = frame.width;
            self.texture_data.height = frame.height;
        }
        self.texture_data.data.clear();
        self.texture_data.data.extend_from_slice(&frame.data);
        premultiply_in_place(&mut self.texture_data.data);
        Ok(())
    }

    /// Current texture contents; empty until the first upload.
    pub fn texture(&self) -> &TextureData {
        &self.texture_data
    }

    pub(crate) fn dispose(self, device: &mut dyn RenderDevice) -> usize {
        let mut released = 0;
        for h in [Some(self.geometry), Some(self.material), self.texture]
            .into_iter()
            .flatten()
        {
            if device.release(h) {
                released += 1;
            }
        }
        released
    }
}

/// Objects drawn over the camera background.
#[derive(Debug, Default)]
pub struct Scene {
    meshes: Vec<VideoMesh>,
}

impl Scene {
    pub(crate) fn add(&mut self, mesh: VideoMesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<VideoMesh> {
        (index < self.meshes.len()).then(|| self.meshes.remove(index))
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut VideoMesh> {
        self.meshes.get_mut(index)
    }

    /// Meshes currently in the scene.
    pub fn meshes(&self) -> &[VideoMesh] {
        &self.meshes
    }

    /// Number of meshes in the scene.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// `true` when nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// Output surface sized to the viewport. Each frame is composited into its buffer, which lives
/// until the target is released.
#[derive(Debug)]
pub(crate) struct RenderTarget {
    handle: GpuHandle,
    frame: FrameRGBA,
}

impl RenderTarget {
    pub(crate) fn create(device: &mut dyn RenderDevice, viewport: Viewport) -> ArResult<Self> {
        let len = viewport.rgba_len();
        let handle = device.allocate(ResourceKind::RenderTarget, len)?;
        Ok(Self {
            handle,
            frame: FrameRGBA {
                width: viewport.width,
                height: viewport.height,
                data: vec![0; len],
                premultiplied: true,
            },
        })
    }

    pub(crate) fn viewport(&self) -> Viewport {
        Viewport {
            width: self.frame.width,
            height: self.frame.height,
        }
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.frame.data
    }

    /// Contents after the last composite.
    pub(crate) fn frame(&self) -> &FrameRGBA {
        &self.frame
    }

    pub(crate) fn release(self, device: &mut dyn RenderDevice) -> bool {
        device.release(self.handle)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/resources.rs"]
mod tests;
