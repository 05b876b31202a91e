use crate::camera::stream::CameraFrame;
use crate::foundation::core::{Point, Viewport};
use crate::foundation::error::{ArError, ArResult};
use crate::marker::pose::PoseTransform;
use crate::media::decoder::VideoFrame;
use crate::media::metadata::VideoMetadata;
use crate::render::backend::FrameRGBA;
use crate::render::camera::PerspectiveCamera;
use crate::render::device::{DeviceCaps, HandleLedger, RenderDevice};
use crate::render::overlay::DebugOverlay;
use crate::render::raster::{BackgroundPainter, CoverFit, draw_textured_quad};
use crate::render::resources::{MeshTransform, RenderTarget, Scene, VideoMesh};

/// Draws the camera background and the marker-anchored video plane.
///
/// Owns every device allocation it makes. [`VideoCompositor::teardown`] removes the mesh from
/// the scene before disposing its geometry, material and texture, then releases the render
/// target. Teardown is idempotent and also runs on drop.
pub struct VideoCompositor {
    device: Box<dyn RenderDevice>,
    caps: DeviceCaps,
    camera: PerspectiveCamera,
    target: Option<RenderTarget>,
    scene: Scene,
    video_mesh: Option<usize>,
    background: BackgroundPainter,
    overlay: DebugOverlay,
    debug_quad: Option<[Point; 4]>,
    last_camera_size: (u32, u32),
    frames_rendered: u64,
    torn_down: bool,
}

impl VideoCompositor {
    /// Probe `device` and allocate a render target for `viewport`.
    ///
    /// A failed probe is `AR_UNSUPPORTED` and nothing is allocated.
    pub fn new(mut device: Box<dyn RenderDevice>, viewport: Viewport) -> ArResult<Self> {
        let caps = device.probe()?;
        check_viewport(viewport, &caps)?;
        let target = RenderTarget::create(device.as_mut(), viewport)?;
        tracing::debug!(device = %caps.name, width = viewport.width, height = viewport.height, "compositor ready");
        Ok(Self {
            device,
            caps,
            camera: PerspectiveCamera::for_viewport(viewport),
            target: Some(target),
            scene: Scene::default(),
            video_mesh: None,
            background: BackgroundPainter::default(),
            overlay: DebugOverlay::new(),
            debug_quad: None,
            last_camera_size: (0, 0),
            frames_rendered: 0,
            torn_down: false,
        })
    }

    /// Build the video plane for `meta` and add it to the scene.
    ///
    /// Any previously attached plane is disposed first.
    pub fn attach_video(&mut self, meta: &VideoMetadata) -> ArResult<()> {
        self.ensure_live()?;
        meta.validate()?;
        self.detach_video();
        let mesh = VideoMesh::create(self.device.as_mut(), MeshTransform::from_metadata(meta))?;
        self.video_mesh = Some(self.scene.add(mesh));
        tracing::debug!(url = %meta.url, width = meta.width, height = meta.height, "video plane attached");
        Ok(())
    }

    /// Remove and dispose the video plane. Returns how many handles were released.
    pub fn detach_video(&mut self) -> usize {
        let Some(index) = self.video_mesh.take() else {
            return 0;
        };
        match self.scene.remove(index) {
            Some(mesh) => mesh.dispose(self.device.as_mut()),
            None => 0,
        }
    }

    /// Compose one output frame into the render target and return it.
    ///
    /// `video` (when present) is uploaded to the plane's texture; the plane is drawn only when
    /// an `anchor` is given and a texture has been uploaded. The returned frame is overwritten
    /// by the next call.
    pub fn render(
        &mut self,
        camera: &CameraFrame,
        anchor: Option<&PoseTransform>,
        video: Option<&VideoFrame>,
    ) -> ArResult<&FrameRGBA> {
        self.ensure_live()?;
        let Some(target) = self.target.as_mut() else {
            return Err(ArError::validation("compositor has no render target"));
        };
        let viewport = target.viewport();
        let data = target.pixels_mut();
        self.background.draw(data, viewport, camera)?;
        self.last_camera_size = (camera.width, camera.height);

        if let Some(index) = self.video_mesh
            && let Some(mesh) = self.scene.get_mut(index)
        {
            if let Some(frame) = video {
                mesh.upload(self.device.as_mut(), frame)?;
            }
            if let Some(anchor) = anchor
                && let Some(quad) = project_plane(&self.camera, &mesh.transform, anchor)
            {
                draw_textured_quad(data, viewport, &quad, mesh.texture());
            }
        }

        if let Some(quad) = self.debug_quad {
            let fit = CoverFit::new(camera.width, camera.height, viewport);
            self.overlay
                .draw_quad(data, viewport, &quad.map(|p| fit.to_dst(p)))?;
        }

        self.frames_rendered += 1;
        Ok(target.frame())
    }

    /// Screen-space corners of the video plane at `anchor`, or `None` when no plane is
    /// attached or a corner falls outside the clip range.
    pub fn projected_quad(&self, anchor: &PoseTransform) -> Option<[Point; 4]> {
        let mesh = self.scene.meshes().get(self.video_mesh?)?;
        project_plane(&self.camera, &mesh.transform, anchor)
    }

    /// Outline a detected marker quad (camera-frame pixels) on subsequent frames.
    pub fn set_debug_quad(&mut self, quad: Option<[Point; 4]>) {
        self.debug_quad = quad;
    }

    /// Follow a viewport size change: new aspect, new render target.
    pub fn resize(&mut self, viewport: Viewport) -> ArResult<()> {
        self.ensure_live()?;
        check_viewport(viewport, &self.caps)?;
        if viewport == self.camera.viewport() {
            return Ok(());
        }
        if let Some(old) = self.target.take() {
            old.release(self.device.as_mut());
        }
        self.target = Some(RenderTarget::create(self.device.as_mut(), viewport)?);
        self.camera.set_viewport(viewport);
        tracing::debug!(width = viewport.width, height = viewport.height, "compositor resized");
        Ok(())
    }

    /// Release every device allocation. Returns `false` when already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        let released = self.detach_video();
        if let Some(target) = self.target.take() {
            target.release(self.device.as_mut());
        }
        self.debug_quad = None;
        tracing::debug!(released, frames = self.frames_rendered, "compositor torn down");
        true
    }

    /// `true` after [`VideoCompositor::teardown`].
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// `true` while a video plane is attached.
    pub fn has_video(&self) -> bool {
        self.video_mesh.is_some()
    }

    /// Current output size.
    pub fn viewport(&self) -> Viewport {
        self.camera.viewport()
    }

    /// Render camera.
    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    /// Scene contents.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Probe results.
    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    /// Allocation ledger of the underlying device.
    pub fn ledger(&self) -> HandleLedger {
        self.device.ledger().clone()
    }

    /// Size of the last camera frame drawn, `(0, 0)` before the first render.
    pub fn last_camera_size(&self) -> (u32, u32) {
        self.last_camera_size
    }

    /// Frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    fn ensure_live(&self) -> ArResult<()> {
        if self.torn_down {
            return Err(ArError::validation("compositor has been torn down"));
        }
        Ok(())
    }
}

impl Drop for VideoCompositor {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for VideoCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoCompositor")
            .field("caps", &self.caps)
            .field("viewport", &self.camera.viewport())
            .field("has_video", &self.has_video())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

fn project_plane(
    camera: &PerspectiveCamera,
    transform: &MeshTransform,
    anchor: &PoseTransform,
) -> Option<[Point; 4]> {
    let corners = transform.world_corners(anchor);
    let mut out = [Point::ZERO; 4];
    for (o, c) in out.iter_mut().zip(corners) {
        *o = camera.project(c)?;
    }
    Some(out)
}

fn check_viewport(viewport: Viewport, caps: &DeviceCaps) -> ArResult<()> {
    if viewport.width == 0 || viewport.height == 0 {
        return Err(ArError::validation("viewport must be non-zero"));
    }
    if viewport.width > caps.max_target_side || viewport.height > caps.max_target_side {
        return Err(ArError::unsupported(format!(
            "viewport {}x{} exceeds the device limit of {}",
            viewport.width, viewport.height, caps.max_target_side
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
