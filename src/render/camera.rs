use nalgebra::{Perspective3, Point3};

use crate::foundation::core::{Point, Viewport};
use crate::marker::pose::RENDER_FOV_DEG;

/// Near clip distance.
pub const NEAR_PLANE: f64 = 0.1;
/// Far clip distance.
pub const FAR_PLANE: f64 = 1000.0;

/// Perspective camera at the origin looking down -Z, +Y up.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    fov_deg: f64,
    near: f64,
    far: f64,
    viewport: Viewport,
    projection: Perspective3<f64>,
}

impl PerspectiveCamera {
    /// Camera with a `fov_deg` vertical field of view sized for `viewport`.
    pub fn new(fov_deg: f64, viewport: Viewport) -> Self {
        let projection = Perspective3::new(
            viewport.aspect(),
            fov_deg.to_radians(),
            NEAR_PLANE,
            FAR_PLANE,
        );
        Self {
            fov_deg,
            near: NEAR_PLANE,
            far: FAR_PLANE,
            viewport,
            projection,
        }
    }

    /// Camera matching the pose estimator's field of view.
    pub fn for_viewport(viewport: Viewport) -> Self {
        Self::new(RENDER_FOV_DEG, viewport)
    }

    /// Vertical field of view in degrees.
    pub fn fov_deg(&self) -> f64 {
        self.fov_deg
    }

    /// Near and far clip distances.
    pub fn clip_range(&self) -> (f64, f64) {
        (self.near, self.far)
    }

    /// Output size.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Update the aspect ratio after a resize.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.projection.set_aspect(viewport.aspect());
    }

    /// Project a camera-space point to viewport pixels (origin top-left, y down).
    ///
    /// `None` when the point lies outside the near/far range.
    pub fn project(&self, p: Point3<f64>) -> Option<Point> {
        let depth = -p.z;
        if !(depth >= self.near && depth <= self.far) {
            return None;
        }
        let ndc = self.projection.project_point(&p);
        let w = f64::from(self.viewport.width);
        let h = f64::from(self.viewport.height);
        Some(Point::new(
            (ndc.x + 1.0) * 0.5 * w,
            (1.0 - ndc.y) * 0.5 * h,
        ))
    }
}
