use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use crate::foundation::core::{Point, Vec3};
use crate::foundation::homography::Homography;

/// Vertical field of view of the render camera, in degrees.
pub const RENDER_FOV_DEG: f64 = 75.0;

/// Unit quaternion `(x, y, z, w)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quat {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
    /// Scalar component.
    pub w: f64,
}

impl Quat {
    /// No rotation.
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Rotation from intrinsic XYZ Euler angles in radians, the matrix `Rx * Ry * Rz`.
    ///
    /// Applied to a point, Z turns first, then Y, then X.
    pub fn from_euler(r: Vec3) -> Self {
        let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), r.x);
        let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), r.y);
        let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), r.z);
        Self::from_na(&(rx * ry * rz))
    }

    /// Rotation angle in radians, in `[0, pi]`.
    pub fn angle(self) -> f64 {
        self.to_na().angle()
    }

    pub(crate) fn to_na(self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(self.w, self.x, self.y, self.z))
    }

    pub(crate) fn from_na(q: &UnitQuaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Marker pose in render-camera space.
///
/// Right-handed, +Y up, camera looking down -Z. The marker is a unit square in its local XY
/// plane, centered at the origin, with +Z pointing out of the printed face.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PoseTransform {
    /// Marker center in world units.
    pub position: Vec3,
    /// Marker orientation.
    pub orientation: Quat,
}

impl PoseTransform {
    /// Pose at `position` with no rotation.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// 4x4 model matrix mapping marker-local points into camera space.
    pub fn to_matrix(&self) -> nalgebra::Matrix4<f64> {
        nalgebra::Isometry3::from_parts(
            nalgebra::Translation3::from(self.position.to_na()),
            self.orientation.to_na(),
        )
        .to_homogeneous()
    }
}

/// Pinhole intrinsics in camera-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in pixels (square pixels).
    pub focal: f64,
    /// Principal point.
    pub center: Point,
}

impl CameraIntrinsics {
    /// Intrinsics matching a render camera with vertical FOV `fov_deg` that shows a
    /// `frame_w x frame_h` camera image cover-fitted into a `view_w x view_h` viewport.
    pub fn for_display(frame_w: u32, frame_h: u32, view_w: u32, view_h: u32, fov_deg: f64) -> Self {
        let (fw, fh) = (f64::from(frame_w.max(1)), f64::from(frame_h.max(1)));
        let (vw, vh) = (f64::from(view_w.max(1)), f64::from(view_h.max(1)));
        let scale = (vw / fw).max(vh / fh);
        let focal_view = (vh * 0.5) / (fov_deg.to_radians() * 0.5).tan();
        Self {
            focal: focal_view / scale,
            center: Point::new(fw * 0.5, fh * 0.5),
        }
    }

    fn k_inv(&self) -> Matrix3<f64> {
        let f = self.focal;
        Matrix3::new(
            1.0 / f,
            0.0,
            -self.center.x / f,
            0.0,
            1.0 / f,
            -self.center.y / f,
            0.0,
            0.0,
            1.0,
        )
    }
}

/// Marker corners in local units, in the same order as detected image corners
/// (top-left, top-right, bottom-right, bottom-left).
const MARKER_CORNERS: [Point; 4] = [
    Point::new(-0.5, 0.5),
    Point::new(0.5, 0.5),
    Point::new(0.5, -0.5),
    Point::new(-0.5, -0.5),
];

/// Estimate the pose of a unit marker from its four image corners.
pub fn estimate_pose(corners: &[Point; 4], k: &CameraIntrinsics) -> Option<PoseTransform> {
    let h = Homography::from_quads(&MARKER_CORNERS, corners)?;
    let m = k.k_inv() * h.0;
    let h1 = m.column(0).into_owned();
    let h2 = m.column(1).into_owned();
    let h3 = m.column(2).into_owned();

    let norm = (h1.norm() + h2.norm()) * 0.5;
    if norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / norm;
    // The marker must lie in front of the camera (+Z in image convention).
    if h3.z * lambda < 0.0 {
        lambda = -lambda;
    }
    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let t = h3 * lambda;

    let approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut r_cv = u * v_t;
    if r_cv.determinant() < 0.0 {
        r_cv = -r_cv;
    }

    // Image convention is x right, y down, z forward; render space flips y and z.
    let flip = Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0));
    let r_gl = flip * r_cv;
    let t_gl = flip * t;
    if !t_gl.iter().all(|v| v.is_finite()) {
        return None;
    }

    let rot = Rotation3::from_matrix_unchecked(r_gl);
    Some(PoseTransform {
        position: Vec3::from_na(&t_gl),
        orientation: Quat::from_na(&UnitQuaternion::from_rotation_matrix(&rot)),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/marker/pose.rs"]
mod tests;
