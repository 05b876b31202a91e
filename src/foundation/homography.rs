use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::foundation::core::Point;

/// Planar projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Homography(pub(crate) Matrix3<f64>);

impl Homography {
    /// Solve the 4-point DLT mapping each `src[i]` onto `dst[i]`.
    ///
    /// Returns `None` for degenerate configurations (three collinear points, repeated corners).
    pub(crate) fn from_quads(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        if quad_area(src) < 1e-9 || quad_area(dst) < 1e-9 {
            return None;
        }
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let (x, y) = (src[i].x, src[i].y);
            let (u, v) = (dst[i].x, dst[i].y);
            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }
        let h = a.lu().solve(&b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let m = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        if m.determinant().abs() < 1e-12 {
            return None;
        }
        Some(Self(m))
    }

    /// Map the unit square `(0,0) (1,0) (1,1) (0,1)` onto `quad`.
    pub(crate) fn unit_square_to(quad: &[Point; 4]) -> Option<Self> {
        Self::from_quads(
            &[
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ],
            quad,
        )
    }

    /// Apply to a point; `None` when it maps to infinity.
    pub(crate) fn apply(&self, p: Point) -> Option<Point> {
        let v = self.0 * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < 1e-12 {
            return None;
        }
        Some(Point::new(v.x / v.z, v.y / v.z))
    }

    pub(crate) fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }
}

/// Absolute shoelace area of a quadrilateral.
pub(crate) fn quad_area(q: &[Point; 4]) -> f64 {
    let mut acc = 0.0;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        acc += a.x * b.y - b.x * a.y;
    }
    (acc * 0.5).abs()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/homography.rs"]
mod tests;
