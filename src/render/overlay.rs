use crate::foundation::core::{Point, Viewport};
use crate::foundation::error::ArResult;
use crate::foundation::math::over_premul;
use crate::render::raster::CpuSurface;

/// Outline color of the detected marker.
const OUTLINE_RGBA: [u8; 4] = [0, 255, 128, 255];
const OUTLINE_WIDTH_PX: f64 = 3.0;

/// Draws a debug outline around the detected marker quad.
///
/// The outline is filled into a transparent `vello_cpu` pixmap and composited over the
/// frame, so the compositor's own raster stays untouched.
pub(crate) struct DebugOverlay {
    surface: Option<CpuSurface>,
}

impl std::fmt::Debug for DebugOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugOverlay").finish_non_exhaustive()
    }
}

impl DebugOverlay {
    pub(crate) fn new() -> Self {
        Self { surface: None }
    }

    pub(crate) fn draw_quad(
        &mut self,
        dst: &mut [u8],
        viewport: Viewport,
        quad: &[Point; 4],
    ) -> ArResult<()> {
        let surface = CpuSurface::ensure(&mut self.surface, viewport)?;
        let [r, g, b, a] = OUTLINE_RGBA;
        surface
            .ctx
            .set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        for i in 0..4 {
            if let Some(edge) = edge_path(quad[i], quad[(i + 1) % 4], OUTLINE_WIDTH_PX) {
                surface.ctx.fill_path(&edge);
            }
        }
        surface.finish();

        for (d, s) in dst
            .chunks_exact_mut(4)
            .zip(surface.pixmap.data_as_u8_slice().chunks_exact(4))
        {
            if s[3] == 0 {
                continue;
            }
            let out = over_premul([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&out);
        }
        Ok(())
    }
}

/// Rectangle of `width` around the segment `a..b`, as a closed path.
fn edge_path(a: Point, b: Point, width: f64) -> Option<vello_cpu::kurbo::BezPath> {
    let d = b - a;
    let len = d.hypot();
    if len < 1e-6 {
        return None;
    }
    let n = vello_cpu::kurbo::Vec2::new(-d.y / len, d.x / len) * (width * 0.5);
    let t = vello_cpu::kurbo::Vec2::new(d.x / len, d.y / len) * (width * 0.5);
    let a = vello_cpu::kurbo::Point::new(a.x, a.y) - t;
    let b = vello_cpu::kurbo::Point::new(b.x, b.y) + t;
    let mut path = vello_cpu::kurbo::BezPath::new();
    path.move_to(a + n);
    path.line_to(b + n);
    path.line_to(b - n);
    path.line_to(a - n);
    path.close_path();
    Some(path)
}
