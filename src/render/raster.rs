//! CPU rasterization of the camera background and the projected video plane.
//!
//! The background is an image fill through `vello_cpu`. The video plane maps perspective-correct
//! and is sampled here.

use std::sync::Arc;

use rayon::prelude::*;

use crate::camera::stream::CameraFrame;
use crate::foundation::core::{Point, Viewport};
use crate::foundation::error::{ArError, ArResult};
use crate::foundation::homography::Homography;
use crate::foundation::math::over_premul;
use crate::render::resources::TextureData;

/// Scale and offset that cover-fit a `src` image into `dst`, cropping the overflow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverFit {
    /// Source-to-destination scale.
    pub scale: f64,
    /// Destination position of the source origin.
    pub offset: Point,
}

impl CoverFit {
    /// Fit for a `src_w x src_h` image shown in `dst`.
    pub fn new(src_w: u32, src_h: u32, dst: Viewport) -> Self {
        let (sw, sh) = (f64::from(src_w.max(1)), f64::from(src_h.max(1)));
        let (dw, dh) = (f64::from(dst.width), f64::from(dst.height));
        let scale = (dw / sw).max(dh / sh);
        Self {
            scale,
            offset: Point::new((dw - sw * scale) * 0.5, (dh - sh * scale) * 0.5),
        }
    }

    /// Map a source pixel coordinate to the destination.
    pub fn to_dst(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.offset.x,
            p.y * self.scale + self.offset.y,
        )
    }

    /// The same mapping as a `vello_cpu` affine.
    pub(crate) fn to_affine(&self) -> vello_cpu::kurbo::Affine {
        vello_cpu::kurbo::Affine::new([
            self.scale,
            0.0,
            0.0,
            self.scale,
            self.offset.x,
            self.offset.y,
        ])
    }
}

/// A `vello_cpu` context and pixmap kept while the viewport size holds.
pub(crate) struct CpuSurface {
    width: u16,
    height: u16,
    pub(crate) ctx: vello_cpu::RenderContext,
    pub(crate) pixmap: vello_cpu::Pixmap,
}

impl CpuSurface {
    /// Surface for `viewport`, reusing the one in `slot` when the size matches. The context is
    /// reset and the pixmap cleared to transparent.
    pub(crate) fn ensure(slot: &mut Option<Self>, viewport: Viewport) -> ArResult<&mut Self> {
        let width = u16::try_from(viewport.width)
            .map_err(|_| ArError::validation("viewport width exceeds u16"))?;
        let height = u16::try_from(viewport.height)
            .map_err(|_| ArError::validation("viewport height exceeds u16"))?;
        if !slot
            .as_ref()
            .is_some_and(|s| s.width == width && s.height == height)
        {
            *slot = None;
        }
        let surface = slot.get_or_insert_with(|| Self {
            width,
            height,
            ctx: vello_cpu::RenderContext::new(width, height),
            pixmap: vello_cpu::Pixmap::new(width, height),
        });
        surface.ctx.reset();
        surface.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        surface.ctx.reset_paint_transform();
        surface.pixmap.data_as_u8_slice_mut().fill(0);
        Ok(surface)
    }

    /// Flush pending draws into the pixmap.
    pub(crate) fn finish(&mut self) {
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
    }
}

impl std::fmt::Debug for CpuSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Draws the camera frame behind everything else.
///
/// The frame becomes an opaque image paint whose paint transform is the [`CoverFit`], and a
/// viewport-sized rectangle is filled with it.
#[derive(Debug, Default)]
pub(crate) struct BackgroundPainter {
    surface: Option<CpuSurface>,
}

impl BackgroundPainter {
    /// Overwrite `dst` with `frame`, cover-fitted and forced opaque. A frame without pixels
    /// clears `dst` to transparent.
    pub(crate) fn draw(
        &mut self,
        dst: &mut [u8],
        viewport: Viewport,
        frame: &CameraFrame,
    ) -> ArResult<()> {
        let Some(paint) = camera_paint(frame)? else {
            dst.fill(0);
            return Ok(());
        };
        let fit = CoverFit::new(frame.width, frame.height, viewport);
        let surface = CpuSurface::ensure(&mut self.surface, viewport)?;
        surface.ctx.set_paint_transform(fit.to_affine());
        surface.ctx.set_paint(paint);
        surface.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(viewport.width),
            f64::from(viewport.height),
        ));
        surface.finish();

        let src = surface.pixmap.data_as_u8_slice();
        if src.len() != dst.len() {
            return Err(ArError::validation(format!(
                "background is {} bytes, target is {}",
                src.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Camera pixels as a nearest-sampled image paint, alpha forced to 255.
fn camera_paint(frame: &CameraFrame) -> ArResult<Option<vello_cpu::Image>> {
    let (fw, fh) = (frame.width as usize, frame.height as usize);
    if fw == 0 || fh == 0 || frame.data.len() != fw * fh * 4 {
        return Ok(None);
    }
    let width = u16::try_from(frame.width)
        .map_err(|_| ArError::validation("camera frame width exceeds u16"))?;
    let height = u16::try_from(frame.height)
        .map_err(|_| ArError::validation("camera frame height exceeds u16"))?;
    let pixels = frame
        .data
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], 255]))
        .collect();
    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, width, height, false);
    Ok(Some(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default()
            .with_quality(vello_cpu::peniko::ImageQuality::Low),
    }))
}

/// Composite `tex` onto `dst` through the screen quad `corners` (top-left, top-right,
/// bottom-right, bottom-left), perspective-correct. Returns the number of pixels touched.
pub(crate) fn draw_textured_quad(
    dst: &mut [u8],
    viewport: Viewport,
    corners: &[Point; 4],
    tex: &TextureData,
) -> usize {
    if tex.is_empty() {
        return 0;
    }
    let Some(screen_to_uv) = Homography::unit_square_to(corners).and_then(|h| h.inverse()) else {
        return 0;
    };
    let (vw, vh) = (f64::from(viewport.width), f64::from(viewport.height));
    let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    if max_x < 0.0 || max_y < 0.0 || min_x >= vw || min_y >= vh {
        return 0;
    }
    let x0 = min_x.floor().max(0.0) as usize;
    let x1 = (max_x.ceil().min(vw) as usize).max(x0);
    let y0 = min_y.floor().max(0.0) as usize;
    let y1 = (max_y.ceil().min(vh) as usize).max(y0);
    let row_len = viewport.width as usize * 4;

    dst.par_chunks_mut(row_len)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .map(|(y, row)| {
            let mut touched = 0;
            for x in x0..x1 {
                let Some(uv) = screen_to_uv.apply(Point::new(x as f64 + 0.5, y as f64 + 0.5)) else {
                    continue;
                };
                if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
                    continue;
                }
                let src = tex.sample_bilinear(uv.x, uv.y);
                let i = x * 4;
                let out = over_premul([row[i], row[i + 1], row[i + 2], row[i + 3]], src);
                row[i..i + 4].copy_from_slice(&out);
                touched += 1;
            }
            touched
        })
        .sum()
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
