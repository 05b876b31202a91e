use std::cmp::Reverse;

use image::GrayImage;

use crate::camera::CameraFrame;
use crate::foundation::core::{Point, Viewport};
use crate::foundation::homography::Homography;
use crate::marker::descriptor::{MarkerDescriptor, TEMPLATE_SIZE};
use crate::marker::pose::{CameraIntrinsics, PoseTransform, RENDER_FOV_DEG, estimate_pose};
use crate::marker::quad::{
    convex_hull, dark_components, fit_quad, hull_fill, is_convex, min_edge, otsu, sample_bilinear,
};

/// Tuning knobs for [`PatternTracker`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorOptions {
    /// Minimum normalized cross-correlation to accept a match.
    pub min_confidence: f64,
    /// Shortest accepted quad edge, in camera pixels.
    pub min_edge_px: f64,
    /// Smallest dark region considered, as a fraction of the frame area.
    pub min_area_fraction: f64,
    /// Minimum ratio of quad area to convex hull area.
    pub min_hull_fill: f64,
    /// Share of border-ring samples that must be dark.
    pub min_border_dark: f64,
    /// Largest regions examined per frame.
    pub max_candidates: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            min_edge_px: 12.0,
            min_area_fraction: 0.001,
            min_hull_fill: 0.85,
            min_border_dark: 0.75,
            max_candidates: 16,
        }
    }
}

/// A located marker.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MarkerHit {
    /// Pose in render-camera space.
    pub pose: PoseTransform,
    /// Image corners, marker top-left first, clockwise on screen.
    pub corners: [Point; 4],
    /// Match score in `[min_confidence, 1]`.
    pub confidence: f64,
}

/// Per-frame detector output.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Detection {
    /// No marker in this frame.
    NotFound,
    /// Marker located.
    Found(MarkerHit),
}

impl Detection {
    /// Synthetic hit with only a pose, for driving the pipeline without a camera.
    pub fn found(pose: PoseTransform) -> Self {
        Self::Found(MarkerHit {
            pose,
            corners: [Point::ZERO; 4],
            confidence: 1.0,
        })
    }

    /// `true` for [`Detection::Found`].
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Pose of a found marker.
    pub fn pose(&self) -> Option<&PoseTransform> {
        match self {
            Self::Found(hit) => Some(&hit.pose),
            Self::NotFound => None,
        }
    }
}

/// Locates the campaign marker in camera frames.
pub trait MarkerTracker {
    /// Run detection on one frame. Nothing is carried over between calls.
    fn detect(&mut self, frame: &CameraFrame) -> Detection;

    /// Output viewport the camera image is shown in; poses are expressed for it.
    fn set_viewport(&mut self, _viewport: Viewport) {}
}

/// Square-pattern tracker in the style of printed AR pattern markers.
#[derive(Clone, Debug)]
pub struct PatternTracker {
    desc: MarkerDescriptor,
    opts: DetectorOptions,
    viewport: Option<Viewport>,
}

impl PatternTracker {
    /// Tracker for `desc`.
    pub fn new(desc: MarkerDescriptor, opts: DetectorOptions) -> Self {
        Self {
            desc,
            opts,
            viewport: None,
        }
    }

    /// Marker being tracked.
    pub fn descriptor(&self) -> &MarkerDescriptor {
        &self.desc
    }

    fn sample_pattern(&self, gray: &GrayImage, h: &Homography) -> Option<Vec<f64>> {
        let r = self.desc.pattern_ratio();
        let lo = (1.0 - r) * 0.5;
        let n = TEMPLATE_SIZE as f64;
        let mut cells = Vec::with_capacity(TEMPLATE_SIZE * TEMPLATE_SIZE);
        for cy in 0..TEMPLATE_SIZE {
            for cx in 0..TEMPLATE_SIZE {
                let mut acc = 0.0;
                for (sx, sy) in [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)] {
                    let u = lo + r * (cx as f64 + sx) / n;
                    let v = lo + r * (cy as f64 + sy) / n;
                    acc += sample_bilinear(gray, h.apply(Point::new(u, v))?);
                }
                cells.push(acc * 0.25);
            }
        }
        Some(cells)
    }

    fn border_dark_share(&self, gray: &GrayImage, h: &Homography, threshold: u8) -> Option<f64> {
        let b = (1.0 - self.desc.pattern_ratio()) * 0.25;
        let steps = 8;
        let mut dark = 0;
        for i in 0..steps {
            let t = (f64::from(i) + 0.5) / f64::from(steps);
            for uv in [(t, b), (1.0 - b, t), (t, 1.0 - b), (b, t)] {
                let p = h.apply(Point::new(uv.0, uv.1))?;
                if sample_bilinear(gray, p) <= f64::from(threshold) {
                    dark += 1;
                }
            }
        }
        Some(f64::from(dark) / f64::from(steps * 4))
    }

    fn best_candidate(&self, gray: &GrayImage) -> Option<([Point; 4], f64)> {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let threshold = otsu(gray.as_raw());
        let min_pixels = ((w * h) as f64 * self.opts.min_area_fraction).max(16.0) as usize;

        let mut comps = dark_components(gray, threshold, min_pixels);
        comps.sort_by_key(|c| Reverse(c.pixels));
        comps.truncate(self.opts.max_candidates);

        let mut best: Option<([Point; 4], f64)> = None;
        for comp in &comps {
            let hull = convex_hull(&comp.outline);
            let Some(quad) = fit_quad(&hull) else {
                continue;
            };
            if !is_convex(&quad)
                || min_edge(&quad) < self.opts.min_edge_px
                || hull_fill(&quad, &hull) < self.opts.min_hull_fill
            {
                continue;
            }
            let Some(homography) = Homography::unit_square_to(&quad) else {
                continue;
            };
            match self.border_dark_share(gray, &homography, threshold) {
                Some(share) if share >= self.opts.min_border_dark => {}
                _ => continue,
            }
            let Some(cells) = self.sample_pattern(gray, &homography) else {
                continue;
            };

            let (turns, score) = self
                .desc
                .rotations
                .iter()
                .map(|t| t.ncc(&cells))
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |acc, (k, s)| {
                    if s > acc.1 { (k, s) } else { acc }
                });
            tracing::trace!(score, turns, "marker candidate scored");
            if score < self.opts.min_confidence {
                continue;
            }
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                let corners = std::array::from_fn(|i| quad[(i + turns) % 4]);
                best = Some((corners, score));
            }
        }
        best
    }
}

impl MarkerTracker for PatternTracker {
    fn detect(&mut self, frame: &CameraFrame) -> Detection {
        if frame.width == 0 || frame.height == 0 {
            return Detection::NotFound;
        }
        let gray = frame.to_gray();
        let Some((corners, confidence)) = self.best_candidate(&gray) else {
            return Detection::NotFound;
        };
        let view = self
            .viewport
            .unwrap_or(Viewport {
                width: frame.width,
                height: frame.height,
            });
        let k = CameraIntrinsics::for_display(
            frame.width,
            frame.height,
            view.width,
            view.height,
            RENDER_FOV_DEG,
        );
        match estimate_pose(&corners, &k) {
            Some(pose) => Detection::Found(MarkerHit {
                pose,
                corners,
                confidence,
            }),
            None => Detection::NotFound,
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/marker/detector.rs"]
mod tests;
