use image::{GrayImage, RgbaImage, imageops::FilterType};

use crate::foundation::error::{ArError, ArResult};
use crate::foundation::fetch::fetch_bytes;

/// Side of the square luminance template, in cells.
pub const TEMPLATE_SIZE: usize = 16;

/// Fraction of the printed marker's width taken by the inner pattern (the rest is black border).
pub const DEFAULT_PATTERN_RATIO: f64 = 0.5;

const PATTERN_SIDE: u32 = 64;

/// Mean-centered, unit-norm template vector.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Template(pub(crate) Vec<f64>);

impl Template {
    fn from_cells(cells: &[f64]) -> Option<Self> {
        let n = cells.len() as f64;
        let mean = cells.iter().sum::<f64>() / n;
        let centered: Vec<f64> = cells.iter().map(|v| v - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm < 1e-6 {
            return None;
        }
        Some(Self(centered.into_iter().map(|v| v / norm).collect()))
    }

    /// Normalized cross-correlation against raw cell samples, in `[-1, 1]`.
    pub(crate) fn ncc(&self, cells: &[f64]) -> f64 {
        match Self::from_cells(cells) {
            Some(other) => self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum(),
            None => 0.0,
        }
    }
}

/// Rotate a square grid a quarter turn clockwise.
pub(crate) fn rotate_cw(src: &[f64], dim: usize) -> Vec<f64> {
    let mut dst = vec![0.0; dim * dim];
    for y in 0..dim {
        for x in 0..dim {
            dst[y * dim + x] = src[(dim - 1 - x) * dim + y];
        }
    }
    dst
}

/// The trackable pattern of a campaign.
///
/// Built once from the marker image; `rotations[k]` is the template turned `k` quarter turns
/// clockwise.
#[derive(Clone, Debug)]
pub struct MarkerDescriptor {
    source: String,
    pattern: GrayImage,
    pattern_ratio: f64,
    pub(crate) rotations: [Template; 4],
}

impl MarkerDescriptor {
    /// Derive the pattern data from a decoded marker image.
    pub fn from_image(source: impl Into<String>, img: &image::DynamicImage) -> ArResult<Self> {
        let source = source.into();
        if img.width() == 0 || img.height() == 0 {
            return Err(ArError::init_failed(format!("marker image '{source}' is empty")));
        }
        let pattern = image::imageops::resize(
            &flatten_on_white(&img.to_rgba8()),
            PATTERN_SIDE,
            PATTERN_SIDE,
            FilterType::Triangle,
        );
        let grid = image::imageops::resize(
            &pattern,
            TEMPLATE_SIZE as u32,
            TEMPLATE_SIZE as u32,
            FilterType::Triangle,
        );
        let cells: Vec<f64> = grid.as_raw().iter().map(|&v| f64::from(v)).collect();

        let r0 = cells;
        let r1 = rotate_cw(&r0, TEMPLATE_SIZE);
        let r2 = rotate_cw(&r1, TEMPLATE_SIZE);
        let r3 = rotate_cw(&r2, TEMPLATE_SIZE);
        let no_contrast =
            || ArError::init_failed(format!("marker image '{source}' has no usable contrast"));
        let rotations = [
            Template::from_cells(&r0).ok_or_else(no_contrast)?,
            Template::from_cells(&r1).ok_or_else(no_contrast)?,
            Template::from_cells(&r2).ok_or_else(no_contrast)?,
            Template::from_cells(&r3).ok_or_else(no_contrast)?,
        ];

        Ok(Self {
            source,
            pattern,
            pattern_ratio: DEFAULT_PATTERN_RATIO,
            rotations,
        })
    }

    /// Decode an encoded image (PNG, JPEG, ...) into a descriptor.
    pub fn from_bytes(source: impl Into<String>, bytes: &[u8]) -> ArResult<Self> {
        let source = source.into();
        let img = image::load_from_memory(bytes)
            .map_err(|e| ArError::init_failed(format!("decode marker image '{source}': {e}")))?;
        Self::from_image(source, &img)
    }

    /// Override the inner-pattern ratio (clamped to `[0.1, 0.9]`).
    pub fn with_pattern_ratio(mut self, ratio: f64) -> Self {
        self.pattern_ratio = ratio.clamp(0.1, 0.9);
        self
    }

    /// Reference the descriptor was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Fraction of the marker width taken by the inner pattern.
    pub fn pattern_ratio(&self) -> f64 {
        self.pattern_ratio
    }

    /// Printable marker: black border around the pattern, `size` pixels square.
    pub fn printable(&self, size: u32) -> RgbaImage {
        let size = size.max(8);
        let inner = ((f64::from(size) * self.pattern_ratio).round() as u32).max(1);
        let offset = (size - inner) / 2;
        let scaled = image::imageops::resize(&self.pattern, inner, inner, FilterType::Triangle);

        let mut out = RgbaImage::from_pixel(size, size, image::Rgba([0, 0, 0, 255]));
        for (x, y, px) in scaled.enumerate_pixels() {
            let v = px.0[0];
            out.put_pixel(offset + x, offset + y, image::Rgba([v, v, v, 255]));
        }
        out
    }
}

fn flatten_on_white(img: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let l = f64::from(crate::foundation::math::luma(&[r, g, b, 255]));
        let a = f64::from(a) / 255.0;
        image::Luma([(l * a + 255.0 * (1.0 - a)).round() as u8])
    })
}

/// Loads marker descriptors from campaign references.
pub trait MarkerLoader {
    /// Fetch and parse the marker at `reference`. Failures are `AR_INIT_FAILED`.
    fn load(&self, reference: &str) -> ArResult<MarkerDescriptor>;
}

/// Loader serving pre-built descriptors by reference, for offline sessions and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticMarkerLoader {
    entries: std::collections::HashMap<String, MarkerDescriptor>,
}

impl StaticMarkerLoader {
    /// Empty loader; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `desc` under `reference`.
    pub fn with(mut self, reference: impl Into<String>, desc: MarkerDescriptor) -> Self {
        self.entries.insert(reference.into(), desc);
        self
    }
}

impl MarkerLoader for StaticMarkerLoader {
    fn load(&self, reference: &str) -> ArResult<MarkerDescriptor> {
        self.entries
            .get(reference)
            .cloned()
            .ok_or_else(|| ArError::init_failed(format!("unknown marker '{reference}'")))
    }
}

/// Fetches marker images from paths or `http(s)` URLs and decodes them with `image`.
#[derive(Clone, Debug)]
pub struct DefaultMarkerLoader {
    pattern_ratio: f64,
}

impl DefaultMarkerLoader {
    /// Loader producing descriptors with the given inner-pattern ratio.
    pub fn new(pattern_ratio: f64) -> Self {
        Self { pattern_ratio }
    }
}

impl Default for DefaultMarkerLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_RATIO)
    }
}

impl MarkerLoader for DefaultMarkerLoader {
    #[tracing::instrument(level = "debug", skip(self))]
    fn load(&self, reference: &str) -> ArResult<MarkerDescriptor> {
        let bytes = fetch_bytes(reference)
            .map_err(|e| ArError::init_failed(format!("load marker '{reference}': {e:#}")))?;
        let desc = MarkerDescriptor::from_bytes(reference, &bytes)?;
        tracing::info!(marker = reference, "marker descriptor loaded");
        Ok(desc.with_pattern_ratio(self.pattern_ratio))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/marker/descriptor.rs"]
mod tests;
