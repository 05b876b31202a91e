use crate::camera::stream::{CameraDevice, CameraError, CameraFrame, CameraRequest, CameraStream};
use crate::foundation::math::luma;
use crate::scan::payload::{ScanPayload, parse_scan_payload};

/// Decodes the text of every 2D code visible in a grayscale image.
pub trait CodeDecoder: Send {
    /// Text of each decodable code, in detection order.
    fn decode(&mut self, gray: &image::GrayImage) -> Vec<String>;
}

/// QR decoder backed by `rqrr`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RqrrDecoder;

impl CodeDecoder for RqrrDecoder {
    fn decode(&mut self, gray: &image::GrayImage) -> Vec<String> {
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0]
        });
        let grids = prepared.detect_grids();
        let mut out = Vec::new();
        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => out.push(content),
                Err(e) => tracing::debug!(error = ?e, "grid decode failed"),
            }
        }
        out
    }
}

/// Outcome of one scanner tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanTick {
    /// No campaign code yet; keep scanning.
    Pending,
    /// A valid payload was decoded. The scanner has released its stream.
    Found(ScanPayload),
    /// The scanner was already stopped.
    Stopped,
}

/// Scans camera frames for campaign QR codes.
///
/// Owns its own camera stream and a reusable grayscale buffer, independent of the marker
/// pipeline.
pub struct CodeScanner {
    stream: Option<CameraStream>,
    decoder: Box<dyn CodeDecoder>,
    gray: image::GrayImage,
    frames_scanned: u64,
    codes_discarded: u64,
}

impl CodeScanner {
    /// Acquire a stream from `camera` and start scanning.
    pub fn start(
        camera: &mut dyn CameraDevice,
        req: &CameraRequest,
        decoder: Box<dyn CodeDecoder>,
    ) -> Result<Self, CameraError> {
        let stream = camera.acquire(req)?;
        let (w, h) = (stream.info().width, stream.info().height);
        tracing::debug!(width = w, height = h, "code scanner started");
        Ok(Self {
            stream: Some(stream),
            decoder,
            gray: image::GrayImage::new(w, h),
            frames_scanned: 0,
            codes_discarded: 0,
        })
    }

    /// Read one frame and look for a campaign code.
    pub fn tick(&mut self) -> Result<ScanTick, CameraError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(ScanTick::Stopped);
        };
        let Some(frame) = stream.next_frame()? else {
            return Ok(ScanTick::Pending);
        };
        Ok(match self.scan_frame(&frame) {
            Some(payload) => {
                self.stop();
                ScanTick::Found(payload)
            }
            None => ScanTick::Pending,
        })
    }

    /// Decode `frame` without touching the stream.
    pub fn scan_frame(&mut self, frame: &CameraFrame) -> Option<ScanPayload> {
        self.fill_gray(frame);
        self.frames_scanned += 1;
        for text in self.decoder.decode(&self.gray) {
            match parse_scan_payload(&text) {
                Some(payload) => {
                    tracing::info!(video = %payload.video_url, marker = %payload.marker_url, "campaign code scanned");
                    return Some(payload);
                }
                None => self.codes_discarded += 1,
            }
        }
        None
    }

    /// Release the stream. Returns how many tracks this call stopped.
    pub fn stop(&mut self) -> usize {
        match self.stream.take() {
            Some(mut stream) => stream.release(),
            None => 0,
        }
    }

    /// `true` while the scanner holds a stream.
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Frames examined so far.
    pub fn frames_scanned(&self) -> u64 {
        self.frames_scanned
    }

    /// Decoded codes that were not campaign payloads.
    pub fn codes_discarded(&self) -> u64 {
        self.codes_discarded
    }

    fn fill_gray(&mut self, frame: &CameraFrame) {
        if self.gray.width() != frame.width || self.gray.height() != frame.height {
            self.gray = image::GrayImage::new(frame.width, frame.height);
        }
        for (dst, px) in self.gray.iter_mut().zip(frame.data.chunks_exact(4)) {
            *dst = luma(px);
        }
    }
}

impl Drop for CodeScanner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CodeScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeScanner")
            .field("active", &self.is_active())
            .field("frames_scanned", &self.frames_scanned)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scan/scanner.rs"]
mod tests;
