use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::foundation::core::Fps;
use crate::foundation::error::{ArError, ArResult};
use crate::foundation::fetch::ResourceLocation;
use crate::media::decoder::{DecodeRead, FrameDecoder, MediaBackend, OpenOptions, VideoFrame, VideoInfo};

/// Counters shared by a [`MemoryMediaBackend`] and its decoders.
#[derive(Debug, Default)]
pub struct MediaCounters {
    opened: AtomicUsize,
    live: AtomicUsize,
    frames: AtomicUsize,
}

impl MediaCounters {
    /// Decoders opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Decoders not yet stopped.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Frames handed out across all decoders.
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

/// Backend producing synthetic frames, for offline sessions and tests.
///
/// Frame `i` is a solid color taken from the palette in order.
pub struct MemoryMediaBackend {
    info: VideoInfo,
    palette: Vec<[u8; 4]>,
    fail_open: Option<String>,
    fail_after: Option<usize>,
    native_hls: bool,
    counters: Arc<MediaCounters>,
    opened_inputs: Vec<ResourceLocation>,
}

impl MemoryMediaBackend {
    /// Backend producing `width x height` frames cycling through `palette`.
    pub fn new(width: u32, height: u32, palette: Vec<[u8; 4]>) -> Self {
        Self {
            info: VideoInfo {
                width: width.max(1),
                height: height.max(1),
                fps: Fps::default(),
                duration_secs: 0.0,
            },
            palette: if palette.is_empty() {
                vec![[0, 0, 0, 255]]
            } else {
                palette
            },
            fail_open: None,
            fail_after: None,
            native_hls: false,
            counters: Arc::new(MediaCounters::default()),
            opened_inputs: Vec::new(),
        }
    }

    /// Every `open` fails with `msg`.
    pub fn failing_open(mut self, msg: impl Into<String>) -> Self {
        self.fail_open = Some(msg.into());
        self
    }

    /// Decoders fail after handing out `frames` frames.
    pub fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Report native playlist support.
    pub fn with_native_hls(mut self, native: bool) -> Self {
        self.native_hls = native;
        self
    }

    /// Shared counters for leak assertions.
    pub fn counters(&self) -> Arc<MediaCounters> {
        self.counters.clone()
    }

    /// Inputs passed to `open`, in order.
    pub fn opened_inputs(&self) -> &[ResourceLocation] {
        &self.opened_inputs
    }
}

impl MediaBackend for MemoryMediaBackend {
    fn open(&mut self, input: &ResourceLocation, _opts: &OpenOptions) -> ArResult<Box<dyn FrameDecoder>> {
        self.opened_inputs.push(input.clone());
        if let Some(msg) = &self.fail_open {
            return Err(ArError::media_load(msg.clone()));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryDecoder {
            info: self.info.clone(),
            palette: self.palette.clone(),
            cursor: 0,
            handed_out: 0,
            fail_after: self.fail_after,
            counters: self.counters.clone(),
            stopped: false,
        }))
    }

    fn supports_native_hls(&self) -> bool {
        self.native_hls
    }
}

struct MemoryDecoder {
    info: VideoInfo,
    palette: Vec<[u8; 4]>,
    cursor: usize,
    handed_out: usize,
    fail_after: Option<usize>,
    counters: Arc<MediaCounters>,
    stopped: bool,
}

impl FrameDecoder for MemoryDecoder {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read(&mut self) -> DecodeRead {
        if self.stopped {
            return DecodeRead::Failed("decoder stopped".to_string());
        }
        if self.fail_after.is_some_and(|n| self.handed_out >= n) {
            return DecodeRead::Failed("synthetic decode error".to_string());
        }
        let rgba = self.palette[self.cursor % self.palette.len()];
        self.cursor += 1;
        self.handed_out += 1;
        self.counters.frames.fetch_add(1, Ordering::SeqCst);

        let px = (self.info.width as usize) * (self.info.height as usize);
        let mut data = Vec::with_capacity(px * 4);
        for _ in 0..px {
            data.extend_from_slice(&rgba);
        }
        DecodeRead::Frame(VideoFrame {
            width: self.info.width,
            height: self.info.height,
            data,
        })
    }

    fn seek(&mut self, secs: f64) -> ArResult<()> {
        self.cursor = (secs.max(0.0) * self.info.fps.as_f64()).floor() as usize;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}
