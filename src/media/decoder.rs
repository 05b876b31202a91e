use std::time::Duration;

use crate::foundation::core::Fps;
use crate::foundation::error::{ArError, ArResult};
use crate::foundation::fetch::ResourceLocation;

/// Stream properties reported by a decoder.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal frame rate.
    pub fps: Fps,
    /// Duration in seconds; `0.0` when unknown or live.
    pub duration_secs: f64,
}

/// One decoded frame, straight-alpha RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes.
    pub data: Vec<u8>,
}

/// Result of asking a decoder for its next frame.
#[derive(Debug)]
pub enum DecodeRead {
    /// Next frame in presentation order.
    Frame(VideoFrame),
    /// Nothing buffered yet.
    Pending,
    /// End of a non-looping stream.
    Ended,
    /// Decoding failed; the decoder is unusable.
    Failed(String),
}

/// Decoder options chosen by the video source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OpenOptions {
    /// Restart from the beginning at end of stream.
    pub looping: bool,
    /// For live playlists, start this many segments from the live edge.
    pub live_start_index: Option<i32>,
}

/// Sequential frame producer for one opened video.
pub trait FrameDecoder: Send {
    /// Stream properties.
    fn info(&self) -> &VideoInfo;
    /// Pull the next frame without blocking for long.
    fn read(&mut self) -> DecodeRead;
    /// Restart decoding at `secs`.
    fn seek(&mut self, secs: f64) -> ArResult<()>;
    /// Stop decoding and free buffers. Idempotent.
    fn stop(&mut self);
}

/// Opens decoders, standing in for the platform's media element.
pub trait MediaBackend {
    /// Open `input`. Failures are `MEDIA_LOAD_ERROR`.
    fn open(&mut self, input: &ResourceLocation, opts: &OpenOptions) -> ArResult<Box<dyn FrameDecoder>>;

    /// `true` when the backend can play `.m3u8` URLs by itself.
    fn supports_native_hls(&self) -> bool {
        false
    }
}

/// Decoder backend driving the system `ffmpeg`/`ffprobe` binaries.
#[derive(Clone, Debug)]
pub struct FfmpegMediaBackend {
    read_timeout: Duration,
    startup_timeout: Duration,
}

impl Default for FfmpegMediaBackend {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(20),
            startup_timeout: Duration::from_secs(15),
        }
    }
}

impl FfmpegMediaBackend {
    /// Backend with default timeouts.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "media-ffmpeg")]
impl MediaBackend for FfmpegMediaBackend {
    fn open(&mut self, input: &ResourceLocation, opts: &OpenOptions) -> ArResult<Box<dyn FrameDecoder>> {
        let info = probe_video(input)?;
        let mut decoder = FfmpegDecoder {
            input: input.clone(),
            opts: opts.clone(),
            info,
            pipe: None,
            read_timeout: self.read_timeout,
        };
        decoder.spawn_at(0.0)?;
        // Wait for the first frame so open errors surface here instead of mid-session.
        let first = decoder.read_blocking(self.startup_timeout);
        match first {
            DecodeRead::Frame(frame) => Ok(Box::new(PrimedDecoder {
                inner: decoder,
                primed: Some(frame),
            })),
            DecodeRead::Pending => Err(ArError::media_load(format!(
                "'{}' produced no frame within {:?}",
                input.as_ffmpeg_input(),
                self.startup_timeout
            ))),
            DecodeRead::Ended => Err(ArError::media_load(format!(
                "'{}' contains no video frames",
                input.as_ffmpeg_input()
            ))),
            DecodeRead::Failed(msg) => Err(ArError::media_load(msg)),
        }
    }

    fn supports_native_hls(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "media-ffmpeg"))]
impl MediaBackend for FfmpegMediaBackend {
    fn open(&mut self, _input: &ResourceLocation, _opts: &OpenOptions) -> ArResult<Box<dyn FrameDecoder>> {
        Err(ArError::media_load(
            "video playback requires the 'media-ffmpeg' feature",
        ))
    }
}

/// Probe a video with `ffprobe`.
#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(input: &ResourceLocation) -> ArResult<VideoInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let target = input.as_ffmpeg_input();
    let out = std::process::Command::new(crate::foundation::tools::ffprobe_bin())
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(&target)
        .output()
        .map_err(|e| ArError::media_load(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ArError::media_load(format!(
            "ffprobe failed for '{target}': {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ArError::media_load(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ArError::media_load(format!("no video stream in '{target}'")))?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ArError::media_load("missing video size from ffprobe")),
    };
    let fps = parse_ff_ratio(video.r_frame_rate.as_deref().unwrap_or("30/1"))
        .and_then(|(n, d)| Fps::new(n, d).ok())
        .unwrap_or_default();
    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        duration_secs,
    })
}

/// Probe a video with `ffprobe`.
#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_input: &ResourceLocation) -> ArResult<VideoInfo> {
    Err(ArError::media_load(
        "video playback requires the 'media-ffmpeg' feature",
    ))
}

pub(crate) fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once('/')?;
    let a = a.trim().parse::<u32>().ok()?;
    let b = b.trim().parse::<u32>().ok()?;
    if a == 0 || b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(feature = "media-ffmpeg")]
struct FfmpegDecoder {
    input: ResourceLocation,
    opts: OpenOptions,
    info: VideoInfo,
    pipe: Option<crate::foundation::pipe::RawVideoPipe>,
    read_timeout: Duration,
}

#[cfg(feature = "media-ffmpeg")]
impl FfmpegDecoder {
    fn spawn_at(&mut self, start_secs: f64) -> ArResult<()> {
        use crate::foundation::pipe::RawVideoPipe;

        if let Some(mut old) = self.pipe.take() {
            old.stop();
        }
        let mut cmd = std::process::Command::new(crate::foundation::tools::ffmpeg_bin());
        cmd.args(["-hide_banner", "-loglevel", "error"]);
        if self.opts.looping {
            cmd.args(["-stream_loop", "-1"]);
        }
        if let Some(idx) = self.opts.live_start_index {
            cmd.args(["-live_start_index", &idx.to_string()]);
        }
        if start_secs > 0.0 {
            cmd.args(["-ss", &format!("{start_secs:.6}")]);
        }
        cmd.arg("-i").arg(self.input.as_ffmpeg_input());
        cmd.args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"]);

        let frame_len = (self.info.width as usize) * (self.info.height as usize) * 4;
        let pipe = RawVideoPipe::spawn(cmd, frame_len, 8, self.input.as_ffmpeg_input())
            .map_err(|e| ArError::media_load(format!("failed to spawn ffmpeg decoder: {e}")))?;
        self.pipe = Some(pipe);
        Ok(())
    }

    fn read_blocking(&mut self, timeout: Duration) -> DecodeRead {
        use crate::foundation::pipe::PipeRecv;

        let Some(pipe) = self.pipe.as_mut() else {
            return DecodeRead::Failed("decoder stopped".to_string());
        };
        match pipe.recv_timeout(timeout) {
            PipeRecv::Frame(data) => DecodeRead::Frame(VideoFrame {
                width: self.info.width,
                height: self.info.height,
                data,
            }),
            PipeRecv::Empty => DecodeRead::Pending,
            PipeRecv::Closed => {
                let stderr = pipe.stop();
                self.pipe = None;
                if stderr.is_empty() {
                    DecodeRead::Ended
                } else {
                    DecodeRead::Failed(format!("ffmpeg decode failed: {stderr}"))
                }
            }
        }
    }
}

#[cfg(feature = "media-ffmpeg")]
impl FrameDecoder for FfmpegDecoder {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read(&mut self) -> DecodeRead {
        self.read_blocking(self.read_timeout)
    }

    fn seek(&mut self, secs: f64) -> ArResult<()> {
        self.spawn_at(secs.max(0.0))
    }

    fn stop(&mut self) {
        if let Some(mut pipe) = self.pipe.take() {
            pipe.stop();
        }
    }
}

/// Hands out a frame read during open before resuming the inner decoder.
#[cfg(feature = "media-ffmpeg")]
struct PrimedDecoder {
    inner: FfmpegDecoder,
    primed: Option<VideoFrame>,
}

#[cfg(feature = "media-ffmpeg")]
impl FrameDecoder for PrimedDecoder {
    fn info(&self) -> &VideoInfo {
        self.inner.info()
    }

    fn read(&mut self) -> DecodeRead {
        match self.primed.take() {
            Some(frame) => DecodeRead::Frame(frame),
            None => self.inner.read(),
        }
    }

    fn seek(&mut self, secs: f64) -> ArResult<()> {
        self.primed = None;
        self.inner.seek(secs)
    }

    fn stop(&mut self) {
        self.primed = None;
        self.inner.stop();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/decoder.rs"]
mod tests;
