use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ArError, ArResult};
use crate::foundation::math::{over_premul, premultiply_in_place};
use crate::foundation::pipe::RawVideoWriter;
use crate::foundation::tools::{ffmpeg_bin, is_ffmpeg_on_path};
use crate::render::backend::FrameRGBA;

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Replace an existing file instead of refusing to start.
    pub overwrite: bool,
    /// Opaque color shown through transparent pixels.
    pub matte: [u8; 3],
}

impl FfmpegSinkOpts {
    /// Overwriting MP4 output to `out_path` on a black matte.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            matte: [0, 0, 0],
        }
    }
}

/// An ffmpeg encode in progress.
struct Recording {
    writer: RawVideoWriter,
    cfg: SinkConfig,
    opaque: Vec<u8>,
    last: Option<FrameIndex>,
}

/// Records composited frames to an H.264 MP4 through the system `ffmpeg`.
///
/// Frames are flattened onto [`FfmpegSinkOpts::matte`] and streamed as raw RGBA on the
/// encoder's stdin. Dropping a sink mid-recording kills the encoder and leaves a partial file.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    recording: Option<Recording>,
}

impl FfmpegSink {
    /// Sink for `opts`; nothing is spawned before [`FrameSink::begin`].
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            recording: None,
        }
    }

    /// `true` between `begin` and `end`.
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }
}

impl std::fmt::Debug for FfmpegSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSink")
            .field("out_path", &self.opts.out_path)
            .field("recording", &self.is_recording())
            .finish()
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> ArResult<()> {
        if self.recording.is_some() {
            return Err(ArError::validation("ffmpeg sink is already recording"));
        }
        check_encodable(&cfg)?;
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(ArError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(ArError::output(
                "MP4 recording needs ffmpeg, which was not found on PATH",
            ));
        }

        let mut cmd = Command::new(ffmpeg_bin());
        cmd.args(encoder_args(&cfg, &self.opts));
        let writer = RawVideoWriter::spawn(cmd, self.opts.out_path.display().to_string())
            .map_err(|e| ArError::output(format!("failed to start ffmpeg: {e}")))?;

        tracing::info!(path = %self.opts.out_path.display(), width = cfg.width, height = cfg.height, "recording started");
        self.recording = Some(Recording {
            writer,
            opaque: vec![0; (cfg.width as usize) * (cfg.height as usize) * 4],
            cfg,
            last: None,
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ArResult<()> {
        let rec = self
            .recording
            .as_mut()
            .ok_or_else(|| ArError::output("ffmpeg sink is not recording"))?;
        if let Some(last) = rec.last
            && idx <= last
        {
            return Err(ArError::output(format!(
                "frame {} arrived after frame {}",
                idx.0, last.0
            )));
        }
        if (frame.width, frame.height) != (rec.cfg.width, rec.cfg.height) {
            return Err(ArError::validation(format!(
                "frame is {}x{}, recording is {}x{}",
                frame.width, frame.height, rec.cfg.width, rec.cfg.height
            )));
        }
        flatten_onto_matte(&mut rec.opaque, frame, self.opts.matte)?;
        rec.writer
            .write_frame(&rec.opaque)
            .map_err(|e| ArError::output(format!("ffmpeg stopped accepting frames: {e}")))?;
        rec.last = Some(idx);
        Ok(())
    }

    fn end(&mut self) -> ArResult<()> {
        let mut rec = self
            .recording
            .take()
            .ok_or_else(|| ArError::output("ffmpeg sink is not recording"))?;
        let exit = rec
            .writer
            .finish()
            .map_err(|e| ArError::output(format!("failed to wait for ffmpeg: {e}")))?;
        if !exit.status.success() {
            return Err(ArError::output(format!(
                "ffmpeg exited with {}: {}",
                exit.status, exit.stderr
            )));
        }
        tracing::info!(path = %self.opts.out_path.display(), frames = rec.writer.frames(), "recording finished");
        Ok(())
    }
}

/// libx264 with yuv420p needs a valid rate and even, non-zero sides.
fn check_encodable(cfg: &SinkConfig) -> ArResult<()> {
    if cfg.fps.num == 0 || cfg.fps.den == 0 {
        return Err(ArError::validation("recording fps must be non-zero"));
    }
    if cfg.width == 0 || cfg.height == 0 {
        return Err(ArError::validation("recording size must be non-zero"));
    }
    if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
        return Err(ArError::validation(format!(
            "recording size {}x{} must be even for yuv420p",
            cfg.width, cfg.height
        )));
    }
    Ok(())
}

/// Arguments for an encoder reading raw RGBA at the sink's rate from stdin.
fn encoder_args(cfg: &SinkConfig, opts: &FfmpegSinkOpts) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        OsString::from(if opts.overwrite { "-y" } else { "-n" }),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", cfg.width, cfg.height).into(),
        // Before `-i`, so it sets the input rate.
        "-r".into(),
        format!("{}/{}", cfg.fps.num, cfg.fps.den).into(),
        "-i".into(),
        "pipe:0".into(),
        "-an".into(),
    ];
    args.extend(
        ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"]
            .map(OsString::from),
    );
    args.push(opts.out_path.clone().into_os_string());
    args
}

/// Write `frame` into `dst` as opaque RGBA, composited over `matte`.
fn flatten_onto_matte(dst: &mut [u8], frame: &FrameRGBA, matte: [u8; 3]) -> ArResult<()> {
    if dst.len() != frame.data.len() || !frame.data.len().is_multiple_of(4) {
        return Err(ArError::validation(format!(
            "frame holds {} bytes, expected {}",
            frame.data.len(),
            dst.len()
        )));
    }
    let back = [matte[0], matte[1], matte[2], 255];
    for (d, s) in dst.chunks_exact_mut(4).zip(frame.data.chunks_exact(4)) {
        let src = if frame.premultiplied {
            [s[0], s[1], s[2], s[3]]
        } else {
            premultiplied([s[0], s[1], s[2], s[3]])
        };
        d.copy_from_slice(&over_premul(back, src));
    }
    Ok(())
}

fn premultiplied(px: [u8; 4]) -> [u8; 4] {
    let mut out = px;
    premultiply_in_place(&mut out);
    out
}

/// Save one composited frame as an opaque PNG over black.
pub fn write_png(frame: &FrameRGBA, path: &Path) -> ArResult<()> {
    ensure_parent_dir(path)?;
    let mut opaque = vec![0u8; frame.data.len()];
    flatten_onto_matte(&mut opaque, frame, [0, 0, 0])?;
    let img = image::RgbaImage::from_raw(frame.width, frame.height, opaque)
        .ok_or_else(|| ArError::validation("frame size does not match its pixel data"))?;
    img.save(path)
        .map_err(|e| ArError::output(format!("failed to write '{}': {e}", path.display())))
}

/// Create the parent directory of `path` when it is missing.
pub fn ensure_parent_dir(path: &Path) -> ArResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
