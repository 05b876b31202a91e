use std::path::PathBuf;
use std::time::Duration;

use crate::camera::stream::{
    CameraDevice, CameraDriver, CameraError, CameraFrame, CameraRequest, CameraStream, StreamInfo,
    TrackId,
};

/// What the ffmpeg camera reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraInput {
    /// Platform capture device (`/dev/video0` on Linux, an index on macOS, a name on Windows).
    Device(String),
    /// Recorded video replayed in a loop as if it were a live camera.
    File(PathBuf),
}

/// Camera backed by the system `ffmpeg` binary.
///
/// Frames are scaled to the requested size and delivered as RGBA8.
#[derive(Clone, Debug)]
pub struct FfmpegCamera {
    input: CameraInput,
    startup_timeout: Duration,
}

impl FfmpegCamera {
    /// Camera reading `input`.
    pub fn new(input: CameraInput) -> Self {
        Self {
            input,
            startup_timeout: Duration::from_secs(10),
        }
    }

    /// Default capture device for the current platform.
    pub fn default_device() -> Self {
        let device = if cfg!(target_os = "linux") {
            "/dev/video0"
        } else if cfg!(target_os = "windows") {
            "video=Integrated Camera"
        } else {
            "0"
        };
        Self::new(CameraInput::Device(device.to_string()))
    }

    /// How long to wait for the first frame before giving up.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

impl CameraDevice for FfmpegCamera {
    #[cfg(feature = "media-ffmpeg")]
    fn acquire(&mut self, req: &CameraRequest) -> Result<CameraStream, CameraError> {
        use crate::foundation::pipe::{PipeRecv, RawVideoPipe};
        use crate::foundation::tools::{ffmpeg_bin, is_ffmpeg_on_path};

        if req.width == 0 || req.height == 0 {
            return Err(CameraError::DeviceUnavailable(
                "requested camera size must be non-zero".to_string(),
            ));
        }
        if !is_ffmpeg_on_path() {
            return Err(CameraError::Unsupported(
                "ffmpeg is required for camera capture, but was not found on PATH".to_string(),
            ));
        }
        precheck_input(&self.input)?;

        let mut cmd = std::process::Command::new(ffmpeg_bin());
        cmd.args(["-hide_banner", "-loglevel", "error"]);
        push_input_args(&mut cmd, &self.input, req);
        cmd.args([
            "-vf",
            &format!("scale={}:{}", req.width, req.height),
            "-pix_fmt",
            "rgba",
            "-f",
            "rawvideo",
            "pipe:1",
        ]);

        let frame_len = (req.width as usize) * (req.height as usize) * 4;
        let label = match &self.input {
            CameraInput::Device(d) => d.clone(),
            CameraInput::File(p) => p.display().to_string(),
        };
        let mut pipe = RawVideoPipe::spawn(cmd, frame_len, 2, label.clone()).map_err(|e| {
            CameraError::Unsupported(format!("failed to spawn ffmpeg camera reader: {e}"))
        })?;

        let first = match pipe.recv_timeout(self.startup_timeout) {
            PipeRecv::Frame(bytes) => bytes,
            PipeRecv::Empty => {
                pipe.stop();
                return Err(CameraError::DeviceUnavailable(format!(
                    "camera '{label}' produced no frame within {:?}",
                    self.startup_timeout
                )));
            }
            PipeRecv::Closed => {
                let stderr = pipe.stop();
                return Err(classify_ffmpeg_failure(&label, &stderr));
            }
        };

        tracing::info!(camera = %label, width = req.width, height = req.height, "camera acquired");
        let info = StreamInfo {
            width: req.width,
            height: req.height,
            facing: req.facing,
            label,
        };
        let driver = FfmpegDriver {
            pipe,
            width: req.width,
            height: req.height,
            pending: Some(first),
            sequential: matches!(self.input, CameraInput::File(_)),
        };
        Ok(CameraStream::new(info, &[TrackId(0)], Box::new(driver)))
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    fn acquire(&mut self, _req: &CameraRequest) -> Result<CameraStream, CameraError> {
        Err(CameraError::Unsupported(
            "camera capture requires the 'media-ffmpeg' feature".to_string(),
        ))
    }
}

#[cfg(feature = "media-ffmpeg")]
struct FfmpegDriver {
    pipe: crate::foundation::pipe::RawVideoPipe,
    width: u32,
    height: u32,
    pending: Option<Vec<u8>>,
    // Replayed files hand out every frame in order; live devices skip to the newest frame.
    sequential: bool,
}

#[cfg(feature = "media-ffmpeg")]
impl CameraDriver for FfmpegDriver {
    fn read_frame(&mut self) -> Result<Option<CameraFrame>, CameraError> {
        use crate::foundation::pipe::PipeRecv;

        if let Some(bytes) = self.pending.take() {
            return Ok(Some(self.wrap(bytes)));
        }
        let polled = if self.sequential {
            self.pipe.recv_timeout(Duration::from_millis(500))
        } else {
            self.pipe.try_recv_latest()
        };
        match polled {
            PipeRecv::Frame(bytes) => Ok(Some(self.wrap(bytes))),
            PipeRecv::Empty => Ok(None),
            PipeRecv::Closed => {
                let stderr = self.pipe.stop();
                Err(CameraError::DeviceUnavailable(format!(
                    "camera stream ended unexpectedly: {stderr}"
                )))
            }
        }
    }

    fn stop_track(&mut self, _track: TrackId) {
        self.pipe.stop();
    }
}

#[cfg(feature = "media-ffmpeg")]
impl FfmpegDriver {
    fn wrap(&self, data: Vec<u8>) -> CameraFrame {
        CameraFrame {
            width: self.width,
            height: self.height,
            data,
            seq: 0,
        }
    }
}

#[cfg(feature = "media-ffmpeg")]
fn push_input_args(cmd: &mut std::process::Command, input: &CameraInput, req: &CameraRequest) {
    let rate = format!("{}/{}", req.fps.num, req.fps.den);
    match input {
        CameraInput::File(path) => {
            cmd.args(["-re", "-stream_loop", "-1", "-i"]).arg(path);
        }
        CameraInput::Device(device) => {
            let format = if cfg!(target_os = "linux") {
                "video4linux2"
            } else if cfg!(target_os = "windows") {
                "dshow"
            } else {
                "avfoundation"
            };
            cmd.args(["-f", format, "-framerate", &rate, "-i", device]);
        }
    }
}

fn precheck_input(input: &CameraInput) -> Result<(), CameraError> {
    match input {
        CameraInput::File(path) => {
            if !path.is_file() {
                return Err(CameraError::DeviceUnavailable(format!(
                    "replay file '{}' does not exist",
                    path.display()
                )));
            }
            Ok(())
        }
        CameraInput::Device(device) if device.starts_with("/dev/") => {
            match std::fs::File::open(device) {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
                    CameraError::PermissionDenied(format!("cannot open '{device}': {e}")),
                ),
                Err(e) => Err(CameraError::DeviceUnavailable(format!(
                    "cannot open '{device}': {e}"
                ))),
            }
        }
        CameraInput::Device(_) => Ok(()),
    }
}

/// Map ffmpeg's stderr from a failed capture start to a camera error.
pub(crate) fn classify_ffmpeg_failure(label: &str, stderr: &str) -> CameraError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("permission denied") || lower.contains("not authorized") {
        CameraError::PermissionDenied(format!("camera '{label}': {stderr}"))
    } else {
        CameraError::DeviceUnavailable(format!("camera '{label}' failed to start: {stderr}"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/camera/ffmpeg.rs"]
mod tests;
