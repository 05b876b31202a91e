//! Camera acquisition.
//!
//! A [`CameraDevice`] hands out [`CameraStream`]s that own their tracks and stop them exactly once.

pub(crate) mod ffmpeg;
pub(crate) mod memory;
pub(crate) mod stream;

pub use ffmpeg::{CameraInput, FfmpegCamera};
pub use memory::{CameraCounters, MemoryCamera};
pub use stream::{
    CameraDevice, CameraDriver, CameraError, CameraFrame, CameraRequest, CameraStream, StreamInfo,
    TrackId,
};
