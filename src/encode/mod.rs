//! Output sinks for composited frames.
//!
//! A running session can forward every rendered frame to a sink, for recording sessions to MP4
//! or capturing them in tests.

/// `ffmpeg`-based sinks (MP4 output via system `ffmpeg`).
pub(crate) mod ffmpeg;
/// Generic frame sink trait and built-in sinks.
pub(crate) mod sink;

pub use ffmpeg::{FfmpegSink, FfmpegSinkOpts, ensure_parent_dir, write_png};
pub use sink::{FrameSink, InMemorySink, SinkConfig};
