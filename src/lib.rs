//! Arcast is a marker-based AR campaign runtime.
//!
//! A session acquires a camera, finds a printed image marker in each frame, and composites a
//! streamed campaign video onto the marker plane over the camera image:
//!
//! - Describe the campaign with a [`SessionConfig`]
//! - Provide devices through a [`Platform`] (real ffmpeg-backed ones or in-memory fakes)
//! - Drive an [`ArSession`] with [`ArSession::tick`] or a [`RenderLoop`]
//!
//! A QR campaign code can switch the session to another marker and video at runtime.
#![forbid(unsafe_code)]
#![deny(missing_docs)]
// Device and decoder seams expose accessors that only tests and the CLI call.
#![allow(dead_code)]

mod foundation;

pub mod camera;
pub mod encode;
pub mod marker;
pub mod media;
pub mod render;
pub mod scan;
pub mod session;
pub mod tracking;

pub use crate::foundation::core::{FacingMode, Fps, FrameIndex, Point, Vec2, Vec3, Viewport};
pub use crate::foundation::error::{ArError, ArResult, ErrorCode};
pub use crate::foundation::fetch::{ResourceLocation, fetch_bytes, fetch_text};
pub use crate::foundation::tools::{ffmpeg_bin, ffprobe_bin, is_ffmpeg_on_path};

pub use crate::camera::{CameraDevice, CameraError, CameraFrame, CameraRequest, FfmpegCamera};
pub use crate::encode::{FfmpegSink, FfmpegSinkOpts, FrameSink, InMemorySink, SinkConfig};
pub use crate::marker::{Detection, MarkerDescriptor, PoseTransform};
pub use crate::media::{StreamingVideoSource, VideoMetadata};
pub use crate::render::{FrameRGBA, VideoCompositor};
pub use crate::scan::{CodeScanner, ScanPayload};
pub use crate::session::{ArSession, Platform, RenderLoop, SessionConfig, SessionState};
pub use crate::tracking::{PoseBridge, Visibility};
