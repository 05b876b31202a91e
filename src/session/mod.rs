//! AR session controller: compatibility check, marker pipeline, scan mode and error recovery.

pub(crate) mod config;
pub(crate) mod controller;
pub(crate) mod frame_loop;
pub(crate) mod state;

pub use config::{SessionConfig, VideoPlacement};
pub use controller::{
    Advisory, ArSession, CodeDecoderFactory, Platform, RenderDeviceFactory, SessionListener,
    SessionStats, TickOutcome,
};
pub use frame_loop::{CancelToken, LoopControl, LoopSummary, RenderLoop};
pub use state::{SessionEvent, SessionState, next_state};
