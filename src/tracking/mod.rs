//! Marker visibility state machine feeding the render anchor and playback.

pub(crate) mod bridge;

pub use bridge::{PlaybackEffect, PlaybackMode, PoseBridge, Step, Transition, Visibility, step};
