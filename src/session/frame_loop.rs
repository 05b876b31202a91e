use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::ArResult;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once any clone called [`CancelToken::cancel`].
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the tick callback wants next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopControl {
    /// Schedule another tick.
    Continue,
    /// End the loop.
    Stop,
}

/// How a [`RenderLoop::run`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// `true` when the loop ended because the token was cancelled.
    pub cancelled: bool,
}

/// Fixed-cadence tick driver.
///
/// Ticks run sequentially on the calling thread. The next tick is scheduled one frame after
/// the previous deadline, or immediately when a slow tick overran it.
#[derive(Clone, Debug)]
pub struct RenderLoop {
    fps: Fps,
    token: CancelToken,
    max_ticks: Option<u64>,
    paced: bool,
}

impl RenderLoop {
    /// Paced loop at `fps`.
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            token: CancelToken::new(),
            max_ticks: None,
            paced: true,
        }
    }

    /// Use `token` for cancellation.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    /// Stop after `n` ticks.
    pub fn with_max_ticks(mut self, n: u64) -> Self {
        self.max_ticks = Some(n);
        self
    }

    /// Run as fast as possible, passing the nominal frame duration to every tick.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Token that cancels this loop.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Drive `tick(index, dt)` until it stops, fails, hits the tick limit, or is cancelled.
    pub fn run<F>(&self, mut tick: F) -> ArResult<LoopSummary>
    where
        F: FnMut(FrameIndex, Duration) -> ArResult<LoopControl>,
    {
        let frame = self.fps.frame_duration();
        let mut ticks = 0u64;
        let mut last = Instant::now();
        let mut deadline = last;
        loop {
            if self.token.is_cancelled() {
                return Ok(LoopSummary {
                    ticks,
                    cancelled: true,
                });
            }
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            let dt = if self.paced {
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
                let now = Instant::now();
                let dt = if ticks == 0 { frame } else { now - last };
                last = now;
                deadline = (deadline + frame).max(now);
                dt
            } else {
                frame
            };

            let control = tick(FrameIndex(ticks), dt)?;
            ticks += 1;
            if control == LoopControl::Stop {
                break;
            }
        }
        Ok(LoopSummary {
            ticks,
            cancelled: false,
        })
    }
}
