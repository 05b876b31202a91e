use std::collections::VecDeque;
use std::time::Duration;

use crate::foundation::error::{ArError, ArResult};
use crate::foundation::fetch::ResourceLocation;
use crate::media::decoder::{DecodeRead, FrameDecoder, MediaBackend, OpenOptions, VideoFrame, VideoInfo};
use crate::media::hls::{HlsClient, HlsConfig, is_hls_url};
use crate::media::policy::AutoplayPolicy;

const MAX_CATCH_UP_FRAMES: u32 = 8;

/// How a [`StreamingVideoSource`] loads and plays.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourceOptions {
    /// Restart at end of stream.
    pub looping: bool,
    /// Start muted; muted playback passes [`AutoplayPolicy::MutedOnly`].
    pub muted: bool,
    /// Hand `.m3u8` URLs straight to a backend with native playlist support.
    pub prefer_native_hls: bool,
    /// Autoplay rule to emulate.
    pub autoplay_policy: AutoplayPolicy,
    /// Adaptive-streaming client settings.
    pub hls: HlsConfig,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            looping: true,
            muted: true,
            prefer_native_hls: false,
            autoplay_policy: AutoplayPolicy::default(),
            hls: HlsConfig::default(),
        }
    }
}

/// Readiness and playback notifications, drained by the session each tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    /// First frame decoded; size known.
    Ready {
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// Playback started.
    Playing,
    /// Playback paused.
    Paused,
    /// Decoder starved; waiting for data.
    Waiting,
    /// Data arrived after [`MediaEvent::Waiting`].
    CanPlay,
    /// Non-looping stream finished.
    Ended,
    /// Play request refused by the autoplay policy.
    AutoplayBlocked,
    /// Load or decode failure.
    Error(String),
}

/// Result of [`StreamingVideoSource::play`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Playback began.
    Started,
    /// Was already playing.
    AlreadyPlaying,
    /// Refused by policy; will start on the next user gesture.
    Blocked,
    /// Source failed or was torn down.
    Unavailable,
}

/// A loaded campaign video with a media clock.
///
/// The clock only moves while playing. Frames are pulled from the decoder as the clock passes
/// their presentation time.
pub struct StreamingVideoSource {
    url: String,
    decoder: Option<Box<dyn FrameDecoder>>,
    hls: Option<HlsClient>,
    info: VideoInfo,
    opts: SourceOptions,
    playing: bool,
    clock: f64,
    frame_index: u64,
    current: Option<VideoFrame>,
    events: VecDeque<MediaEvent>,
    had_gesture: bool,
    pending_play: bool,
    waiting: bool,
    failure: Option<String>,
}

impl StreamingVideoSource {
    /// Resolve, open, and preload the first frame of `url`.
    #[tracing::instrument(level = "debug", skip(backend, opts))]
    pub fn load(url: &str, backend: &mut dyn MediaBackend, opts: SourceOptions) -> ArResult<Self> {
        let loc = ResourceLocation::parse(url)
            .map_err(|e| ArError::media_load(format!("invalid video url '{url}': {e:#}")))?;

        let mut hls = None;
        let mut open = OpenOptions {
            looping: opts.looping,
            live_start_index: None,
        };
        let input = if is_hls_url(url) && !(opts.prefer_native_hls && backend.supports_native_hls())
        {
            let mut client = HlsClient::new(opts.hls.clone());
            let resolved = client.attach(&loc)?;
            if resolved.is_live() {
                open.looping = false;
                if opts.hls.low_latency {
                    open.live_start_index = Some(-3);
                }
            }
            let input = resolved.location.clone();
            hls = Some(client);
            input
        } else {
            loc
        };

        let mut decoder = backend.open(&input, &open)?;
        let info = decoder.info().clone();
        let first = match decoder.read() {
            DecodeRead::Frame(frame) => frame,
            DecodeRead::Pending => {
                decoder.stop();
                return Err(ArError::media_load(format!("'{url}' has no frame ready after open")));
            }
            DecodeRead::Ended => {
                decoder.stop();
                return Err(ArError::media_load(format!("'{url}' contains no video frames")));
            }
            DecodeRead::Failed(msg) => {
                decoder.stop();
                return Err(ArError::media_load(msg));
            }
        };

        tracing::info!(url, width = info.width, height = info.height, "video loaded");
        let mut events = VecDeque::new();
        events.push_back(MediaEvent::Ready {
            width: info.width,
            height: info.height,
        });
        Ok(Self {
            url: url.to_string(),
            decoder: Some(decoder),
            hls,
            info,
            opts,
            playing: false,
            clock: 0.0,
            frame_index: 0,
            current: Some(first),
            events,
            had_gesture: false,
            pending_play: false,
            waiting: false,
            failure: None,
        })
    }

    /// Reference this source was loaded from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream properties.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Request playback. A policy refusal is not an error: the source stays paused and
    /// reports [`MediaEvent::AutoplayBlocked`].
    pub fn play(&mut self) -> PlayOutcome {
        if self.decoder.is_none() || self.failure.is_some() {
            return PlayOutcome::Unavailable;
        }
        if self.playing {
            return PlayOutcome::AlreadyPlaying;
        }
        if !self
            .opts
            .autoplay_policy
            .permits(self.opts.muted, self.had_gesture)
        {
            self.pending_play = true;
            self.events.push_back(MediaEvent::AutoplayBlocked);
            tracing::warn!(url = %self.url, "playback blocked by autoplay policy");
            return PlayOutcome::Blocked;
        }
        self.pending_play = false;
        self.playing = true;
        self.events.push_back(MediaEvent::Playing);
        PlayOutcome::Started
    }

    /// Pause playback; also cancels a play waiting for a gesture.
    pub fn pause(&mut self) {
        self.pending_play = false;
        if self.playing {
            self.playing = false;
            self.events.push_back(MediaEvent::Paused);
        }
    }

    /// Record a user interaction, resuming a blocked play request.
    pub fn user_gesture(&mut self) -> Option<PlayOutcome> {
        self.had_gesture = true;
        if self.pending_play {
            Some(self.play())
        } else {
            None
        }
    }

    /// Unmute (needs a gesture under [`AutoplayPolicy::MutedOnly`] to keep playing).
    pub fn set_muted(&mut self, muted: bool) {
        self.opts.muted = muted;
        if self.playing && !self.opts.autoplay_policy.permits(muted, self.had_gesture) {
            self.pause();
            self.pending_play = true;
            self.events.push_back(MediaEvent::AutoplayBlocked);
        }
    }

    /// Jump the media clock to `secs`.
    pub fn seek(&mut self, secs: f64) -> ArResult<()> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| ArError::media_load("seek on a torn-down video source"))?;
        let secs = secs.max(0.0);
        decoder.seek(secs)?;
        self.clock = secs;
        self.frame_index = (secs * self.info.fps.as_f64()).floor() as u64;
        if let DecodeRead::Frame(frame) = decoder.read() {
            self.current = Some(frame);
        }
        Ok(())
    }

    /// Advance the media clock by `dt` and pull frames that became due.
    pub fn advance(&mut self, dt: Duration) {
        if !self.playing || self.failure.is_some() {
            return;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };
        self.clock += dt.as_secs_f64();
        let due = (self.clock * self.info.fps.as_f64()).floor() as u64;

        let mut pulled = 0;
        while self.frame_index < due && pulled < MAX_CATCH_UP_FRAMES {
            match decoder.read() {
                DecodeRead::Frame(frame) => {
                    self.current = Some(frame);
                    self.frame_index += 1;
                    pulled += 1;
                    if self.waiting {
                        self.waiting = false;
                        self.events.push_back(MediaEvent::CanPlay);
                    }
                }
                DecodeRead::Pending => {
                    if !self.waiting {
                        self.waiting = true;
                        self.events.push_back(MediaEvent::Waiting);
                    }
                    break;
                }
                DecodeRead::Ended => {
                    self.playing = false;
                    self.events.push_back(MediaEvent::Ended);
                    break;
                }
                DecodeRead::Failed(msg) => {
                    tracing::warn!(url = %self.url, error = %msg, "video decode failed");
                    decoder.stop();
                    self.playing = false;
                    self.failure = Some(msg.clone());
                    self.events.push_back(MediaEvent::Error(msg));
                    break;
                }
            }
        }
        // Skip ahead rather than replaying a backlog after a stall.
        if self.frame_index < due {
            self.frame_index = due;
        }
    }

    /// Frame to upload into the video texture.
    pub fn current_frame(&self) -> Option<&VideoFrame> {
        self.current.as_ref()
    }

    /// Take queued events in order.
    pub fn drain_events(&mut self) -> Vec<MediaEvent> {
        self.events.drain(..).collect()
    }

    /// `true` while playing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// `true` while a play request waits for a gesture.
    pub fn is_play_pending(&self) -> bool {
        self.pending_play
    }

    /// Media clock in seconds.
    pub fn position_secs(&self) -> f64 {
        self.clock
    }

    /// Decode failure after load, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// HLS client in use, if the URL was a playlist resolved by us.
    pub fn hls(&self) -> Option<&HlsClient> {
        self.hls.as_ref()
    }

    /// Stop loading, detach the HLS client, stop the decoder, and clear the source. Idempotent.
    pub fn teardown(&mut self) {
        self.playing = false;
        self.pending_play = false;
        if let Some(mut client) = self.hls.take() {
            client.detach();
        }
        if let Some(mut decoder) = self.decoder.take() {
            decoder.stop();
            tracing::debug!(url = %self.url, "video source torn down");
        }
        self.current = None;
        self.events.clear();
    }

    /// `true` after [`StreamingVideoSource::teardown`].
    pub fn is_torn_down(&self) -> bool {
        self.decoder.is_none()
    }
}

impl Drop for StreamingVideoSource {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for StreamingVideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingVideoSource")
            .field("url", &self.url)
            .field("playing", &self.playing)
            .field("clock", &self.clock)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/source.rs"]
mod tests;
