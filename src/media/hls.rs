use crate::foundation::error::{ArError, ArResult};
use crate::foundation::fetch::{ResourceLocation, fetch_text};

/// One rendition listed in a master playlist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    /// URI as written in the playlist (possibly relative).
    pub uri: String,
    /// Peak bits per second (`BANDWIDTH`).
    pub bandwidth: u64,
    /// `RESOLUTION`, when present.
    pub resolution: Option<(u32, u32)>,
}

/// One media segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// URI as written in the playlist.
    pub uri: String,
    /// `#EXTINF` duration in seconds.
    pub duration: f64,
}

/// Segment list of a single rendition.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaPlaylist {
    /// `#EXT-X-TARGETDURATION`.
    pub target_duration: f64,
    /// Segments in playback order.
    pub segments: Vec<Segment>,
    /// `true` when `#EXT-X-ENDLIST` is present (VOD).
    pub ended: bool,
}

impl MediaPlaylist {
    /// Sum of segment durations.
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

/// Parsed `.m3u8` document.
#[derive(Clone, Debug, PartialEq)]
pub enum Playlist {
    /// Variant list.
    Master(Vec<Variant>),
    /// Segment list.
    Media(MediaPlaylist),
}

fn attr<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    let mut rest = attrs;
    while !rest.is_empty() {
        let (k, after) = rest.split_once('=')?;
        let (value, tail) = if let Some(quoted) = after.strip_prefix('"') {
            let end = quoted.find('"')?;
            (&quoted[..end], quoted[end + 1..].trim_start_matches(','))
        } else {
            match after.split_once(',') {
                Some((v, t)) => (v, t),
                None => (after, ""),
            }
        };
        if k.trim() == key {
            return Some(value);
        }
        rest = tail;
    }
    None
}

/// Parse an HLS playlist.
pub fn parse_playlist(text: &str) -> ArResult<Playlist> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err(ArError::media_load("playlist does not start with #EXTM3U"));
    }

    let mut variants = Vec::new();
    let mut pending_variant: Option<(u64, Option<(u32, u32)>)> = None;
    let mut segments = Vec::new();
    let mut pending_duration: Option<f64> = None;
    let mut target_duration = 0.0;
    let mut ended = false;

    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let bandwidth = attr(attrs, "BANDWIDTH")
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| ArError::media_load("variant without a valid BANDWIDTH"))?;
            let resolution = attr(attrs, "RESOLUTION").and_then(|v| {
                let (w, h) = v.split_once('x')?;
                Some((w.parse().ok()?, h.parse().ok()?))
            });
            pending_variant = Some((bandwidth, resolution));
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let secs = rest.split(',').next().unwrap_or("").trim();
            let secs = secs
                .parse::<f64>()
                .map_err(|_| ArError::media_load(format!("invalid #EXTINF duration '{secs}'")))?;
            pending_duration = Some(secs);
        } else if let Some(rest) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            target_duration = rest.trim().parse::<f64>().unwrap_or(0.0);
        } else if line == "#EXT-X-ENDLIST" {
            ended = true;
        } else if line.starts_with('#') {
            continue;
        } else if let Some((bandwidth, resolution)) = pending_variant.take() {
            variants.push(Variant {
                uri: line.to_string(),
                bandwidth,
                resolution,
            });
        } else if let Some(duration) = pending_duration.take() {
            segments.push(Segment {
                uri: line.to_string(),
                duration,
            });
        }
    }

    if !variants.is_empty() {
        return Ok(Playlist::Master(variants));
    }
    if segments.is_empty() {
        return Err(ArError::media_load("playlist lists no variants and no segments"));
    }
    Ok(Playlist::Media(MediaPlaylist {
        target_duration,
        segments,
        ended,
    }))
}

/// Highest-bandwidth variant that fits in `budget_bps`, else the lowest one.
pub fn select_variant(variants: &[Variant], budget_bps: u64) -> Option<&Variant> {
    variants
        .iter()
        .filter(|v| v.bandwidth <= budget_bps)
        .max_by_key(|v| v.bandwidth)
        .or_else(|| variants.iter().min_by_key(|v| v.bandwidth))
}

/// Adaptive-streaming client settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HlsConfig {
    /// Throughput estimate used for the initial variant choice.
    pub bandwidth_estimate_bps: u64,
    /// Share of the estimate a variant may use.
    pub bandwidth_safety: f64,
    /// Start live streams near the live edge.
    pub low_latency: bool,
    /// Seconds of already-played media kept buffered.
    pub back_buffer_secs: f64,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            bandwidth_estimate_bps: 5_000_000,
            bandwidth_safety: 0.8,
            low_latency: true,
            back_buffer_secs: 90.0,
        }
    }
}

/// Rendition chosen by [`HlsClient::attach`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedStream {
    /// Media playlist to hand to the decoder.
    pub location: ResourceLocation,
    /// Chosen variant, `None` when the URL already was a media playlist.
    pub variant: Option<Variant>,
    /// Parsed media playlist.
    pub playlist: MediaPlaylist,
}

impl ResolvedStream {
    /// `true` for live (non-ended) playlists.
    pub fn is_live(&self) -> bool {
        !self.playlist.ended
    }
}

type TextFetcher = Box<dyn Fn(&str) -> anyhow::Result<String> + Send>;

/// Minimal HLS client: resolves a master playlist to one media playlist.
pub struct HlsClient {
    config: HlsConfig,
    fetch: TextFetcher,
    attached: Option<ResolvedStream>,
}

impl HlsClient {
    /// Client fetching playlists over the filesystem or HTTP.
    pub fn new(config: HlsConfig) -> Self {
        Self::with_fetcher(config, Box::new(|r: &str| fetch_text(r)))
    }

    /// Client with a custom playlist fetcher.
    pub fn with_fetcher(config: HlsConfig, fetch: TextFetcher) -> Self {
        Self {
            config,
            fetch,
            attached: None,
        }
    }

    fn load(&self, loc: &ResourceLocation) -> ArResult<Playlist> {
        let text = (self.fetch)(&loc.as_ffmpeg_input())
            .map_err(|e| ArError::media_load(format!("fetch playlist: {e:#}")))?;
        parse_playlist(&text)
    }

    /// Resolve `master` and remember the chosen rendition.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn attach(&mut self, master: &ResourceLocation) -> ArResult<&ResolvedStream> {
        let resolved = match self.load(master)? {
            Playlist::Media(playlist) => ResolvedStream {
                location: master.clone(),
                variant: None,
                playlist,
            },
            Playlist::Master(variants) => {
                let budget =
                    (self.config.bandwidth_estimate_bps as f64 * self.config.bandwidth_safety) as u64;
                let chosen = select_variant(&variants, budget)
                    .cloned()
                    .ok_or_else(|| ArError::media_load("master playlist has no variants"))?;
                let location = master
                    .join(&chosen.uri)
                    .map_err(|e| ArError::media_load(format!("{e:#}")))?;
                let Playlist::Media(playlist) = self.load(&location)? else {
                    return Err(ArError::media_load("variant playlist is itself a master"));
                };
                tracing::info!(
                    bandwidth = chosen.bandwidth,
                    uri = %chosen.uri,
                    "hls variant selected"
                );
                ResolvedStream {
                    location,
                    variant: Some(chosen),
                    playlist,
                }
            }
        };
        Ok(self.attached.insert(resolved))
    }

    /// Currently attached rendition.
    pub fn attached(&self) -> Option<&ResolvedStream> {
        self.attached.as_ref()
    }

    /// Drop the attached rendition. Idempotent.
    pub fn detach(&mut self) {
        if self.attached.take().is_some() {
            tracing::debug!("hls client detached");
        }
    }

    /// Client settings.
    pub fn config(&self) -> &HlsConfig {
        &self.config
    }
}

impl std::fmt::Debug for HlsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlsClient")
            .field("config", &self.config)
            .field("attached", &self.attached)
            .finish()
    }
}

/// `true` when `url`'s path names an `.m3u8` playlist.
pub fn is_hls_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".m3u8")
}

#[cfg(test)]
#[path = "../../tests/unit/media/hls.rs"]
mod tests;
