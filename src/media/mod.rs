//! Campaign video: playlist resolution, decoding, playback clock and autoplay rules.

pub(crate) mod decoder;
pub(crate) mod hls;
pub(crate) mod memory;
pub(crate) mod metadata;
pub(crate) mod policy;
pub(crate) mod source;

pub use decoder::{
    DecodeRead, FfmpegMediaBackend, FrameDecoder, MediaBackend, OpenOptions, VideoFrame,
    VideoInfo, probe_video,
};
pub use hls::{
    HlsClient, HlsConfig, MediaPlaylist, Playlist, ResolvedStream, Segment, Variant, is_hls_url,
    parse_playlist, select_variant,
};
pub use memory::{MediaCounters, MemoryMediaBackend};
pub use metadata::{DEFAULT_VIDEO_HEIGHT, DEFAULT_VIDEO_WIDTH, VideoMetadata};
pub use policy::AutoplayPolicy;
pub use source::{MediaEvent, PlayOutcome, SourceOptions, StreamingVideoSource};
