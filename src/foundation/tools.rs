/// Name or path of the `ffmpeg` binary (`ARCAST_FFMPEG` overrides).
pub fn ffmpeg_bin() -> String {
    std::env::var("ARCAST_FFMPEG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "ffmpeg".to_string())
}

/// Name or path of the `ffprobe` binary (`ARCAST_FFPROBE` overrides).
pub fn ffprobe_bin() -> String {
    std::env::var("ARCAST_FFPROBE")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "ffprobe".to_string())
}

/// Return `true` when `ffmpeg` can be invoked.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new(ffmpeg_bin())
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
