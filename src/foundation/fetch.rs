use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Where a campaign-supplied reference points to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceLocation {
    /// Local filesystem path (plain path or `file://` URL).
    File(PathBuf),
    /// Remote `http(s)://` URL.
    Remote(url::Url),
}

impl ResourceLocation {
    /// Classify a reference string.
    pub fn parse(reference: &str) -> anyhow::Result<Self> {
        let trimmed = reference.trim();
        anyhow::ensure!(!trimmed.is_empty(), "resource reference is empty");

        if let Ok(url) = url::Url::parse(trimmed) {
            match url.scheme() {
                "http" | "https" => return Ok(Self::Remote(url)),
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| anyhow::anyhow!("invalid file URL '{trimmed}'"))?;
                    return Ok(Self::File(path));
                }
                // Single-letter schemes are Windows drive letters, not URLs.
                s if s.len() > 1 => anyhow::bail!("unsupported URL scheme '{s}'"),
                _ => {}
            }
        }
        Ok(Self::File(PathBuf::from(trimmed)))
    }

    /// Resolve `reference` relative to this location (used for playlist entries).
    pub fn join(&self, reference: &str) -> anyhow::Result<Self> {
        match self {
            Self::Remote(base) => {
                let joined = base
                    .join(reference)
                    .with_context(|| format!("resolve '{reference}' against '{base}'"))?;
                Ok(Self::Remote(joined))
            }
            Self::File(base) => {
                if let Ok(loc) = Self::parse(reference)
                    && (matches!(loc, Self::Remote(_)) || reference.starts_with("file:"))
                {
                    return Ok(loc);
                }
                let candidate = PathBuf::from(reference);
                if candidate.is_absolute() {
                    return Ok(Self::File(candidate));
                }
                let dir = base.parent().map(PathBuf::from).unwrap_or_default();
                Ok(Self::File(dir.join(candidate)))
            }
        }
    }

    /// Render the location as an argument ffmpeg understands.
    pub fn as_ffmpeg_input(&self) -> String {
        match self {
            Self::File(p) => p.display().to_string(),
            Self::Remote(u) => u.to_string(),
        }
    }
}

/// Fetch the full body of a resource.
#[tracing::instrument(level = "debug")]
pub fn fetch_bytes(reference: &str) -> anyhow::Result<Vec<u8>> {
    match ResourceLocation::parse(reference)? {
        ResourceLocation::File(path) => {
            std::fs::read(&path).with_context(|| format!("read '{}'", path.display()))
        }
        ResourceLocation::Remote(url) => {
            let client = reqwest::blocking::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .context("build http client")?;
            let resp = client
                .get(url.clone())
                .send()
                .with_context(|| format!("GET {url}"))?;
            let status = resp.status();
            anyhow::ensure!(status.is_success(), "GET {url} returned {status}");
            let body = resp.bytes().with_context(|| format!("read body of {url}"))?;
            Ok(body.to_vec())
        }
    }
}

/// Fetch a resource and decode it as UTF-8 text.
pub fn fetch_text(reference: &str) -> anyhow::Result<String> {
    let bytes = fetch_bytes(reference)?;
    String::from_utf8(bytes).with_context(|| format!("'{reference}' is not valid UTF-8"))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/fetch.rs"]
mod tests;
