/// Campaign reference carried by a scanned code.
///
/// Wire form: `{ "videoUrl": "...", "markerUrl": "..." }`. Unknown fields are ignored.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPayload {
    /// Campaign video reference.
    pub video_url: String,
    /// Marker image reference.
    pub marker_url: String,
}

/// Parse decoded code text into a payload.
///
/// Returns `None` for anything that is not a JSON object with non-empty `videoUrl` and
/// `markerUrl` strings; such codes are simply not campaign codes.
pub fn parse_scan_payload(text: &str) -> Option<ScanPayload> {
    let payload: ScanPayload = match serde_json::from_str(text.trim()) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring non-campaign code");
            return None;
        }
    };
    if payload.video_url.trim().is_empty() || payload.marker_url.trim().is_empty() {
        tracing::debug!("ignoring code with empty urls");
        return None;
    }
    Some(ScanPayload {
        video_url: payload.video_url.trim().to_string(),
        marker_url: payload.marker_url.trim().to_string(),
    })
}
