/// Convenience result type used across arcast.
pub type ArResult<T> = Result<T, ArError>;

/// Stable error codes surfaced to the hosting UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Device lacks 3D rendering or camera capability.
    ArUnsupported,
    /// Camera permission denied or device busy/unavailable.
    CameraFailed,
    /// Marker descriptor failed to load or parse.
    ArInitFailed,
    /// Video failed to load or decode.
    MediaLoadError,
}

impl ErrorCode {
    /// Wire/display form of the code, e.g. `AR_UNSUPPORTED`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArUnsupported => "AR_UNSUPPORTED",
            Self::CameraFailed => "CAMERA_FAILED",
            Self::ArInitFailed => "AR_INIT_FAILED",
            Self::MediaLoadError => "MEDIA_LOAD_ERROR",
        }
    }

    /// Message shown next to the retry action.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::ArUnsupported => "Your device does not support AR features",
            Self::CameraFailed => "Failed to initialize camera",
            Self::ArInitFailed => "Failed to initialize AR experience",
            Self::MediaLoadError => "Failed to load video",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error taxonomy used by session APIs.
///
/// The first four variants are fatal to an AR session and map 1:1 onto [`ErrorCode`].
#[derive(thiserror::Error, Debug)]
pub enum ArError {
    /// Missing 3D rendering or camera capability.
    #[error("AR unsupported: {0}")]
    Unsupported(String),

    /// Camera permission denied or device unavailable.
    #[error("camera failed: {0}")]
    CameraFailed(String),

    /// Marker descriptor could not be loaded or parsed.
    #[error("AR init failed: {0}")]
    InitFailed(String),

    /// Video could not be loaded or decoded.
    #[error("media load error: {0}")]
    MediaLoad(String),

    /// Invalid user-provided or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Writing composited output (encoder, snapshot) failed.
    #[error("output error: {0}")]
    Output(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArError {
    /// Build an [`ArError::Unsupported`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Build an [`ArError::CameraFailed`] value.
    pub fn camera_failed(msg: impl Into<String>) -> Self {
        Self::CameraFailed(msg.into())
    }

    /// Build an [`ArError::InitFailed`] value.
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitFailed(msg.into())
    }

    /// Build an [`ArError::MediaLoad`] value.
    pub fn media_load(msg: impl Into<String>) -> Self {
        Self::MediaLoad(msg.into())
    }

    /// Build an [`ArError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build an [`ArError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build an [`ArError::Output`] value.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }

    /// Session error code for fatal categories.
    ///
    /// Configuration, output and wrapped errors have no dedicated code; the session reports them as
    /// `AR_INIT_FAILED` since they prevent the pipeline from starting.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unsupported(_) => ErrorCode::ArUnsupported,
            Self::CameraFailed(_) => ErrorCode::CameraFailed,
            Self::InitFailed(_)
            | Self::Validation(_)
            | Self::Serde(_)
            | Self::Output(_)
            | Self::Other(_) => ErrorCode::ArInitFailed,
            Self::MediaLoad(_) => ErrorCode::MediaLoadError,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
