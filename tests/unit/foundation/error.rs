use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ArError::unsupported("x")
            .to_string()
            .contains("AR unsupported:")
    );
    assert!(
        ArError::camera_failed("x")
            .to_string()
            .contains("camera failed:")
    );
    assert!(
        ArError::media_load("x")
            .to_string()
            .contains("media load error:")
    );
    assert!(
        ArError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn fatal_variants_map_to_codes() {
    assert_eq!(ArError::unsupported("x").code(), ErrorCode::ArUnsupported);
    assert_eq!(ArError::camera_failed("x").code(), ErrorCode::CameraFailed);
    assert_eq!(ArError::init_failed("x").code(), ErrorCode::ArInitFailed);
    assert_eq!(ArError::media_load("x").code(), ErrorCode::MediaLoadError);
}

#[test]
fn codes_have_stable_strings() {
    assert_eq!(ErrorCode::ArUnsupported.as_str(), "AR_UNSUPPORTED");
    assert_eq!(ErrorCode::CameraFailed.to_string(), "CAMERA_FAILED");
    assert_eq!(
        serde_json::to_string(&ErrorCode::MediaLoadError).unwrap(),
        "\"MEDIA_LOAD_ERROR\""
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ArError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
