use super::*;

#[test]
fn stderr_permission_errors_are_classified() {
    let err = classify_ffmpeg_failure("/dev/video0", "/dev/video0: Permission denied");
    assert!(matches!(err, CameraError::PermissionDenied(_)));

    let err = classify_ffmpeg_failure("/dev/video0", "Device or resource busy");
    assert!(matches!(err, CameraError::DeviceUnavailable(_)));
}

#[test]
fn missing_replay_file_is_unavailable() {
    let mut cam = FfmpegCamera::new(CameraInput::File(PathBuf::from(
        "/definitely/not/here/replay.mp4",
    )));
    let err = cam.acquire(&CameraRequest::default()).unwrap_err();
    assert!(matches!(
        err,
        CameraError::DeviceUnavailable(_) | CameraError::Unsupported(_)
    ));
}

#[test]
fn missing_device_node_is_not_a_permission_error() {
    let err = precheck_input(&CameraInput::Device("/dev/arcast-no-such-video".into())).unwrap_err();
    assert!(matches!(err, CameraError::DeviceUnavailable(_)));
}
