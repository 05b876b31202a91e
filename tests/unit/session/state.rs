use super::*;

fn failed(code: ErrorCode) -> SessionEvent {
    SessionEvent::Failed {
        code,
        message: "boom".to_string(),
    }
}

#[test]
fn happy_path_and_scan_round_trip() {
    let s = next_state(&SessionState::CheckingCompatibility, &SessionEvent::CompatibilityPassed)
        .unwrap();
    assert_eq!(s, SessionState::Ready);
    let s = next_state(&s, &SessionEvent::ScanRequested).unwrap();
    assert_eq!(s, SessionState::Scanning);
    assert_eq!(
        next_state(&s, &SessionEvent::ScanCancelled),
        Some(SessionState::Ready)
    );
    assert_eq!(
        next_state(&s, &SessionEvent::ScanCompleted),
        Some(SessionState::Ready)
    );
}

#[test]
fn any_live_state_fails_into_error() {
    for s in [
        SessionState::CheckingCompatibility,
        SessionState::Ready,
        SessionState::Scanning,
    ] {
        let next = next_state(&s, &failed(ErrorCode::CameraFailed)).unwrap();
        assert_eq!(next.error_code(), Some(ErrorCode::CameraFailed));
    }
}

#[test]
fn error_is_terminal_except_for_retry() {
    let err = SessionState::Error {
        code: ErrorCode::MediaLoadError,
        message: "x".into(),
    };
    for e in [
        SessionEvent::CompatibilityPassed,
        SessionEvent::ScanRequested,
        SessionEvent::ScanCompleted,
        failed(ErrorCode::ArUnsupported),
    ] {
        assert_eq!(next_state(&err, &e), None);
    }
    assert_eq!(
        next_state(&err, &SessionEvent::Retry),
        Some(SessionState::CheckingCompatibility)
    );
}

#[test]
fn out_of_place_events_are_ignored() {
    assert_eq!(
        next_state(&SessionState::CheckingCompatibility, &SessionEvent::ScanRequested),
        None
    );
    assert_eq!(next_state(&SessionState::Ready, &SessionEvent::Retry), None);
    assert_eq!(
        next_state(&SessionState::Scanning, &SessionEvent::ScanRequested),
        None
    );
}

#[test]
fn serializes_with_kebab_names() {
    let json = serde_json::to_string(&SessionState::CheckingCompatibility).unwrap();
    assert_eq!(json, r#"{"state":"checking-compatibility"}"#);
    let json = serde_json::to_value(SessionState::Error {
        code: ErrorCode::ArUnsupported,
        message: "no gpu".into(),
    })
    .unwrap();
    assert_eq!(json["code"], "AR_UNSUPPORTED");
    assert_eq!(SessionState::Scanning.to_string(), "scanning");
}
