use super::*;
use crate::foundation::error::ErrorCode;

#[test]
fn ledger_tracks_allocations_and_double_release() {
    let mut dev = SoftwareDevice::new();
    let ledger = dev.ledger().clone();
    let tex = dev.allocate(ResourceKind::Texture, 64).unwrap();
    let geo = dev.allocate(ResourceKind::Geometry, 16).unwrap();
    assert_eq!(ledger.live(), 2);
    assert_eq!(ledger.live_bytes(), 80);
    assert_eq!(ledger.live_of(ResourceKind::Texture), 1);

    assert!(dev.release(tex));
    assert!(!dev.release(tex));
    assert!(dev.release(geo));
    assert_eq!(ledger.live(), 0);
    assert_eq!((ledger.created(), ledger.released()), (2, 2));
}

#[test]
fn unavailable_device_reports_unsupported() {
    let mut dev = SoftwareDevice::unavailable("no WebGL");
    assert_eq!(dev.probe().unwrap_err().code(), ErrorCode::ArUnsupported);
    assert!(dev.allocate(ResourceKind::RenderTarget, 1).is_err());
    assert_eq!(dev.ledger().live(), 0);
}
