use super::*;
use crate::foundation::core::Vec3;
use crate::foundation::error::ErrorCode;
use crate::render::device::{ResourceKind, SoftwareDevice};

const GRAY: [u8; 4] = [40, 40, 40, 255];

fn compositor(vp: Viewport) -> VideoCompositor {
    VideoCompositor::new(Box::new(SoftwareDevice::new()), vp).unwrap()
}

fn red_video() -> VideoFrame {
    VideoFrame {
        width: 4,
        height: 4,
        data: [255, 0, 0, 255].repeat(16),
    }
}

#[test]
fn unavailable_device_fails_before_allocating() {
    let err = VideoCompositor::new(
        Box::new(SoftwareDevice::unavailable("no 3d acceleration")),
        Viewport::new(64, 48).unwrap(),
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ArUnsupported);
}

#[test]
fn plane_is_drawn_only_with_an_anchor() {
    let vp = Viewport::new(64, 48).unwrap();
    let mut comp = compositor(vp);
    comp.attach_video(&VideoMetadata::new("v.mp4")).unwrap();
    let cam = CameraFrame::solid(64, 48, GRAY);

    let bg = comp.render(&cam, None, Some(&red_video())).unwrap();
    assert_eq!(bg.pixel(32, 24), Some(GRAY));

    let anchor = PoseTransform::at(Vec3::new(0.0, 0.0, -3.0));
    let out = comp.render(&cam, Some(&anchor), None).unwrap();
    assert_eq!(out.pixel(32, 24), Some([255, 0, 0, 255]));
    assert_eq!(out.pixel(1, 1), Some(GRAY));
    assert!(out.premultiplied);
    assert_eq!(comp.frames_rendered(), 2);
}

#[test]
fn plane_behind_the_camera_is_skipped() {
    let mut comp = compositor(Viewport::new(32, 32).unwrap());
    comp.attach_video(&VideoMetadata::new("v.mp4")).unwrap();
    let anchor = PoseTransform::at(Vec3::new(0.0, 0.0, 3.0));
    assert!(comp.projected_quad(&anchor).is_none());
    let out = comp
        .render(&CameraFrame::solid(32, 32, GRAY), Some(&anchor), Some(&red_video()))
        .unwrap();
    assert!(out.data.chunks_exact(4).all(|px| px == GRAY));
}

#[test]
fn create_dispose_cycles_leave_no_live_handles() {
    let dev = SoftwareDevice::new();
    let ledger = dev.ledger().clone();
    for _ in 0..3 {
        let vp = Viewport::new(32, 24).unwrap();
        let mut comp = VideoCompositor::new(Box::new(dev.clone()), vp).unwrap();
        comp.attach_video(&VideoMetadata::new("v.mp4")).unwrap();
        comp.render(
            &CameraFrame::solid(32, 24, GRAY),
            Some(&PoseTransform::at(Vec3::new(0.0, 0.0, -2.0))),
            Some(&red_video()),
        )
        .unwrap();
        assert_eq!(ledger.live(), 4);
        assert!(comp.teardown());
        assert!(!comp.teardown());
        assert_eq!(ledger.live(), 0);
    }
    assert_eq!(ledger.created(), ledger.released());
}

#[test]
fn dropping_releases_everything() {
    let dev = SoftwareDevice::new();
    let ledger = dev.ledger().clone();
    {
        let vp = Viewport::new(16, 16).unwrap();
        let mut comp = VideoCompositor::new(Box::new(dev), vp).unwrap();
        comp.attach_video(&VideoMetadata::new("v.mp4")).unwrap();
    }
    assert_eq!(ledger.live(), 0);
}

#[test]
fn reattach_replaces_the_previous_plane() {
    let mut comp = compositor(Viewport::new(16, 16).unwrap());
    let ledger = comp.ledger();
    comp.attach_video(&VideoMetadata::new("a.mp4")).unwrap();
    comp.attach_video(&VideoMetadata::new("b.mp4")).unwrap();
    assert_eq!(comp.scene().len(), 1);
    assert_eq!(ledger.live_of(ResourceKind::Geometry), 1);
    assert_eq!(ledger.live_of(ResourceKind::Material), 1);
}

#[test]
fn resize_swaps_the_render_target() {
    let mut comp = compositor(Viewport::new(64, 48).unwrap());
    let ledger = comp.ledger();
    comp.resize(Viewport::new(48, 64).unwrap()).unwrap();
    assert_eq!(ledger.live_of(ResourceKind::RenderTarget), 1);
    assert_eq!(ledger.released(), 1);
    assert_eq!(ledger.live_bytes(), 48 * 64 * 4);
    assert_eq!(comp.viewport(), Viewport::new(48, 64).unwrap());

    let out = comp.render(&CameraFrame::solid(8, 8, GRAY), None, None).unwrap();
    assert_eq!((out.width, out.height), (48, 64));
    assert!(comp.resize(Viewport { width: 0, height: 10 }).is_err());
}

#[test]
fn frames_are_composited_into_the_render_target() {
    let mut comp = compositor(Viewport::new(16, 8).unwrap());
    let ledger = comp.ledger();
    let first = comp
        .render(&CameraFrame::solid(16, 8, GRAY), None, None)
        .unwrap()
        .data
        .as_ptr();
    let second = comp
        .render(&CameraFrame::solid(16, 8, [1, 2, 3, 255]), None, None)
        .unwrap();
    assert_eq!(second.data.as_ptr(), first);
    assert_eq!(second.pixel(15, 7), Some([1, 2, 3, 255]));
    assert_eq!(ledger.created(), 1);

    comp.resize(Viewport::new(8, 16).unwrap()).unwrap();
    let out = comp.render(&CameraFrame::solid(16, 8, GRAY), None, None).unwrap();
    assert_eq!((out.width, out.height), (8, 16));
    assert_eq!(out.data.len(), 8 * 16 * 4);
    assert_eq!(ledger.live_of(ResourceKind::RenderTarget), 1);
    assert_eq!(ledger.live_bytes(), 8 * 16 * 4);
}

#[test]
fn render_after_teardown_is_rejected() {
    let mut comp = compositor(Viewport::new(8, 8).unwrap());
    comp.teardown();
    assert!(comp.render(&CameraFrame::solid(8, 8, GRAY), None, None).is_err());
    assert!(comp.attach_video(&VideoMetadata::new("v.mp4")).is_err());
}

#[test]
fn debug_quad_is_outlined_in_viewport_space() {
    let mut comp = compositor(Viewport::new(64, 64).unwrap());
    // Camera is 32x32, so the cover fit doubles every coordinate.
    comp.set_debug_quad(Some([
        Point::new(8.0, 8.0),
        Point::new(24.0, 8.0),
        Point::new(24.0, 24.0),
        Point::new(8.0, 24.0),
    ]));
    let out = comp.render(&CameraFrame::solid(32, 32, GRAY), None, None).unwrap();
    assert_ne!(out.pixel(32, 16), Some(GRAY));
    assert_eq!(out.pixel(32, 32), Some(GRAY));
}
