use super::*;
use image::{Rgba, RgbaImage};

fn quadrant_marker() -> MarkerDescriptor {
    let img = RgbaImage::from_fn(32, 32, |x, y| {
        let v = match (x < 16, y < 16) {
            (true, true) => 255,
            (false, true) => 40,
            (true, false) => 120,
            (false, false) => 200,
        };
        Rgba([v, v, v, 255])
    });
    MarkerDescriptor::from_image("quad.png", &image::DynamicImage::ImageRgba8(img)).unwrap()
}

fn frame_with(print: &RgbaImage, x: i64, y: i64) -> CameraFrame {
    let mut canvas = RgbaImage::from_pixel(320, 240, Rgba([250, 250, 250, 255]));
    image::imageops::overlay(&mut canvas, print, x, y);
    CameraFrame::from_image(&canvas)
}

#[test]
fn finds_upright_marker_and_its_pose() {
    let desc = quadrant_marker();
    let frame = frame_with(&desc.printable(120), 100, 60);
    let mut tracker = PatternTracker::new(desc, DetectorOptions::default());

    let Detection::Found(hit) = tracker.detect(&frame) else {
        panic!("marker not found");
    };
    assert!(hit.confidence > 0.8, "confidence {}", hit.confidence);
    assert_eq!(hit.corners[0], Point::new(100.0, 60.0));
    assert_eq!(hit.corners[2], Point::new(220.0, 180.0));

    let k = CameraIntrinsics::for_display(320, 240, 320, 240, RENDER_FOV_DEG);
    assert!((hit.pose.position.z + k.focal / 120.0).abs() < 1e-6);
    assert!(hit.pose.orientation.angle() < 1e-6);
}

#[test]
fn rotated_marker_reorders_corners() {
    let desc = quadrant_marker();
    let print = image::imageops::rotate90(&desc.printable(120));
    let frame = frame_with(&print, 100, 60);
    let mut tracker = PatternTracker::new(desc, DetectorOptions::default());

    let Detection::Found(hit) = tracker.detect(&frame) else {
        panic!("marker not found");
    };
    // Marker's own top-left now sits at the image's top-right.
    assert_eq!(hit.corners[0], Point::new(220.0, 60.0));
    assert!((hit.pose.orientation.angle() - std::f64::consts::FRAC_PI_2).abs() < 1e-6);
}

#[test]
fn empty_and_patternless_frames_are_not_found() {
    let mut tracker = PatternTracker::new(quadrant_marker(), DetectorOptions::default());
    let blank = CameraFrame::solid(320, 240, [250, 250, 250, 255]);
    assert_eq!(tracker.detect(&blank), Detection::NotFound);

    let hollow = RgbaImage::from_fn(120, 120, |x, y| {
        let inner = (30..90).contains(&x) && (30..90).contains(&y);
        if inner {
            Rgba([250, 250, 250, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    assert_eq!(tracker.detect(&frame_with(&hollow, 100, 60)), Detection::NotFound);
}

#[test]
fn marker_cut_by_frame_edge_is_not_found() {
    let desc = quadrant_marker();
    let frame = frame_with(&desc.printable(120), 250, 60);
    let mut tracker = PatternTracker::new(desc, DetectorOptions::default());
    assert!(!tracker.detect(&frame).is_found());
}

#[test]
fn viewport_changes_depth_scale() {
    let desc = quadrant_marker();
    let frame = frame_with(&desc.printable(120), 100, 60);
    let mut tracker = PatternTracker::new(desc, DetectorOptions::default());
    let near = tracker.detect(&frame).pose().copied().unwrap();

    tracker.set_viewport(Viewport {
        width: 640,
        height: 240,
    });
    let far = tracker.detect(&frame).pose().copied().unwrap();
    assert!(far.position.z.abs() < near.position.z.abs());
}

#[test]
fn detection_serializes_with_state_tag() {
    let json = serde_json::to_value(Detection::NotFound).unwrap();
    assert_eq!(json["state"], "not_found");
    let json = serde_json::to_value(Detection::found(PoseTransform::at(
        crate::foundation::core::Vec3::new(0.0, 0.0, -2.0),
    )))
    .unwrap();
    assert_eq!(json["state"], "found");
    assert_eq!(json["pose"]["position"]["z"], -2.0);
}
