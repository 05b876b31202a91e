use super::*;
use crate::foundation::error::ErrorCode;

fn quadrant_pattern() -> image::DynamicImage {
    let img = RgbaImage::from_fn(32, 32, |x, y| {
        let v = match (x < 16, y < 16) {
            (true, true) => 255,
            (false, true) => 40,
            (true, false) => 120,
            (false, false) => 200,
        };
        image::Rgba([v, v, v, 255])
    });
    image::DynamicImage::ImageRgba8(img)
}

#[test]
fn rotations_are_quarter_turns() {
    let cells: Vec<f64> = (0..4).map(f64::from).collect();
    // [0 1; 2 3] turned clockwise is [2 0; 3 1].
    assert_eq!(rotate_cw(&cells, 2), vec![2.0, 0.0, 3.0, 1.0]);

    let desc = MarkerDescriptor::from_image("quad.png", &quadrant_pattern()).unwrap();
    let back = rotate_cw(
        &rotate_cw(&rotate_cw(&desc.rotations[1].0, TEMPLATE_SIZE), TEMPLATE_SIZE),
        TEMPLATE_SIZE,
    );
    for (a, b) in back.iter().zip(&desc.rotations[0].0) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn template_matches_itself_best() {
    let desc = MarkerDescriptor::from_image("quad.png", &quadrant_pattern()).unwrap();
    let raw: Vec<f64> = desc.rotations[0].0.iter().map(|v| v * 100.0 + 50.0).collect();
    assert!(desc.rotations[0].ncc(&raw) > 0.999);
    assert!(desc.rotations[1].ncc(&raw) < 0.5);
    assert!(desc.rotations[2].ncc(&raw) < 0.9);
}

#[test]
fn flat_images_are_rejected_as_init_failures() {
    let flat = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        8,
        8,
        image::Rgba([90, 90, 90, 255]),
    ));
    let err = MarkerDescriptor::from_image("flat.png", &flat).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ArInitFailed);

    let err = MarkerDescriptor::from_bytes("junk.png", b"not an image").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ArInitFailed);
}

#[test]
fn printable_marker_has_black_border() {
    let desc = MarkerDescriptor::from_image("quad.png", &quadrant_pattern()).unwrap();
    let print = desc.printable(100);
    assert_eq!(print.dimensions(), (100, 100));
    assert_eq!(print.get_pixel(5, 5).0, [0, 0, 0, 255]);
    assert_eq!(print.get_pixel(95, 50).0, [0, 0, 0, 255]);
    // Top-left quadrant of the pattern is white.
    assert!(print.get_pixel(30, 30).0[0] > 200);
}

#[test]
fn loaders_report_missing_markers_as_init_failures() {
    let err = DefaultMarkerLoader::default()
        .load("/no/such/marker.png")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ArInitFailed);

    let desc = MarkerDescriptor::from_image("quad.png", &quadrant_pattern()).unwrap();
    let loader = StaticMarkerLoader::new().with("m.png", desc);
    assert_eq!(loader.load("m.png").unwrap().source(), "quad.png");
    assert!(loader.load("other.png").is_err());
}
