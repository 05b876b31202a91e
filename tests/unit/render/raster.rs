use super::*;

fn px(buf: &[u8], w: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * w + x) * 4) as usize;
    [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]
}

#[test]
fn cover_fit_crops_the_long_side() {
    let fit = CoverFit::new(640, 480, Viewport::new(480, 640).unwrap());
    assert!((fit.scale - 640.0 / 480.0).abs() < 1e-12);
    let c = fit.to_dst(Point::new(320.0, 240.0));
    assert!((c.x - 240.0).abs() < 1e-9 && (c.y - 320.0).abs() < 1e-9);
}

#[test]
fn background_is_cover_fitted_and_opaque() {
    // Left half red, right half blue, half-transparent.
    let mut frame = CameraFrame::solid(4, 2, [255, 0, 0, 10]);
    for y in 0..2 {
        for x in 2..4 {
            let i = (y * 4 + x) * 4;
            frame.data[i..i + 4].copy_from_slice(&[0, 0, 255, 10]);
        }
    }
    let vp = Viewport::new(4, 4).unwrap();
    let mut dst = vec![0u8; vp.rgba_len()];
    let mut painter = BackgroundPainter::default();
    painter.draw(&mut dst, vp, &frame).unwrap();
    // Scale 2: the viewport shows source columns 1..3.
    assert_eq!(px(&dst, 4, 0, 0), [255, 0, 0, 255]);
    assert_eq!(px(&dst, 4, 1, 3), [255, 0, 0, 255]);
    assert_eq!(px(&dst, 4, 2, 0), [0, 0, 255, 255]);
    assert_eq!(px(&dst, 4, 3, 3), [0, 0, 255, 255]);
}

#[test]
fn cover_fit_affine_matches_point_mapping() {
    let fit = CoverFit::new(640, 480, Viewport::new(300, 400).unwrap());
    let p = Point::new(17.0, 311.0);
    let a = fit.to_affine() * vello_cpu::kurbo::Point::new(p.x, p.y);
    let q = fit.to_dst(p);
    assert!((a.x - q.x).abs() < 1e-9 && (a.y - q.y).abs() < 1e-9);
}

#[test]
fn background_painter_follows_viewport_changes() {
    let frame = CameraFrame::solid(8, 8, [10, 20, 30, 255]);
    let mut painter = BackgroundPainter::default();

    let small = Viewport::new(4, 4).unwrap();
    let mut dst = vec![0u8; small.rgba_len()];
    painter.draw(&mut dst, small, &frame).unwrap();
    assert!(dst.chunks_exact(4).all(|p| p == [10, 20, 30, 255]));

    let wide = Viewport::new(12, 6).unwrap();
    let mut dst = vec![0u8; wide.rgba_len()];
    painter.draw(&mut dst, wide, &frame).unwrap();
    assert!(dst.chunks_exact(4).all(|p| p == [10, 20, 30, 255]));

    // A frame without pixels clears instead of leaving stale content.
    painter.draw(&mut dst, wide, &CameraFrame::solid(0, 0, [0; 4])).unwrap();
    assert!(dst.iter().all(|&b| b == 0));

    let mut short = vec![0u8; 8];
    assert!(painter.draw(&mut short, wide, &frame).is_err());
}

#[test]
fn axis_aligned_quad_covers_its_rectangle() {
    let vp = Viewport::new(10, 10).unwrap();
    let mut dst = vec![0u8; vp.rgba_len()];
    let tex = TextureData {
        width: 1,
        height: 1,
        data: vec![0, 255, 0, 255],
    };
    let quad = [
        Point::new(2.0, 2.0),
        Point::new(6.0, 2.0),
        Point::new(6.0, 6.0),
        Point::new(2.0, 6.0),
    ];
    assert_eq!(draw_textured_quad(&mut dst, vp, &quad, &tex), 16);
    assert_eq!(px(&dst, 10, 2, 2), [0, 255, 0, 255]);
    assert_eq!(px(&dst, 10, 5, 5), [0, 255, 0, 255]);
    assert_eq!(px(&dst, 10, 1, 1), [0, 0, 0, 0]);
    assert_eq!(px(&dst, 10, 6, 6), [0, 0, 0, 0]);
}

#[test]
fn texture_orientation_follows_corner_order() {
    let vp = Viewport::new(8, 8).unwrap();
    let mut dst = vec![0u8; vp.rgba_len()];
    // 2x1 texture: left white, right black.
    let tex = TextureData {
        width: 2,
        height: 1,
        data: vec![255, 255, 255, 255, 0, 0, 0, 255],
    };
    // Mirrored horizontally: uv (0,0) lands at the right edge.
    let quad = [
        Point::new(8.0, 0.0),
        Point::new(0.0, 0.0),
        Point::new(0.0, 8.0),
        Point::new(8.0, 8.0),
    ];
    draw_textured_quad(&mut dst, vp, &quad, &tex);
    assert_eq!(px(&dst, 8, 7, 4), [255, 255, 255, 255]);
    assert_eq!(px(&dst, 8, 0, 4), [0, 0, 0, 255]);
}

#[test]
fn offscreen_or_empty_inputs_draw_nothing() {
    let vp = Viewport::new(4, 4).unwrap();
    let mut dst = vec![0u8; vp.rgba_len()];
    let tex = TextureData {
        width: 1,
        height: 1,
        data: vec![9, 9, 9, 255],
    };
    let far = [
        Point::new(10.0, 10.0),
        Point::new(12.0, 10.0),
        Point::new(12.0, 12.0),
        Point::new(10.0, 12.0),
    ];
    assert_eq!(draw_textured_quad(&mut dst, vp, &far, &tex), 0);
    let near = [
        Point::new(0.0, 0.0),
        Point::new(4.0, 0.0),
        Point::new(4.0, 4.0),
        Point::new(0.0, 4.0),
    ];
    assert_eq!(draw_textured_quad(&mut dst, vp, &near, &TextureData::default()), 0);
    assert!(dst.iter().all(|&b| b == 0));
}
