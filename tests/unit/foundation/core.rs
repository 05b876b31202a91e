use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    let fps = Fps::new(30000, 1001).unwrap();
    assert!((fps.as_f64() - 29.97).abs() < 0.01);
}

#[test]
fn viewport_aspect_and_len() {
    let vp = Viewport::new(64, 32).unwrap();
    assert_eq!(vp.aspect(), 2.0);
    assert_eq!(vp.rgba_len(), 64 * 32 * 4);
    assert!(Viewport::new(0, 10).is_err());
}

#[test]
fn vec3_degrees_to_radians() {
    let r = Vec3::new(180.0, 90.0, 0.0).to_radians();
    assert!((r.x - std::f64::consts::PI).abs() < 1e-12);
    assert!((r.y - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    assert_eq!(r.z, 0.0);
}

#[test]
fn facing_mode_defaults_to_environment() {
    assert_eq!(FacingMode::default(), FacingMode::Environment);
    let parsed: FacingMode = serde_json::from_str("\"user\"").unwrap();
    assert_eq!(parsed, FacingMode::User);
}
