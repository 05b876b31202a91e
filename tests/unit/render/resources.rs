use super::*;
use crate::render::device::SoftwareDevice;

fn close(a: Point3<f64>, b: [f64; 3]) -> bool {
    (a.x - b[0]).abs() < 1e-9 && (a.y - b[1]).abs() < 1e-9 && (a.z - b[2]).abs() < 1e-9
}

#[test]
fn default_plane_is_centered_on_anchor() {
    let t = MeshTransform::from_metadata(&VideoMetadata::new("v.mp4"));
    let c = t.world_corners(&PoseTransform::at(Vec3::new(0.0, 0.0, -3.0)));
    assert!(close(c[0], [-0.8, 0.45, -3.0]));
    assert!(close(c[2], [0.8, -0.45, -3.0]));
}

#[test]
fn metadata_offset_and_rotation_apply_in_anchor_space() {
    let mut meta = VideoMetadata::new("v.mp4");
    meta.position = Vec3::new(0.0, 1.0, 0.0);
    meta.rotation = Some(Vec3::new(0.0, 0.0, 90.0));
    meta.width = 2.0;
    meta.height = 1.0;
    let t = MeshTransform::from_metadata(&meta);
    let c = t.world_corners(&PoseTransform::at(Vec3::ZERO));
    // Top-left (-1, 0.5) rotated a quarter turn counter-clockwise becomes (-0.5, -1).
    assert!(close(c[0], [-0.5, 0.0, 0.0]));
    assert!(close(c[1], [-0.5, 2.0, 0.0]));
}

#[test]
fn multi_axis_rotation_turns_z_then_y_then_x() {
    let mut meta = VideoMetadata::new("v.mp4");
    meta.rotation = Some(Vec3::new(90.0, 90.0, 0.0));
    meta.width = 2.0;
    meta.height = 1.0;
    let t = MeshTransform::from_metadata(&meta);
    let m = t.to_matrix();
    let x = m.transform_vector(&Vector3::new(1.0, 0.0, 0.0)) / 2.0;
    assert!(close(Point3::from(x), [0.0, 1.0, 0.0]));

    let c = t.world_corners(&PoseTransform::at(Vec3::ZERO));
    assert!(close(c[0], [0.0, -1.0, 0.5]));
    assert!(close(c[1], [0.0, 1.0, 0.5]));
}

#[test]
fn texture_upload_reallocates_on_resize_and_dispose_frees_all() {
    let mut dev = SoftwareDevice::new();
    let ledger = dev.ledger().clone();
    let t = MeshTransform::from_metadata(&VideoMetadata::new("v.mp4"));
    let mut mesh = VideoMesh::create(&mut dev, t).unwrap();
    assert_eq!(ledger.live(), 2);

    let frame = |w: u32, h: u32| VideoFrame {
        width: w,
        height: h,
        data: vec![255, 0, 0, 128].repeat((w * h) as usize),
    };
    mesh.upload(&mut dev, &frame(2, 2)).unwrap();
    mesh.upload(&mut dev, &frame(2, 2)).unwrap();
    assert_eq!(ledger.live_of(ResourceKind::Texture), 1);
    assert_eq!(mesh.texture().data[..4], [128, 0, 0, 128]);

    mesh.upload(&mut dev, &frame(4, 2)).unwrap();
    assert_eq!(ledger.live_of(ResourceKind::Texture), 1);
    assert_eq!(ledger.live_bytes(), PLANE_GEOMETRY_BYTES + MATERIAL_BYTES + 32);

    assert_eq!(mesh.dispose(&mut dev), 3);
    assert_eq!(ledger.live(), 0);
}

#[test]
fn bilinear_sampling_blends_neighbors() {
    let tex = TextureData {
        width: 2,
        height: 1,
        data: vec![0, 0, 0, 255, 200, 100, 0, 255],
    };
    assert_eq!(tex.sample_bilinear(0.0, 0.5), [0, 0, 0, 255]);
    assert_eq!(tex.sample_bilinear(0.5, 0.5), [100, 50, 0, 255]);
    assert_eq!(tex.sample_bilinear(1.0, 0.5), [200, 100, 0, 255]);
}
