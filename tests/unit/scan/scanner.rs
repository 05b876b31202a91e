use std::collections::VecDeque;

use super::*;
use crate::camera::memory::MemoryCamera;

struct Scripted(VecDeque<Vec<String>>);

impl CodeDecoder for Scripted {
    fn decode(&mut self, _gray: &image::GrayImage) -> Vec<String> {
        self.0.pop_front().unwrap_or_default()
    }
}

fn scripted(codes: &[&[&str]]) -> Box<dyn CodeDecoder> {
    Box::new(Scripted(
        codes
            .iter()
            .map(|c| c.iter().map(|s| s.to_string()).collect())
            .collect(),
    ))
}

#[test]
fn stops_and_releases_on_first_campaign_code() {
    let mut cam = MemoryCamera::new(vec![CameraFrame::solid(8, 8, [255; 4])]);
    let counters = cam.counters();
    let mut scanner = CodeScanner::start(
        &mut cam,
        &CameraRequest::default(),
        scripted(&[
            &[r#"{"foo":"bar"}"#],
            &[],
            &["hello", r#"{"videoUrl":"https://x/v.mp4","markerUrl":"https://x/m.png"}"#],
        ]),
    )
    .unwrap();
    assert_eq!(counters.live_streams(), 1);

    assert_eq!(scanner.tick().unwrap(), ScanTick::Pending);
    assert_eq!(scanner.tick().unwrap(), ScanTick::Pending);
    let ScanTick::Found(p) = scanner.tick().unwrap() else {
        panic!("expected a payload");
    };
    assert_eq!(p.marker_url, "https://x/m.png");
    assert!(!scanner.is_active());
    assert_eq!(counters.live_streams(), 0);
    assert_eq!(scanner.codes_discarded(), 2);
    assert_eq!(scanner.frames_scanned(), 3);

    assert_eq!(scanner.tick().unwrap(), ScanTick::Stopped);
    assert_eq!(scanner.stop(), 0);
    assert_eq!(counters.tracks_stopped(), 1);
}

#[test]
fn dropping_the_scanner_releases_its_stream() {
    let mut cam = MemoryCamera::new(vec![CameraFrame::solid(4, 4, [0; 4])]);
    let counters = cam.counters();
    {
        let _scanner =
            CodeScanner::start(&mut cam, &CameraRequest::default(), scripted(&[])).unwrap();
        assert_eq!(counters.live_streams(), 1);
    }
    assert_eq!(counters.live_streams(), 0);
}

#[test]
fn camera_failures_propagate() {
    let mut cam = MemoryCamera::failing(CameraError::PermissionDenied("denied".into()));
    let err = CodeScanner::start(&mut cam, &CameraRequest::default(), Box::new(RqrrDecoder))
        .unwrap_err();
    assert!(matches!(err, CameraError::PermissionDenied(_)));
}

#[test]
fn gray_buffer_follows_frame_luma() {
    let mut cam = MemoryCamera::new(vec![CameraFrame::solid(4, 4, [0; 4])]);
    let mut scanner =
        CodeScanner::start(&mut cam, &CameraRequest::default(), scripted(&[])).unwrap();
    scanner.scan_frame(&CameraFrame::solid(6, 2, [255, 255, 255, 255]));
    assert_eq!(scanner.gray.dimensions(), (6, 2));
    assert!(scanner.gray.pixels().all(|p| p.0[0] == 255));
}

#[test]
fn rqrr_finds_nothing_in_a_blank_frame() {
    let gray = image::GrayImage::from_pixel(64, 64, image::Luma([255]));
    assert!(RqrrDecoder.decode(&gray).is_empty());
}
