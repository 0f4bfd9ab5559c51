//! Error handling tests for all modules


use cornea_tracker::{
    config::Config,
    cornea_reader::CorneaReader,
    cursor_control::{CursorPosition, FixedCursor},
    eye_strip::{resize_aspect_ratio, resize_exact, scaled_dimensions},
    features::EyeMetrics,
    landmarks::{LandmarkDetector, MeshPoints, NormalizedPoint, PixelPoint},
    session::{load_sample, SessionStore},
    utils::{bounding_box, safe_cast::*},
    Error, Result,
};
use image::{GrayImage, RgbImage};
use test_helpers::{test_frame, FRAME_HEIGHT, FRAME_WIDTH};

struct FailingDetector;

impl LandmarkDetector for FailingDetector {
    fn detect(&mut self, _rgb: &RgbImage) -> Result<Option<Vec<NormalizedPoint>>> {
        Err(Error::ModelOutputError("inference failed".to_string()))
    }
}

struct FailingCursor;

impl CursorPosition for FailingCursor {
    fn position(&self) -> Result<(i32, i32)> {
        Err(Error::CursorControl("no display".to_string()))
    }
}

#[test]
fn test_detector_errors_propagate() {
    let mut reader = CorneaReader::new(Box::new(FailingDetector), Box::new(FixedCursor::default()), SessionStore::new("unused"));
    let result = reader.read_eyes(&test_frame(FRAME_WIDTH, FRAME_HEIGHT, 0), None);
    assert!(matches!(result, Err(Error::ModelOutputError(_))));
}

#[test]
fn test_cursor_errors_propagate_only_when_recording() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = CorneaReader::new(
        Box::new(test_helpers::ScriptedDetector::repeating(2)),
        Box::new(FailingCursor),
        SessionStore::new(dir.path()),
    );
    let frame = test_frame(FRAME_WIDTH, FRAME_HEIGHT, 0);

    assert!(reader.read_eyes(&frame, None).is_ok());
    assert!(matches!(
        reader.read_eyes(&frame, Some("trial")),
        Err(Error::CursorControl(_))
    ));
}

#[test]
fn test_short_landmark_list_is_rejected() {
    let short = vec![NormalizedPoint::new(0.5, 0.5); 100];
    let mut reader = CorneaReader::new(
        Box::new(test_helpers::ScriptedDetector::new(vec![Some(short)])),
        Box::new(FixedCursor::default()),
        SessionStore::new("unused"),
    );

    let result = reader.read_eyes(&test_frame(FRAME_WIDTH, FRAME_HEIGHT, 0), None);
    assert!(matches!(result, Err(Error::ModelOutputError(_))));
}

#[test]
fn test_mesh_index_out_of_range() {
    let mesh = MeshPoints::from_pixels(vec![PixelPoint::new(1, 1); 10]);
    assert!(mesh.get(10).is_err());
    assert!(EyeMetrics::from_mesh(&mesh).is_err());
}

#[test]
fn test_eye_metrics_wrong_length() {
    assert!(matches!(EyeMetrics::from_slice(&[1.0; 32]), Err(Error::InvalidInput(_))));
}

#[test]
fn test_empty_crop_errors() {
    assert!(bounding_box(&[], 100, 100).is_err());
    // Degenerate box: all points identical
    assert!(bounding_box(&[PixelPoint::new(5, 5), PixelPoint::new(5, 5)], 100, 100).is_err());
    // Entirely outside the frame
    assert!(bounding_box(&[PixelPoint::new(200, 200), PixelPoint::new(300, 300)], 100, 100).is_err());
}

#[test]
fn test_resize_empty_image() {
    let empty = GrayImage::new(0, 0);
    assert!(resize_aspect_ratio(&empty).is_err());
    assert!(resize_exact(&empty).is_err());
}

#[test]
fn test_scaled_dimensions_stay_in_range() {
    let (h, w) = scaled_dimensions(1, 10_000).unwrap();
    assert!((1..=40).contains(&h));
    assert!((1..=120).contains(&w));
}

#[test]
fn test_safe_cast_rejects_non_finite() {
    assert!(f32_to_i32(f32::NAN).is_err());
    assert!(f64_to_i64(f64::INFINITY).is_err());
    assert!(normalized_to_pixel(f32::NAN, 640).is_err());
    assert!(u32_to_i32(u32::MAX).is_err());
}

#[test]
fn test_malformed_sample_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("0.npz");
    std::fs::write(&path, b"not a zip archive").unwrap();

    assert!(load_sample(&path).is_err());
    assert!(matches!(load_sample(&dir.path().join("missing.npz")), Err(Error::Io(_))));
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "capture: [not, a, map]").unwrap();

    assert!(matches!(Config::from_file(&path), Err(Error::ConfigError(_))));
    assert!(matches!(Config::from_file(dir.path().join("absent.yaml")), Err(Error::Io(_))));
}
