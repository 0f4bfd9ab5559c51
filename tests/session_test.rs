//! Session recording, preprocessing and export


use cornea_tracker::{
    constants::{EYE_STRIP_HEIGHT, EYE_STRIP_WIDTH, NUM_EYE_METRICS},
    cornea_reader::CorneaReader,
    cursor_control::FixedCursor,
    session::{load_sample, SessionStore, TRAINING_MATRIX_COLUMNS},
    trainer::load_matrix,
};
use std::collections::BTreeSet;
use test_helpers::{test_frame, ScriptedDetector, FRAME_HEIGHT, FRAME_WIDTH};

const SESSION: &str = "trial3";

fn record(store: &SessionStore, script: Vec<bool>) -> usize {
    let frames = script.len();
    let detector = ScriptedDetector::new(
        script
            .into_iter()
            .map(|face| face.then(test_helpers::synthetic_face))
            .collect(),
    );
    let mut reader = CorneaReader::new(Box::new(detector), Box::new(FixedCursor::new(640, 360)), store.clone());

    let frame = test_frame(FRAME_WIDTH, FRAME_HEIGHT, 128);
    (0..frames)
        .filter(|_| reader.read_eyes(&frame, Some(SESSION)).unwrap().0.is_some())
        .count()
}

#[test]
fn test_n_captures_produce_n_numbered_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());

    let captured = record(&store, vec![true; 5]);
    assert_eq!(captured, 5);

    let names: BTreeSet<String> = std::fs::read_dir(store.session_dir(SESSION))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    let expected: BTreeSet<String> = (0..5).map(|i| format!("{i}.npz")).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_frames_without_face_are_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());

    let captured = record(&store, vec![true, false, true, false]);

    assert_eq!(captured, 2);
    assert_eq!(store.sample_paths(SESSION).unwrap().len(), 2);
}

#[test]
fn test_no_session_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    let mut reader = CorneaReader::new(
        Box::new(ScriptedDetector::repeating(1)),
        Box::new(FixedCursor::new(1, 2)),
        store.clone(),
    );

    let (reading, _) = reader.read_eyes(&test_frame(FRAME_WIDTH, FRAME_HEIGHT, 1), None).unwrap();

    assert!(reading.is_some());
    assert!(!store.session_dir(SESSION).exists());
}

#[test]
fn test_saved_sample_holds_native_crop_and_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    record(&store, vec![true]);

    let sample = load_sample(&store.session_dir(SESSION).join("0.npz")).unwrap();

    assert_eq!(sample.mouse_pos, (640, 360));
    assert_eq!(sample.cropped_frame.dimensions(), (100, 30));
    assert_eq!(sample.metrics.inter_eye(), 50.0);
}

#[test]
fn test_preprocess_returns_n_fixed_size_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    record(&store, vec![true; 4]);

    let arrays = CorneaReader::preprocess(&store, SESSION).unwrap();

    assert_eq!(arrays.len(), 4);
    assert_eq!(arrays.eyes_metrics.dim(), (4, NUM_EYE_METRICS));
    assert_eq!(
        arrays.frames.dim(),
        (4, EYE_STRIP_HEIGHT as usize, EYE_STRIP_WIDTH as usize)
    );
    assert_eq!(arrays.mouse_pos.dim(), (4, 2));
    assert!(arrays.mouse_pos.iter().all(|&v| v == 640.0 || v == 360.0));
}

#[test]
fn test_export_training_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    record(&store, vec![true; 3]);

    let output = dir.path().join("trial3.npy");
    let rows = store.export_training_matrix(SESSION, &output).unwrap();
    assert_eq!(rows, 3);

    let matrix = load_matrix(&output).unwrap();
    assert_eq!(matrix.dim(), (3, TRAINING_MATRIX_COLUMNS));
    assert_eq!(matrix[[0, 32]], 50.0);
    assert_eq!(matrix[[0, 33]], 640.0);
    assert_eq!(matrix[[0, 34]], 360.0);
}

#[test]
fn test_preprocess_empty_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    std::fs::create_dir(store.session_dir("empty")).unwrap();

    let arrays = store.preprocess("empty").unwrap();
    assert!(arrays.is_empty());
}
