use crate::{
    config::FaceDetectionConfig,
    constants::{MAX_NUM_FACES, NUM_FACE_MESH_LANDMARKS},
    face_detection::{FaceDetector, FaceRoi},
    landmarks::{LandmarkDetector, NormalizedPoint},
    Error, Result,
};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array4, CowArray};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Face mesh model input size
const FACE_MESH_INPUT_SIZE: u32 = 256;

/// Values per landmark in the model output (x, y, z)
const VALUES_PER_LANDMARK: usize = 3;

/// Face mesh landmark detector with iris refinement using `ONNX` Runtime
///
/// Runs in two stages. A face detector finds the first face and a square
/// region around it is cropped from the frame; the mesh model takes that crop
/// as a 256x256 RGB image in NHWC layout scaled to `[0, 1]` and produces 478
/// landmarks in input pixels plus a face presence logit. While a face stays
/// present, the next region comes from the previous landmarks and the face
/// detector is skipped.
pub struct FaceMeshDetector {
    session: Option<Session>,
    face_detector: Option<FaceDetector>,
    input_size: u32,
    settings: FaceDetectionConfig,
    tracked_roi: Option<FaceRoi>,
}

impl FaceMeshDetector {
    /// Create a detector from a face detector and a face mesh `ONNX` model
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either ONNX model file cannot be loaded
    /// - The mesh model does not expose landmark and presence outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        face_detector_path: P,
        model_path: Q,
        settings: &FaceDetectionConfig,
    ) -> Result<Self> {
        let face_detector = FaceDetector::new(
            face_detector_path,
            settings.confidence_threshold,
            settings.iou_threshold,
        )?;

        log::info!(
            "Initializing FaceMeshDetector with model: {} (max faces {}, refined landmarks)",
            model_path.as_ref().display(),
            MAX_NUM_FACES
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_mesh")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelOutputError("Model has no inputs".to_string()));
        }
        if session.outputs.len() < 2 {
            return Err(Error::ModelOutputError(format!(
                "Expected landmark and presence outputs, model has {}",
                session.outputs.len()
            )));
        }

        Ok(Self {
            session: Some(session),
            face_detector: Some(face_detector),
            input_size: FACE_MESH_INPUT_SIZE,
            settings: settings.clone(),
            tracked_roi: None,
        })
    }

    /// Resize and normalize a face crop into a single-image NHWC batch
    fn preprocess(&self, face: &RgbImage) -> Result<Array4<f32>> {
        let size = self.input_size as usize;
        let resized = image::imageops::resize(face, self.input_size, self.input_size, FilterType::Triangle);

        let data: Vec<f32> = resized.into_raw().into_iter().map(|v| f32::from(v) / 255.0).collect();

        Array4::from_shape_vec((1, size, size, 3), data)
            .map_err(|e| Error::ModelOutputError(format!("Failed to create input array: {e}")))
    }

    /// Run the model, returning the flat landmark values and the presence logit
    fn forward(&self, session: &Session, inputs: Array4<f32>) -> Result<(Vec<f32>, f32)> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(session.allocator(), &cow_array)?;

        let outputs = session.run(vec![input_tensor])?;
        let mut outputs = outputs.into_iter();

        let marks_output = outputs
            .next()
            .ok_or_else(|| Error::ModelOutputError("No landmark output from model".to_string()))?;
        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks_view = marks_tensor.view();
        let marks: Vec<f32> = marks_view.iter().copied().collect();

        let score_output = outputs
            .next()
            .ok_or_else(|| Error::ModelOutputError("No presence output from model".to_string()))?;
        let score_tensor = score_output.try_extract::<f32>()?;
        let score_view = score_tensor.view();
        let logit = *score_view
            .iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("Empty presence output".to_string()))?;

        Ok((marks, logit))
    }

    /// Region to run the mesh on: the tracked one, or one around the best
    /// detected face. `None` when the detector finds no face.
    fn face_region(&mut self, rgb: &RgbImage) -> Result<Option<FaceRoi>> {
        if let Some(roi) = self.tracked_roi {
            return Ok(Some(roi));
        }

        let detector = self
            .face_detector
            .as_mut()
            .ok_or_else(|| Error::ModelOutputError("Face detector already closed".to_string()))?;
        let Some(face) = detector.detect(rgb)?.into_iter().next() else {
            return Ok(None);
        };

        log::debug!("Face detected with score {:.3}", face.score);
        FaceRoi::around(&face.bbox, self.settings.roi_scale).map(Some)
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(&mut self, rgb: &RgbImage) -> Result<Option<Vec<NormalizedPoint>>> {
        if self.session.is_none() {
            return Err(Error::ModelOutputError("Face mesh detector already closed".to_string()));
        }

        let Some(roi) = self.face_region(rgb)? else {
            log::trace!("No face detected");
            return Ok(None);
        };

        let inputs = self.preprocess(&roi.crop(rgb))?;
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::ModelOutputError("Face mesh detector already closed".to_string()))?;
        let (marks, logit) = self.forward(session, inputs)?;
        let presence = sigmoid(logit);

        if presence < self.settings.tracking_threshold {
            log::trace!("Face presence {:.3} below threshold", presence);
            self.tracked_roi = None;
            return Ok(None);
        }

        let (width, height) = rgb.dimensions();
        let landmarks = landmarks_in_frame(&marks, &roi, self.input_size, width, height)?;
        self.tracked_roi = Some(FaceRoi::from_landmarks(&landmarks, width, height, self.settings.roi_scale)?);
        Ok(Some(landmarks))
    }

    fn close(&mut self) {
        self.tracked_roi = None;
        self.face_detector = None;
        if self.session.take().is_some() {
            log::info!("Face mesh session released");
        }
    }
}

/// Convert crop-space model output to landmarks normalized to the full frame
fn landmarks_in_frame(
    marks: &[f32],
    roi: &FaceRoi,
    input_size: u32,
    width: u32,
    height: u32,
) -> Result<Vec<NormalizedPoint>> {
    let expected = NUM_FACE_MESH_LANDMARKS * VALUES_PER_LANDMARK;
    if marks.len() < expected {
        return Err(Error::ModelOutputError(format!(
            "Expected {expected} landmark values, got {}",
            marks.len()
        )));
    }

    Ok(marks[..expected]
        .chunks_exact(VALUES_PER_LANDMARK)
        .map(|xyz| roi.to_frame(xyz[0], xyz[1], input_size, width, height))
        .collect())
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_count() {
        assert_eq!(NUM_FACE_MESH_LANDMARKS, 478);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_landmarks_mapped_from_face_region() {
        let roi = FaceRoi { x: 100, y: 40, size: 128 };
        let mut marks = vec![0.0; NUM_FACE_MESH_LANDMARKS * VALUES_PER_LANDMARK];
        // Landmark 1 at the centre of the 256 input
        marks[3] = 128.0;
        marks[4] = 128.0;

        let points = landmarks_in_frame(&marks, &roi, 256, 640, 480).unwrap();

        assert_eq!(points.len(), NUM_FACE_MESH_LANDMARKS);
        assert!((points[0].x - 100.0 / 640.0).abs() < 1e-6);
        assert!((points[0].y - 40.0 / 480.0).abs() < 1e-6);
        assert!((points[1].x - 164.0 / 640.0).abs() < 1e-6);
        assert!((points[1].y - 104.0 / 480.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_landmark_output_rejected() {
        let roi = FaceRoi { x: 0, y: 0, size: 256 };
        assert!(landmarks_in_frame(&[0.0; 30], &roi, 256, 640, 480).is_err());
    }

    #[test]
    #[ignore = "Requires ONNX face mesh model"]
    fn test_face_mesh_on_blank_frame() -> Result<()> {
        let mut detector = FaceMeshDetector::new(
            "assets/face_detector.onnx",
            "assets/face_mesh.onnx",
            &FaceDetectionConfig::default(),
        )?;
        let blank = RgbImage::new(640, 480);
        assert!(detector.detect(&blank)?.is_none());
        detector.close();
        assert!(detector.detect(&blank).is_err());
        Ok(())
    }
}
