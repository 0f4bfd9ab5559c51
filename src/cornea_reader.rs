//! Per-frame eye feature extraction.

use crate::{
    constants::IRIS_MARKER_RADIUS,
    cursor_control::CursorPosition,
    eye_strip::{crop_eye_strip, resize_aspect_ratio},
    features::{EyeMetrics, IrisCenter},
    landmarks::{LandmarkDetector, MeshPoints},
    session::{Sample, SessionArrays, SessionStore},
    utils::image_conversion::{bgr_to_gray, bgr_to_rgb, mirror, BgrImage},
    Result,
};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use log::{debug, info, trace};

/// Marker intensity for the iris centres on the preview frame
const IRIS_MARKER_COLOR: Luma<u8> = Luma([0]);

/// Features extracted from a frame with a face
#[derive(Debug, Clone, PartialEq)]
pub struct EyeReading {
    /// Distance features
    pub metrics: EyeMetrics,
    /// Eye strip resized and padded to exactly 40x120
    pub eye_strip: GrayImage,
}

/// Eye feature extractor owning one landmark detector
///
/// The detector is released exactly once, when the reader is dropped.
pub struct CorneaReader {
    detector: Box<dyn LandmarkDetector>,
    cursor: Box<dyn CursorPosition>,
    store: SessionStore,
    iris_center: IrisCenter,
}

impl CorneaReader {
    /// Create a reader around a detector, a cursor source and a session store
    pub fn new(detector: Box<dyn LandmarkDetector>, cursor: Box<dyn CursorPosition>, store: SessionStore) -> Self {
        info!("CorneaReader ready, sessions under {}", store.root().display());
        Self {
            detector,
            cursor,
            store,
            iris_center: IrisCenter::default(),
        }
    }

    /// Locate iris centres with `iris_center` instead of the centre landmarks
    #[must_use]
    pub fn with_iris_center(mut self, iris_center: IrisCenter) -> Self {
        self.iris_center = iris_center;
        self
    }

    /// Session store samples are written to
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Extract eye features from a BGR camera frame
    ///
    /// The frame is mirrored first, so every coordinate lives in mirrored
    /// space. The second element is always the mirrored grayscale frame, with
    /// iris markers drawn when a face was found. With `session` set, the crop
    /// is persisted at native resolution together with the cursor position.
    ///
    /// # Errors
    ///
    /// Returns an error if the detector, the cursor query or the sample
    /// write fails. A frame without a face is not an error.
    pub fn read_eyes(&mut self, frame: &BgrImage, session: Option<&str>) -> Result<(Option<EyeReading>, GrayImage)> {
        let mouse_pos = match session {
            Some(_) => Some(self.cursor.position()?),
            None => None,
        };

        let mirrored = mirror(frame);
        let rgb = bgr_to_rgb(&mirrored);
        let mut gray = bgr_to_gray(&mirrored);
        let (width, height) = mirrored.dimensions();

        let Some(landmarks) = self.detector.detect(&rgb)? else {
            trace!("No face in {}x{} frame", width, height);
            return Ok((None, gray));
        };

        let mesh = MeshPoints::from_normalized(&landmarks, width, height)?;

        let (left_center, right_center) = self.iris_center.locate(&mesh)?;
        draw_filled_circle_mut(&mut gray, (left_center.x, left_center.y), IRIS_MARKER_RADIUS, IRIS_MARKER_COLOR);
        draw_filled_circle_mut(&mut gray, (right_center.x, right_center.y), IRIS_MARKER_RADIUS, IRIS_MARKER_COLOR);

        let cropped = crop_eye_strip(&gray, &mesh)?;
        let metrics = EyeMetrics::from_mesh_with(&mesh, self.iris_center)?;

        if let (Some(session), Some(mouse_pos)) = (session, mouse_pos) {
            self.store.save_sample(
                session,
                &Sample {
                    metrics: metrics.clone(),
                    cropped_frame: cropped.clone(),
                    mouse_pos,
                },
            )?;
        }

        let eye_strip = resize_aspect_ratio(&cropped)?;
        debug!(
            "Eye metrics inter-eye={:.2}, crop {}x{}",
            metrics.inter_eye(),
            cropped.width(),
            cropped.height()
        );

        Ok((Some(EyeReading { metrics, eye_strip }), gray))
    }

    /// Load a session as parallel fixed-shape arrays
    ///
    /// # Errors
    ///
    /// Returns an error if the session or any of its samples cannot be read
    pub fn preprocess(store: &SessionStore, session: &str) -> Result<SessionArrays> {
        store.preprocess(session)
    }
}

impl Drop for CorneaReader {
    fn drop(&mut self) {
        debug!("Releasing landmark detector");
        self.detector.close();
    }
}
