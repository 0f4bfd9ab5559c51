//! Face localisation ahead of the face mesh.
//!
//! The face mesh model expects a face crop, not a whole camera frame. An SCRFD
//! detector ([`FaceDetector`], behind the `onnx` feature) finds the face, and a
//! square [`FaceRoi`] around it is what the mesh model sees. The box math here
//! does not depend on the model.

use crate::{
    landmarks::NormalizedPoint,
    utils::safe_cast::{f64_to_i64, normalized_to_pixel},
    Error, Result,
};
use image::{imageops, RgbImage};

#[cfg(feature = "onnx")]
pub use detector::FaceDetector;

/// Face bounding box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    /// Left edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
    /// Right edge
    pub x2: f32,
    /// Bottom edge
    pub y2: f32,
}

impl FaceBox {
    /// Create a box from its corners
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box width
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Box height
    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Inclusive pixel area
    fn area(&self) -> f32 {
        (self.width() + 1.0) * (self.height() + 1.0)
    }

    /// Intersection over union with another box
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1) + 1.0).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1) + 1.0).max(0.0);
        let inter = w * h;
        inter / (self.area() + other.area() - inter)
    }

    /// Divide every coordinate by `scale`
    #[must_use]
    pub fn unscale(&self, scale: f32) -> Self {
        Self::new(self.x1 / scale, self.y1 / scale, self.x2 / scale, self.y2 / scale)
    }
}

/// Face detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetection {
    /// Bounding box of the detected face
    pub bbox: FaceBox,
    /// Confidence score of the detection
    pub score: f32,
}

/// Anchor centres of one stride level, row-major, each repeated `num_anchors` times
#[must_use]
#[allow(clippy::cast_precision_loss)] // Grid coordinates are small
pub fn anchor_centers(height: usize, width: usize, stride: usize, num_anchors: usize) -> Vec<(f32, f32)> {
    let mut centers = Vec::with_capacity(height * width * num_anchors.max(1));
    for y in 0..height {
        for x in 0..width {
            let center = ((x * stride) as f32, (y * stride) as f32);
            centers.extend(std::iter::repeat(center).take(num_anchors.max(1)));
        }
    }
    centers
}

/// Decode `(left, top, right, bottom)` distances around an anchor centre into a box
#[must_use]
pub fn distance_to_bbox(center: (f32, f32), distance: [f32; 4]) -> FaceBox {
    let (cx, cy) = center;
    FaceBox::new(cx - distance[0], cy - distance[1], cx + distance[2], cy + distance[3])
}

/// Greedy non-maximum suppression, highest score first
#[must_use]
pub fn non_max_suppression(mut detections: Vec<FaceDetection>, iou_threshold: f32) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<FaceDetection> = Vec::new();
    for detection in detections {
        if keep.iter().all(|kept| kept.bbox.iou(&detection.bbox) <= iou_threshold) {
            keep.push(detection);
        }
    }
    keep
}

/// Square region of the frame the face mesh runs on
///
/// The square may reach past the frame edges; [`FaceRoi::crop`] pads the
/// outside with black so landmarks map back with one offset and one scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRoi {
    /// Left edge in frame pixels, may be negative
    pub x: i64,
    /// Top edge in frame pixels, may be negative
    pub y: i64,
    /// Side length in pixels
    pub size: u32,
}

impl FaceRoi {
    /// Square centred on a box, its side the longer box side times `scale`
    ///
    /// # Errors
    ///
    /// Returns an error if the box is degenerate or not finite
    pub fn around(bbox: &FaceBox, scale: f32) -> Result<Self> {
        let side = f64::from(bbox.width().max(bbox.height())) * f64::from(scale);
        if !side.is_finite() || side < 1.0 {
            return Err(Error::InvalidInput(format!("Face box {bbox:?} too small for a region")));
        }

        let cx = (f64::from(bbox.x1) + f64::from(bbox.x2)) / 2.0;
        let cy = (f64::from(bbox.y1) + f64::from(bbox.y2)) / 2.0;
        let size = u32::try_from(f64_to_i64(side.round())?)
            .map_err(|_| Error::InvalidInput(format!("Face region side {side} out of range")))?;

        Ok(Self {
            x: f64_to_i64((cx - side / 2.0).round())?,
            y: f64_to_i64((cy - side / 2.0).round())?,
            size,
        })
    }

    /// Square around landmarks given in normalized frame coordinates
    ///
    /// # Errors
    ///
    /// Returns an error if there are no landmarks or they span no area
    pub fn from_landmarks(points: &[NormalizedPoint], width: u32, height: u32, scale: f32) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::InvalidInput("No landmarks to build a face region from".to_string()));
        }

        let mut bbox = FaceBox::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for point in points {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = (
                normalized_to_pixel(point.x, width)? as f32,
                normalized_to_pixel(point.y, height)? as f32,
            );
            bbox = FaceBox::new(bbox.x1.min(x), bbox.y1.min(y), bbox.x2.max(x), bbox.y2.max(y));
        }

        Self::around(&bbox, scale)
    }

    /// Copy the region out of a frame, black where it leaves the frame
    #[must_use]
    pub fn crop(&self, rgb: &RgbImage) -> RgbImage {
        let mut canvas = RgbImage::new(self.size, self.size);
        imageops::replace(&mut canvas, rgb, -self.x, -self.y);
        canvas
    }

    /// Map a point given in pixels of the `input_size` model input back to
    /// normalized coordinates of the full `width` x `height` frame
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Frame offsets are small
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_frame(&self, x: f32, y: f32, input_size: u32, width: u32, height: u32) -> NormalizedPoint {
        let scale = f64::from(self.size) / f64::from(input_size);
        let frame_x = self.x as f64 + f64::from(x) * scale;
        let frame_y = self.y as f64 + f64::from(y) * scale;
        NormalizedPoint::new((frame_x / f64::from(width)) as f32, (frame_y / f64::from(height)) as f32)
    }
}

#[cfg(feature = "onnx")]
mod detector {
    use super::{anchor_centers, distance_to_bbox, non_max_suppression, FaceDetection};
    use crate::{Error, Result};
    use image::{imageops::FilterType, RgbImage};
    use ndarray::{Array4, CowArray};
    use ort::{Environment, Session, Value};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    /// Fallback model input size when the model leaves it dynamic
    const DEFAULT_INPUT_SIZE: u32 = 640;

    /// SCRFD face detector using `ONNX` Runtime
    pub struct FaceDetector {
        session: Session,
        input_size: (u32, u32),
        conf_threshold: f32,
        nms_threshold: f32,
        num_anchors: usize,
        strides: Vec<usize>,
        offset: usize,
        center_cache: HashMap<(usize, usize, usize), Vec<(f32, f32)>>,
    }

    impl FaceDetector {
        /// Create a face detector from an `ONNX` model file
        ///
        /// # Errors
        ///
        /// Returns an error if the model cannot be loaded or has an unknown
        /// output layout
        pub fn new<P: AsRef<Path>>(model_path: P, conf_threshold: f32, nms_threshold: f32) -> Result<Self> {
            log::info!("Initializing FaceDetector with model: {}", model_path.as_ref().display());
            let environment = Arc::new(
                Environment::builder()
                    .with_name("face_detector")
                    .with_log_level(ort::LoggingLevel::Warning)
                    .build()?,
            );

            let session = ort::SessionBuilder::new(&environment)?
                .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
                .with_model_from_file(model_path)?;

            let input_meta = session
                .inputs
                .first()
                .ok_or_else(|| Error::ModelOutputError("Model has no inputs".to_string()))?;

            // NCHW: [batch, channels, height, width]
            let dimension = |i: usize| {
                input_meta
                    .dimensions
                    .get(i)
                    .copied()
                    .flatten()
                    .and_then(|d| u32::try_from(d).ok())
                    .unwrap_or(DEFAULT_INPUT_SIZE)
            };
            let input_size = (dimension(3), dimension(2));

            // Keypoint outputs, when present, follow the box outputs and are not used
            let (offset, strides, num_anchors) = match session.outputs.len() {
                6 | 9 => (3, vec![8, 16, 32], 2),
                10 | 15 => (5, vec![8, 16, 32, 64, 128], 1),
                n => {
                    return Err(Error::ModelOutputError(format!(
                        "Unknown face detector layout with {n} outputs"
                    )))
                }
            };

            Ok(Self {
                session,
                input_size,
                conf_threshold,
                nms_threshold,
                num_anchors,
                strides,
                offset,
                center_cache: HashMap::new(),
            })
        }

        /// Detect faces in an RGB frame, best first
        ///
        /// # Errors
        ///
        /// Returns an error if inference fails or the outputs are malformed
        #[allow(clippy::cast_precision_loss)]
        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        pub fn detect(&mut self, rgb: &RgbImage) -> Result<Vec<FaceDetection>> {
            let (img_width, img_height) = rgb.dimensions();
            if img_width == 0 || img_height == 0 {
                return Err(Error::InvalidInput("Cannot detect faces in an empty frame".to_string()));
            }

            // Letterbox into the model input, keeping the aspect ratio
            let (input_width, input_height) = self.input_size;
            let ratio_img = img_height as f32 / img_width as f32;
            let ratio_model = input_height as f32 / input_width as f32;
            let (new_width, new_height) = if ratio_img > ratio_model {
                (((input_height as f32 / ratio_img) as u32).max(1), input_height)
            } else {
                (input_width, ((input_width as f32 * ratio_img) as u32).max(1))
            };
            let det_scale = new_height as f32 / img_height as f32;

            let resized = image::imageops::resize(rgb, new_width, new_height, FilterType::Triangle);
            let mut det_img = RgbImage::new(input_width, input_height);
            image::imageops::replace(&mut det_img, &resized, 0, 0);

            let inputs = Self::preprocess(&det_img);
            let detections = self.forward(inputs)?;

            Ok(non_max_suppression(
                detections
                    .into_iter()
                    .map(|d| FaceDetection {
                        bbox: d.bbox.unscale(det_scale),
                        score: d.score,
                    })
                    .collect(),
                self.nms_threshold,
            ))
        }

        /// Normalize to `(v - 127.5) / 128` in NCHW layout
        fn preprocess(image: &RgbImage) -> Array4<f32> {
            let (width, height) = image.dimensions();
            Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
                #[allow(clippy::cast_possible_truncation)]
                let pixel = image.get_pixel(x as u32, y as u32);
                (f32::from(pixel[c]) - 127.5) / 128.0
            })
        }

        /// Run the model and decode detections above the confidence threshold
        /// in input pixel coordinates
        fn forward(&mut self, inputs: Array4<f32>) -> Result<Vec<FaceDetection>> {
            let input_height = inputs.shape()[2];
            let input_width = inputs.shape()[3];

            let cow_array = CowArray::from(inputs.into_dyn());
            let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
            let outputs = self.session.run(vec![input_tensor])?;

            let mut detections = Vec::new();
            for (idx, &stride) in self.strides.iter().enumerate() {
                let output = |i: usize| {
                    outputs
                        .get(i)
                        .ok_or_else(|| Error::ModelOutputError(format!("Missing detector output {i}")))
                };

                let scores_tensor = output(idx)?.try_extract::<f32>()?;
                let scores: Vec<f32> = scores_tensor.view().iter().copied().collect();

                let bbox_tensor = output(idx + self.offset)?.try_extract::<f32>()?;
                #[allow(clippy::cast_precision_loss)]
                let distances: Vec<f32> = bbox_tensor.view().iter().map(|&d| d * stride as f32).collect();

                let key = (input_height / stride, input_width / stride, stride);
                let num_anchors = self.num_anchors;
                let centers = self
                    .center_cache
                    .entry(key)
                    .or_insert_with(|| anchor_centers(key.0, key.1, stride, num_anchors));

                if scores.len() != centers.len() || distances.len() != 4 * centers.len() {
                    return Err(Error::ModelOutputError(format!(
                        "Stride {stride}: {} scores and {} box values for {} anchors",
                        scores.len(),
                        distances.len(),
                        centers.len()
                    )));
                }

                for (i, &score) in scores.iter().enumerate() {
                    if score < self.conf_threshold {
                        continue;
                    }
                    let d = &distances[4 * i..4 * i + 4];
                    detections.push(FaceDetection {
                        bbox: distance_to_bbox(centers[i], [d[0], d[1], d[2], d[3]]),
                        score,
                    });
                }
            }

            log::trace!("{} face candidates above {:.2}", detections.len(), self.conf_threshold);
            Ok(detections)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        #[ignore = "Requires ONNX face detector model"]
        fn test_no_face_on_blank_frame() -> Result<()> {
            let mut detector = FaceDetector::new("assets/face_detector.onnx", 0.5, 0.4)?;
            assert!(detector.detect(&RgbImage::new(640, 480))?.is_empty());
            Ok(())
        }
    }
}
