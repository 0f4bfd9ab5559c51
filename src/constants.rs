//! Constants used throughout the application

/// Number of face mesh landmarks with iris refinement enabled
pub const NUM_FACE_MESH_LANDMARKS: usize = 478;

/// Number of points on each eyelid contour
pub const EYE_CONTOUR_POINTS: usize = 16;

/// Length of the eye metrics vector (two contours plus the inter-eye distance)
pub const NUM_EYE_METRICS: usize = 2 * EYE_CONTOUR_POINTS + 1;

/// Left eyelid contour, starting at the inner corner
pub const LEFT_EYE: [usize; EYE_CONTOUR_POINTS] =
    [362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398];

/// Right eyelid contour, starting at the inner corner
pub const RIGHT_EYE: [usize; EYE_CONTOUR_POINTS] =
    [133, 33, 7, 163, 144, 145, 153, 154, 155, 173, 157, 158, 159, 160, 161, 246];

/// Left iris centre landmark
pub const LEFT_IRIS_CENTER: usize = 473;

/// Right iris centre landmark
pub const RIGHT_IRIS_CENTER: usize = 468;

/// Left iris boundary cluster
pub const LEFT_IRIS: [usize; 4] = [474, 475, 476, 477];

/// Right iris boundary cluster
pub const RIGHT_IRIS: [usize; 4] = [469, 470, 471, 472];

/// Eyebrows and both eyes, used for the eye strip crop
pub const EYE_STRIP: [usize; 32] = [
    27, 28, 56, 190, 243, 112, 26, 22, 23, 24, 110, 25, 130, 247, 30, 29, 257, 259, 260, 467, 359, 255, 339, 254,
    253, 252, 256, 341, 463, 414, 286, 258,
];

/// Eye strip target height in pixels
pub const EYE_STRIP_HEIGHT: u32 = 40;

/// Eye strip target width in pixels
pub const EYE_STRIP_WIDTH: u32 = 120;

/// Minimum face detector score for a face to be picked up
pub const MIN_DETECTION_CONFIDENCE: f32 = 0.5;

/// Minimum face mesh presence score for a face to count as present
pub const MIN_TRACKING_CONFIDENCE: f32 = 0.5;

/// IOU above which overlapping face detections are suppressed
pub const FACE_NMS_THRESHOLD: f32 = 0.4;

/// Face region side relative to the longer side of the face box
pub const FACE_ROI_SCALE: f32 = 1.5;

/// Only the first face is ever used
pub const MAX_NUM_FACES: usize = 1;

/// Radius of the filled iris markers drawn on the preview frame
pub const IRIS_MARKER_RADIUS: i32 = 2;

/// Default root directory for capture sessions
pub const DEFAULT_DATA_DIR: &str = "data";
