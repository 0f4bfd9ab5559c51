//! Configuration management for the cornea tracker

use crate::{
    constants::{
        DEFAULT_DATA_DIR, FACE_NMS_THRESHOLD, FACE_ROI_SCALE, MIN_DETECTION_CONFIDENCE, MIN_TRACKING_CONFIDENCE,
    },
    features::IrisCenter,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelConfig,

    /// Face detection and tracking parameters
    pub face_detection: FaceDetectionConfig,

    /// Capture configuration
    pub capture: CaptureConfig,

    /// Training input and output paths
    pub training: TrainingConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the face detection ONNX model
    pub face_detector: PathBuf,

    /// Path to the face mesh ONNX model
    pub face_mesh: PathBuf,
}

/// Face detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionConfig {
    /// Minimum face detector score (0.0-1.0)
    pub confidence_threshold: f32,

    /// Minimum face mesh presence score while tracking (0.0-1.0)
    pub tracking_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub iou_threshold: f32,

    /// Face region side relative to the face box
    pub roi_scale: f32,
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera index
    pub camera: i32,

    /// Root directory for session directories
    pub data_dir: PathBuf,

    /// Session to record into; nothing is saved when unset
    pub session: Option<String>,

    /// Number of recent metric rows kept for inspection (0 disables)
    pub history_size: usize,

    /// Show the processed frame and eye strip in preview windows
    pub show_preview: bool,

    /// Iris centre source: the centre landmark or the iris cluster
    pub iris_center: IrisCenter,
}

/// Training file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Flat `N x 35` training matrix
    pub matrix: PathBuf,

    /// Where the trained model is written
    pub model_output: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_detector: PathBuf::from("assets/face_detector.onnx"),
            face_mesh: PathBuf::from("assets/face_mesh.onnx"),
        }
    }
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: MIN_DETECTION_CONFIDENCE,
            tracking_threshold: MIN_TRACKING_CONFIDENCE,
            iou_threshold: FACE_NMS_THRESHOLD,
            roi_scale: FACE_ROI_SCALE,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera: 0,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            session: None,
            history_size: 30,
            show_preview: true,
            iris_center: IrisCenter::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            matrix: PathBuf::from("data/trial3.npy"),
            model_output: PathBuf::from("trial1Model.safetensors"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let detection = &self.face_detection;
        if !(0.0..=1.0).contains(&detection.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&detection.tracking_threshold) {
            return Err(Error::ConfigError(
                "Tracking threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&detection.iou_threshold) {
            return Err(Error::ConfigError(
                "IOU threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(detection.roi_scale.is_finite() && detection.roi_scale >= 1.0) {
            return Err(Error::ConfigError("Face region scale must be at least 1.0".to_string()));
        }

        if self.capture.camera < 0 {
            return Err(Error::ConfigError("Camera index must not be negative".to_string()));
        }

        if let Some(session) = &self.capture.session {
            if session.is_empty() {
                return Err(Error::ConfigError("Session name must not be empty".to_string()));
            }
            if session.contains(['/', '\\']) || session == "." || session == ".." {
                return Err(Error::ConfigError(format!(
                    "Session name '{session}' must be a single directory name"
                )));
            }
        }

        if self.capture.data_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError("Data directory must not be empty".to_string()));
        }

        if self.training.model_output.as_os_str().is_empty() {
            return Err(Error::ConfigError("Model output path must not be empty".to_string()));
        }

        Ok(())
    }

    /// Check that both model files exist
    pub fn validate_models(&self) -> Result<()> {
        if !self.models.face_detector.exists() {
            return Err(Error::ConfigError(format!(
                "Face detector model not found: {}",
                self.models.face_detector.display()
            )));
        }
        if !self.models.face_mesh.exists() {
            return Err(Error::ConfigError(format!(
                "Face mesh model not found: {}",
                self.models.face_mesh.display()
            )));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Cornea Tracker Configuration

# Model paths
models:
  face_detector: "assets/face_detector.onnx"
  face_mesh: "assets/face_mesh.onnx"

# Face detection and tracking
face_detection:
  confidence_threshold: 0.5
  tracking_threshold: 0.5
  iou_threshold: 0.4
  roi_scale: 1.5

# Capture settings
capture:
  camera: 0
  data_dir: "data"
  session: "trial3"
  history_size: 30
  show_preview: true
  iris_center: "landmark"   # or "cluster"

# Training files
training:
  matrix: "data/trial3.npy"
  model_output: "trial1Model.safetensors"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.capture.session.as_deref(), Some("trial3"));
        assert_eq!(config.capture.data_dir, PathBuf::from("data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("capture:\n  camera: 2\n").unwrap();
        assert_eq!(config.capture.camera, 2);
        assert_eq!(config.capture.history_size, 30);
        assert_eq!(config.models.face_mesh, PathBuf::from("assets/face_mesh.onnx"));
    }

    #[test]
    fn test_validate_rejects_bad_session() {
        let mut config = Config::default();
        config.capture.session = Some("../escape".to_string());
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        config.capture.session = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.capture.session = Some("calib".to_string());

        config.to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded.capture.session.as_deref(), Some("calib"));
        assert_eq!(loaded.training.model_output, config.training.model_output);
    }

    #[test]
    fn test_iris_center_from_yaml() {
        let config: Config = serde_yaml::from_str("capture:\n  iris_center: cluster\n").unwrap();
        assert_eq!(config.capture.iris_center, IrisCenter::Cluster);
        assert_eq!(Config::default().capture.iris_center, IrisCenter::Landmark);
        assert!(serde_yaml::from_str::<Config>("capture:\n  iris_center: circle\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = Config::default();
        config.face_detection.confidence_threshold = 1.5;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        let mut config = Config::default();
        config.face_detection.roi_scale = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_models_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.models.face_detector = dir.path().join("face_detector.onnx");
        config.models.face_mesh = dir.path().join("face_mesh.onnx");
        assert!(matches!(config.validate_models(), Err(Error::ConfigError(_))));

        std::fs::write(&config.models.face_detector, b"").unwrap();
        let err = config.validate_models().unwrap_err();
        assert!(err.to_string().contains("face_mesh.onnx"));

        std::fs::write(&config.models.face_mesh, b"").unwrap();
        assert!(config.validate_models().is_ok());
    }
}
