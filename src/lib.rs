//! Eye feature capture and cursor position regression.
//!
//! This library turns webcam frames into gaze training data:
//! - A face detector finds the face and a face mesh model locates 478
//!   landmarks including the irises in a square region around it
//! - Eyelid contour distances to each iris centre form a 33-value feature vector
//! - The eye region is cropped, and resized and padded to a fixed 40x120 strip
//! - Samples are recorded per session together with the cursor position
//! - A small dense network is trained to predict the cursor from the features
//!
//! # Examples
//!
//! ## Reading eye features
//!
//! ```no_run
//! use cornea_tracker::{
//!     cornea_reader::CorneaReader,
//!     cursor_control::CursorController,
//!     landmarks::{LandmarkDetector, NormalizedPoint},
//!     session::SessionStore,
//!     utils::image_conversion::BgrImage,
//! };
//! # struct MyDetector;
//! # impl LandmarkDetector for MyDetector {
//! #     fn detect(&mut self, _: &image::RgbImage) -> cornea_tracker::Result<Option<Vec<NormalizedPoint>>> { Ok(None) }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = CorneaReader::new(
//!     Box::new(MyDetector),
//!     Box::new(CursorController::new()?),
//!     SessionStore::new("data"),
//! );
//!
//! let frame = BgrImage::new(640, 480);
//! let (reading, _gray) = reader.read_eyes(&frame, Some("trial3"))?;
//! if let Some(reading) = reading {
//!     println!("Inter-eye distance: {:.2}", reading.metrics.inter_eye());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Training
//!
//! ```no_run
//! use cornea_tracker::{session::SessionStore, trainer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SessionStore::new("data");
//! store.export_training_matrix("trial3", "data/trial3.npy")?;
//!
//! let matrix = trainer::load_matrix("data/trial3.npy")?;
//! let report = trainer::train(&matrix, "trial1Model.safetensors")?;
//! println!("Test MAE: {:.3}", report.test_loss);
//! # Ok(())
//! # }
//! ```

/// Face mesh landmark points and the detector interface
pub mod landmarks;

/// Face detection and the face region the mesh runs on
pub mod face_detection;

/// Face mesh detection with `ONNX` Runtime
#[cfg(feature = "onnx")]
pub mod mark_detection;

/// Eyelid to iris distance features
pub mod features;

/// Eye strip crop and fixed-size resize
pub mod eye_strip;

/// Per-frame eye feature extraction
pub mod cornea_reader;

/// Session sample persistence
pub mod session;

/// Bounded history of recent features
pub mod history;

/// Cursor position regressor training
pub mod trainer;

/// Utility functions for image processing and coordinate transformations
pub mod utils;

/// Error types and result handling
pub mod error;

/// Capture application loop
pub mod app;

/// Cursor position queries for X11 systems
pub mod cursor_control;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
