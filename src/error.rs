//! Error types for the cornea tracker library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "camera")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// Training engine failed
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Array had an unexpected shape
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Reading a sample archive failed
    #[error("Sample archive read error: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    /// Writing a sample archive failed
    #[error("Sample archive write error: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// Reading a training matrix failed
    #[error("Matrix read error: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    /// Writing a training matrix failed
    #[error("Matrix write error: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    /// Cursor position query failed
    #[error("Cursor control error: {0}")]
    CursorControl(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Landmark model produced unusable output
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Training data has the wrong layout
    #[error("Training data error: {0}")]
    TrainingData(String),

    /// Frame source could not deliver frames
    #[error("Frame source error: {0}")]
    FrameSource(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
