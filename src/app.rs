//! Capture loop: frames in, eye features and session samples out.

use crate::{
    cornea_reader::{CorneaReader, EyeReading},
    error::{Error, Result},
    history::FeatureHistory,
    utils::image_conversion::{rgb_to_bgr, BgrImage},
};
use image::GrayImage;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(feature = "camera")]
use opencv::{
    core::Mat,
    highgui::{self, WINDOW_NORMAL},
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE},
};

#[cfg(feature = "camera")]
const FRAME_WINDOW: &str = "Cornea Tracker";
#[cfg(feature = "camera")]
const STRIP_WINDOW: &str = "Eye Strip";

/// Image file extensions picked up by [`ImageDirSource`]
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Source of BGR frames
pub trait FrameSource {
    /// Next frame, `None` once the source is exhausted
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be read or decoded
    fn next_frame(&mut self) -> Result<Option<BgrImage>>;
}

/// Still images from a directory, in file name order
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    /// List the images in `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or holds no images
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(Error::FrameSource(format!("No images found in {}", dir.display())));
        }
        info!("Reading {} frames from {}", paths.len(), dir.display());

        Ok(Self { paths, next: 0 })
    }

    /// Number of frames in the directory
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the directory held no frames
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<BgrImage>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        debug!("Loading frame {}", path.display());
        let rgb = image::open(path)?.to_rgb8();
        Ok(Some(rgb_to_bgr(&rgb)))
    }
}

/// Webcam frames through `OpenCV`
#[cfg(feature = "camera")]
pub struct CameraSource {
    capture: VideoCapture,
    frame: Mat,
}

#[cfg(feature = "camera")]
impl CameraSource {
    /// Open a camera by index
    ///
    /// # Errors
    ///
    /// Returns an error if the camera cannot be opened
    pub fn new(index: i32) -> Result<Self> {
        info!("Opening camera {}", index);
        let mut capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::FrameSource(format!("Camera {index} could not be opened")));
        }
        capture.set(CAP_PROP_BUFFERSIZE, 1.0)?;

        Ok(Self {
            capture,
            frame: Mat::default(),
        })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<BgrImage>> {
        if !self.capture.read(&mut self.frame)? || self.frame.empty() {
            return Err(Error::FrameSource("Failed to read frame from camera".to_string()));
        }
        crate::utils::image_conversion::mat_to_bgr_image(&self.frame).map(Some)
    }
}

/// Capture loop settings
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Session to record samples into
    pub session: Option<String>,
    /// Rows kept in the feature history
    pub history_size: usize,
    /// Show preview windows (needs the `camera` feature)
    pub show_preview: bool,
    /// Stop after this many frames
    pub max_frames: Option<usize>,
}

/// Counters for one capture run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames read from the source
    pub frames: usize,
    /// Frames where a face was found
    pub faces: usize,
    /// Samples written to the session
    pub samples: usize,
}

/// Frame loop around a [`CorneaReader`]
pub struct CaptureApp {
    config: AppConfig,
    reader: CorneaReader,
    source: Box<dyn FrameSource>,
    history: FeatureHistory,
}

impl CaptureApp {
    /// Create the capture loop
    ///
    /// # Errors
    ///
    /// Returns an error if the preview windows cannot be created
    pub fn new(config: AppConfig, reader: CorneaReader, source: Box<dyn FrameSource>) -> Result<Self> {
        info!("Initializing capture, session: {}", config.session.as_deref().unwrap_or("<none>"));

        if config.show_preview {
            #[cfg(feature = "camera")]
            {
                highgui::named_window(FRAME_WINDOW, WINDOW_NORMAL)?;
                highgui::named_window(STRIP_WINDOW, WINDOW_NORMAL)?;
            }
            #[cfg(not(feature = "camera"))]
            warn!("Preview requested but built without the camera feature");
        }

        let history = FeatureHistory::new(config.history_size);
        Ok(Self {
            config,
            reader,
            source,
            history,
        })
    }

    /// Recent eye metrics
    #[must_use]
    pub fn history(&self) -> &FeatureHistory {
        &self.history
    }

    /// Run until the source is exhausted, the frame limit is hit or the user quits
    ///
    /// # Errors
    ///
    /// Returns an error if reading, feature extraction or saving fails
    pub fn run(&mut self) -> Result<CaptureStats> {
        info!("Starting capture loop");

        let mut stats = CaptureStats::default();
        let start_time = Instant::now();
        let mut last_report = Instant::now();

        while self.config.max_frames.map_or(true, |max| stats.frames < max) {
            let Some(frame) = self.source.next_frame()? else {
                info!("Frame source exhausted");
                break;
            };
            stats.frames += 1;

            let (reading, gray) = self.reader.read_eyes(&frame, self.config.session.as_deref())?;
            if let Some(reading) = &reading {
                stats.faces += 1;
                if self.config.session.is_some() {
                    stats.samples += 1;
                }
                self.history.push(reading.metrics.clone());
            }

            if last_report.elapsed() >= Duration::from_secs(1) {
                #[allow(clippy::cast_precision_loss)]
                let fps = stats.frames as f64 / start_time.elapsed().as_secs_f64();
                info!(
                    "{} frames ({:.1} fps), {} faces, {} samples",
                    stats.frames, fps, stats.faces, stats.samples
                );
                if let Some(latest) = self.history.latest() {
                    debug!("Latest inter-eye distance {:.2}", latest.inter_eye());
                }
                last_report = Instant::now();
            }

            if self.config.show_preview && self.show(&gray, reading.as_ref())? {
                info!("Exit requested by user");
                break;
            }
        }

        info!(
            "Capture finished: {} frames, {} faces, {} samples",
            stats.frames, stats.faces, stats.samples
        );
        Ok(stats)
    }

    /// Display the frame and eye strip; `true` when the user asked to quit
    #[cfg(feature = "camera")]
    #[allow(clippy::unused_self)]
    fn show(&self, gray: &GrayImage, reading: Option<&EyeReading>) -> Result<bool> {
        use crate::utils::image_conversion::gray_image_to_mat;

        highgui::imshow(FRAME_WINDOW, &gray_image_to_mat(gray)?)?;
        if let Some(reading) = reading {
            highgui::imshow(STRIP_WINDOW, &gray_image_to_mat(&reading.eye_strip)?)?;
        }

        let key = highgui::wait_key(1)?;
        Ok(key == 27 || key == i32::from(b'q'))
    }

    #[cfg(not(feature = "camera"))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn show(&self, _gray: &GrayImage, _reading: Option<&EyeReading>) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cursor_control::FixedCursor,
        landmarks::{LandmarkDetector, NormalizedPoint},
        session::SessionStore,
    };
    use image::{Rgb, RgbImage};
    use std::cell::Cell;
    use std::rc::Rc;

    struct NoFace;

    impl LandmarkDetector for NoFace {
        fn detect(&mut self, _rgb: &RgbImage) -> Result<Option<Vec<NormalizedPoint>>> {
            Ok(None)
        }
    }

    struct Frames(usize);

    impl FrameSource for Frames {
        fn next_frame(&mut self) -> Result<Option<BgrImage>> {
            if self.0 == 0 {
                return Ok(None);
            }
            self.0 -= 1;
            Ok(Some(BgrImage::from_pixel(32, 24, Rgb([1, 2, 3]))))
        }
    }

    fn reader() -> CorneaReader {
        CorneaReader::new(Box::new(NoFace), Box::new(FixedCursor::new(0, 0)), SessionStore::new("unused"))
    }

    #[test]
    fn test_run_until_exhausted() {
        let mut app = CaptureApp::new(AppConfig::default(), reader(), Box::new(Frames(4))).unwrap();
        let stats = app.run().unwrap();
        assert_eq!(
            stats,
            CaptureStats {
                frames: 4,
                faces: 0,
                samples: 0
            }
        );
        assert!(app.history().is_empty());
    }

    #[test]
    fn test_frame_limit() {
        let config = AppConfig {
            max_frames: Some(2),
            ..AppConfig::default()
        };
        let mut app = CaptureApp::new(config, reader(), Box::new(Frames(10))).unwrap();
        assert_eq!(app.run().unwrap().frames, 2);
    }

    struct BrokenCamera {
        reads: Rc<Cell<usize>>,
    }

    impl FrameSource for BrokenCamera {
        fn next_frame(&mut self) -> Result<Option<BgrImage>> {
            self.reads.set(self.reads.get() + 1);
            Err(Error::FrameSource("Failed to read frame from camera".to_string()))
        }
    }

    #[test]
    fn test_first_failed_read_ends_run() {
        let reads = Rc::new(Cell::new(0));
        let source = BrokenCamera { reads: Rc::clone(&reads) };
        let mut app = CaptureApp::new(AppConfig::default(), reader(), Box::new(source)).unwrap();

        assert!(matches!(app.run(), Err(Error::FrameSource(_))));
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn test_image_dir_source() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(8, 6, Rgb([10, 20, 30]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(4, 3, Rgb([0, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let mut source = ImageDirSource::new(dir.path()).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.dimensions(), (4, 3));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.get_pixel(0, 0).0, [30, 20, 10]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_image_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ImageDirSource::new(dir.path()), Err(Error::FrameSource(_))));
    }
}
