//! On-disk capture sessions.
//!
//! A session is a directory `<data_dir>/<name>/` of `.npz` archives named by
//! their zero-based capture index. Each archive holds:
//!
//! * `eyesMetrics` - `f64[33]`
//! * `croppedFrame` - `u8[h, w]`, the eye strip at native crop resolution
//! * `mousePos` - `i64[2]`, cursor x and y at capture time (`i32[2]` is
//!   accepted on load)

use crate::{
    constants::{EYE_STRIP_HEIGHT, EYE_STRIP_WIDTH, NUM_EYE_METRICS},
    eye_strip::resize_exact,
    features::EyeMetrics,
    utils::image_conversion::{array2_to_gray, gray_to_array2},
    Error, Result,
};
use image::GrayImage;
use log::{debug, info};
use ndarray::{concatenate, s, Array, Array1, Array2, Array3, Axis, Dimension, Ix1};
use ndarray_npy::{NpzReader, NpzWriter, ReadableElement};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const METRICS_KEY: &str = "eyesMetrics";
const FRAME_KEY: &str = "croppedFrame";
const MOUSE_KEY: &str = "mousePos";

/// Number of columns in the flat training matrix
pub const TRAINING_MATRIX_COLUMNS: usize = NUM_EYE_METRICS + 2;

/// One captured sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Eye metrics of the frame
    pub metrics: EyeMetrics,
    /// Eye strip crop before resizing
    pub cropped_frame: GrayImage,
    /// Cursor position when the frame was captured
    pub mouse_pos: (i32, i32),
}

/// Session contents as parallel fixed-shape arrays
#[derive(Debug, Clone)]
pub struct SessionArrays {
    /// `N x 33` eye metrics
    pub eyes_metrics: Array2<f64>,
    /// `N x 40 x 120` eye strips
    pub frames: Array3<u8>,
    /// `N x 2` cursor positions
    pub mouse_pos: Array2<f64>,
}

impl SessionArrays {
    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.eyes_metrics.nrows()
    }

    /// Whether the session was empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metrics and cursor positions side by side, `N x 35`
    ///
    /// # Errors
    ///
    /// Returns an error if the arrays disagree on the sample count
    pub fn training_matrix(&self) -> Result<Array2<f64>> {
        Ok(concatenate(Axis(1), &[self.eyes_metrics.view(), self.mouse_pos.view()])?)
    }
}

/// Root of all capture sessions
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at a data directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Data directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a session's samples
    #[must_use]
    pub fn session_dir(&self, session: &str) -> PathBuf {
        self.root.join(session)
    }

    /// Persist a sample as the next archive of a session
    ///
    /// The index is the number of entries already in the session directory,
    /// which is created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or created, or the
    /// archive cannot be written
    pub fn save_sample(&self, session: &str, sample: &Sample) -> Result<PathBuf> {
        let dir = self.session_dir(session);
        let index = match fs::read_dir(&dir) {
            Ok(entries) => entries.count(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating session directory {}", dir.display());
                fs::create_dir_all(&dir)?;
                0
            }
            Err(e) => return Err(e.into()),
        };

        let path = dir.join(format!("{index}.npz"));
        write_sample(&path, sample)?;
        debug!("Saved sample {} to {}", index, path.display());

        Ok(path)
    }

    /// Sample archive paths in directory listing order
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be read
    pub fn sample_paths(&self, session: &str) -> Result<Vec<PathBuf>> {
        fs::read_dir(self.session_dir(session))?
            .map(|entry| entry.map(|e| e.path()).map_err(Error::from))
            .collect()
    }

    /// Load every sample of a session and stretch each crop to 40x120
    ///
    /// Samples appear in directory listing order, which is not necessarily
    /// capture order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any archive cannot be read
    pub fn preprocess(&self, session: &str) -> Result<SessionArrays> {
        let paths = self.sample_paths(session)?;
        let count = paths.len();

        let mut eyes_metrics = Array2::<f64>::zeros((count, NUM_EYE_METRICS));
        let mut frames = Array3::<u8>::zeros((count, EYE_STRIP_HEIGHT as usize, EYE_STRIP_WIDTH as usize));
        let mut mouse_pos = Array2::<f64>::zeros((count, 2));

        for (i, path) in paths.iter().enumerate() {
            let sample = load_sample(path)?;
            eyes_metrics.row_mut(i).assign(&sample.metrics.to_array());
            frames
                .slice_mut(s![i, .., ..])
                .assign(&gray_to_array2(&resize_exact(&sample.cropped_frame)?));
            mouse_pos[[i, 0]] = f64::from(sample.mouse_pos.0);
            mouse_pos[[i, 1]] = f64::from(sample.mouse_pos.1);
        }

        info!("Preprocessed session '{}': frames {:?}", session, frames.dim());

        Ok(SessionArrays {
            eyes_metrics,
            frames,
            mouse_pos,
        })
    }

    /// Write a session as an `N x 35` training matrix (`.npy`)
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded or the file written
    pub fn export_training_matrix<P: AsRef<Path>>(&self, session: &str, output: P) -> Result<usize> {
        let arrays = self.preprocess(session)?;
        let matrix = arrays.training_matrix()?;
        ndarray_npy::write_npy(output.as_ref(), &matrix)?;
        info!(
            "Exported {} samples from '{}' to {}",
            arrays.len(),
            session,
            output.as_ref().display()
        );
        Ok(arrays.len())
    }
}

/// Write one sample archive
///
/// # Errors
///
/// Returns an error if the file cannot be created or written
pub fn write_sample(path: &Path, sample: &Sample) -> Result<()> {
    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array(METRICS_KEY, &sample.metrics.to_array())?;
    npz.add_array(FRAME_KEY, &gray_to_array2(&sample.cropped_frame))?;
    npz.add_array(
        MOUSE_KEY,
        &Array1::from(vec![i64::from(sample.mouse_pos.0), i64::from(sample.mouse_pos.1)]),
    )?;
    npz.finish()?;
    Ok(())
}

/// Read one sample archive
///
/// # Errors
///
/// Returns an error if the archive is missing, malformed, or holds arrays of
/// the wrong shape
pub fn load_sample(path: &Path) -> Result<Sample> {
    let mut npz = NpzReader::new(File::open(path)?)?;

    let metrics: Array1<f64> = read_named(&mut npz, METRICS_KEY)?;
    let frame: Array2<u8> = read_named(&mut npz, FRAME_KEY)?;
    let mouse: Array1<i64> = match read_named(&mut npz, MOUSE_KEY) {
        Ok(mouse) => mouse,
        // numpy's default integer is 32-bit on some platforms
        Err(_) => read_named::<i32, Ix1>(&mut npz, MOUSE_KEY)?.mapv(i64::from),
    };

    let metrics = EyeMetrics::from_slice(&metrics.to_vec())?;
    if mouse.len() != 2 {
        return Err(Error::InvalidInput(format!(
            "{}: expected 2 cursor coordinates, got {}",
            path.display(),
            mouse.len()
        )));
    }
    let to_i32 = |v: i64| {
        i32::try_from(v).map_err(|_| Error::InvalidInput(format!("Cursor coordinate {v} out of range")))
    };

    Ok(Sample {
        metrics,
        cropped_frame: array2_to_gray(&frame)?,
        mouse_pos: (to_i32(mouse[0])?, to_i32(mouse[1])?),
    })
}

/// Read an array stored either as `name` or `name.npy`
fn read_named<A, D>(npz: &mut NpzReader<File>, name: &str) -> Result<Array<A, D>>
where
    A: ReadableElement,
    D: Dimension,
{
    match npz.by_name(name) {
        Ok(array) => Ok(array),
        Err(_) => Ok(npz.by_name(&format!("{name}.npy"))?),
    }
}
