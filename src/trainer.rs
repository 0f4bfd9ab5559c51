//! Cursor position regressor and its fixed training recipe.
//!
//! The network maps the 33 eye metrics to a screen position:
//! `Dense(33->40, relu) -> Dense(40->60) -> Dense(60->2, relu)`, trained with
//! mean absolute error and Adam.

use crate::{constants::NUM_EYE_METRICS, session::TRAINING_MATRIX_COLUMNS, Error, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{linear, AdamW, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use log::{debug, info};
use ndarray::{s, Array2, Axis};
use ndarray_npy::read_npy;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::Path;

/// Fraction of rows held out as the test set
pub const TEST_FRACTION: f64 = 0.3;

/// Seed for the train/test split
pub const SPLIT_SEED: u64 = 30;

/// Fraction of the training rows held out for per-epoch validation
pub const VALIDATION_FRACTION: f64 = 0.2;

/// Number of passes over the training rows
pub const EPOCHS: usize = 25;

/// Rows per optimizer step
pub const BATCH_SIZE: usize = 32;

/// Adam learning rate
pub const LEARNING_RATE: f64 = 1e-3;

/// Seed for the per-epoch batch shuffle
const SHUFFLE_SEED: u64 = 0;

/// Width of the network output (cursor x, y)
const NUM_OUTPUTS: usize = 2;

/// Hidden layer widths
const HIDDEN_1: usize = 40;
const HIDDEN_2: usize = 60;

/// Load an `N x 35` training matrix from a `.npy` file
///
/// # Errors
///
/// Returns an error if the file cannot be read or has the wrong column count
pub fn load_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let matrix: Array2<f64> = read_npy(path)?;
    if matrix.ncols() != TRAINING_MATRIX_COLUMNS {
        return Err(Error::TrainingData(format!(
            "{} has {} columns, expected {}",
            path.display(),
            matrix.ncols(),
            TRAINING_MATRIX_COLUMNS
        )));
    }
    info!("Loaded {} training rows from {}", matrix.nrows(), path.display());
    Ok(matrix)
}

/// Split a training matrix into the 33 feature columns and the 2 label columns
///
/// # Errors
///
/// Returns an error if the matrix does not have 35 columns
pub fn split_features_labels(matrix: &Array2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
    if matrix.ncols() != TRAINING_MATRIX_COLUMNS {
        return Err(Error::TrainingData(format!(
            "Matrix has {} columns, expected {}",
            matrix.ncols(),
            TRAINING_MATRIX_COLUMNS
        )));
    }
    let features = matrix.slice(s![.., ..NUM_EYE_METRICS]).to_owned();
    let labels = matrix.slice(s![.., NUM_EYE_METRICS..]).to_owned();
    Ok((features, labels))
}

/// Train and test partitions of features and labels
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array2<f64>,
    pub y_test: Array2<f64>,
}

/// Number of test rows for `n` rows: `ceil(fraction * n)`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn test_size(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64).ceil() as usize).min(n)
}

/// Shuffle rows with a fixed seed and split off `ceil(test_fraction * n)` test rows
///
/// # Errors
///
/// Returns an error if features and labels disagree on row count, or if
/// either partition would be empty
pub fn train_test_split(features: &Array2<f64>, labels: &Array2<f64>, test_fraction: f64, seed: u64) -> Result<Split> {
    let n = features.nrows();
    if labels.nrows() != n {
        return Err(Error::TrainingData(format!(
            "{n} feature rows but {} label rows",
            labels.nrows()
        )));
    }

    let n_test = test_size(n, test_fraction);
    if n_test == 0 || n_test >= n {
        return Err(Error::TrainingData(format!(
            "Cannot split {n} rows into non-empty train and test sets"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok(Split {
        x_train: features.select(Axis(0), train_idx),
        x_test: features.select(Axis(0), test_idx),
        y_train: labels.select(Axis(0), train_idx),
        y_test: labels.select(Axis(0), test_idx),
    })
}

/// Dense layer shape for the model summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: &'static str,
    pub inputs: usize,
    pub outputs: usize,
}

impl LayerSummary {
    /// Weights plus biases
    #[must_use]
    pub const fn parameters(&self) -> usize {
        self.inputs * self.outputs + self.outputs
    }
}

const LAYERS: [LayerSummary; 3] = [
    LayerSummary {
        name: "dense_1",
        inputs: NUM_EYE_METRICS,
        outputs: HIDDEN_1,
    },
    LayerSummary {
        name: "dense_2",
        inputs: HIDDEN_1,
        outputs: HIDDEN_2,
    },
    LayerSummary {
        name: "dense_3",
        inputs: HIDDEN_2,
        outputs: NUM_OUTPUTS,
    },
];

/// Feed-forward cursor position regressor
pub struct CursorRegressor {
    varmap: VarMap,
    device: Device,
    dense_1: Linear,
    dense_2: Linear,
    dense_3: Linear,
}

impl CursorRegressor {
    /// Create a freshly initialized model on the CPU
    ///
    /// # Errors
    ///
    /// Returns an error if the layers cannot be created
    pub fn new() -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let dense_1 = linear(LAYERS[0].inputs, LAYERS[0].outputs, vb.pp(LAYERS[0].name))?;
        let dense_2 = linear(LAYERS[1].inputs, LAYERS[1].outputs, vb.pp(LAYERS[1].name))?;
        let dense_3 = linear(LAYERS[2].inputs, LAYERS[2].outputs, vb.pp(LAYERS[2].name))?;

        Ok(Self {
            varmap,
            device,
            dense_1,
            dense_2,
            dense_3,
        })
    }

    /// Load a model saved with [`CursorRegressor::save`]
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match the layout
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut model = Self::new()?;
        model.varmap.load(path)?;
        Ok(model)
    }

    /// Write the weights as safetensors
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Layer shapes in order
    #[must_use]
    pub fn summary(&self) -> &'static [LayerSummary] {
        &LAYERS
    }

    /// Total trainable parameters
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        LAYERS.iter().map(LayerSummary::parameters).sum()
    }

    /// Predict cursor positions for an `N x 33` feature matrix
    ///
    /// # Errors
    ///
    /// Returns an error if the feature matrix has the wrong width
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let x = self.to_tensor(features, NUM_EYE_METRICS)?;
        let y = self.forward(&x)?;
        let rows = y.to_dtype(DType::F64)?.to_vec2::<f64>()?;
        let n = rows.len();
        Array2::from_shape_vec((n, NUM_OUTPUTS), rows.into_iter().flatten().collect()).map_err(Error::from)
    }

    fn to_tensor(&self, matrix: &Array2<f64>, width: usize) -> Result<Tensor> {
        if matrix.ncols() != width {
            return Err(Error::InvalidInput(format!(
                "Expected {width} columns, got {}",
                matrix.ncols()
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let data: Vec<f32> = matrix.iter().map(|&v| v as f32).collect();
        Ok(Tensor::from_vec(data, (matrix.nrows(), width), &self.device)?)
    }
}

impl Module for CursorRegressor {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.dense_1.forward(x)?.relu()?;
        let x = self.dense_2.forward(&x)?;
        self.dense_3.forward(&x)?.relu()
    }
}

fn mae(pred: &Tensor, target: &Tensor) -> candle_core::Result<Tensor> {
    (pred - target)?.abs()?.mean_all()
}

/// Loss curve and held-out error of one training run
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    /// Mean training loss per epoch
    pub loss: Vec<f32>,
    /// Validation loss per epoch
    pub val_loss: Vec<f32>,
    /// MAE on the held-out test set
    pub test_loss: f32,
}

/// Fit a fresh model on a training matrix and save it to `model_path`
///
/// # Errors
///
/// Returns an error if the matrix is malformed, too small to split, or the
/// model cannot be saved
pub fn train<P: AsRef<Path>>(matrix: &Array2<f64>, model_path: P) -> Result<TrainingReport> {
    let (features, labels) = split_features_labels(matrix)?;
    let split = train_test_split(&features, &labels, TEST_FRACTION, SPLIT_SEED)?;
    info!(
        "Split {} rows into {} train and {} test",
        matrix.nrows(),
        split.x_train.nrows(),
        split.x_test.nrows()
    );

    let model = CursorRegressor::new()?;
    for layer in model.summary() {
        info!(
            "{:<8} ({:>2} -> {:>2})  params {}",
            layer.name,
            layer.inputs,
            layer.outputs,
            layer.parameters()
        );
    }
    info!("Total params: {}", model.parameter_count());

    let mut report = fit(&model, &split.x_train, &split.y_train)?;

    let x_test = model.to_tensor(&split.x_test, NUM_EYE_METRICS)?;
    let y_test = model.to_tensor(&split.y_test, NUM_OUTPUTS)?;
    report.test_loss = mae(&model.forward(&x_test)?, &y_test)?.to_scalar::<f32>()?;
    info!("Test MAE: {:.4}", report.test_loss);

    let model_path = model_path.as_ref();
    model.save(model_path)?;
    info!("Model saved to {}", model_path.display());

    Ok(report)
}

/// Epoch loop: the trailing 20% of rows validate, the rest train in shuffled batches
fn fit(model: &CursorRegressor, x: &Array2<f64>, y: &Array2<f64>) -> Result<TrainingReport> {
    let n = x.nrows();
    let n_train = n - test_size(n, VALIDATION_FRACTION);
    if n_train == 0 {
        return Err(Error::TrainingData("No rows left for training".to_string()));
    }

    let x_all = model.to_tensor(x, NUM_EYE_METRICS)?;
    let y_all = model.to_tensor(y, NUM_OUTPUTS)?;
    let x_train = x_all.narrow(0, 0, n_train)?;
    let y_train = y_all.narrow(0, 0, n_train)?;
    let validation = (n_train < n)
        .then(|| -> candle_core::Result<(Tensor, Tensor)> {
            Ok((x_all.narrow(0, n_train, n - n_train)?, y_all.narrow(0, n_train, n - n_train)?))
        })
        .transpose()?;

    let params = ParamsAdamW {
        lr: LEARNING_RATE,
        weight_decay: 0.0,
        ..ParamsAdamW::default()
    };
    let mut optimizer = AdamW::new(model.varmap.all_vars(), params)?;
    let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
    let mut order: Vec<u32> = (0..u32::try_from(n_train).map_err(|e| Error::TrainingData(e.to_string()))?).collect();
    let mut report = TrainingReport::default();

    for epoch in 1..=EPOCHS {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0;
        let mut batches = 0_u32;

        for chunk in order.chunks(BATCH_SIZE) {
            let idx = Tensor::new(chunk, &model.device)?;
            let xb = x_train.index_select(&idx, 0)?;
            let yb = y_train.index_select(&idx, 0)?;

            let loss = mae(&model.forward(&xb)?, &yb)?;
            optimizer.backward_step(&loss)?;
            epoch_loss += loss.to_scalar::<f32>()?;
            batches += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let loss = epoch_loss / batches as f32;
        let val_loss = match &validation {
            Some((xv, yv)) => mae(&model.forward(xv)?, yv)?.to_scalar::<f32>()?,
            None => f32::NAN,
        };
        debug!("Epoch {epoch}/{EPOCHS} - {batches} batches");
        info!("Epoch {epoch}/{EPOCHS} - loss: {loss:.4} - val_loss: {val_loss:.4}");
        report.loss.push(loss);
        report.val_loss.push(val_loss);
    }

    Ok(report)
}
