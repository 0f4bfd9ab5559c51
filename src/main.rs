//! Cornea tracker: capture eye features, export sessions and train the cursor regressor.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cornea_tracker::{
    app::{AppConfig, CaptureApp, FrameSource, ImageDirSource},
    config::{Config, EXAMPLE_CONFIG},
    cornea_reader::CorneaReader,
    cursor_control::{CursorController, CursorPosition, FixedCursor},
    features::IrisCenter,
    landmarks::LandmarkDetector,
    session::SessionStore,
    trainer,
};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract eye features from frames, optionally recording a session
    Capture {
        /// Camera index to use
        #[arg(long)]
        cam: Option<i32>,

        /// Read frames from a directory of images instead of the camera
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Session name to record samples into
        #[arg(short, long)]
        session: Option<String>,

        /// Root directory for sessions
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Face detection ONNX model
        #[arg(long)]
        face_model: Option<PathBuf>,

        /// Face mesh ONNX model
        #[arg(long)]
        model: Option<PathBuf>,

        /// Iris centre source: "landmark" or "cluster"
        #[arg(long, value_parser = parse_iris_center)]
        iris_center: Option<IrisCenter>,

        /// Use a fixed cursor position "x,y" instead of querying X11
        #[arg(long, value_parser = parse_position)]
        cursor: Option<(i32, i32)>,

        /// Number of recent feature rows to keep
        #[arg(long)]
        history: Option<usize>,

        /// Disable the preview windows
        #[arg(long)]
        no_preview: bool,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<usize>,
    },

    /// Aggregate a recorded session into an N x 35 training matrix
    Export {
        /// Session name
        session: String,

        /// Output `.npy` file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Root directory for sessions
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Train the cursor regressor on a training matrix
    Train {
        /// Input `.npy` training matrix
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output model file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an example configuration file
    Config,
}

fn parse_position(value: &str) -> std::result::Result<(i32, i32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{value}'"))?;
    let x = x.trim().parse().map_err(|e| format!("invalid x: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("invalid y: {e}"))?;
    Ok((x, y))
}

fn parse_iris_center(value: &str) -> std::result::Result<IrisCenter, String> {
    value.parse::<IrisCenter>().map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Cornea Tracker");

    // Load configuration if provided
    let config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config file {}", config_path.display()))?
    } else {
        Config::default()
    };

    match args.command {
        Command::Capture {
            cam,
            frames,
            session,
            data_dir,
            face_model,
            model,
            iris_center,
            cursor,
            history,
            no_preview,
            max_frames,
        } => {
            let mut config = config;
            if let Some(cam) = cam {
                config.capture.camera = cam;
            }
            if session.is_some() {
                config.capture.session = session;
            }
            if let Some(data_dir) = data_dir {
                config.capture.data_dir = data_dir;
            }
            if let Some(face_model) = face_model {
                config.models.face_detector = face_model;
            }
            if let Some(model) = model {
                config.models.face_mesh = model;
            }
            if let Some(iris_center) = iris_center {
                config.capture.iris_center = iris_center;
            }
            if let Some(history) = history {
                config.capture.history_size = history;
            }
            if no_preview {
                config.capture.show_preview = false;
            }
            config.validate()?;

            run_capture(&config, frames.as_deref(), cursor, max_frames)
        }
        Command::Export {
            session,
            output,
            data_dir,
        } => {
            let store = SessionStore::new(data_dir.unwrap_or(config.capture.data_dir));
            let output = output.unwrap_or_else(|| store.root().join(format!("{session}.npy")));
            let rows = store
                .export_training_matrix(&session, &output)
                .with_context(|| format!("Failed to export session '{session}'"))?;
            info!("Exported {} samples to {}", rows, output.display());
            Ok(())
        }
        Command::Train { input, output } => {
            let input = input.unwrap_or(config.training.matrix);
            let output = output.unwrap_or(config.training.model_output);
            let matrix = trainer::load_matrix(&input)
                .with_context(|| format!("Failed to load training matrix {}", input.display()))?;
            let report = trainer::train(&matrix, &output)?;
            info!("Training done, test MAE {:.4}", report.test_loss);
            Ok(())
        }
        Command::Config => {
            print!("{EXAMPLE_CONFIG}");
            Ok(())
        }
    }
}

fn run_capture(config: &Config, frames: Option<&Path>, cursor: Option<(i32, i32)>, max_frames: Option<usize>) -> Result<()> {
    let source: Box<dyn FrameSource> = match frames {
        Some(dir) => Box::new(ImageDirSource::new(dir)?),
        None => open_camera(config.capture.camera)?,
    };

    let cursor: Box<dyn CursorPosition> = match cursor {
        Some((x, y)) => Box::new(FixedCursor::new(x, y)),
        None => Box::new(CursorController::new()?),
    };

    config.validate_models()?;
    let reader = CorneaReader::new(load_detector(config)?, cursor, SessionStore::new(&config.capture.data_dir))
        .with_iris_center(config.capture.iris_center);

    let app_config = AppConfig {
        session: config.capture.session.clone(),
        history_size: config.capture.history_size,
        show_preview: config.capture.show_preview && frames.is_none(),
        max_frames,
    };

    let mut app = CaptureApp::new(app_config, reader, source)?;
    let stats = app.run()?;
    info!("Recorded {} samples", stats.samples);
    Ok(())
}

#[cfg(feature = "onnx")]
fn load_detector(config: &Config) -> Result<Box<dyn LandmarkDetector>> {
    let models = &config.models;
    let detector = cornea_tracker::mark_detection::FaceMeshDetector::new(
        &models.face_detector,
        &models.face_mesh,
        &config.face_detection,
    )
    .with_context(|| {
        format!(
            "Failed to load face models {} and {}",
            models.face_detector.display(),
            models.face_mesh.display()
        )
    })?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "onnx"))]
fn load_detector(_config: &Config) -> Result<Box<dyn LandmarkDetector>> {
    anyhow::bail!("Built without the onnx feature; rebuild with --features onnx to capture")
}

#[cfg(feature = "camera")]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(cornea_tracker::app::CameraSource::new(index)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_index: i32) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("Built without the camera feature; pass --frames <dir> or rebuild with --features camera")
}
