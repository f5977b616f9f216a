use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Fatal errors – any of these stops the run before a "results" message
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No header file provided, processing not possible: {0}")]
    InvalidInputFormat(PathBuf),

    #[error("Malformed ENVI header {path}: {reason}")]
    MalformedHeader { path: PathBuf, reason: String },

    #[error("Failed to read cube data {path}: {source}")]
    CubeRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Calibration data missing for lens angle {angle}: {path}")]
    MissingCalibrationData { angle: i32, path: PathBuf },

    #[error("Calibration data in {path} is unusable: {reason}")]
    InvalidCalibrationData { path: PathBuf, reason: String },

    #[error("Unknown spectral index selection: {0}")]
    UnknownIndexSelection(String),

    #[error("Index {index} needs {wavelength} nm, cube covers {min}–{max} nm")]
    IndexWavelengthUnavailable {
        index: &'static str,
        wavelength: f64,
        min: f64,
        max: f64,
    },

    #[error("Unknown mask strategy: {0}")]
    UnknownMaskStrategy(String),

    #[error("Plot selection '{0}' does not name a populated field")]
    InvalidPlotSelection(String),

    #[error("Mask preview requested but no outputImage configured")]
    MissingOutputImage,

    #[error("Mask is {mask:?} but cube is {cube:?}")]
    ShapeMismatch {
        mask: (usize, usize),
        cube: (usize, usize),
    },

    #[error("Notification feed closed by the consumer")]
    FeedClosed,

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
