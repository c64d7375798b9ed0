use thiserror::Error;

/// Errors raised by the detection pipeline and its I/O adapters.
#[derive(Error, Debug)]
pub enum NeuronError {
    /// Caller supplied parameters the pipeline cannot run with.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Volume planes do not share uniform extents.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Eigen-decomposition failed for too many voxels.
    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed interchange or NIfTI data.
    #[error("Format error: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, NeuronError>;
