//! Neuron-Core: structure-tensor feature detection for 3D image stacks
//!
//! This crate scores every voxel of a volume by how strongly the local
//! intensity structure varies in all three directions, which highlights
//! compact blob-like objects such as neuron cell bodies.
//!
//! # Modules
//! - `kernel`: Sum-normalized 3D Gaussian weighting kernel
//! - `tensor`: Gradient, structure tensor, windowed aggregation
//! - `eigen`: Symmetric 3x3 eigen-decomposition (Householder + QL)
//! - `measure`: Noble and eigenvalue-combination measures, normalization
//! - `downsample`: Gaussian-weighted decimation
//! - `pipeline`: Staged end-to-end pipeline
//! - `eigen_io`, `nifti_io`, `export`: Interchange and visual output
//! - `utils`: SIMD-accelerated reductions

// Core modules
pub mod config;
pub mod error;
pub mod progress;
pub mod volume;

// Algorithm modules
pub mod downsample;
pub mod eigen;
pub mod kernel;
pub mod measure;
pub mod pipeline;
pub mod tensor;
pub mod utils;

// I/O modules
pub mod eigen_io;
pub mod export;
pub mod nifti_io;

pub use config::{DownsampleConfig, MeasureVariant, PipelineConfig};
pub use downsample::downsample;
pub use eigen::EigenSpectrum;
pub use error::{NeuronError, Result};
pub use kernel::GaussianKernel;
pub use measure::Measure;
pub use pipeline::{build_pipeline, build_pipeline_with_config, Analysis, Phase, Pipeline};
pub use volume::{Dims, Volume};
