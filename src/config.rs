//! Pipeline configuration
//!
//! All parameters are validated once, before any voxel is touched.

use serde::{Deserialize, Serialize};

use crate::error::{NeuronError, Result};

/// Combination constant for the eigenvalue measure.
pub const DEFAULT_EIGEN_K: f64 = 0.06;

/// How the three eigenvalues (or the tensor itself) reduce to one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasureVariant {
    /// `2·det(T) / (trace(T)² + constant)`, computed from the aggregated tensor.
    Noble { constant: f64 },
    /// `k·(λ0+λ1+λ2)² − λ0·λ1·λ2` over the absolute eigenvalues. Can be
    /// negative, and negative values survive normalization unclamped.
    EigenCombination { k: f64 },
}

impl Default for MeasureVariant {
    fn default() -> Self {
        MeasureVariant::EigenCombination { k: DEFAULT_EIGEN_K }
    }
}

impl MeasureVariant {
    /// Whether this variant reads the aggregated tensor rather than the eigenvalues.
    pub fn needs_tensor(&self) -> bool {
        matches!(self, MeasureVariant::Noble { .. })
    }
}

/// Parameters of the optional block-downsampling stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownsampleConfig {
    /// Block side length `m`; the output is `⌊extent / m⌋` along every axis.
    pub magnification: usize,
    /// Base sigma; the kernel uses `base_standard_deviation * m / 2`.
    pub base_standard_deviation: f64,
}

impl Default for DownsampleConfig {
    fn default() -> Self {
        Self {
            magnification: 2,
            base_standard_deviation: 0.8,
        }
    }
}

impl DownsampleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.magnification == 0 {
            return Err(NeuronError::Configuration(
                "magnification must be >= 1, got 0".to_string(),
            ));
        }
        if !(self.base_standard_deviation > 0.0) || !self.base_standard_deviation.is_finite() {
            return Err(NeuronError::Configuration(format!(
                "base_standard_deviation must be > 0, got {}",
                self.base_standard_deviation
            )));
        }
        Ok(())
    }

    /// Effective sigma of the downsampling kernel.
    pub fn kernel_standard_deviation(&self) -> f64 {
        self.base_standard_deviation * self.magnification as f64 / 2.0
    }
}

/// Parameters for one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Side of the cubic aggregation window and of its Gaussian kernel.
    pub window_size: usize,
    /// Gaussian sigma of the aggregation kernel.
    pub standard_deviation: f64,
    /// Measure reduction used for this run.
    #[serde(default)]
    pub measure: MeasureVariant,
    /// Keep the aggregated tensor field after eigen-decomposition.
    #[serde(default)]
    pub retain_tensor: bool,
    /// Optional downsampling applied to the input before detection.
    #[serde(default)]
    pub downsample: Option<DownsampleConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            standard_deviation: 0.8,
            measure: MeasureVariant::default(),
            retain_tensor: false,
            downsample: None,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.window_size < 1 {
            return Err(NeuronError::Configuration(format!(
                "window_size must be >= 1, got {}",
                self.window_size
            )));
        }
        if !(self.standard_deviation > 0.0) || !self.standard_deviation.is_finite() {
            return Err(NeuronError::Configuration(format!(
                "standard_deviation must be > 0, got {}",
                self.standard_deviation
            )));
        }
        match self.measure {
            MeasureVariant::Noble { constant } => {
                if !(constant > 0.0) || !constant.is_finite() {
                    return Err(NeuronError::Configuration(format!(
                        "Noble measure constant must be > 0, got {}",
                        constant
                    )));
                }
            }
            MeasureVariant::EigenCombination { k } => {
                if !k.is_finite() {
                    return Err(NeuronError::Configuration(format!(
                        "eigen combination constant must be finite, got {}",
                        k
                    )));
                }
            }
        }
        if let Some(ds) = &self.downsample {
            ds.validate()?;
        }
        Ok(())
    }
}
