//! End-to-end detection pipeline
//!
//! Phases run strictly in sequence, each data-parallel over z planes:
//! gradient → structure tensor → aggregation → eigen-decomposition → measure.
//! Each phase consumes or borrows the previous buffer and returns a new one;
//! buffers are dropped as soon as no later phase reads them, so at most two
//! full-volume fields are alive at once:
//! - the raw volume is released once the gradient exists
//! - the gradient is consumed by the structure tensor
//! - the structure tensor is released once aggregation finishes
//! - the aggregated tensor is kept only if the Noble measure or the caller needs it

use log::info;

use crate::config::{MeasureVariant, PipelineConfig};
use crate::downsample::{downsample, downsample_with_progress};
use crate::eigen::{solve_field, solve_field_with_progress, EigenSpectrum};
use crate::error::Result;
use crate::kernel::GaussianKernel;
use crate::measure::{self, Measure};
use crate::tensor::{
    aggregate, aggregate_with_progress, build_structure_tensor, estimate_gradient,
    estimate_gradient_with_progress, TensorField,
};
use crate::volume::{Dims, Volume};

/// Phase reported to a progress observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downsample,
    Gradient,
    Aggregate,
    Eigen,
}

/// Observer invoked as `(phase, units_done, units_total)`.
pub type ProgressObserver<'a> = &'a (dyn Fn(Phase, usize, usize) + Sync);

/// Eigen-spectrum and, when requested, the aggregated tensor of one run.
#[derive(Debug, Clone)]
pub struct Analysis {
    dims: Dims,
    spectrum: EigenSpectrum,
    tensor: Option<TensorField>,
}

impl Analysis {
    pub fn dims(&self) -> Dims {
        self.dims
    }

    pub fn eigen_spectrum(&self) -> &EigenSpectrum {
        &self.spectrum
    }

    /// Aggregated tensor, present when retained or needed by the Noble measure.
    pub fn aggregated_tensor(&self) -> Option<&TensorField> {
        self.tensor.as_ref()
    }

    /// Reduce to the normalized measure for `variant`.
    pub fn measure(&self, variant: MeasureVariant) -> Result<Measure> {
        measure::compute(variant, self.dims, Some(&self.spectrum), self.tensor.as_ref())
    }

    pub fn into_parts(self) -> (EigenSpectrum, Option<TensorField>) {
        (self.spectrum, self.tensor)
    }
}

/// Configured detection pipeline. The aggregation kernel is built once.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    kernel: GaussianKernel,
    observer: Option<ProgressObserver<'a>>,
}

impl<'a> Pipeline<'a> {
    /// Validate `config` and build the aggregation kernel.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let kernel = GaussianKernel::new(config.window_size, config.standard_deviation)?;
        Ok(Self { config, kernel, observer: None })
    }

    /// Report per-phase progress to `observer`.
    pub fn with_progress(mut self, observer: ProgressObserver<'a>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn kernel(&self) -> &GaussianKernel {
        &self.kernel
    }

    /// Run phases up to and including eigen-decomposition, consuming `volume`.
    pub fn analyze(&self, volume: Volume) -> Result<Analysis> {
        let volume = match &self.config.downsample {
            Some(ds) => {
                let coarse = match self.observer {
                    Some(obs) => downsample_with_progress(
                        &volume,
                        ds.magnification,
                        ds.base_standard_deviation,
                        &|d, t| obs(Phase::Downsample, d, t),
                    )?,
                    None => downsample(&volume, ds.magnification, ds.base_standard_deviation)?,
                };
                drop(volume);
                coarse
            }
            None => volume,
        };

        let dims = volume.dims();
        info!(
            "Detection on {:?}: window={} sd={} measure={:?}",
            dims.as_tuple(),
            self.config.window_size,
            self.config.standard_deviation,
            self.config.measure
        );

        let gradient = match self.observer {
            Some(obs) => estimate_gradient_with_progress(&volume, &|d, t| obs(Phase::Gradient, d, t)),
            None => estimate_gradient(&volume),
        };
        drop(volume);

        let structure = build_structure_tensor(gradient);

        let aggregated = match self.observer {
            Some(obs) => {
                aggregate_with_progress(&structure, &self.kernel, &|d, t| obs(Phase::Aggregate, d, t))
            }
            None => aggregate(&structure, &self.kernel),
        };
        drop(structure);

        let spectrum = match self.observer {
            Some(obs) => solve_field_with_progress(&aggregated, &|d, t| obs(Phase::Eigen, d, t))?,
            None => solve_field(&aggregated)?,
        };

        let tensor = if self.config.retain_tensor || self.config.measure.needs_tensor() {
            Some(aggregated)
        } else {
            None
        };

        Ok(Analysis { dims, spectrum, tensor })
    }

    /// Run every phase and return the normalized measure.
    pub fn run(&self, volume: Volume) -> Result<Measure> {
        let analysis = self.analyze(volume)?;
        analysis.measure(self.config.measure)
    }
}

/// Run the full pipeline with the Noble measure constant `measure_constant`.
pub fn build_pipeline(
    volume: Volume,
    window_size: usize,
    standard_deviation: f64,
    measure_constant: f64,
) -> Result<Measure> {
    let config = PipelineConfig {
        window_size,
        standard_deviation,
        measure: MeasureVariant::Noble { constant: measure_constant },
        ..Default::default()
    };
    Pipeline::new(config)?.run(volume)
}

/// Run the full pipeline described by `config`.
pub fn build_pipeline_with_config(volume: Volume, config: PipelineConfig) -> Result<Measure> {
    Pipeline::new(config)?.run(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownsampleConfig;
    use crate::error::NeuronError;
    use std::sync::Mutex;

    fn bright_voxel(n: usize, at: (usize, usize, usize)) -> Volume {
        let dims = Dims::new(n, n, n);
        let mut data = vec![0.0; dims.len()];
        data[dims.index(at.0, at.1, at.2)] = 1.0;
        Volume::new(dims, data).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config_up_front() {
        let config = PipelineConfig { window_size: 0, ..Default::default() };
        assert!(matches!(Pipeline::new(config), Err(NeuronError::Configuration(_))));
    }

    #[test]
    fn test_constant_volume_reports_undefined_normalization() {
        let vol = Volume::filled(Dims::new(4, 4, 4), 0.5).unwrap();
        let result = build_pipeline(vol, 3, 0.8, 0.00005);
        assert!(matches!(result, Err(NeuronError::Configuration(_))));
    }

    #[test]
    fn test_constant_volume_analysis_is_zero() {
        let vol = Volume::filled(Dims::new(4, 4, 4), 0.5).unwrap();
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let analysis = pipeline.analyze(vol).unwrap();
        assert!(analysis.eigen_spectrum().values.iter().all(|v| *v == [0.0; 3]));
        assert!(analysis.aggregated_tensor().is_none());
        assert!(analysis.measure(MeasureVariant::default()).is_err());
    }

    #[test]
    fn test_retain_tensor() {
        let config = PipelineConfig { retain_tensor: true, ..Default::default() };
        let pipeline = Pipeline::new(config).unwrap();
        let analysis = pipeline.analyze(bright_voxel(5, (2, 2, 2))).unwrap();
        let tensor = analysis.aggregated_tensor().unwrap();
        assert_eq!(tensor.dims, Dims::new(5, 5, 5));
        let (spectrum, tensor) = analysis.into_parts();
        assert_eq!(spectrum.values.len(), 125);
        assert!(tensor.is_some());
    }

    #[test]
    fn test_noble_keeps_tensor() {
        let config = PipelineConfig {
            measure: MeasureVariant::Noble { constant: 1e-4 },
            ..Default::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let analysis = pipeline.analyze(bright_voxel(5, (2, 2, 2))).unwrap();
        assert!(analysis.aggregated_tensor().is_some());
    }

    #[test]
    fn test_progress_phases() {
        let seen = Mutex::new(Vec::new());
        let observer = |phase: Phase, _done: usize, total: usize| {
            seen.lock().unwrap().push((phase, total));
        };
        let config = PipelineConfig {
            downsample: Some(DownsampleConfig { magnification: 2, base_standard_deviation: 0.8 }),
            ..Default::default()
        };
        let pipeline = Pipeline::new(config).unwrap().with_progress(&observer);
        let analysis = pipeline.analyze(bright_voxel(8, (4, 4, 4))).unwrap();
        assert_eq!(analysis.dims(), Dims::new(4, 4, 4));

        let seen = seen.into_inner().unwrap();
        let count = |p: Phase| seen.iter().filter(|(q, _)| *q == p).count();
        assert_eq!(count(Phase::Downsample), 4);
        assert_eq!(count(Phase::Gradient), 12);
        assert_eq!(count(Phase::Aggregate), 4);
        assert_eq!(count(Phase::Eigen), 4);
    }
}
