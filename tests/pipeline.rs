//! End-to-end tests of the detection pipeline on synthetic volumes

mod common;

use approx::assert_abs_diff_eq;
use neuron_core::eigen::is_sentinel;
use neuron_core::{
    build_pipeline, build_pipeline_with_config, downsample, eigen_io, export, nifti_io, Dims,
    MeasureVariant, NeuronError, Pipeline, PipelineConfig, Volume,
};

use common::{bright_voxel, chebyshev, init_logging, rmse};

const NOBLE_CONSTANT: f64 = 0.00005;

fn variants() -> [MeasureVariant; 2] {
    [
        MeasureVariant::Noble { constant: NOBLE_CONSTANT },
        MeasureVariant::default(),
    ]
}

#[test]
fn test_constant_volume_is_undefined() {
    init_logging();
    let vol = Volume::filled(Dims::new(4, 4, 4), 0.5).unwrap();
    let result = build_pipeline(vol, 3, 0.8, NOBLE_CONSTANT);
    assert!(matches!(result, Err(NeuronError::Configuration(_))));
}

#[test]
fn test_bright_voxel_peak_is_local() {
    init_logging();
    let cases = [
        (5, (2, 2, 2)),
        (7, (3, 3, 3)),
        (6, (2, 3, 1)),
        (7, (1, 2, 4)),
    ];
    for (n, at) in cases {
        for variant in variants() {
            let config = PipelineConfig {
                window_size: 3,
                standard_deviation: 0.8,
                measure: variant,
                ..Default::default()
            };
            let measure = build_pipeline_with_config(bright_voxel(n, at), config).unwrap();
            assert_eq!(measure.dims, Dims::new(n, n, n));
            assert!(measure.values.iter().all(|v| v.is_finite()));

            let (peak, value) = measure.argmax().unwrap();
            assert_abs_diff_eq!(value, 1.0, epsilon = 1e-12);
            assert!(
                chebyshev(peak, at) <= 1,
                "{:?}: peak {:?} too far from {:?} in n={}",
                variant,
                peak,
                at,
                n
            );
        }
    }
}

#[test]
fn test_build_pipeline_matches_noble_config() {
    let a = build_pipeline(bright_voxel(5, (2, 2, 2)), 3, 0.8, NOBLE_CONSTANT).unwrap();
    let config: PipelineConfig = serde_json::from_str(
        r#"{"window_size": 3, "standard_deviation": 0.8,
            "measure": {"kind": "noble", "constant": 0.00005}}"#,
    )
    .unwrap();
    let b = build_pipeline_with_config(bright_voxel(5, (2, 2, 2)), config).unwrap();
    assert_eq!(a.dims, b.dims);
    assert!(rmse(&a.values, &b.values) < 1e-12);
}

#[test]
fn test_downsample_identity() {
    let dims = Dims::new(3, 4, 5);
    let data: Vec<f64> = (0..dims.len()).map(|i| (i as f64 * 0.37).sin()).collect();
    let vol = Volume::new(dims, data).unwrap();
    let out = downsample(&vol, 1, 0.8).unwrap();
    assert_eq!(out, vol);
}

#[test]
fn test_downsampled_run_shrinks_extents() {
    let config = PipelineConfig {
        downsample: Some(neuron_core::DownsampleConfig::default()),
        ..Default::default()
    };
    let analysis = Pipeline::new(config).unwrap().analyze(bright_voxel(9, (4, 4, 4))).unwrap();
    assert_eq!(analysis.dims(), Dims::new(4, 4, 4));
    assert_eq!(analysis.eigen_spectrum().values.len(), 64);
}

#[test]
fn test_spectrum_file_roundtrip() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let analysis = pipeline.analyze(bright_voxel(5, (2, 2, 2))).unwrap();
    let spectrum = analysis.eigen_spectrum();
    let scale = spectrum.max_value();
    assert!(scale > 0.0);

    let dir = tempfile::tempdir().unwrap();
    for name in ["eigen.txt", "eigen.txt.gz"] {
        let path = dir.path().join(name);
        eigen_io::save_spectrum_file(&path, spectrum).unwrap();
        let loaded = eigen_io::load_spectrum_file(&path).unwrap();
        assert_eq!(loaded.dims, spectrum.dims);
        for (a, b) in loaded.values.iter().zip(&spectrum.values) {
            assert!(!is_sentinel(a));
            for c in 0..3 {
                assert_abs_diff_eq!(a[c], b[c], epsilon = 1e-12 * scale);
            }
        }
    }
}

#[test]
fn test_exports_cover_every_voxel() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let analysis = pipeline.analyze(bright_voxel(5, (2, 2, 2))).unwrap();
    let measure = analysis.measure(MeasureVariant::default()).unwrap();

    let rgb = export::eigen_to_rgb(analysis.eigen_spectrum());
    assert_eq!(rgb.len(), 125);
    // the largest |λ2| maps to full blue somewhere
    assert!(rgb.iter().any(|px| px[2] == 255));

    let gray = export::measure_to_gray(&measure);
    let ((z, y, x), _) = measure.argmax().unwrap();
    assert_eq!(gray[measure.dims.index(z, y, x)], 255);

    let planes = export::kernel_planes(pipeline.kernel());
    assert_eq!(planes.len(), 3);
}

#[test]
fn test_nifti_input_runs_like_in_memory() {
    let vol = bright_voxel(6, (2, 3, 1));
    let bytes = nifti_io::save_volume_nifti(&vol).unwrap();
    let loaded = nifti_io::load_volume_nifti(&bytes).unwrap();
    assert_eq!(loaded.volume, vol);

    let expected = build_pipeline(vol, 3, 0.8, NOBLE_CONSTANT).unwrap();
    let actual = build_pipeline(loaded.volume, 3, 0.8, NOBLE_CONSTANT).unwrap();
    assert_eq!(actual.argmax(), expected.argmax());
}
