// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! One-call conversion pipeline: validate, build, calibrate, apply

use ann2snn_config::{validate_config, CalibrationStrategy, ConversionConfig};
use ann2snn_conversion::{
    AnnModel, BuildOptions, CalibrationResult, Calibrator, ConversionError, ConversionResult,
    DataNorm, FewSpike, NetworkBuilder, SampleSet, SpikeNorm, SpikingNetwork,
};
use ann2snn_neural::ModelRegistry;
use ann2snn_observability::{init_logging, CrateDebugFlags, LoggingConfig, LoggingGuard};
use ann2snn_runtime::SpikingRuntime;
use ndarray::ArrayD;
use tracing::info;

/// A built and calibrated network
#[derive(Debug)]
pub struct Conversion {
    pub network: SpikingNetwork,
    /// `None` when the strategy is `none`
    pub calibration: Option<CalibrationResult>,
}

/// Wrap calibration data using the configured calibration batch size
pub fn calibration_samples(
    data: ArrayD<f32>,
    config: &ConversionConfig,
) -> ConversionResult<SampleSet> {
    SampleSet::new(data, config.calibration.batch_size)
}

/// Build `ann` inside `runtime` and calibrate it per `config`
///
/// `calibration_samples` is required by `data_norm` and `spike_norm` and
/// ignored otherwise.
///
/// # Errors
/// Configuration validation errors, any build error, and any calibration
/// error. Missing samples for a data-driven strategy are `EmptySampleSet`.
pub fn convert<A, R>(
    ann: &A,
    config: &ConversionConfig,
    registry: &ModelRegistry,
    runtime: &mut R,
    calibration_samples: Option<&SampleSet>,
) -> ConversionResult<Conversion>
where
    A: AnnModel,
    R: SpikingRuntime,
{
    validate_config(config)?;
    let options = BuildOptions::from_config(config)?;
    let network = NetworkBuilder::new(registry, &options).build(ann, runtime)?;

    let strategy = config.calibration.strategy;
    let calibration = match strategy {
        CalibrationStrategy::None => None,
        CalibrationStrategy::DataNorm => {
            let samples = calibration_samples.ok_or(ConversionError::EmptySampleSet)?;
            Some(DataNorm::new(ann).calibrate(&network, &mut *runtime, samples)?)
        }
        CalibrationStrategy::SpikeNorm => {
            let samples = calibration_samples.ok_or(ConversionError::EmptySampleSet)?;
            let calibrator = SpikeNorm::new(config.calibration.norm_time as f64);
            Some(calibrator.calibrate(&network, &mut *runtime, samples)?)
        }
        CalibrationStrategy::FewSpike => Some(CalibrationResult::FewSpike(
            FewSpike::from_config(&config.few_spike).schedules(&network)?,
        )),
    };

    if let Some(result) = &calibration {
        result.apply(&network, runtime)?;
    }
    info!(
        "Conversion complete: {} layers, strategy {}",
        network.layers().len(),
        strategy.as_str()
    );

    Ok(Conversion {
        network,
        calibration,
    })
}

/// Initialise `tracing` from the `[logging]` configuration section
pub fn init_logging_from_config(config: &ConversionConfig) -> anyhow::Result<LoggingGuard> {
    let flags = CrateDebugFlags::from_crate_list(&config.logging.debug_crates);
    let logging = LoggingConfig {
        level: config.logging.level.clone(),
        log_dir: config.logging.log_dir.clone(),
        ..LoggingConfig::default()
    };
    init_logging(&flags, &logging)
}
