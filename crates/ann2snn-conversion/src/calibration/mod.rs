// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Threshold calibration strategies.

A [`Calibrator`] inspects the analog network and/or simulates the spiking
network, producing a [`CalibrationResult`] that is then applied to the
network once:

- [`DataNorm`]: thresholds from maximum analog activations
- [`SpikeNorm`]: thresholds from maximum simulated membrane input, layer by layer
- [`FewSpike`]: fixed temporal-code schedules, no statistics
*/

pub mod data_norm;
pub mod few_spike;
pub mod spike_norm;

pub use data_norm::{DataNorm, DataNormResult};
pub use few_spike::{FewSpike, FewSpikeResult};
pub use spike_norm::{SpikeNorm, SpikeNormResult};

use crate::error::{ConversionError, ConversionResult};
use crate::network::SpikingNetwork;
use crate::samples::SampleSet;
use ann2snn_runtime::SpikingRuntime;

/// A threshold calibration strategy
pub trait Calibrator {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Derive per-layer calibration for `network`
    ///
    /// Strategies that simulate the network leave the runtime in whatever
    /// state their last presentation produced.
    fn calibrate(
        &self,
        network: &SpikingNetwork,
        runtime: &mut dyn SpikingRuntime,
        samples: &SampleSet,
    ) -> ConversionResult<CalibrationResult>;
}

/// Outcome of one calibration pass
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationResult {
    DataNorm(DataNormResult),
    SpikeNorm(SpikeNormResult),
    FewSpike(FewSpikeResult),
}

impl CalibrationResult {
    pub fn strategy(&self) -> &'static str {
        match self {
            CalibrationResult::DataNorm(_) => "data_norm",
            CalibrationResult::SpikeNorm(_) => "spike_norm",
            CalibrationResult::FewSpike(_) => "few_spike",
        }
    }

    /// Write the result into the network's runtime state
    pub fn apply<R: SpikingRuntime + ?Sized>(
        &self,
        network: &SpikingNetwork,
        runtime: &mut R,
    ) -> ConversionResult<()> {
        match self {
            CalibrationResult::DataNorm(result) => result.apply(network, runtime),
            CalibrationResult::SpikeNorm(result) => result.apply(network, runtime),
            CalibrationResult::FewSpike(result) => result.apply(network, runtime),
        }
    }
}

/// Set one threshold per weighted layer, rejecting non-positive values
pub(crate) fn apply_thresholds<R: SpikingRuntime + ?Sized>(
    network: &SpikingNetwork,
    runtime: &mut R,
    thresholds: &[f64],
) -> ConversionResult<()> {
    let weighted = network.weighted_layer_indices();
    if weighted.len() != thresholds.len() {
        return Err(ConversionError::InvalidInput(format!(
            "{} thresholds for {} weighted layers",
            thresholds.len(),
            weighted.len()
        )));
    }
    for (&layer, &threshold) in weighted.iter().zip(thresholds) {
        check_positive(network_layer_name(network, layer), threshold)?;
    }
    for (&layer, &threshold) in weighted.iter().zip(thresholds) {
        network.set_threshold(runtime, layer, threshold as f32)?;
    }
    Ok(())
}

pub(crate) fn check_positive(layer: &str, value: f64) -> ConversionResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConversionError::DegenerateScale {
            layer: layer.to_string(),
            value,
        })
    }
}

fn network_layer_name(network: &SpikingNetwork, index: usize) -> &str {
    network.layer(index).map(|l| l.name.as_str()).unwrap_or("?")
}
