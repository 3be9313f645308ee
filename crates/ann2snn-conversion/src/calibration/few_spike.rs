// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Few-spike schedule derivation
//!
//! Few-spike neurons carry their threshold in a fixed schedule, so
//! calibration needs no statistics: each layer's `K` and `alpha` come from
//! configuration. The input encoder uses `input_alpha`, every other layer
//! `alpha`. Applying the result checks that the runtime populations were
//! created with exactly these schedules.

use super::{CalibrationResult, Calibrator};
use crate::error::{ConversionError, ConversionResult};
use crate::network::SpikingNetwork;
use crate::samples::SampleSet;
use ann2snn_config::FewSpikeConfig;
use ann2snn_neural::FewSpikeSchedule;
use ann2snn_runtime::SpikingRuntime;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FewSpike {
    k: u32,
    alpha: f32,
    input_alpha: f32,
}

impl FewSpike {
    pub fn new(k: u32, alpha: f32, input_alpha: f32) -> Self {
        Self {
            k,
            alpha,
            input_alpha,
        }
    }

    pub fn from_config(config: &FewSpikeConfig) -> Self {
        Self::new(config.k, config.alpha, config.input_alpha)
    }

    /// Schedules for every layer of `network`, without running anything
    pub fn schedules(&self, network: &SpikingNetwork) -> ConversionResult<FewSpikeResult> {
        let mut layers = Vec::with_capacity(network.layers().len());
        let mut schedules = Vec::with_capacity(network.layers().len());
        for (index, layer) in network.layers().iter().enumerate() {
            if !layer.model.descriptor().pipelined {
                return Err(ConversionError::InvalidModel(format!(
                    "layer '{}' uses '{}', which is not a few-spike model",
                    layer.name,
                    layer.model_name()
                )));
            }
            let alpha = if index == 0 { self.input_alpha } else { self.alpha };
            let schedule = FewSpikeSchedule::new(self.k, alpha)?;
            info!(
                "[FEW-SPIKE] Layer '{}': K {}, alpha {}, scale {:e}, h_T(0) {}, d(0) {:e}, max {}",
                layer.name,
                schedule.k(),
                schedule.alpha(),
                schedule.scale(),
                schedule.threshold(0),
                schedule.decode_weight(0),
                schedule.max_value()
            );
            layers.push(layer.name.clone());
            schedules.push(schedule);
        }
        Ok(FewSpikeResult { layers, schedules })
    }
}

impl Calibrator for FewSpike {
    fn name(&self) -> &'static str {
        "few_spike"
    }

    fn calibrate(
        &self,
        network: &SpikingNetwork,
        _runtime: &mut dyn SpikingRuntime,
        _samples: &SampleSet,
    ) -> ConversionResult<CalibrationResult> {
        Ok(CalibrationResult::FewSpike(self.schedules(network)?))
    }
}

/// Few-spike schedule per layer, input layer first
#[derive(Debug, Clone, PartialEq)]
pub struct FewSpikeResult {
    pub layers: Vec<String>,
    pub schedules: Vec<FewSpikeSchedule>,
}

impl FewSpikeResult {
    pub fn schedule(&self, layer: &str) -> Option<&FewSpikeSchedule> {
        self.layers
            .iter()
            .position(|l| l == layer)
            .map(|i| &self.schedules[i])
    }

    /// Verify every replica runs with the derived schedule
    ///
    /// Schedules are fixed when populations are created, so a mismatch means
    /// the network was built from a different configuration.
    pub fn apply<R: SpikingRuntime + ?Sized>(
        &self,
        network: &SpikingNetwork,
        runtime: &mut R,
    ) -> ConversionResult<()> {
        if self.layers.len() != network.layers().len() {
            return Err(ConversionError::InvalidInput(format!(
                "{} schedules for {} layers",
                self.layers.len(),
                network.layers().len()
            )));
        }
        for (layer, schedule) in network.layers().iter().zip(&self.schedules) {
            for &pop in &layer.replicas {
                let actual = FewSpikeSchedule::from_params(runtime.population_params(pop)?)?;
                if actual != *schedule {
                    return Err(ConversionError::InvalidInput(format!(
                        "layer '{}' runs K {} alpha {}, expected K {} alpha {}",
                        layer.name,
                        actual.k(),
                        actual.alpha(),
                        schedule.k(),
                        schedule.alpha()
                    )));
                }
            }
        }
        Ok(())
    }
}
