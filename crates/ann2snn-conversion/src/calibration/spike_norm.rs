// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike-count normalization
//!
//! Every weighted layer starts with an infinite threshold so it integrates
//! without firing. Layers are then calibrated in order: the layer's `Vmem` is
//! read and cleared after every step, its running maximum over all batches
//! becomes the threshold, and the next layer is measured through the already
//! calibrated ones.
//!
//! Clearing `Vmem` each step makes the measurement the largest input a layer
//! receives in a single step.

use super::{check_positive, CalibrationResult, Calibrator};
use crate::error::{ConversionError, ConversionResult};
use crate::network::SpikingNetwork;
use crate::samples::SampleSet;
use ann2snn_runtime::SpikingRuntime;
use tracing::{debug, info, trace};

/// Membrane variable measured during calibration
pub const MEMBRANE_VAR: &str = "Vmem";

pub struct SpikeNorm {
    norm_time: f64,
}

impl SpikeNorm {
    /// Calibrate with presentations of `norm_time` simulated time units
    pub fn new(norm_time: f64) -> Self {
        Self { norm_time }
    }

    pub fn norm_time(&self) -> f64 {
        self.norm_time
    }

    /// Largest `Vmem` over the first `batch_n` replicas, zeroing it afterwards
    fn measure_layer(
        network: &SpikingNetwork,
        runtime: &mut dyn SpikingRuntime,
        layer_index: usize,
        batch_n: usize,
    ) -> ConversionResult<f64> {
        let layer = network.layer(layer_index).ok_or_else(|| {
            ConversionError::InvalidInput(format!("no layer at index {}", layer_index))
        })?;
        let mut max = f64::NEG_INFINITY;
        for &pop in layer.replicas.iter().take(batch_n) {
            runtime.pull_var_from_device(pop, MEMBRANE_VAR)?;
            let vmem = runtime.var_mut(pop, MEMBRANE_VAR)?;
            for v in vmem.iter_mut() {
                max = max.max(*v as f64);
                *v = 0.0;
            }
            runtime.push_var_to_device(pop, MEMBRANE_VAR)?;
        }
        Ok(max)
    }
}

impl SpikeNorm {
    /// Run the calibration, reporting `(layer position, running max)` after
    /// every simulated step
    pub(crate) fn calibrate_with<F>(
        &self,
        network: &SpikingNetwork,
        runtime: &mut dyn SpikingRuntime,
        samples: &SampleSet,
        mut on_step: F,
    ) -> ConversionResult<SpikeNormResult>
    where
        F: FnMut(usize, f64),
    {
        if samples.is_empty() {
            return Err(ConversionError::EmptySampleSet);
        }
        if !(self.norm_time.is_finite() && self.norm_time > 0.0) {
            return Err(ConversionError::InvalidInput(format!(
                "norm time must be positive, got {}",
                self.norm_time
            )));
        }

        let weighted = network.weighted_layer_indices();
        for &layer in &weighted {
            network.set_threshold(runtime, layer, f32::INFINITY)?;
        }

        let num_batches = samples.len().div_ceil(network.batch_size());
        let mut layers = Vec::with_capacity(weighted.len());
        let mut thresholds = Vec::with_capacity(weighted.len());
        for (position, &layer_index) in weighted.iter().enumerate() {
            let name = network
                .layer(layer_index)
                .map(|l| l.name.clone())
                .unwrap_or_default();
            let mut threshold = 0.0f64;

            for (batch_index, batch) in samples.batches_of(network.batch_size()).enumerate() {
                network.reset(runtime)?;
                let batch_n = network.set_input_batch(runtime, batch)?;
                while runtime.time() < self.norm_time {
                    runtime.step_time()?;
                    let step_max = Self::measure_layer(network, runtime, layer_index, batch_n)?;
                    threshold = threshold.max(step_max);
                    on_step(position, threshold);
                }
                debug!(
                    "[SPIKE-NORM] Layer '{}' batch {}/{}: running max {:.4}",
                    name,
                    batch_index + 1,
                    num_batches,
                    threshold
                );
            }

            check_positive(&name, threshold)?;
            network.set_threshold(runtime, layer_index, threshold as f32)?;
            info!("[SPIKE-NORM] Layer '{}' threshold {:.4}", name, threshold);
            layers.push(name);
            thresholds.push(threshold);
        }

        Ok(SpikeNormResult { layers, thresholds })
    }
}

impl Calibrator for SpikeNorm {
    fn name(&self) -> &'static str {
        "spike_norm"
    }

    fn calibrate(
        &self,
        network: &SpikingNetwork,
        runtime: &mut dyn SpikingRuntime,
        samples: &SampleSet,
    ) -> ConversionResult<CalibrationResult> {
        let result = self.calibrate_with(network, runtime, samples, |layer, running| {
            trace!("[SPIKE-NORM] Weighted layer {} running max {:.4}", layer, running);
        })?;
        Ok(CalibrationResult::SpikeNorm(result))
    }
}

/// Per-layer thresholds found by spike-norm
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeNormResult {
    pub layers: Vec<String>,
    pub thresholds: Vec<f64>,
}

impl SpikeNormResult {
    /// Set each weighted layer's threshold
    ///
    /// Calibration already leaves these thresholds in place; applying again
    /// restores them after the network was modified.
    pub fn apply<R: SpikingRuntime + ?Sized>(
        &self,
        network: &SpikingNetwork,
        runtime: &mut R,
    ) -> ConversionResult<()> {
        super::apply_thresholds(network, runtime, &self.thresholds)
    }
}
