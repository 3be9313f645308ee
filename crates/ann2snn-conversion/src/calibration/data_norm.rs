// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Data-based normalization
//!
//! ```text
//! scale[i]   = max(max_activation[i], max_weight[i])
//! applied[0] = scale[0]
//! applied[i] = scale[i] / scale[i-1]
//! ```
//!
//! Layer i's threshold becomes `applied[i]`.

use super::{apply_thresholds, check_positive, CalibrationResult, Calibrator};
use crate::ann::AnnModel;
use crate::error::{ConversionError, ConversionResult};
use crate::network::SpikingNetwork;
use crate::samples::SampleSet;
use ann2snn_runtime::SpikingRuntime;
use ndarray::ArrayD;
use tracing::{debug, info};

/// Calibrates from the analog network's activations
pub struct DataNorm<'a> {
    ann: &'a dyn AnnModel,
}

impl<'a> DataNorm<'a> {
    pub fn new(ann: &'a dyn AnnModel) -> Self {
        Self { ann }
    }

    /// Gather activation and weight maxima over `samples` and derive the factors
    pub fn compute(&self, samples: &SampleSet) -> ConversionResult<DataNormResult> {
        if samples.is_empty() {
            return Err(ConversionError::EmptySampleSet);
        }
        let weighted = self.ann.weighted_layers();
        let mut max_activations = vec![0.0f64; weighted.len()];

        for (batch_index, batch) in samples.batches().enumerate() {
            let outputs = self.ann.weighted_layer_outputs(batch)?;
            if outputs.len() != weighted.len() {
                return Err(ConversionError::InvalidModel(format!(
                    "forward pass returned {} layer outputs for {} weighted layers",
                    outputs.len(),
                    weighted.len()
                )));
            }
            for (running, output) in max_activations.iter_mut().zip(&outputs) {
                let batch_max = output.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                *running = running.max(batch_max as f64);
            }
            debug!(
                "[DATA-NORM] Batch {}/{} processed",
                batch_index + 1,
                samples.num_batches()
            );
        }

        let layers = weighted.iter().map(|l| l.name.clone()).collect();
        let max_weights = weighted.iter().map(|l| l.max_weight() as f64).collect();
        DataNormResult::from_statistics(layers, max_activations, max_weights)
    }
}

impl Calibrator for DataNorm<'_> {
    fn name(&self) -> &'static str {
        "data_norm"
    }

    fn calibrate(
        &self,
        network: &SpikingNetwork,
        _runtime: &mut dyn SpikingRuntime,
        samples: &SampleSet,
    ) -> ConversionResult<CalibrationResult> {
        let result = self.compute(samples)?;
        let weighted = network.weighted_layer_indices().len();
        if result.layers.len() != weighted {
            return Err(ConversionError::InvalidModel(format!(
                "analog network has {} weighted layers, spiking network {}",
                result.layers.len(),
                weighted
            )));
        }
        Ok(CalibrationResult::DataNorm(result))
    }
}

/// Per-layer data-norm statistics and factors
#[derive(Debug, Clone, PartialEq)]
pub struct DataNormResult {
    pub layers: Vec<String>,
    pub max_activations: Vec<f64>,
    pub max_weights: Vec<f64>,
    pub scales: Vec<f64>,
    pub applied: Vec<f64>,
}

impl DataNormResult {
    /// Derive scale and applied factors from per-layer maxima
    ///
    /// # Errors
    /// `DegenerateScale` when any scale is not strictly positive.
    pub fn from_statistics(
        layers: Vec<String>,
        max_activations: Vec<f64>,
        max_weights: Vec<f64>,
    ) -> ConversionResult<Self> {
        if layers.len() != max_activations.len() || layers.len() != max_weights.len() {
            return Err(ConversionError::InvalidInput(format!(
                "{} layers, {} activation maxima, {} weight maxima",
                layers.len(),
                max_activations.len(),
                max_weights.len()
            )));
        }

        let scales: Vec<f64> = max_activations
            .iter()
            .zip(&max_weights)
            .map(|(&a, &w)| a.max(w))
            .collect();
        for (layer, &scale) in layers.iter().zip(&scales) {
            check_positive(layer, scale)?;
        }

        let applied: Vec<f64> = scales
            .iter()
            .enumerate()
            .map(|(i, &s)| if i == 0 { s } else { s / scales[i - 1] })
            .collect();

        for i in 0..layers.len() {
            info!(
                "[DATA-NORM] Layer '{}': max activation {:.4}, max weight {:.4}, scale {:.4}, threshold {:.4}",
                layers[i], max_activations[i], max_weights[i], scales[i], applied[i]
            );
        }

        Ok(Self {
            layers,
            max_activations,
            max_weights,
            scales,
            applied,
        })
    }

    /// Set each weighted layer's threshold to its applied factor
    pub fn apply<R: SpikingRuntime + ?Sized>(
        &self,
        network: &SpikingNetwork,
        runtime: &mut R,
    ) -> ConversionResult<()> {
        apply_thresholds(network, runtime, &self.applied)
    }

    /// Each weighted layer's weights divided by its applied factor
    ///
    /// Equivalent to the threshold form for hosts that keep unit thresholds.
    pub fn normalized_weights(&self, ann: &dyn AnnModel) -> ConversionResult<Vec<ArrayD<f32>>> {
        let weighted = ann.weighted_layers();
        if weighted.len() != self.applied.len() {
            return Err(ConversionError::InvalidModel(format!(
                "{} factors for {} weighted layers",
                self.applied.len(),
                weighted.len()
            )));
        }
        weighted
            .iter()
            .zip(&self.applied)
            .map(|(layer, &factor)| {
                let weights = layer.weights.as_ref().ok_or_else(|| {
                    ConversionError::InvalidModel(format!("layer '{}' has no weights", layer.name))
                })?;
                Ok(weights.mapv(|w| (w as f64 / factor) as f32))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("l{}", i)).collect()
    }

    #[test]
    fn test_applied_factors_are_ratios_of_scales() {
        let result =
            DataNormResult::from_statistics(names(2), vec![2.0, 8.0], vec![1.0, 1.0]).unwrap();
        assert_eq!(result.scales, vec![2.0, 8.0]);
        assert_eq!(result.applied, vec![2.0, 4.0]);
    }

    #[test]
    fn test_weight_maximum_dominates() {
        let result =
            DataNormResult::from_statistics(names(3), vec![0.5, 3.0, 1.5], vec![1.0, 0.2, 3.0])
                .unwrap();
        assert_eq!(result.scales, vec![1.0, 3.0, 3.0]);
        assert_eq!(result.applied, vec![1.0, 3.0, 1.0]);
    }

    #[test]
    fn test_zero_scale_is_degenerate() {
        let err =
            DataNormResult::from_statistics(names(2), vec![2.0, 0.0], vec![1.0, -0.5]).unwrap_err();
        match err {
            ConversionError::DegenerateScale { layer, value } => {
                assert_eq!(layer, "l1");
                assert_eq!(value, 0.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_length_mismatch() {
        assert!(DataNormResult::from_statistics(names(2), vec![1.0], vec![1.0, 1.0]).is_err());
    }
}
