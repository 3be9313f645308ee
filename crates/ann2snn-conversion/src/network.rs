// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Converted spiking network
//!
//! A [`SpikingNetwork`] is a handle: it records which runtime populations and
//! projections implement each ANN layer, while the state itself lives in the
//! [`SpikingRuntime`]. Each layer is replicated once per batch slot.

use crate::ann::{LayerKind, Shape};
use crate::error::{ConversionError, ConversionResult};
use ann2snn_neural::NeuronModel;
use ann2snn_runtime::{PopulationId, ProjectionId, SpikingRuntime};
use ndarray::{ArrayViewD, Axis};
use std::sync::Arc;
use tracing::{debug, info};

/// Runtime populations implementing one ANN layer
#[derive(Debug, Clone)]
pub struct LayerPopulation {
    pub name: String,
    pub kind: LayerKind,
    pub shape: Shape,
    pub model: Arc<dyn NeuronModel>,
    pub params: Vec<f32>,
    /// One population per batch slot
    pub replicas: Vec<PopulationId>,
}

impl LayerPopulation {
    pub fn model_name(&self) -> &'static str {
        self.model.model_name()
    }

    pub fn is_weighted(&self) -> bool {
        self.kind.is_weighted()
    }

    pub fn num_neurons(&self) -> usize {
        self.shape.len()
    }
}

/// Runtime projections implementing the connection into one layer
#[derive(Debug, Clone)]
pub struct Projection {
    pub name: String,
    pub source_layer: usize,
    pub target_layer: usize,
    pub connectivity_kind: &'static str,
    pub max_row_length: usize,
    pub num_synapses: usize,
    /// Replica 0 owns the weights when weights are shared
    pub replicas: Vec<ProjectionId>,
}

#[derive(Debug, Clone)]
pub struct SpikingNetwork {
    layers: Vec<LayerPopulation>,
    projections: Vec<Projection>,
    batch_size: usize,
    /// Pipeline length for few-spike networks
    pipeline_length: Option<u32>,
}

impl SpikingNetwork {
    pub(crate) fn new(
        layers: Vec<LayerPopulation>,
        projections: Vec<Projection>,
        batch_size: usize,
        pipeline_length: Option<u32>,
    ) -> Self {
        Self {
            layers,
            projections,
            batch_size,
            pipeline_length,
        }
    }

    pub fn layers(&self) -> &[LayerPopulation] {
        &self.layers
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    pub fn layer(&self, index: usize) -> Option<&LayerPopulation> {
        self.layers.get(index)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<(usize, &LayerPopulation)> {
        self.layers.iter().enumerate().find(|(_, l)| l.name == name)
    }

    /// Indices of the weighted layers, in order
    pub fn weighted_layer_indices(&self) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_weighted())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pipeline_length(&self) -> Option<u32> {
        self.pipeline_length
    }

    pub fn is_pipelined(&self) -> bool {
        self.pipeline_length.is_some()
    }

    fn input_layer(&self) -> ConversionResult<&LayerPopulation> {
        self.layers
            .first()
            .ok_or_else(|| ConversionError::InvalidModel("network has no layers".to_string()))
    }

    fn output_layer(&self) -> ConversionResult<&LayerPopulation> {
        self.layers
            .last()
            .ok_or_else(|| ConversionError::InvalidModel("network has no layers".to_string()))
    }

    fn layer_at(&self, index: usize) -> ConversionResult<&LayerPopulation> {
        self.layers.get(index).ok_or_else(|| {
            ConversionError::InvalidInput(format!("no layer at index {}", index))
        })
    }

    /// Set the firing threshold of every replica of a layer and push it
    ///
    /// # Errors
    /// `ThresholdNotSettable` when the layer's model has a scheduled or no
    /// threshold; nothing is written in that case.
    pub fn set_threshold<R: SpikingRuntime + ?Sized>(
        &self,
        runtime: &mut R,
        layer_index: usize,
        threshold: f32,
    ) -> ConversionResult<()> {
        let layer = self.layer_at(layer_index)?;
        let egp = layer.model.descriptor().threshold_egp().map_err(|_| {
            ConversionError::ThresholdNotSettable {
                layer: layer.name.clone(),
                model: layer.model_name().to_string(),
            }
        })?;
        for &pop in &layer.replicas {
            runtime.set_extra_global_param(pop, egp, threshold)?;
            runtime.push_extra_global_param(pop, egp)?;
        }
        debug!("[NETWORK] Layer '{}' threshold set to {}", layer.name, threshold);
        Ok(())
    }

    /// Host-side threshold of a layer (replica 0)
    pub fn threshold<R: SpikingRuntime + ?Sized>(
        &self,
        runtime: &R,
        layer_index: usize,
    ) -> ConversionResult<f32> {
        let layer = self.layer_at(layer_index)?;
        let egp = layer.model.descriptor().threshold_egp().map_err(|_| {
            ConversionError::ThresholdNotSettable {
                layer: layer.name.clone(),
                model: layer.model_name().to_string(),
            }
        })?;
        let pop = layer.replicas.first().ok_or_else(|| {
            ConversionError::InvalidModel(format!("layer '{}' has no replicas", layer.name))
        })?;
        Ok(runtime.extra_global_param(*pop, egp)?)
    }

    /// Re-initialise all state and rewind simulated time
    pub fn reset<R: SpikingRuntime + ?Sized>(&self, runtime: &mut R) -> ConversionResult<()> {
        runtime.reinitialise()?;
        runtime.reset_time();
        Ok(())
    }

    /// Write a batch into the input encoders and push it
    ///
    /// Replicas beyond the batch receive zero input.
    pub fn set_input_batch<R: SpikingRuntime + ?Sized>(
        &self,
        runtime: &mut R,
        batch: ArrayViewD<'_, f32>,
    ) -> ConversionResult<usize> {
        let input = self.input_layer()?;
        let input_var = input.model.descriptor().input_var.ok_or_else(|| {
            ConversionError::InvalidModel(format!(
                "input model '{}' has no input variable",
                input.model_name()
            ))
        })?;
        if batch.ndim() == 0 {
            return Err(ConversionError::InvalidInput("batch has no sample axis".to_string()));
        }
        let batch_n = batch.shape()[0];
        if batch_n > self.batch_size {
            return Err(ConversionError::InvalidInput(format!(
                "batch of {} exceeds network batch size {}",
                batch_n, self.batch_size
            )));
        }
        let sample_len: usize = batch.shape()[1..].iter().product();
        if sample_len != input.num_neurons() {
            return Err(ConversionError::InvalidInput(format!(
                "samples have {} values, input layer '{}' has {} neurons",
                sample_len,
                input.name,
                input.num_neurons()
            )));
        }

        for (replica, &pop) in input.replicas.iter().enumerate() {
            let values = runtime.var_mut(pop, input_var)?;
            if replica < batch_n {
                let sample = batch.index_axis(Axis(0), replica);
                for (dst, src) in values.iter_mut().zip(sample.iter()) {
                    *dst = *src;
                }
            } else {
                values.fill(0.0);
            }
            runtime.push_var_to_device(pop, input_var)?;
        }
        Ok(batch_n)
    }

    /// Number of steps needed to present one batch for `time`
    ///
    /// Few-spike networks round up to whole pipeline windows and add one
    /// window per weighted layer.
    pub fn presentation_steps<R: SpikingRuntime + ?Sized>(&self, runtime: &R, time: f64) -> u64 {
        let base = (time / runtime.dt() as f64).ceil().max(0.0) as u64;
        match self.pipeline_length {
            Some(k) => {
                let k = k as u64;
                let weighted = self.layers.iter().filter(|l| l.is_weighted()).count() as u64;
                base.div_ceil(k) * k + k * weighted
            }
            None => base,
        }
    }

    /// Arg-max of the output layer's decoded variable for the first `batch_n` replicas
    pub fn predictions<R: SpikingRuntime + ?Sized>(
        &self,
        runtime: &mut R,
        batch_n: usize,
    ) -> ConversionResult<Vec<usize>> {
        let output = self.output_layer()?;
        let output_var = output.model.descriptor().output_var.ok_or_else(|| {
            ConversionError::InvalidModel(format!(
                "output model '{}' has no decoded variable",
                output.model_name()
            ))
        })?;
        let mut predictions = Vec::with_capacity(batch_n);
        for &pop in output.replicas.iter().take(batch_n) {
            runtime.pull_var_from_device(pop, output_var)?;
            predictions.push(argmax(runtime.var(pop, output_var)?));
        }
        Ok(predictions)
    }

    /// Reset, load a batch, simulate it and return the predictions
    pub fn present_batch<R: SpikingRuntime + ?Sized>(
        &self,
        runtime: &mut R,
        batch: ArrayViewD<'_, f32>,
        time: f64,
    ) -> ConversionResult<Vec<usize>> {
        self.reset(runtime)?;
        let batch_n = self.set_input_batch(runtime, batch)?;
        for _ in 0..self.presentation_steps(runtime, time) {
            runtime.step_time()?;
        }
        self.predictions(runtime, batch_n)
    }

    /// Classification accuracy over `samples` (axis 0) against `labels`
    pub fn evaluate<R: SpikingRuntime + ?Sized>(
        &self,
        runtime: &mut R,
        samples: ArrayViewD<'_, f32>,
        labels: &[usize],
        time: f64,
    ) -> ConversionResult<f64> {
        if samples.ndim() == 0 || samples.shape()[0] == 0 {
            return Err(ConversionError::EmptySampleSet);
        }
        if samples.shape()[0] != labels.len() {
            return Err(ConversionError::InvalidInput(format!(
                "{} samples but {} labels",
                samples.shape()[0],
                labels.len()
            )));
        }

        let mut correct = 0usize;
        let mut offset = 0usize;
        for batch in samples.axis_chunks_iter(Axis(0), self.batch_size) {
            let predictions = self.present_batch(runtime, batch, time)?;
            correct += predictions
                .iter()
                .zip(&labels[offset..])
                .filter(|(p, l)| p == l)
                .count();
            offset += predictions.len();
            debug!("[NETWORK] Evaluated {}/{} samples", offset, labels.len());
        }

        let accuracy = correct as f64 / labels.len() as f64;
        info!(
            "[NETWORK] Accuracy {:.2}% ({}/{})",
            accuracy * 100.0,
            correct,
            labels.len()
        );
        Ok(accuracy)
    }
}

/// Index of the first maximum; NaN never wins
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_first_maximum() {
        assert_eq!(argmax(&[0.0, 3.0, 3.0, 1.0]), 1);
        assert_eq!(argmax(&[f32::NAN, 0.5]), 1);
        assert_eq!(argmax(&[]), 0);
    }
}
