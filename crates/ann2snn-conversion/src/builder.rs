// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Network builder.

Turns an [`AnnModel`] into runtime populations and projections:

1. every layer is checked (activation, bias, shapes, weight dimensions)
   before anything is created in the runtime
2. the input layer becomes `batch_size` encoder populations
3. each weighted layer becomes `batch_size` neuron populations plus one
   projection per replica from the previous layer

With weight sharing, replica 0 of every projection owns the weights and the
other replicas reference them.
*/

use crate::ann::{Activation, AnnModel, LayerKind, LayerSpec, Shape};
use crate::error::{ConversionError, ConversionResult};
use crate::network::{LayerPopulation, Projection, SpikingNetwork};
use ann2snn_config::{ConversionConfig, FewSpikeConfig};
use ann2snn_connectivity::{Connectivity, ConnectivityMode};
use ann2snn_neural::{
    ModelRegistry, NeuronModel, PostsynapticModel, ThresholdMode, WeightUpdateModel,
};
use ann2snn_runtime::{
    NeuronPopulationSpec, SpikingRuntime, SynapsePopulationSpec, SynapseWeights,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options controlling how layers are mapped onto the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub neuron_model: String,
    pub input_model: String,
    /// Initial threshold of settable-threshold models
    pub threshold: f32,
    pub connectivity: ConnectivityMode,
    pub batch_size: usize,
    pub share_weights: bool,
    /// Parameters for models that take `K` / `alpha`
    pub few_spike: FewSpikeConfig,
}

impl Default for BuildOptions {
    fn default() -> Self {
        let config = ConversionConfig::default();
        Self {
            neuron_model: config.builder.neuron_model,
            input_model: config.builder.input_model,
            threshold: config.builder.threshold,
            connectivity: ConnectivityMode::Procedural,
            batch_size: config.builder.batch_size,
            share_weights: config.builder.share_weights,
            few_spike: config.few_spike,
        }
    }
}

impl BuildOptions {
    pub fn from_config(config: &ConversionConfig) -> ConversionResult<Self> {
        let connectivity = match config.builder.connectivity.as_str() {
            "procedural" => ConnectivityMode::Procedural,
            "sparse" => ConnectivityMode::Sparse,
            other => {
                return Err(ConversionError::InvalidInput(format!(
                    "unknown connectivity mode '{}'",
                    other
                )))
            }
        };
        Ok(Self {
            neuron_model: config.builder.neuron_model.clone(),
            input_model: config.builder.input_model.clone(),
            threshold: config.builder.threshold,
            connectivity,
            batch_size: config.builder.batch_size,
            share_weights: config.builder.share_weights,
            few_spike: config.few_spike.clone(),
        })
    }
}

/// Checked layer ready for creation
struct LayerPlan<'a> {
    spec: &'a LayerSpec,
    shape: Shape,
    connectivity: Option<Connectivity>,
    weights: Vec<f32>,
}

/// Resolved model and its population parameters
struct ModelChoice {
    model: Arc<dyn NeuronModel>,
    params: Vec<f32>,
    extra_global_params: Vec<f32>,
}

pub struct NetworkBuilder<'a> {
    registry: &'a ModelRegistry,
    options: &'a BuildOptions,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(registry: &'a ModelRegistry, options: &'a BuildOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &BuildOptions {
        self.options
    }

    /// Build the spiking network for `ann` inside `runtime`
    ///
    /// # Errors
    /// `UnsupportedLayer` for non-ReLU or biased layers and `ShapeMismatch`
    /// for inconsistent shapes; both are detected before the runtime is
    /// touched.
    pub fn build<A, R>(&self, ann: &A, runtime: &mut R) -> ConversionResult<SpikingNetwork>
    where
        A: AnnModel + ?Sized,
        R: SpikingRuntime + ?Sized,
    {
        if self.options.batch_size == 0 {
            return Err(ConversionError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }

        check_supported(ann.layers())?;
        let plans = self.plan(ann.layers())?;

        let input = self.resolve(&self.options.input_model, self.options.few_spike.input_alpha)?;
        let neuron = self.resolve(&self.options.neuron_model, self.options.few_spike.alpha)?;
        if neuron.model.descriptor().pipelined != input.model.descriptor().pipelined {
            warn!(
                "[BUILDER] Input model '{}' and neuron model '{}' disagree on pipelining",
                input.model.model_name(),
                neuron.model.model_name()
            );
        }

        info!(
            "[BUILDER] Building {} layers on {} (batch {}, {} connectivity, {})",
            plans.len(),
            runtime.platform_name(),
            self.options.batch_size,
            match self.options.connectivity {
                ConnectivityMode::Procedural => "procedural",
                ConnectivityMode::Sparse => "sparse",
            },
            neuron.model.model_name()
        );

        let mut layers: Vec<LayerPopulation> = Vec::with_capacity(plans.len());
        let mut projections = Vec::with_capacity(plans.len().saturating_sub(1));
        for (index, plan) in plans.iter().enumerate() {
            let choice = if index == 0 { &input } else { &neuron };
            let replicas = (0..self.options.batch_size)
                .map(|replica| {
                    runtime.add_neuron_population(
                        NeuronPopulationSpec::new(
                            format!("{}_{}", plan.spec.name, replica),
                            plan.shape.len(),
                            choice.model.clone(),
                        )
                        .with_params(choice.params.clone())
                        .with_extra_global_params(choice.extra_global_params.clone()),
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            debug!(
                "[BUILDER] Layer '{}' -> {} x {} {} neurons",
                plan.spec.name,
                replicas.len(),
                plan.shape.len(),
                choice.model.model_name()
            );
            layers.push(LayerPopulation {
                name: plan.spec.name.clone(),
                kind: plan.spec.kind,
                shape: plan.shape,
                model: choice.model.clone(),
                params: choice.params.clone(),
                replicas,
            });

            if let Some(connectivity) = &plan.connectivity {
                let projection = self.connect(runtime, &layers, index, plan, connectivity)?;
                projections.push(projection);
            }
        }

        let pipeline_length = [&input, &neuron]
            .iter()
            .filter(|c| c.model.descriptor().pipelined)
            .map(|c| c.model.pipeline_length(&c.params))
            .max();

        let synapses_per_replica: usize = projections.iter().map(|p| p.num_synapses).sum();
        info!(
            "[BUILDER] Built {} populations, {} projections, {} synapses per replica",
            layers.len() * self.options.batch_size,
            projections.len() * self.options.batch_size,
            synapses_per_replica
        );

        Ok(SpikingNetwork::new(
            layers,
            projections,
            self.options.batch_size,
            pipeline_length,
        ))
    }

    /// Check shapes and flatten weights without touching the runtime
    fn plan<'l>(&self, layers: &'l [LayerSpec]) -> ConversionResult<Vec<LayerPlan<'l>>> {
        let input = layers
            .first()
            .ok_or_else(|| ConversionError::InvalidModel("network has no layers".to_string()))?;
        if input.kind != LayerKind::Input {
            return Err(ConversionError::InvalidModel(format!(
                "first layer '{}' is not an input layer",
                input.name
            )));
        }

        let mut plans = vec![LayerPlan {
            spec: input,
            shape: input.output_shape,
            connectivity: None,
            weights: Vec::new(),
        }];

        for layer in &layers[1..] {
            if layer.kind == LayerKind::Input {
                return Err(ConversionError::InvalidModel(format!(
                    "layer '{}' is a second input layer",
                    layer.name
                )));
            }
            let prev = plans[plans.len() - 1].shape;
            if prev.len() != layer.input_shape.len() {
                return Err(shape_mismatch(
                    layer,
                    format!("source has {} units, layer expects {}", prev.len(), layer.input_shape),
                ));
            }
            // A flat source feeding a convolution is read through the declared shape
            let source = if prev.as_spatial().is_some() { prev } else { layer.input_shape };

            let derived = layer.kind.derive_output_shape(&source)?;
            let matches = match (derived, layer.output_shape) {
                (Shape::Spatial(..), Shape::Spatial(..)) => derived == layer.output_shape,
                _ => derived.len() == layer.output_shape.len(),
            };
            if !matches {
                return Err(shape_mismatch(
                    layer,
                    format!("derived output {} but declared {}", derived, layer.output_shape),
                ));
            }

            let weights = layer
                .weights
                .as_ref()
                .ok_or_else(|| shape_mismatch(layer, "weighted layer has no weights".to_string()))?;
            let expected = layer.kind.weight_dims(&source)?.unwrap_or_default();
            if weights.shape() != expected.as_slice() {
                return Err(shape_mismatch(
                    layer,
                    format!("weights {:?} but expected {:?}", weights.shape(), expected),
                ));
            }

            let connectivity =
                layer
                    .kind
                    .build_connectivity(&source, &derived, self.options.connectivity)?;
            let flat: Vec<f32> = weights.iter().copied().collect();
            let weights = match &connectivity {
                Connectivity::Sparse(sparse) => sparse.individual_weights(&flat),
                _ => flat,
            };

            plans.push(LayerPlan {
                spec: layer,
                shape: layer.output_shape,
                connectivity: Some(connectivity),
                weights,
            });
        }
        Ok(plans)
    }

    fn resolve(&self, name: &str, alpha: f32) -> ConversionResult<ModelChoice> {
        let model = self.registry.neuron_model(name)?;
        let descriptor = model.descriptor();
        let params = descriptor
            .param_names
            .iter()
            .map(|param| match *param {
                "K" => Ok(self.options.few_spike.k as f32),
                "alpha" => Ok(alpha),
                other => Err(ConversionError::InvalidInput(format!(
                    "model '{}' needs parameter '{}' that has no configuration",
                    descriptor.name, other
                ))),
            })
            .collect::<ConversionResult<Vec<f32>>>()?;
        model.validate_params(&params)?;

        let mut extra_global_params = descriptor.default_extra_global_params();
        if let ThresholdMode::Settable { egp } = descriptor.threshold {
            if let Some(index) = descriptor.egp_index(egp) {
                extra_global_params[index] = self.options.threshold;
            }
        }
        Ok(ModelChoice {
            model,
            params,
            extra_global_params,
        })
    }

    fn connect<R: SpikingRuntime + ?Sized>(
        &self,
        runtime: &mut R,
        layers: &[LayerPopulation],
        index: usize,
        plan: &LayerPlan<'_>,
        connectivity: &Connectivity,
    ) -> ConversionResult<Projection> {
        let source = &layers[index - 1];
        let target = &layers[index];
        let weight_update = WeightUpdateModel::for_source(source.model.descriptor().signed_spikes);

        let mut replicas = Vec::with_capacity(self.options.batch_size);
        for (replica, (&pre, &post)) in source.replicas.iter().zip(&target.replicas).enumerate() {
            let weights = match replicas.first() {
                Some(&owner) if self.options.share_weights => SynapseWeights::Shared(owner),
                _ => SynapseWeights::Owned(plan.weights.clone()),
            };
            let id = runtime.add_synapse_population(SynapsePopulationSpec {
                name: format!("{}_{}_syn_{}", source.name, target.name, replica),
                source: pre,
                target: post,
                connectivity: connectivity.clone(),
                weights,
                weight_update,
                postsynaptic: PostsynapticModel::DeltaCurr,
            })?;
            replicas.push(id);
        }

        debug!(
            "[BUILDER] Projection '{}' -> '{}': {} connectivity, max row {}, {} synapses, {}",
            source.name,
            target.name,
            connectivity.kind_name(),
            connectivity.max_row_length(),
            connectivity.num_synapses(),
            weight_update.name()
        );

        Ok(Projection {
            name: format!("{}_{}", source.name, target.name),
            source_layer: index - 1,
            target_layer: index,
            connectivity_kind: connectivity.kind_name(),
            max_row_length: connectivity.max_row_length(),
            num_synapses: connectivity.num_synapses(),
            replicas,
        })
    }
}

/// Reject layers the converter cannot express before anything is built
fn check_supported(layers: &[LayerSpec]) -> ConversionResult<()> {
    for layer in layers.iter().filter(|l| l.kind.is_weighted()) {
        if layer.activation != Activation::Relu {
            return Err(ConversionError::UnsupportedLayer {
                layer: layer.name.clone(),
                reason: format!("activation '{}' is not relu", layer.activation.as_str()),
            });
        }
        if layer.use_bias {
            return Err(ConversionError::UnsupportedLayer {
                layer: layer.name.clone(),
                reason: "bias is not supported".to_string(),
            });
        }
    }
    Ok(())
}

fn shape_mismatch(layer: &LayerSpec, reason: String) -> ConversionError {
    ConversionError::ShapeMismatch {
        layer: layer.name.clone(),
        reason,
    }
}
