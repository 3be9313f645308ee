// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime abstraction traits
//!
//! ## Host / device model
//!
//! Every state variable and extra global parameter exists twice: a host copy
//! the caller reads and writes through [`SpikingRuntime::var`] /
//! [`SpikingRuntime::var_mut`], and a device copy the simulation reads and
//! writes. The copies are only synchronised by the explicit pull and push
//! calls, so a host write is invisible to the simulation until pushed and a
//! simulated change is invisible to the host until pulled.

use crate::error::RuntimeResult;
use crate::ids::{PopulationId, ProjectionId};
use ann2snn_connectivity::Connectivity;
use ann2snn_neural::{NeuronModel, PostsynapticModel, Spike, WeightUpdateModel};
use std::sync::Arc;

/// Request to create one neuron population
#[derive(Debug, Clone)]
pub struct NeuronPopulationSpec {
    pub name: String,
    pub num_neurons: usize,
    pub model: Arc<dyn NeuronModel>,
    /// Values for `model.descriptor().param_names`, in order
    pub params: Vec<f32>,
    /// Initial extra global parameters; `None` uses the descriptor defaults
    pub extra_global_params: Option<Vec<f32>>,
}

impl NeuronPopulationSpec {
    pub fn new(name: impl Into<String>, num_neurons: usize, model: Arc<dyn NeuronModel>) -> Self {
        Self {
            name: name.into(),
            num_neurons,
            model,
            params: Vec::new(),
            extra_global_params: None,
        }
    }

    pub fn with_params(mut self, params: Vec<f32>) -> Self {
        self.params = params;
        self
    }

    pub fn with_extra_global_params(mut self, values: Vec<f32>) -> Self {
        self.extra_global_params = Some(values);
        self
    }
}

/// Weight storage of a projection
#[derive(Debug, Clone, PartialEq)]
pub enum SynapseWeights {
    /// The projection owns its weight array
    Owned(Vec<f32>),
    /// Read-only reference to the weights of an owning projection
    Shared(ProjectionId),
}

/// Request to create one synapse projection
#[derive(Debug, Clone)]
pub struct SynapsePopulationSpec {
    pub name: String,
    pub source: PopulationId,
    pub target: PopulationId,
    pub connectivity: Connectivity,
    pub weights: SynapseWeights,
    pub weight_update: WeightUpdateModel,
    pub postsynaptic: PostsynapticModel,
}

/// Interface to a batched spiking simulator
pub trait SpikingRuntime {
    /// Platform name for logging/debugging
    fn platform_name(&self) -> &'static str {
        "Generic Runtime"
    }

    fn add_neuron_population(&mut self, spec: NeuronPopulationSpec)
        -> RuntimeResult<PopulationId>;

    fn add_synapse_population(
        &mut self,
        spec: SynapsePopulationSpec,
    ) -> RuntimeResult<ProjectionId>;

    /// Advance the simulation by one timestep
    fn step_time(&mut self) -> RuntimeResult<()>;

    /// Rewind simulated time to zero without touching state
    fn reset_time(&mut self);

    /// Number of completed timesteps
    fn timestep(&self) -> u64;

    /// Simulation timestep length
    fn dt(&self) -> f32;

    /// Simulated time, `timestep × dt`
    fn time(&self) -> f64 {
        self.timestep() as f64 * self.dt() as f64
    }

    /// Restore every state variable (host and device) to its initial value
    /// and drop in-flight spikes and synaptic input
    ///
    /// Extra global parameters are kept.
    fn reinitialise(&mut self) -> RuntimeResult<()>;

    fn pull_var_from_device(&mut self, population: PopulationId, var: &str) -> RuntimeResult<()>;

    fn push_var_to_device(&mut self, population: PopulationId, var: &str) -> RuntimeResult<()>;

    /// Host copy of a state variable
    fn var(&self, population: PopulationId, var: &str) -> RuntimeResult<&[f32]>;

    /// Mutable host copy of a state variable
    fn var_mut(&mut self, population: PopulationId, var: &str) -> RuntimeResult<&mut [f32]>;

    /// Write the host copy of an extra global parameter
    fn set_extra_global_param(
        &mut self,
        population: PopulationId,
        name: &str,
        value: f32,
    ) -> RuntimeResult<()>;

    fn push_extra_global_param(&mut self, population: PopulationId, name: &str)
        -> RuntimeResult<()>;

    /// Host copy of an extra global parameter
    fn extra_global_param(&self, population: PopulationId, name: &str) -> RuntimeResult<f32>;

    /// Spikes emitted by a population during the last step
    fn current_spikes(&self, population: PopulationId) -> RuntimeResult<&[Spike]>;

    fn population_size(&self, population: PopulationId) -> RuntimeResult<usize>;

    fn neuron_model(&self, population: PopulationId) -> RuntimeResult<Arc<dyn NeuronModel>>;

    fn population_params(&self, population: PopulationId) -> RuntimeResult<&[f32]>;

    /// Effective weights of a projection (resolved through sharing)
    fn weights(&self, projection: ProjectionId) -> RuntimeResult<&[f32]>;

    /// Replace the weights of an owning projection
    ///
    /// Fails with `WeightsNotOwned` for projections that share weights.
    fn set_weights(&mut self, projection: ProjectionId, weights: &[f32]) -> RuntimeResult<()>;

    /// Number of synapses in the projection
    fn num_synapses(&self, projection: ProjectionId) -> RuntimeResult<usize>;
}
