// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # CPU Reference Runtime
//!
//! Batched CPU simulator implementing [`SpikingRuntime`].
//!
//! ## Step Phases
//! ```text
//! 1. Synaptic delivery: spikes emitted in the previous step are routed
//!    through every projection into the target's Isyn buffer
//! 2. Neuron update:     every population advances one timestep (rayon,
//!    one RNG stream per population)
//! 3. Isyn cleared (delta current), timestep += 1
//! ```

use crate::error::{RuntimeError, RuntimeResult};
use crate::ids::{PopulationId, ProjectionId};
use crate::traits::{NeuronPopulationSpec, SpikingRuntime, SynapsePopulationSpec, SynapseWeights};
use ann2snn_connectivity::Connectivity;
use ann2snn_neural::{
    NeuronModel, PostsynapticModel, Spike, StateVars, StepContext, WeightUpdateModel,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, trace};

/// Default seed for population RNG streams
pub const DEFAULT_SEED: u64 = 0x5eed_a115;

#[derive(Debug)]
struct NeuronPopulation {
    name: String,
    model: Arc<dyn NeuronModel>,
    params: Vec<f32>,
    host_vars: StateVars,
    device_vars: StateVars,
    host_egps: Vec<f32>,
    device_egps: Vec<f32>,
    spikes: Vec<Spike>,
    rng: StdRng,
}

impl NeuronPopulation {
    fn var_index(&self, var: &str) -> RuntimeResult<usize> {
        self.model
            .descriptor()
            .var_index(var)
            .ok_or_else(|| RuntimeError::UnknownVariable {
                population: self.name.clone(),
                var: var.to_string(),
            })
    }

    fn egp_index(&self, name: &str) -> RuntimeResult<usize> {
        self.model
            .descriptor()
            .egp_index(name)
            .ok_or_else(|| RuntimeError::UnknownExtraGlobalParam {
                population: self.name.clone(),
                name: name.to_string(),
            })
    }
}

#[derive(Debug)]
struct SynapsePopulation {
    name: String,
    source: PopulationId,
    target: PopulationId,
    connectivity: Connectivity,
    weights: SynapseWeights,
    weight_update: WeightUpdateModel,
    postsynaptic: PostsynapticModel,
}

/// Batched CPU spiking runtime with mirrored host/device state
#[derive(Debug)]
pub struct CpuRuntime {
    dt: f32,
    timestep: u64,
    seed: u64,
    populations: Vec<NeuronPopulation>,
    /// Per-population synaptic input accumulated for the next update
    isyn: Vec<Vec<f32>>,
    projections: Vec<SynapsePopulation>,
}

impl CpuRuntime {
    pub fn new(dt: f32) -> RuntimeResult<Self> {
        Self::with_seed(dt, DEFAULT_SEED)
    }

    /// Runtime whose population RNG streams derive from `seed`
    pub fn with_seed(dt: f32, seed: u64) -> RuntimeResult<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(RuntimeError::InvalidParameters(format!(
                "dt must be positive, got {}",
                dt
            )));
        }
        Ok(Self {
            dt,
            timestep: 0,
            seed,
            populations: Vec::new(),
            isyn: Vec::new(),
            projections: Vec::new(),
        })
    }

    pub fn num_populations(&self) -> usize {
        self.populations.len()
    }

    pub fn num_projections(&self) -> usize {
        self.projections.len()
    }

    pub fn population_name(&self, population: PopulationId) -> RuntimeResult<&str> {
        Ok(&self.population(population)?.name)
    }

    /// Whether a projection owns its weight storage
    pub fn owns_weights(&self, projection: ProjectionId) -> RuntimeResult<bool> {
        Ok(matches!(
            self.projection(projection)?.weights,
            SynapseWeights::Owned(_)
        ))
    }

    fn population(&self, id: PopulationId) -> RuntimeResult<&NeuronPopulation> {
        self.populations
            .get(id.index())
            .ok_or(RuntimeError::PopulationNotFound(id))
    }

    fn population_mut(&mut self, id: PopulationId) -> RuntimeResult<&mut NeuronPopulation> {
        self.populations
            .get_mut(id.index())
            .ok_or(RuntimeError::PopulationNotFound(id))
    }

    fn projection(&self, id: ProjectionId) -> RuntimeResult<&SynapsePopulation> {
        self.projections
            .get(id.index())
            .ok_or(RuntimeError::ProjectionNotFound(id))
    }

    fn resolve_weights(&self, id: ProjectionId) -> RuntimeResult<&[f32]> {
        resolve_weights(&self.projections, id)
    }

    /// Route the previous step's spikes into target Isyn buffers
    fn deliver_spikes(&mut self) -> RuntimeResult<()> {
        for (index, projection) in self.projections.iter().enumerate() {
            let source = &self.populations[projection.source.index()];
            if source.spikes.is_empty() {
                continue;
            }
            let weights = resolve_weights(&self.projections, ProjectionId(index as u32))?;
            let isyn = &mut self.isyn[projection.target.index()];
            let weight_update = projection.weight_update;
            let postsynaptic = projection.postsynaptic;
            for spike in &source.spikes {
                projection
                    .connectivity
                    .for_each_synapse(spike.neuron as usize, |post, w| {
                        let pulse = weight_update.pulse(weights[w], spike.sign);
                        postsynaptic.inject(&mut isyn[post], pulse);
                    });
            }
        }
        Ok(())
    }
}

/// Weights a projection reads, following one level of sharing
fn resolve_weights(projections: &[SynapsePopulation], id: ProjectionId) -> RuntimeResult<&[f32]> {
    let projection = projections
        .get(id.index())
        .ok_or(RuntimeError::ProjectionNotFound(id))?;
    match &projection.weights {
        SynapseWeights::Owned(weights) => Ok(weights),
        SynapseWeights::Shared(owner) => match projections.get(owner.index()).map(|p| &p.weights) {
            Some(SynapseWeights::Owned(weights)) => Ok(weights),
            Some(SynapseWeights::Shared(_)) => Err(RuntimeError::InvalidParameters(format!(
                "projection {} shares weights with non-owning {}",
                id, owner
            ))),
            None => Err(RuntimeError::ProjectionNotFound(*owner)),
        },
    }
}

impl SpikingRuntime for CpuRuntime {
    fn platform_name(&self) -> &'static str {
        "CPU (rayon)"
    }

    fn add_neuron_population(
        &mut self,
        spec: NeuronPopulationSpec,
    ) -> RuntimeResult<PopulationId> {
        if spec.num_neurons == 0 {
            return Err(RuntimeError::InvalidParameters(format!(
                "population '{}' must have at least one neuron",
                spec.name
            )));
        }
        spec.model.validate_params(&spec.params)?;

        let descriptor = spec.model.descriptor();
        let egps = match spec.extra_global_params {
            Some(values) => {
                if values.len() != descriptor.extra_global_params.len() {
                    return Err(RuntimeError::SizeMismatch {
                        what: format!("extra global parameters of '{}'", spec.name),
                        expected: descriptor.extra_global_params.len(),
                        actual: values.len(),
                    });
                }
                values
            }
            None => descriptor.default_extra_global_params(),
        };

        let id = PopulationId(self.populations.len() as u32);
        let state = StateVars::new(descriptor, spec.num_neurons);
        debug!(
            "[CPU-RUNTIME] Added population {} '{}' ({} x {})",
            id, spec.name, spec.num_neurons, descriptor.name
        );
        self.populations.push(NeuronPopulation {
            name: spec.name,
            params: spec.params,
            host_vars: state.clone(),
            device_vars: state,
            host_egps: egps.clone(),
            device_egps: egps,
            spikes: Vec::new(),
            rng: StdRng::seed_from_u64(self.seed.wrapping_add(id.0 as u64)),
            model: spec.model,
        });
        self.isyn.push(vec![0.0; spec.num_neurons]);
        Ok(id)
    }

    fn add_synapse_population(
        &mut self,
        spec: SynapsePopulationSpec,
    ) -> RuntimeResult<ProjectionId> {
        let source_size = self.population(spec.source)?.host_vars.num_units();
        let target_size = self.population(spec.target)?.host_vars.num_units();
        if spec.connectivity.num_pre() != source_size {
            return Err(RuntimeError::SizeMismatch {
                what: format!("source of '{}'", spec.name),
                expected: source_size,
                actual: spec.connectivity.num_pre(),
            });
        }
        if spec.connectivity.num_post() != target_size {
            return Err(RuntimeError::SizeMismatch {
                what: format!("target of '{}'", spec.name),
                expected: target_size,
                actual: spec.connectivity.num_post(),
            });
        }

        match &spec.weights {
            SynapseWeights::Owned(weights) => {
                if weights.len() != spec.connectivity.weight_len() {
                    return Err(RuntimeError::SizeMismatch {
                        what: format!("weights of '{}'", spec.name),
                        expected: spec.connectivity.weight_len(),
                        actual: weights.len(),
                    });
                }
            }
            SynapseWeights::Shared(owner) => {
                let owner_projection = self.projection(*owner)?;
                if !matches!(owner_projection.weights, SynapseWeights::Owned(_))
                    || owner_projection.connectivity.weight_len() != spec.connectivity.weight_len()
                {
                    return Err(RuntimeError::InvalidParameters(format!(
                        "'{}' cannot share weights with {}",
                        spec.name, owner
                    )));
                }
            }
        }

        let id = ProjectionId(self.projections.len() as u32);
        debug!(
            "[CPU-RUNTIME] Added projection {} '{}' {} -> {} ({}, max row length {})",
            id,
            spec.name,
            spec.source,
            spec.target,
            spec.connectivity.kind_name(),
            spec.connectivity.max_row_length()
        );
        self.projections.push(SynapsePopulation {
            name: spec.name,
            source: spec.source,
            target: spec.target,
            connectivity: spec.connectivity,
            weights: spec.weights,
            weight_update: spec.weight_update,
            postsynaptic: spec.postsynaptic,
        });
        Ok(id)
    }

    fn step_time(&mut self) -> RuntimeResult<()> {
        self.deliver_spikes()?;

        let timestep = self.timestep;
        let dt = self.dt;
        self.populations
            .par_iter_mut()
            .zip(self.isyn.par_iter_mut())
            .for_each(|(pop, isyn)| {
                pop.spikes.clear();
                let ctx = StepContext {
                    timestep,
                    dt,
                    params: &pop.params,
                    extra_global_params: &pop.device_egps,
                    isyn: isyn.as_slice(),
                };
                pop.model
                    .step(&ctx, &mut pop.device_vars, &mut pop.rng, &mut pop.spikes);
                isyn.fill(0.0);
            });

        trace!(
            "[CPU-RUNTIME] Step {} complete, {} spikes",
            timestep,
            self.populations.iter().map(|p| p.spikes.len()).sum::<usize>()
        );
        self.timestep += 1;
        Ok(())
    }

    fn reset_time(&mut self) {
        self.timestep = 0;
    }

    fn timestep(&self) -> u64 {
        self.timestep
    }

    fn dt(&self) -> f32 {
        self.dt
    }

    fn reinitialise(&mut self) -> RuntimeResult<()> {
        for (pop, isyn) in self.populations.iter_mut().zip(self.isyn.iter_mut()) {
            let descriptor = pop.model.descriptor();
            pop.host_vars.reset(descriptor);
            pop.device_vars.reset(descriptor);
            pop.spikes.clear();
            isyn.fill(0.0);
        }
        Ok(())
    }

    fn pull_var_from_device(&mut self, population: PopulationId, var: &str) -> RuntimeResult<()> {
        let pop = self.population_mut(population)?;
        let index = pop.var_index(var)?;
        let NeuronPopulation {
            host_vars,
            device_vars,
            ..
        } = pop;
        host_vars
            .get_mut(index)
            .copy_from_slice(device_vars.get(index));
        Ok(())
    }

    fn push_var_to_device(&mut self, population: PopulationId, var: &str) -> RuntimeResult<()> {
        let pop = self.population_mut(population)?;
        let index = pop.var_index(var)?;
        let NeuronPopulation {
            host_vars,
            device_vars,
            ..
        } = pop;
        device_vars
            .get_mut(index)
            .copy_from_slice(host_vars.get(index));
        Ok(())
    }

    fn var(&self, population: PopulationId, var: &str) -> RuntimeResult<&[f32]> {
        let pop = self.population(population)?;
        let index = pop.var_index(var)?;
        Ok(pop.host_vars.get(index))
    }

    fn var_mut(&mut self, population: PopulationId, var: &str) -> RuntimeResult<&mut [f32]> {
        let pop = self.population_mut(population)?;
        let index = pop.var_index(var)?;
        Ok(pop.host_vars.get_mut(index))
    }

    fn set_extra_global_param(
        &mut self,
        population: PopulationId,
        name: &str,
        value: f32,
    ) -> RuntimeResult<()> {
        let pop = self.population_mut(population)?;
        let index = pop.egp_index(name)?;
        pop.host_egps[index] = value;
        Ok(())
    }

    fn push_extra_global_param(
        &mut self,
        population: PopulationId,
        name: &str,
    ) -> RuntimeResult<()> {
        let pop = self.population_mut(population)?;
        let index = pop.egp_index(name)?;
        pop.device_egps[index] = pop.host_egps[index];
        Ok(())
    }

    fn extra_global_param(&self, population: PopulationId, name: &str) -> RuntimeResult<f32> {
        let pop = self.population(population)?;
        let index = pop.egp_index(name)?;
        Ok(pop.host_egps[index])
    }

    fn current_spikes(&self, population: PopulationId) -> RuntimeResult<&[Spike]> {
        Ok(&self.population(population)?.spikes)
    }

    fn population_size(&self, population: PopulationId) -> RuntimeResult<usize> {
        Ok(self.population(population)?.host_vars.num_units())
    }

    fn neuron_model(&self, population: PopulationId) -> RuntimeResult<Arc<dyn NeuronModel>> {
        Ok(Arc::clone(&self.population(population)?.model))
    }

    fn population_params(&self, population: PopulationId) -> RuntimeResult<&[f32]> {
        Ok(&self.population(population)?.params)
    }

    fn weights(&self, projection: ProjectionId) -> RuntimeResult<&[f32]> {
        self.resolve_weights(projection)
    }

    fn set_weights(&mut self, projection: ProjectionId, weights: &[f32]) -> RuntimeResult<()> {
        let proj = self
            .projections
            .get_mut(projection.index())
            .ok_or(RuntimeError::ProjectionNotFound(projection))?;
        match &mut proj.weights {
            SynapseWeights::Owned(current) => {
                if current.len() != weights.len() {
                    return Err(RuntimeError::SizeMismatch {
                        what: format!("weights of '{}'", proj.name),
                        expected: current.len(),
                        actual: weights.len(),
                    });
                }
                current.copy_from_slice(weights);
                Ok(())
            }
            SynapseWeights::Shared(_) => Err(RuntimeError::WeightsNotOwned(projection)),
        }
    }

    fn num_synapses(&self, projection: ProjectionId) -> RuntimeResult<usize> {
        Ok(self.projection(projection)?.connectivity.num_synapses())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ann2snn_neural::{IntegrateFireModel, SpikeInputModel};

    fn two_layer(runtime: &mut CpuRuntime) -> (PopulationId, PopulationId, ProjectionId) {
        let input = runtime
            .add_neuron_population(NeuronPopulationSpec::new(
                "input",
                2,
                Arc::new(SpikeInputModel::new()),
            ))
            .unwrap();
        let output = runtime
            .add_neuron_population(NeuronPopulationSpec::new(
                "output",
                1,
                Arc::new(IntegrateFireModel::new()),
            ))
            .unwrap();
        let proj = runtime
            .add_synapse_population(SynapsePopulationSpec {
                name: "input_output".to_string(),
                source: input,
                target: output,
                connectivity: Connectivity::dense(2, 1),
                weights: SynapseWeights::Owned(vec![0.25, 0.5]),
                weight_update: WeightUpdateModel::StaticPulse,
                postsynaptic: PostsynapticModel::DeltaCurr,
            })
            .unwrap();
        (input, output, proj)
    }

    #[test]
    fn test_rejects_bad_dt() {
        assert!(CpuRuntime::new(0.0).is_err());
        assert!(CpuRuntime::new(f32::NAN).is_err());
    }

    #[test]
    fn test_spikes_arrive_one_step_later() {
        let mut runtime = CpuRuntime::new(1.0).unwrap();
        let (input, output, _) = two_layer(&mut runtime);
        runtime.set_extra_global_param(output, "Vthr", 100.0).unwrap();
        runtime.push_extra_global_param(output, "Vthr").unwrap();

        runtime.var_mut(input, "input").unwrap()[0] = 1.0;
        runtime.push_var_to_device(input, "input").unwrap();

        runtime.step_time().unwrap();
        runtime.pull_var_from_device(output, "Vmem").unwrap();
        assert_eq!(runtime.var(output, "Vmem").unwrap(), &[0.0]);
        assert_eq!(runtime.current_spikes(input).unwrap().len(), 1);

        runtime.step_time().unwrap();
        runtime.pull_var_from_device(output, "Vmem").unwrap();
        assert_eq!(runtime.var(output, "Vmem").unwrap(), &[0.25]);
        assert_eq!(runtime.timestep(), 2);
        assert_eq!(runtime.time(), 2.0);
    }

    #[test]
    fn test_shared_projection_delivers_owner_weights() {
        let mut runtime = CpuRuntime::new(1.0).unwrap();
        let (input, output, owner) = two_layer(&mut runtime);
        let mirror = runtime
            .add_neuron_population(NeuronPopulationSpec::new(
                "mirror",
                1,
                Arc::new(IntegrateFireModel::new()),
            ))
            .unwrap();
        runtime
            .add_synapse_population(SynapsePopulationSpec {
                name: "input_mirror".to_string(),
                source: input,
                target: mirror,
                connectivity: Connectivity::dense(2, 1),
                weights: SynapseWeights::Shared(owner),
                weight_update: WeightUpdateModel::StaticPulse,
                postsynaptic: PostsynapticModel::DeltaCurr,
            })
            .unwrap();
        runtime.set_weights(owner, &[0.75, 0.5]).unwrap();
        for pop in [output, mirror] {
            runtime.set_extra_global_param(pop, "Vthr", 100.0).unwrap();
            runtime.push_extra_global_param(pop, "Vthr").unwrap();
        }

        runtime.var_mut(input, "input").unwrap().fill(1.0);
        runtime.push_var_to_device(input, "input").unwrap();
        runtime.step_time().unwrap();
        runtime.step_time().unwrap();

        for pop in [output, mirror] {
            runtime.pull_var_from_device(pop, "Vmem").unwrap();
            assert_eq!(runtime.var(pop, "Vmem").unwrap(), &[1.25]);
        }
    }

    #[test]
    fn test_resolve_weights_rejects_chained_sharing() {
        let mut runtime = CpuRuntime::new(1.0).unwrap();
        let (input, output, owner) = two_layer(&mut runtime);
        let chained = |name: &str, weights| SynapsePopulation {
            name: name.to_string(),
            source: input,
            target: output,
            connectivity: Connectivity::dense(2, 1),
            weights,
            weight_update: WeightUpdateModel::StaticPulse,
            postsynaptic: PostsynapticModel::DeltaCurr,
        };
        runtime
            .projections
            .push(chained("sharer", SynapseWeights::Shared(owner)));
        runtime
            .projections
            .push(chained("chained", SynapseWeights::Shared(ProjectionId(1))));

        assert_eq!(
            resolve_weights(&runtime.projections, ProjectionId(1)).unwrap(),
            &[0.25, 0.5]
        );
        assert!(matches!(
            resolve_weights(&runtime.projections, ProjectionId(2)),
            Err(RuntimeError::InvalidParameters(_))
        ));
        assert_eq!(
            resolve_weights(&runtime.projections, ProjectionId(7)),
            Err(RuntimeError::ProjectionNotFound(ProjectionId(7)))
        );
    }

    #[test]
    fn test_reinitialise_keeps_extra_global_params() {
        let mut runtime = CpuRuntime::new(1.0).unwrap();
        let (_, output, _) = two_layer(&mut runtime);
        runtime.set_extra_global_param(output, "Vthr", 3.0).unwrap();
        runtime.var_mut(output, "Vmem").unwrap()[0] = 2.0;
        runtime.push_var_to_device(output, "Vmem").unwrap();

        runtime.reinitialise().unwrap();
        assert_eq!(runtime.var(output, "Vmem").unwrap(), &[0.0]);
        assert_eq!(runtime.extra_global_param(output, "Vthr").unwrap(), 3.0);
    }

    #[test]
    fn test_unknown_names() {
        let mut runtime = CpuRuntime::new(1.0).unwrap();
        let (_, output, _) = two_layer(&mut runtime);
        assert!(matches!(
            runtime.var(output, "Fx"),
            Err(RuntimeError::UnknownVariable { .. })
        ));
        assert!(matches!(
            runtime.extra_global_param(output, "K"),
            Err(RuntimeError::UnknownExtraGlobalParam { .. })
        ));
        assert_eq!(
            runtime.population_size(PopulationId(9)),
            Err(RuntimeError::PopulationNotFound(PopulationId(9)))
        );
    }

    #[test]
    fn test_weight_length_checked() {
        let mut runtime = CpuRuntime::new(1.0).unwrap();
        let (input, output, _) = two_layer(&mut runtime);
        let err = runtime
            .add_synapse_population(SynapsePopulationSpec {
                name: "bad".to_string(),
                source: input,
                target: output,
                connectivity: Connectivity::dense(2, 1),
                weights: SynapseWeights::Owned(vec![1.0]),
                weight_update: WeightUpdateModel::StaticPulse,
                postsynaptic: PostsynapticModel::DeltaCurr,
            })
            .unwrap_err();
        assert!(matches!(err, RuntimeError::SizeMismatch { .. }));
    }
}
