// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Core traits and descriptor types for neuron models

use crate::error::{NeuralError, NeuralResult};
use rand::RngCore;
use std::fmt;

/// Per-unit state variable with its initial value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarSpec {
    pub name: &'static str,
    pub init: f32,
}

/// Extra global parameter: one scalar broadcast to the whole population
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EgpSpec {
    pub name: &'static str,
    pub default: f32,
}

/// How a model decides its firing threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Threshold read from the named extra global parameter
    Settable { egp: &'static str },
    /// Threshold follows a fixed schedule derived from parameters
    Schedule,
    /// Model never integrates towards a threshold (e.g. direct spike input)
    None,
}

/// Static description of a neuron model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuronModelDescriptor {
    /// Registry key
    pub name: &'static str,
    pub param_names: &'static [&'static str],
    pub vars: &'static [VarSpec],
    pub extra_global_params: &'static [EgpSpec],
    pub threshold: ThresholdMode,
    /// Emitted spikes carry a sign (+1 / -1)
    pub signed_spikes: bool,
    /// Variable holding the host-side input value (encoders only)
    pub input_var: Option<&'static str>,
    /// Variable decoded into a prediction (arg-max per replica)
    pub output_var: Option<&'static str>,
    /// Dynamics cycle through a pipeline of `K` timesteps
    pub pipelined: bool,
}

impl NeuronModelDescriptor {
    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|p| *p == name)
    }

    pub fn egp_index(&self, name: &str) -> Option<usize> {
        self.extra_global_params.iter().position(|e| e.name == name)
    }

    /// Index of a state variable, or `UnknownVariable`
    pub fn require_var(&self, name: &str) -> NeuralResult<usize> {
        self.var_index(name).ok_or_else(|| NeuralError::UnknownVariable {
            model: self.name.to_string(),
            var: name.to_string(),
        })
    }

    /// Name of the threshold extra global parameter, if the threshold can be set
    pub fn threshold_egp(&self) -> NeuralResult<&'static str> {
        match self.threshold {
            ThresholdMode::Settable { egp } => Ok(egp),
            _ => Err(NeuralError::ThresholdNotSettable {
                model: self.name.to_string(),
            }),
        }
    }

    pub fn default_extra_global_params(&self) -> Vec<f32> {
        self.extra_global_params.iter().map(|e| e.default).collect()
    }
}

/// Per-unit state of one population, one buffer per descriptor variable
#[derive(Debug, Clone, PartialEq)]
pub struct StateVars {
    vars: Vec<Vec<f32>>,
    num_units: usize,
}

impl StateVars {
    /// Allocate and initialise every variable of `descriptor` for `num_units` units
    pub fn new(descriptor: &NeuronModelDescriptor, num_units: usize) -> Self {
        Self {
            vars: descriptor
                .vars
                .iter()
                .map(|v| vec![v.init; num_units])
                .collect(),
            num_units,
        }
    }

    pub fn num_units(&self) -> usize {
        self.num_units
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn get(&self, index: usize) -> &[f32] {
        &self.vars[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.vars[index]
    }

    /// Mutable access to two distinct variables at once
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut [f32], &mut [f32]) {
        assert_ne!(a, b, "pair_mut requires distinct variables");
        if a < b {
            let (lo, hi) = self.vars.split_at_mut(b);
            (lo[a].as_mut_slice(), hi[0].as_mut_slice())
        } else {
            let (lo, hi) = self.vars.split_at_mut(a);
            (hi[0].as_mut_slice(), lo[b].as_mut_slice())
        }
    }

    /// Restore every variable to its initial value
    pub fn reset(&mut self, descriptor: &NeuronModelDescriptor) {
        for (buf, spec) in self.vars.iter_mut().zip(descriptor.vars) {
            buf.fill(spec.init);
        }
    }
}

/// A spike emitted during one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spike {
    pub neuron: u32,
    /// +1.0, or -1.0 for negative pulses from signed sources
    pub sign: f32,
}

impl Spike {
    #[inline]
    pub fn positive(neuron: usize) -> Self {
        Self {
            neuron: neuron as u32,
            sign: 1.0,
        }
    }

    #[inline]
    pub fn signed(neuron: usize, sign: f32) -> Self {
        Self {
            neuron: neuron as u32,
            sign,
        }
    }
}

/// Read-only inputs to one population step
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Runtime timestep being computed
    pub timestep: u64,
    pub dt: f32,
    pub params: &'a [f32],
    pub extra_global_params: &'a [f32],
    /// Summed synaptic input per unit for this step
    pub isyn: &'a [f32],
}

/// Trait for spiking neuron models
///
/// Implementations are stateless; all per-unit state lives in [`StateVars`].
pub trait NeuronModel: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &NeuronModelDescriptor;

    /// Model name (registry key)
    fn model_name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Validate population parameters
    ///
    /// The default checks the parameter count only.
    fn validate_params(&self, params: &[f32]) -> NeuralResult<()> {
        let expected = self.descriptor().param_names.len();
        if params.len() != expected {
            return Err(NeuralError::ParameterCount {
                model: self.model_name().to_string(),
                expected,
                actual: params.len(),
            });
        }
        Ok(())
    }

    /// Pipeline length in timesteps, 1 for non-pipelined models
    fn pipeline_length(&self, _params: &[f32]) -> u32 {
        1
    }

    /// Advance every unit by one timestep, appending emitted spikes
    fn step(
        &self,
        ctx: &StepContext<'_>,
        state: &mut StateVars,
        rng: &mut dyn RngCore,
        spikes: &mut Vec<Spike>,
    );
}
