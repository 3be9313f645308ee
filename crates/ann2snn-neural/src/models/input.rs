// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Input Encoders
//!
//! Neuron models for the input layer. Each holds a per-unit `input` variable
//! written by the host (pull/push like any other state) and turns it into spikes:
//!
//! | Model            | Encoding                                              |
//! |------------------|-------------------------------------------------------|
//! | `spike_input`    | one spike every step while `input > 0`                |
//! | `poisson_input`  | Bernoulli spike with `p = min(input × dt, 1)`         |
//! | `if_input`       | integrate `input × dt`, fire at 1, subtractive reset  |
//! | `fs_relu_input`  | K-bit binary expansion on the few-spike schedule      |
//!
//! The `_signed` spike and Poisson variants fire on `|input|` and tag each
//! spike with the sign of the input.

use super::few_spike::FewSpikeSchedule;
use super::traits::{
    NeuronModel, NeuronModelDescriptor, Spike, StateVars, StepContext, ThresholdMode, VarSpec,
};
use crate::error::NeuralResult;
use rand::{Rng, RngCore};

pub const INPUT: usize = 0;
pub const VMEM: usize = 1;

const INPUT_ONLY: &[VarSpec] = &[VarSpec { name: "input", init: 0.0 }];
const INPUT_AND_VMEM: &[VarSpec] = &[
    VarSpec { name: "input", init: 0.0 },
    VarSpec { name: "Vmem", init: 0.0 },
];

const fn encoder(
    name: &'static str,
    param_names: &'static [&'static str],
    vars: &'static [VarSpec],
    signed_spikes: bool,
    pipelined: bool,
) -> NeuronModelDescriptor {
    NeuronModelDescriptor {
        name,
        param_names,
        vars,
        extra_global_params: &[],
        threshold: ThresholdMode::None,
        signed_spikes,
        input_var: Some("input"),
        output_var: None,
        pipelined,
    }
}

const SPIKE: NeuronModelDescriptor = encoder(SpikeInputModel::NAME, &[], INPUT_ONLY, false, false);
const SPIKE_SIGNED: NeuronModelDescriptor =
    encoder(SpikeInputModel::SIGNED_NAME, &[], INPUT_ONLY, true, false);
const POISSON: NeuronModelDescriptor =
    encoder(PoissonInputModel::NAME, &[], INPUT_ONLY, false, false);
const POISSON_SIGNED: NeuronModelDescriptor =
    encoder(PoissonInputModel::SIGNED_NAME, &[], INPUT_ONLY, true, false);
const IF_INPUT: NeuronModelDescriptor =
    encoder(IfInputModel::NAME, &[], INPUT_AND_VMEM, false, false);
const FS_INPUT: NeuronModelDescriptor = encoder(
    FewSpikeInputModel::NAME,
    &["K", "alpha"],
    INPUT_AND_VMEM,
    false,
    true,
);

/// Deterministic spike train: fires every step the input is active
#[derive(Debug, Clone, Copy, Default)]
pub struct SpikeInputModel {
    signed: bool,
}

impl SpikeInputModel {
    pub const NAME: &'static str = "spike_input";
    pub const SIGNED_NAME: &'static str = "spike_input_signed";

    pub fn new() -> Self {
        Self { signed: false }
    }

    pub fn signed() -> Self {
        Self { signed: true }
    }
}

impl NeuronModel for SpikeInputModel {
    fn descriptor(&self) -> &NeuronModelDescriptor {
        if self.signed {
            &SPIKE_SIGNED
        } else {
            &SPIKE
        }
    }

    fn step(
        &self,
        _ctx: &StepContext<'_>,
        state: &mut StateVars,
        _rng: &mut dyn RngCore,
        spikes: &mut Vec<Spike>,
    ) {
        for (i, &x) in state.get(INPUT).iter().enumerate() {
            if x > 0.0 {
                spikes.push(Spike::positive(i));
            } else if self.signed && x < 0.0 {
                spikes.push(Spike::signed(i, -1.0));
            }
        }
    }
}

/// Poisson rate code
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonInputModel {
    signed: bool,
}

impl PoissonInputModel {
    pub const NAME: &'static str = "poisson_input";
    pub const SIGNED_NAME: &'static str = "poisson_input_signed";

    pub fn new() -> Self {
        Self { signed: false }
    }

    pub fn signed() -> Self {
        Self { signed: true }
    }
}

impl NeuronModel for PoissonInputModel {
    fn descriptor(&self) -> &NeuronModelDescriptor {
        if self.signed {
            &POISSON_SIGNED
        } else {
            &POISSON
        }
    }

    fn step(
        &self,
        ctx: &StepContext<'_>,
        state: &mut StateVars,
        rng: &mut dyn RngCore,
        spikes: &mut Vec<Spike>,
    ) {
        for (i, &x) in state.get(INPUT).iter().enumerate() {
            let magnitude = if self.signed { x.abs() } else { x };
            if magnitude <= 0.0 {
                continue;
            }
            let p = (magnitude * ctx.dt).min(1.0);
            if rng.gen::<f32>() < p {
                spikes.push(Spike::signed(i, x.signum()));
            }
        }
    }
}

/// Integrate-and-fire input with unit threshold
#[derive(Debug, Clone, Copy, Default)]
pub struct IfInputModel;

impl IfInputModel {
    pub const NAME: &'static str = "if_input";

    pub fn new() -> Self {
        Self
    }
}

impl NeuronModel for IfInputModel {
    fn descriptor(&self) -> &NeuronModelDescriptor {
        &IF_INPUT
    }

    fn step(
        &self,
        ctx: &StepContext<'_>,
        state: &mut StateVars,
        _rng: &mut dyn RngCore,
        spikes: &mut Vec<Spike>,
    ) {
        let (input, vmem) = state.pair_mut(INPUT, VMEM);
        for (i, (x, v)) in input.iter().zip(vmem.iter_mut()).enumerate() {
            *v += x * ctx.dt;
            if *v >= 1.0 {
                *v -= 1.0;
                spikes.push(Spike::positive(i));
            }
        }
    }
}

/// Few-spike input: loads `input` at pipeline start and emits its binary expansion
#[derive(Debug, Clone, Copy, Default)]
pub struct FewSpikeInputModel;

impl FewSpikeInputModel {
    pub const NAME: &'static str = "fs_relu_input";

    pub fn new() -> Self {
        Self
    }
}

impl NeuronModel for FewSpikeInputModel {
    fn descriptor(&self) -> &NeuronModelDescriptor {
        &FS_INPUT
    }

    fn validate_params(&self, params: &[f32]) -> NeuralResult<()> {
        FewSpikeSchedule::from_params(params).map(|_| ())
    }

    fn pipeline_length(&self, params: &[f32]) -> u32 {
        FewSpikeSchedule::from_params(params).map_or(1, |s| s.k())
    }

    fn step(
        &self,
        ctx: &StepContext<'_>,
        state: &mut StateVars,
        _rng: &mut dyn RngCore,
        spikes: &mut Vec<Spike>,
    ) {
        let Ok(schedule) = FewSpikeSchedule::from_params(ctx.params) else {
            return;
        };
        let t = schedule.pipeline_timestep(ctx.timestep);
        let h_t = schedule.threshold(t);

        let (input, vmem) = state.pair_mut(INPUT, VMEM);
        for (i, (x, v)) in input.iter().zip(vmem.iter_mut()).enumerate() {
            if t == 0 {
                *v = *x;
            }
            if *v >= h_t {
                *v -= h_t;
                spikes.push(Spike::positive(i));
            }
        }
    }
}
