// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # IF (Integrate-and-Fire) Neuron Model
//!
//! Rate-coding model used for converted ReLU layers.
//!
//! ## Model Dynamics
//!
//! ```text
//! Membrane Potential Update:
//!     Vmem(t+1) = Vmem(t) + Isyn × dt
//!
//! Firing Check:
//!     if Vmem ≥ Vthr: FIRE, Vmem = 0, nSpk += 1
//! ```
//!
//! `Vthr` is an extra global parameter so calibration can rewrite it after
//! the population has been built.

use super::traits::{
    EgpSpec, NeuronModel, NeuronModelDescriptor, Spike, StateVars, StepContext, ThresholdMode,
    VarSpec,
};
use rand::RngCore;

pub const VMEM: usize = 0;
pub const NSPK: usize = 1;

const DESCRIPTOR: NeuronModelDescriptor = NeuronModelDescriptor {
    name: IntegrateFireModel::NAME,
    param_names: &[],
    vars: &[
        VarSpec { name: "Vmem", init: 0.0 },
        VarSpec { name: "nSpk", init: 0.0 },
    ],
    extra_global_params: &[EgpSpec {
        name: "Vthr",
        default: 1.0,
    }],
    threshold: ThresholdMode::Settable { egp: "Vthr" },
    signed_spikes: false,
    input_var: None,
    output_var: Some("nSpk"),
    pipelined: false,
};

/// Non-leaky integrate-and-fire neuron with a settable threshold
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrateFireModel;

impl IntegrateFireModel {
    pub const NAME: &'static str = "if";

    pub fn new() -> Self {
        Self
    }
}

impl NeuronModel for IntegrateFireModel {
    fn descriptor(&self) -> &NeuronModelDescriptor {
        &DESCRIPTOR
    }

    fn step(
        &self,
        ctx: &StepContext<'_>,
        state: &mut StateVars,
        _rng: &mut dyn RngCore,
        spikes: &mut Vec<Spike>,
    ) {
        let v_thr = ctx.extra_global_params[0];
        let (vmem, n_spk) = state.pair_mut(VMEM, NSPK);
        for (i, (v, isyn)) in vmem.iter_mut().zip(ctx.isyn).enumerate() {
            *v += isyn * ctx.dt;
            if *v >= v_thr {
                *v = 0.0;
                n_spk[i] += 1.0;
                spikes.push(Spike::positive(i));
            }
        }
    }
}
