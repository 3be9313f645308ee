// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Few-Spike ReLU Neuron Model
//!
//! Temporal code that transmits an activation as a K-bit binary expansion
//! over K consecutive timesteps.
//!
//! ## Model Dynamics
//!
//! ```text
//! scale = alpha × 2^(-K)
//! t     = timestep mod K
//! h_T   = scale × 2^(K - 1 - t)          (threshold and reset magnitude)
//! d     = scale × 2^((K - t) mod K)      (decode weight of spikes sent last step)
//!
//! Fx += Isyn × d
//! if t == 0: Vmem = Fx, Fx = 0
//! if Vmem ≥ h_T: FIRE, Vmem -= h_T
//! ```
//!
//! The threshold is fixed by the schedule and cannot be overridden.

use super::traits::{
    NeuronModel, NeuronModelDescriptor, Spike, StateVars, StepContext, ThresholdMode, VarSpec,
};
use crate::error::{NeuralError, NeuralResult};
use rand::RngCore;

/// Largest supported pipeline length (2^(K-1) must stay exact in f32)
pub const MAX_PIPELINE_LENGTH: u32 = 31;

pub const FX: usize = 0;
pub const VMEM: usize = 1;

pub const PARAM_K: usize = 0;
pub const PARAM_ALPHA: usize = 1;

const DESCRIPTOR: NeuronModelDescriptor = NeuronModelDescriptor {
    name: FewSpikeReluModel::NAME,
    param_names: &["K", "alpha"],
    vars: &[
        VarSpec { name: "Fx", init: 0.0 },
        VarSpec { name: "Vmem", init: 0.0 },
    ],
    extra_global_params: &[],
    threshold: ThresholdMode::Schedule,
    signed_spikes: false,
    input_var: None,
    output_var: Some("Fx"),
    pipelined: true,
};

/// Few-spike schedule constants for one layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FewSpikeSchedule {
    k: u32,
    alpha: f32,
}

impl FewSpikeSchedule {
    /// # Errors
    /// `InvalidParameter` when `k` is outside `1..=31` or `alpha` is not
    /// strictly positive and finite.
    pub fn new(k: u32, alpha: f32) -> NeuralResult<Self> {
        if k == 0 || k > MAX_PIPELINE_LENGTH {
            return Err(NeuralError::InvalidParameter {
                model: FewSpikeReluModel::NAME.to_string(),
                reason: format!("K must be in 1..={}, got {}", MAX_PIPELINE_LENGTH, k),
            });
        }
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(NeuralError::InvalidParameter {
                model: FewSpikeReluModel::NAME.to_string(),
                reason: format!("alpha must be positive, got {}", alpha),
            });
        }
        Ok(Self { k, alpha })
    }

    /// Read the schedule from `[K, alpha]` population parameters
    pub fn from_params(params: &[f32]) -> NeuralResult<Self> {
        match params {
            [k, alpha] => {
                if k.fract() != 0.0 || *k < 0.0 {
                    return Err(NeuralError::InvalidParameter {
                        model: FewSpikeReluModel::NAME.to_string(),
                        reason: format!("K must be a whole number, got {}", k),
                    });
                }
                Self::new(*k as u32, *alpha)
            }
            _ => Err(NeuralError::ParameterCount {
                model: FewSpikeReluModel::NAME.to_string(),
                expected: 2,
                actual: params.len(),
            }),
        }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Population parameters `[K, alpha]`
    pub fn params(&self) -> Vec<f32> {
        vec![self.k as f32, self.alpha]
    }

    /// `alpha × 2^(-K)`, the value of the least significant bit
    pub fn scale(&self) -> f32 {
        self.alpha * pow2(-(self.k as i32))
    }

    /// Position of a runtime timestep within the pipeline
    #[inline]
    pub fn pipeline_timestep(&self, timestep: u64) -> u32 {
        (timestep % self.k as u64) as u32
    }

    /// Threshold and reset magnitude `h_T` at pipeline timestep `t`
    #[inline]
    pub fn threshold(&self, t: u32) -> f32 {
        self.scale() * pow2(self.k as i32 - 1 - t as i32)
    }

    /// Decode weight `d` applied to input arriving at pipeline timestep `t`
    #[inline]
    pub fn decode_weight(&self, t: u32) -> f32 {
        self.scale() * pow2(((self.k - t) % self.k) as i32)
    }

    /// Largest value representable by the schedule
    pub fn max_value(&self) -> f32 {
        self.scale() * (pow2(self.k as i32) - 1.0)
    }
}

#[inline]
fn pow2(exp: i32) -> f32 {
    2.0f32.powi(exp)
}

/// Few-spike ReLU neuron
#[derive(Debug, Clone, Copy, Default)]
pub struct FewSpikeReluModel;

impl FewSpikeReluModel {
    pub const NAME: &'static str = "fs_relu";

    pub fn new() -> Self {
        Self
    }
}

impl NeuronModel for FewSpikeReluModel {
    fn descriptor(&self) -> &NeuronModelDescriptor {
        &DESCRIPTOR
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
        // Parameters are validated when the population is created
        let Ok(schedule) = FewSpikeSchedule::from_params(ctx.params) else {
            return;
        };
        let t = schedule.pipeline_timestep(ctx.timestep);
        let h_t = schedule.threshold(t);
        let d = schedule.decode_weight(t);

        let (fx, vmem) = state.pair_mut(FX, VMEM);
        for (i, (f, v)) in fx.iter_mut().zip(vmem.iter_mut()).enumerate() {
            // Spikes from the previous step are decoded before the transfer
            *f += ctx.isyn[i] * d;
            if t == 0 {
                *v = *f;
                *f = 0.0;
            }
            if *v >= h_t {
                *v -= h_t;
                spikes.push(Spike::positive(i));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_schedule_constants_k10_alpha25() {
        let s = FewSpikeSchedule::new(10, 25.0).unwrap();
        let scale = 25.0 * 2.0f32.powi(-10);
        assert_eq!(s.scale(), scale);
        assert_eq!(s.threshold(0), scale * 2.0f32.powi(9));
        assert_eq!(s.threshold(0), 12.5);
        assert_eq!(s.decode_weight(0), scale);
        assert_eq!(s.threshold(9), scale);
        assert_eq!(s.decode_weight(1), scale * 2.0f32.powi(9));
    }

    #[test]
    fn test_pipeline_timestep_wraps() {
        let s = FewSpikeSchedule::new(4, 1.0).unwrap();
        assert_eq!(s.pipeline_timestep(0), 0);
        assert_eq!(s.pipeline_timestep(5), 1);
        assert_eq!(s.pipeline_timestep(8), 0);
    }

    #[test]
    fn test_schedule_rejects_bad_parameters() {
        assert!(FewSpikeSchedule::new(0, 1.0).is_err());
        assert!(FewSpikeSchedule::new(32, 1.0).is_err());
        assert!(FewSpikeSchedule::new(4, 0.0).is_err());
        assert!(FewSpikeSchedule::from_params(&[4.5, 1.0]).is_err());
        assert!(FewSpikeSchedule::from_params(&[4.0]).is_err());
    }

    #[test]
    fn test_threshold_not_settable() {
        assert!(matches!(
            FewSpikeReluModel.descriptor().threshold_egp(),
            Err(NeuralError::ThresholdNotSettable { .. })
        ));
    }

    /// Drive one neuron with a pre-loaded Fx and record its spike train
    #[test]
    fn test_binary_expansion_of_transferred_value() {
        let schedule = FewSpikeSchedule::new(4, 1.0).unwrap();
        let params = schedule.params();
        let model = FewSpikeReluModel;
        let mut state = StateVars::new(model.descriptor(), 1);
        // 0.625 = 0.5 + 0.125 -> bits at t = 0 and t = 2 (h_T = 0.5, 0.25, 0.125, 0.0625)
        state.get_mut(FX)[0] = 0.625;

        let mut fired = Vec::new();
        for timestep in 0..4u64 {
            let ctx = StepContext {
                timestep,
                dt: 1.0,
                params: &params,
                extra_global_params: &[],
                isyn: &[0.0],
            };
            let mut spikes = Vec::new();
            model.step(&ctx, &mut state, &mut StepRng::new(0, 1), &mut spikes);
            fired.push(!spikes.is_empty());
        }
        assert_eq!(fired, vec![true, false, true, false]);
        assert_eq!(state.get(VMEM)[0], 0.0);
    }
}
