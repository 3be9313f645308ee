// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Synapse models
//!
//! ```text
//! StaticPulse:        Isyn[post] += weight
//! SignedStaticPulse:  Isyn[post] += weight × spike_sign
//! DeltaCurr:          Isyn is consumed in the step it arrives, then cleared
//! ```

use crate::error::{NeuralError, NeuralResult};

/// Presynaptic spike to postsynaptic input rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeightUpdateModel {
    #[default]
    StaticPulse,
    /// Scales the weight by the sign carried on the spike
    SignedStaticPulse,
}

impl WeightUpdateModel {
    /// Model appropriate for a source that does or does not emit signed spikes
    pub fn for_source(signed_spikes: bool) -> Self {
        if signed_spikes {
            WeightUpdateModel::SignedStaticPulse
        } else {
            WeightUpdateModel::StaticPulse
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WeightUpdateModel::StaticPulse => "static_pulse",
            WeightUpdateModel::SignedStaticPulse => "signed_static_pulse",
        }
    }

    pub fn from_name(name: &str) -> NeuralResult<Self> {
        match name {
            "static_pulse" => Ok(WeightUpdateModel::StaticPulse),
            "signed_static_pulse" => Ok(WeightUpdateModel::SignedStaticPulse),
            other => Err(NeuralError::UnknownWeightUpdateModel(other.to_string())),
        }
    }

    /// Current delivered by one spike through a synapse of `weight`
    #[inline(always)]
    pub fn pulse(&self, weight: f32, spike_sign: f32) -> f32 {
        match self {
            WeightUpdateModel::StaticPulse => weight,
            WeightUpdateModel::SignedStaticPulse => weight * spike_sign,
        }
    }
}

/// Postsynaptic current model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PostsynapticModel {
    /// Instantaneous current injection
    #[default]
    DeltaCurr,
}

impl PostsynapticModel {
    pub fn name(&self) -> &'static str {
        match self {
            PostsynapticModel::DeltaCurr => "delta_curr",
        }
    }

    /// Add one delivered pulse to a postsynaptic input accumulator
    #[inline(always)]
    pub fn inject(&self, isyn: &mut f32, pulse: f32) {
        match self {
            PostsynapticModel::DeltaCurr => *isyn += pulse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_sign_handling() {
        assert_eq!(WeightUpdateModel::StaticPulse.pulse(0.5, -1.0), 0.5);
        assert_eq!(WeightUpdateModel::SignedStaticPulse.pulse(0.5, -1.0), -0.5);
        assert_eq!(WeightUpdateModel::SignedStaticPulse.pulse(0.5, 1.0), 0.5);
    }

    #[test]
    fn test_delta_current_accumulates() {
        let mut isyn = 0.0;
        PostsynapticModel::DeltaCurr.inject(&mut isyn, 0.5);
        PostsynapticModel::DeltaCurr.inject(&mut isyn, -0.25);
        assert_eq!(isyn, 0.25);
    }

    #[test]
    fn test_for_source() {
        assert_eq!(
            WeightUpdateModel::for_source(true),
            WeightUpdateModel::SignedStaticPulse
        );
        assert_eq!(
            WeightUpdateModel::for_source(false),
            WeightUpdateModel::StaticPulse
        );
    }

    #[test]
    fn test_name_round_trip() {
        for model in [
            WeightUpdateModel::StaticPulse,
            WeightUpdateModel::SignedStaticPulse,
        ] {
            assert_eq!(WeightUpdateModel::from_name(model.name()), Ok(model));
        }
        assert!(WeightUpdateModel::from_name("stdp").is_err());
    }
}
