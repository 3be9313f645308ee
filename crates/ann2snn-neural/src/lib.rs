// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # ann2snn Neural Models
//!
//! Declarative spiking neuron and synapse models used by converted networks:
//! - **Models**: integrate-and-fire, few-spike ReLU, and input encoders
//!   (spike, Poisson, integrate-and-fire, few-spike)
//! - **Synapse**: weight-update rules (static pulse, signed static pulse)
//! - **Registry**: an explicit, caller-owned lookup of model descriptors
//!
//! Each model describes its parameters, per-unit state variables, extra
//! global (population-broadcast) parameters and whether its firing threshold
//! can be overridden, and implements one population-wide timestep.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod models;
pub mod registry;
pub mod synapse;

pub use error::{NeuralError, NeuralResult};
pub use models::{
    few_spike::{FewSpikeReluModel, FewSpikeSchedule},
    input::{FewSpikeInputModel, IfInputModel, PoissonInputModel, SpikeInputModel},
    integrate_fire::IntegrateFireModel,
    EgpSpec, NeuronModel, NeuronModelDescriptor, Spike, StateVars, StepContext, ThresholdMode,
    VarSpec,
};
pub use registry::ModelRegistry;
pub use synapse::{PostsynapticModel, WeightUpdateModel};
