// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Neuron Model Architecture
//!
//! Models are described declaratively by a [`NeuronModelDescriptor`] (parameters,
//! per-unit state variables, extra global parameters, threshold handling) and
//! advance a whole population by one timestep in [`NeuronModel::step`].
//!
//! ## Adding a New Neuron Model
//!
//! 1. Create `src/models/your_model.rs`
//! 2. Implement `NeuronModel` trait with a `const` descriptor
//! 3. Add tests
//! 4. Export in `mod.rs` and register it in [`crate::ModelRegistry::with_builtin_models`]

pub mod few_spike;
pub mod input;
pub mod integrate_fire;
pub mod traits;

pub use traits::{
    EgpSpec, NeuronModel, NeuronModelDescriptor, Spike, StateVars, StepContext, ThresholdMode,
    VarSpec,
};
