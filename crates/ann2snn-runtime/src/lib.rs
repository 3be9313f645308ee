// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ann2snn Runtime
//!
//! The [`SpikingRuntime`] trait is the only interface the builder and the
//! calibration strategies use to talk to a spiking simulator. It mirrors a
//! device simulator: populations and projections are created once, state lives
//! "on the device", and the host sees it only through explicit
//! `pull_*_from_device` / `push_*_to_device` synchronisation points.
//!
//! [`CpuRuntime`] is the reference implementation: a batched CPU simulator
//! keeping separate host and device copies of every variable.

pub mod cpu;
pub mod error;
pub mod ids;
pub mod traits;

pub use cpu::CpuRuntime;
pub use error::{RuntimeError, RuntimeResult};
pub use ids::{PopulationId, ProjectionId};
pub use traits::{NeuronPopulationSpec, SpikingRuntime, SynapsePopulationSpec, SynapseWeights};
