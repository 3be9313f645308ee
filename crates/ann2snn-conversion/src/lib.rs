// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# ann2snn Conversion

Maps a trained ReLU network onto a batched spiking runtime and calibrates
its firing thresholds.

- [`ann`]: layer descriptions and the [`AnnModel`] interface, with the
  [`SequentialAnn`] reference forward pass
- [`builder`]: [`NetworkBuilder`] creating populations and projections
- [`network`]: the resulting [`SpikingNetwork`] handle (thresholds, input,
  presentation, evaluation)
- [`calibration`]: data-norm, spike-norm and few-spike strategies
*/

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod ann;
pub mod builder;
pub mod calibration;
pub mod error;
pub mod network;
pub mod samples;

pub use ann::{Activation, AnnModel, LayerKind, LayerSpec, SequentialAnn, Shape};
pub use builder::{BuildOptions, NetworkBuilder};
pub use calibration::{
    CalibrationResult, Calibrator, DataNorm, DataNormResult, FewSpike, FewSpikeResult, SpikeNorm,
    SpikeNormResult,
};
pub use error::{ConversionError, ConversionResult};
pub use network::{LayerPopulation, Projection, SpikingNetwork};
pub use samples::SampleSet;
