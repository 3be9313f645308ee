// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ann2snn - ANN to SNN conversion
//!
//! Converts a trained, bias-free ReLU network into a batched spiking network
//! and calibrates its firing thresholds. This crate re-exports every
//! component and provides the one-call [`convert`] pipeline.
//!
//! ## Components
//!
//! - **`config`**: TOML configuration with environment and CLI overrides
//! - **`observability`**: `tracing` initialisation and per-crate debug flags
//! - **`neural`**: neuron/synapse models and the model registry
//! - **`connectivity`**: procedural, sparse and dense connectivity
//! - **`runtime`**: the `SpikingRuntime` trait and the CPU runtime
//! - **`conversion`**: ANN description, network builder, calibration
//!
//! ## Calibration strategies
//!
//! - **`data_norm`** (default): thresholds from maximum analog activations
//! - **`spike_norm`**: thresholds from simulated membrane input, layer by layer
//! - **`few_spike`**: K-step binary temporal code with fixed schedules
//! - **`none`**: keep the configured threshold
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ann2snn::prelude::*;
//!
//! let ann = SequentialAnn::from_json(&std::fs::read_to_string("mnist.json")?)?;
//! let config = ann2snn::config::load_config(None, None)?;
//! let registry = ModelRegistry::with_builtin_models();
//! let mut runtime = CpuRuntime::with_seed(config.simulation.dt, config.simulation.seed)?;
//!
//! let data = ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[256, 28, 28, 1]));
//! let samples = ann2snn::calibration_samples(data, &config)?;
//! let conversion = ann2snn::convert(&ann, &config, &registry, &mut runtime, Some(&samples))?;
//!
//! let batch = samples.data();
//! let predictions = conversion.network.present_batch(
//!     &mut runtime,
//!     batch.slice_axis(ndarray::Axis(0), ndarray::Slice::from(0..1)),
//!     config.simulation.present_time as f64,
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod pipeline;

pub use pipeline::{calibration_samples, convert, init_logging_from_config, Conversion};

// Re-export components
pub use ann2snn_config as config;
pub use ann2snn_connectivity as connectivity;
pub use ann2snn_conversion as conversion;
pub use ann2snn_neural as neural;
pub use ann2snn_observability as observability;
pub use ann2snn_runtime as runtime;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{CalibrationStrategy, ConversionConfig};
    pub use crate::connectivity::{ConnectivityMode, PadMode};
    pub use crate::conversion::{
        AnnModel, BuildOptions, CalibrationResult, Calibrator, ConversionError, ConversionResult,
        DataNorm, FewSpike, LayerKind, LayerSpec, NetworkBuilder, SampleSet, SequentialAnn, Shape,
        SpikeNorm, SpikingNetwork,
    };
    pub use crate::neural::{ModelRegistry, NeuronModel};
    pub use crate::pipeline::{convert, Conversion};
    pub use crate::runtime::{CpuRuntime, SpikingRuntime};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let registry = ModelRegistry::with_builtin_models();
        assert!(registry.contains("if"));
        assert_eq!(ConversionConfig::default().calibration.strategy, CalibrationStrategy::DataNorm);
    }
}
