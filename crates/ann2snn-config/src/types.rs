// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Every struct maps to one section of `ann2snn.toml`. All sections are
//! optional; missing keys take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub builder: BuilderConfig,
    pub simulation: SimulationConfig,
    pub calibration: CalibrationConfig,
    pub few_spike: FewSpikeConfig,
    pub logging: LoggingSection,
}

/// Network construction settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Registry name of the hidden/output layer neuron model
    pub neuron_model: String,
    /// Registry name of the input encoder model
    pub input_model: String,
    /// Initial threshold of settable-threshold models
    pub threshold: f32,
    /// Convolution connectivity: "procedural" or "sparse"
    pub connectivity: String,
    /// Number of replicas simulated in parallel
    pub batch_size: usize,
    /// Replicas reference replica 0's weights instead of owning copies
    pub share_weights: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            neuron_model: "if".to_string(),
            input_model: "poisson_input".to_string(),
            threshold: 1.0,
            connectivity: "procedural".to_string(),
            batch_size: 1,
            share_weights: true,
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Timestep length (ms)
    pub dt: f32,
    /// Presentation time per sample during inference (ms)
    pub present_time: f32,
    /// Seed for stochastic input encoders
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 1.0,
            present_time: 100.0,
            seed: 1234,
        }
    }
}

/// Threshold calibration strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStrategy {
    /// Keep the builder's thresholds
    None,
    /// Thresholds from maximum analog activations
    #[default]
    DataNorm,
    /// Thresholds from maximum simulated membrane potentials
    SpikeNorm,
    /// Few-spike temporal coding schedules
    FewSpike,
}

impl CalibrationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationStrategy::None => "none",
            CalibrationStrategy::DataNorm => "data_norm",
            CalibrationStrategy::SpikeNorm => "spike_norm",
            CalibrationStrategy::FewSpike => "few_spike",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "none" => Some(CalibrationStrategy::None),
            "data_norm" => Some(CalibrationStrategy::DataNorm),
            "spike_norm" => Some(CalibrationStrategy::SpikeNorm),
            "few_spike" => Some(CalibrationStrategy::FewSpike),
            _ => None,
        }
    }
}

/// Calibration settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub strategy: CalibrationStrategy,
    /// Samples per forward pass for data-based normalization
    pub batch_size: usize,
    /// Simulated time per batch for spike-count normalization (ms)
    pub norm_time: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            strategy: CalibrationStrategy::default(),
            batch_size: 256,
            norm_time: 500.0,
        }
    }
}

/// Few-spike coding settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FewSpikeConfig {
    /// Pipeline stages per layer
    pub k: u32,
    /// Dynamic range of hidden layers
    pub alpha: f32,
    /// Dynamic range of the input layer
    pub input_alpha: f32,
}

impl Default for FewSpikeConfig {
    fn default() -> Self {
        Self {
            k: 10,
            alpha: 25.0,
            input_alpha: 1.0,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level: "error", "warn", "info", "debug" or "trace"
    pub level: String,
    /// Crates logged at debug level regardless of `level`
    pub debug_crates: Vec<String>,
    /// Directory for JSON log files (file-logging builds only)
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug_crates: Vec::new(),
            log_dir: None,
        }
    }
}
