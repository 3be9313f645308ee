// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for network building and calibration

use ann2snn_config::ConfigError;
use ann2snn_connectivity::ConnectivityError;
use ann2snn_neural::NeuralError;
use ann2snn_runtime::RuntimeError;

/// Result type for conversion operations
pub type ConversionResult<T> = Result<T, ConversionError>;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Shape mismatch in layer '{layer}': {reason}")]
    ShapeMismatch { layer: String, reason: String },

    #[error("Unsupported layer '{layer}': {reason}")]
    UnsupportedLayer { layer: String, reason: String },

    #[error("Layer '{layer}' uses model '{model}' whose threshold cannot be set")]
    ThresholdNotSettable { layer: String, model: String },

    #[error("Calibration requires at least one sample")]
    EmptySampleSet,

    #[error("Degenerate scale {value} in layer '{layer}'")]
    DegenerateScale { layer: String, value: f64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Neural(#[from] NeuralError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to parse network description: {0}")]
    Json(#[from] serde_json::Error),
}
