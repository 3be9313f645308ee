// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for neuron and synapse models

/// Errors raised by model lookup and parameter validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NeuralError {
    #[error("Unknown neuron model: {0}")]
    UnknownModel(String),

    #[error("Unknown weight update model: {0}")]
    UnknownWeightUpdateModel(String),

    #[error("Model '{model}' has no state variable '{var}'")]
    UnknownVariable { model: String, var: String },

    #[error("Model '{model}' expects {expected} parameters, got {actual}")]
    ParameterCount {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter for model '{model}': {reason}")]
    InvalidParameter { model: String, reason: String },

    #[error("Model '{model}' does not support overriding its threshold")]
    ThresholdNotSettable { model: String },
}

pub type NeuralResult<T> = Result<T, NeuralError>;
