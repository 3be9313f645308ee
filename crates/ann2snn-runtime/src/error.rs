// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for runtime operations

use crate::ids::{PopulationId, ProjectionId};
use ann2snn_neural::NeuralError;

/// Runtime errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Population not found: {0}")]
    PopulationNotFound(PopulationId),

    #[error("Projection not found: {0}")]
    ProjectionNotFound(ProjectionId),

    #[error("Population '{population}' has no variable '{var}'")]
    UnknownVariable { population: String, var: String },

    #[error("Population '{population}' has no extra global parameter '{name}'")]
    UnknownExtraGlobalParam { population: String, name: String },

    #[error("Size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Projection {0} references shared weights and cannot modify them")]
    WeightsNotOwned(ProjectionId),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Neural(#[from] NeuralError),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
