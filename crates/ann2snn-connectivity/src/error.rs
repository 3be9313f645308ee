// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error types for connectivity generation.
*/

/// Result type for connectivity operations
pub type ConnectivityResult<T> = Result<T, ConnectivityError>;

/// Errors that can occur while deriving or generating connectivity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectivityError {
    #[error("Invalid convolution geometry: {0}")]
    InvalidGeometry(String),

    #[error("Target shape mismatch: derived {derived:?}, target already fixed at {target:?}")]
    ShapeMismatch {
        derived: (usize, usize, usize),
        target: (usize, usize, usize),
    },
}
