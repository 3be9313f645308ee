// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ann2snn-observability
//!
//! Logging setup shared by every ann2snn crate, with per-crate debug flag
//! support.
//!
//! ## Features
//! - `file-logging`: JSON log files in a timestamped run folder (desktop only)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known ann2snn crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "ann2snn",
    "ann2snn-config",
    "ann2snn-observability",
    "ann2snn-neural",
    "ann2snn-connectivity",
    "ann2snn-runtime",
    "ann2snn-conversion",
];
