// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks that values are within range and that the chosen neuron model,
//! input encoder and calibration strategy are compatible.

use crate::{CalibrationStrategy, ConfigError, ConfigResult, ConversionConfig};

/// Largest few-spike pipeline length
pub const MAX_FEW_SPIKE_K: u32 = 31;

const CONNECTIVITY_MODES: &[&str] = &["procedural", "sparse"];
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    Incompatible { reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::Incompatible { reason } => write!(f, "Incompatible settings: {}", reason),
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Required model names
/// - Valid value ranges (batch sizes, dt, times, K, alpha)
/// - Model / strategy compatibility
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &ConversionConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_value_ranges(config, &mut errors);
    validate_compatibility(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_required_fields(config: &ConversionConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.builder.neuron_model.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "builder.neuron_model".to_string(),
        });
    }
    if config.builder.input_model.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "builder.input_model".to_string(),
        });
    }
}

fn positive(field: &str, value: f32, errors: &mut Vec<ConfigValidationError>) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be positive, got {}", value),
        });
    }
}

fn validate_value_ranges(config: &ConversionConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.builder.batch_size == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "builder.batch_size".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if config.calibration.batch_size == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "calibration.batch_size".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if !CONNECTIVITY_MODES.contains(&config.builder.connectivity.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "builder.connectivity".to_string(),
            reason: format!(
                "'{}' must be one of: {}",
                config.builder.connectivity,
                CONNECTIVITY_MODES.join(", ")
            ),
        });
    }

    positive("builder.threshold", config.builder.threshold, errors);
    positive("simulation.dt", config.simulation.dt, errors);
    positive("simulation.present_time", config.simulation.present_time, errors);
    positive("calibration.norm_time", config.calibration.norm_time, errors);
    positive("few_spike.alpha", config.few_spike.alpha, errors);
    positive("few_spike.input_alpha", config.few_spike.input_alpha, errors);

    if config.few_spike.k == 0 || config.few_spike.k > MAX_FEW_SPIKE_K {
        errors.push(ConfigValidationError::InvalidValue {
            field: "few_spike.k".to_string(),
            reason: format!("must be in 1..={}, got {}", MAX_FEW_SPIKE_K, config.few_spike.k),
        });
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!(
                "'{}' must be one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }
}

fn validate_compatibility(config: &ConversionConfig, errors: &mut Vec<ConfigValidationError>) {
    let few_spike_model = config.builder.neuron_model == "fs_relu";
    match config.calibration.strategy {
        CalibrationStrategy::FewSpike if !few_spike_model => {
            errors.push(ConfigValidationError::Incompatible {
                reason: format!(
                    "calibration.strategy = few_spike requires builder.neuron_model = \"fs_relu\", got \"{}\"",
                    config.builder.neuron_model
                ),
            });
        }
        CalibrationStrategy::DataNorm | CalibrationStrategy::SpikeNorm if few_spike_model => {
            errors.push(ConfigValidationError::Incompatible {
                reason: format!(
                    "calibration.strategy = {} sets thresholds, which fs_relu neurons do not have",
                    config.calibration.strategy.as_str()
                ),
            });
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(config: &ConversionConfig) -> String {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ConversionConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = ConversionConfig::default();
        config.builder.batch_size = 0;
        assert!(message(&config).contains("builder.batch_size"));
    }

    #[test]
    fn test_non_positive_dt() {
        let mut config = ConversionConfig::default();
        config.simulation.dt = 0.0;
        assert!(message(&config).contains("simulation.dt"));
        config.simulation.dt = -1.0;
        assert!(message(&config).contains("simulation.dt"));
    }

    #[test]
    fn test_k_out_of_range() {
        let mut config = ConversionConfig::default();
        config.few_spike.k = 0;
        assert!(message(&config).contains("few_spike.k"));
        config.few_spike.k = 32;
        assert!(message(&config).contains("few_spike.k"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ConversionConfig::default();
        config.builder.connectivity = "dense".to_string();
        config.calibration.norm_time = 0.0;
        config.builder.input_model = String::new();
        let msg = message(&config);
        assert!(msg.contains("builder.connectivity"));
        assert!(msg.contains("calibration.norm_time"));
        assert!(msg.contains("builder.input_model"));
    }

    #[test]
    fn test_few_spike_requires_fs_model() {
        let mut config = ConversionConfig::default();
        config.calibration.strategy = CalibrationStrategy::FewSpike;
        assert!(message(&config).contains("fs_relu"));

        config.builder.neuron_model = "fs_relu".to_string();
        config.builder.input_model = "fs_relu_input".to_string();
        assert!(validate_config(&config).is_ok());

        config.calibration.strategy = CalibrationStrategy::SpikeNorm;
        assert!(message(&config).contains("spike_norm"));
    }
}
