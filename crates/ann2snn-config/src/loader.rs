// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{CalibrationStrategy, ConfigError, ConfigResult, ConversionConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "ann2snn.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "ANN2SNN_CONFIG_PATH";

/// Environment variable to `section.key` mapping
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("ANN2SNN_NEURON_MODEL", "builder.neuron_model"),
    ("ANN2SNN_INPUT_MODEL", "builder.input_model"),
    ("ANN2SNN_THRESHOLD", "builder.threshold"),
    ("ANN2SNN_CONNECTIVITY", "builder.connectivity"),
    ("ANN2SNN_BATCH_SIZE", "builder.batch_size"),
    ("ANN2SNN_SHARE_WEIGHTS", "builder.share_weights"),
    ("ANN2SNN_DT", "simulation.dt"),
    ("ANN2SNN_PRESENT_TIME", "simulation.present_time"),
    ("ANN2SNN_SEED", "simulation.seed"),
    ("ANN2SNN_STRATEGY", "calibration.strategy"),
    ("ANN2SNN_CALIBRATION_BATCH_SIZE", "calibration.batch_size"),
    ("ANN2SNN_NORM_TIME", "calibration.norm_time"),
    ("ANN2SNN_FS_K", "few_spike.k"),
    ("ANN2SNN_FS_ALPHA", "few_spike.alpha"),
    ("ANN2SNN_FS_INPUT_ALPHA", "few_spike.input_alpha"),
    ("ANN2SNN_LOG_LEVEL", "logging.level"),
    ("ANN2SNN_LOG_DIR", "logging.log_dir"),
];

/// Find the configuration file
///
/// Search order:
/// 1. `ANN2SNN_CONFIG_PATH` environment variable
/// 2. Current working directory: `./ann2snn.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI overrides keyed by `section.key`
///
/// # Errors
///
/// Returns error if the file is missing or contains invalid TOML, or if a
/// CLI override names an unknown key or carries an unparsable value.
/// Validation is separate (see [`crate::validate_config`]).
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<ConversionConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config = load_config_from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Parse configuration from TOML text without applying overrides
pub fn load_config_from_str(content: &str) -> ConfigResult<ConversionConfig> {
    Ok(toml::from_str(content)?)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables (each maps to one `section.key`):
/// `ANN2SNN_NEURON_MODEL`, `ANN2SNN_INPUT_MODEL`, `ANN2SNN_THRESHOLD`,
/// `ANN2SNN_CONNECTIVITY`, `ANN2SNN_BATCH_SIZE`, `ANN2SNN_SHARE_WEIGHTS`,
/// `ANN2SNN_DT`, `ANN2SNN_PRESENT_TIME`, `ANN2SNN_SEED`, `ANN2SNN_STRATEGY`,
/// `ANN2SNN_CALIBRATION_BATCH_SIZE`, `ANN2SNN_NORM_TIME`, `ANN2SNN_FS_K`,
/// `ANN2SNN_FS_ALPHA`, `ANN2SNN_FS_INPUT_ALPHA`, `ANN2SNN_LOG_LEVEL`,
/// `ANN2SNN_LOG_DIR`.
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut ConversionConfig) {
    for (var, key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(var) {
            let _ = set_value(config, key, &value);
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of `section.key` to value (e.g. `{"builder.batch_size": "32"}`)
pub fn apply_cli_overrides(
    config: &mut ConversionConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (key, value) in cli_args {
        set_value(config, key, value)?;
    }
    Ok(())
}

/// Set a single configuration value addressed as `section.key`
pub fn set_value(config: &mut ConversionConfig, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        "builder.neuron_model" => config.builder.neuron_model = value.to_string(),
        "builder.input_model" => config.builder.input_model = value.to_string(),
        "builder.threshold" => config.builder.threshold = parse(key, value)?,
        "builder.connectivity" => config.builder.connectivity = value.to_lowercase(),
        "builder.batch_size" => config.builder.batch_size = parse(key, value)?,
        "builder.share_weights" => config.builder.share_weights = parse_bool(key, value)?,
        "simulation.dt" => config.simulation.dt = parse(key, value)?,
        "simulation.present_time" => config.simulation.present_time = parse(key, value)?,
        "simulation.seed" => config.simulation.seed = parse(key, value)?,
        "calibration.strategy" => {
            config.calibration.strategy = CalibrationStrategy::parse(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "{} = '{}' (expected none, data_norm, spike_norm or few_spike)",
                    key, value
                ))
            })?
        }
        "calibration.batch_size" => config.calibration.batch_size = parse(key, value)?,
        "calibration.norm_time" => config.calibration.norm_time = parse(key, value)?,
        "few_spike.k" => config.few_spike.k = parse(key, value)?,
        "few_spike.alpha" => config.few_spike.alpha = parse(key, value)?,
        "few_spike.input_alpha" => config.few_spike.input_alpha = parse(key, value)?,
        "logging.level" => config.logging.level = value.to_lowercase(),
        "logging.log_dir" => config.logging.log_dir = Some(PathBuf::from(value)),
        "logging.debug_crates" => {
            config.logging.debug_crates = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        }
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("{} = '{}'", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var(CONFIG_PATH_ENV, "/definitely/not/here/ann2snn.toml");
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[builder]").unwrap();
        writeln!(file, "batch_size = 8").unwrap();
        writeln!(file, "connectivity = \"sparse\"").unwrap();
        writeln!(file, "[calibration]").unwrap();
        writeln!(file, "strategy = \"spike_norm\"").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();
        assert_eq!(config.builder.batch_size, 8);
        assert_eq!(config.builder.connectivity, "sparse");
        assert_eq!(config.calibration.strategy, CalibrationStrategy::SpikeNorm);
        // Untouched sections keep their defaults
        assert_eq!(config.few_spike.k, 10);
        assert_eq!(config.simulation.dt, 1.0);
    }

    #[test]
    fn test_invalid_toml() {
        let err = load_config_from_str("[builder\nbatch_size = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = ConversionConfig::default();

        env::set_var("ANN2SNN_BATCH_SIZE", "16");
        env::set_var("ANN2SNN_STRATEGY", "few_spike");
        env::set_var("ANN2SNN_DT", "not-a-number");

        apply_environment_overrides(&mut config);

        env::remove_var("ANN2SNN_BATCH_SIZE");
        env::remove_var("ANN2SNN_STRATEGY");
        env::remove_var("ANN2SNN_DT");

        assert_eq!(config.builder.batch_size, 16);
        assert_eq!(config.calibration.strategy, CalibrationStrategy::FewSpike);
        assert_eq!(config.simulation.dt, 1.0);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = ConversionConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("few_spike.alpha".to_string(), "12.5".to_string());
        cli_args.insert("builder.share_weights".to_string(), "no".to_string());
        cli_args.insert("logging.debug_crates".to_string(), "ann2snn-runtime, ann2snn-conversion".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.few_spike.alpha, 12.5);
        assert!(!config.builder.share_weights);
        assert_eq!(
            config.logging.debug_crates,
            vec!["ann2snn-runtime", "ann2snn-conversion"]
        );
    }

    #[test]
    fn test_cli_rejects_unknown_key_and_bad_value() {
        let mut config = ConversionConfig::default();
        assert!(matches!(
            set_value(&mut config, "builder.colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            set_value(&mut config, "few_spike.k", "ten"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            set_value(&mut config, "calibration.strategy", "magic"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[simulation]").unwrap();
        writeln!(file, "dt = 0.5").unwrap();
        writeln!(file, "present_time = 50.0").unwrap();

        env::set_var("ANN2SNN_DT", "0.25");
        env::set_var("ANN2SNN_PRESENT_TIME", "75.0");

        let mut cli_args = HashMap::new();
        cli_args.insert("simulation.dt".to_string(), "0.1".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("ANN2SNN_DT");
        env::remove_var("ANN2SNN_PRESENT_TIME");

        // CLI wins for dt, env wins for present_time (no CLI override)
        assert_eq!(config.simulation.dt, 0.1);
        assert_eq!(config.simulation.present_time, 75.0);
    }
}
