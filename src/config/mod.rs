// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the signal analyzer
//!
//! The configuration is backed by a YAML file and validated against a JSON
//! schema before deserialization, plus a set of cross-field rules the schema
//! cannot express. When validation fails, a sample file with the defaults is
//! written next to the rejected one so the operator has a working template
//! to edit.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_signal_analyzer::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("analyzer.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(64),       // Decimation rate
//!     Some(1),        // Window index (Hann)
//!     Some(0),        // Input channel
//!     None,           // Operation mode
//!     Some(12_500.0), // Simulated tone frequency
//! );
//! ```

pub mod acquisition;
pub mod analyzer;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use acquisition::AcquisitionConfig;
pub use analyzer::{AcquisitionMode, AnalyzerConfig};
pub use utils::output_config_schema;

/// Root configuration structure for the signal analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine sizes and startup defaults.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Sample source settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        let sample_config = Self::default();
        sample_config
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        // Load and validate with the schema
        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        // Validate before deserializing to Config
        debug!("Validating {} configuration against schema", path.display());
        if let Err(validation_error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", validation_error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                match Self::create_sample_config(path) {
                    Ok(_) => debug!("Successfully created sample config"),
                    Err(e) => error!("Failed to create sample config: {}", e),
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        // Perform additional specific validations
        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values explicitly provided on the command line override the file
    /// contents; the overridden values still go through the controller's
    /// range validation when the analyzer starts.
    pub fn apply_args(
        &mut self,
        rate: Option<u32>,
        window: Option<u32>,
        channel: Option<u32>,
        operation: Option<u32>,
        tone_frequency: Option<f64>,
    ) {
        if let Some(rate) = rate {
            debug!("Overriding decimation rate from command line: {}", rate);
            self.analyzer.default_rate = rate;
        }

        if let Some(window) = window {
            debug!("Overriding window index from command line: {}", window);
            self.analyzer.default_window = window;
        }

        if let Some(channel) = channel {
            debug!("Overriding input channel from command line: {}", channel);
            self.analyzer.default_channel = channel;
        }

        if let Some(operation) = operation {
            debug!("Overriding operation mode from command line: {}", operation);
            self.analyzer.default_operation = operation;
        }

        if let Some(freq) = tone_frequency {
            debug!("Overriding simulated tone frequency from command line: {}", freq);
            self.acquisition.tone_frequency = freq;
        }
    }
}
