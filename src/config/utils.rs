// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! Schema output and the validation rules that go beyond what the JSON
//! schema can express.

use anyhow::{bail, Context, Result};

use super::Config;

/// Output the embedded JSON schema to the console.
///
/// Called when the `--show-config-schema` flag is provided on the command
/// line.
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Validate the cross-field rules the schema cannot check.
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    let analyzer = &config.analyzer;

    if !analyzer.fft_size.is_power_of_two() {
        bail!("analyzer.fft_size must be a power of two, got {}", analyzer.fft_size);
    }

    if analyzer.segments == 0 {
        bail!("analyzer.segments must be at least 1");
    }

    if analyzer.n_cycles == 0 {
        bail!("analyzer.n_cycles must be at least 1");
    }

    if analyzer.rate_min == 0 || analyzer.rate_min > analyzer.rate_max {
        bail!(
            "analyzer rate bounds are inconsistent: min {}, max {}",
            analyzer.rate_min,
            analyzer.rate_max
        );
    }

    if analyzer.default_rate < analyzer.rate_min || analyzer.default_rate > analyzer.rate_max {
        bail!(
            "analyzer.default_rate {} is outside [{}, {}]",
            analyzer.default_rate,
            analyzer.rate_min,
            analyzer.rate_max
        );
    }

    if analyzer.default_window > 3 {
        bail!("analyzer.default_window must be in 0..=3, got {}", analyzer.default_window);
    }

    if analyzer.default_channel > 2 {
        bail!("analyzer.default_channel must be in 0..=2, got {}", analyzer.default_channel);
    }

    if analyzer.default_operation > 1 {
        bail!(
            "analyzer.default_operation must be 0 or 1, got {}",
            analyzer.default_operation
        );
    }

    if analyzer.input_range_volts.iter().any(|&v| v <= 0.0) {
        bail!("analyzer.input_range_volts entries must be positive");
    }

    if config.acquisition.adc_sampling_frequency <= 0.0 {
        bail!("acquisition.adc_sampling_frequency must be positive");
    }

    if config.acquisition.tone_frequency < 0.0 {
        bail!("acquisition.tone_frequency must not be negative");
    }

    Ok(())
}
