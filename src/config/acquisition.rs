// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sample source configuration

use serde::{Deserialize, Serialize};

/// Configuration for the sample source feeding the engine.
///
/// The simulated source synthesizes a sinusoid with additive Gaussian
/// noise; hardware sources only consume `adc_sampling_frequency` from this
/// section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Flag to enable or disable data acquisition at startup.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Use the built-in simulated source instead of hardware.
    #[serde(default = "default_simulated")]
    pub simulated: bool,

    /// Base ADC sampling frequency in Hz.
    #[serde(default = "default_adc_sampling_frequency")]
    pub adc_sampling_frequency: f64,

    /// Simulated tone frequency in Hz.
    #[serde(default = "default_tone_frequency")]
    pub tone_frequency: f64,

    /// Simulated tone amplitude in volts.
    #[serde(default = "default_tone_amplitude")]
    pub tone_amplitude: f64,

    /// Standard deviation of the simulated Gaussian noise, in volts.
    #[serde(default = "default_noise_level")]
    pub noise_level: f64,

    /// Seed for the simulated noise generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Pace simulated blocks at the effective sampling rate instead of
    /// synthesizing them instantly.
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_simulated() -> bool {
    true
}

fn default_adc_sampling_frequency() -> f64 {
    15_000_000.0
}

fn default_tone_frequency() -> f64 {
    10_000.0
}

fn default_tone_amplitude() -> f64 {
    1.0
}

fn default_noise_level() -> f64 {
    0.001
}

fn default_seed() -> u64 {
    42
}

fn default_realtime() -> bool {
    true
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            simulated: default_simulated(),
            adc_sampling_frequency: default_adc_sampling_frequency(),
            tone_frequency: default_tone_frequency(),
            tone_amplitude: default_tone_amplitude(),
            noise_level: default_noise_level(),
            seed: default_seed(),
            realtime: default_realtime(),
        }
    }
}
