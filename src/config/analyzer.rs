// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Analyzer engine configuration
//!
//! Sizes and startup defaults for the acquisition engine. The transform
//! size, segment count and cycle count are chosen once here and stay
//! immutable for the lifetime of the analyzer; only the runtime settings
//! (rate, window, channel, operation) can be changed afterwards, through the
//! validated controller setters.

use serde::{Deserialize, Serialize};

/// Which acquisition strategy the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// Read raw sample blocks and average periodograms in software.
    BlockSegmented,
    /// Read periodogram averages accumulated by the FPGA over `n_cycles`.
    CycleAveraged,
}

/// Configuration for the spectral analyzer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Transform size in samples. Must be a power of two.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,

    /// Number of segments averaged per acquisition cycle (block-segmented
    /// mode).
    #[serde(default = "default_segments")]
    pub segments: usize,

    /// Number of hardware accumulation cycles per average (cycle-averaged
    /// mode).
    #[serde(default = "default_n_cycles")]
    pub n_cycles: u32,

    /// Acquisition strategy variant.
    #[serde(default = "default_mode")]
    pub mode: AcquisitionMode,

    /// Smallest accepted decimation rate.
    #[serde(default = "default_rate_min")]
    pub rate_min: u32,

    /// Largest accepted decimation rate.
    #[serde(default = "default_rate_max")]
    pub rate_max: u32,

    /// Decimation rate applied at startup.
    #[serde(default = "default_rate")]
    pub default_rate: u32,

    /// Window index applied at startup (0: boxcar, 1: Hann, 2: flat top,
    /// 3: Blackman-Harris).
    #[serde(default = "default_window")]
    pub default_window: u32,

    /// Input channel selected at startup (0, 1, or 2 for the combined
    /// channel).
    #[serde(default)]
    pub default_channel: u32,

    /// Channel operation selected at startup (0: subtract, 1: add).
    #[serde(default)]
    pub default_operation: u32,

    /// Full-scale input range per channel, in volts. This is the external
    /// calibration input feeding the conversion to physical units.
    #[serde(default = "default_input_range")]
    pub input_range_volts: [f64; 2],

    /// Consecutive acquisition faults tolerated before the engine stops.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

fn default_fft_size() -> usize {
    2048
}

fn default_segments() -> usize {
    8
}

fn default_n_cycles() -> u32 {
    128
}

fn default_mode() -> AcquisitionMode {
    AcquisitionMode::BlockSegmented
}

fn default_rate_min() -> u32 {
    4
}

fn default_rate_max() -> u32 {
    8192
}

fn default_rate() -> u32 {
    32
}

fn default_window() -> u32 {
    1 // Hann
}

fn default_input_range() -> [f64; 2] {
    [2.048, 2.048]
}

fn default_max_failures() -> u32 {
    5
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            segments: default_segments(),
            n_cycles: default_n_cycles(),
            mode: default_mode(),
            rate_min: default_rate_min(),
            rate_max: default_rate_max(),
            default_rate: default_rate(),
            default_window: default_window(),
            default_channel: 0,
            default_operation: 0,
            input_range_volts: default_input_range(),
            max_consecutive_failures: default_max_failures(),
        }
    }
}
