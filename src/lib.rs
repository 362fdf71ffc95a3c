// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust Signal Analyzer library
//!
//! This library provides the continuous spectral-density acquisition engine
//! of an FPGA-based signal analyzer: a background worker streams samples
//! from a hardware source, windows and averages periodograms, and publishes
//! thread-safe snapshots that stay readable while the configuration is
//! changed live.

pub mod acquisition;
pub mod config;
pub mod diagnostics;
pub mod hardware;
pub mod processing;
pub mod spectral;

use serde::{Deserialize, Serialize};

/// Summary of one analysis run, as written by the command line tool.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Frequency of the strongest bin, in Hz.
    pub peak_frequency: f64,
    /// Calibrated density at the strongest bin, in W/Hz.
    pub peak_density: f64,
    /// Effective sampling frequency of the run, in Hz.
    pub sampling_frequency: f64,
    /// Number of acquisition cycles published during the run.
    pub cycles: u64,
    /// Timestamp of the summary.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
