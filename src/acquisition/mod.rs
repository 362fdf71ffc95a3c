// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sample acquisition
//!
//! This module defines the [`SampleSource`] abstraction over the hardware
//! sample stream, the [`SampleBlock`] it produces, and the built-in
//! [`SimulatedSource`]. Hardware-backed sources (a DMA FIFO, an accumulator
//! register bank) live in the board support layer and implement the same
//! trait; the engine never sees anything below it.
//!
//! Sources hand out samples in volts. Whatever fixed-point format the
//! converter uses, the conversion happens inside the source so the engine
//! works in physical units throughout.

use std::time::Duration;

use thiserror::Error;

pub mod simulated;

pub use simulated::SimulatedSource;

use crate::config::Config;

/// Stall detection margin: a read may take this many times its expected
/// duration before the source reports a hardware fault.
pub const STALL_MULTIPLE: u32 = 10;

/// Errors surfaced by a sample source or the acquisition worker.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The source failed to produce the requested samples within a generous
    /// multiple of the expected duration. Transient by design: the cycle is
    /// abandoned and the next one retried.
    #[error("sample source stalled: {requested} samples not available after {waited_ms} ms")]
    Stalled { requested: usize, waited_ms: u64 },

    /// The source can no longer produce data at all. Unrecoverable; the
    /// acquisition loop stops.
    #[error("sample source closed")]
    SourceClosed,

    /// The acquisition was cancelled while waiting. Not a fault; the worker
    /// exits its loop without logging an error.
    #[error("acquisition cancelled")]
    Cancelled,
}

/// One contiguous block of samples, in volts, immutable once produced.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    samples: Vec<f64>,
    fs: f64,
}

impl SampleBlock {
    pub fn new(samples: Vec<f64>, fs: f64) -> Self {
        Self { samples, fs }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sampling frequency the block was produced at, in Hz.
    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Split the block into fixed-length segments in original order.
    ///
    /// The block length must be an exact multiple of `segment_len`; anything
    /// else is a contract violation on the caller's side, checked in debug
    /// builds and never silently truncated.
    pub fn segments(&self, segment_len: usize) -> impl Iterator<Item = &[f64]> {
        debug_assert!(
            segment_len > 0 && self.samples.len() % segment_len == 0,
            "block length {} is not a multiple of segment length {}",
            self.samples.len(),
            segment_len
        );
        self.samples.chunks_exact(segment_len)
    }
}

/// A stream of samples from hardware or simulation.
///
/// Implementations block the calling thread in `wait_for_block` until the
/// requested quantity of new data is available, using `expected_rate` to
/// bound the wait. They must neither busy-spin nor block indefinitely: a
/// stall beyond [`STALL_MULTIPLE`] times the expected duration is reported
/// as [`AcquisitionError::Stalled`].
pub trait SampleSource: Send {
    /// Block until `size` new samples are available and return them.
    fn wait_for_block(
        &mut self,
        size: usize,
        expected_rate: f64,
    ) -> Result<SampleBlock, AcquisitionError>;

    /// Monotonically non-decreasing progress counter.
    ///
    /// For cycle-based sources this counts completed hardware accumulation
    /// cycles; block-based sources count delivered blocks.
    fn read_cycle_counter(&mut self) -> u64;
}

/// Expected duration of a read of `size` samples at `rate` Hz.
pub fn expected_block_duration(size: usize, rate: f64) -> Duration {
    debug_assert!(rate > 0.0, "sampling rate must be positive");
    Duration::from_secs_f64(size as f64 / rate)
}

/// Build the sample source described by the configuration.
///
/// Only the simulated source is constructed here; hardware sources are
/// injected by the board support layer.
pub fn get_sample_source(config: &Config) -> anyhow::Result<Box<dyn SampleSource>> {
    if !config.acquisition.simulated {
        anyhow::bail!("no hardware sample source is compiled in; enable the simulated source");
    }
    log::info!(
        "Using simulated source: tone {} Hz, noise {} V rms",
        config.acquisition.tone_frequency,
        config.acquisition.noise_level
    );
    Ok(Box::new(SimulatedSource::from_config(&config.acquisition)))
}
