// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition strategies
//!
//! The two analyzer variants share the whole publish/configuration contract
//! and differ only in how one cycle's raw data is obtained, so that part is
//! behind the [`AcquisitionStrategy`] trait:
//!
//! - [`BlockSegmented`] pulls one raw block per cycle and averages the
//!   periodograms of its segments in software (decimator-style front end).
//! - [`CycleAveraged`] waits for the FPGA to finish a configured number of
//!   accumulation cycles, polling the progress counter with an adaptive
//!   sleep, then reads the hardware-averaged raw periodogram.

use std::thread;
use std::time::{Duration, Instant};

use crate::acquisition::{AcquisitionError, SampleSource, STALL_MULTIPLE};
use crate::config::AcquisitionMode;
use crate::spectral::PeriodogramAccumulator;

use super::controller::CycleParameters;
use super::daemon::CancellationToken;

/// Sleep requests below this threshold are not worth a syscall; the poll
/// loop yields instead.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Upper bound on one sleep increment, so cancellation is observed promptly
/// even when the remaining-cycle estimate is long.
const MAX_SLEEP_INCREMENT: Duration = Duration::from_millis(50);

/// Sleep for `total`, in bounded increments, aborting early on cancellation.
/// Returns `false` if the token was cancelled.
pub(crate) fn sleep_cooperatively(total: Duration, cancel: &CancellationToken) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return false;
        }
        let slice = remaining.min(MAX_SLEEP_INCREMENT);
        thread::sleep(slice);
        remaining -= slice;
    }
    !cancel.is_cancelled()
}

/// How one acquisition cycle obtains its averaged raw periodogram.
pub trait AcquisitionStrategy: Send {
    /// Produce one averaged raw (uncalibrated) periodogram.
    fn acquire(
        &mut self,
        source: &mut dyn SampleSource,
        params: &CycleParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>, AcquisitionError>;
}

/// Build the strategy for the configured acquisition mode.
pub fn create_strategy(mode: AcquisitionMode, fft_size: usize) -> Box<dyn AcquisitionStrategy> {
    match mode {
        AcquisitionMode::BlockSegmented => Box::new(BlockSegmented::new(fft_size)),
        AcquisitionMode::CycleAveraged => Box::new(CycleAveraged::new()),
    }
}

/// Software-averaging strategy: one raw block per cycle, segmented and
/// accumulated here.
pub struct BlockSegmented {
    accumulator: PeriodogramAccumulator,
}

impl BlockSegmented {
    pub fn new(fft_size: usize) -> Self {
        Self {
            accumulator: PeriodogramAccumulator::new(fft_size),
        }
    }
}

impl AcquisitionStrategy for BlockSegmented {
    fn acquire(
        &mut self,
        source: &mut dyn SampleSource,
        params: &CycleParameters,
        _cancel: &CancellationToken,
    ) -> Result<Vec<f64>, AcquisitionError> {
        let block_len = params.segments * params.fft_size;
        let block = source.wait_for_block(block_len, params.fs)?;

        self.accumulator.reset();
        for segment in block.segments(params.fft_size) {
            self.accumulator.accumulate(segment, &params.window);
        }

        Ok(self.accumulator.finalize(params.segments))
    }
}

/// Hardware-averaging strategy: the FPGA accumulates `n_cycles`
/// periodograms; this side only tracks progress and reads the final
/// average.
pub struct CycleAveraged {
    /// Index of the last accumulation that was read out, derived from the
    /// monotonic cycle counter.
    last_accumulation: Option<u64>,
}

impl CycleAveraged {
    pub fn new() -> Self {
        Self {
            last_accumulation: None,
        }
    }
}

impl Default for CycleAveraged {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionStrategy for CycleAveraged {
    fn acquire(
        &mut self,
        source: &mut dyn SampleSource,
        params: &CycleParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>, AcquisitionError> {
        let n_cycles = u64::from(params.n_cycles.max(1));
        let cycle_duration = params.fft_size as f64 / params.fs;

        let mut counter = source.read_cycle_counter();
        let baseline = self.last_accumulation.unwrap_or(counter / n_cycles);

        let accumulation = Duration::from_secs_f64(n_cycles as f64 * cycle_duration);
        let stall_bound = (accumulation * STALL_MULTIPLE).max(Duration::from_millis(100));
        let started = Instant::now();

        // Wait until the hardware finishes the next full accumulation.
        while counter / n_cycles <= baseline {
            if cancel.is_cancelled() {
                return Err(AcquisitionError::Cancelled);
            }
            if started.elapsed() > stall_bound {
                return Err(AcquisitionError::Stalled {
                    requested: params.fft_size / 2,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            let remaining = n_cycles - (counter % n_cycles);
            let sleep_time = Duration::from_secs_f64(remaining as f64 * cycle_duration);
            if sleep_time > MIN_SLEEP {
                if !sleep_cooperatively(sleep_time, cancel) {
                    return Err(AcquisitionError::Cancelled);
                }
            } else {
                thread::yield_now();
            }

            counter = source.read_cycle_counter();
        }

        self.last_accumulation = Some(counter / n_cycles);

        let block = source.wait_for_block(params.fft_size / 2, params.fs)?;
        Ok(block.into_samples())
    }
}
