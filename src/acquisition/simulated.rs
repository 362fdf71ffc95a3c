// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated sample source
//!
//! Generates a constant-amplitude sinusoid with additive Gaussian noise,
//! phase-continuous across blocks. Used by the demo binary in place of
//! hardware and by the test suite to produce known spectra.
//!
//! The source is deterministic for a given seed. By default blocks are
//! synthesized instantly; with real-time pacing enabled, `wait_for_block`
//! sleeps for the duration the hardware would need to fill the request,
//! in bounded increments.

use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{expected_block_duration, AcquisitionError, SampleBlock, SampleSource, STALL_MULTIPLE};
use crate::config::AcquisitionConfig;

/// Upper bound on a single sleep increment while pacing.
const MAX_SLEEP_INCREMENT: Duration = Duration::from_millis(50);

/// Simulated sinusoid-plus-noise sample source.
pub struct SimulatedSource {
    tone_frequency: f64,
    tone_amplitude: f64,
    noise_level: f64,
    rng: StdRng,
    phase: f64,
    blocks_generated: u64,
    realtime: bool,
    stall_after: Option<u64>,
}

impl SimulatedSource {
    pub fn new(tone_frequency: f64, tone_amplitude: f64, noise_level: f64, seed: u64) -> Self {
        Self {
            tone_frequency,
            tone_amplitude,
            noise_level,
            rng: StdRng::seed_from_u64(seed),
            phase: 0.0,
            blocks_generated: 0,
            realtime: false,
            stall_after: None,
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        let mut source = Self::new(
            config.tone_frequency,
            config.tone_amplitude,
            config.noise_level,
            config.seed,
        );
        source.realtime = config.realtime;
        source
    }

    /// Pace block delivery at the requested sampling rate.
    pub fn with_realtime_pacing(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Stop producing data after the given number of blocks, to exercise the
    /// stall fault path.
    pub fn with_stall_after(mut self, blocks: u64) -> Self {
        self.stall_after = Some(blocks);
        self
    }

    /// Standard Gaussian draw via the Box-Muller transform.
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = self.rng.random::<f64>().max(1e-12);
        let u2: f64 = self.rng.random();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

impl SampleSource for SimulatedSource {
    fn wait_for_block(
        &mut self,
        size: usize,
        expected_rate: f64,
    ) -> Result<SampleBlock, AcquisitionError> {
        let expected = expected_block_duration(size, expected_rate);

        if let Some(limit) = self.stall_after {
            if self.blocks_generated >= limit {
                // Report the stall after a token wait; sleeping the full
                // detection bound would only slow the fault path down.
                thread::sleep(Duration::from_millis(1));
                return Err(AcquisitionError::Stalled {
                    requested: size,
                    waited_ms: (expected * STALL_MULTIPLE).as_millis() as u64,
                });
            }
        }

        if self.realtime {
            let mut remaining = expected;
            while !remaining.is_zero() {
                let slice = remaining.min(MAX_SLEEP_INCREMENT);
                thread::sleep(slice);
                remaining -= slice;
            }
        }

        let phase_step = 2.0 * PI * self.tone_frequency / expected_rate;
        let mut samples = Vec::with_capacity(size);
        for _ in 0..size {
            let mut value = self.tone_amplitude * self.phase.sin();
            if self.noise_level > 0.0 {
                value += self.noise_level * self.gaussian();
            }
            samples.push(value);
            self.phase = (self.phase + phase_step) % (2.0 * PI);
        }

        self.blocks_generated += 1;
        Ok(SampleBlock::new(samples, expected_rate))
    }

    fn read_cycle_counter(&mut self) -> u64 {
        self.blocks_generated
    }
}
