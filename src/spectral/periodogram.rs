// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Windowed periodogram computation and averaging
//!
//! The accumulator computes one periodogram per segment and keeps a running
//! element-wise sum; dividing by the segment count yields the averaged
//! spectral estimate of one acquisition cycle. Summation is always performed
//! in `f64`, independent of the precision the samples arrived in.
//!
//! The output is one-sided: `fft_size / 2 + 1` bins, with the power of the
//! interior bins doubled to account for the negative frequencies. The result
//! is uncalibrated raw bin power; converting it to a physical density is the
//! controller's concern.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::window::Window;

/// Accumulates windowed periodograms over the segments of one cycle.
pub struct PeriodogramAccumulator {
    fft: Arc<dyn Fft<f64>>,
    fft_size: usize,
    buffer: Vec<Complex<f64>>,
    sum: Vec<f64>,
}

impl PeriodogramAccumulator {
    /// Create an accumulator for the fixed transform size.
    ///
    /// The FFT plan is created once here; the size never changes for the
    /// lifetime of the analyzer.
    pub fn new(fft_size: usize) -> Self {
        debug_assert!(fft_size >= 2 && fft_size % 2 == 0, "transform size must be even");

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            sum: vec![0.0; fft_size / 2 + 1],
        }
    }

    /// Number of output bins (one-sided spectrum).
    pub fn output_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Zero the running sum for a new averaging cycle.
    pub fn reset(&mut self) {
        self.sum.fill(0.0);
    }

    /// Compute the windowed periodogram of one segment and add it into the
    /// running sum.
    ///
    /// The segment and the window must both have the transform length; a
    /// mismatch is a programming error, not a runtime condition.
    pub fn accumulate(&mut self, segment: &[f64], window: &Window) {
        debug_assert_eq!(segment.len(), self.fft_size, "segment length mismatch");
        debug_assert_eq!(window.len(), self.fft_size, "window length mismatch");

        let coefficients = window.coefficients();
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = Complex::new(segment[i] * coefficients[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let half = self.fft_size / 2;
        for (k, slot) in self.sum.iter_mut().enumerate() {
            let power = self.buffer[k].norm_sqr();
            // Fold negative frequencies into the interior bins.
            *slot += if k == 0 || k == half { power } else { 2.0 * power };
        }
    }

    /// Divide the running sum by `count` and return the averaged estimate.
    pub fn finalize(&self, count: usize) -> Vec<f64> {
        debug_assert!(count > 0, "averaging count must be positive");
        let scale = 1.0 / count as f64;
        self.sum.iter().map(|s| s * scale).collect()
    }
}
