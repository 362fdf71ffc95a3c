// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Published result cell
//!
//! [`SharedPsdStream`] holds the last completed averaged result behind a
//! mutex and hands out full-copy snapshots to any number of concurrent
//! readers. The critical section on both sides is a memory copy, never a
//! computation, so readers are only ever blocked for the duration of one
//! buffer clone.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed acquisition cycle: the averaged periodogram in raw bin
/// power and its calibrated counterpart, published together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PsdResult {
    /// Averaged raw bin power, uncalibrated.
    pub raw: Vec<f64>,
    /// The same bins converted to a physical density (W/Hz).
    pub calibrated: Vec<f64>,
    /// Effective sampling frequency of the cycle, in Hz.
    pub fs: f64,
    /// Sequential number of the acquisition cycle that produced this result.
    pub cycle: u64,
    /// Timestamp of the publication.
    pub timestamp: DateTime<Utc>,
}

impl PsdResult {
    /// All-zero result, returned to readers before the first cycle
    /// completes.
    pub fn zeroed(bins: usize, fs: f64) -> Self {
        Self {
            raw: vec![0.0; bins],
            calibrated: vec![0.0; bins],
            fs,
            cycle: 0,
            timestamp: Utc::now(),
        }
    }

    /// Frequency of bin `k`, in Hz.
    pub fn bin_frequency(&self, k: usize, fft_size: usize) -> f64 {
        k as f64 * self.fs / fft_size as f64
    }
}

/// Statistics about the published stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    /// Total number of cycles published.
    pub published_cycles: u64,
    /// Timestamp of the last publication.
    pub last_publish: Option<DateTime<Utc>>,
}

/// Mutex-guarded cell holding the latest published result.
pub struct SharedPsdStream {
    latest: Mutex<PsdResult>,
    stats: Mutex<StreamStats>,
}

impl SharedPsdStream {
    /// Create a stream seeded with an all-zero result of `bins` bins.
    pub fn new(bins: usize, fs: f64) -> Self {
        Self {
            latest: Mutex::new(PsdResult::zeroed(bins, fs)),
            stats: Mutex::new(StreamStats::default()),
        }
    }

    /// Atomically replace the published result.
    pub fn publish(&self, result: PsdResult) {
        {
            let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
            *latest = result;
        }
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.published_cycles += 1;
        stats.last_publish = Some(Utc::now());
    }

    /// Full independent copy of the latest published result.
    ///
    /// Safe to call from any number of threads while a publish is in
    /// progress; a snapshot always reflects one fully completed cycle.
    pub fn snapshot(&self) -> PsdResult {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current stream statistics.
    pub fn stats(&self) -> StreamStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_before_first_publish_is_zero() {
        let stream = SharedPsdStream::new(513, 100_000.0);
        let snapshot = stream.snapshot();
        assert_eq!(snapshot.raw.len(), 513);
        assert_eq!(snapshot.calibrated.len(), 513);
        assert!(snapshot.raw.iter().all(|&v| v == 0.0));
        assert_eq!(snapshot.cycle, 0);
    }

    #[test]
    fn test_publish_replaces_wholesale() {
        let stream = SharedPsdStream::new(4, 1000.0);
        let mut result = PsdResult::zeroed(4, 1000.0);
        result.raw = vec![1.0, 2.0, 3.0, 4.0];
        result.calibrated = vec![2.0, 4.0, 6.0, 8.0];
        result.cycle = 7;
        stream.publish(result.clone());

        let snapshot = stream.snapshot();
        assert_eq!(snapshot, result);
        assert_eq!(stream.stats().published_cycles, 1);
    }

    #[test]
    fn test_bin_frequency() {
        let result = PsdResult::zeroed(513, 102_400.0);
        assert_eq!(result.bin_frequency(100, 1024), 10_000.0);
    }
}
