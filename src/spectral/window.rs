// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Window functions for spectral analysis
//!
//! A [`Window`] holds the coefficient sequence of one selected window at the
//! fixed transform length, together with the two correction scalars used for
//! calibration:
//!
//! - `W1` — sum of squared coefficients divided by the length (power
//!   correction; the density denominator is `fs · len · W1`)
//! - `W2` — sum of coefficients divided by the length (amplitude correction)
//!
//! Both scalars are computed from the exact coefficient sequence, never from
//! tabulated approximations, so a boxcar window yields `W1 = W2 = 1`
//! identically. Coefficients use the symmetric form with an `N - 1`
//! denominator.

use std::f64::consts::PI;

/// Flat top window coefficients (5-term cosine sum).
const FLAT_TOP: [f64; 5] = [
    0.215_578_95,
    0.416_631_58,
    0.277_263_158,
    0.083_578_947,
    0.006_947_368,
];

/// Blackman-Harris window coefficients (4-term cosine sum).
const BLACKMAN_HARRIS: [f64; 4] = [0.358_75, 0.488_29, 0.141_28, 0.011_68];

/// Available window functions.
///
/// The discriminants match the window indices exposed to callers and written
/// by the hardware control path: 0 boxcar, 1 Hann, 2 flat top,
/// 3 Blackman-Harris.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WindowKind {
    /// Rectangular window (no tapering), best resolution, worst leakage.
    Boxcar,
    /// Hann window, the default trade-off between resolution and leakage.
    Hann,
    /// Flat top window, for amplitude-accurate measurements.
    FlatTop,
    /// Blackman-Harris window, strongest leakage suppression.
    BlackmanHarris,
}

impl WindowKind {
    /// Map a caller-supplied window index to a window kind.
    ///
    /// Returns `None` for unknown indices; the caller keeps the previously
    /// selected window in that case.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(WindowKind::Boxcar),
            1 => Some(WindowKind::Hann),
            2 => Some(WindowKind::FlatTop),
            3 => Some(WindowKind::BlackmanHarris),
            _ => None,
        }
    }

    /// Index of this window kind.
    pub fn index(self) -> u32 {
        match self {
            WindowKind::Boxcar => 0,
            WindowKind::Hann => 1,
            WindowKind::FlatTop => 2,
            WindowKind::BlackmanHarris => 3,
        }
    }
}

/// One selected window: coefficients plus correction scalars.
///
/// The coefficients and the scalars are computed together at construction
/// and the structure is immutable afterwards, so a window can never be
/// observed partially updated.
#[derive(Debug, Clone)]
pub struct Window {
    kind: WindowKind,
    coefficients: Vec<f64>,
    w1: f64,
    w2: f64,
}

impl Window {
    /// Compute the window of the given kind at the given length.
    pub fn new(kind: WindowKind, len: usize) -> Self {
        debug_assert!(len >= 2, "window length must be at least 2");

        let coefficients: Vec<f64> = (0..len).map(|n| coefficient(kind, n, len)).collect();

        let sum: f64 = coefficients.iter().sum();
        let sum_sq: f64 = coefficients.iter().map(|w| w * w).sum();
        let w1 = sum_sq / len as f64;
        let w2 = sum / len as f64;

        Self {
            kind,
            coefficients,
            w1,
            w2,
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Power correction scalar, `Σw² / len`.
    pub fn w1(&self) -> f64 {
        self.w1
    }

    /// Amplitude correction scalar, `Σw / len`.
    pub fn w2(&self) -> f64 {
        self.w2
    }

    /// Fixed-point coefficient table for the hardware demodulation buffer.
    ///
    /// Encodes each coefficient as the FPGA expects it:
    /// `((32768·w + 32768) mod 65536) + 32768`, which keeps small negative
    /// coefficients (flat top) representable in the offset-binary format.
    pub fn hardware_table(&self) -> Vec<u32> {
        self.coefficients
            .iter()
            .map(|&w| {
                let fixed = (32768.0 * w) as i32;
                ((fixed + 32768).rem_euclid(65536) + 32768) as u32
            })
            .collect()
    }
}

fn coefficient(kind: WindowKind, n: usize, len: usize) -> f64 {
    let x = 2.0 * PI * n as f64 / (len - 1) as f64;
    match kind {
        WindowKind::Boxcar => 1.0,
        WindowKind::Hann => 0.5 * (1.0 - x.cos()),
        WindowKind::FlatTop => {
            FLAT_TOP[0] - FLAT_TOP[1] * x.cos() + FLAT_TOP[2] * (2.0 * x).cos()
                - FLAT_TOP[3] * (3.0 * x).cos()
                + FLAT_TOP[4] * (4.0 * x).cos()
        }
        WindowKind::BlackmanHarris => {
            BLACKMAN_HARRIS[0] - BLACKMAN_HARRIS[1] * x.cos()
                + BLACKMAN_HARRIS[2] * (2.0 * x).cos()
                - BLACKMAN_HARRIS[3] * (3.0 * x).cos()
        }
    }
}
