// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Spectral analysis building blocks
//!
//! This module provides the numeric core of the engine:
//!
//! - Window functions with their correction scalars ([`Window`])
//! - Windowed periodogram computation and averaging
//!   ([`PeriodogramAccumulator`])
//!
//! Everything here is pure computation: no hardware access, no locking, no
//! publication side effects.

pub mod periodogram;
pub mod window;

pub use periodogram::PeriodogramAccumulator;
pub use window::{Window, WindowKind};
