// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Hardware abstraction seams
//!
//! The engine never addresses hardware directly. It talks to named register
//! fields through [`HardwareRegisterInterface`] and obtains the base ADC
//! clock from a [`FrequencyProvider`]; the mapping from field names to
//! physical addresses belongs to the board support layer that implements
//! these traits. [`MockRegisters`] provides an in-memory register bank for
//! tests and for running the engine against the simulated sample source.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Register field names used by the engine.
///
/// The implementation maps these onto whatever control/status layout the
/// FPGA bitstream exposes.
pub mod fields {
    /// CIC decimation rate register.
    pub const CIC_RATE: &str = "cic_rate";
    /// Channel multiplexer and operation select bits.
    pub const CHANNEL_SELECT: &str = "channel_select";
    /// FFT core control word (scale schedule + forward bit).
    pub const CTL_FFT: &str = "ctl_fft";
    /// DC offset correction, channel 0.
    pub const CHANNEL_OFFSET0: &str = "channel_offset0";
    /// DC offset correction, channel 1.
    pub const CHANNEL_OFFSET1: &str = "channel_offset1";
    /// Window coefficient table fed to the demodulation buffer.
    pub const WINDOW_COEFFICIENTS: &str = "window_coefficients";
    /// Hardware accumulation progress counter.
    pub const CYCLE_INDEX: &str = "cycle_index";
}

/// Access to named hardware register fields.
///
/// All operations are single memory-mapped accesses on real hardware, so
/// they are safe to perform while holding the controller lock.
#[cfg_attr(test, mockall::automock)]
pub trait HardwareRegisterInterface: Send + Sync {
    fn write_field(&self, name: &'static str, value: u32);
    fn read_field(&self, name: &'static str) -> u32;
    fn set_bit(&self, name: &'static str, index: u32);
    fn clear_bit(&self, name: &'static str, index: u32);
    /// Write an array-valued register, such as the window coefficient table.
    fn write_array(&self, name: &'static str, values: &[u32]);
}

/// Source of the base ADC sampling frequency in Hz.
pub trait FrequencyProvider: Send + Sync {
    fn adc_sampling_frequency(&self) -> f64;
}

/// Frequency provider returning a fixed clock, typically read from the
/// configuration or from a clock generator driver at startup.
pub struct FixedFrequencyProvider {
    fs_adc: f64,
}

impl FixedFrequencyProvider {
    pub fn new(fs_adc: f64) -> Self {
        Self { fs_adc }
    }
}

impl FrequencyProvider for FixedFrequencyProvider {
    fn adc_sampling_frequency(&self) -> f64 {
        self.fs_adc
    }
}

/// In-memory register bank.
///
/// Stores scalar fields and array registers in hash maps so tests can
/// inspect exactly what the engine wrote.
#[derive(Default)]
pub struct MockRegisters {
    scalars: Mutex<HashMap<&'static str, u32>>,
    arrays: Mutex<HashMap<&'static str, Vec<u32>>>,
}

impl MockRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a scalar field (0 if never written).
    pub fn field(&self, name: &'static str) -> u32 {
        *self
            .scalars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .unwrap_or(&0)
    }

    /// Write a scalar field from the outside, e.g. to script a cycle counter.
    pub fn set_field(&self, name: &'static str, value: u32) {
        self.scalars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, value);
    }

    /// Copy of an array register (empty if never written).
    pub fn array(&self, name: &'static str) -> Vec<u32> {
        self.arrays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

impl HardwareRegisterInterface for MockRegisters {
    fn write_field(&self, name: &'static str, value: u32) {
        self.set_field(name, value);
    }

    fn read_field(&self, name: &'static str) -> u32 {
        self.field(name)
    }

    fn set_bit(&self, name: &'static str, index: u32) {
        let mut scalars = self.scalars.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = scalars.entry(name).or_insert(0);
        *entry |= 1 << index;
    }

    fn clear_bit(&self, name: &'static str, index: u32) {
        let mut scalars = self.scalars.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = scalars.entry(name).or_insert(0);
        *entry &= !(1 << index);
    }

    fn write_array(&self, name: &'static str, values: &[u32]) {
        self.arrays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, values.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_registers_bit_operations() {
        let regs = MockRegisters::new();
        regs.set_bit(fields::CHANNEL_SELECT, 0);
        regs.set_bit(fields::CHANNEL_SELECT, 2);
        assert_eq!(regs.field(fields::CHANNEL_SELECT), 0b101);

        regs.clear_bit(fields::CHANNEL_SELECT, 0);
        assert_eq!(regs.field(fields::CHANNEL_SELECT), 0b100);
    }

    #[test]
    fn test_mock_registers_array_roundtrip() {
        let regs = MockRegisters::new();
        assert!(regs.array(fields::WINDOW_COEFFICIENTS).is_empty());

        regs.write_array(fields::WINDOW_COEFFICIENTS, &[1, 2, 3]);
        assert_eq!(regs.array(fields::WINDOW_COEFFICIENTS), vec![1, 2, 3]);
    }
}
