// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration controller
//!
//! [`AnalyzerController`] owns the mutable configuration shared between the
//! caller-facing setters and the acquisition worker. Every setter validates
//! its argument against the legal range; a violation is reported through the
//! diagnostics sink and leaves the previous configuration untouched, so a
//! bad parameter can never tear down the acquisition loop.
//!
//! A successful change recomputes everything derived from it inside one lock
//! acquisition: effective sampling frequency, window correction scalars, the
//! hardware-side coefficient table and the calibration vector are always
//! mutually consistent. The worker reads one [`CycleParameters`] snapshot
//! per cycle, so changes take effect at the next cycle boundary.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::config::{AcquisitionMode, AnalyzerConfig};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::hardware::{fields, FrequencyProvider, HardwareRegisterInterface};
use crate::spectral::{Window, WindowKind};

const COMPONENT: &str = "controller";

/// Input channel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputChannel {
    A,
    B,
    /// Difference or sum of both channels, depending on the operation mode.
    Combined,
}

impl InputChannel {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(InputChannel::A),
            1 => Some(InputChannel::B),
            2 => Some(InputChannel::Combined),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            InputChannel::A => 0,
            InputChannel::B => 1,
            InputChannel::Combined => 2,
        }
    }

    /// Which calibration scalar applies to this channel. The combined
    /// channel uses channel A's scalar.
    fn calibration_index(self) -> usize {
        match self {
            InputChannel::A | InputChannel::Combined => 0,
            InputChannel::B => 1,
        }
    }
}

/// Operation applied when the combined channel is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelOperation {
    Subtract,
    Add,
}

impl ChannelOperation {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(ChannelOperation::Subtract),
            1 => Some(ChannelOperation::Add),
            _ => None,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            ChannelOperation::Subtract => 0,
            ChannelOperation::Add => 1,
        }
    }
}

/// Read-only view of the active configuration and its derived quantities.
#[derive(Debug, Clone, Serialize)]
pub struct ControlParameters {
    /// Effective sampling frequency in Hz.
    pub fs: f64,
    /// Active decimation rate.
    pub rate: u32,
    /// Index of the active window.
    pub window_index: u32,
    pub channel: InputChannel,
    pub operation: ChannelOperation,
    /// Window power correction scalar.
    pub w1: f64,
    /// Window amplitude correction scalar.
    pub w2: f64,
    /// Per-channel conversion from raw bin power to W/Hz.
    pub calibration: [f64; 2],
}

/// Per-cycle snapshot handed to the acquisition worker.
///
/// The window coefficients are shared through an `Arc`, so taking the
/// snapshot is a bounded copy regardless of the transform size.
#[derive(Clone)]
pub struct CycleParameters {
    pub fs: f64,
    pub window: Arc<Window>,
    /// Calibration scalar for the active channel.
    pub calibration: f64,
    pub fft_size: usize,
    pub segments: usize,
    pub n_cycles: u32,
}

struct ControlState {
    rate: u32,
    fs: f64,
    window: Arc<Window>,
    channel: InputChannel,
    operation: ChannelOperation,
    calibration: [f64; 2],
}

/// Validates and applies reconfiguration requests.
pub struct AnalyzerController {
    state: Mutex<ControlState>,
    registers: Arc<dyn HardwareRegisterInterface>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    fs_adc: f64,
    mode: AcquisitionMode,
    fft_size: usize,
    segments: usize,
    n_cycles: u32,
    rate_min: u32,
    rate_max: u32,
    input_range_volts: [f64; 2],
}

impl AnalyzerController {
    /// Build the controller and program the hardware with the configured
    /// startup state: DC offsets, channel selection, operation mode, FFT
    /// scale schedule, window table and decimation rate.
    pub fn new(
        config: &AnalyzerConfig,
        registers: Arc<dyn HardwareRegisterInterface>,
        clock: &dyn FrequencyProvider,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let fs_adc = clock.adc_sampling_frequency();

        let kind = WindowKind::from_index(config.default_window).unwrap_or(WindowKind::Hann);
        let window = Arc::new(Window::new(kind, config.fft_size));
        let channel = InputChannel::from_index(config.default_channel).unwrap_or(InputChannel::A);
        let operation = ChannelOperation::from_index(config.default_operation)
            .unwrap_or(ChannelOperation::Subtract);

        let controller = Self {
            state: Mutex::new(ControlState {
                rate: config.default_rate,
                fs: fs_adc,
                window,
                channel,
                operation,
                calibration: [0.0; 2],
            }),
            registers,
            diagnostics,
            fs_adc,
            mode: config.mode,
            fft_size: config.fft_size,
            segments: config.segments,
            n_cycles: config.n_cycles,
            rate_min: config.rate_min,
            rate_max: config.rate_max,
            input_range_volts: config.input_range_volts,
        };

        controller.set_offsets(0, 0);
        controller.set_fft_scale_schedule(0);

        {
            let mut state = controller.lock_state();
            controller.registers.write_field(fields::CIC_RATE, state.rate);
            controller.apply_channel_bits(state.channel);
            controller.apply_operation_bit(state.operation);
            controller
                .registers
                .write_array(fields::WINDOW_COEFFICIENTS, &state.window.hardware_table());
            controller.recompute_derived(&mut state);
        }

        controller.diagnostics.emit(DiagnosticEvent::info(
            COMPONENT,
            format!(
                "configured: fft_size={}, mode={:?}, window={:?}",
                config.fft_size, config.mode, kind
            ),
        ));

        controller
    }

    /// Set the CIC decimation rate.
    ///
    /// Out-of-range values are reported and ignored; the active rate and the
    /// sampling frequency derived from it stay unchanged.
    pub fn set_rate(&self, rate: u32) {
        if rate < self.rate_min || rate > self.rate_max {
            self.diagnostics.emit(DiagnosticEvent::error(
                COMPONENT,
                format!(
                    "decimation rate {} out of range [{}, {}]",
                    rate, self.rate_min, self.rate_max
                ),
            ));
            return;
        }

        let mut state = self.lock_state();
        state.rate = rate;
        self.registers.write_field(fields::CIC_RATE, rate);
        self.recompute_derived(&mut state);

        self.diagnostics.emit(DiagnosticEvent::info(
            COMPONENT,
            format!("sampling frequency = {} Hz", state.fs),
        ));
    }

    /// Select the analysis window by index.
    ///
    /// An unknown index leaves the previous window, its correction scalars
    /// and the hardware coefficient table all untouched.
    pub fn select_window(&self, window_id: u32) {
        let Some(kind) = WindowKind::from_index(window_id) else {
            self.diagnostics.emit(DiagnosticEvent::error(
                COMPONENT,
                format!("invalid window index {}", window_id),
            ));
            return;
        };

        let window = Arc::new(Window::new(kind, self.fft_size));

        let mut state = self.lock_state();
        self.registers
            .write_array(fields::WINDOW_COEFFICIENTS, &window.hardware_table());
        state.window = window;
        self.recompute_derived(&mut state);

        self.diagnostics.emit(DiagnosticEvent::info(
            COMPONENT,
            format!("selected window {:?}", kind),
        ));
    }

    /// Select the input channel.
    pub fn select_channel(&self, channel_id: u32) {
        let Some(channel) = InputChannel::from_index(channel_id) else {
            self.diagnostics.emit(DiagnosticEvent::error(
                COMPONENT,
                format!("invalid input channel {}", channel_id),
            ));
            return;
        };

        let mut state = self.lock_state();
        self.apply_channel_bits(channel);
        state.channel = channel;

        self.diagnostics.emit(DiagnosticEvent::info(
            COMPONENT,
            format!("selected channel {:?}", channel),
        ));
    }

    /// Select the operation applied to the combined channel.
    pub fn set_operation(&self, operation_id: u32) {
        let Some(operation) = ChannelOperation::from_index(operation_id) else {
            self.diagnostics.emit(DiagnosticEvent::error(
                COMPONENT,
                format!("invalid operation mode {}", operation_id),
            ));
            return;
        };

        let mut state = self.lock_state();
        self.apply_operation_bit(operation);
        state.operation = operation;

        self.diagnostics.emit(DiagnosticEvent::info(
            COMPONENT,
            format!("selected operation {:?}", operation),
        ));
    }

    /// Program the per-channel DC offset correction registers.
    pub fn set_offsets(&self, offset0: u32, offset1: u32) {
        self.registers.write_field(fields::CHANNEL_OFFSET0, offset0);
        self.registers.write_field(fields::CHANNEL_OFFSET1, offset1);
    }

    /// Program the FFT core scale schedule. The LSB is forced to 1 for the
    /// forward transform.
    pub fn set_fft_scale_schedule(&self, schedule: u32) {
        self.registers
            .write_field(fields::CTL_FFT, 1 + (schedule << 1));
    }

    /// Read-only snapshot of the active configuration.
    pub fn snapshot(&self) -> ControlParameters {
        let state = self.lock_state();
        ControlParameters {
            fs: state.fs,
            rate: state.rate,
            window_index: state.window.kind().index(),
            channel: state.channel,
            operation: state.operation,
            w1: state.window.w1(),
            w2: state.window.w2(),
            calibration: state.calibration,
        }
    }

    /// Snapshot consumed by the acquisition worker, once per cycle.
    pub fn cycle_parameters(&self) -> CycleParameters {
        let state = self.lock_state();
        CycleParameters {
            fs: state.fs,
            window: Arc::clone(&state.window),
            calibration: state.calibration[state.channel.calibration_index()],
            fft_size: self.fft_size,
            segments: self.segments,
            n_cycles: self.n_cycles,
        }
    }

    /// Number of bins the active strategy publishes per cycle.
    pub fn output_bins(&self) -> usize {
        match self.mode {
            AcquisitionMode::BlockSegmented => self.fft_size / 2 + 1,
            AcquisitionMode::CycleAveraged => self.fft_size / 2,
        }
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of averages per published result.
    pub fn number_of_averages(&self) -> u32 {
        match self.mode {
            AcquisitionMode::BlockSegmented => self.segments as u32,
            AcquisitionMode::CycleAveraged => self.n_cycles,
        }
    }

    pub fn window_index(&self) -> u32 {
        self.lock_state().window.kind().index()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute every quantity derived from the current rate and window.
    /// Must be called with the state lock held, so the derived values can
    /// never be observed out of step with their inputs.
    fn recompute_derived(&self, state: &mut ControlState) {
        state.fs = match self.mode {
            AcquisitionMode::BlockSegmented => {
                // Factor of 2 because of the FIR stage behind the CIC.
                self.fs_adc / (2.0 * state.rate as f64)
            }
            AcquisitionMode::CycleAveraged => self.fs_adc,
        };

        let w1 = state.window.w1();
        state.calibration = match self.mode {
            AcquisitionMode::BlockSegmented => {
                let density = 1.0 / (state.fs * self.fft_size as f64 * w1);
                [density, density]
            }
            AcquisitionMode::CycleAveraged => {
                let scale = |vin: f64| {
                    let lsb = vin / f64::from(1u32 << 22);
                    lsb * lsb / f64::from(self.n_cycles) / self.fs_adc / w1
                };
                [
                    scale(self.input_range_volts[0]),
                    scale(self.input_range_volts[1]),
                ]
            }
        };
    }

    fn apply_channel_bits(&self, channel: InputChannel) {
        match channel {
            InputChannel::A => {
                self.registers.clear_bit(fields::CHANNEL_SELECT, 0);
                self.registers.set_bit(fields::CHANNEL_SELECT, 1);
            }
            InputChannel::B => {
                self.registers.set_bit(fields::CHANNEL_SELECT, 0);
                self.registers.clear_bit(fields::CHANNEL_SELECT, 1);
            }
            InputChannel::Combined => {
                self.registers.set_bit(fields::CHANNEL_SELECT, 0);
                self.registers.set_bit(fields::CHANNEL_SELECT, 1);
            }
        }
    }

    fn apply_operation_bit(&self, operation: ChannelOperation) {
        match operation {
            ChannelOperation::Subtract => self.registers.clear_bit(fields::CHANNEL_SELECT, 2),
            ChannelOperation::Add => self.registers.set_bit(fields::CHANNEL_SELECT, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemorySink, Severity};
    use crate::hardware::{FixedFrequencyProvider, MockHardwareRegisterInterface, MockRegisters};

    fn test_config() -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: 256,
            ..AnalyzerConfig::default()
        }
    }

    fn make_controller(
        config: &AnalyzerConfig,
    ) -> (AnalyzerController, Arc<MockRegisters>, Arc<MemorySink>) {
        let registers = Arc::new(MockRegisters::new());
        let sink = Arc::new(MemorySink::new());
        let clock = FixedFrequencyProvider::new(15_000_000.0);
        let controller = AnalyzerController::new(
            config,
            Arc::clone(&registers) as Arc<dyn HardwareRegisterInterface>,
            &clock,
            Arc::clone(&sink) as Arc<dyn DiagnosticsSink>,
        );
        (controller, registers, sink)
    }

    #[test]
    fn test_startup_programs_hardware() {
        let config = test_config();
        let (controller, registers, _) = make_controller(&config);

        assert_eq!(registers.field(fields::CIC_RATE), config.default_rate);
        // Channel A: bit 0 clear, bit 1 set, subtract: bit 2 clear.
        assert_eq!(registers.field(fields::CHANNEL_SELECT), 0b010);
        // Forward FFT bit forced.
        assert_eq!(registers.field(fields::CTL_FFT), 1);
        assert_eq!(
            registers.array(fields::WINDOW_COEFFICIENTS).len(),
            config.fft_size
        );

        let params = controller.snapshot();
        assert_eq!(params.rate, config.default_rate);
        assert_eq!(params.fs, 15_000_000.0 / (2.0 * config.default_rate as f64));
    }

    #[test]
    fn test_set_rate_updates_fs_and_register() {
        let (controller, registers, _) = make_controller(&test_config());

        controller.set_rate(64);

        assert_eq!(registers.field(fields::CIC_RATE), 64);
        let params = controller.snapshot();
        assert_eq!(params.rate, 64);
        assert_eq!(params.fs, 15_000_000.0 / 128.0);
    }

    #[test]
    fn test_out_of_range_rate_is_rejected() {
        let config = test_config();
        let (controller, registers, sink) = make_controller(&config);
        let before = controller.snapshot();
        let errors_before = sink.count(Severity::Error);

        controller.set_rate(config.rate_max + 1);

        let after = controller.snapshot();
        assert_eq!(after.rate, before.rate);
        assert_eq!(after.fs, before.fs);
        assert_eq!(registers.field(fields::CIC_RATE), before.rate);
        assert_eq!(sink.count(Severity::Error), errors_before + 1);
    }

    #[test]
    fn test_invalid_window_keeps_previous_state() {
        let (controller, registers, sink) = make_controller(&test_config());
        let table_before = registers.array(fields::WINDOW_COEFFICIENTS);
        let before = controller.snapshot();

        controller.select_window(9);

        let after = controller.snapshot();
        assert_eq!(after.window_index, before.window_index);
        assert_eq!(after.w1, before.w1);
        assert_eq!(after.w2, before.w2);
        assert_eq!(registers.array(fields::WINDOW_COEFFICIENTS), table_before);
        assert_eq!(sink.count(Severity::Error), 1);
    }

    #[test]
    fn test_window_change_updates_table_and_calibration() {
        let config = test_config();
        let (controller, registers, _) = make_controller(&config);
        let before = controller.snapshot();

        controller.select_window(0); // boxcar

        let after = controller.snapshot();
        assert_eq!(after.window_index, 0);
        assert_eq!(after.w1, 1.0);
        assert_eq!(after.w2, 1.0);
        assert_ne!(after.calibration[0], before.calibration[0]);
        // Boxcar encodes every coefficient to the same fixed-point value.
        let table = registers.array(fields::WINDOW_COEFFICIENTS);
        assert!(table.iter().all(|&v| v == 32768));
    }

    #[test]
    fn test_channel_select_bit_patterns() {
        let (controller, registers, _) = make_controller(&test_config());

        controller.select_channel(1);
        assert_eq!(registers.field(fields::CHANNEL_SELECT) & 0b11, 0b01);

        controller.select_channel(2);
        assert_eq!(registers.field(fields::CHANNEL_SELECT) & 0b11, 0b11);

        controller.set_operation(1);
        assert_eq!(registers.field(fields::CHANNEL_SELECT) & 0b100, 0b100);

        controller.select_channel(7);
        // Unknown channel: bits unchanged.
        assert_eq!(registers.field(fields::CHANNEL_SELECT), 0b111);
    }

    #[test]
    fn test_register_writes_through_mockall_interface() {
        let mut mock = MockHardwareRegisterInterface::new();
        mock.expect_write_field().return_const(());
        mock.expect_set_bit().return_const(());
        mock.expect_clear_bit().return_const(());
        mock.expect_write_array().return_const(());

        let config = test_config();
        let clock = FixedFrequencyProvider::new(15_000_000.0);
        let controller = AnalyzerController::new(
            &config,
            Arc::new(mock),
            &clock,
            Arc::new(MemorySink::new()),
        );

        // The derived state is usable even with a write-only register bank.
        let params = controller.snapshot();
        assert!(params.fs > 0.0);
        assert!(params.calibration[0] > 0.0);
    }
}
