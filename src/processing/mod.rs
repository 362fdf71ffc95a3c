// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition engine
//!
//! Ties the sample source, the spectral core and the publication cell
//! together: the [`AnalyzerController`] validates and applies configuration
//! changes, an [`AcquisitionStrategy`] obtains one averaged raw periodogram
//! per cycle on the worker thread, and the [`SharedPsdStream`] hands
//! snapshots to concurrent readers. [`SignalAnalyzer`] is the facade callers
//! interact with.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_signal_analyzer::acquisition::SimulatedSource;
//! use rust_signal_analyzer::config::AnalyzerConfig;
//! use rust_signal_analyzer::diagnostics::LogSink;
//! use rust_signal_analyzer::hardware::{FixedFrequencyProvider, MockRegisters};
//! use rust_signal_analyzer::processing::SignalAnalyzer;
//!
//! let config = AnalyzerConfig::default();
//! let source = Box::new(SimulatedSource::new(10_000.0, 1.0, 0.001, 42));
//! let clock = FixedFrequencyProvider::new(15_000_000.0);
//! let mut analyzer = SignalAnalyzer::new(
//!     &config,
//!     source,
//!     Arc::new(MockRegisters::new()),
//!     &clock,
//!     Arc::new(LogSink),
//! );
//!
//! analyzer.start();
//! analyzer.select_window(2); // flat top, applied at the next cycle
//! let (raw, calibrated) = analyzer.get_psd();
//! analyzer.stop();
//! # let _ = (raw, calibrated);
//! ```

pub mod controller;
pub mod daemon;
pub mod strategy;
pub mod stream;

use std::sync::Arc;

pub use controller::{
    AnalyzerController, ChannelOperation, ControlParameters, CycleParameters, InputChannel,
};
pub use daemon::{AcquisitionDaemon, CancellationToken, LoopState};
pub use strategy::{create_strategy, AcquisitionStrategy, BlockSegmented, CycleAveraged};
pub use stream::{PsdResult, SharedPsdStream, StreamStats};

use crate::acquisition::SampleSource;
use crate::config::AnalyzerConfig;
use crate::diagnostics::DiagnosticsSink;
use crate::hardware::{FrequencyProvider, HardwareRegisterInterface};

/// One analyzer instance: a controller, a publication cell and the worker
/// that connects them.
pub struct SignalAnalyzer {
    controller: Arc<AnalyzerController>,
    stream: Arc<SharedPsdStream>,
    daemon: AcquisitionDaemon,
}

impl SignalAnalyzer {
    /// Build an analyzer from its collaborators. The hardware is programmed
    /// with the configured startup state; acquisition does not run until
    /// [`start`](Self::start) is called.
    pub fn new(
        config: &AnalyzerConfig,
        source: Box<dyn SampleSource>,
        registers: Arc<dyn HardwareRegisterInterface>,
        clock: &dyn FrequencyProvider,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let controller = Arc::new(AnalyzerController::new(
            config,
            registers,
            clock,
            Arc::clone(&diagnostics),
        ));
        let initial_fs = controller.snapshot().fs;
        let stream = Arc::new(SharedPsdStream::new(controller.output_bins(), initial_fs));
        let strategy = create_strategy(config.mode, config.fft_size);
        let daemon = AcquisitionDaemon::new(
            Arc::clone(&controller),
            Arc::clone(&stream),
            source,
            strategy,
            diagnostics,
            config.max_consecutive_failures,
        );

        Self {
            controller,
            stream,
            daemon,
        }
    }

    /// Start the acquisition worker. Idempotent.
    pub fn start(&mut self) {
        self.daemon.start();
    }

    /// Stop the acquisition worker and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        self.daemon.stop();
    }

    pub fn state(&self) -> LoopState {
        self.daemon.state()
    }

    pub fn is_running(&self) -> bool {
        self.daemon.is_running()
    }

    /// Set the decimation rate; invalid values are reported through the
    /// diagnostics sink and ignored.
    pub fn set_rate(&self, rate: u32) {
        self.controller.set_rate(rate);
    }

    /// Select the analysis window by index (0: boxcar, 1: Hann, 2: flat
    /// top, 3: Blackman-Harris).
    pub fn select_window(&self, window_id: u32) {
        self.controller.select_window(window_id);
    }

    /// Select the input channel (0, 1, or 2 for the combined channel).
    pub fn select_channel(&self, channel_id: u32) {
        self.controller.select_channel(channel_id);
    }

    /// Select the combined-channel operation (0: subtract, 1: add).
    pub fn set_operation(&self, operation_id: u32) {
        self.controller.set_operation(operation_id);
    }

    /// Program the per-channel DC offset correction registers.
    pub fn set_offsets(&self, offset0: u32, offset1: u32) {
        self.controller.set_offsets(offset0, offset1);
    }

    /// Program the FFT core scale schedule.
    pub fn set_fft_scale_schedule(&self, schedule: u32) {
        self.controller.set_fft_scale_schedule(schedule);
    }

    /// Latest published result as `(raw, calibrated)` bin vectors.
    ///
    /// Always succeeds; before the first completed cycle both halves are
    /// all-zero.
    pub fn get_psd(&self) -> (Vec<f64>, Vec<f64>) {
        let result = self.stream.snapshot();
        (result.raw, result.calibrated)
    }

    /// Full snapshot of the latest published result.
    pub fn psd_snapshot(&self) -> PsdResult {
        self.stream.snapshot()
    }

    /// Publication statistics.
    pub fn stream_stats(&self) -> StreamStats {
        self.stream.stats()
    }

    /// Active configuration and derived calibration values.
    pub fn get_control_parameters(&self) -> ControlParameters {
        self.controller.snapshot()
    }

    pub fn fft_size(&self) -> usize {
        self.controller.fft_size()
    }

    /// Number of averages per published result.
    pub fn number_of_averages(&self) -> u32 {
        self.controller.number_of_averages()
    }

    pub fn window_index(&self) -> u32 {
        self.controller.window_index()
    }
}
