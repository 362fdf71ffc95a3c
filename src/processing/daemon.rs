// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition worker
//!
//! One dedicated thread per analyzer drives the acquisition loop: read the
//! configuration snapshot, obtain one cycle's averaged raw periodogram
//! through the strategy, calibrate it and publish. The loop runs until
//! cancelled; a fault inside one cycle is logged and the next cycle retried,
//! and only a persistent fault (or an unrecoverable source error) stops the
//! loop.
//!
//! Cancellation is cooperative through a [`CancellationToken`]: the worker
//! checks it at every iteration boundary and inside every bounded sleep, and
//! never aborts mid-publish.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;

use crate::acquisition::{AcquisitionError, SampleSource};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};

use super::controller::AnalyzerController;
use super::strategy::AcquisitionStrategy;
use super::stream::{PsdResult, SharedPsdStream};

const COMPONENT: &str = "daemon";

/// Lifecycle state of the acquisition loop.
///
/// `Stopped` is terminal: it is reached by explicit cancellation or by a
/// persistent fault, and the analyzer must be rebuilt to acquire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoopState::Running,
            2 => LoopState::Stopped,
            _ => LoopState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopState::Idle => 0,
            LoopState::Running => 1,
            LoopState::Stopped => 2,
        }
    }
}

/// Explicit cancellation token shared between the daemon handle and its
/// worker thread.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Handle owning the acquisition worker thread.
pub struct AcquisitionDaemon {
    controller: Arc<AnalyzerController>,
    stream: Arc<SharedPsdStream>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    source: Option<Box<dyn SampleSource>>,
    strategy: Option<Box<dyn AcquisitionStrategy>>,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
    max_consecutive_failures: u32,
}

impl AcquisitionDaemon {
    pub fn new(
        controller: Arc<AnalyzerController>,
        stream: Arc<SharedPsdStream>,
        source: Box<dyn SampleSource>,
        strategy: Box<dyn AcquisitionStrategy>,
        diagnostics: Arc<dyn DiagnosticsSink>,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            controller,
            stream,
            diagnostics,
            source: Some(source),
            strategy: Some(strategy),
            cancel: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(LoopState::Idle.as_u8())),
            handle: None,
            max_consecutive_failures: max_consecutive_failures.max(1),
        }
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Start the worker thread. Starting while already running is a no-op;
    /// a stopped analyzer stays stopped.
    pub fn start(&mut self) {
        match self.state() {
            LoopState::Running => {
                self.diagnostics.emit(DiagnosticEvent::info(
                    COMPONENT,
                    "acquisition already running",
                ));
                return;
            }
            LoopState::Stopped => {
                self.diagnostics.emit(DiagnosticEvent::error(
                    COMPONENT,
                    "acquisition is stopped and cannot be restarted",
                ));
                return;
            }
            LoopState::Idle => {}
        }

        let (Some(source), Some(strategy)) = (self.source.take(), self.strategy.take()) else {
            self.diagnostics.emit(DiagnosticEvent::error(
                COMPONENT,
                "acquisition resources already consumed",
            ));
            return;
        };

        self.state
            .store(LoopState::Running.as_u8(), Ordering::Release);

        let controller = Arc::clone(&self.controller);
        let stream = Arc::clone(&self.stream);
        let diagnostics = Arc::clone(&self.diagnostics);
        let cancel = self.cancel.clone();
        let state = Arc::clone(&self.state);
        let max_failures = self.max_consecutive_failures;

        self.handle = Some(thread::spawn(move || {
            run_worker(
                controller,
                stream,
                diagnostics,
                source,
                strategy,
                cancel,
                state,
                max_failures,
            );
        }));
    }

    /// Request cancellation and wait for the worker to reach `Stopped`.
    ///
    /// The worker finishes its current bounded wait before exiting, so this
    /// returns within one wait interval. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.diagnostics
                    .emit(DiagnosticEvent::error(COMPONENT, "worker thread panicked"));
            }
        }
        self.state
            .store(LoopState::Stopped.as_u8(), Ordering::Release);
    }
}

impl Drop for AcquisitionDaemon {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    controller: Arc<AnalyzerController>,
    stream: Arc<SharedPsdStream>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    mut source: Box<dyn SampleSource>,
    mut strategy: Box<dyn AcquisitionStrategy>,
    cancel: CancellationToken,
    state: Arc<AtomicU8>,
    max_failures: u32,
) {
    diagnostics.emit(DiagnosticEvent::info(COMPONENT, "acquisition started"));

    let mut consecutive_failures = 0u32;
    let mut cycle = 0u64;

    while !cancel.is_cancelled() {
        // Configuration changes take effect here, at the cycle boundary.
        let params = controller.cycle_parameters();

        match strategy.acquire(source.as_mut(), &params, &cancel) {
            Ok(raw) => {
                consecutive_failures = 0;
                cycle += 1;
                let calibrated = raw.iter().map(|&v| v * params.calibration).collect();
                stream.publish(PsdResult {
                    raw,
                    calibrated,
                    fs: params.fs,
                    cycle,
                    timestamp: Utc::now(),
                });
            }
            Err(AcquisitionError::Cancelled) => break,
            Err(err @ AcquisitionError::Stalled { .. }) => {
                consecutive_failures += 1;
                diagnostics.emit(DiagnosticEvent::error(
                    COMPONENT,
                    format!("cycle abandoned: {}", err),
                ));
                if consecutive_failures >= max_failures {
                    diagnostics.emit(DiagnosticEvent::error(
                        COMPONENT,
                        format!(
                            "persistent hardware fault after {} consecutive failures",
                            consecutive_failures
                        ),
                    ));
                    break;
                }
            }
            Err(err) => {
                diagnostics.emit(DiagnosticEvent::error(
                    COMPONENT,
                    format!("unrecoverable acquisition fault: {}", err),
                ));
                break;
            }
        }
    }

    state.store(LoopState::Stopped.as_u8(), Ordering::Release);
    diagnostics.emit(DiagnosticEvent::info(COMPONENT, "acquisition stopped"));
}
