// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-signal-analyzer project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Structured diagnostics
//!
//! Configuration setters and the acquisition worker report faults and
//! noteworthy state changes as [`DiagnosticEvent`]s through a
//! [`DiagnosticsSink`] instead of calling a logger directly. The default
//! [`LogSink`] forwards events to the `log` facade, so a standard
//! `env_logger` setup sees the usual leveled output; tests capture events
//! with [`MemorySink`]. Diagnostics are never used for control flow.

use std::sync::{Mutex, PoisonError};

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A single diagnostic event emitted by an engine component.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    /// Component that emitted the event, e.g. `"controller"` or `"daemon"`.
    pub component: &'static str,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn info(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            component,
            message: message.into(),
        }
    }

    pub fn error(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            component,
            message: message.into(),
        }
    }
}

/// Sink for diagnostic events.
///
/// Implementations must be callable from the acquisition worker thread and
/// from arbitrary caller threads at the same time.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Default sink forwarding events to the `log` facade.
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn emit(&self, event: DiagnosticEvent) {
        match event.severity {
            Severity::Info => log::info!("{}: {}", event.component, event.message),
            Severity::Error => log::error!("{}: {}", event.component, event.message),
        }
    }
}

/// In-memory sink that records every event, for tests.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.events()
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }
}

impl DiagnosticsSink for MemorySink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
