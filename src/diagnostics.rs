//! Diagnostic sink injected into every scanner
//!
//! Scanners report what they are doing (login, token expiry, failures) as
//! structured [`Diagnostic`] events instead of writing to a global logger.
//! [`TracingSink`] forwards events to `tracing`; [`MemorySink`] keeps them.

use std::sync::{Arc, Mutex};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Scanner variant name (see `Variant::as_str`)
    pub variant: &'static str,
    pub host: String,
    pub level: Level,
    /// Stable machine-readable code, e.g. `scan_start` or `empty_result`
    pub code: &'static str,
    pub message: String,
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: Diagnostic);
}

/// Forwards diagnostics to the `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: Diagnostic) {
        match event.level {
            Level::Debug => tracing::debug!(
                variant = event.variant,
                host = %event.host,
                code = event.code,
                "{}",
                event.message
            ),
            Level::Info => tracing::info!(
                variant = event.variant,
                host = %event.host,
                code = event.code,
                "{}",
                event.message
            ),
            Level::Warn => tracing::warn!(
                variant = event.variant,
                host = %event.host,
                code = event.code,
                "{}",
                event.message
            ),
            Level::Error => tracing::error!(
                variant = event.variant,
                host = %event.host,
                code = event.code,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.code).collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, event: Diagnostic) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
