//! Router type detection
//!
//! Probes each firmware family in [`Variant::DETECTION_ORDER`] against the
//! same host and credentials and binds the first one whose probe scan works.
//! A failed probe cannot tell an unreachable router from a firmware mismatch;
//! both move on to the next candidate.

use std::sync::Arc;

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{ConfigError, TransportError};
use crate::scanner::{RouterIdentity, Scanner, ScannerContext, Timeouts, Variant};
use crate::transport::{HttpTransport, ReqwestTransport};

pub struct RouterFactory {
    router: RouterIdentity,
    transport: Arc<dyn HttpTransport>,
    diagnostics: Arc<dyn DiagnosticSink>,
    timeouts: Timeouts,
    detected: Option<Variant>,
}

impl RouterFactory {
    pub fn new(router: RouterIdentity, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            router,
            transport,
            diagnostics: Arc::new(TracingSink),
            timeouts: Timeouts::default(),
            detected: None,
        }
    }

    /// Factory over the reqwest transport
    pub fn connect(host: &str, username: &str, password: &str) -> Result<Self, FactoryError> {
        let router = RouterIdentity::new(host, username, password)?;
        let transport = ReqwestTransport::new()?;
        Ok(Self::new(router, Arc::new(transport)))
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn router(&self) -> &RouterIdentity {
        &self.router
    }

    /// Variant bound by the last successful detection
    pub fn detected(&self) -> Option<Variant> {
        self.detected
    }

    fn context(&self) -> ScannerContext {
        ScannerContext::new(self.router.clone(), self.transport.clone())
            .with_diagnostics(self.diagnostics.clone())
            .with_timeouts(self.timeouts)
    }

    /// Probe variants in priority order and return the first that works
    pub async fn get_router(&mut self) -> Option<Box<dyn Scanner>> {
        for variant in Variant::DETECTION_ORDER {
            if let Some(scanner) = self.connect_variant(variant).await {
                return Some(scanner);
            }
        }

        tracing::warn!(
            "[Detector] No supported firmware found at {}",
            self.router.host
        );
        None
    }

    /// Bind one variant without trying the others
    pub async fn connect_variant(&mut self, variant: Variant) -> Option<Box<dyn Scanner>> {
        tracing::debug!("[Detector] Probing {} at {}", variant, self.router.host);

        let connected = variant.connect(self.context()).await;
        match connected.probe {
            Ok(devices) => {
                tracing::info!(
                    "[Detector] {} detected as {} ({} clients)",
                    self.router.host,
                    variant,
                    devices.len()
                );
                self.detected = Some(variant);
                Some(connected.scanner)
            }
            Err(e) => {
                tracing::debug!("[Detector] {} probe failed: {}", variant, e);
                let mut scanner = connected.scanner;
                scanner.logout().await;
                None
            }
        }
    }
}

/// Failure to set up a factory
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
