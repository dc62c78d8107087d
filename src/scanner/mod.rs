//! Wireless client scanners, one per TP-Link firmware family
//!
//! - `legacy`: Basic-auth status page (oldest firmware)
//! - `dual_band`: N600-class `cgi` command protocol, 2.4 + 5 GHz
//! - `json_api`: Authorization cookie + JSON client grid
//! - `ini_text`: Archer C20-class `cgi` host table (INI-like text)
//! - `luci`: Archer C9-class Luci token session
//! - `archer_c7`: Archer C7-class cookie + URL token
//! - `eap`: EAP-class access point with MD5 form login
//!
//! Every variant implements [`Scanner`]; [`Variant`] is the closed set used
//! for detection.

pub mod archer_c7;
pub mod dual_band;
pub mod eap;
pub mod ini_text;
pub mod json_api;
pub mod legacy;
pub mod luci;
pub mod session;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticSink, Level, TracingSink};
use crate::error::{ConfigError, ScanError};
use crate::mac::normalize_mac;
use crate::transport::{HttpTransport, DEFAULT_TIMEOUT};

pub use archer_c7::ArcherC7Scanner;
pub use dual_band::DualBandScanner;
pub use eap::EapScanner;
pub use ini_text::IniTextScanner;
pub use json_api::JsonApiScanner;
pub use legacy::LegacyScanner;
pub use luci::LuciScanner;
pub use session::SessionState;

// ============================================================================
// Router identity
// ============================================================================

/// Host and credentials, fixed for the lifetime of a scanner
#[derive(Clone, PartialEq, Eq)]
pub struct RouterIdentity {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RouterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterIdentity")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl RouterIdentity {
    /// `host` may carry a port (`192.168.0.1:8080`) but no scheme or path
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.into().trim().to_string();

        let parsed = url::Url::parse(&format!("http://{}/", host))
            .map_err(|e| ConfigError::InvalidHost(format!("{}: {}", host, e)))?;
        if host.is_empty() || parsed.path() != "/" || parsed.query().is_some() {
            return Err(ConfigError::InvalidHost(host));
        }

        Ok(Self {
            host,
            username: username.into(),
            password: password.into(),
        })
    }

    /// `http://<host>`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }

    /// `http://<host><path>`
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.host, path)
    }
}

// ============================================================================
// Device set
// ============================================================================

/// One associated client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub mac: String,
    pub name: Option<String>,
}

/// Clients seen by one scan, keyed by canonical MAC.
///
/// Duplicate MACs collapse into one entry; a later name for the same MAC
/// replaces an earlier one. Iteration is ordered by MAC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet {
    devices: BTreeMap<String, Option<String>>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set without names (variants whose API only exposes MACs)
    pub fn from_macs<I, S>(macs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for mac in macs {
            set.insert(mac.as_ref(), None);
        }
        set
    }

    /// Insert a client; a `None` name never erases a known one
    pub fn insert(&mut self, mac: &str, name: Option<String>) {
        let mac = normalize_mac(mac);
        match name {
            Some(name) => {
                self.devices.insert(mac, Some(name));
            }
            None => {
                self.devices.entry(mac).or_insert(None);
            }
        }
    }

    pub fn contains(&self, mac: &str) -> bool {
        self.devices.contains_key(&normalize_mac(mac))
    }

    /// Display name for `mac`, if the router reported one
    pub fn name(&self, mac: &str) -> Option<&str> {
        self.devices
            .get(&normalize_mac(mac))
            .and_then(|name| name.as_deref())
    }

    pub fn macs(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn records(&self) -> Vec<DeviceRecord> {
        self.devices
            .iter()
            .map(|(mac, name)| DeviceRecord {
                mac: mac.clone(),
                name: name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl FromIterator<(String, Option<String>)> for DeviceSet {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (mac, name) in iter {
            set.insert(&mac, name);
        }
        set
    }
}

// ============================================================================
// Scanner context
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Every request unless stated otherwise
    pub request: Duration,
    /// Client listing call of the Luci token session
    pub session: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: DEFAULT_TIMEOUT,
            session: Duration::from_secs(5),
        }
    }
}

/// Collaborators shared by every scanner bound to one router
#[derive(Clone)]
pub struct ScannerContext {
    pub router: Arc<RouterIdentity>,
    pub transport: Arc<dyn HttpTransport>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
    pub timeouts: Timeouts,
}

impl ScannerContext {
    pub fn new(router: RouterIdentity, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            router: Arc::new(router),
            transport,
            diagnostics: Arc::new(TracingSink),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn report(&self, variant: Variant, level: Level, code: &'static str, message: impl Into<String>) {
        self.diagnostics.record(Diagnostic {
            variant: variant.as_str(),
            host: self.router.host.clone(),
            level,
            code,
            message: message.into(),
        });
    }

    fn scan_started(&self, variant: Variant) {
        self.report(variant, Level::Info, "scan_start", "Loading wireless clients...");
    }

    /// Commit a fetch outcome: an empty set counts as failure, and only a
    /// successful scan replaces `last_results`.
    fn finish_scan(
        &self,
        variant: Variant,
        last_results: &mut DeviceSet,
        outcome: Result<DeviceSet, ScanError>,
    ) -> Result<DeviceSet, ScanError> {
        let outcome = outcome.and_then(|devices| {
            if devices.is_empty() {
                Err(ScanError::EmptyResult)
            } else {
                Ok(devices)
            }
        });

        match outcome {
            Ok(devices) => {
                self.report(
                    variant,
                    Level::Info,
                    "scan_ok",
                    format!("Found {} wireless clients", devices.len()),
                );
                *last_results = devices.clone();
                Ok(devices)
            }
            Err(e) => {
                let level = match e {
                    ScanError::EmptyResult | ScanError::SessionExpired => Level::Info,
                    _ => Level::Error,
                };
                self.report(variant, level, e.code(), e.to_string());
                Err(e)
            }
        }
    }
}

// ============================================================================
// Scanner contract
// ============================================================================

#[async_trait]
pub trait Scanner: Send {
    fn variant(&self) -> Variant;

    /// Fetch the current client list.
    ///
    /// On failure the previous results stay available through
    /// [`Scanner::last_results`].
    async fn scan(&mut self) -> Result<DeviceSet, ScanError>;

    /// Result of the most recent successful scan
    fn last_results(&self) -> &DeviceSet;

    /// Display name from the last successful scan
    fn device_name(&self, mac: &str) -> Option<&str> {
        self.last_results().name(mac)
    }

    /// Release any server-side session. Only the Luci variant holds one.
    async fn logout(&mut self) {}
}

// ============================================================================
// Variants
// ============================================================================

/// Closed set of supported firmware families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Eap,
    ArcherC7,
    Luci,
    IniText,
    JsonApi,
    DualBand,
    Legacy,
}

impl Variant {
    /// Probe order: most specific success signal first, bare MAC regex last
    pub const DETECTION_ORDER: [Variant; 7] = [
        Variant::Eap,
        Variant::ArcherC7,
        Variant::Luci,
        Variant::IniText,
        Variant::JsonApi,
        Variant::DualBand,
        Variant::Legacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Eap => "eap",
            Variant::ArcherC7 => "archer_c7",
            Variant::Luci => "luci",
            Variant::IniText => "ini_text",
            Variant::JsonApi => "json_api",
            Variant::DualBand => "dual_band",
            Variant::Legacy => "legacy",
        }
    }

    /// Build an unprobed scanner
    pub fn build(self, ctx: ScannerContext) -> Box<dyn Scanner> {
        match self {
            Variant::Eap => Box::new(EapScanner::new(ctx)),
            Variant::ArcherC7 => Box::new(ArcherC7Scanner::new(ctx)),
            Variant::Luci => Box::new(LuciScanner::new(ctx)),
            Variant::IniText => Box::new(IniTextScanner::new(ctx)),
            Variant::JsonApi => Box::new(JsonApiScanner::new(ctx)),
            Variant::DualBand => Box::new(DualBandScanner::new(ctx)),
            Variant::Legacy => Box::new(LegacyScanner::new(ctx)),
        }
    }

    /// Build a scanner and run its construction-time probe scan
    pub async fn connect(self, ctx: ScannerContext) -> Connected {
        let mut scanner = self.build(ctx);
        let probe = scanner.scan().await;
        Connected { scanner, probe }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Variant::DETECTION_ORDER
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}

/// A scanner together with the outcome of its probe scan
pub struct Connected {
    pub scanner: Box<dyn Scanner>,
    pub probe: Result<DeviceSet, ScanError>,
}

impl Connected {
    pub fn success_init(&self) -> bool {
        self.probe.is_ok()
    }
}
