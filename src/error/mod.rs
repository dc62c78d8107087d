//! Error handling module

use thiserror::Error;

/// Failure of a single HTTP round-trip
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::Client(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Outcome of a failed scan.
///
/// A scan error never clears the scanner's previous results; it only reports
/// why this attempt produced nothing new.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Router answered with HTTP {0}")]
    HttpStatus(u16),

    #[error("Unexpected response format: {0}")]
    Decode(String),

    #[error("No wireless clients found in response")]
    EmptyResult,

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Session expired, logging in again on next scan")]
    SessionExpired,

    #[error("Router rejected the request: {0}")]
    Rejected(String),
}

impl ScanError {
    /// Stable diagnostic code for this failure kind
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::Transport(_) => "transport",
            ScanError::HttpStatus(_) => "http_status",
            ScanError::Decode(_) => "decode",
            ScanError::EmptyResult => "empty_result",
            ScanError::Login(_) => "login",
            ScanError::SessionExpired => "session_expired",
            ScanError::Rejected(_) => "rejected",
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::Decode(format!("invalid JSON: {}", e))
    }
}

/// Invalid router identity or settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid router host: {0}")]
    InvalidHost(String),

    #[error("Unknown router variant: {0}")]
    UnknownVariant(String),
}
