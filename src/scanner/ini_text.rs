//! Archer C20-class firmware: `cgi?5` host table in INI-like text
//!
//! ```text
//! [1,1,0,0,0,0]0
//! IPAddress=192.168.0.100
//! MACAddress=C8:3A:35:01:02:03
//! hostName=kitchen-tablet
//! [error]0
//! ```
//!
//! Only sections carrying an `IPAddress` key describe a client.

use async_trait::async_trait;

use super::{DeviceSet, Scanner, ScannerContext, Variant};
use crate::credentials::{basic_cookie_value, AUTH_COOKIE};
use crate::error::ScanError;
use crate::transport::HttpRequest;

const HOST_TABLE: &str = "/cgi?5";
const HOST_TABLE_COMMAND: &str = "[LAN_HOST_ENTRY#0,0,0,0,0,0#0,0,0,0,0,0]0,0\r\n";

// ============================================================================
// INI-like text parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    entries: Vec<(String, Option<String>)>,
}

impl Section {
    /// Case-insensitive key lookup; `Some(None)` for a bare key
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Parse `[header]` sections with `key=value` / `key:value` / bare `key`
/// lines. Text after the closing bracket of a header is ignored.
pub fn parse_sections(text: &str) -> Result<Vec<Section>, String> {
    let mut sections: Vec<Section> = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            let name = match line.rfind(']') {
                Some(end) if end > 1 => line[1..end].to_string(),
                _ => return Err(format!("line {}: malformed section header {:?}", lineno + 1, line)),
            };
            if sections.iter().any(|s| s.name == name) {
                return Err(format!("line {}: duplicate section {:?}", lineno + 1, name));
            }
            sections.push(Section {
                name,
                entries: Vec::new(),
            });
            continue;
        }

        let section = sections
            .last_mut()
            .ok_or_else(|| format!("line {}: entry before first section header", lineno + 1))?;

        let (key, value) = match line.find(|c: char| c == '=' || c == ':') {
            Some(pos) => (line[..pos].trim(), Some(line[pos + 1..].trim().to_string())),
            None => (line, None),
        };
        if key.is_empty() {
            return Err(format!("line {}: entry without key", lineno + 1));
        }
        if section.contains(key) {
            return Err(format!(
                "line {}: duplicate key {:?} in section {:?}",
                lineno + 1,
                key,
                section.name
            ));
        }
        section.entries.push((key.to_string(), value));
    }

    Ok(sections)
}

/// Clients from the parsed host table
fn hosts_from_sections(sections: &[Section]) -> Result<DeviceSet, ScanError> {
    let mut devices = DeviceSet::new();

    for section in sections.iter().filter(|s| s.contains("IPAddress")) {
        let mac = section
            .get("MACAddress")
            .flatten()
            .ok_or_else(|| ScanError::Decode(format!("host entry [{}] without MACAddress", section.name)))?;
        let name = section
            .get("hostName")
            .ok_or_else(|| ScanError::Decode(format!("host entry [{}] without hostName", section.name)))?
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        devices.insert(mac, name);
    }

    Ok(devices)
}

// ============================================================================
// Scanner
// ============================================================================

pub struct IniTextScanner {
    ctx: ScannerContext,
    last_results: DeviceSet,
}

impl IniTextScanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            last_results: DeviceSet::new(),
        }
    }

    async fn fetch(&self) -> Result<DeviceSet, ScanError> {
        let router = &self.ctx.router;

        let request = HttpRequest::post(router.url(HOST_TABLE))
            .header("Referer", router.base_url())
            .cookie(AUTH_COOKIE, basic_cookie_value(&router.username, &router.password))
            .text(HOST_TABLE_COMMAND)
            .timeout(self.ctx.timeouts.request);

        let response = self.ctx.transport.execute(request).await?;

        let sections = parse_sections(&response.body).map_err(|e| {
            ScanError::Decode(format!(
                "Router didn't respond with a host table, check if credentials are correct ({})",
                e
            ))
        })?;

        hosts_from_sections(&sections)
    }
}

#[async_trait]
impl Scanner for IniTextScanner {
    fn variant(&self) -> Variant {
        Variant::IniText
    }

    async fn scan(&mut self) -> Result<DeviceSet, ScanError> {
        self.ctx.scan_started(Variant::IniText);
        let outcome = self.fetch().await;
        self.ctx
            .finish_scan(Variant::IniText, &mut self.last_results, outcome)
    }

    fn last_results(&self) -> &DeviceSet {
        &self.last_results
    }
}
