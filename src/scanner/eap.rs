//! EAP-class access points: cookie session with an MD5 form login
//!
//! The AP refuses requests that do not look like they come from its web UI,
//! so every request carries a browser header set. Each scan opens a fresh
//! cookie session, logs in and drops the session afterwards.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DeviceSet, Scanner, ScannerContext, Variant};
use crate::credentials::uppercase_md5;
use crate::diagnostics::Level;
use crate::error::ScanError;
use crate::transport::{HttpRequest, HttpTransport};

const CLIENT_MONITOR: &str = "/data/monitor.client.client.json";

const BROWSER_HEADERS: [(&str, &str); 9] = [
    (
        "User-Agent",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.12; rv:53.0) Gecko/20100101 Firefox/53.0",
    ),
    ("Accept", "application/json, text/javascript, */*; q=0.01"),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Accept-Encoding", "gzip, deflate"),
    (
        "Content-Type",
        "application/x-www-form-urlencoded; charset=UTF-8",
    ),
    ("X-Requested-With", "XMLHttpRequest"),
    ("Connection", "keep-alive"),
    ("Pragma", "no-cache"),
    ("Cache-Control", "no-cache"),
];

#[derive(Debug, Deserialize)]
struct ClientMonitor {
    data: Option<Vec<ApClient>>,
}

#[derive(Debug, Deserialize)]
struct ApClient {
    #[serde(rename = "MAC")]
    mac: String,
    #[serde(rename = "DeviceName")]
    device_name: Option<String>,
}

pub struct EapScanner {
    ctx: ScannerContext,
    last_results: DeviceSet,
}

impl EapScanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            last_results: DeviceSet::new(),
        }
    }

    fn browser_request(&self, request: HttpRequest) -> HttpRequest {
        request
            .headers(BROWSER_HEADERS)
            .header("Referer", format!("{}/", self.ctx.router.base_url()))
            .timeout(self.ctx.timeouts.request)
    }

    async fn fetch_with(&self, session: &dyn HttpTransport) -> Result<DeviceSet, ScanError> {
        let router = &self.ctx.router;
        let base_url = router.base_url();

        // Primes the session cookie
        session
            .execute(self.browser_request(HttpRequest::get(base_url.clone())))
            .await?;

        self.ctx
            .report(Variant::Eap, Level::Debug, "login", "Logging in to access point");
        let login = HttpRequest::post(base_url).form(vec![
            ("username".to_string(), router.username.clone()),
            ("password".to_string(), uppercase_md5(&router.password)),
        ]);
        session.execute(self.browser_request(login)).await?;

        // Millisecond timestamp defeats the AP's response cache
        let listing = HttpRequest::get(router.url(CLIENT_MONITOR))
            .query("operation", "load")
            .query("_", chrono::Utc::now().timestamp_millis().to_string());
        let response = session.execute(self.browser_request(listing)).await?;

        let monitor: ClientMonitor = response.json().map_err(|e| {
            ScanError::Decode(format!(
                "AP didn't respond with JSON, check if credentials are correct ({})",
                e
            ))
        })?;

        Ok(monitor
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|client| (client.mac, client.device_name))
            .collect())
    }

    async fn fetch(&self) -> Result<DeviceSet, ScanError> {
        let session = self.ctx.transport.session()?;
        let outcome = self.fetch_with(session.as_ref()).await;
        // Cookies are discarded with the session: next scan logs in again
        drop(session);
        outcome
    }
}

#[async_trait]
impl Scanner for EapScanner {
    fn variant(&self) -> Variant {
        Variant::Eap
    }

    async fn scan(&mut self) -> Result<DeviceSet, ScanError> {
        self.ctx.scan_started(Variant::Eap);
        let outcome = self.fetch().await;
        self.ctx
            .finish_scan(Variant::Eap, &mut self.last_results, outcome)
    }

    fn last_results(&self) -> &DeviceSet {
        &self.last_results
    }
}
