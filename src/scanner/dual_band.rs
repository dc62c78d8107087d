//! N600-class firmware: proprietary `cgi` command protocol
//!
//! The association table has to be refreshed (`cgi?7`) before it is read
//! (`cgi?6`), once per band. Authentication is a Basic-auth value carried in
//! the `Authorization` cookie.

use async_trait::async_trait;

use super::{DeviceSet, Scanner, ScannerContext, Variant};
use crate::credentials::{basic_cookie_value, AUTH_COOKIE};
use crate::diagnostics::Level;
use crate::error::ScanError;
use crate::mac;
use crate::transport::{HttpRequest, HttpResponse};

const REFRESH_TARGET: &str = "/cgi?7";
const READ_TARGET: &str = "/cgi?6";

/// `1` = 2.4 GHz, `2` = 5 GHz
const BANDS: [&str; 2] = ["1", "2"];

fn refresh_command(band: &str) -> String {
    format!("[ACT_WLAN_UPDATE_ASSOC#1,{},0,0,0,0#0,0,0,0,0,0]0,0\r\n", band)
}

fn read_command(band: &str) -> String {
    format!(
        "[LAN_WLAN_ASSOC_DEV#0,0,0,0,0,0#1,{},0,0,0,0]0,1\r\nAssociatedDeviceMACAddress\r\n",
        band
    )
}

pub struct DualBandScanner {
    ctx: ScannerContext,
    last_results: DeviceSet,
}

impl DualBandScanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            last_results: DeviceSet::new(),
        }
    }

    async fn command(&self, target: &str, body: String) -> Result<HttpResponse, ScanError> {
        let router = &self.ctx.router;

        let request = HttpRequest::post(router.url(target))
            .header("Referer", router.base_url())
            .cookie(AUTH_COOKIE, basic_cookie_value(&router.username, &router.password))
            .text(body)
            .timeout(self.ctx.timeouts.request);

        let page = self.ctx.transport.execute(request).await?;
        if page.status != 200 {
            self.ctx.report(
                Variant::DualBand,
                Level::Error,
                "http_status",
                format!("Error {} from router", page.status),
            );
            return Err(ScanError::HttpStatus(page.status));
        }
        Ok(page)
    }

    async fn fetch(&self) -> Result<DeviceSet, ScanError> {
        let mut macs = Vec::new();

        for band in BANDS {
            self.command(REFRESH_TARGET, refresh_command(band)).await?;
            let page = self.command(READ_TARGET, read_command(band)).await?;
            macs.extend(mac::extract_colon(&page.body));
        }

        Ok(DeviceSet::from_macs(macs))
    }
}

#[async_trait]
impl Scanner for DualBandScanner {
    fn variant(&self) -> Variant {
        Variant::DualBand
    }

    async fn scan(&mut self) -> Result<DeviceSet, ScanError> {
        self.ctx.scan_started(Variant::DualBand);
        let outcome = self.fetch().await;
        self.ctx
            .finish_scan(Variant::DualBand, &mut self.last_results, outcome)
    }

    fn last_results(&self) -> &DeviceSet {
        &self.last_results
    }
}
