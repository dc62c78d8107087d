//! Oldest TP-Link firmware: Basic-auth protected station list page

use async_trait::async_trait;

use super::{DeviceSet, Scanner, ScannerContext, Variant};
use crate::error::ScanError;
use crate::mac;
use crate::transport::HttpRequest;

const STATION_PAGE: &str = "/userRpm/WlanStationRpm.htm";

pub struct LegacyScanner {
    ctx: ScannerContext,
    last_results: DeviceSet,
}

impl LegacyScanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            last_results: DeviceSet::new(),
        }
    }

    async fn fetch(&self) -> Result<DeviceSet, ScanError> {
        let router = &self.ctx.router;

        let request = HttpRequest::get(router.url(STATION_PAGE))
            .basic_auth(&router.username, &router.password)
            .header("Referer", router.base_url())
            .timeout(self.ctx.timeouts.request);

        let page = self.ctx.transport.execute(request).await?;

        // No status check: a login page simply yields no MACs
        Ok(DeviceSet::from_macs(mac::extract_hyphenated(&page.body)))
    }
}

#[async_trait]
impl Scanner for LegacyScanner {
    fn variant(&self) -> Variant {
        Variant::Legacy
    }

    async fn scan(&mut self) -> Result<DeviceSet, ScanError> {
        self.ctx.scan_started(Variant::Legacy);
        let outcome = self.fetch().await;
        self.ctx
            .finish_scan(Variant::Legacy, &mut self.last_results, outcome)
    }

    fn last_results(&self) -> &DeviceSet {
        &self.last_results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::TransportError;
    use crate::scanner::RouterIdentity;
    use crate::transport::mock::MockTransport;
    use crate::transport::{HttpResponse, Method};

    const STATION_HTML: &str = r#"<SCRIPT language="javascript" type="text/javascript">
var hostList = new Array(
"F0-DE-F1-11-22-33", 5, 1204, 900,
"3C-15-C2-AA-BB-CC", 5, 88, 12,
0,0 );
</SCRIPT>"#;

    fn scanner(mock: &MockTransport) -> LegacyScanner {
        let router = RouterIdentity::new("192.168.0.1", "admin", "admin").unwrap();
        LegacyScanner::new(ScannerContext::new(router, Arc::new(mock.clone())))
    }

    #[tokio::test]
    async fn test_scan_parses_station_page() {
        let mock = MockTransport::new().on(Method::Get, STATION_PAGE, HttpResponse::new(200, STATION_HTML));
        let mut scanner = scanner(&mock);

        let devices = scanner.scan().await.unwrap();
        assert_eq!(
            devices.macs().collect::<Vec<_>>(),
            vec!["3C:15:C2:AA:BB:CC", "F0:DE:F1:11:22:33"]
        );
        assert_eq!(scanner.device_name("3C:15:C2:AA:BB:CC"), None);

        let sent = mock.requests_to(STATION_PAGE);
        assert_eq!(sent[0].header_value("Authorization"), Some("Basic YWRtaW46YWRtaW4="));
        assert_eq!(sent[0].header_value("Referer"), Some("http://192.168.0.1"));
    }

    #[tokio::test]
    async fn test_no_macs_is_failure() {
        let mock = MockTransport::new().on(
            Method::Get,
            STATION_PAGE,
            HttpResponse::new(401, "<html>401 Unauthorized</html>"),
        );
        let mut scanner = scanner(&mock);
        assert_eq!(scanner.scan().await, Err(ScanError::EmptyResult));
        assert!(scanner.last_results().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_results() {
        let mock = MockTransport::new().on(Method::Get, STATION_PAGE, HttpResponse::new(200, STATION_HTML));
        let mut scanner = scanner(&mock);
        tokio_test::assert_ok!(scanner.scan().await);

        mock.clear(Method::Get, STATION_PAGE);
        mock.push(
            Method::Get,
            STATION_PAGE,
            Err(TransportError::Timeout("4s".to_string())),
        );
        tokio_test::assert_err!(scanner.scan().await);
        assert_eq!(scanner.last_results().len(), 2);
    }
}
