//! Archer C7-class firmware: cookie login plus a token in the URL path
//!
//! The login page answers with a JavaScript redirect whose path carries the
//! session token; every later page lives under `/<token>/userRpm/`.
//! The token is cached until explicitly cleared. This firmware gives no
//! expiry signal, so it is never refreshed automatically.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::session::SessionState;
use super::{DeviceSet, Scanner, ScannerContext, Variant};
use crate::credentials::{encode_basic, truncated_md5, AUTH_COOKIE};
use crate::diagnostics::Level;
use crate::error::ScanError;
use crate::mac;
use crate::transport::HttpRequest;

const LOGIN_PAGE: &str = "/userRpm/LoginRpm.htm?Save=Save";

/// 2.4 GHz and 5 GHz station lists
const STATION_PAGES: [&str; 2] = ["WlanStationRpm.htm", "WlanStationRpm_5g.htm"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C7Session {
    /// Base64 of `username:md5(password)`
    pub credentials: String,
    pub token: String,
}

impl C7Session {
    fn cookie_value(&self) -> String {
        format!("Basic {}", self.credentials)
    }
}

fn redirect_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"window\.parent\.location\.href\s*=\s*"https?://[^"]*/([^/"]+)/userRpm/Index\.htm";"#)
            .expect("valid redirect pattern")
    })
}

/// Token from the login page's JavaScript redirect
pub fn token_from_login_page(body: &str) -> Option<String> {
    redirect_pattern()
        .captures(body)
        .map(|caps| caps[1].to_string())
}

pub struct ArcherC7Scanner {
    ctx: ScannerContext,
    session: SessionState<C7Session>,
    last_results: DeviceSet,
}

impl ArcherC7Scanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            session: SessionState::LoggedOut,
            last_results: DeviceSet::new(),
        }
    }

    pub fn session(&self) -> &SessionState<C7Session> {
        &self.session
    }

    async fn login(&self) -> Result<C7Session, ScanError> {
        let router = &self.ctx.router;
        self.ctx
            .report(Variant::ArcherC7, Level::Info, "login", "Retrieving auth tokens...");

        let credentials = encode_basic(&router.username, &truncated_md5(&router.password));

        let request = HttpRequest::get(router.url(LOGIN_PAGE))
            .cookie(AUTH_COOKIE, format!("Basic {}", credentials))
            .timeout(self.ctx.timeouts.request);

        let response = self.ctx.transport.execute(request).await?;

        let token = token_from_login_page(&response.body)
            .ok_or_else(|| ScanError::Login("Couldn't fetch auth tokens".to_string()))?;

        Ok(C7Session { credentials, token })
    }

    async fn ensure_session(&mut self) -> Result<C7Session, ScanError> {
        if let Some(tokens) = self.session.active() {
            return Ok(tokens.clone());
        }

        self.session.begin_login();
        match self.login().await {
            Ok(tokens) => {
                self.session.activate(tokens.clone());
                Ok(tokens)
            }
            Err(e) => {
                self.session.login_failed();
                Err(e)
            }
        }
    }

    async fn fetch(&mut self) -> Result<DeviceSet, ScanError> {
        let tokens = self.ensure_session().await?;
        let router = &self.ctx.router;

        let mut macs = Vec::new();
        for page in STATION_PAGES {
            let request = HttpRequest::get(router.url(&format!("/{}/userRpm/{}", tokens.token, page)))
                .cookie(AUTH_COOKIE, tokens.cookie_value())
                .header("Referer", router.base_url())
                .timeout(self.ctx.timeouts.request);

            let response = self.ctx.transport.execute(request).await?;
            macs.extend(mac::extract_hyphenated(&response.body));
        }

        Ok(DeviceSet::from_macs(macs))
    }
}

#[async_trait]
impl Scanner for ArcherC7Scanner {
    fn variant(&self) -> Variant {
        Variant::ArcherC7
    }

    async fn scan(&mut self) -> Result<DeviceSet, ScanError> {
        self.ctx.scan_started(Variant::ArcherC7);
        let outcome = self.fetch().await;
        self.ctx
            .finish_scan(Variant::ArcherC7, &mut self.last_results, outcome)
    }

    fn last_results(&self) -> &DeviceSet {
        &self.last_results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::scanner::RouterIdentity;
    use crate::transport::mock::MockTransport;
    use crate::transport::{HttpResponse, Method};

    const LOGIN_OK: &str = r#"<body><script language="javaScript">window.parent.location.href = "http://192.168.0.1/ABCDEFGHIJKLMNOP/userRpm/Index.htm";</script></body>"#;

    fn scanner(mock: &MockTransport) -> ArcherC7Scanner {
        let router = RouterIdentity::new("192.168.0.1", "admin", "correcthorsebatterystaple").unwrap();
        ArcherC7Scanner::new(ScannerContext::new(router, Arc::new(mock.clone())))
    }

    #[test]
    fn test_token_from_login_page() {
        assert_eq!(token_from_login_page(LOGIN_OK).as_deref(), Some("ABCDEFGHIJKLMNOP"));
        assert_eq!(
            token_from_login_page(r#"window.parent.location.href = "https://tplinkwifi.net/XYZ/userRpm/Index.htm";"#)
                .as_deref(),
            Some("XYZ")
        );
        assert_eq!(token_from_login_page("<html>wrong password</html>"), None);
    }

    #[tokio::test]
    async fn test_scan_both_bands_with_token() {
        let mock = MockTransport::new()
            .on(Method::Get, LOGIN_PAGE, HttpResponse::new(200, LOGIN_OK))
            .on(
                Method::Get,
                "/ABCDEFGHIJKLMNOP/userRpm/WlanStationRpm.htm",
                HttpResponse::new(200, r#""F0-DE-F1-11-22-33", 5, 1204, 900,"#),
            )
            .on(
                Method::Get,
                "/ABCDEFGHIJKLMNOP/userRpm/WlanStationRpm_5g.htm",
                HttpResponse::new(200, r#""3C-15-C2-AA-BB-CC", 5, 88, 12, "F0-DE-F1-11-22-33", 5, 1, 1,"#),
            );
        let mut scanner = scanner(&mock);

        let devices = scanner.scan().await.unwrap();
        assert_eq!(
            devices.macs().collect::<Vec<_>>(),
            vec!["3C:15:C2:AA:BB:CC", "F0:DE:F1:11:22:33"]
        );

        // Cookie carries md5 of the first 15 password bytes
        let expected = format!(
            "Authorization=Basic {}",
            encode_basic("admin", &truncated_md5("correcthorsebat"))
        );
        let login = mock.requests_to(LOGIN_PAGE).remove(0);
        assert_eq!(login.cookie_header(), Some(expected.clone()));
        let listing = mock.requests_to("/ABCDEFGHIJKLMNOP/userRpm/WlanStationRpm.htm").remove(0);
        assert_eq!(listing.cookie_header(), Some(expected));
        assert_eq!(listing.header_value("Referer"), Some("http://192.168.0.1"));

        tokio_test::assert_ok!(scanner.scan().await);
        assert_eq!(mock.requests_to(LOGIN_PAGE).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_redirect_is_login_failure() {
        let mock = MockTransport::new().on(
            Method::Get,
            LOGIN_PAGE,
            HttpResponse::new(200, "<html>You have exceeded ten attempts</html>"),
        );
        let mut scanner = scanner(&mock);

        assert_eq!(scanner.scan().await.unwrap_err().code(), "login");
        assert_eq!(scanner.session(), &SessionState::LoggedOut);
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_token_is_not_refreshed() {
        let mock = MockTransport::new()
            .on(Method::Get, LOGIN_PAGE, HttpResponse::new(200, LOGIN_OK))
            .on(
                Method::Get,
                "/ABCDEFGHIJKLMNOP/userRpm/WlanStationRpm.htm",
                HttpResponse::new(200, r#""F0-DE-F1-11-22-33""#),
            )
            .on(
                Method::Get,
                "/ABCDEFGHIJKLMNOP/userRpm/WlanStationRpm.htm",
                HttpResponse::new(200, "<html>session timeout</html>"),
            )
            .on(
                Method::Get,
                "/ABCDEFGHIJKLMNOP/userRpm/WlanStationRpm_5g.htm",
                HttpResponse::new(200, ""),
            );
        let mut scanner = scanner(&mock);
        tokio_test::assert_ok!(scanner.scan().await);

        assert_eq!(scanner.scan().await, Err(ScanError::EmptyResult));
        assert!(scanner.session().is_active());
        assert_eq!(mock.requests_to(LOGIN_PAGE).len(), 1);
        assert_eq!(scanner.last_results().len(), 1);
    }
}
