//! Archer C9-class firmware: Luci token session
//!
//! Login returns a `stok` token in the JSON body and a `sysauth` cookie.
//! Both are kept across scans; a `timeout` error code from the statistics
//! endpoint drops them so the next scan logs in again.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use super::session::SessionState;
use super::{DeviceSet, Scanner, ScannerContext, Variant};
use crate::diagnostics::Level;
use crate::error::ScanError;
use crate::transport::{HttpRequest, HttpResponse};

/// Tokens proving an authenticated Luci session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuciSession {
    pub stok: String,
    pub sysauth: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    stok: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatisticsResponse {
    #[serde(default)]
    success: bool,
    errorcode: Option<String>,
    data: Option<Vec<StationEntry>>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    mac: String,
}

fn sysauth_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"sysauth=([^;,\s]*)").expect("valid sysauth pattern"))
}

/// `sysauth` value from the login response's `Set-Cookie` headers
fn sysauth_from(response: &HttpResponse) -> Option<String> {
    response
        .header_values("set-cookie")
        .find_map(|cookie| sysauth_pattern().captures(cookie))
        .map(|caps| caps[1].to_string())
        .filter(|value| !value.is_empty())
}

pub struct LuciScanner {
    ctx: ScannerContext,
    session: SessionState<LuciSession>,
    last_results: DeviceSet,
}

impl LuciScanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            session: SessionState::LoggedOut,
            last_results: DeviceSet::new(),
        }
    }

    pub fn session(&self) -> &SessionState<LuciSession> {
        &self.session
    }

    fn login_url(&self) -> String {
        self.ctx.router.url("/cgi-bin/luci/;stok=/login?form=login")
    }

    fn statistics_url(&self, stok: &str) -> String {
        self.ctx
            .router
            .url(&format!("/cgi-bin/luci/;stok={}/admin/wireless?form=statistics", stok))
    }

    fn logout_url(&self, stok: &str) -> String {
        self.ctx
            .router
            .url(&format!("/cgi-bin/luci/;stok={}/admin/system?form=logout", stok))
    }

    async fn login(&self) -> Result<LuciSession, ScanError> {
        let router = &self.ctx.router;
        self.ctx
            .report(Variant::Luci, Level::Info, "login", "Retrieving auth tokens...");

        let request = HttpRequest::post(self.login_url())
            .query("operation", "login")
            .query("username", router.username.clone())
            .query("password", router.password.clone())
            .header("Referer", router.url("/webpages/login.html"))
            .timeout(self.ctx.timeouts.request);

        let response = self.ctx.transport.execute(request).await?;

        let stok = response
            .json::<LoginResponse>()
            .ok()
            .and_then(|r| r.data)
            .and_then(|d| d.stok)
            .filter(|stok| !stok.is_empty());
        let sysauth = sysauth_from(&response);

        match (stok, sysauth) {
            (Some(stok), Some(sysauth)) => Ok(LuciSession { stok, sysauth }),
            _ => Err(ScanError::Login(format!(
                "Couldn't fetch auth tokens, response was: {}",
                response.body
            ))),
        }
    }

    async fn ensure_session(&mut self) -> Result<LuciSession, ScanError> {
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

        let request = HttpRequest::post(self.statistics_url(&tokens.stok))
            .query("operation", "load")
            .header("Referer", router.url("/webpages/index.html"))
            .cookie("sysauth", tokens.sysauth.clone())
            .timeout(self.ctx.timeouts.session);

        let response = self.ctx.transport.execute(request).await?;

        let statistics: StatisticsResponse = response.json().map_err(|e| {
            ScanError::Decode(format!(
                "Router didn't respond with JSON, check if credentials are correct ({})",
                e
            ))
        })?;

        if !statistics.success {
            return match statistics.errorcode.as_deref() {
                Some("timeout") => {
                    self.session.expire();
                    Err(ScanError::SessionExpired)
                }
                other => Err(ScanError::Rejected(format!(
                    "unknown error while fetching data (errorcode {:?})",
                    other
                ))),
            };
        }

        // No separate name field: the raw MAC doubles as display name
        Ok(statistics
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|entry| (entry.mac.clone(), Some(entry.mac)))
            .collect())
    }
}

#[async_trait]
impl Scanner for LuciScanner {
    fn variant(&self) -> Variant {
        Variant::Luci
    }

    async fn scan(&mut self) -> Result<DeviceSet, ScanError> {
        self.ctx.scan_started(Variant::Luci);
        let outcome = self.fetch().await;
        self.ctx
            .finish_scan(Variant::Luci, &mut self.last_results, outcome)
    }

    fn last_results(&self) -> &DeviceSet {
        &self.last_results
    }

    /// Best-effort logout; tokens are dropped whatever the router answers
    async fn logout(&mut self) {
        let Some(tokens) = self.session.reset() else {
            return;
        };

        self.ctx.report(
            Variant::Luci,
            Level::Info,
            "logout",
            "Logging out of router admin interface...",
        );

        let request = HttpRequest::post(self.logout_url(&tokens.stok))
            .query("operation", "write")
            .header("Referer", self.ctx.router.url("/webpages/index.html"))
            .cookie("sysauth", tokens.sysauth)
            .timeout(self.ctx.timeouts.request);

        if let Err(e) = self.ctx.transport.execute(request).await {
            self.ctx
                .report(Variant::Luci, Level::Debug, "logout_failed", e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::scanner::RouterIdentity;
    use crate::transport::mock::MockTransport;
    use crate::transport::Method;

    const LOGIN: &str = "/cgi-bin/luci/;stok=/login?form=login";
    const STATISTICS: &str = "/cgi-bin/luci/;stok=f00d/admin/wireless?form=statistics";
    const LOGOUT: &str = "/cgi-bin/luci/;stok=f00d/admin/system?form=logout";

    const STATIONS: &str = r#"{"success":true,"data":[
        {"mac":"A8-5B-78-11-22-33","type":"2.4GHz","encryption":"wpa/wpa2-psk","rxpkts":12,"txpkts":9},
        {"mac":"10-BF-48-44-55-66","type":"5GHz","encryption":"wpa/wpa2-psk","rxpkts":3,"txpkts":1}
    ]}"#;

    fn login_ok() -> HttpResponse {
        HttpResponse::new(200, r#"{"success":true,"data":{"stok":"f00d"}}"#)
            .with_header("Set-Cookie", "sysauth=a1b2c3; path=/cgi-bin/luci")
    }

    fn scanner(mock: &MockTransport) -> LuciScanner {
        let router = RouterIdentity::new("192.168.0.1", "admin", "pa55").unwrap();
        LuciScanner::new(ScannerContext::new(router, Arc::new(mock.clone())))
    }

    #[test]
    fn test_sysauth_from_set_cookie() {
        let resp = HttpResponse::new(200, "")
            .with_header("Set-Cookie", "lang=en; path=/")
            .with_header("Set-Cookie", "sysauth=deadbeef; path=/cgi-bin/luci; HttpOnly");
        assert_eq!(sysauth_from(&resp).as_deref(), Some("deadbeef"));
        assert_eq!(sysauth_from(&HttpResponse::new(200, "")), None);
    }

    #[tokio::test]
    async fn test_login_then_reuse_session() {
        let mock = MockTransport::new()
            .on(Method::Post, LOGIN, login_ok())
            .on(Method::Post, STATISTICS, HttpResponse::new(200, STATIONS));
        let mut scanner = scanner(&mock);

        let devices = scanner.scan().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(scanner.device_name("A8:5B:78:11:22:33"), Some("A8-5B-78-11-22-33"));
        assert_eq!(
            scanner.session().active(),
            Some(&LuciSession {
                stok: "f00d".to_string(),
                sysauth: "a1b2c3".to_string()
            })
        );

        tokio_test::assert_ok!(scanner.scan().await);
        assert_eq!(mock.requests_to(LOGIN).len(), 1);

        let login = mock.requests_to(LOGIN).remove(0);
        assert!(login.query.contains(&("username".to_string(), "admin".to_string())));
        assert!(login.query.contains(&("password".to_string(), "pa55".to_string())));

        let listing = mock.requests_to(STATISTICS).remove(1);
        assert_eq!(listing.cookie_header().as_deref(), Some("sysauth=a1b2c3"));
        assert_eq!(listing.timeout, std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_errorcode_expires_session() {
        let mock = MockTransport::new()
            .on(Method::Post, LOGIN, login_ok())
            .on(Method::Post, STATISTICS, HttpResponse::new(200, STATIONS))
            .on(
                Method::Post,
                STATISTICS,
                HttpResponse::new(200, r#"{"success": false, "errorcode": "timeout"}"#),
            );
        let mut scanner = scanner(&mock);
        tokio_test::assert_ok!(scanner.scan().await);

        assert_eq!(scanner.scan().await, Err(ScanError::SessionExpired));
        assert_eq!(scanner.session(), &SessionState::Expired);
        assert!(scanner.session().active().is_none());
        assert_eq!(scanner.last_results().len(), 2);

        // Next scan logs in again
        let _ = scanner.scan().await;
        assert_eq!(mock.requests_to(LOGIN).len(), 2);
    }

    #[tokio::test]
    async fn test_other_errorcode_keeps_session() {
        let mock = MockTransport::new()
            .on(Method::Post, LOGIN, login_ok())
            .on(
                Method::Post,
                STATISTICS,
                HttpResponse::new(200, r#"{"success": false, "errorcode": "-40101"}"#),
            );
        let mut scanner = scanner(&mock);

        assert_eq!(scanner.scan().await.unwrap_err().code(), "rejected");
        assert!(scanner.session().is_active());
    }

    #[tokio::test]
    async fn test_non_json_listing_is_decode_failure() {
        let mock = MockTransport::new()
            .on(Method::Post, LOGIN, login_ok())
            .on(Method::Post, STATISTICS, HttpResponse::new(200, STATIONS))
            .on(Method::Post, STATISTICS, HttpResponse::new(200, "<html>busy</html>"));
        let mut scanner = scanner(&mock);
        tokio_test::assert_ok!(scanner.scan().await);

        assert_eq!(scanner.scan().await.unwrap_err().code(), "decode");
        assert_eq!(scanner.last_results().len(), 2);
    }

    #[tokio::test]
    async fn test_login_without_cookie_fails() {
        let mock = MockTransport::new().on(
            Method::Post,
            LOGIN,
            HttpResponse::new(200, r#"{"success":true,"data":{"stok":"f00d"}}"#),
        );
        let mut scanner = scanner(&mock);

        assert_eq!(scanner.scan().await.unwrap_err().code(), "login");
        assert_eq!(scanner.session(), &SessionState::LoggedOut);
        assert!(mock.requests_to(STATISTICS).is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_tokens_even_on_failure() {
        let mock = MockTransport::new()
            .on(Method::Post, LOGIN, login_ok())
            .on(Method::Post, STATISTICS, HttpResponse::new(200, STATIONS));
        let mut scanner = scanner(&mock);
        tokio_test::assert_ok!(scanner.scan().await);

        // No logout route registered: the POST fails with a connection error
        scanner.logout().await;
        assert_eq!(scanner.session(), &SessionState::LoggedOut);

        let logout = mock.requests_to(LOGOUT);
        assert_eq!(logout.len(), 1);
        assert!(logout[0].query.contains(&("operation".to_string(), "write".to_string())));

        // Nothing left to release
        scanner.logout().await;
        assert_eq!(mock.requests_to(LOGOUT).len(), 1);
    }
}
