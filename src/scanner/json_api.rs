//! Firmware with a JSON client grid behind the `Authorization` cookie

use async_trait::async_trait;
use serde::Deserialize;

use super::{DeviceSet, Scanner, ScannerContext, Variant};
use crate::credentials::{basic_cookie_value, AUTH_COOKIE};
use crate::error::ScanError;
use crate::transport::HttpRequest;

const CLIENT_GRID: &str = "/data/map_access_wireless_client_grid.json";

#[derive(Debug, Deserialize)]
struct ClientGrid {
    data: Option<Vec<GridClient>>,
}

#[derive(Debug, Deserialize)]
struct GridClient {
    mac_addr: String,
    name: Option<String>,
}

pub struct JsonApiScanner {
    ctx: ScannerContext,
    last_results: DeviceSet,
}

impl JsonApiScanner {
    pub fn new(ctx: ScannerContext) -> Self {
        Self {
            ctx,
            last_results: DeviceSet::new(),
        }
    }

    async fn fetch(&self) -> Result<DeviceSet, ScanError> {
        let router = &self.ctx.router;

        let request = HttpRequest::post(router.url(CLIENT_GRID))
            .header("Referer", router.base_url())
            .cookie(AUTH_COOKIE, basic_cookie_value(&router.username, &router.password))
            .timeout(self.ctx.timeouts.request);

        let response = self.ctx.transport.execute(request).await?;

        // A login page instead of JSON usually means wrong credentials
        let grid: ClientGrid = response.json().map_err(|e| {
            ScanError::Decode(format!(
                "Router didn't respond with JSON, check if credentials are correct ({})",
                e
            ))
        })?;

        Ok(grid
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|client| (client.mac_addr, client.name))
            .collect())
    }
}

#[async_trait]
impl Scanner for JsonApiScanner {
    fn variant(&self) -> Variant {
        Variant::JsonApi
    }

    async fn scan(&mut self) -> Result<DeviceSet, ScanError> {
        self.ctx.scan_started(Variant::JsonApi);
        let outcome = self.fetch().await;
        self.ctx
            .finish_scan(Variant::JsonApi, &mut self.last_results, outcome)
    }

    fn last_results(&self) -> &DeviceSet {
        &self.last_results
    }
}
