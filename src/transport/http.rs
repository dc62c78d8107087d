//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::Client;

use super::{Body, HttpRequest, HttpResponse, HttpTransport, Method, DEFAULT_TIMEOUT};
use crate::error::TransportError;

/// Production transport on top of a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Cookie-less client; scanners send their cookies explicitly
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Client(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Text(text) => builder.body(text),
            Body::Form(fields) => builder.form(&fields),
        };

        let resp = builder.timeout(request.timeout).send().await?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = resp.text().await?;

        tracing::trace!(
            "{} {} -> {} ({} bytes)",
            request.method.as_str(),
            request.url,
            status,
            body.len()
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn session(&self) -> Result<Box<dyn HttpTransport>, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Client(format!("Failed to create HTTP session: {}", e)))?;

        Ok(Box::new(ReqwestTransport { client }))
    }
}
