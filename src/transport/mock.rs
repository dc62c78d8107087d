//! Recording transport for scanner tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::TransportError;

#[derive(Default)]
struct MockState {
    /// (method, path?query) → queued replies; the last reply repeats
    routes: HashMap<(Method, String), Vec<Result<HttpResponse, TransportError>>>,
    requests: Vec<HttpRequest>,
    sessions: usize,
}

/// Route table keyed by method and the part of the URL after the host
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// `http://host/a/b?c` → `/a/b?c`
fn target_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    match without_scheme.find('/') {
        Some(pos) => without_scheme[pos..].to_string(),
        None => "/".to_string(),
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: Method, target: &str, response: HttpResponse) -> Self {
        self.push(method, target, Ok(response));
        self
    }

    pub fn fail(self, method: Method, target: &str, error: TransportError) -> Self {
        self.push(method, target, Err(error));
        self
    }

    /// Add a reply after the transport has been handed to a scanner
    pub fn push(&self, method: Method, target: &str, reply: Result<HttpResponse, TransportError>) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .entry((method, target.to_string()))
            .or_default()
            .push(reply);
    }

    /// Drop every queued reply for a route
    pub fn clear(&self, method: Method, target: &str) {
        let mut state = self.state.lock().unwrap();
        state.routes.remove(&(method, target.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, target: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| target_of(&r.url) == target)
            .collect()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().sessions
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        let key = (request.method, target_of(&request.url));
        state.requests.push(request);

        match state.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Err(TransportError::Connect(format!(
                "connection refused: {} {}",
                key.0.as_str(),
                key.1
            ))),
        }
    }

    fn session(&self) -> Result<Box<dyn HttpTransport>, TransportError> {
        self.state.lock().unwrap().sessions += 1;
        Ok(Box::new(self.clone()))
    }
}

#[test]
fn test_target_of() {
    assert_eq!(target_of("http://10.0.0.1/cgi?7"), "/cgi?7");
    assert_eq!(target_of("http://10.0.0.1"), "/");
    assert_eq!(
        target_of("http://10.0.0.1/cgi-bin/luci/;stok=abc/admin/wireless?form=statistics"),
        "/cgi-bin/luci/;stok=abc/admin/wireless?form=statistics"
    );
}
