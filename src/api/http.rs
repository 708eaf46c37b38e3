use std::collections::HashMap;

use crate::error::{PortalError, PortalResult};

/// Response data decoupled from the transport
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    status_code: u16,
    /// Response body
    body: String,
}

impl HttpResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// Trait for HTTP operations, allowing for mocking
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform an HTTP GET request
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> PortalResult<HttpResponse>;
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a client with custom configuration
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> PortalResult<HttpResponse> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse::new(status, body))
    }
}

/// Mock implementation of HttpClient for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A mock HTTP client that returns predefined responses and records
    /// every request made through it
    pub struct MockHttpClient {
        /// Map of URLs to responses
        responses: Arc<Mutex<HashMap<String, HttpResponse>>>,
        /// Record of requests made (URL, headers), in order
        requests: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
        /// Artificial latency before each response, to let tests interleave
        delay: Arc<Mutex<Option<std::time::Duration>>>,
    }

    impl MockHttpClient {
        /// Create a new mock client
        pub fn new() -> Self {
            Self {
                responses: Arc::new(Mutex::new(HashMap::new())),
                requests: Arc::new(Mutex::new(Vec::new())),
                delay: Arc::new(Mutex::new(None)),
            }
        }

        /// Delay every response by the given duration
        pub fn set_delay(&self, delay: std::time::Duration) {
            *self.delay.lock().unwrap() = Some(delay);
        }

        /// Register a mock response for a URL
        pub fn mock_response(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
            self.responses
                .lock()
                .unwrap()
                .insert(url.into(), HttpResponse::new(status, body));
        }

        /// Register a JSON response
        pub fn mock_json<T: serde::Serialize>(&self, url: impl Into<String>, status: u16, data: &T) {
            let body = serde_json::to_string(data).expect("serializable mock body");
            self.mock_response(url, status, body);
        }

        /// URLs requested so far, in order
        pub fn requests(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }

        /// Headers sent with the most recent request
        pub fn last_headers(&self) -> Option<HashMap<String, String>> {
            self.requests
                .lock()
                .unwrap()
                .last()
                .map(|(_, headers)| headers.clone())
        }

        /// Number of requests made
        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for MockHttpClient {
        async fn get(
            &self,
            url: &str,
            headers: HashMap<String, String>,
        ) -> PortalResult<HttpResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers));
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match self.responses.lock().unwrap().get(url) {
                Some(response) => Ok(response.clone()),
                None => Err(PortalError::transport(format!(
                    "connection refused: {}",
                    url
                ))),
            }
        }
    }
}
