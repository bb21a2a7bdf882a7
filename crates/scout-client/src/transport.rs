use std::time::Duration;

use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy};
use scout_core::error::AppError;
use scout_core::traits::{HttpResponse, HttpTransport};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport using reqwest.
///
/// Holds one client per configured proxy (or a single direct client) and
/// picks one uniformly at random for every request. Any status the server
/// answers with is returned as a response; only transport failures are errors.
#[derive(Clone)]
pub struct ReqwestTransport {
    clients: Vec<Client>,
    timeout_secs: u64,
}

impl ReqwestTransport {
    /// Direct client with the default timeout.
    pub fn new() -> Result<Self, AppError> {
        Self::with_proxies(&[], DEFAULT_TIMEOUT)
    }

    /// One client per proxy URL (`http://`, `https://` or `socks5://`).
    /// An empty list means direct connections.
    pub fn with_proxies(proxies: &[String], timeout: Duration) -> Result<Self, AppError> {
        let clients = if proxies.is_empty() {
            vec![build_client(None, timeout)?]
        } else {
            proxies
                .iter()
                .map(|p| build_client(Some(p), timeout))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            clients,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Number of distinct routes (proxies or the direct client).
    pub fn routes(&self) -> usize {
        self.clients.len()
    }

    fn pick(&self) -> &Client {
        let index = match self.clients.len() {
            0 | 1 => 0,
            n => rand::random_range(0..n),
        };
        &self.clients[index]
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }

    async fn into_response(&self, response: reqwest::Response) -> Result<HttpResponse, AppError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;
        Ok(HttpResponse { status, body })
    }
}

fn build_client(proxy: Option<&String>, timeout: Duration) -> Result<Client, AppError> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(proxy) = proxy {
        let proxy = Proxy::all(proxy)
            .map_err(|e| AppError::ConfigError(format!("Invalid proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, user_agent: Option<&str>) -> Result<HttpResponse, AppError> {
        let mut request = self.pick().get(url);
        if let Some(user_agent) = user_agent {
            request = request.header(USER_AGENT, user_agent);
        }
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        self.into_response(response).await
    }

    async fn put(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse, AppError> {
        let response = self
            .pick()
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.into_response(response).await
    }
}
