use std::error::Error as StdError;
use std::time::{Duration, Instant};

use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::preparer::PreparedRequest;

/// What came back from the wire
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub duration: Duration,
    pub truncated: bool,
}

/// Outbound client shared by every run
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_body_bytes: usize,
}

impl HttpClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_response_body_bytes,
        })
    }

    /// Send `request`, stopping early when `cancel` fires
    pub async fn execute(
        &self,
        request: &PreparedRequest,
        cancel: &CancellationToken,
    ) -> AppResult<HttpExchange> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(url = %request.url, "outbound request canceled");
                Err(AppError::Canceled)
            }
            result = self.send(request) => result,
        }
    }

    async fn send(&self, request: &PreparedRequest) -> AppResult<HttpExchange> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| AppError::InvalidArgument(format!("invalid method: {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let started = Instant::now();
        let mut response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();

        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if truncated {
            tracing::warn!(
                url = %request.url,
                limit = self.max_body_bytes,
                "response body truncated"
            );
        }

        Ok(HttpExchange {
            status,
            headers,
            body,
            duration: started.elapsed(),
            truncated,
        })
    }
}

fn mentions_tls(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Map a transport failure onto an error code
fn classify(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        return AppError::DeadlineExceeded(err.to_string());
    }
    if mentions_tls(&err) {
        return AppError::PermissionDenied(format!("TLS failure: {}", err));
    }
    if err.is_connect() {
        return AppError::Unavailable(err.to_string());
    }
    if err.is_builder() {
        return AppError::InvalidArgument(err.to_string());
    }
    AppError::Internal(format!("outbound request failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_expiration_hours: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            http_timeout_seconds: 5,
            max_response_body_bytes: 1024,
            event_buffer_size: 16,
        }
    }

    fn request(url: &str) -> PreparedRequest {
        PreparedRequest {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HttpClient::new(&config()).unwrap();
        let err = client
            .execute(&request(&format!("http://127.0.0.1:{}/", port)), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
    }

    #[tokio::test]
    async fn test_canceled_before_send() {
        let client = HttpClient::new(&config()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .execute(&request("http://127.0.0.1:9/"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Canceled);
    }
}
