//! HTTP Client
//!
//! Minimal GET client for downloading filter lists.
//! Features:
//! - HTTP/1.1 over hyper, HTTPS with rustls (memory-safe TLS)
//! - Connect and total timeouts
//! - Redirect following (Location header, bounded)
//! - Response body size limit

use http_body_util::{BodyExt, Empty, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, ACCEPT, CONTENT_TYPE, HOST, LOCATION, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Body read error: {0}")]
    BodyError(String),

    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("Too many redirects ({0})")]
    TooManyRedirects(usize),

    #[error("Unexpected status {0}")]
    Status(StatusCode),
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Total request timeout, redirects included
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
    /// Maximum redirects followed
    pub max_redirects: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("Surf/{}", env!("CARGO_PKG_VERSION")),
            max_body_size: 32 * 1024 * 1024, // 32 MB
            max_redirects: 5,
        }
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
    /// Total download time
    pub total_time: Duration,
    /// Final URL (after redirects)
    pub final_url: String,
}

impl Response {
    /// Check if response was successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, invalid UTF-8 replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Get Content-Type header
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }
}

/// GET-only HTTP client
pub struct HttpClient {
    config: HttpClientConfig,
    tls: TlsConnector,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        info!(
            "HTTP client initialized (timeout: {:?}, max redirects: {})",
            config.timeout, config.max_redirects
        );

        Self {
            config,
            tls: TlsConnector::from(Arc::new(tls_config)),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(HttpClientConfig::default())
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// GET a URL, following redirects. Non-2xx final statuses are errors.
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.config.timeout, self.follow(url)).await;

        let mut response = result.map_err(|_| HttpError::Timeout)??;
        response.total_time = start.elapsed();

        debug!(
            "HTTP GET {} -> {} ({} bytes, {:?})",
            response.final_url,
            response.status,
            response.body.len(),
            response.total_time
        );

        if !response.is_success() {
            return Err(HttpError::Status(response.status));
        }
        Ok(response)
    }

    async fn follow(&self, url: &str) -> Result<Response, HttpError> {
        let mut current = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        for _ in 0..=self.config.max_redirects {
            let response = self.send(&current).await?;
            if !response.status.is_redirection() {
                return Ok(response);
            }

            let location = response
                .headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| HttpError::HttpError("Redirect without Location".to_string()))?;
            let next = current
                .join(location)
                .map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

            debug!("Redirect {} -> {}", current, next);
            current = next;
        }

        Err(HttpError::TooManyRedirects(self.config.max_redirects))
    }

    /// Single request/response exchange
    async fn send(&self, url: &Url) -> Result<Response, HttpError> {
        let is_https = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(HttpError::InvalidUrl(format!("Unsupported scheme: {}", other))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::InvalidUrl("No port for URL".to_string()))?;

        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let path = &url[url::Position::BeforePath..url::Position::AfterQuery];

        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, authority)
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "text/plain, */*")
            .body(Empty::<Bytes>::new())
            .map_err(|e| HttpError::HttpError(e.to_string()))?;

        let connect_host = host.trim_start_matches('[').trim_end_matches(']');
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((connect_host, port)),
        )
        .await
        .map_err(|_| HttpError::Timeout)?
        .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        if is_https {
            let server_name = rustls::pki_types::ServerName::try_from(connect_host.to_string())
                .map_err(|_| HttpError::TlsError("Invalid server name".to_string()))?;
            let tls_stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| HttpError::TlsError(e.to_string()))?;
            self.exchange(tls_stream, request, url).await
        } else {
            self.exchange(stream, request, url).await
        }
    }

    async fn exchange<S>(
        &self,
        stream: S,
        request: Request<Empty<Bytes>>,
        url: &Url,
    ) -> Result<Response, HttpError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| HttpError::HttpError(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                warn!("Connection error: {}", e);
            }
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| HttpError::HttpError(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = if status.is_redirection() {
            Vec::new()
        } else {
            let limit = self.config.max_body_size;
            Limited::new(response.into_body(), limit)
                .collect()
                .await
                .map_err(|e| {
                    if e.is::<http_body_util::LengthLimitError>() {
                        HttpError::BodyTooLarge(limit)
                    } else {
                        HttpError::BodyError(e.to_string())
                    }
                })?
                .to_bytes()
                .to_vec()
        };

        Ok(Response {
            status,
            headers,
            body,
            total_time: Duration::ZERO,
            final_url: url.to_string(),
        })
    }
}
