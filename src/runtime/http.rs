// ABOUTME: HTTP/1 reachability probe built on hyper over a plain TCP stream.
// ABOUTME: Connection errors and timeouts collapse to no status code.

use super::traits::HttpProbe;
use async_trait::async_trait;
use hyper::Uri;
use hyper_util::rt::TokioIo;
use std::time::Duration;

/// Default deadline for a single probe request.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe issuing a single `GET` per call.
#[derive(Debug, Clone)]
pub struct HyperProbe {
    timeout: Duration,
}

impl HyperProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HyperProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

/// Address and request target extracted from an `http://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl ProbeEndpoint {
    /// Parse an `http://host[:port][/path]` URL.
    pub fn parse(url: &str) -> Result<Self, String> {
        let uri: Uri = url
            .parse()
            .map_err(|e| format!("invalid URL {}: {}", url, e))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(format!("unsupported scheme '{}' in {}", other, url)),
            None => return Err(format!("URL must start with http:// ({})", url)),
        }

        let host = uri
            .host()
            .ok_or_else(|| format!("URL has no host: {}", url))?
            .to_string();
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            host,
            port: uri.port_u16().unwrap_or(80),
            path,
        })
    }

    fn authority(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

async fn request_status(endpoint: &ProbeEndpoint) -> Option<u16> {
    let stream = match tokio::net::TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(error = %e, host = %endpoint.host, "probe connection failed");
            return None;
        }
    };

    let io = TokioIo::new(stream);
    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::debug!(error = %e, host = %endpoint.host, "probe handshake failed");
            return None;
        }
    };

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("probe connection error: {}", e);
        }
    });

    let req = hyper::Request::builder()
        .method("GET")
        .uri(endpoint.path.as_str())
        .header("Host", endpoint.authority())
        .header("User-Agent", concat!("horsestrap/", env!("CARGO_PKG_VERSION")))
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .ok()?;

    match sender.send_request(req).await {
        Ok(resp) => Some(resp.status().as_u16()),
        Err(e) => {
            tracing::debug!(error = %e, host = %endpoint.host, "probe request failed");
            None
        }
    }
}

#[async_trait]
impl HttpProbe for HyperProbe {
    async fn status_code(&self, url: &str) -> Option<u16> {
        let endpoint = match ProbeEndpoint::parse(url) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("{}", e);
                return None;
            }
        };

        match tokio::time::timeout(self.timeout, request_status(&endpoint)).await {
            Ok(status) => status,
            Err(_elapsed) => {
                tracing::debug!(%url, "probe timed out");
                None
            }
        }
    }
}
