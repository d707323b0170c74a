//! Reverse proxy to the external checkout provider.
//!
//! Requests under the configured prefix are forwarded to the provider's
//! origin with the prefix stripped. `Host` comes from the upstream URL, and
//! the upstream status, headers and body are relayed without translation.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, Uri},
    response::Response,
};
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::info;

use crate::{config::CheckoutConfig, error::ApiError};

const MAX_REQUEST_BODY: usize = 2 * 1024 * 1024;

// Connection-scoped headers that must not cross the proxy
const HOP_BY_HOP: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Clone)]
pub struct CheckoutProxy {
    http_client: reqwest::Client,
    upstream_url: String,
    prefix: String,
}

impl CheckoutProxy {
    pub fn from_config(config: &CheckoutConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .redirect(Policy::none())
            .no_gzip()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            upstream_url: config.upstream_url.clone(),
            prefix: config.prefix.clone(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Upstream URL for an inbound URI: prefix stripped, query kept.
    pub fn target_url(&self, uri: &Uri) -> String {
        let path = uri.path();
        let stripped = match path.strip_prefix(self.prefix.as_str()) {
            Some("") => "/",
            Some(rest) => rest,
            None => path,
        };

        match uri.query() {
            Some(query) => format!("{}{}?{}", self.upstream_url, stripped, query),
            None => format!("{}{}", self.upstream_url, stripped),
        }
    }

    pub async fn forward(&self, req: Request) -> Result<Response, ApiError> {
        let original = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path().to_string(), |pq| pq.as_str().to_string());
        let target = self.target_url(req.uri());
        info!("Proxying request: {}", original);

        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, MAX_REQUEST_BODY)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {e}")))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let mut request = self
            .http_client
            .request(parts.method, &target)
            .headers(headers);
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = request.send().await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}
