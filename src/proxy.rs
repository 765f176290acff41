use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::StreamExt;
use http::header;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::ProxyError;
use crate::inspect::middleware::inspect_headers;
use crate::inspect::Inspector;

// RFC 9110 section 7.6.1
const HOP_BY_HOP_HEADERS: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HeaderName::from_static("keep-alive"),
];

fn build_reqwest_client(config: &ServerConfig) -> Result<reqwest::Client, ProxyError> {
    let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
    };

    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout));
    if !config.http_use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| ProxyError::Upstream(format!("Failed to build HTTP client: {err}")))
}

/// The service inspected requests are forwarded to.
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
    preserve_host: bool,
}

impl Upstream {
    /// Build the upstream client.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Upstream`] when the HTTP client cannot be built.
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Result<Self, ProxyError> {
        Ok(Self {
            client: build_reqwest_client(server)?,
            base_url: upstream.base_url.trim().trim_end_matches('/').to_string(),
            preserve_host: upstream.preserve_host,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upstream URL for an inbound path and query.
    #[must_use]
    pub fn target_url(&self, path_and_query: &str) -> String {
        let mut url = String::with_capacity(self.base_url.len() + path_and_query.len());
        url.push_str(&self.base_url);
        if !path_and_query.starts_with('/') {
            url.push('/');
        }
        url.push_str(path_and_query);
        url
    }

    /// Forward a request and stream the upstream response back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Upstream`] when the upstream cannot be reached.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", |path_and_query| path_and_query.as_str());
        let url = self.target_url(path_and_query);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if !self.preserve_host {
            headers.remove(header::HOST);
        }

        tracing::debug!(method = %parts.method, url = %url, "forwarding request upstream");
        let data_stream = body
            .into_data_stream()
            .map(|result| result.map_err(|err| std::io::Error::other(err.to_string())));
        let upstream_body = reqwest::Body::wrap_stream(data_stream);
        let response = self
            .client
            .request(parts.method, url.as_str())
            .headers(headers)
            .body(upstream_body)
            .send()
            .await
            .map_err(|err| ProxyError::Upstream(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        let mut response_headers = response.headers().clone();
        strip_hop_by_hop(&mut response_headers);
        let body = Body::from_stream(response.bytes_stream());

        let mut forwarded = Response::new(body);
        *forwarded.status_mut() = status;
        *forwarded.headers_mut() = response_headers;
        Ok(forwarded)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

async fn forward_handler(State(upstream): State<Arc<Upstream>>, request: Request<Body>) -> Response {
    match upstream.forward(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "upstream request failed");
            err.into_response()
        }
    }
}

/// Router forwarding every request upstream, with body inspection in front.
pub fn build_router(inspector: Arc<Inspector>, upstream: Arc<Upstream>) -> Router {
    Router::new()
        .fallback(forward_handler)
        .with_state(upstream)
        .layer(axum::middleware::from_fn_with_state(inspector, inspect_headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base_url: &str) -> Upstream {
        Upstream::new(
            &ServerConfig::default(),
            &UpstreamConfig {
                base_url: base_url.to_string(),
                preserve_host: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_target_url_joins_path_and_query() {
        let upstream = upstream("http://127.0.0.1:9000/");
        assert_eq!(upstream.base_url(), "http://127.0.0.1:9000");
        assert_eq!(
            upstream.target_url("/v1/chat/completions?api-version=2024"),
            "http://127.0.0.1:9000/v1/chat/completions?api-version=2024"
        );
    }

    #[test]
    fn test_target_url_keeps_base_path() {
        let upstream = upstream("https://gateway.example.com/openai");
        assert_eq!(
            upstream.target_url("/v1/batches"),
            "https://gateway.example.com/openai/v1/batches"
        );
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}
