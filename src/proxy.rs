// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reverse proxy to the internal backend.
//!
//! Everything the edge does not serve itself is forwarded verbatim (method,
//! path, query, body, end-to-end headers) after [`crate::auth::edge_auth`]
//! has rewritten the identity headers. Upstream failures become 502.

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::auth::policy::is_canonical_path;
use crate::error::ApiError;
use crate::state::AppState;

/// Largest request body the edge will buffer for forwarding.
pub const MAX_FORWARD_BODY: usize = 10 * 1024 * 1024;

/// Headers scoped to a single connection (RFC 9110 §7.6.1).
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Backend the edge forwards to.
#[derive(Clone)]
pub struct Upstream {
    base: Url,
    http: Client,
}

impl Upstream {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { base, http })
    }

    /// Target URL for an inbound path and query. Only path and query are
    /// taken from the request; scheme, host and port always come from the
    /// configured base.
    pub fn target(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }
}

/// Remove hop-by-hop headers, including any the `Connection` header names.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(named.iter()) {
        headers.remove(name);
    }
}

/// Fallback handler forwarding the request to the upstream.
pub async fn forward(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let upstream = &state.upstream;

    if !is_canonical_path(parts.uri.path()) {
        return Err(ApiError::bad_request("Request path must not contain dot segments"));
    }

    let body = to_bytes(body, MAX_FORWARD_BODY)
        .await
        .map_err(|_| ApiError::new(axum::http::StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"))?;

    let url = upstream.target(parts.uri.path(), parts.uri.query());

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    debug!(method = %parts.method, path = %parts.uri.path(), "forwarding to upstream");

    let upstream_response = upstream
        .http
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            warn!(error = %e, "upstream request failed");
            ApiError::bad_gateway("Upstream unavailable")
        })?;

    let status = upstream_response.status();
    let mut response_headers = upstream_response.headers().clone();
    strip_hop_by_hop(&mut response_headers);
    response_headers.remove(header::CONTENT_LENGTH);

    let bytes = upstream_response.bytes().await.map_err(|e| {
        warn!(error = %e, "failed to read upstream response body");
        ApiError::bad_gateway("Upstream response interrupted")
    })?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
