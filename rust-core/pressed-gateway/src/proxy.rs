// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Forwarding of allowed requests to the storefront renderer.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use reqwest::Client;
use tracing::warn;

use crate::GatewayError;

/// Largest request body relayed upstream.
const MAX_FORWARD_BODY: usize = 10 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Clone)]
pub struct Upstream {
    client: Client,
    base: String,
}

impl Upstream {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base, path_and_query)
    }

    /// Relay `request` and stream the upstream response back.
    pub async fn forward(&self, request: Request) -> Response {
        match self.try_forward(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, upstream = %self.base, "upstream request failed");
                err.into_response()
            }
        }
    }

    async fn try_forward(&self, request: Request) -> Result<Response, GatewayError> {
        let (parts, body) = request.into_parts();
        let target = self.target_url(parts.uri.path_and_query().map_or("/", |pq| pq.as_str()));
        let body = to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(|e| GatewayError::BadRequest(format!("unreadable request body: {e}")))?;

        let upstream = self
            .client
            .request(parts.method, target)
            .headers(strip_hop_by_hop(&parts.headers))
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::BadGateway(e.to_string()))?;

        let mut response = Response::builder().status(upstream.status());
        if let Some(headers) = response.headers_mut() {
            *headers = strip_hop_by_hop(upstream.headers());
        }
        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    // Headers named by `Connection` are hop-by-hop as well.
    for value in headers.get_all(header::CONNECTION) {
        if let Ok(names) = value.to_str() {
            for name in names.split(',') {
                out.remove(name.trim());
            }
        }
    }
    out.remove("keep-alive");
    out
}
