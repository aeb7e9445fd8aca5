// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Pressed access gateway
//!
//! HTTP front for the Pressed storefront. Every storefront request passes the
//! access middleware, which redirects anonymous visitors away from account
//! pages and non-admins away from the admin area. Allowed requests are relayed
//! to the storefront renderer.
//!
//! Operational endpoints (`/health`, `/ready`, `/metrics`, `/_guard/*`) are
//! served by the gateway itself and bypass the guard.

pub mod config;
pub mod metrics;
pub mod middleware;
pub mod provider;
pub mod proxy;
pub mod role_store;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use pressed_access::{
    AccessGuard, AuditEntry, AuditLog, AuthProvider, RoleCache, RoleLookup, RoleStore,
    SessionResolver, SubjectId,
};

pub use config::{ConfigError, GatewayConfig};
pub use metrics::GuardMetrics;
pub use provider::HttpAuthProvider;
pub use proxy::Upstream;
pub use role_store::HttpRoleStore;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Config(_)
            | GatewayError::Client(_)
            | GatewayError::Metrics(_)
            | GatewayError::Io(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Number of most recent entries to return
    pub limit: Option<usize>,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub guard: Arc<AccessGuard>,
    pub metrics: GuardMetrics,
    pub audit: AuditLog,
    pub upstream: Option<Upstream>,
    pub start_time: Instant,
    /// SHA-256 digests of the operator keys (never the keys themselves).
    ops_key_digests: Arc<HashSet<String>>,
}

impl AppState {
    /// State wired to the HTTP auth provider and role store.
    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = http_client(&config)?;
        let provider = HttpAuthProvider::new(client.clone(), &config.auth_url, config.service_key.clone())
            .map_err(|e| ConfigError::Invalid {
                var: "PRESSED_AUTH_URL",
                reason: e.to_string(),
            })?;
        let store = HttpRoleStore::new(
            client.clone(),
            &config.role_store_url,
            config.role_table.clone(),
            config.service_key.clone(),
        )
        .map_err(|e| ConfigError::Invalid {
            var: "PRESSED_ROLE_STORE_URL",
            reason: e.to_string(),
        })?;
        Self::assemble(config, Arc::new(provider), Arc::new(store), client)
    }

    /// State wired to caller-supplied backends.
    pub fn with_backends(
        config: GatewayConfig,
        provider: Arc<dyn AuthProvider>,
        store: Arc<dyn RoleStore>,
    ) -> Result<Self, GatewayError> {
        let client = http_client(&config)?;
        Self::assemble(config, provider, store, client)
    }

    fn assemble(
        config: GatewayConfig,
        provider: Arc<dyn AuthProvider>,
        store: Arc<dyn RoleStore>,
        client: reqwest::Client,
    ) -> Result<Self, GatewayError> {
        let mut roles = RoleLookup::new(store);
        if config.role_cache_ttl_secs > 0 {
            roles = roles.with_cache(RoleCache::new(
                Duration::from_secs(config.role_cache_ttl_secs),
                config.role_cache_capacity,
            ));
        }

        let audit = AuditLog::default();
        let guard = AccessGuard::new(
            config.route_table()?,
            config.redirect_targets()?,
            SessionResolver::new(provider),
            roles,
        )
        .with_audit(audit.clone());

        let upstream = config
            .upstream_url
            .as_deref()
            .map(|url| Upstream::new(client, url));
        let ops_key_digests = config.ops_keys.iter().map(|key| hash_key(key)).collect();

        Ok(Self {
            config: Arc::new(config),
            guard: Arc::new(guard),
            metrics: GuardMetrics::new()?,
            audit,
            upstream,
            start_time: Instant::now(),
            ops_key_digests: Arc::new(ops_key_digests),
        })
    }

    /// Check the `X-Ops-Key` header against the configured operator keys.
    fn authorize_ops(&self, headers: &HeaderMap) -> Result<(), GatewayError> {
        if self.ops_key_digests.is_empty() {
            return Err(GatewayError::Forbidden(
                "operator endpoints are disabled".to_string(),
            ));
        }
        let key = headers
            .get("x-ops-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GatewayError::Unauthorized("X-Ops-Key header required".to_string()))?;
        if !self.ops_key_digests.contains(&hash_key(key)) {
            warn!("rejected operator key");
            return Err(GatewayError::Unauthorized("invalid operator key".to_string()));
        }
        Ok(())
    }
}

fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn http_client(config: &GatewayConfig) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| GatewayError::Client(e.to_string()))
}

/// Build the gateway router
pub fn build_router(state: AppState) -> Router {
    let storefront = Router::new()
        .fallback(storefront_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::access_middleware,
        ))
        .with_state(state.clone());

    Router::new()
        // Health endpoints
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        // Operator endpoints
        .route("/_guard/revocations/{subject}", post(revoke_handler))
        .route("/_guard/audit", get(audit_handler))
        .fallback_service(storefront)
        .with_state(state)
}

/// Health check handler
#[instrument(skip(state))]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check handler
#[instrument]
async fn ready_handler() -> StatusCode {
    StatusCode::OK
}

#[instrument(skip(state))]
async fn metrics_handler(State(state): State<AppState>) -> Result<Response, GatewayError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Drop any cached role for a subject whose role changed upstream.
#[instrument(skip(state, headers))]
async fn revoke_handler(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, GatewayError> {
    state.authorize_ops(&headers)?;
    state.guard.roles().revoke(&SubjectId::new(subject.as_str())).await;
    info!(subject = %subject, "role revocation reported");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, headers))]
async fn audit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, GatewayError> {
    state.authorize_ops(&headers)?;
    Ok(Json(state.audit.recent(query.limit.unwrap_or(100))))
}

/// Requests the guard allowed end up here.
async fn storefront_handler(State(state): State<AppState>, request: Request) -> Response {
    match &state.upstream {
        Some(upstream) => upstream.forward(request).await,
        None => GatewayError::NotFound(format!("no route for {}", request.uri().path())).into_response(),
    }
}

/// Start the gateway
pub async fn serve(config: GatewayConfig) -> Result<(), GatewayError> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    info!("Starting Pressed access gateway on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
