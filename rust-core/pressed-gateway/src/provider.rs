// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! HTTP client for the managed auth provider.
//!
//! Two endpoints are used:
//!
//! - `GET /auth/v1/user` with the access token as bearer: 200 returns the user,
//!   401/403 mean the token is not live.
//! - `POST /auth/v1/token?grant_type=refresh_token`: 200 returns a new token
//!   pair, 400/401/403 mean the refresh token was refused.
//!
//! Every other status, transport error or undecodable body is reported as
//! [`AccessError::ProviderUnreachable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use pressed_access::{AccessError, AuthProvider, AuthenticatedUser, TokenGrant};

/// Auth provider spoken to over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthProvider {
    client: Client,
    base: Url,
    service_key: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthenticatedUser,
}

impl HttpAuthProvider {
    pub fn new(client: Client, base_url: &str, service_key: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            base: directory_url(base_url)?,
            service_key: service_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AccessError> {
        self.base
            .join(path)
            .map_err(|e| AccessError::ProviderUnreachable(format!("bad endpoint {path}: {e}")))
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn user_for_token(&self, access_token: &str) -> Result<AuthenticatedUser, AccessError> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.service_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => response
                .json::<AuthenticatedUser>()
                .await
                .map_err(|e| AccessError::ProviderUnreachable(format!("undecodable user response: {e}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AccessError::CredentialInvalid(
                format!("auth provider rejected access token ({})", response.status()),
            )),
            status => Err(AccessError::ProviderUnreachable(format!(
                "auth provider answered {status} for user lookup"
            ))),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AccessError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<TokenResponse>()
                    .await
                    .map_err(|e| AccessError::ProviderUnreachable(format!("undecodable token response: {e}")))?;
                let expires_at = grant_expiry(body.expires_at, body.expires_in, Utc::now());
                Ok(TokenGrant {
                    access_token: body.access_token,
                    refresh_token: body.refresh_token,
                    expires_at,
                    user: body.user,
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AccessError::CredentialInvalid(format!(
                    "auth provider refused refresh token ({})",
                    response.status()
                )))
            }
            status => Err(AccessError::ProviderUnreachable(format!(
                "auth provider answered {status} for refresh"
            ))),
        }
    }

    fn name(&self) -> &str {
        "http-auth"
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> AccessError {
    if err.is_timeout() {
        AccessError::ProviderUnreachable(format!("request timed out: {err}"))
    } else {
        AccessError::ProviderUnreachable(format!("transport error: {err}"))
    }
}

/// `base_url` with a trailing slash, so relative joins append instead of
/// replacing the last path segment.
pub(crate) fn directory_url(base_url: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Absolute expiry wins over a relative lifetime.
fn grant_expiry(expires_at: Option<i64>, expires_in: Option<i64>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    expires_at
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .or_else(|| expires_in.map(|secs| now + chrono::Duration::seconds(secs)))
}
