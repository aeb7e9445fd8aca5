// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Axum middleware enforcing route protection on storefront requests.
//!
//! For every request this middleware:
//! 1. Reads the access and refresh token cookies
//! 2. Asks the [`AccessGuard`](pressed_access::AccessGuard) for a verdict
//! 3. Runs the inner service with rotated credentials in place, or answers
//!    with a redirect
//! 4. Persists rotated credentials, or clears rejected ones

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::warn;

use pressed_access::{CredentialRotation, Credentials, ResponseInstruction};

use crate::config::GatewayConfig;
use crate::AppState;

pub async fn access_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let target = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());
    let credentials = credentials_from(&jar, &state.config);

    let verdict = state.guard.evaluate(&target, &credentials).await;
    state.metrics.observe(&verdict);

    let response = match &verdict.instruction {
        ResponseInstruction::PassThrough => {
            if let Some(rotation) = &verdict.rotation {
                forward_rotation(&mut request, &jar, rotation, &state.config);
            }
            next.run(request).await
        }
        ResponseInstruction::Redirect { location } => Redirect::to(location).into_response(),
    };

    let jar = match &verdict.rotation {
        Some(rotation) => persist_rotation(jar, rotation, &state.config),
        None => clear_refused(jar, verdict.clear_access_token, verdict.clear_refresh_token, &state.config),
    };
    (jar, response).into_response()
}

/// The credential bundle carried by the request's cookies.
pub fn credentials_from(jar: &CookieJar, config: &GatewayConfig) -> Credentials {
    Credentials::new(
        jar.get(&config.access_cookie).map(|c| c.value().to_string()),
        jar.get(&config.refresh_cookie).map(|c| c.value().to_string()),
    )
}

fn credential_cookie(name: &str, value: String, config: &GatewayConfig) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .build()
}

fn persist_rotation(jar: CookieJar, rotation: &CredentialRotation, config: &GatewayConfig) -> CookieJar {
    jar.add(credential_cookie(&config.access_cookie, rotation.access_token.clone(), config))
        .add(credential_cookie(&config.refresh_cookie, rotation.refresh_token.clone(), config))
}

fn clear_refused(jar: CookieJar, access: bool, refresh: bool, config: &GatewayConfig) -> CookieJar {
    let jar = if access {
        jar.remove(Cookie::build((config.access_cookie.clone(), "")).path("/"))
    } else {
        jar
    };
    if refresh {
        jar.remove(Cookie::build((config.refresh_cookie.clone(), "")).path("/"))
    } else {
        jar
    }
}

/// Rewrite the request's `Cookie` header so the storefront sees the rotated
/// pair instead of the expired access token and the spent refresh token.
fn forward_rotation(request: &mut Request, jar: &CookieJar, rotation: &CredentialRotation, config: &GatewayConfig) {
    let mut pairs: Vec<String> = jar
        .iter()
        .filter(|c| c.name() != config.access_cookie && c.name() != config.refresh_cookie)
        .map(|c| format!("{}={}", c.name(), c.value()))
        .collect();
    pairs.push(format!("{}={}", config.access_cookie, rotation.access_token));
    pairs.push(format!("{}={}", config.refresh_cookie, rotation.refresh_token));

    let headers = request.headers_mut();
    headers.remove(header::COOKIE);
    match HeaderValue::from_str(&pairs.join("; ")) {
        Ok(value) => {
            headers.insert(header::COOKIE, value);
        }
        Err(_) => {
            // The spent credentials are already gone from the request.
            warn!("rotated credentials are not a valid cookie header; forwarding without cookies");
        }
    }
}
