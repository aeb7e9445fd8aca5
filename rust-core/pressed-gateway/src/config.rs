// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Gateway configuration, loaded from `PRESSED_*` environment variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use pressed_access::{RedirectTargets, RouteTable};

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Base URL of the auth provider (`/auth/v1/...` lives below it)
    pub auth_url: String,
    /// Base URL of the role store REST interface
    pub role_store_url: String,
    /// Service key sent as `apikey` to both backends
    #[serde(skip_serializing, default)]
    pub service_key: String,
    /// Table holding one `role` column per subject id
    pub role_table: String,
    /// Storefront renderer that allowed requests are forwarded to
    pub upstream_url: Option<String>,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub account_root: String,
    pub admin_root: String,
    pub login_path: String,
    pub unauthorized_path: String,
    /// Role cache TTL in seconds (0 = no cache)
    pub role_cache_ttl_secs: u64,
    pub role_cache_capacity: u64,
    /// Timeout for every outbound request
    pub request_timeout_secs: u64,
    /// Plaintext operator keys for `/_guard/*`; hashed on startup
    #[serde(skip_serializing, default)]
    pub ops_keys: Vec<String>,
    /// Mark credential cookies `Secure`
    pub secure_cookies: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth_url: String::new(),
            role_store_url: String::new(),
            service_key: String::new(),
            role_table: "profiles".to_string(),
            upstream_url: None,
            access_cookie: "sb-access-token".to_string(),
            refresh_cookie: "sb-refresh-token".to_string(),
            account_root: "/account".to_string(),
            admin_root: "/admin".to_string(),
            login_path: "/login".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            role_cache_ttl_secs: 0,
            role_cache_capacity: 10_000,
            request_timeout_secs: 5,
            ops_keys: Vec::new(),
            secure_cookies: true,
        }
    }
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let auth_url = get("PRESSED_AUTH_URL").ok_or(ConfigError::Missing("PRESSED_AUTH_URL"))?;
        parse_url("PRESSED_AUTH_URL", &auth_url)?;

        let role_store_url = match get("PRESSED_ROLE_STORE_URL") {
            Some(url) => {
                parse_url("PRESSED_ROLE_STORE_URL", &url)?;
                url
            }
            None => auth_url.clone(),
        };

        let upstream_url = get("PRESSED_UPSTREAM_URL");
        if let Some(url) = &upstream_url {
            parse_url("PRESSED_UPSTREAM_URL", url)?;
        }

        let config = Self {
            host: get("PRESSED_HOST").unwrap_or(defaults.host),
            port: parse_num("PRESSED_PORT", get("PRESSED_PORT"), defaults.port)?,
            auth_url,
            role_store_url,
            service_key: get("PRESSED_SERVICE_KEY").ok_or(ConfigError::Missing("PRESSED_SERVICE_KEY"))?,
            role_table: get("PRESSED_ROLE_TABLE").unwrap_or(defaults.role_table),
            upstream_url,
            access_cookie: get("PRESSED_ACCESS_COOKIE").unwrap_or(defaults.access_cookie),
            refresh_cookie: get("PRESSED_REFRESH_COOKIE").unwrap_or(defaults.refresh_cookie),
            account_root: get("PRESSED_ACCOUNT_ROOT").unwrap_or(defaults.account_root),
            admin_root: get("PRESSED_ADMIN_ROOT").unwrap_or(defaults.admin_root),
            login_path: get("PRESSED_LOGIN_PATH").unwrap_or(defaults.login_path),
            unauthorized_path: get("PRESSED_UNAUTHORIZED_PATH").unwrap_or(defaults.unauthorized_path),
            role_cache_ttl_secs: parse_num(
                "PRESSED_ROLE_CACHE_TTL_SECS",
                get("PRESSED_ROLE_CACHE_TTL_SECS"),
                defaults.role_cache_ttl_secs,
            )?,
            role_cache_capacity: parse_num(
                "PRESSED_ROLE_CACHE_CAPACITY",
                get("PRESSED_ROLE_CACHE_CAPACITY"),
                defaults.role_cache_capacity,
            )?,
            request_timeout_secs: parse_num(
                "PRESSED_REQUEST_TIMEOUT_SECS",
                get("PRESSED_REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout_secs,
            )?,
            ops_keys: get("PRESSED_OPS_KEYS")
                .map(|keys| {
                    keys.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            secure_cookies: parse_bool("PRESSED_SECURE_COOKIES", get("PRESSED_SECURE_COOKIES"), true)?,
        };

        config.route_table()?;
        config.redirect_targets()?;
        if config.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "PRESSED_REQUEST_TIMEOUT_SECS",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    /// The route table described by the configured roots.
    pub fn route_table(&self) -> Result<RouteTable, ConfigError> {
        RouteTable::new(&self.account_root, &self.admin_root).map_err(|e| ConfigError::Invalid {
            var: "PRESSED_ACCOUNT_ROOT/PRESSED_ADMIN_ROOT",
            reason: e.to_string(),
        })
    }

    /// Login and unauthorized targets. Both must be plain local paths that
    /// fit in a `Location` header and sit outside the protected roots, or
    /// every denial would redirect into another denial.
    pub fn redirect_targets(&self) -> Result<RedirectTargets, ConfigError> {
        let routes = self.route_table()?;
        for (var, path) in [
            ("PRESSED_LOGIN_PATH", &self.login_path),
            ("PRESSED_UNAUTHORIZED_PATH", &self.unauthorized_path),
        ] {
            if !path.starts_with('/') || path.starts_with("//") || path.contains(['?', '#']) {
                return Err(ConfigError::Invalid {
                    var,
                    reason: format!("{path:?} is not a plain local path"),
                });
            }
            if !path.chars().all(|c| c.is_ascii_graphic()) {
                return Err(ConfigError::Invalid {
                    var,
                    reason: format!("{path:?} must be printable ASCII without spaces"),
                });
            }
            let class = routes.classify(path);
            if class.is_protected() {
                return Err(ConfigError::Invalid {
                    var,
                    reason: format!("{path:?} lies inside the {class} root and would redirect to itself"),
                });
            }
        }
        Ok(RedirectTargets {
            login_path: self.login_path.clone(),
            unauthorized_path: self.unauthorized_path.clone(),
            ..RedirectTargets::default()
        })
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|var| map.get(var).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("PRESSED_AUTH_URL", "https://project.example.co"),
        ("PRESSED_SERVICE_KEY", "service-key"),
    ];

    #[test]
    fn test_defaults_with_required_vars() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.role_store_url, "https://project.example.co");
        assert_eq!(config.role_table, "profiles");
        assert_eq!(config.access_cookie, "sb-access-token");
        assert_eq!(config.role_cache_ttl_secs, 0);
        assert!(config.secure_cookies);
        assert!(config.upstream_url.is_none());
        assert!(config.ops_keys.is_empty());
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("PRESSED_AUTH_URL"));
        assert_eq!(
            load(&[REQUIRED[0]]).unwrap_err(),
            ConfigError::Missing("PRESSED_SERVICE_KEY")
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PRESSED_PORT", "9000"),
            ("PRESSED_ROLE_STORE_URL", "https://roles.example.co"),
            ("PRESSED_ADMIN_ROOT", "/backoffice"),
            ("PRESSED_ROLE_CACHE_TTL_SECS", "30"),
            ("PRESSED_OPS_KEYS", "alpha, beta,,"),
            ("PRESSED_SECURE_COOKIES", "false"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.role_store_url, "https://roles.example.co");
        assert_eq!(config.admin_root, "/backoffice");
        assert_eq!(config.role_cache_ttl_secs, 30);
        assert_eq!(config.ops_keys, vec!["alpha", "beta"]);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PRESSED_PORT", "eighty"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { var: "PRESSED_PORT", .. }
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("PRESSED_ADMIN_ROOT", "admin"));
        assert!(matches!(load(&vars).unwrap_err(), ConfigError::Invalid { .. }));

        let mut vars = REQUIRED.to_vec();
        vars.push(("PRESSED_LOGIN_PATH", "https://evil.example/login"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { var: "PRESSED_LOGIN_PATH", .. }
        ));

        let vars = [("PRESSED_AUTH_URL", "ftp://x"), ("PRESSED_SERVICE_KEY", "k")];
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { var: "PRESSED_AUTH_URL", .. }
        ));
    }

    #[test]
    fn test_redirect_paths_must_fit_a_header() {
        for (var, value) in [
            ("PRESSED_LOGIN_PATH", "/connexion-é"),
            ("PRESSED_LOGIN_PATH", "/log in"),
            ("PRESSED_UNAUTHORIZED_PATH", "/denied\r\nx: y"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((var, value));
            assert!(
                matches!(load(&vars).unwrap_err(), ConfigError::Invalid { var: v, .. } if v == var),
                "{value:?}"
            );
        }
    }

    #[test]
    fn test_redirect_paths_outside_protected_roots() {
        for (var, value) in [
            ("PRESSED_LOGIN_PATH", "/account/login"),
            ("PRESSED_LOGIN_PATH", "/admin"),
            ("PRESSED_UNAUTHORIZED_PATH", "/admin/denied"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((var, value));
            assert!(
                matches!(load(&vars).unwrap_err(), ConfigError::Invalid { var: v, .. } if v == var),
                "{value:?}"
            );
        }

        let mut vars = REQUIRED.to_vec();
        vars.extend([("PRESSED_ADMIN_ROOT", "/backoffice"), ("PRESSED_LOGIN_PATH", "/admin/login")]);
        assert_eq!(load(&vars).unwrap().login_path, "/admin/login");
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PRESSED_OPS_KEYS", "top-secret"));
        let json = serde_json::to_string(&load(&vars).unwrap()).unwrap();
        assert!(!json.contains("service-key"));
        assert!(!json.contains("top-secret"));
    }
}
