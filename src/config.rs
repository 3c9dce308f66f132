// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed settings built from
//! them at startup. Configuration errors surface once, before the listener
//! binds; nothing here is read per request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AAD_INSTANCE` | Identity provider authority base URL | `https://login.microsoftonline.com` |
//! | `ENTRA_TENANT_ID` | Tenant identifier expected in `tid` | Required |
//! | `ENTRA_CLIENT_ID` | Client identifier expected in `aud` | Required |
//! | `ENTRA_SCOPE` | Short name of the exposed API scope | `access_as_user` |
//! | `SCOPE_NAME` | Fully qualified scope name | `api://{client_id}/{ENTRA_SCOPE}` |
//! | `ENTRA_ISSUER` | Pinned `iss` value | Unset (presence only) |
//! | `ROLE_USER` | Claim value of the user role | `ROLE_USER` |
//! | `ROLE_CONTRIBUTOR` | Claim value of the contributor role | `ROLE_CONTRIBUTOR` |
//! | `ROLE_MEMBER` | Claim value of the member role | `ROLE_MEMBER` |
//! | `ROLE_ADMIN` | Claim value of the admin role | `ROLE_ADMIN` |
//! | `REQUIRED_SCOPES` | Scopes every token must carry (comma or space separated) | Empty |
//! | `REQUIRED_ROLES` | Roles every token must carry (comma or space separated) | Empty |
//! | `JWKS_TIMEOUT_SECS` | Timeout for discovery and key-set requests | `10` |
//! | `CLOCK_SKEW_SECS` | Leeway for `exp`/`nbf`/`iat` checks, at most `300` | `60` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use url::Url;

use crate::auth::RoleNames;

pub const AAD_INSTANCE_ENV: &str = "AAD_INSTANCE";
pub const TENANT_ID_ENV: &str = "ENTRA_TENANT_ID";
pub const CLIENT_ID_ENV: &str = "ENTRA_CLIENT_ID";
pub const SCOPE_ENV: &str = "ENTRA_SCOPE";
pub const SCOPE_NAME_ENV: &str = "SCOPE_NAME";
pub const ISSUER_ENV: &str = "ENTRA_ISSUER";
pub const ROLE_USER_ENV: &str = "ROLE_USER";
pub const ROLE_CONTRIBUTOR_ENV: &str = "ROLE_CONTRIBUTOR";
pub const ROLE_MEMBER_ENV: &str = "ROLE_MEMBER";
pub const ROLE_ADMIN_ENV: &str = "ROLE_ADMIN";
pub const REQUIRED_SCOPES_ENV: &str = "REQUIRED_SCOPES";
pub const REQUIRED_ROLES_ENV: &str = "REQUIRED_ROLES";
pub const JWKS_TIMEOUT_ENV: &str = "JWKS_TIMEOUT_SECS";
pub const CLOCK_SKEW_ENV: &str = "CLOCK_SKEW_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_AAD_INSTANCE: &str = "https://login.microsoftonline.com";
pub const DEFAULT_SCOPE: &str = "access_as_user";
pub const DEFAULT_JWKS_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Startup configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),
    #[error("environment variable {var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Settings consumed by the token verifier and the role gates.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Authority base, e.g. `https://login.microsoftonline.com`
    pub authority: Url,
    pub tenant_id: String,
    pub client_id: String,
    /// Fully qualified API scope requested by Swagger UI sign-in
    pub scope_name: String,
    /// When set, `iss` must equal this value exactly
    pub issuer: Option<String>,
    pub roles: RoleNames,
    pub required_scopes: Vec<String>,
    pub required_roles: Vec<String>,
    pub jwks_timeout: Duration,
    pub clock_skew_secs: u64,
}

impl AuthSettings {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let authority_raw = get(AAD_INSTANCE_ENV).unwrap_or_else(|| DEFAULT_AAD_INSTANCE.to_string());
        let authority = Url::parse(&authority_raw).map_err(|e| ConfigError::Invalid {
            var: AAD_INSTANCE_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(authority.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                var: AAD_INSTANCE_ENV,
                reason: format!("unsupported scheme '{}'", authority.scheme()),
            });
        }

        let tenant_id = get(TENANT_ID_ENV).ok_or(ConfigError::Missing(TENANT_ID_ENV))?;
        let client_id = get(CLIENT_ID_ENV).ok_or(ConfigError::Missing(CLIENT_ID_ENV))?;

        let scope = get(SCOPE_ENV).unwrap_or_else(|| DEFAULT_SCOPE.to_string());
        let scope_name = get(SCOPE_NAME_ENV).unwrap_or_else(|| format!("api://{client_id}/{scope}"));

        let defaults = RoleNames::default();
        let roles = RoleNames {
            user: get(ROLE_USER_ENV).unwrap_or(defaults.user),
            contributor: get(ROLE_CONTRIBUTOR_ENV).unwrap_or(defaults.contributor),
            member: get(ROLE_MEMBER_ENV).unwrap_or(defaults.member),
            admin: get(ROLE_ADMIN_ENV).unwrap_or(defaults.admin),
        };

        let jwks_timeout_secs = parse_u64(JWKS_TIMEOUT_ENV, get(JWKS_TIMEOUT_ENV), DEFAULT_JWKS_TIMEOUT_SECS)?;
        if jwks_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: JWKS_TIMEOUT_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let clock_skew_secs = parse_u64(CLOCK_SKEW_ENV, get(CLOCK_SKEW_ENV), DEFAULT_CLOCK_SKEW_SECS)?;
        if clock_skew_secs > MAX_CLOCK_SKEW_SECS {
            return Err(ConfigError::Invalid {
                var: CLOCK_SKEW_ENV,
                reason: format!("must be at most {MAX_CLOCK_SKEW_SECS}"),
            });
        }

        Ok(Self {
            authority,
            tenant_id,
            client_id,
            scope_name,
            issuer: get(ISSUER_ENV),
            roles,
            required_scopes: split_list(get(REQUIRED_SCOPES_ENV)),
            required_roles: split_list(get(REQUIRED_ROLES_ENV)),
            jwks_timeout: Duration::from_secs(jwks_timeout_secs),
            clock_skew_secs,
        })
    }

    /// `{authority}/{tenant}`, the base of every provider endpoint.
    pub fn tenant_authority(&self) -> String {
        format!(
            "{}/{}",
            self.authority.as_str().trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// OAuth2 authorization endpoint, used by Swagger UI sign-in.
    pub fn authorization_url(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.tenant_authority())
    }

    /// OAuth2 token endpoint, used by Swagger UI sign-in.
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.tenant_authority())
    }

    /// OpenID discovery document of the tenant's v2.0 endpoint.
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/v2.0/.well-known/openid-configuration",
            self.tenant_authority()
        )
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Listener and logging settings for the binary.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let log_format = match lookup(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Ok(Self {
            host,
            port,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        Some(value) => value.parse::<u64>().map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
