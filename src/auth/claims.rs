// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claim sets and the checks applied to them.
//!
//! Two claim types exist on purpose:
//!
//! - [`UnverifiedClaims`] is the payload read *before* the signature is
//!   checked. It only feeds the audience/tenant pre-check.
//! - [`TrustedClaims`] is only built by the verifier after signature and
//!   claim validation succeed. Identity extraction accepts nothing else.

use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};

use super::error::AuthError;
use super::jwks::decode_base64url;
use crate::config::AuthSettings;

/// Number of dot-separated segments in a compact JWS.
const JWT_SEGMENTS: usize = 3;

/// Claims that every accepted token must carry.
///
/// `iat` is checked separately by [`validate_issued_at`] because
/// `jsonwebtoken` only tracks presence of the registered claims below.
const REQUIRED_CLAIMS: [&str; 5] = ["exp", "nbf", "iss", "sub", "aud"];

/// Payload decoded without signature verification. Not trusted.
#[derive(Debug, Clone)]
pub struct UnverifiedClaims(Map<String, Value>);

impl UnverifiedClaims {
    /// Decode the payload segment of `token` without checking its signature.
    pub fn peek(token: &str) -> Result<Self, AuthError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != JWT_SEGMENTS {
            return Err(AuthError::MalformedToken);
        }
        let payload = decode_base64url(segments[1]).map_err(|e| {
            tracing::debug!(error = %e, "Token payload is not base64url");
            AuthError::MalformedToken
        })?;
        match serde_json::from_slice::<Value>(&payload) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(AuthError::MalformedToken),
            Err(e) => {
                tracing::debug!(error = %e, "Token payload is not a JSON object");
                Err(AuthError::MalformedToken)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// `tid` claim, when it is a string.
    pub fn tenant(&self) -> Option<&str> {
        self.0.get("tid").and_then(Value::as_str)
    }
}

/// Claims of a token whose signature and registered claims were verified.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustedClaims(Map<String, Value>);

impl TrustedClaims {
    /// Only the verifier (and in-crate tests) may vouch for a claim set.
    pub(crate) fn from_verified(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String value of `name`, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Pre-check run before any key lookup: the token must be addressed to this
/// client and issued for this tenant.
///
/// `aud` may be a string or an array; either way the client id must appear as
/// an exact value. `tid` must equal the tenant id.
pub fn check_audience_and_tenant(
    claims: &UnverifiedClaims,
    client_id: &str,
    tenant_id: &str,
) -> Result<(), AuthError> {
    let audience_ok = claims
        .get("aud")
        .is_some_and(|aud| audience_contains(aud, client_id));
    let tenant_ok = claims.tenant() == Some(tenant_id);

    if audience_ok && tenant_ok {
        Ok(())
    } else {
        tracing::debug!(audience_ok, tenant_ok, "Token failed audience/tenant pre-check");
        Err(AuthError::InvalidClaims)
    }
}

fn audience_contains(aud: &Value, client_id: &str) -> bool {
    match aud {
        Value::String(value) => value == client_id,
        Value::Array(values) => values.iter().any(|v| v.as_str() == Some(client_id)),
        _ => false,
    }
}

/// Signature validation rules: RS256 only, audience pinned to the client id,
/// registered claims required, `nbf` enforced, issuer pinned when configured.
pub fn validation(settings: &AuthSettings) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[settings.client_id.as_str()]);
    validation.set_required_spec_claims(&REQUIRED_CLAIMS);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = settings.clock_skew_secs;
    if let Some(issuer) = &settings.issuer {
        validation.set_issuer(&[issuer.as_str()]);
    }
    validation
}

/// `iat` must be present, numeric, and not later than `now + leeway`.
pub fn validate_issued_at(
    claims: &Map<String, Value>,
    leeway: u64,
    now: i64,
) -> Result<(), AuthError> {
    let issued_at = claims
        .get("iat")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .ok_or(AuthError::InvalidClaims)?;

    if issued_at > now.saturating_add(i64::try_from(leeway).unwrap_or(i64::MAX)) {
        tracing::debug!(issued_at, now, "Token issued in the future");
        return Err(AuthError::InvalidClaims);
    }
    Ok(())
}

/// Every scope in `required` must appear in the space-separated `scp` claim.
pub fn validate_scopes(claims: &Map<String, Value>, required: &[String]) -> Result<(), AuthError> {
    if required.is_empty() {
        return Ok(());
    }
    let granted: Vec<&str> = claims
        .get("scp")
        .and_then(Value::as_str)
        .map(|scp| scp.split(' ').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if required.iter().all(|scope| granted.contains(&scope.as_str())) {
        Ok(())
    } else {
        Err(AuthError::MissingScope)
    }
}

/// Every role in `required` must appear in the `roles` claim array.
pub fn validate_roles(claims: &Map<String, Value>, required: &[String]) -> Result<(), AuthError> {
    if required.is_empty() {
        return Ok(());
    }
    let granted = role_values(claims);
    if required.iter().all(|role| granted.contains(&role.as_str())) {
        Ok(())
    } else {
        Err(AuthError::MissingRole)
    }
}

/// String elements of the `roles` claim. Absent or non-array yields nothing.
pub(crate) fn role_values(claims: &Map<String, Value>) -> Vec<&str> {
    claims
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| roles.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
