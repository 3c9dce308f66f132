// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! [`EntraTokenVerifier`] runs the stages below in order and stops at the
//! first failure:
//!
//! 1. Reject an empty token.
//! 2. Peek at the unverified payload: `aud` and `tid` must match.
//! 3. Decode the header: RS256 with a `kid`.
//! 4. Resolve the signing key (refreshing the cache once on a miss).
//! 5. Verify the signature and registered claims, then `iat`.
//! 6. Enforce configured scopes and roles.
//!
//! Handlers and extractors depend on the [`TokenVerifier`] trait only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm};
use serde_json::{Map, Value};

use super::claims::{self, TrustedClaims, UnverifiedClaims};
use super::error::AuthError;
use super::jwks::SigningKeyCache;
use crate::config::AuthSettings;

/// Turns a raw bearer token into trusted claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TrustedClaims, AuthError>;
}

/// Verifier for Entra ID access tokens.
#[derive(Clone)]
pub struct EntraTokenVerifier {
    settings: Arc<AuthSettings>,
    keys: Arc<SigningKeyCache>,
}

impl EntraTokenVerifier {
    pub fn new(settings: Arc<AuthSettings>, keys: Arc<SigningKeyCache>) -> Self {
        Self { settings, keys }
    }

    async fn verify_token(&self, token: &str) -> Result<TrustedClaims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let unverified = UnverifiedClaims::peek(token)?;
        claims::check_audience_and_tenant(&unverified, &self.settings.client_id, &self.settings.tenant_id)?;

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode token header");
            AuthError::InvalidHeader
        })?;
        if header.alg != Algorithm::RS256 {
            tracing::debug!(alg = ?header.alg, "Token uses a disallowed algorithm");
            return Err(AuthError::InvalidToken);
        }
        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::MissingKeyId)?;

        let key = self.keys.resolve(kid).await.map_err(|e| {
            tracing::warn!(error = %e, kid, "Unable to resolve signing key");
            AuthError::SigningKeyUnavailable
        })?;

        let validation = claims::validation(&self.settings);
        let data = decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
            .map_err(|e| classify(&e))?;

        let leeway = self.settings.clock_skew_secs;
        claims::validate_issued_at(&data.claims, leeway, Utc::now().timestamp())?;
        claims::validate_scopes(&data.claims, &self.settings.required_scopes)?;
        claims::validate_roles(&data.claims, &self.settings.required_roles)?;

        Ok(TrustedClaims::from_verified(data.claims))
    }
}

#[async_trait]
impl TokenVerifier for EntraTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TrustedClaims, AuthError> {
        self.verify_token(token).await
    }
}

/// Map a `jsonwebtoken` failure to a curated error, logging the original.
fn classify(err: &jsonwebtoken::errors::Error) -> AuthError {
    let classified = match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => AuthError::MalformedToken,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidToken,
        _ => AuthError::Undecodable,
    };
    tracing::debug!(error = %err, code = classified.error_code(), "Token rejected");
    classified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(kind: ErrorKind) -> jsonwebtoken::errors::Error {
        jsonwebtoken::errors::Error::from(kind)
    }

    #[test]
    fn expiry_is_its_own_class() {
        assert_eq!(classify(&error(ErrorKind::ExpiredSignature)), AuthError::TokenExpired);
    }

    #[test]
    fn semantic_mismatches_are_invalid_claims() {
        for kind in [
            ErrorKind::InvalidAudience,
            ErrorKind::InvalidIssuer,
            ErrorKind::InvalidSubject,
            ErrorKind::ImmatureSignature,
            ErrorKind::MissingRequiredClaim("exp".to_string()),
        ] {
            assert_eq!(classify(&error(kind)), AuthError::InvalidClaims);
        }
    }

    #[test]
    fn signature_failures_are_invalid_token() {
        assert_eq!(classify(&error(ErrorKind::InvalidSignature)), AuthError::InvalidToken);
        assert_eq!(classify(&error(ErrorKind::InvalidAlgorithm)), AuthError::InvalidToken);
    }

    #[test]
    fn structural_failures_are_malformed() {
        assert_eq!(classify(&error(ErrorKind::InvalidToken)), AuthError::MalformedToken);
    }

    #[test]
    fn anything_else_is_undecodable() {
        assert_eq!(classify(&error(ErrorKind::InvalidKeyFormat)), AuthError::Undecodable);
    }
}
