// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization errors.
//!
//! Two classes leave this module:
//!
//! - [`AuthError`]: the caller could not be authenticated (HTTP 401).
//! - [`ForbiddenError`]: the caller is known but lacks a role (HTTP 403).
//!
//! Messages are curated. Library and transport errors are logged where they
//! occur and never rendered into a response body.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::roles::Role;

/// Authentication failure.
///
/// Every variant maps to `401 Unauthorized` with `WWW-Authenticate: Bearer`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer token was presented
    #[error("Bearer token is missing.")]
    MissingToken,
    /// Authorization header is not `Bearer <token>`
    #[error("Invalid authorization header format (expected 'Bearer <token>').")]
    InvalidAuthHeader,
    /// Token segments or payload could not be decoded
    #[error("The token is malformed.")]
    MalformedToken,
    /// `exp` is in the past
    #[error("The token has expired.")]
    TokenExpired,
    /// Audience, tenant, issuer, not-before, issued-at or a required claim is wrong
    #[error("The token has invalid claims.")]
    InvalidClaims,
    /// Token header could not be decoded
    #[error("Error decoding token headers.")]
    InvalidHeader,
    /// Token header carries no `kid`
    #[error("The token does not contain a valid 'kid' in its header.")]
    MissingKeyId,
    /// Signing key could not be resolved from the identity provider
    #[error("Unable to retrieve the key for token validation.")]
    SigningKeyUnavailable,
    /// Signature or algorithm rejected
    #[error("The token is invalid.")]
    InvalidToken,
    /// Anything the classifier does not recognise
    #[error("Unable to decode the token.")]
    Undecodable,
    /// Verified claims carry no `oid`
    #[error("Unable to extract user details from token.")]
    MissingSubject,
    /// A configured scope is absent from `scp`
    #[error("Missing a required scope.")]
    MissingScope,
    /// A configured role is absent from `roles`
    #[error("Missing a required role.")]
    MissingRole,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims => "invalid_claims",
            AuthError::InvalidHeader => "invalid_token_header",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::SigningKeyUnavailable => "signing_key_unavailable",
            AuthError::InvalidToken => "invalid_token",
            AuthError::Undecodable => "undecodable_token",
            AuthError::MissingSubject => "missing_subject",
            AuthError::MissingScope => "missing_scope",
            AuthError::MissingRole => "missing_role",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        rejection(self.status_code(), self.to_string(), self.error_code())
    }
}

/// The caller is authenticated but lacks the role a handler requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} privileges required", .role.label())]
pub struct ForbiddenError {
    role: Role,
}

impl ForbiddenError {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    /// The role that was missing.
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn error_code(&self) -> &'static str {
        "insufficient_privileges"
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }
}

impl IntoResponse for ForbiddenError {
    fn into_response(self) -> Response {
        rejection(self.status_code(), self.to_string(), self.error_code())
    }
}

/// Rejection of a role-gated extractor: either class of failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error(transparent)]
    Forbidden(#[from] ForbiddenError),
}

impl AccessError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::Unauthorized(err) => err.status_code(),
            AccessError::Forbidden(err) => err.status_code(),
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        match self {
            AccessError::Unauthorized(err) => err.into_response(),
            AccessError::Forbidden(err) => err.into_response(),
        }
    }
}

fn rejection(status: StatusCode, message: String, code: &str) -> Response {
    let body = Json(ErrorBody {
        error: message,
        error_code: code.to_string(),
    });
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}
