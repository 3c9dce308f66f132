// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use `Auth` in handlers that need any signed-in user, or one of the role
//! extractors to gate on an app role:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is Identity
//! }
//!
//! async fn admin_handler(AdminUser(user): AdminUser) -> impl IntoResponse {
//!     // only reached when the token carries the admin role
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::error::{AccessError, AuthError};
use super::gate;
use super::identity::Identity;
use crate::state::AppState;

/// Extract the bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively. An absent header, an empty value
/// and a bare `Bearer` all count as a missing token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?
        .trim();

    if value.is_empty() || value.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Verify the request's token and build its identity.
///
/// The identity is cached in request extensions so that stacked extractors
/// verify the token only once.
async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<Identity, AuthError> {
    if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
        return Ok(identity);
    }

    let token = bearer_token(&parts.headers)?;
    let claims = state.verifier.verify(token).await?;
    let identity = Identity::from_claims(&claims)?;

    parts.extensions.insert(identity.clone());
    Ok(identity)
}

/// Extractor for any authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(Auth(user): Auth) -> Json<Identity> {
///     Json(user)
/// }
/// ```
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = authenticate(parts, state).await?;
        Ok(Auth(gate::require_user(identity)))
    }
}

/// Extractor that requires the contributor role.
pub struct ContributorUser(pub Identity);

impl FromRequestParts<AppState> for ContributorUser {
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = authenticate(parts, state).await?;
        Ok(ContributorUser(gate::require_contributor_user(identity, &state.roles)?))
    }
}

/// Extractor that requires the member role.
pub struct MemberUser(pub Identity);

impl FromRequestParts<AppState> for MemberUser {
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = authenticate(parts, state).await?;
        Ok(MemberUser(gate::require_member_user(identity, &state.roles)?))
    }
}

/// Extractor that requires the admin role.
pub struct AdminUser(pub Identity);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = authenticate(parts, state).await?;
        Ok(AdminUser(gate::require_admin_user(identity, &state.roles)?))
    }
}
