// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated user identity extracted from verified claims.

use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use super::claims::{role_values, TrustedClaims};
use super::error::AuthError;

/// The user making the current request.
///
/// Only [`Identity::from_claims`] creates one, so every `Identity` in the
/// process came from a token that passed verification. It lives for a
/// single request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    /// Entra object id (`oid` claim)
    id: String,
    /// Display name (`name` claim), empty when absent
    name: String,
    /// Sign-in name (`preferred_username` claim), empty when absent
    preferred_username: String,
    /// App roles granted to the user
    #[schema(value_type = Vec<String>)]
    roles: BTreeSet<String>,
}

impl Identity {
    /// Build the identity from a verified claim set.
    ///
    /// `oid` is required. `roles` that is absent or not an array yields an
    /// empty role set.
    pub fn from_claims(claims: &TrustedClaims) -> Result<Self, AuthError> {
        let id = claims
            .get_str("oid")
            .filter(|oid| !oid.is_empty())
            .ok_or_else(|| {
                tracing::debug!("Verified token has no usable 'oid' claim");
                AuthError::MissingSubject
            })?
            .to_string();

        Ok(Self {
            id,
            name: claims.get_str("name").unwrap_or_default().to_string(),
            preferred_username: claims
                .get_str("preferred_username")
                .unwrap_or_default()
                .to_string(),
            roles: role_values(claims.as_map())
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn preferred_username(&self) -> &str {
        &self.preferred_username
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Exact, case-sensitive membership test.
    pub fn has_role(&self, claim_value: &str) -> bool {
        self.roles.contains(claim_value)
    }
}
