// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! Entra ID bearer-token authorization for the API.
//!
//! ## Auth Flow
//!
//! 1. The client signs in with Entra ID and obtains an access token for this API
//! 2. The client sends `Authorization: Bearer <token>`
//! 3. The server:
//!    - Checks `aud` and `tid` against configuration
//!    - Resolves the signing key by `kid` (discovery document + JWKS, cached)
//!    - Verifies the RS256 signature, expiry, not-before, issued-at, issuer and subject
//!    - Extracts:
//!      - `oid` → `Identity::id`
//!      - `roles` → app roles used by the role gates
//!
//! ## Security
//!
//! - Only RS256 is accepted
//! - Signing keys are cached for the life of the process and refreshed on an
//!   unknown `kid`
//! - Authentication failures are 401, missing roles are 403
//! - Rejection messages never include library or transport detail

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod identity;
pub mod jwks;
pub mod roles;
pub mod verifier;

pub use claims::{TrustedClaims, UnverifiedClaims};
pub use error::{AccessError, AuthError, ForbiddenError};
pub use extractor::{AdminUser, Auth, ContributorUser, MemberUser};
pub use gate::{require_admin_user, require_contributor_user, require_member_user, require_role, require_user};
pub use identity::Identity;
pub use jwks::{KeyCacheError, SigningKey, SigningKeyCache};
pub use roles::{Role, RoleNames};
pub use verifier::{EntraTokenVerifier, TokenVerifier};
