// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role gates applied to an authenticated [`Identity`].
//!
//! A gate failure is a [`ForbiddenError`] (403): the caller is known but not
//! privileged enough. It is never reported as an authentication failure.

use super::error::ForbiddenError;
use super::identity::Identity;
use super::roles::{Role, RoleNames};

/// Pass `identity` through when it holds `role`'s claim value exactly.
pub fn require_role(identity: Identity, role: Role, names: &RoleNames) -> Result<Identity, ForbiddenError> {
    if identity.has_role(names.claim_value(role)) {
        Ok(identity)
    } else {
        tracing::debug!(user_id = identity.id(), required = %role, "Role gate rejected request");
        Err(ForbiddenError::new(role))
    }
}

/// Any authenticated identity.
pub fn require_user(identity: Identity) -> Identity {
    identity
}

pub fn require_contributor_user(identity: Identity, names: &RoleNames) -> Result<Identity, ForbiddenError> {
    require_role(identity, Role::Contributor, names)
}

pub fn require_member_user(identity: Identity, names: &RoleNames) -> Result<Identity, ForbiddenError> {
    require_role(identity, Role::Member, names)
}

pub fn require_admin_user(identity: Identity, names: &RoleNames) -> Result<Identity, ForbiddenError> {
    require_role(identity, Role::Admin, names)
}
