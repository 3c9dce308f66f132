// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application roles for authorization.

/// Application roles recognised by the access gates.
///
/// Entra ID places app roles in the token's `roles` claim. Each variant maps
/// to one claim value through [`RoleNames`]; matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Baseline signed-in user
    User,
    /// May create and edit content
    Contributor,
    /// Organisation member
    Member,
    /// Full administrative access
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Contributor, Role::Member, Role::Admin];

    /// Claim value used when no override is configured.
    pub fn default_claim_value(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Contributor => "ROLE_CONTRIBUTOR",
            Role::Member => "ROLE_MEMBER",
            Role::Admin => "ROLE_ADMIN",
        }
    }

    /// Human-readable name, used in forbidden messages.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Contributor => "Contributor",
            Role::Member => "Member",
            Role::Admin => "Admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Claim values that identify each [`Role`] in a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNames {
    pub user: String,
    pub contributor: String,
    pub member: String,
    pub admin: String,
}

impl RoleNames {
    /// The claim value that grants `role`.
    pub fn claim_value(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user,
            Role::Contributor => &self.contributor,
            Role::Member => &self.member,
            Role::Admin => &self.admin,
        }
    }
}

impl Default for RoleNames {
    fn default() -> Self {
        Self {
            user: Role::User.default_claim_value().to_string(),
            contributor: Role::Contributor.default_claim_value().to_string(),
            member: Role::Member.default_claim_value().to_string(),
            admin: Role::Admin.default_claim_value().to_string(),
        }
    }
}
