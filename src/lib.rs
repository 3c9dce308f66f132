// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Entra ID bearer-token authorization for Axum services.
//!
//! Validates access tokens issued by Microsoft Entra ID against the tenant's
//! published signing keys, turns them into an [`auth::Identity`] and gates
//! handlers on app roles.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, identity and role gates
//! - `config` - Environment configuration
//! - `state` - Shared application state

pub mod api;
pub mod auth;
pub mod config;
pub mod state;
