// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Example protected endpoint.

use axum::{extract::Query, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{Auth, Identity};

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

/// Paging parameters for GET /v1/secure
#[derive(Debug, Deserialize, IntoParams)]
pub struct SecureQuery {
    /// Page number
    #[serde(default = "default_page")]
    #[param(default = 1)]
    pub page: u32,
    /// Page size
    #[serde(default = "default_page_size")]
    #[param(default = 20)]
    pub page_size: u32,
}

/// Response for GET /v1/secure
#[derive(Debug, Serialize, ToSchema)]
pub struct SecureResponse {
    pub message: String,
    pub page: u32,
    pub page_size: u32,
    /// The caller's identity
    pub user: Identity,
}

/// Greet the authenticated caller.
#[utoipa::path(
    get,
    path = "/v1/secure",
    tag = "Example",
    security(("bearer" = [])),
    params(SecureQuery),
    responses(
        (status = 200, description = "Greeting for the caller", body = SecureResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_secure(Auth(user): Auth, Query(query): Query<SecureQuery>) -> Json<SecureResponse> {
    Json(SecureResponse {
        message: "Hello, World!".to_string(),
        page: query.page,
        page_size: query.page_size,
        user,
    })
}
