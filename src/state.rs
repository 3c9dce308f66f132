// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::SwaggerOAuth;
use crate::auth::{EntraTokenVerifier, KeyCacheError, RoleNames, SigningKeyCache, TokenVerifier};
use crate::config::AuthSettings;

#[derive(Clone)]
pub struct AppState {
    /// Token verifier shared by all requests
    pub verifier: Arc<dyn TokenVerifier>,
    /// Claim values for the role gates
    pub roles: Arc<RoleNames>,
    /// Swagger UI sign-in details, when the docs should offer it
    pub swagger_oauth: Option<Arc<SwaggerOAuth>>,
}

impl AppState {
    pub fn new(verifier: Arc<dyn TokenVerifier>, roles: RoleNames) -> Self {
        Self {
            verifier,
            roles: Arc::new(roles),
            swagger_oauth: None,
        }
    }

    pub fn with_swagger_oauth(mut self, oauth: SwaggerOAuth) -> Self {
        self.swagger_oauth = Some(Arc::new(oauth));
        self
    }

    /// Wire the Entra verifier and an empty key cache for `settings`.
    pub fn from_settings(settings: AuthSettings) -> Result<Self, KeyCacheError> {
        let keys = Arc::new(SigningKeyCache::from_settings(&settings)?);
        let roles = settings.roles.clone();
        let oauth = SwaggerOAuth::from_settings(&settings);
        let verifier = EntraTokenVerifier::new(Arc::new(settings), keys);
        Ok(Self::new(Arc::new(verifier), roles).with_swagger_oauth(oauth))
    }
}
