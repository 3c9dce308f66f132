// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{
        AuthorizationCode, Flow, HttpAuthScheme, HttpBuilder, OAuth2, Scopes, SecurityRequirement,
        SecurityScheme,
    },
    Modify, OpenApi,
};
use utoipa_swagger_ui::{oauth, SwaggerUi};

use crate::{auth::Identity, config::AuthSettings, state::AppState};

pub mod secure;
pub mod users;

/// Name of the OAuth2 scheme Swagger UI signs in with.
pub const OAUTH_SCHEME: &str = "entra";

pub fn router(state: AppState) -> Router {
    let docs = swagger_ui(state.swagger_oauth.as_deref());

    let v1_routes = Router::new()
        .route("/secure", get(secure::get_secure))
        .route("/users/me", get(users::get_current_user))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(docs)
        .layer(TraceLayer::new_for_http())
}

/// The OpenAPI document, with the Entra sign-in scheme when configured.
pub fn api_doc(oauth: Option<&SwaggerOAuth>) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if let Some(oauth) = oauth {
        oauth.modify(&mut doc);
    }
    doc
}

fn swagger_ui(oauth: Option<&SwaggerOAuth>) -> SwaggerUi {
    let ui = SwaggerUi::new("/docs").url("/api-doc/openapi.json", api_doc(oauth));
    match oauth {
        Some(oauth) => ui.oauth(
            oauth::Config::new()
                .client_id(&oauth.client_id)
                .scopes(vec![oauth.scope_name.clone()])
                .use_pkce_with_authorization_code_grant(true),
        ),
        None => ui,
    }
}

/// Registers the `bearer` scheme referenced by the protected paths.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Authorization-code sign-in (with PKCE in Swagger UI) against the tenant.
#[derive(Debug, Clone)]
pub struct SwaggerOAuth {
    pub client_id: String,
    pub scope_name: String,
    pub authorization_url: String,
    pub token_url: String,
}

impl SwaggerOAuth {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            scope_name: settings.scope_name.clone(),
            authorization_url: settings.authorization_url(),
            token_url: settings.token_url(),
        }
    }
}

impl Modify for SwaggerOAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            OAUTH_SCHEME,
            SecurityScheme::OAuth2(OAuth2::new([Flow::AuthorizationCode(AuthorizationCode::new(
                self.authorization_url.as_str(),
                self.token_url.as_str(),
                Scopes::one(self.scope_name.as_str(), "Access the API as the signed-in user"),
            ))])),
        );

        // Every bearer-protected operation also accepts the OAuth2 token
        for item in openapi.paths.paths.values_mut() {
            let operations = [
                &mut item.get,
                &mut item.put,
                &mut item.post,
                &mut item.delete,
                &mut item.patch,
            ];
            for operation in operations.into_iter().flatten() {
                if let Some(security) = operation.security.as_mut() {
                    security.push(SecurityRequirement::new(OAUTH_SCHEME, [self.scope_name.as_str()]));
                }
            }
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(secure::get_secure, users::get_current_user),
    components(schemas(Identity, secure::SecureResponse)),
    modifiers(&BearerSecurity),
    tags(
        (name = "Example", description = "Example protected endpoint"),
        (name = "Users", description = "Current user")
    )
)]
pub struct ApiDoc;
