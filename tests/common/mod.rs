// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Map, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use entra_bearer_auth::auth::{EntraTokenVerifier, SigningKeyCache};
use entra_bearer_auth::config::AuthSettings;

pub const TENANT_ID: &str = "11111111-2222-3333-4444-555555555555";
pub const CLIENT_ID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";
pub const KID: &str = "test-key-1";
pub const ISSUER: &str = "https://login.microsoftonline.com/11111111-2222-3333-4444-555555555555/v2.0";

/// An RSA key pair used to sign test tokens.
pub struct TestKey {
    pub private: RsaPrivateKey,
    pub encoding: EncodingKey,
}

impl TestKey {
    fn generate() -> Self {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("key");
        let pem = private.to_pkcs1_pem(Default::default()).expect("pem");
        let encoding = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("enc");
        Self { private, encoding }
    }

    /// JWK record for this key under `kid`.
    pub fn jwk(&self, kid: &str) -> Value {
        let public = self.private.to_public_key();
        json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": kid,
            "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        })
    }
}

/// Key generation is slow, so each test binary shares two keys.
pub fn signing_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

pub fn other_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

pub fn discovery_path() -> String {
    format!("/{TENANT_ID}/v2.0/.well-known/openid-configuration")
}

pub fn keys_path() -> String {
    format!("/{TENANT_ID}/discovery/v2.0/keys")
}

/// Start a mock identity provider publishing `jwks`.
pub async fn mock_idp(jwks: Vec<Value>) -> MockServer {
    let server = MockServer::start().await;
    let jwks_uri = format!("{}{}", server.uri(), keys_path());

    Mock::given(method("GET"))
        .and(path(discovery_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": ISSUER,
            "jwks_uri": jwks_uri,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(keys_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": jwks })))
        .mount(&server)
        .await;

    server
}

/// Number of key-set downloads the mock provider has served.
pub async fn key_set_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == keys_path())
        .count()
}

/// Settings pointing at `authority` with optional overrides.
pub fn settings_with(authority: &str, overrides: &[(&str, &str)]) -> AuthSettings {
    let mut env: HashMap<String, String> = HashMap::from([
        ("AAD_INSTANCE".to_string(), authority.to_string()),
        ("ENTRA_TENANT_ID".to_string(), TENANT_ID.to_string()),
        ("ENTRA_CLIENT_ID".to_string(), CLIENT_ID.to_string()),
        ("CLOCK_SKEW_SECS".to_string(), "5".to_string()),
    ]);
    for (name, value) in overrides {
        env.insert(name.to_string(), value.to_string());
    }
    AuthSettings::from_lookup(move |name: &str| env.get(name).cloned()).expect("settings")
}

pub fn settings(authority: &str) -> AuthSettings {
    settings_with(authority, &[])
}

pub fn verifier_for(settings: AuthSettings) -> (EntraTokenVerifier, Arc<SigningKeyCache>) {
    let keys = Arc::new(SigningKeyCache::from_settings(&settings).expect("cache"));
    (EntraTokenVerifier::new(Arc::new(settings), keys.clone()), keys)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A claim set that passes every check.
pub fn valid_claims() -> Map<String, Value> {
    let now = now();
    match json!({
        "aud": CLIENT_ID,
        "tid": TENANT_ID,
        "iss": ISSUER,
        "sub": "subject-1",
        "oid": "object-1",
        "name": "Ada Lovelace",
        "preferred_username": "ada@example.com",
        "roles": ["ROLE_USER"],
        "scp": "access_as_user",
        "iat": now - 10,
        "nbf": now - 10,
        "exp": now + 600,
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn claims_with(overrides: Value) -> Map<String, Value> {
    let mut claims = valid_claims();
    if let Value::Object(extra) = overrides {
        for (name, value) in extra {
            if value.is_null() {
                claims.remove(&name);
            } else {
                claims.insert(name, value);
            }
        }
    }
    claims
}

/// Sign `claims` with RS256 under `kid`.
pub fn mint(key: &TestKey, kid: Option<&str>, claims: &Map<String, Value>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    jsonwebtoken::encode(&header, claims, &key.encoding).expect("token")
}

pub fn mint_valid() -> String {
    mint(signing_key(), Some(KID), &valid_claims())
}
