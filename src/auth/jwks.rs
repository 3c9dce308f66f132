// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing-key cache backed by the identity provider's JWKS.
//!
//! ## Behaviour
//!
//! - Keys are looked up by `kid`. A hit never touches the network.
//! - A miss triggers one refresh: the tenant's OpenID discovery document is
//!   fetched for `jwks_uri`, then the key set itself. Every record is decoded
//!   and inserted, replacing keys that share a `kid`.
//! - After the refresh the lookup is retried once. A second miss is final.
//! - Keys are never evicted; the cache lives as long as the process.
//!
//! ## Concurrency
//!
//! Lookups take a read lock. A refresh parses the whole key set before taking
//! the write lock, so a failed or cancelled refresh leaves the cache as it
//! was. Racing refreshes converge because inserts are idempotent per `kid`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use jsonwebtoken::DecodingKey;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::AuthSettings;

/// Base64url that accepts input with or without trailing `=` padding.
///
/// RFC 7515 forbids padding in JWS segments and JWK members, but some
/// providers emit it anyway.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode base64url, tolerating missing or present padding.
pub(crate) fn decode_base64url(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(input.as_bytes())
}

/// Key cache failure. Carries detail for logs; callers see a curated error.
#[derive(Debug, thiserror::Error)]
pub enum KeyCacheError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("failed to fetch discovery document: {0}")]
    Discovery(#[source] reqwest::Error),
    #[error("discovery endpoint returned HTTP {0}")]
    DiscoveryStatus(StatusCode),
    #[error("discovery document has no jwks_uri")]
    MissingJwksUri,
    #[error("failed to fetch key set: {0}")]
    KeySet(#[source] reqwest::Error),
    #[error("key set endpoint returned HTTP {0}")]
    KeySetStatus(StatusCode),
    #[error("malformed key record {kid:?}: {reason}")]
    MalformedKey { kid: Option<String>, reason: String },
    #[error("no signing key with kid {0:?} after refresh")]
    UnknownKeyId(String),
}

/// RSA public key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Build from the base64url `n` and `e` members of a JWK.
    ///
    /// Both are decoded into big-endian unsigned integers (leading zero bytes
    /// stripped) and assembled into an RSA verification key.
    pub fn from_components(kid: impl Into<String>, n: &str, e: &str) -> Result<Self, KeyCacheError> {
        let kid = kid.into();
        let modulus = decode_unsigned(&kid, "n", n)?;
        let exponent = decode_unsigned(&kid, "e", e)?;
        let decoding_key = DecodingKey::from_rsa_raw_components(&modulus, &exponent);
        Ok(Self {
            kid,
            modulus,
            exponent,
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Big-endian modulus bytes.
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Big-endian public exponent bytes.
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("modulus_bits", &(self.modulus.len() * 8))
            .field("exponent", &self.exponent)
            .finish()
    }
}

fn decode_unsigned(kid: &str, member: &str, value: &str) -> Result<Vec<u8>, KeyCacheError> {
    let bytes = decode_base64url(value).map_err(|e| KeyCacheError::MalformedKey {
        kid: Some(kid.to_string()),
        reason: format!("'{member}' is not base64url: {e}"),
    })?;
    let first_significant = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let trimmed = bytes[first_significant..].to_vec();
    if trimmed.is_empty() {
        return Err(KeyCacheError::MalformedKey {
            kid: Some(kid.to_string()),
            reason: format!("'{member}' is zero"),
        });
    }
    Ok(trimmed)
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeySetDocument {
    #[serde(default)]
    keys: Vec<KeyRecord>,
}

#[derive(Debug, Deserialize)]
struct KeyRecord {
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

impl KeyRecord {
    fn into_signing_key(self) -> Result<SigningKey, KeyCacheError> {
        let malformed = |kid: &Option<String>, reason: &str| KeyCacheError::MalformedKey {
            kid: kid.clone(),
            reason: reason.to_string(),
        };
        let kid = self.kid.clone().ok_or_else(|| malformed(&self.kid, "missing 'kid'"))?;
        let n = self.n.as_deref().ok_or_else(|| malformed(&self.kid, "missing 'n'"))?;
        let e = self.e.as_deref().ok_or_else(|| malformed(&self.kid, "missing 'e'"))?;
        SigningKey::from_components(kid, n, e)
    }
}

/// Process-wide signing-key cache.
///
/// Construct once at startup and share behind an `Arc`.
pub struct SigningKeyCache {
    /// OpenID discovery document URL
    discovery_url: String,
    /// Cached keys by `kid`
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,
    /// HTTP client with a bounded timeout
    client: reqwest::Client,
    /// Completed refresh attempts, successful or not
    refreshes: AtomicU64,
}

impl SigningKeyCache {
    /// Create an empty cache that discovers keys from `discovery_url`.
    pub fn new(discovery_url: impl Into<String>, timeout: Duration) -> Result<Self, KeyCacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KeyCacheError::HttpClient)?;
        Ok(Self {
            discovery_url: discovery_url.into(),
            keys: RwLock::new(HashMap::new()),
            client,
            refreshes: AtomicU64::new(0),
        })
    }

    /// Create an empty cache for the configured tenant.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, KeyCacheError> {
        Self::new(settings.discovery_url(), settings.jwks_timeout)
    }

    /// Cache-only lookup.
    pub async fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Insert a key, replacing any with the same `kid`.
    pub async fn insert(&self, key: SigningKey) {
        self.keys
            .write()
            .await
            .insert(key.kid.clone(), Arc::new(key));
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    /// Number of refreshes attempted since construction.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Resolve `kid`, refreshing once on a miss.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeyCacheError> {
        if let Some(key) = self.get(kid).await {
            return Ok(key);
        }

        tracing::debug!(kid, "Signing key not cached, refreshing key set");
        self.refresh().await?;

        self.get(kid)
            .await
            .ok_or_else(|| KeyCacheError::UnknownKeyId(kid.to_string()))
    }

    /// Fetch the provider's current key set and merge it into the cache.
    ///
    /// Returns the number of keys received.
    pub async fn refresh(&self) -> Result<usize, KeyCacheError> {
        let result = self.fetch_keys().await;
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let keys = match result {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, discovery_url = %self.discovery_url, "Signing key refresh failed");
                return Err(e);
            }
        };

        let count = keys.len();
        {
            let mut cache = self.keys.write().await;
            for key in keys {
                cache.insert(key.kid.clone(), Arc::new(key));
            }
        }
        tracing::info!(keys = count, "Signing key set refreshed");
        Ok(count)
    }

    async fn fetch_keys(&self) -> Result<Vec<SigningKey>, KeyCacheError> {
        let jwks_uri = self.fetch_jwks_uri().await?;
        let document = self.fetch_key_set(&jwks_uri).await?;
        document
            .keys
            .into_iter()
            .map(KeyRecord::into_signing_key)
            .collect()
    }

    async fn fetch_jwks_uri(&self) -> Result<String, KeyCacheError> {
        let response = self
            .client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(KeyCacheError::Discovery)?;

        if !response.status().is_success() {
            return Err(KeyCacheError::DiscoveryStatus(response.status()));
        }

        let document: DiscoveryDocument = response.json().await.map_err(KeyCacheError::Discovery)?;
        document
            .jwks_uri
            .filter(|uri| !uri.is_empty())
            .ok_or(KeyCacheError::MissingJwksUri)
    }

    async fn fetch_key_set(&self, jwks_uri: &str) -> Result<KeySetDocument, KeyCacheError> {
        let response = self
            .client
            .get(jwks_uri)
            .send()
            .await
            .map_err(KeyCacheError::KeySet)?;

        if !response.status().is_success() {
            return Err(KeyCacheError::KeySetStatus(response.status()));
        }

        response.json().await.map_err(KeyCacheError::KeySet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// RFC 7517 appendix A.1 example RSA key.
    const SAMPLE_N: &str = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";
    const SAMPLE_E: &str = "AQAB";

    const DISCOVERY_PATH: &str = "/tenant-1/v2.0/.well-known/openid-configuration";
    const KEYS_PATH: &str = "/tenant-1/discovery/v2.0/keys";

    fn key_set(kids: &[&str]) -> serde_json::Value {
        let keys: Vec<_> = kids
            .iter()
            .map(|kid| json!({"kty": "RSA", "use": "sig", "kid": kid, "n": SAMPLE_N, "e": SAMPLE_E}))
            .collect();
        json!({ "keys": keys })
    }

    async fn mount_provider(server: &MockServer, keys: serde_json::Value, expected_fetches: u64) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jwks_uri": format!("{}{KEYS_PATH}", server.uri()) })),
            )
            .expect(expected_fetches)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(KEYS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keys))
            .expect(expected_fetches)
            .mount(server)
            .await;
    }

    fn cache_for(server: &MockServer) -> SigningKeyCache {
        SigningKeyCache::new(format!("{}{DISCOVERY_PATH}", server.uri()), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn padded_and_unpadded_components_decode_identically() {
        let unpadded = decode_base64url("AQAB").unwrap();
        assert_eq!(unpadded, vec![1, 0, 1]);
        // "AQ" needs "==" to be a full quantum
        assert_eq!(decode_base64url("AQ").unwrap(), decode_base64url("AQ==").unwrap());
    }

    #[test]
    fn leading_zero_bytes_are_stripped() {
        // 0x00 0x01 0x00 0x01
        let key = SigningKey::from_components("k", SAMPLE_N, "AAEAAQ").unwrap();
        assert_eq!(key.exponent(), &[1, 0, 1]);
        assert_eq!(key.modulus().len(), 256);
    }

    #[test]
    fn zero_exponent_is_malformed() {
        let err = SigningKey::from_components("k", SAMPLE_N, "AA").unwrap_err();
        assert!(matches!(err, KeyCacheError::MalformedKey { .. }));
    }

    #[test]
    fn non_base64_modulus_is_malformed() {
        let err = SigningKey::from_components("k", "***", SAMPLE_E).unwrap_err();
        assert!(matches!(err, KeyCacheError::MalformedKey { .. }));
    }

    #[tokio::test]
    async fn cached_key_resolves_without_network() {
        let server = MockServer::start().await;
        mount_provider(&server, key_set(&["k1"]), 0).await;

        let cache = cache_for(&server);
        cache
            .insert(SigningKey::from_components("k1", SAMPLE_N, SAMPLE_E).unwrap())
            .await;

        let first = cache.resolve("k1").await.unwrap();
        let second = cache.resolve("k1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.refresh_count(), 0);
    }

    #[tokio::test]
    async fn miss_triggers_exactly_one_refresh() {
        let server = MockServer::start().await;
        mount_provider(&server, key_set(&["k1", "k2"]), 1).await;

        let cache = cache_for(&server);
        let key = cache.resolve("k2").await.unwrap();
        assert_eq!(key.kid(), "k2");
        assert_eq!(cache.len().await, 2);

        // Second lookup is served from the cache
        let again = cache.resolve("k2").await.unwrap();
        assert!(Arc::ptr_eq(&key, &again));
        assert_eq!(cache.refresh_count(), 1);
    }

    #[tokio::test]
    async fn unknown_kid_after_refresh_is_final() {
        let server = MockServer::start().await;
        mount_provider(&server, key_set(&["k1"]), 1).await;

        let cache = cache_for(&server);
        let err = cache.resolve("missing").await.unwrap_err();
        assert!(matches!(err, KeyCacheError::UnknownKeyId(kid) if kid == "missing"));
        assert_eq!(cache.refresh_count(), 1);
    }

    #[tokio::test]
    async fn refresh_replaces_keys_with_same_kid() {
        let server = MockServer::start().await;
        mount_provider(&server, key_set(&["k1"]), 1).await;

        let cache = cache_for(&server);
        cache
            .insert(SigningKey::from_components("k1", SAMPLE_N, "Aw").unwrap())
            .await;
        cache.refresh().await.unwrap();

        let key = cache.get("k1").await.unwrap();
        assert_eq!(key.exponent(), &[1, 0, 1]);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn padded_key_components_are_accepted() {
        let server = MockServer::start().await;
        let keys = json!({"keys": [
            {"kid": "padded", "n": format!("{SAMPLE_N}=="), "e": "AQAB"},
            {"kid": "short", "n": SAMPLE_N, "e": "Aw=="}
        ]});
        mount_provider(&server, keys, 1).await;

        let cache = cache_for(&server);
        assert_eq!(cache.refresh().await.unwrap(), 2);
        assert_eq!(cache.get("short").await.unwrap().exponent(), &[3]);
    }

    #[tokio::test]
    async fn discovery_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        let err = cache.resolve("k1").await.unwrap_err();
        assert!(matches!(err, KeyCacheError::DiscoveryStatus(status) if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn discovery_without_jwks_uri_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issuer": "x"})))
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        assert!(matches!(cache.resolve("k1").await.unwrap_err(), KeyCacheError::MissingJwksUri));
    }

    #[tokio::test]
    async fn key_set_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jwks_uri": format!("{}{KEYS_PATH}", server.uri()) })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(KEYS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        assert!(matches!(
            cache.resolve("k1").await.unwrap_err(),
            KeyCacheError::KeySetStatus(status) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn record_without_modulus_fails_whole_refresh() {
        let server = MockServer::start().await;
        let keys = json!({"keys": [
            {"kid": "good", "n": SAMPLE_N, "e": SAMPLE_E},
            {"kid": "bad", "e": SAMPLE_E}
        ]});
        mount_provider(&server, keys, 1).await;

        let cache = cache_for(&server);
        let err = cache.resolve("good").await.unwrap_err();
        assert!(matches!(err, KeyCacheError::MalformedKey { kid: Some(kid), .. } if kid == "bad"));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jwks_uri": format!("{}{KEYS_PATH}", server.uri()) }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let cache = SigningKeyCache::new(
            format!("{}{DISCOVERY_PATH}", server.uri()),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = cache.resolve("k1").await.unwrap_err();
        assert!(matches!(err, KeyCacheError::Discovery(e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn missing_keys_member_yields_unknown_kid() {
        let server = MockServer::start().await;
        mount_provider(&server, json!({}), 1).await;

        let cache = cache_for(&server);
        assert!(matches!(cache.resolve("k1").await.unwrap_err(), KeyCacheError::UnknownKeyId(_)));
    }
}
