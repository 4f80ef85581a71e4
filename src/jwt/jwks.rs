// ABOUTME: JWKS (JSON Web Key Set) parsing and the process-wide verification key cache
// ABOUTME: Looks keys up by kid, refetches on unknown kids with rate limiting, serves stale keys on outages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! JWKS cache
//!
//! The issuer's key set is fetched as a whole and every usable key is
//! cached under its `kid`. Concurrent population is last-writer-wins; a
//! fetch lock only coalesces callers that miss at the same time.
//!
//! - Entries are fresh for `cache_ttl`
//! - A `kid` that is not cached triggers at most one fetch per
//!   `min_refetch_interval`
//! - An expired entry is still served when its refresh fails on the network

use crate::constants::jwks::{DEFAULT_CACHE_TTL_SECONDS, DEFAULT_MIN_REFETCH_SECONDS};
use crate::errors::OAuthError;
use crate::utils::http_client::oauth_client;
use crate::utils::retry::{retry_idempotent, RetryConfig};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// JWK (JSON Web Key) as published by the issuer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type
    pub kty: String,
    /// Public key use
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Algorithm the key is meant for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus (base64url encoded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent (base64url encoded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of public keys
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKey {
    /// RSA key usable for signature verification
    #[must_use]
    pub fn is_rsa_signing_key(&self) -> bool {
        self.kty == "RSA" && matches!(self.key_use.as_deref(), None | Some("sig"))
    }

    fn to_verification_key(&self) -> Result<VerificationKey, OAuthError> {
        let (Some(n), Some(e)) = (self.n.as_deref(), self.e.as_deref()) else {
            return Err(OAuthError::signature("RSA key is missing n or e"));
        };
        let key = DecodingKey::from_rsa_components(n, e)
            .map_err(|err| OAuthError::signature(format!("unusable RSA key: {err}")))?;
        let algorithm = match self.alg.as_deref() {
            Some(alg) => Some(
                alg.parse::<Algorithm>()
                    .map_err(|_| OAuthError::signature(format!("unsupported key algorithm {alg}")))?,
            ),
            None => None,
        };
        Ok(VerificationKey { key, algorithm })
    }
}

/// A cached verification key
#[derive(Clone)]
pub struct VerificationKey {
    /// Key material
    pub key: DecodingKey,
    /// Algorithm pinned by the JWK, if any
    pub algorithm: Option<Algorithm>,
}

#[derive(Clone)]
struct CachedKey {
    key: VerificationKey,
    fetched_at: Instant,
}

/// Key cache settings
#[derive(Debug, Clone)]
pub struct JwksConfig {
    /// Key-set URL
    pub jwks_uri: String,
    /// How long a fetched key stays fresh
    pub cache_ttl: Duration,
    /// Minimum spacing between fetches triggered by cache misses
    pub min_refetch_interval: Duration,
    /// Retry policy for fetches
    pub retry: RetryConfig,
}

impl JwksConfig {
    /// Defaults for `jwks_uri`
    #[must_use]
    pub fn new(jwks_uri: impl Into<String>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            min_refetch_interval: Duration::from_secs(DEFAULT_MIN_REFETCH_SECONDS),
            retry: RetryConfig::default(),
        }
    }
}

/// Outcome of the most recent key set fetch
#[derive(Debug, Clone)]
struct FetchRecord {
    at: Instant,
    failure: Option<OAuthError>,
}

/// Process-wide cache of the issuer's verification keys
pub struct JwksCache {
    config: JwksConfig,
    client: reqwest::Client,
    keys: DashMap<String, CachedKey>,
    last_fetch: Mutex<Option<FetchRecord>>,
    fetch_lock: tokio::sync::Mutex<()>,
}

impl JwksCache {
    /// Create an empty cache using the default OAuth HTTP client
    #[must_use]
    pub fn new(config: JwksConfig) -> Self {
        Self::with_http_client(config, oauth_client())
    }

    /// Create an empty cache with an existing HTTP client
    #[must_use]
    pub fn with_http_client(config: JwksConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            keys: DashMap::new(),
            last_fetch: Mutex::new(None),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Cache settings
    #[must_use]
    pub const fn config(&self) -> &JwksConfig {
        &self.config
    }

    /// Key for `kid`, fetching the key set when it is missing or expired
    ///
    /// # Errors
    ///
    /// - [`OAuthError::SignatureInvalid`] when the issuer publishes no key for `kid`
    /// - [`OAuthError::NetworkFailure`] when the key set cannot be fetched and nothing is cached
    pub async fn get_key(&self, kid: &str) -> Result<VerificationKey, OAuthError> {
        if let Some(key) = self.fresh(kid) {
            debug!(kid, "JWKS cache hit");
            return Ok(key);
        }

        let _guard = self.fetch_lock.lock().await;
        if let Some(key) = self.fresh(kid) {
            return Ok(key);
        }

        let stale = self.keys.get(kid).map(|entry| entry.key.clone());
        if let Some(record) = self.recent_fetch() {
            if let Some(key) = stale {
                return Ok(key);
            }
            // A failed fetch inside the interval keeps reporting the outage
            return Err(record.failure.unwrap_or_else(|| {
                debug!(kid, "Unknown kid within refetch interval");
                OAuthError::signature(format!("no key for kid {kid}"))
            }));
        }

        match self.refresh().await {
            Ok(_) => self
                .keys
                .get(kid)
                .map(|entry| entry.key.clone())
                .ok_or_else(|| OAuthError::signature(format!("no key for kid {kid}"))),
            Err(error) if error.is_retryable() => match stale {
                Some(key) => {
                    warn!(kid, error = %error, "Key set unavailable, serving stale key");
                    Ok(key)
                }
                None => Err(error),
            },
            Err(error) => Err(error),
        }
    }

    /// Fetch the whole key set and replace the cached keys with its usable
    /// keys; returns how many were loaded
    ///
    /// Keys the issuer no longer publishes are evicted. A failed fetch leaves
    /// the cache untouched so stale keys can still be served.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::NetworkFailure`] after retries, or
    /// [`OAuthError::AuthorizationServer`] for a non-retryable bad response
    pub async fn refresh(&self) -> Result<usize, OAuthError> {
        let set = match retry_idempotent("key set fetch", self.config.retry, || self.fetch()).await
        {
            Ok(set) => set,
            Err(error) => {
                self.record_fetch(Some(error.clone()));
                return Err(error);
            }
        };
        self.record_fetch(None);

        let fetched_at = Instant::now();
        let mut published = HashSet::new();

        for jwk in set.keys.iter().filter(|jwk| jwk.is_rsa_signing_key()) {
            let Some(kid) = jwk.kid.clone() else {
                continue;
            };
            match jwk.to_verification_key() {
                Ok(key) => {
                    self.keys.insert(kid.clone(), CachedKey { key, fetched_at });
                    published.insert(kid);
                }
                Err(error) => warn!(kid, error = %error, "Skipping unusable key"),
            }
        }

        self.keys.retain(|kid, _| {
            let keep = published.contains(kid);
            if !keep {
                info!(kid, "Evicting key no longer published");
            }
            keep
        });

        info!(keys = published.len(), uri = %self.config.jwks_uri, "Key set loaded");
        Ok(published.len())
    }

    /// Seed the cache with a key; the next successful refresh evicts it
    /// unless the issuer publishes the same `kid`
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SignatureInvalid`] if the JWK has no `kid` or is unusable
    pub fn insert_jwk(&self, jwk: &JsonWebKey) -> Result<(), OAuthError> {
        let kid = jwk
            .kid
            .clone()
            .ok_or_else(|| OAuthError::signature("JWK has no kid"))?;
        let key = jwk.to_verification_key()?;
        self.keys.insert(
            kid,
            CachedKey {
                key,
                fetched_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Number of cached keys, fresh or stale
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn fresh(&self, kid: &str) -> Option<VerificationKey> {
        self.keys
            .get(kid)
            .filter(|entry| entry.fetched_at.elapsed() < self.config.cache_ttl)
            .map(|entry| entry.key.clone())
    }

    fn recent_fetch(&self) -> Option<FetchRecord> {
        self.last_fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|record| record.at.elapsed() < self.config.min_refetch_interval)
    }

    fn record_fetch(&self, failure: Option<OAuthError>) {
        *self
            .last_fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(FetchRecord {
            at: Instant::now(),
            failure,
        });
    }

    async fn fetch(&self) -> Result<JsonWebKeySet, OAuthError> {
        let response = self
            .client
            .get(&self.config.jwks_uri)
            .send()
            .await
            .map_err(OAuthError::network)?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OAuthError::network(format!("key set endpoint returned {status}")));
        }
        if !status.is_success() {
            return Err(OAuthError::AuthorizationServer {
                status: status.as_u16(),
                error: "jwks_unavailable".to_owned(),
                description: None,
            });
        }

        response
            .json::<JsonWebKeySet>()
            .await
            .map_err(|e| OAuthError::AuthorizationServer {
                status: status.as_u16(),
                error: "invalid_jwks".to_owned(),
                description: Some(e.to_string()),
            })
    }
}
