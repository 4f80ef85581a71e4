// ABOUTME: Token set returned by the authorization server, with expiry tracking
// ABOUTME: Parses RFC 6749 token and error responses and computes absolute expiry times
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::time::DEFAULT_TOKEN_EXPIRY_SECONDS;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Access, refresh and ID tokens owned by one session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// The access token string
    pub access_token: String,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// OIDC ID token, when `openid` was requested
    pub id_token: Option<String>,
    /// Refresh token, when `offline_access` was granted
    pub refresh_token: Option<String>,
    /// Granted OAuth scopes
    pub scope: Option<String>,
    /// Absolute expiration of the access token (UTC)
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Check if the access token is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now())
    }

    /// Check if the access token expires within `window`
    #[must_use]
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now() + window)
    }

    /// Whether this set can be renewed without user interaction
    #[must_use]
    pub const fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Merge a refresh response into this set.
    ///
    /// Servers that do not rotate refresh tokens omit `refresh_token` (and
    /// sometimes `id_token`) from refresh responses; the previous values are
    /// kept in that case.
    #[must_use]
    pub fn rotated(self, mut next: Self) -> Self {
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token;
        }
        if next.id_token.is_none() {
            next.id_token = self.id_token;
        }
        if next.scope.is_none() {
            next.scope = self.scope;
        }
        next
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &fingerprint(&self.access_token))
            .field("token_type", &self.token_type)
            .field("id_token", &self.id_token.as_deref().map(fingerprint))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(fingerprint),
            )
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Short SHA-256 fingerprint (first 8 hex chars) for logging tokens without
/// revealing them
#[must_use]
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..4])
}

/// OAuth 2.0 token response from the authorization server
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    /// The access token issued by the authorization server
    access_token: String,
    /// The type of token (usually "Bearer")
    #[serde(default = "default_token_type")]
    token_type: String,
    /// Token lifetime in seconds
    expires_in: Option<u64>,
    /// Refresh token for obtaining new access tokens
    refresh_token: Option<String>,
    /// OIDC ID token
    id_token: Option<String>,
    /// Space-separated list of granted scopes
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

impl TokenResponse {
    /// Convert into a [`TokenSet`], anchoring `expires_in` at `received_at`
    pub(crate) fn into_token_set(self, received_at: DateTime<Utc>) -> TokenSet {
        let expires_at = self.expires_in.map(|seconds| {
            received_at
                + Duration::seconds(i64::try_from(seconds).unwrap_or(DEFAULT_TOKEN_EXPIRY_SECONDS))
        });

        TokenSet {
            access_token: self.access_token,
            token_type: self.token_type,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            expires_at,
        }
    }
}

/// RFC 6749 §5.2 error body
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    pub(crate) error_description: Option<String>,
}
