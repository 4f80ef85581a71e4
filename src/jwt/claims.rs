// ABOUTME: Claims carried by access tokens accepted by the resource server
// ABOUTME: Handles single or multiple audiences and space-delimited scope checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `aud` may be a string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// One audience
    Single(String),
    /// Several audiences
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `audience` is one of the token's audiences
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(single) => single == audience,
            Self::Multiple(many) => many.iter().any(|a| a == audience),
        }
    }
}

/// Validated access token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject (user id)
    pub sub: String,
    /// Audience(s)
    pub aud: Audience,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Issued-at, seconds since epoch
    #[serde(default)]
    pub iat: Option<i64>,
    /// Not-before, seconds since epoch
    #[serde(default)]
    pub nbf: Option<i64>,
    /// Space-delimited granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// Authorized party (the client the token was issued to)
    #[serde(default)]
    pub azp: Option<String>,
    /// Every other claim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Granted scopes
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or_default().split_whitespace()
    }

    /// Whether `scope` was granted
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().any(|granted| granted == scope)
    }

    /// Whether every scope in `required` was granted
    #[must_use]
    pub fn has_all_scopes(&self, required: &[&str]) -> bool {
        required.iter().all(|scope| self.has_scope(scope))
    }

    /// Expiry as a timestamp
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
