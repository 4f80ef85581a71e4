// ABOUTME: Bearer JWT validation for resource servers against the issuer's cached key set
// ABOUTME: Verifies signature by kid, then issuer, audience and expiry with configurable leeway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::claims::Claims;
use super::jwks::JwksCache;
use crate::constants::time::DEFAULT_CLOCK_LEEWAY_SECONDS;
use crate::errors::OAuthError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use std::sync::Arc;
use tracing::debug;

/// What a token must satisfy to be accepted
#[derive(Debug, Clone)]
pub struct JwtValidatorConfig {
    /// Expected `iss`, compared exactly
    pub issuer: String,
    /// Audience that must appear in `aud`
    pub audience: String,
    /// Accepted signing algorithms
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerated on `exp` and `nbf`
    pub leeway_seconds: u64,
}

impl JwtValidatorConfig {
    /// RS256/RS384/RS512 with the default leeway
    #[must_use]
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithms: vec![Algorithm::RS256, Algorithm::RS384, Algorithm::RS512],
            leeway_seconds: DEFAULT_CLOCK_LEEWAY_SECONDS,
        }
    }
}

/// Validates bearer tokens; cheap to clone, clones share the key cache
#[derive(Clone)]
pub struct JwtValidator {
    config: Arc<JwtValidatorConfig>,
    keys: Arc<JwksCache>,
}

impl JwtValidator {
    /// Create a validator over a shared key cache
    #[must_use]
    pub fn new(config: JwtValidatorConfig, keys: Arc<JwksCache>) -> Self {
        Self {
            config: Arc::new(config),
            keys,
        }
    }

    /// Validator settings
    #[must_use]
    pub fn config(&self) -> &JwtValidatorConfig {
        &self.config
    }

    /// Shared key cache
    #[must_use]
    pub const fn keys(&self) -> &Arc<JwksCache> {
        &self.keys
    }

    /// Validate a bearer token and return its claims
    ///
    /// # Errors
    ///
    /// - [`OAuthError::MalformedToken`] for undecodable tokens, missing `kid` or disallowed algorithms
    /// - [`OAuthError::SignatureInvalid`] for bad signatures or unknown `kid`
    /// - [`OAuthError::UnknownIssuer`], [`OAuthError::WrongAudience`], [`OAuthError::TokenExpired`]
    /// - [`OAuthError::NetworkFailure`] when the key set cannot be fetched
    pub async fn validate(&self, token: &str) -> Result<Claims, OAuthError> {
        let header = decode_header(token).map_err(|e| OAuthError::MalformedToken {
            details: e.to_string(),
        })?;

        if !self.config.algorithms.contains(&header.alg) {
            return Err(OAuthError::MalformedToken {
                details: format!("algorithm {:?} is not accepted", header.alg),
            });
        }
        let kid = header.kid.as_deref().ok_or_else(|| OAuthError::MalformedToken {
            details: "token header has no kid".to_owned(),
        })?;

        let key = self.keys.get_key(kid).await?;
        if key.algorithm.is_some_and(|pinned| pinned != header.alg) {
            return Err(OAuthError::signature(format!(
                "key {kid} is not for {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_seconds;
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<Claims>(token, &key.key, &validation).map_err(|e| map_error(e.kind()))?;
        debug!(sub = %data.claims.sub, kid, "Bearer token accepted");
        Ok(data.claims)
    }
}

fn map_error(kind: &ErrorKind) -> OAuthError {
    match kind {
        ErrorKind::ExpiredSignature => OAuthError::TokenExpired,
        ErrorKind::InvalidIssuer => OAuthError::UnknownIssuer,
        ErrorKind::InvalidAudience => OAuthError::WrongAudience,
        ErrorKind::InvalidSignature => OAuthError::signature("signature does not verify"),
        ErrorKind::MissingRequiredClaim(claim) => OAuthError::MalformedToken {
            details: format!("missing required claim {claim}"),
        },
        ErrorKind::ImmatureSignature => OAuthError::MalformedToken {
            details: "token is not valid yet".to_owned(),
        },
        other => OAuthError::MalformedToken {
            details: format!("{other:?}"),
        },
    }
}
