// ABOUTME: Environment-based configuration for the OAuth client, sessions and token validation
// ABOUTME: Reads AUTHFLOW_* variables, derives endpoint defaults from the issuer and validates values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::defaults::{
    AUTHORIZATION_PATH, DEFAULT_SCOPES, JWKS_PATH, REVOCATION_PATH, TOKEN_PATH,
};
use crate::constants::{env_vars, jwks, time};
use crate::errors::{AppError, AppResult};
use crate::jwt::{JwksConfig, JwtValidatorConfig};
use crate::oauth2_client::OAuth2Config;
use crate::session::{ReusePolicy, SchedulerConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Complete configuration for one application talking to one issuer
#[derive(Debug, Clone)]
pub struct AuthFlowConfig {
    /// Authorization server issuer URL
    pub issuer: String,
    /// OAuth client settings
    pub client: OAuth2Config,
    /// Key-set URL
    pub jwks_uri: String,
    /// Seconds before expiry to refresh
    pub refresh_lead_seconds: u64,
    /// Seconds to wait after a network failure before retrying a refresh
    pub refresh_retry_seconds: u64,
    /// Key cache freshness in seconds
    pub jwks_cache_ttl_seconds: u64,
    /// Minimum spacing between key-set refetches in seconds
    pub jwks_min_refetch_seconds: u64,
    /// Clock skew accepted on `exp`/`nbf`
    pub clock_leeway_seconds: u64,
    /// What to revoke when a rotated refresh token is reused
    pub reuse_policy: ReusePolicy,
}

impl AuthFlowConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` for absent required variables and
    /// `CONFIG_INVALID` for unparseable values
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| AppError::config_missing(key));

        let issuer = required(env_vars::ISSUER)?;
        let base = issuer.trim_end_matches('/').to_owned();
        let endpoint = |key: &str, path: &str| var(key).unwrap_or_else(|| format!("{base}/{path}"));

        let client = OAuth2Config {
            client_id: required(env_vars::CLIENT_ID)?,
            client_secret: var(env_vars::CLIENT_SECRET),
            authorization_endpoint: endpoint(env_vars::AUTHORIZATION_ENDPOINT, AUTHORIZATION_PATH),
            token_endpoint: endpoint(env_vars::TOKEN_ENDPOINT, TOKEN_PATH),
            revocation_endpoint: Some(endpoint(env_vars::REVOCATION_ENDPOINT, REVOCATION_PATH)),
            redirect_uri: required(env_vars::REDIRECT_URI)?,
            scopes: parse_scopes(&var(env_vars::SCOPES).unwrap_or_else(|| DEFAULT_SCOPES.into())),
            audience: var(env_vars::AUDIENCE),
        };
        client
            .validate()
            .map_err(|e| AppError::config_invalid(e.to_string()))?;

        let config = Self {
            jwks_uri: endpoint(env_vars::JWKS_URI, JWKS_PATH),
            client,
            refresh_lead_seconds: parse_or(
                var(env_vars::REFRESH_LEAD_SECONDS),
                env_vars::REFRESH_LEAD_SECONDS,
                time::DEFAULT_REFRESH_LEAD_SECONDS.unsigned_abs(),
            )?,
            refresh_retry_seconds: parse_or(
                var(env_vars::REFRESH_RETRY_SECONDS),
                env_vars::REFRESH_RETRY_SECONDS,
                time::DEFAULT_REFRESH_RETRY_SECONDS.unsigned_abs(),
            )?,
            jwks_cache_ttl_seconds: parse_or(
                var(env_vars::JWKS_CACHE_TTL_SECONDS),
                env_vars::JWKS_CACHE_TTL_SECONDS,
                jwks::DEFAULT_CACHE_TTL_SECONDS,
            )?,
            jwks_min_refetch_seconds: parse_or(
                var(env_vars::JWKS_MIN_REFETCH_SECONDS),
                env_vars::JWKS_MIN_REFETCH_SECONDS,
                jwks::DEFAULT_MIN_REFETCH_SECONDS,
            )?,
            clock_leeway_seconds: parse_or(
                var(env_vars::CLOCK_LEEWAY_SECONDS),
                env_vars::CLOCK_LEEWAY_SECONDS,
                time::DEFAULT_CLOCK_LEEWAY_SECONDS,
            )?,
            reuse_policy: parse_or(
                var(env_vars::REUSE_POLICY),
                env_vars::REUSE_POLICY,
                ReusePolicy::default(),
            )?,
            issuer,
        };

        info!(
            issuer = %config.issuer,
            client_id = %config.client.client_id,
            confidential = config.client.client_secret.is_some(),
            reuse_policy = %config.reuse_policy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Silent refresh timing
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            lead_time: chrono::Duration::seconds(seconds_i64(self.refresh_lead_seconds)),
            retry_delay: chrono::Duration::seconds(seconds_i64(self.refresh_retry_seconds)),
        }
    }

    /// Key cache settings
    #[must_use]
    pub fn jwks_config(&self) -> JwksConfig {
        JwksConfig {
            cache_ttl: Duration::from_secs(self.jwks_cache_ttl_seconds),
            min_refetch_interval: Duration::from_secs(self.jwks_min_refetch_seconds),
            ..JwksConfig::new(self.jwks_uri.clone())
        }
    }

    /// Resource-server validation settings; requires `AUTHFLOW_AUDIENCE`
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` when no audience is configured
    pub fn validator_config(&self) -> AppResult<JwtValidatorConfig> {
        let audience = self
            .client
            .audience
            .clone()
            .ok_or_else(|| AppError::config_missing(env_vars::AUDIENCE))?;
        let mut config = JwtValidatorConfig::new(self.issuer.clone(), audience);
        config.leeway_seconds = self.clock_leeway_seconds;
        Ok(config)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .map_err(|e| AppError::config_invalid(format!("Invalid {key} value '{value}': {e}")))
    })
}

/// Upper bound for scheduler delays (one year)
const MAX_SCHEDULE_SECONDS: u64 = 31_536_000;

fn seconds_i64(seconds: u64) -> i64 {
    i64::try_from(seconds.min(MAX_SCHEDULE_SECONDS)).unwrap_or_default()
}

/// Parse space- or comma-separated scopes
fn parse_scopes(scopes: &str) -> Vec<String> {
    scopes
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
