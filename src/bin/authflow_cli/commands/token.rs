// ABOUTME: Resource-server commands for authflow-cli
// ABOUTME: Bearer token validation and provider discovery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::print_json;
use anyhow::{Context, Result};
use authflow::config::AuthFlowConfig;
use authflow::constants::env_vars;
use authflow::jwt::{JwksCache, JwtValidator};
use authflow::oauth2_client::ProviderMetadata;
use authflow::utils::http_client::shared_oauth_client;
use authflow::utils::retry::RetryConfig;
use std::sync::Arc;

pub async fn validate(token: &str) -> Result<()> {
    let config = AuthFlowConfig::from_env().context("Failed to load configuration")?;
    let keys = Arc::new(JwksCache::new(config.jwks_config()));
    let validator = JwtValidator::new(config.validator_config()?, keys);

    let claims = validator.validate(token).await?;
    print_json(&claims)
}

pub async fn discover(issuer: Option<String>) -> Result<()> {
    let issuer = issuer
        .or_else(|| std::env::var(env_vars::ISSUER).ok())
        .with_context(|| format!("Pass --issuer or set {}", env_vars::ISSUER))?;

    let metadata =
        ProviderMetadata::discover(shared_oauth_client(), &issuer, RetryConfig::default()).await?;
    print_json(&metadata)
}
