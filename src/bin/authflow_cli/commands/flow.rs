// ABOUTME: Client-side flow commands for authflow-cli
// ABOUTME: PKCE generation, authorization URL, code exchange, refresh and revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::print_json;
use anyhow::{Context, Result};
use authflow::config::AuthFlowConfig;
use authflow::oauth2_client::{OAuth2Client, OAuthFlowManager, PkcePair, TokenTypeHint};
use serde_json::json;
use tracing::info;

fn client() -> Result<OAuth2Client> {
    let config = AuthFlowConfig::from_env().context("Failed to load configuration")?;
    OAuth2Client::new(config.client).context("Invalid client configuration")
}

pub fn pkce(length: usize) -> Result<()> {
    let pair = PkcePair::generate_with_length(length)?;
    print_json(&json!({
        "code_verifier": pair.verifier(),
        "code_challenge": pair.challenge(),
        "code_challenge_method": pair.challenge_method(),
    }))
}

pub fn authorize_url() -> Result<()> {
    let client = client()?;
    let flows = OAuthFlowManager::new();
    let (state, pkce, nonce) = flows.begin()?;
    let url = client.authorization_url(&state, &pkce, Some(&nonce))?;

    info!("Open the URL, then run `exchange` with the code and this verifier");
    print_json(&json!({
        "url": url.as_str(),
        "state": state,
        "nonce": nonce,
        "code_verifier": pkce.verifier(),
    }))
}

pub async fn exchange(code: &str, verifier: String) -> Result<()> {
    let pkce = PkcePair::from_verifier(verifier)?;
    let tokens = client()?.exchange_code(code, pkce).await?;
    print_json(&tokens)
}

pub async fn refresh(refresh_token: &str) -> Result<()> {
    let tokens = client()?.refresh_token(refresh_token).await?;
    print_json(&tokens)
}

pub async fn revoke(token: &str, hint: TokenTypeHint) -> Result<()> {
    client()?.revoke_token(token, hint).await?;
    print_json(&json!({ "revoked": true, "token_type_hint": hint.as_str() }))
}
