// ABOUTME: OpenID Connect provider discovery from the issuer's well-known document
// ABOUTME: Fetches and checks provider metadata, then derives client configuration from it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::client::OAuth2Config;
use crate::constants::defaults::DISCOVERY_PATH;
use crate::constants::pkce::CHALLENGE_METHOD_S256;
use crate::errors::OAuthError;
use crate::utils::retry::{retry_idempotent, RetryConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Subset of OpenID Provider Metadata used by this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier; must equal the URL discovery was requested for
    pub issuer: String,
    /// Authorization endpoint
    pub authorization_endpoint: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// Key-set document URL
    pub jwks_uri: String,
    /// RFC 7009 revocation endpoint
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    /// `UserInfo` endpoint
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    /// Advertised scopes
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    /// Advertised `PKCE` methods
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
    /// Advertised ID token signing algorithms
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

impl ProviderMetadata {
    /// Fetch `<issuer>/.well-known/openid-configuration`
    ///
    /// # Errors
    ///
    /// - [`OAuthError::NetworkFailure`] when the document cannot be fetched after retries
    /// - [`OAuthError::UnknownIssuer`] when the document names a different issuer
    /// - [`OAuthError::InvalidConfig`] when the provider cannot do `PKCE` with S256
    #[tracing::instrument(skip(client))]
    pub async fn discover(
        client: &reqwest::Client,
        issuer: &str,
        retry: RetryConfig,
    ) -> Result<Self, OAuthError> {
        let url = format!("{}/{DISCOVERY_PATH}", issuer.trim_end_matches('/'));

        let metadata: Self = retry_idempotent("provider discovery", retry, || async {
            let response = client.get(&url).send().await.map_err(OAuthError::network)?;
            let status = response.status();
            if status.is_server_error() {
                return Err(OAuthError::network(format!(
                    "discovery endpoint unavailable ({status})"
                )));
            }
            if !status.is_success() {
                return Err(OAuthError::AuthorizationServer {
                    status: status.as_u16(),
                    error: "discovery_failed".to_owned(),
                    description: None,
                });
            }
            response
                .json::<Self>()
                .await
                .map_err(|e| OAuthError::AuthorizationServer {
                    status: status.as_u16(),
                    error: "invalid_discovery_document".to_owned(),
                    description: Some(e.to_string()),
                })
        })
        .await?;

        metadata.check(issuer)?;
        info!(issuer = %metadata.issuer, "Provider metadata discovered");
        Ok(metadata)
    }

    fn check(&self, requested_issuer: &str) -> Result<(), OAuthError> {
        if self.issuer.trim_end_matches('/') != requested_issuer.trim_end_matches('/') {
            return Err(OAuthError::UnknownIssuer);
        }
        if !self.code_challenge_methods_supported.is_empty()
            && !self
                .code_challenge_methods_supported
                .iter()
                .any(|method| method == CHALLENGE_METHOD_S256)
        {
            return Err(OAuthError::config("provider does not support S256 PKCE"));
        }
        Ok(())
    }

    /// Client configuration pointing at the discovered endpoints
    #[must_use]
    pub fn client_config(
        &self,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> OAuth2Config {
        OAuth2Config {
            client_id: client_id.into(),
            client_secret: None,
            authorization_endpoint: self.authorization_endpoint.clone(),
            token_endpoint: self.token_endpoint.clone(),
            revocation_endpoint: self.revocation_endpoint.clone(),
            redirect_uri: redirect_uri.into(),
            scopes,
            audience: None,
        }
    }
}
