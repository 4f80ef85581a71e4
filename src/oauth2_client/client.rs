// ABOUTME: OAuth2 client for the authorization code flow with PKCE against an external server
// ABOUTME: Builds authorization URLs and performs code exchange, refresh and revocation calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::pkce::PkcePair;
use super::token::{fingerprint, ErrorResponse, TokenResponse, TokenSet};
use crate::constants::oauth::{error_codes, grant_types, params, response_types};
use crate::errors::OAuthError;
use crate::utils::http_client::oauth_client;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

/// OAuth 2.0 client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Config {
    /// OAuth client ID registered with the authorization server
    pub client_id: String,
    /// OAuth client secret; `None` for public clients (SPAs, native apps)
    pub client_secret: Option<String>,
    /// Authorization endpoint URL
    pub authorization_endpoint: String,
    /// Token endpoint URL
    pub token_endpoint: String,
    /// Revocation endpoint URL (RFC 7009)
    pub revocation_endpoint: Option<String>,
    /// Redirect URI for OAuth callbacks
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
    /// API identifier sent as `audience` (Auth0 and compatible servers)
    pub audience: Option<String>,
}

impl OAuth2Config {
    /// Check that every endpoint is an absolute URL
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidConfig`] naming the first bad field
    pub fn validate(&self) -> Result<(), OAuthError> {
        if self.client_id.trim().is_empty() {
            return Err(OAuthError::config("client_id must not be empty"));
        }
        parse_endpoint("authorization_endpoint", &self.authorization_endpoint)?;
        parse_endpoint("token_endpoint", &self.token_endpoint)?;
        parse_endpoint("redirect_uri", &self.redirect_uri)?;
        if let Some(revocation) = &self.revocation_endpoint {
            parse_endpoint("revocation_endpoint", revocation)?;
        }
        Ok(())
    }
}

/// Which token the caller is revoking (RFC 7009 `token_type_hint`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    /// An access token
    AccessToken,
    /// A refresh token
    RefreshToken,
}

impl TokenTypeHint {
    /// Wire value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

/// OAuth 2.0 client for one registered application
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    config: OAuth2Config,
    client: reqwest::Client,
}

impl OAuth2Client {
    /// Create a new `OAuth2` client with the given configuration
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidConfig`] if the configuration is unusable
    pub fn new(config: OAuth2Config) -> Result<Self, OAuthError> {
        Self::with_http_client(config, oauth_client())
    }

    /// Create a client that reuses an existing `reqwest::Client`
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidConfig`] if the configuration is unusable
    pub fn with_http_client(
        config: OAuth2Config,
        client: reqwest::Client,
    ) -> Result<Self, OAuthError> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Get the `OAuth2` configuration
    #[must_use]
    pub const fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Build the authorization redirect URL with the `PKCE` challenge
    ///
    /// Query parameters already present on the configured endpoint are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization endpoint is malformed
    pub fn authorization_url(
        &self,
        state: &str,
        pkce: &PkcePair,
        nonce: Option<&str>,
    ) -> Result<Url, OAuthError> {
        let mut url = parse_endpoint(
            "authorization_endpoint",
            &self.config.authorization_endpoint,
        )?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(params::RESPONSE_TYPE, response_types::CODE)
                .append_pair(params::CLIENT_ID, &self.config.client_id)
                .append_pair(params::REDIRECT_URI, &self.config.redirect_uri)
                .append_pair(params::SCOPE, &self.config.scopes.join(" "))
                .append_pair(params::STATE, state)
                .append_pair(params::CODE_CHALLENGE, pkce.challenge())
                .append_pair(params::CODE_CHALLENGE_METHOD, pkce.challenge_method());

            if let Some(nonce) = nonce {
                query.append_pair(params::NONCE, nonce);
            }
            if let Some(audience) = &self.config.audience {
                query.append_pair(params::AUDIENCE, audience);
            }
        }

        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The `PKCE` pair is consumed: a verifier is sent at most once.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::ExchangeRejected`] when the server rejects the code or verifier
    /// - [`OAuthError::NetworkFailure`] on transport errors or server unavailability
    /// - [`OAuthError::AuthorizationServer`] for any other server error
    #[tracing::instrument(skip_all, fields(client_id = %self.config.client_id))]
    pub async fn exchange_code(&self, code: &str, pkce: PkcePair) -> Result<TokenSet, OAuthError> {
        let mut form = vec![
            (params::GRANT_TYPE, grant_types::AUTHORIZATION_CODE),
            (params::CODE, code),
            (params::REDIRECT_URI, self.config.redirect_uri.as_str()),
            (params::CLIENT_ID, self.config.client_id.as_str()),
            (params::CODE_VERIFIER, pkce.verifier()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push((params::CLIENT_SECRET, secret.as_str()));
        }

        let tokens = self.post_token(&form, Grant::AuthorizationCode).await?;

        info!(
            access_token = %fingerprint(&tokens.access_token),
            refreshable = tokens.is_refreshable(),
            "Authorization code exchanged"
        );
        Ok(tokens)
    }

    /// Redeem a refresh token for a new token set
    ///
    /// # Errors
    ///
    /// - [`OAuthError::RefreshReuseDetected`] when the server answers `invalid_grant`
    /// - [`OAuthError::NetworkFailure`] on transport errors or server unavailability
    /// - [`OAuthError::AuthorizationServer`] for any other server error
    #[tracing::instrument(skip_all, fields(refresh_token = %fingerprint(refresh_token)))]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, OAuthError> {
        let mut form = vec![
            (params::GRANT_TYPE, grant_types::REFRESH_TOKEN),
            (params::REFRESH_TOKEN, refresh_token),
            (params::CLIENT_ID, self.config.client_id.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push((params::CLIENT_SECRET, secret.as_str()));
        }

        let tokens = self.post_token(&form, Grant::RefreshToken).await?;
        debug!(
            rotated = tokens
                .refresh_token
                .as_deref()
                .is_some_and(|next| next != refresh_token),
            "Refresh token redeemed"
        );
        Ok(tokens)
    }

    /// Revoke a token at the revocation endpoint (RFC 7009)
    ///
    /// # Errors
    ///
    /// - [`OAuthError::InvalidConfig`] when no revocation endpoint is configured
    /// - [`OAuthError::NetworkFailure`] on transport errors or `503`
    /// - [`OAuthError::AuthorizationServer`] for any other non-success status
    #[tracing::instrument(skip_all, fields(hint = hint.as_str()))]
    pub async fn revoke_token(&self, token: &str, hint: TokenTypeHint) -> Result<(), OAuthError> {
        let endpoint = self
            .config
            .revocation_endpoint
            .as_deref()
            .ok_or_else(|| OAuthError::config("no revocation endpoint configured"))?;

        let mut form = vec![
            (params::TOKEN, token),
            (params::TOKEN_TYPE_HINT, hint.as_str()),
            (params::CLIENT_ID, self.config.client_id.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push((params::CLIENT_SECRET, secret.as_str()));
        }

        let response = self
            .client
            .post(endpoint)
            .form(&form)
            .send()
            .await
            .map_err(OAuthError::network)?;

        let status = response.status();
        if status.is_success() {
            debug!(token = %fingerprint(token), "Token revoked");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(None, status, &body))
    }

    async fn post_token(
        &self,
        form: &[(&str, &str)],
        grant: Grant,
    ) -> Result<TokenSet, OAuthError> {
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(OAuthError::network)?;

        let received_at = Utc::now();
        let status = response.status();

        if status.is_success() {
            let body: TokenResponse =
                response
                    .json()
                    .await
                    .map_err(|e| OAuthError::AuthorizationServer {
                        status: status.as_u16(),
                        error: "invalid_token_response".to_owned(),
                        description: Some(e.to_string()),
                    })?;
            return Ok(body.into_token_set(received_at));
        }

        let body = response.text().await.map_err(OAuthError::network)?;
        let error = classify_failure(Some(grant), status, &body);
        warn!(status = status.as_u16(), error = %error, "Token endpoint rejected request");
        Err(error)
    }
}

/// Map a non-success token/revocation response onto the error taxonomy
fn classify_failure(grant: Option<Grant>, status: StatusCode, body: &str) -> OAuthError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return OAuthError::NetworkFailure {
            message: format!("authorization server unavailable ({status})"),
        };
    }

    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let is_invalid_grant = parsed
        .as_ref()
        .is_some_and(|e| e.error == error_codes::INVALID_GRANT);

    match grant {
        Some(Grant::AuthorizationCode)
            if is_invalid_grant || (parsed.is_none() && status == StatusCode::BAD_REQUEST) =>
        {
            OAuthError::ExchangeRejected {
                reason: parsed
                    .and_then(|e| e.error_description)
                    .unwrap_or_else(|| error_codes::INVALID_GRANT.to_owned()),
            }
        }
        Some(Grant::RefreshToken) if is_invalid_grant => OAuthError::RefreshReuseDetected,
        _ => match parsed {
            Some(e) => OAuthError::AuthorizationServer {
                status: status.as_u16(),
                error: e.error,
                description: e.error_description,
            },
            None => OAuthError::AuthorizationServer {
                status: status.as_u16(),
                error: format!("unexpected response ({status})"),
                description: None,
            },
        },
    }
}

fn parse_endpoint(field: &str, value: &str) -> Result<Url, OAuthError> {
    let url = Url::parse(value)
        .map_err(|e| OAuthError::config(format!("{field} is not a valid URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(OAuthError::config(format!("{field} must be an absolute URL")));
    }
    Ok(url)
}
