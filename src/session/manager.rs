// ABOUTME: Session manager composing login, token storage, silent refresh and logout
// ABOUTME: Context object an application holds instead of global session state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::scheduler::{RefreshScheduler, RefreshState, SchedulerConfig, TokenRefresher};
use super::store::{ReusePolicy, SessionId, TokenStore};
use crate::constants::time::REVOKED_FAMILY_RETENTION_SECONDS;
use crate::errors::OAuthError;
use crate::oauth2_client::{OAuth2Client, OAuthFlowManager, TokenSet, TokenTypeHint};
use chrono::Duration;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Redirect the user agent must follow to log in
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Authorization URL with `state`, `nonce` and `PKCE` challenge
    pub url: Url,
    /// `state` value the callback must echo
    pub state: String,
}

/// Owns every client-side session of one application
pub struct SessionManager {
    client: Arc<OAuth2Client>,
    flows: OAuthFlowManager,
    store: Arc<TokenStore>,
    schedulers: DashMap<SessionId, RefreshScheduler>,
    config: SchedulerConfig,
}

impl SessionManager {
    /// Create a manager around a configured client
    #[must_use]
    pub fn new(client: OAuth2Client, policy: ReusePolicy, config: SchedulerConfig) -> Self {
        Self {
            client: Arc::new(client),
            flows: OAuthFlowManager::new(),
            store: Arc::new(TokenStore::new(policy)),
            schedulers: DashMap::new(),
            config,
        }
    }

    /// Shared token store
    #[must_use]
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Start a login: returns the authorization redirect
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::EntropyUnavailable`] or [`OAuthError::InvalidConfig`]
    pub fn begin_login(&self) -> Result<LoginRequest, OAuthError> {
        self.flows.purge_expired();
        self.prune_failed();
        self.store
            .purge_revoked_families(Duration::seconds(REVOKED_FAMILY_RETENTION_SECONDS));
        let (state, pkce, nonce) = self.flows.begin()?;
        let url = self.client.authorization_url(&state, &pkce, Some(&nonce))?;
        Ok(LoginRequest { url, state })
    }

    /// Finish a login from the callback's `state` and `code`
    ///
    /// # Errors
    ///
    /// - [`OAuthError::InvalidState`] for unknown, reused or expired `state`
    /// - [`OAuthError::ExchangeRejected`] when the server refuses the code
    /// - [`OAuthError::NetworkFailure`] when the token endpoint is unreachable
    pub async fn complete_login(&self, state: &str, code: &str) -> Result<SessionId, OAuthError> {
        let pending = self.flows.complete(state)?;
        let tokens = self.client.exchange_code(code, pending.pkce).await?;
        let session = self.store.create_session(tokens);

        let refresher: Arc<dyn TokenRefresher> = self.client.clone();
        let scheduler =
            RefreshScheduler::new(session.id, Arc::clone(&self.store), refresher, self.config);
        scheduler.start()?;
        self.schedulers.insert(session.id, scheduler);

        info!(session_id = %session.id, "Login completed");
        Ok(session.id)
    }

    /// Drop schedulers of sessions whose refresh failed for good; returns how many
    pub fn prune_failed(&self) -> usize {
        let mut pruned = 0;
        self.schedulers.retain(|_, scheduler| {
            let failed = matches!(scheduler.state(), RefreshState::Failed { .. });
            if failed {
                scheduler.shutdown();
                pruned += 1;
            }
            !failed
        });
        if pruned > 0 {
            debug!(pruned, "Failed refresh schedulers pruned");
        }
        pruned
    }

    /// Number of sessions with a refresh scheduler
    #[must_use]
    pub fn scheduled_sessions(&self) -> usize {
        self.schedulers.len()
    }

    fn scheduler(&self, id: SessionId) -> Result<RefreshScheduler, OAuthError> {
        self.schedulers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OAuthError::session_not_found(id))
    }

    /// A usable access token, refreshing first when it is about to expire
    ///
    /// # Errors
    ///
    /// - [`OAuthError::SessionNotFound`] for unknown sessions
    /// - [`OAuthError::ReauthenticationRequired`] when the session can no longer be refreshed
    pub async fn access_token(&self, id: SessionId) -> Result<String, OAuthError> {
        let tokens = self.store.tokens(id)?;
        if !tokens.expires_within(self.config.lead_time) {
            return Ok(tokens.access_token);
        }
        if tokens.is_refreshable() {
            return Ok(self.refresh(id).await?.access_token);
        }
        if tokens.is_expired() {
            return Err(OAuthError::ReauthenticationRequired);
        }
        Ok(tokens.access_token)
    }

    /// Refresh now, joining any refresh already in flight
    ///
    /// # Errors
    ///
    /// See [`RefreshScheduler::refresh_now`]
    pub async fn refresh(&self, id: SessionId) -> Result<TokenSet, OAuthError> {
        self.scheduler(id)?.refresh_now().await
    }

    /// Current refresh state of a session
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SessionNotFound`]
    pub fn refresh_state(&self, id: SessionId) -> Result<RefreshState, OAuthError> {
        Ok(self.scheduler(id)?.state())
    }

    /// Watch refresh state transitions of a session
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SessionNotFound`]
    pub fn subscribe(&self, id: SessionId) -> Result<watch::Receiver<RefreshState>, OAuthError> {
        Ok(self.scheduler(id)?.subscribe())
    }

    /// End a session: stop its scheduler, drop its tokens and revoke them.
    ///
    /// Revocation is best effort; the session is gone locally either way.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SessionNotFound`] if no such session exists
    pub async fn logout(&self, id: SessionId) -> Result<(), OAuthError> {
        if let Some((_, scheduler)) = self.schedulers.remove(&id) {
            scheduler.shutdown();
        }
        let session = self
            .store
            .destroy(id)
            .ok_or_else(|| OAuthError::session_not_found(id))?;

        if self.client.config().revocation_endpoint.is_some() {
            let (token, hint) = match &session.tokens.refresh_token {
                Some(refresh) => (refresh.as_str(), TokenTypeHint::RefreshToken),
                None => (session.tokens.access_token.as_str(), TokenTypeHint::AccessToken),
            };
            if let Err(error) = self.client.revoke_token(token, hint).await {
                warn!(session_id = %id, error = %error, "Token revocation failed during logout");
            }
        }

        info!(session_id = %id, "Logged out");
        Ok(())
    }

    /// Shut down every scheduler
    pub fn shutdown(&self) {
        for entry in &self.schedulers {
            entry.value().shutdown();
        }
        self.schedulers.clear();
    }
}
