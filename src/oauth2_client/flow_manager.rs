// ABOUTME: Pending authorization tracking between the login redirect and the callback
// ABOUTME: Binds each OAuth state to its PKCE verifier and nonce, single-use with expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::pkce::PkcePair;
use crate::constants::time::PENDING_AUTHORIZATION_TTL_SECONDS;
use crate::errors::OAuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, warn};

/// Random bytes behind each `state` and `nonce` value
const RANDOM_VALUE_BYTES: usize = 32;

/// Everything needed to complete one authorization once the callback arrives
#[derive(Debug)]
pub struct PendingAuthorization {
    /// `PKCE` pair whose challenge went out in the redirect
    pub pkce: PkcePair,
    /// OIDC nonce sent in the redirect
    pub nonce: Option<String>,
    /// When the redirect was issued
    pub created_at: DateTime<Utc>,
}

/// Tracks authorization requests that are waiting for their callback
pub struct OAuthFlowManager {
    pending: DashMap<String, PendingAuthorization>,
    ttl: Duration,
}

impl OAuthFlowManager {
    /// Create a flow manager with the default 10 minute expiry
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(PENDING_AUTHORIZATION_TTL_SECONDS))
    }

    /// Create a flow manager with a custom expiry
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    /// Start a new authorization: generates `state`, `nonce` and a `PKCE` pair
    ///
    /// Returns `(state, pkce, nonce)`; all three go into the redirect, and the
    /// pair is kept here until [`Self::complete`] hands it back.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::EntropyUnavailable`] if the OS random source fails
    pub fn begin(&self) -> Result<(String, PkcePair, String), OAuthError> {
        let state = random_token()?;
        let nonce = random_token()?;
        let pkce = PkcePair::generate()?;

        self.pending.insert(
            state.clone(),
            PendingAuthorization {
                pkce: pkce.clone(),
                nonce: Some(nonce.clone()),
                created_at: Utc::now(),
            },
        );
        debug!(pending = self.pending.len(), "Authorization started");
        Ok((state, pkce, nonce))
    }

    /// Consume the pending authorization for `state`.
    ///
    /// A state can be completed exactly once; unknown, reused and expired
    /// states all fail the same way.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidState`]
    pub fn complete(&self, state: &str) -> Result<PendingAuthorization, OAuthError> {
        let (_, pending) = self.pending.remove(state).ok_or_else(|| {
            warn!("Callback with unknown or already used state");
            OAuthError::InvalidState
        })?;

        if Utc::now() - pending.created_at > self.ttl {
            warn!("Callback for expired authorization");
            return Err(OAuthError::InvalidState);
        }
        Ok(pending)
    }

    /// Drop authorizations older than the expiry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut purged = 0;
        self.pending.retain(|_, pending| {
            let live = pending.created_at > cutoff;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    /// Number of authorizations awaiting a callback
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no authorization is awaiting a callback
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for OAuthFlowManager {
    fn default() -> Self {
        Self::new()
    }
}

/// URL-safe random value for `state` and `nonce`
fn random_token() -> Result<String, OAuthError> {
    let mut bytes = [0_u8; RANDOM_VALUE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OAuthError::EntropyUnavailable {
            message: e.to_string(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
