// ABOUTME: In-memory session store holding token sets per login session
// ABOUTME: Tracks refresh-token families, rejects reuse of rotated tokens and applies the reuse policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Token Store
//!
//! Sessions are grouped into refresh families: every session created from
//! one login, together with the SHA-256 digests of every refresh token that
//! was rotated out of them. Presenting a retired token is treated as
//! compromise of the family.
//!
//! A family is dropped once its last session is destroyed. A revoked family
//! is kept as a tombstone, without its retired digests, until
//! [`TokenStore::purge_revoked_families`] removes it.
//!
//! Lock order is family entry before session entry. Methods never hold a
//! session entry while acquiring a family entry.

use crate::errors::OAuthError;
use crate::oauth2_client::token::{fingerprint, TokenSet};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Refresh family identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(Uuid);

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What to tear down when a rotated refresh token is presented again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReusePolicy {
    /// Revoke every session in the token family
    #[default]
    Family,
    /// Destroy only the session that presented the token
    Session,
}

impl FromStr for ReusePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "family" => Ok(Self::Family),
            "session" => Ok(Self::Session),
            other => Err(format!("unknown reuse policy '{other}' (expected family or session)")),
        }
    }
}

impl fmt::Display for ReusePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Family => f.write_str("family"),
            Self::Session => f.write_str("session"),
        }
    }
}

/// One authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Refresh family the session belongs to
    pub family_id: FamilyId,
    /// Current tokens
    pub tokens: TokenSet,
    /// When the session was created by a code exchange
    pub created_at: DateTime<Utc>,
    /// Last successful refresh
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Incremented on every refresh
    pub generation: u64,
}

#[derive(Debug, Default)]
struct RefreshFamily {
    sessions: HashSet<SessionId>,
    retired: HashSet<String>,
    revoked_at: Option<DateTime<Utc>>,
}

impl RefreshFamily {
    const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Concurrent in-memory session store
#[derive(Debug, Default)]
pub struct TokenStore {
    sessions: DashMap<SessionId, Session>,
    families: DashMap<FamilyId, RefreshFamily>,
    policy: ReusePolicy,
}

impl TokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new(policy: ReusePolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            families: DashMap::new(),
            policy,
        }
    }

    /// Reuse policy in effect
    #[must_use]
    pub const fn policy(&self) -> ReusePolicy {
        self.policy
    }

    /// Store the tokens of a fresh login in a new family
    pub fn create_session(&self, tokens: TokenSet) -> Session {
        let session = Self::new_session(FamilyId(Uuid::new_v4()), tokens);
        let mut family = RefreshFamily::default();
        family.sessions.insert(session.id);
        self.families.insert(session.family_id, family);
        self.insert_session(session)
    }

    /// Store tokens as an additional session of an existing family
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::ReauthenticationRequired`] if the family is
    /// unknown or was revoked
    pub fn create_session_in_family(
        &self,
        family_id: FamilyId,
        tokens: TokenSet,
    ) -> Result<Session, OAuthError> {
        let session = Self::new_session(family_id, tokens);
        match self.families.get_mut(&family_id) {
            Some(mut family) if !family.is_revoked() => {
                family.sessions.insert(session.id);
            }
            _ => return Err(OAuthError::ReauthenticationRequired),
        }
        Ok(self.insert_session(session))
    }

    fn new_session(family_id: FamilyId, tokens: TokenSet) -> Session {
        Session {
            id: SessionId::new(),
            family_id,
            tokens,
            created_at: Utc::now(),
            refreshed_at: None,
            generation: 0,
        }
    }

    fn insert_session(&self, session: Session) -> Session {
        self.sessions.insert(session.id, session.clone());
        info!(session_id = %session.id, family_id = %session.family_id, "Session created");
        session
    }

    /// Snapshot of a session
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SessionNotFound`]
    pub fn get(&self, id: SessionId) -> Result<Session, OAuthError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OAuthError::session_not_found(id))
    }

    /// Current tokens of a session
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SessionNotFound`]
    pub fn tokens(&self, id: SessionId) -> Result<TokenSet, OAuthError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.tokens.clone())
            .ok_or_else(|| OAuthError::session_not_found(id))
    }

    /// Refresh token the session would redeem next
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SessionNotFound`]
    pub fn current_refresh_token(&self, id: SessionId) -> Result<Option<String>, OAuthError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.tokens.refresh_token.clone())
            .ok_or_else(|| OAuthError::session_not_found(id))
    }

    /// Rotate a refresh result into the session.
    ///
    /// `used_refresh_token` is the token that was redeemed to obtain `next`.
    /// It must be the session's current refresh token; a retired token (or
    /// any token other than the current one) triggers the reuse policy.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::SessionNotFound`] if the session is gone
    /// - [`OAuthError::RefreshReuseDetected`] if `used_refresh_token` was already rotated out
    pub fn complete_refresh(
        &self,
        id: SessionId,
        used_refresh_token: &str,
        next: TokenSet,
    ) -> Result<Session, OAuthError> {
        let family_id = self.get(id)?.family_id;
        let used_digest = digest(used_refresh_token);

        let rotated = {
            let mut family = self
                .families
                .get_mut(&family_id)
                .ok_or_else(|| OAuthError::session_not_found(id))?;
            if family.is_revoked() {
                return Err(OAuthError::ReauthenticationRequired);
            }

            let mut session = self
                .sessions
                .get_mut(&id)
                .ok_or_else(|| OAuthError::session_not_found(id))?;
            let reused = family.retired.contains(&used_digest)
                || session.tokens.refresh_token.as_deref() != Some(used_refresh_token);

            if reused {
                None
            } else {
                if next
                    .refresh_token
                    .as_deref()
                    .is_some_and(|fresh| fresh != used_refresh_token)
                {
                    family.retired.insert(used_digest);
                }
                let previous = session.tokens.clone();
                session.tokens = previous.rotated(next);
                session.generation += 1;
                session.refreshed_at = Some(Utc::now());
                Some(session.clone())
            }
        };

        if let Some(session) = rotated {
            debug!(
                session_id = %id,
                generation = session.generation,
                "Token set rotated"
            );
            return Ok(session);
        }

        warn!(
            session_id = %id,
            family_id = %family_id,
            refresh_token = %fingerprint(used_refresh_token),
            "Retired refresh token presented"
        );
        self.handle_reuse(id);
        Err(OAuthError::RefreshReuseDetected)
    }

    /// Apply the reuse policy to the session that presented a reused token.
    ///
    /// Returns the sessions that were destroyed.
    pub fn handle_reuse(&self, id: SessionId) -> Vec<SessionId> {
        match self.policy {
            ReusePolicy::Session => self.destroy(id).map(|s| vec![s.id]).unwrap_or_default(),
            ReusePolicy::Family => match self.sessions.get(&id).map(|s| s.family_id) {
                Some(family_id) => self.revoke_family(family_id),
                None => Vec::new(),
            },
        }
    }

    /// Remove a session, dropping its family when no live session is left
    pub fn destroy(&self, id: SessionId) -> Option<Session> {
        let (_, session) = self.sessions.remove(&id)?;
        let family_id = session.family_id;
        if let Some(mut family) = self.families.get_mut(&family_id) {
            family.sessions.remove(&id);
        }
        let dropped = self
            .families
            .remove_if(&family_id, |_, family| {
                !family.is_revoked() && family.sessions.is_empty()
            })
            .is_some();
        if dropped {
            debug!(family_id = %family_id, "Refresh family dropped");
        }
        info!(session_id = %id, "Session destroyed");
        Some(session)
    }

    /// Revoke a family and destroy all of its sessions
    ///
    /// The family stays behind as a tombstone so no session can join it.
    pub fn revoke_family(&self, family_id: FamilyId) -> Vec<SessionId> {
        let members: Vec<SessionId> = match self.families.get_mut(&family_id) {
            Some(mut family) => {
                if !family.is_revoked() {
                    family.revoked_at = Some(Utc::now());
                }
                family.retired.clear();
                family.sessions.drain().collect()
            }
            None => return Vec::new(),
        };
        for id in &members {
            self.sessions.remove(id);
        }
        warn!(family_id = %family_id, sessions = members.len(), "Refresh family revoked");
        members
    }

    /// Forget revoked families older than `retention`; returns how many were removed
    pub fn purge_revoked_families(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut purged = 0;
        self.families.retain(|_, family| {
            let expired = family.revoked_at.is_some_and(|at| at <= cutoff);
            if expired {
                purged += 1;
            }
            !expired
        });
        if purged > 0 {
            debug!(purged, "Revoked refresh families purged");
        }
        purged
    }

    /// Number of tracked families, revoked tombstones included
    #[must_use]
    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Sessions currently in a family
    #[must_use]
    pub fn family_sessions(&self, family_id: FamilyId) -> Vec<SessionId> {
        self.families
            .get(&family_id)
            .map(|family| family.sessions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of live sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
