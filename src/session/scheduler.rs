// ABOUTME: Silent refresh scheduler renewing a session's tokens shortly before they expire
// ABOUTME: Single-flight refresh state machine with timer rescheduling and cancellation on teardown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Silent Refresh
//!
//! Each session owns one [`RefreshScheduler`]. Its state moves
//! `Idle -> Scheduled -> Refreshing -> Scheduled` while refreshes succeed,
//! and into `Failed` once a refresh fails for any reason other than a
//! transient network error. `Failed` is terminal until a new login.
//!
//! At most one refresh per session is in flight. The refresh runs in its
//! own task, so dropping a caller that is waiting on it does not abort it;
//! every concurrent caller observes the same outcome.

use super::store::{SessionId, TokenStore};
use crate::constants::time::{DEFAULT_REFRESH_LEAD_SECONDS, DEFAULT_REFRESH_RETRY_SECONDS};
use crate::errors::OAuthError;
use crate::oauth2_client::{OAuth2Client, TokenSet};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Redeems refresh tokens; implemented by [`OAuth2Client`]
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange `refresh_token` for a new token set
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OAuthError>;
}

#[async_trait]
impl TokenRefresher for OAuth2Client {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OAuthError> {
        self.refresh_token(refresh_token).await
    }
}

/// Scheduler state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshState {
    /// Nothing scheduled (no expiry known, or no refresh token)
    Idle,
    /// A refresh will start at `due_at`
    Scheduled {
        /// When the timer fires
        due_at: DateTime<Utc>,
    },
    /// A refresh is in flight
    Refreshing,
    /// Refresh is impossible; the user must log in again
    Failed {
        /// Why the last refresh failed
        reason: String,
    },
}

/// Timing for silent refresh
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Refresh this long before the access token expires
    pub lead_time: Duration,
    /// Wait this long before retrying after a network failure
    pub retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lead_time: Duration::seconds(DEFAULT_REFRESH_LEAD_SECONDS),
            retry_delay: Duration::seconds(DEFAULT_REFRESH_RETRY_SECONDS),
        }
    }
}

type Outcome = Option<Result<TokenSet, OAuthError>>;

#[derive(Default)]
struct Control {
    in_flight: Option<watch::Receiver<Outcome>>,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    session_id: SessionId,
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    config: SchedulerConfig,
    state: watch::Sender<RefreshState>,
    control: Mutex<Control>,
    cancel: CancellationToken,
}

/// Handle to one session's refresh scheduler; clones share the same scheduler
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    /// Create an idle scheduler for `session_id`
    #[must_use]
    pub fn new(
        session_id: SessionId,
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        config: SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(RefreshState::Idle);
        Self {
            inner: Arc::new(Inner {
                session_id,
                store,
                refresher,
                config,
                state,
                control: Mutex::new(Control::default()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Arm the timer from the session's current expiry
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::SessionNotFound`] if the session is gone
    pub fn start(&self) -> Result<RefreshState, OAuthError> {
        let tokens = self.inner.store.tokens(self.inner.session_id)?;
        let mut control = self.inner.lock();
        self.inner.schedule_from(&mut control, &tokens);
        Ok(self.state())
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RefreshState {
        self.inner.state.borrow().clone()
    }

    /// Observe state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.inner.state.subscribe()
    }

    /// Refresh now, or join the refresh already in flight
    ///
    /// # Errors
    ///
    /// - [`OAuthError::ReauthenticationRequired`] if the refresh failed or the scheduler already failed
    /// - [`OAuthError::NetworkFailure`] if this attempt failed on the network (a retry is scheduled)
    /// - [`OAuthError::SessionClosed`] if the scheduler was shut down
    pub async fn refresh_now(&self) -> Result<TokenSet, OAuthError> {
        let mut outcome = self.inner.begin_refresh()?;
        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| OAuthError::SessionClosed)?;
        match &*settled {
            Some(result) => result.clone(),
            None => Err(OAuthError::SessionClosed),
        }
    }

    /// Cancel the timer and any in-flight refresh
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(timer) = self.inner.lock().timer.take() {
            timer.abort();
        }
        debug!(session_id = %self.inner.session_id, "Refresh scheduler shut down");
    }

    /// Whether [`Self::shutdown`] was called
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_refresh(self: &Arc<Self>) -> Result<watch::Receiver<Outcome>, OAuthError> {
        let mut control = self.lock();

        if self.cancel.is_cancelled() {
            return Err(OAuthError::SessionClosed);
        }
        if matches!(*self.state.borrow(), RefreshState::Failed { .. }) {
            return Err(OAuthError::ReauthenticationRequired);
        }
        if let Some(in_flight) = &control.in_flight {
            debug!(session_id = %self.session_id, "Joining in-flight refresh");
            return Ok(in_flight.clone());
        }

        if let Some(timer) = control.timer.take() {
            timer.abort();
        }
        let (sender, receiver) = watch::channel(None);
        control.in_flight = Some(receiver.clone());
        self.state.send_replace(RefreshState::Refreshing);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::select! {
                () = inner.cancel.cancelled() => Err(OAuthError::SessionClosed),
                result = inner.run_refresh() => result,
            };
            inner.finish(result, &sender);
        });

        Ok(receiver)
    }

    async fn run_refresh(&self) -> Result<TokenSet, OAuthError> {
        let refresh_token = self
            .store
            .current_refresh_token(self.session_id)?
            .ok_or(OAuthError::ReauthenticationRequired)?;

        let next = self.refresher.refresh(&refresh_token).await?;
        let session = self
            .store
            .complete_refresh(self.session_id, &refresh_token, next)?;
        Ok(session.tokens)
    }

    fn finish(self: &Arc<Self>, result: Result<TokenSet, OAuthError>, sender: &watch::Sender<Outcome>) {
        let mut control = self.lock();
        control.in_flight = None;

        let delivered = match result {
            Ok(tokens) => {
                info!(session_id = %self.session_id, "Silent refresh succeeded");
                self.schedule_from(&mut control, &tokens);
                Ok(tokens)
            }
            Err(error) if error.is_retryable() => {
                let due_at = Utc::now() + self.config.retry_delay;
                warn!(session_id = %self.session_id, error = %error, "Refresh failed on the network, retrying later");
                self.schedule_at(&mut control, due_at);
                Err(error)
            }
            Err(OAuthError::SessionClosed) => {
                self.state.send_replace(RefreshState::Idle);
                Err(OAuthError::SessionClosed)
            }
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "Silent refresh failed, re-authentication required");
                if error == OAuthError::RefreshReuseDetected {
                    self.store.handle_reuse(self.session_id);
                } else {
                    self.store.destroy(self.session_id);
                }
                self.state.send_replace(RefreshState::Failed {
                    reason: error.to_string(),
                });
                Err(OAuthError::ReauthenticationRequired)
            }
        };

        sender.send_replace(Some(delivered));
    }

    fn schedule_from(self: &Arc<Self>, control: &mut Control, tokens: &TokenSet) {
        match tokens.expires_at {
            Some(expires_at) if tokens.is_refreshable() => {
                // tokens shorter-lived than the lead time refresh at half-life
                let lead = self.config.lead_time.min((expires_at - Utc::now()) / 2);
                self.schedule_at(control, expires_at - lead);
            }
            _ => {
                if let Some(timer) = control.timer.take() {
                    timer.abort();
                }
                self.state.send_replace(RefreshState::Idle);
            }
        }
    }

    fn schedule_at(self: &Arc<Self>, control: &mut Control, due_at: DateTime<Utc>) {
        if let Some(timer) = control.timer.take() {
            timer.abort();
        }

        let delay = (due_at - Utc::now()).to_std().unwrap_or_default();
        let scheduler: Weak<Self> = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        control.timer = Some(tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if let Some(inner) = scheduler.upgrade() {
                        if let Err(error) = inner.begin_refresh() {
                            debug!(error = %error, "Timer-triggered refresh not started");
                        }
                    }
                }
            }
        }));

        self.state.send_replace(RefreshState::Scheduled { due_at });
        debug!(session_id = %self.session_id, due_at = %due_at, "Refresh scheduled");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
