// ABOUTME: OAuth 2.0 / OIDC protocol error taxonomy for client and resource-server flows
// ABOUTME: Classifies failures as retryable or re-authentication-requiring and maps them to AppError
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OAuth Error Types
//!
//! `OAuthError` is the taxonomy every protocol operation returns. Only
//! [`OAuthError::NetworkFailure`] is retryable, and only idempotent reads
//! (key-set fetches, discovery) retry it automatically.
//!
//! Converting into [`AppError`] deliberately collapses every token
//! validation failure into one `AUTH_INVALID` error so that resource
//! servers do not reveal which check rejected a token.

use super::{AppError, ErrorCode};
use thiserror::Error;

/// Message returned for every rejected bearer token
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or has expired";

/// Errors produced by the OAuth client, session and validator modules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OAuthError {
    /// The authorization server refused a code exchange (bad code, verifier mismatch, expired or reused code)
    #[error("authorization code exchange rejected: {reason}")]
    ExchangeRejected {
        /// Server-provided reason
        reason: String,
    },

    /// A rotated refresh token was presented again
    #[error("refresh token reuse detected")]
    RefreshReuseDetected,

    /// Token `exp` is in the past
    #[error("token has expired")]
    TokenExpired,

    /// Token signature did not verify, or no key is known for its `kid`
    #[error("token signature is invalid: {reason}")]
    SignatureInvalid {
        /// What failed
        reason: String,
    },

    /// Token `iss` does not match the configured issuer
    #[error("token issuer is not trusted")]
    UnknownIssuer,

    /// Token `aud` does not contain the configured audience
    #[error("token audience does not match")]
    WrongAudience,

    /// Token could not be decoded or uses a disallowed algorithm
    #[error("token is malformed: {details}")]
    MalformedToken {
        /// Decoder message
        details: String,
    },

    /// Transport-level failure talking to the authorization server or key-set endpoint
    #[error("network failure: {message}")]
    NetworkFailure {
        /// Underlying transport error
        message: String,
    },

    /// The authorization server answered with an error that is not a grant rejection
    #[error("authorization server error ({status}): {error}")]
    AuthorizationServer {
        /// HTTP status code
        status: u16,
        /// RFC 6749 `error` code, or a summary when the body was not OAuth JSON
        error: String,
        /// Optional `error_description`
        description: Option<String>,
    },

    /// Callback `state` is unknown, already used, or expired
    #[error("authorization state is unknown or expired")]
    InvalidState,

    /// A PKCE verifier does not satisfy RFC 7636 length or alphabet rules
    #[error("invalid PKCE verifier: {reason}")]
    InvalidVerifier {
        /// Which rule was violated
        reason: String,
    },

    /// The OS entropy source could not be read
    #[error("secure random source unavailable: {message}")]
    EntropyUnavailable {
        /// Underlying error
        message: String,
    },

    /// The session can no longer be refreshed; a new login is required
    #[error("re-authentication required")]
    ReauthenticationRequired,

    /// No session with this identifier exists
    #[error("session {session_id} not found")]
    SessionNotFound {
        /// Requested session identifier
        session_id: String,
    },

    /// The session was torn down while an operation was in flight
    #[error("session closed")]
    SessionClosed,

    /// Client or validator configuration is unusable
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong
        message: String,
    },
}

impl OAuthError {
    /// Create a network failure from any displayable error
    pub fn network(error: impl std::fmt::Display) -> Self {
        Self::NetworkFailure {
            message: error.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a signature error
    pub fn signature(reason: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            reason: reason.into(),
        }
    }

    /// Create a session-not-found error
    pub fn session_not_found(session_id: impl std::fmt::Display) -> Self {
        Self::SessionNotFound {
            session_id: session_id.to_string(),
        }
    }

    /// Whether retrying the same operation may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. })
    }

    /// Whether the caller must send the user through a new login
    #[must_use]
    pub const fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::ExchangeRejected { .. }
                | Self::RefreshReuseDetected
                | Self::ReauthenticationRequired
                | Self::SessionNotFound { .. }
                | Self::SessionClosed
                | Self::InvalidState
        )
    }

    /// Whether this error came from bearer token validation
    #[must_use]
    pub const fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired
                | Self::SignatureInvalid { .. }
                | Self::UnknownIssuer
                | Self::WrongAudience
                | Self::MalformedToken { .. }
        )
    }
}

impl From<OAuthError> for AppError {
    fn from(error: OAuthError) -> Self {
        if error.is_token_rejection() {
            return Self::new(ErrorCode::AuthInvalid, INVALID_TOKEN_MESSAGE);
        }
        match error {
            OAuthError::NetworkFailure { message } => {
                Self::new(ErrorCode::ExternalServiceUnavailable, message)
            }
            OAuthError::AuthorizationServer {
                status,
                error,
                description,
            } => Self::new(ErrorCode::ExternalAuthFailed, error).with_details(
                serde_json::json!({ "status": status, "description": description }),
            ),
            OAuthError::InvalidVerifier { reason } => Self::invalid_input(reason),
            OAuthError::InvalidConfig { message } => Self::config_invalid(message),
            OAuthError::EntropyUnavailable { message } => Self::internal(message),
            OAuthError::SessionNotFound { session_id } => {
                Self::auth_required().with_session_id(session_id)
            }
            other => Self::new(ErrorCode::AuthRequired, other.to_string()),
        }
    }
}
