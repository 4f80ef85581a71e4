// ABOUTME: Main library entry point for the authflow OAuth 2.0 / OIDC toolkit
// ABOUTME: Authorization code flow with PKCE, refresh-token rotation and bearer JWT validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # authflow
//!
//! Client and resource-server halves of OAuth 2.0 / OpenID Connect as used
//! by web applications.
//!
//! ## Features
//!
//! - **PKCE**: RFC 7636 S256 verifier/challenge generation from the OS CSPRNG
//! - **Authorization code flow**: redirect URLs bound to `state` and `nonce`,
//!   single-use code exchange
//! - **Sessions**: token store with refresh families and reuse detection
//! - **Silent refresh**: single-flight, timer-driven refresh ahead of expiry
//! - **Validation**: bearer JWT checks against a cached JWKS, plus an axum extractor
//!
//! ## Architecture
//!
//! - **`oauth2_client`**: PKCE, authorization URLs, token endpoint calls, discovery
//! - **session**: `TokenStore`, `RefreshScheduler`, `SessionManager`
//! - **jwt**: `JwksCache`, `JwtValidator`, `Claims`
//! - **middleware**: `BearerClaims` extractor (feature `http-response`)
//! - **config**: `AUTHFLOW_*` environment configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use authflow::config::AuthFlowConfig;
//! use authflow::oauth2_client::OAuth2Client;
//! use authflow::session::SessionManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthFlowConfig::from_env()?;
//! let manager = SessionManager::new(
//!     OAuth2Client::new(config.client.clone())?,
//!     config.reuse_policy,
//!     config.scheduler_config(),
//! );
//!
//! let login = manager.begin_login()?;
//! println!("Redirect to {}", login.url);
//!
//! // ...later, in the callback handler:
//! let session = manager.complete_login(&login.state, "code-from-callback").await?;
//! let access_token = manager.access_token(session).await?;
//! # let _ = access_token;
//! # Ok(())
//! # }
//! ```

/// Configuration from environment variables
pub mod config;

/// Error envelope and OAuth error taxonomy
pub mod errors;

/// Resource-server JWT validation
pub mod jwt;

/// Structured logging setup
pub mod logging;

/// HTTP middleware for resource servers
#[cfg(feature = "http-response")]
pub mod middleware;

/// OAuth 2.0 client for the authorization code flow
pub mod oauth2_client;

/// Client-side sessions and silent refresh
pub mod session;

/// Shared HTTP client and retry helpers
pub mod utils;

/// Protocol constants and configuration defaults
pub use authflow_core::constants;
