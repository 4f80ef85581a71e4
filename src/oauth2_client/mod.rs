// ABOUTME: OAuth 2.0 client side of the authorization code flow with PKCE
// ABOUTME: PKCE generation, authorization URLs, code exchange, refresh, revocation and discovery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OAuth 2.0 Client Module
//!
//! The application acts as an OAuth 2.0 public (or confidential) client of
//! an external authorization server. This module handles:
//! - `PKCE` verifier and challenge generation (RFC 7636)
//! - Authorization redirect URLs bound to a `state` and `nonce`
//! - Code exchange, refresh-token redemption and revocation
//! - OpenID Connect provider discovery

/// Core OAuth 2.0 client implementation
pub mod client;
/// Provider metadata discovery
pub mod discovery;
/// Pending authorization tracking between redirect and callback
pub mod flow_manager;
/// Proof Key for Code Exchange
pub mod pkce;
/// Token sets and token endpoint responses
pub mod token;

pub use client::{OAuth2Client, OAuth2Config, TokenTypeHint};
pub use discovery::ProviderMetadata;
pub use flow_manager::{OAuthFlowManager, PendingAuthorization};
pub use pkce::{derive_challenge, verify_challenge, PkcePair};
pub use token::{fingerprint, TokenSet};
