// ABOUTME: Shared HTTP client utilities with connection pooling and timeout configuration
// ABOUTME: Provides the clients used for token, revocation, discovery and key-set calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::network::{OAUTH_CONNECT_TIMEOUT_SECS, OAUTH_REQUEST_TIMEOUT_SECS};
use reqwest::{redirect, Client, ClientBuilder};
use std::sync::OnceLock;
use std::time::Duration;

/// Global shared HTTP client for OAuth traffic
static SHARED_OAUTH_CLIENT: OnceLock<Client> = OnceLock::new();

/// Create a new HTTP client with custom timeout settings
///
/// Falls back to a default client if the builder fails (e.g. TLS backend
/// initialization), matching `reqwest::Client::new` behaviour.
#[must_use]
pub fn create_client_with_timeout(timeout_secs: u64, connect_timeout_secs: u64) -> Client {
    base_builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Create a new HTTP client optimized for OAuth flows
///
/// Token exchanges are fast operations, so timeouts are short. Redirects
/// are never followed.
#[must_use]
pub fn oauth_client() -> Client {
    create_client_with_timeout(OAUTH_REQUEST_TIMEOUT_SECS, OAUTH_CONNECT_TIMEOUT_SECS)
}

/// Get or create the process-wide OAuth client
pub fn shared_oauth_client() -> &'static Client {
    SHARED_OAUTH_CLIENT.get_or_init(oauth_client)
}

fn base_builder() -> ClientBuilder {
    ClientBuilder::new()
        .redirect(redirect::Policy::none())
        .user_agent(concat!("authflow/", env!("CARGO_PKG_VERSION")))
}
