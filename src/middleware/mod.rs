// ABOUTME: HTTP middleware for resource servers built on axum
// ABOUTME: Provides the bearer-token extractor backed by the JWT validator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Bearer authentication extractor
pub mod auth;

pub use auth::{bearer_token, BearerClaims, BearerRejection};
