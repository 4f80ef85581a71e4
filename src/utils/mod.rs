// ABOUTME: Utility modules for common functionality across the crate
// ABOUTME: Contains the shared HTTP client builders and retry helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// HTTP client configuration and helpers
pub mod http_client;
/// Exponential backoff for idempotent reads
pub mod retry;
