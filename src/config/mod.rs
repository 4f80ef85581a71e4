// ABOUTME: Configuration management for the OAuth client, refresh scheduler and validator
// ABOUTME: Settings come from AUTHFLOW_* environment variables with defaults from authflow-core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Environment-based configuration
pub mod environment;

pub use environment::AuthFlowConfig;
