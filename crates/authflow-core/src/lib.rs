// ABOUTME: Core error types and constants for the authflow OAuth toolkit
// ABOUTME: Foundation crate with the AppError envelope, OAuth error taxonomy and protocol constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Authflow Core
//!
//! Foundation crate providing shared error types and constants for the
//! authflow client and resource-server modules. It is designed to change
//! infrequently so dependent crates keep their incremental compilation
//! benefits.
//!
//! ## Modules
//!
//! - **errors**: `AppError`/`ErrorCode` envelope plus the `OAuthError` domain taxonomy
//! - **constants**: OAuth parameter names, grant types and configuration defaults

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Protocol constants and configuration defaults organized by domain
pub mod constants;
