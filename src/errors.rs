// ABOUTME: Error types used across the crate, re-exported from authflow-core
// ABOUTME: AppError is the boundary envelope; OAuthError is the protocol taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

pub use authflow_core::errors::oauth::INVALID_TOKEN_MESSAGE;
pub use authflow_core::errors::{
    AppError, AppResult, ErrorCode, ErrorContext, ErrorResponse, ErrorResponseDetails, OAuthError,
};
