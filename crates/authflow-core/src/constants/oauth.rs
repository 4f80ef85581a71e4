// ABOUTME: OAuth 2.0 wire-level constants (parameter names, grant types, error codes)
// ABOUTME: Shared by the authorization request builder, token client and test doubles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Request parameter names (RFC 6749, RFC 7636, RFC 7009, OIDC Core)
pub mod params {
    /// `response_type`
    pub const RESPONSE_TYPE: &str = "response_type";
    /// `client_id`
    pub const CLIENT_ID: &str = "client_id";
    /// `client_secret`
    pub const CLIENT_SECRET: &str = "client_secret";
    /// `redirect_uri`
    pub const REDIRECT_URI: &str = "redirect_uri";
    /// `scope`
    pub const SCOPE: &str = "scope";
    /// `state`
    pub const STATE: &str = "state";
    /// `nonce`
    pub const NONCE: &str = "nonce";
    /// `audience` (Auth0 API identifier)
    pub const AUDIENCE: &str = "audience";
    /// `code_challenge`
    pub const CODE_CHALLENGE: &str = "code_challenge";
    /// `code_challenge_method`
    pub const CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
    /// `code_verifier`
    pub const CODE_VERIFIER: &str = "code_verifier";
    /// `grant_type`
    pub const GRANT_TYPE: &str = "grant_type";
    /// `code`
    pub const CODE: &str = "code";
    /// `refresh_token`
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// `token`
    pub const TOKEN: &str = "token";
    /// `token_type_hint`
    pub const TOKEN_TYPE_HINT: &str = "token_type_hint";
}

/// Grant types
pub mod grant_types {
    /// Authorization code grant
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    /// Refresh token grant
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// `response_type` values
pub mod response_types {
    /// Authorization code flow
    pub const CODE: &str = "code";
}

/// Token endpoint error codes (RFC 6749 §5.2)
pub mod error_codes {
    /// Code, verifier or refresh token was rejected
    pub const INVALID_GRANT: &str = "invalid_grant";
    /// Client authentication failed
    pub const INVALID_CLIENT: &str = "invalid_client";
    /// Malformed request
    pub const INVALID_REQUEST: &str = "invalid_request";
    /// Bearer token rejected by a resource server (RFC 6750)
    pub const INVALID_TOKEN: &str = "invalid_token";
}
