// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for PKCE, refresh scheduling, key caching and configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single
//! large file.

/// OAuth 2.0 wire-level names (parameters, grant types, error codes)
pub mod oauth;

pub use oauth::*;

/// PKCE (RFC 7636) limits
pub mod pkce {
    /// Minimum verifier length in characters
    pub const MIN_VERIFIER_LENGTH: usize = 43;
    /// Maximum verifier length in characters
    pub const MAX_VERIFIER_LENGTH: usize = 128;
    /// Verifier length used when none is requested
    pub const OAUTH_CODE_VERIFIER_LENGTH: usize = 128;
    /// Unreserved characters allowed in a verifier
    pub const VERIFIER_ALPHABET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    /// Only challenge method this crate emits
    pub const CHALLENGE_METHOD_S256: &str = "S256";
}

/// Time-related defaults
pub mod time {
    /// Refresh this many seconds before the access token expires
    pub const DEFAULT_REFRESH_LEAD_SECONDS: i64 = 60;
    /// Delay before retrying a refresh that failed on the network
    pub const DEFAULT_REFRESH_RETRY_SECONDS: i64 = 15;
    /// Lifetime of a pending authorization (state + verifier)
    pub const PENDING_AUTHORIZATION_TTL_SECONDS: i64 = 600;
    /// Fallback lifetime when a token response carries an unusable `expires_in`
    pub const DEFAULT_TOKEN_EXPIRY_SECONDS: i64 = 3600;
    /// Accepted clock skew when validating `exp`/`nbf`
    pub const DEFAULT_CLOCK_LEEWAY_SECONDS: u64 = 60;
    /// How long a revoked refresh family is remembered after revocation
    pub const REVOKED_FAMILY_RETENTION_SECONDS: i64 = 86_400;
}

/// JWKS cache defaults
pub mod jwks {
    /// How long a fetched key stays fresh
    pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
    /// Minimum spacing between refetches triggered by unknown key ids
    pub const DEFAULT_MIN_REFETCH_SECONDS: u64 = 30;
    /// Retry attempts for a failed key-set fetch
    pub const DEFAULT_FETCH_RETRIES: u32 = 3;
    /// Initial backoff between key-set fetch attempts
    pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;
}

/// HTTP client timeouts
pub mod network {
    /// Request timeout for token, revocation and key-set calls
    pub const OAUTH_REQUEST_TIMEOUT_SECS: u64 = 15;
    /// Connect timeout for token, revocation and key-set calls
    pub const OAUTH_CONNECT_TIMEOUT_SECS: u64 = 5;
}

/// Default scopes and endpoint paths (Auth0-style tenants)
pub mod defaults {
    /// Scopes requested when none are configured
    pub const DEFAULT_SCOPES: &str = "openid profile email offline_access";
    /// Authorization endpoint path relative to the issuer
    pub const AUTHORIZATION_PATH: &str = "authorize";
    /// Token endpoint path relative to the issuer
    pub const TOKEN_PATH: &str = "oauth/token";
    /// Revocation endpoint path relative to the issuer
    pub const REVOCATION_PATH: &str = "oauth/revoke";
    /// Key-set path relative to the issuer
    pub const JWKS_PATH: &str = ".well-known/jwks.json";
    /// OIDC discovery document path relative to the issuer
    pub const DISCOVERY_PATH: &str = ".well-known/openid-configuration";
}

/// Environment variable names
pub mod env_vars {
    /// Expected token issuer / authorization server base URL
    pub const ISSUER: &str = "AUTHFLOW_ISSUER";
    /// OAuth client identifier
    pub const CLIENT_ID: &str = "AUTHFLOW_CLIENT_ID";
    /// OAuth client secret (confidential clients only)
    pub const CLIENT_SECRET: &str = "AUTHFLOW_CLIENT_SECRET";
    /// Registered redirect URI
    pub const REDIRECT_URI: &str = "AUTHFLOW_REDIRECT_URI";
    /// Space-separated scopes
    pub const SCOPES: &str = "AUTHFLOW_SCOPES";
    /// API audience
    pub const AUDIENCE: &str = "AUTHFLOW_AUDIENCE";
    /// Authorization endpoint override
    pub const AUTHORIZATION_ENDPOINT: &str = "AUTHFLOW_AUTHORIZATION_ENDPOINT";
    /// Token endpoint override
    pub const TOKEN_ENDPOINT: &str = "AUTHFLOW_TOKEN_ENDPOINT";
    /// Revocation endpoint override
    pub const REVOCATION_ENDPOINT: &str = "AUTHFLOW_REVOCATION_ENDPOINT";
    /// Key-set URI override
    pub const JWKS_URI: &str = "AUTHFLOW_JWKS_URI";
    /// Seconds before expiry to refresh
    pub const REFRESH_LEAD_SECONDS: &str = "AUTHFLOW_REFRESH_LEAD_SECONDS";
    /// Seconds to wait before retrying a refresh after a network failure
    pub const REFRESH_RETRY_SECONDS: &str = "AUTHFLOW_REFRESH_RETRY_SECONDS";
    /// Key cache freshness
    pub const JWKS_CACHE_TTL_SECONDS: &str = "AUTHFLOW_JWKS_CACHE_TTL_SECONDS";
    /// Minimum spacing between key-set refetches
    pub const JWKS_MIN_REFETCH_SECONDS: &str = "AUTHFLOW_JWKS_MIN_REFETCH_SECONDS";
    /// Accepted clock skew
    pub const CLOCK_LEEWAY_SECONDS: &str = "AUTHFLOW_CLOCK_LEEWAY_SECONDS";
    /// `family` or `session`
    pub const REUSE_POLICY: &str = "AUTHFLOW_REUSE_POLICY";
}

/// Service identification for logs
pub mod service_names {
    /// Name used in structured logs
    pub const AUTHFLOW: &str = "authflow";
}
