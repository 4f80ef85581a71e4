// ABOUTME: Resource-server side JWT validation with a cached JSON Web Key Set
// ABOUTME: Re-exports claims, the key cache and the validator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Access token claims
pub mod claims;
/// Key set parsing and caching
pub mod jwks;
/// Token validation
pub mod validator;

pub use claims::{Audience, Claims};
pub use jwks::{JsonWebKey, JsonWebKeySet, JwksCache, JwksConfig, VerificationKey};
pub use validator::{JwtValidator, JwtValidatorConfig};
