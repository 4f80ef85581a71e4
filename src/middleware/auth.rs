// ABOUTME: Axum extractor that authenticates requests with a bearer JWT
// ABOUTME: Rejections never reveal which validation check failed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::errors::{AppError, ErrorCode, OAuthError, INVALID_TOKEN_MESSAGE};
use crate::jwt::{Claims, JwtValidator};
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

/// Claims of a request that carried a valid bearer token
#[derive(Debug, Clone)]
pub struct BearerClaims(pub Claims);

/// Why a request was not authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerRejection {
    /// No `Authorization: Bearer` header
    Missing,
    /// The token failed validation
    Invalid,
    /// Verification keys could not be obtained
    Unavailable,
}

impl From<OAuthError> for BearerRejection {
    fn from(error: OAuthError) -> Self {
        match error {
            OAuthError::NetworkFailure { .. } | OAuthError::AuthorizationServer { .. } => {
                warn!(error = %error, "Bearer validation could not reach key set");
                Self::Unavailable
            }
            other => {
                debug!(error = %other, "Bearer token rejected");
                Self::Invalid
            }
        }
    }
}

impl IntoResponse for BearerRejection {
    fn into_response(self) -> Response {
        let (error, challenge) = match self {
            Self::Missing => (AppError::auth_required(), Some("Bearer")),
            Self::Invalid => (
                AppError::auth_invalid(INVALID_TOKEN_MESSAGE),
                Some(r#"Bearer error="invalid_token""#),
            ),
            Self::Unavailable => (
                AppError::new(
                    ErrorCode::ExternalServiceUnavailable,
                    "Token verification is temporarily unavailable",
                ),
                None,
            ),
        };

        let mut response = error.into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        response
    }
}

/// Token from an `Authorization: Bearer <token>` header; the scheme is case-insensitive
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerClaims
where
    JwtValidator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = BearerRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(BearerRejection::Missing)?;
        let validator = JwtValidator::from_ref(state);
        let claims = validator.validate(token).await?;
        Ok(Self(claims))
    }
}
