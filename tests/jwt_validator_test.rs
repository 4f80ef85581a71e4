// ABOUTME: Integration tests for bearer JWT validation against a mock key-set endpoint
// ABOUTME: Covers every rejection reason, key caching, key rotation, retries and stale-key fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use authflow::errors::OAuthError;
use authflow::jwt::{JwksCache, JwksConfig, JwtValidator, JwtValidatorConfig};
use authflow::utils::retry::RetryConfig;
use chrono::{Duration, Utc};
use common::{jwks, other_key, signing_key, valid_claims, AUDIENCE};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_PATH: &str = "/.well-known/jwks.json";

struct Fixture {
    server: MockServer,
    validator: JwtValidator,
}

impl Fixture {
    fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    fn token(&self) -> String {
        signing_key().sign(&valid_claims(&self.issuer()))
    }
}

fn jwks_config(server: &MockServer) -> JwksConfig {
    JwksConfig {
        retry: RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
        },
        ..JwksConfig::new(format!("{}{JWKS_PATH}", server.uri()))
    }
}

fn validator_for(server: &MockServer, config: JwksConfig) -> JwtValidator {
    JwtValidator::new(
        JwtValidatorConfig::new(format!("{}/", server.uri()), AUDIENCE),
        Arc::new(JwksCache::new(config)),
    )
}

async fn publishing(keys: &[&common::TestKey]) -> Fixture {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(keys)))
        .mount(&server)
        .await;
    let validator = validator_for(&server, jwks_config(&server));
    Fixture { server, validator }
}

#[tokio::test]
async fn test_valid_token_returns_claims() {
    let fixture = publishing(&[signing_key()]).await;

    let claims = fixture.validator.validate(&fixture.token()).await.unwrap();
    assert_eq!(claims.sub, "user-42");
    assert_eq!(claims.iss, fixture.issuer());
    assert!(claims.aud.contains(AUDIENCE));
    assert!(claims.has_scope("read:messages"));
    assert!(!claims.has_scope("write:messages"));
}

#[tokio::test]
async fn test_audience_list_is_accepted() {
    let fixture = publishing(&[signing_key()]).await;
    let mut claims = valid_claims(&fixture.issuer());
    claims["aud"] = serde_json::json!(["https://other.example.com", AUDIENCE]);

    let token = signing_key().sign(&claims);
    assert!(fixture.validator.validate(&token).await.is_ok());
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let fixture = publishing(&[signing_key()]).await;
    let genuine = fixture.token();

    let mut elevated = valid_claims(&fixture.issuer());
    elevated["sub"] = serde_json::json!("admin");
    let forged_payload = signing_key()
        .sign(&elevated)
        .split('.')
        .nth(1)
        .unwrap()
        .to_owned();
    let parts: Vec<&str> = genuine.split('.').collect();
    let tampered = format!("{}.{forged_payload}.{}", parts[0], parts[2]);

    assert!(matches!(
        fixture.validator.validate(&tampered).await,
        Err(OAuthError::SignatureInvalid { .. })
    ));
}

#[tokio::test]
async fn test_wrong_audience_rejected() {
    let fixture = publishing(&[signing_key()]).await;
    let mut claims = valid_claims(&fixture.issuer());
    claims["aud"] = serde_json::json!("https://other.example.com");

    let error = fixture
        .validator
        .validate(&signing_key().sign(&claims))
        .await
        .unwrap_err();
    assert_eq!(error, OAuthError::WrongAudience);
}

#[tokio::test]
async fn test_foreign_issuer_rejected() {
    let fixture = publishing(&[signing_key()]).await;
    let token = signing_key().sign(&valid_claims("https://evil.example.com/"));

    let error = fixture.validator.validate(&token).await.unwrap_err();
    assert_eq!(error, OAuthError::UnknownIssuer);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let fixture = publishing(&[signing_key()]).await;
    let mut claims = valid_claims(&fixture.issuer());
    claims["exp"] = serde_json::json!((Utc::now() - Duration::hours(1)).timestamp());

    let error = fixture
        .validator
        .validate(&signing_key().sign(&claims))
        .await
        .unwrap_err();
    assert_eq!(error, OAuthError::TokenExpired);
}

#[tokio::test]
async fn test_expiry_within_leeway_accepted() {
    let fixture = publishing(&[signing_key()]).await;
    let mut claims = valid_claims(&fixture.issuer());
    claims["exp"] = serde_json::json!((Utc::now() - Duration::seconds(5)).timestamp());

    assert!(fixture
        .validator
        .validate(&signing_key().sign(&claims))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_unknown_kid_rejected() {
    let fixture = publishing(&[signing_key()]).await;
    let token = other_key().sign(&valid_claims(&fixture.issuer()));

    assert!(matches!(
        fixture.validator.validate(&token).await,
        Err(OAuthError::SignatureInvalid { .. })
    ));
}

#[tokio::test]
async fn test_hmac_token_is_malformed() {
    let fixture = publishing(&[signing_key()]).await;
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(signing_key().kid.clone());
    let token = encode(
        &header,
        &valid_claims(&fixture.issuer()),
        &EncodingKey::from_secret(b"shared-secret"),
    )
    .unwrap();

    assert!(matches!(
        fixture.validator.validate(&token).await,
        Err(OAuthError::MalformedToken { .. })
    ));
}

#[tokio::test]
async fn test_missing_kid_is_malformed() {
    let fixture = publishing(&[signing_key()]).await;
    let token = encode(
        &Header::new(Algorithm::RS256),
        &valid_claims(&fixture.issuer()),
        &signing_key().encoding,
    )
    .unwrap();

    assert!(matches!(
        fixture.validator.validate(&token).await,
        Err(OAuthError::MalformedToken { .. })
    ));
}

#[tokio::test]
async fn test_missing_subject_is_malformed() {
    let fixture = publishing(&[signing_key()]).await;
    let mut claims = valid_claims(&fixture.issuer());
    claims.as_object_mut().unwrap().remove("sub");

    assert!(matches!(
        fixture.validator.validate(&signing_key().sign(&claims)).await,
        Err(OAuthError::MalformedToken { .. })
    ));
}

#[tokio::test]
async fn test_key_set_fetched_once_for_many_tokens() {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[signing_key()])))
        .expect(1)
        .mount(&server)
        .await;
    let validator = validator_for(&server, jwks_config(&server));
    let token = signing_key().sign(&valid_claims(&format!("{}/", server.uri())));

    for _ in 0..5 {
        validator.validate(&token).await.unwrap();
    }
    // unknown kids inside the refetch interval do not trigger another fetch
    let stranger = other_key().sign(&valid_claims(&format!("{}/", server.uri())));
    assert!(validator.validate(&stranger).await.is_err());
    assert_eq!(validator.keys().len(), 1);
}

#[tokio::test]
async fn test_rotated_key_triggers_refetch() {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[signing_key()])))
        .mount(&server)
        .await;
    let config = JwksConfig {
        min_refetch_interval: std::time::Duration::ZERO,
        ..jwks_config(&server)
    };
    let validator = validator_for(&server, config);
    let issuer = format!("{}/", server.uri());
    validator.validate(&signing_key().sign(&valid_claims(&issuer))).await.unwrap();

    // the issuer starts publishing a second key
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(jwks(&[signing_key(), other_key()])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let claims = validator
        .validate(&other_key().sign(&valid_claims(&issuer)))
        .await
        .unwrap();
    assert_eq!(claims.sub, "user-42");
    assert_eq!(validator.keys().len(), 2);
}

#[tokio::test]
async fn test_transient_outage_is_retried() {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[signing_key()])))
        .mount(&server)
        .await;
    let validator = validator_for(&server, jwks_config(&server));

    let token = signing_key().sign(&valid_claims(&format!("{}/", server.uri())));
    assert!(validator.validate(&token).await.is_ok());
}

#[tokio::test]
async fn test_persistent_outage_is_network_failure() {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    let validator = validator_for(&server, jwks_config(&server));

    let token = signing_key().sign(&valid_claims(&format!("{}/", server.uri())));
    let error = validator.validate(&token).await.unwrap_err();
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_stale_key_served_during_outage() {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[signing_key()])))
        .mount(&server)
        .await;
    let config = JwksConfig {
        cache_ttl: std::time::Duration::ZERO,
        min_refetch_interval: std::time::Duration::ZERO,
        retry: RetryConfig::none(),
        ..jwks_config(&server)
    };
    let validator = validator_for(&server, config);
    let token = signing_key().sign(&valid_claims(&format!("{}/", server.uri())));
    validator.validate(&token).await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(validator.validate(&token).await.is_ok());
}

#[tokio::test]
async fn test_key_dropped_by_issuer_is_evicted() {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[signing_key()])))
        .mount(&server)
        .await;
    let config = JwksConfig {
        cache_ttl: std::time::Duration::ZERO,
        min_refetch_interval: std::time::Duration::ZERO,
        ..jwks_config(&server)
    };
    let validator = validator_for(&server, config);
    let token = signing_key().sign(&valid_claims(&format!("{}/", server.uri())));
    validator.validate(&token).await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[other_key()])))
        .mount(&server)
        .await;

    assert!(matches!(
        validator.validate(&token).await,
        Err(OAuthError::SignatureInvalid { .. })
    ));
    assert_eq!(validator.keys().len(), 1);
}

#[tokio::test]
async fn test_outage_keeps_reporting_network_failure_within_refetch_interval() {
    common::init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let config = JwksConfig {
        retry: RetryConfig::none(),
        ..jwks_config(&server)
    };
    let validator = validator_for(&server, config);
    let token = signing_key().sign(&valid_claims(&format!("{}/", server.uri())));

    for _ in 0..2 {
        let error = validator.validate(&token).await.unwrap_err();
        assert!(
            matches!(error, OAuthError::NetworkFailure { .. }),
            "unexpected {error:?}"
        );
    }
}
