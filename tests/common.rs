// ABOUTME: Shared test utilities for integration tests
// ABOUTME: Stateful mock authorization server, RSA signing keys and token builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `authflow`
//!
//! [`MockAuthServer`] behaves like a real authorization server for the parts
//! the tests exercise: authorization codes are single-use and bound to a
//! `PKCE` challenge, and every refresh rotates the refresh token and retires
//! the old one.

use authflow::jwt::{JsonWebKey, JsonWebKeySet};
use authflow::oauth2_client::{derive_challenge, OAuth2Config};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

pub const AUDIENCE: &str = "https://api.example.com";
pub const CLIENT_ID: &str = "test-client";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";

// ============================================================================
// Signing keys
// ============================================================================

/// RSA key pair usable both for signing test tokens and as a published JWK
pub struct TestKey {
    pub kid: String,
    pub encoding: EncodingKey,
    pub jwk: JsonWebKey,
}

impl TestKey {
    pub fn generate(kid: &str) -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();

        Self {
            kid: kid.to_owned(),
            encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap(),
            jwk: JsonWebKey {
                kty: "RSA".into(),
                key_use: Some("sig".into()),
                kid: Some(kid.to_owned()),
                alg: Some("RS256".into()),
                n: Some(URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be())),
                e: Some(URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be())),
            },
        }
    }

    /// Sign `claims` with RS256 under this key's `kid`
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding).unwrap()
    }
}

/// Primary signing key shared by every test in the binary
pub fn signing_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("test-key-1"))
}

/// A second, unrelated key
pub fn other_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("test-key-2"))
}

pub fn jwks(keys: &[&TestKey]) -> JsonWebKeySet {
    JsonWebKeySet {
        keys: keys.iter().map(|key| key.jwk.clone()).collect(),
    }
}

/// Claims of a token that every default validator accepts
pub fn valid_claims(issuer: &str) -> Value {
    json!({
        "iss": issuer,
        "sub": "user-42",
        "aud": AUDIENCE,
        "iat": Utc::now().timestamp(),
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        "scope": "openid read:messages",
    })
}

// ============================================================================
// Mock authorization server
// ============================================================================

/// State shared between the mock token endpoint and the test
#[derive(Default)]
pub struct AuthServerState {
    codes: Mutex<HashMap<String, String>>,
    active_refresh_tokens: Mutex<HashSet<String>>,
    issued: AtomicU64,
    pub code_exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub expires_in: AtomicU64,
}

impl AuthServerState {
    fn issue(&self) -> Value {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let refresh_token = format!("rt-{n}");
        self.active_refresh_tokens
            .lock()
            .unwrap()
            .insert(refresh_token.clone());
        json!({
            "access_token": format!("at-{n}"),
            "token_type": "Bearer",
            "expires_in": self.expires_in.load(Ordering::SeqCst),
            "refresh_token": refresh_token,
            "id_token": format!("id-{n}"),
            "scope": "openid profile email offline_access",
        })
    }
}

fn invalid_grant(description: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": "invalid_grant",
        "error_description": description,
    }))
}

struct TokenEndpoint(Arc<AuthServerState>);

impl Respond for TokenEndpoint {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let form: HashMap<String, String> = serde_urlencoded::from_bytes(&request.body).unwrap();
        if form.get("client_id").map(String::as_str) != Some(CLIENT_ID) {
            return ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_client" }));
        }

        match form.get("grant_type").map(String::as_str) {
            Some("authorization_code") => {
                self.0.code_exchanges.fetch_add(1, Ordering::SeqCst);
                let code = form.get("code").cloned().unwrap_or_default();
                let Some(challenge) = self.0.codes.lock().unwrap().remove(&code) else {
                    return invalid_grant("authorization code is invalid or was already used");
                };
                let verifier = form.get("code_verifier").cloned().unwrap_or_default();
                if derive_challenge(&verifier) != challenge {
                    return invalid_grant("code verifier does not match challenge");
                }
                if form.get("redirect_uri").map(String::as_str) != Some(REDIRECT_URI) {
                    return invalid_grant("redirect_uri mismatch");
                }
                ResponseTemplate::new(200).set_body_json(self.0.issue())
            }
            Some("refresh_token") => {
                self.0.refreshes.fetch_add(1, Ordering::SeqCst);
                let presented = form.get("refresh_token").cloned().unwrap_or_default();
                if !self
                    .0
                    .active_refresh_tokens
                    .lock()
                    .unwrap()
                    .remove(&presented)
                {
                    return invalid_grant("refresh token is invalid or was rotated");
                }
                ResponseTemplate::new(200).set_body_json(self.0.issue())
            }
            _ => ResponseTemplate::new(400)
                .set_body_json(json!({ "error": "unsupported_grant_type" })),
        }
    }
}

/// Running mock authorization server
pub struct MockAuthServer {
    pub server: MockServer,
    pub state: Arc<AuthServerState>,
}

impl MockAuthServer {
    /// Start a server publishing [`signing_key`] with one-hour access tokens
    pub async fn start() -> Self {
        init_test_logging();
        let server = MockServer::start().await;
        let state = Arc::new(AuthServerState::default());
        state.expires_in.store(3600, Ordering::SeqCst);

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(TokenEndpoint(Arc::clone(&state)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/revoke"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&[signing_key()])))
            .mount(&server)
            .await;

        let issuer = format!("{}/", server.uri());
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/oauth/token", server.uri()),
                "revocation_endpoint": format!("{}/oauth/revoke", server.uri()),
                "jwks_uri": format!("{}/.well-known/jwks.json", server.uri()),
                "code_challenge_methods_supported": ["S256"],
                "scopes_supported": ["openid", "profile", "email", "offline_access"],
            })))
            .mount(&server)
            .await;

        Self { server, state }
    }

    /// Issuer identifier (with trailing slash, as Auth0 tenants publish it)
    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/.well-known/jwks.json", self.server.uri())
    }

    /// Public client configuration pointing at this server
    pub fn client_config(&self) -> OAuth2Config {
        OAuth2Config {
            client_id: CLIENT_ID.into(),
            client_secret: None,
            authorization_endpoint: format!("{}/authorize", self.server.uri()),
            token_endpoint: format!("{}/oauth/token", self.server.uri()),
            revocation_endpoint: Some(format!("{}/oauth/revoke", self.server.uri())),
            redirect_uri: REDIRECT_URI.into(),
            scopes: vec!["openid".into(), "offline_access".into()],
            audience: Some(AUDIENCE.into()),
        }
    }

    /// Simulate the user authenticating: the server issues a code bound to `challenge`
    pub fn issue_code(&self, challenge: &str) -> String {
        let code = format!("code-{}", uuid::Uuid::new_v4().simple());
        self.state
            .codes
            .lock()
            .unwrap()
            .insert(code.clone(), challenge.to_owned());
        code
    }

    /// Read the challenge out of an authorization URL and issue a code for it
    pub fn authorize(&self, url: &url::Url) -> String {
        let challenge = url
            .query_pairs()
            .find(|(key, _)| key == "code_challenge")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        self.issue_code(&challenge)
    }

    /// Make the server issue access tokens with this lifetime from now on
    pub fn set_expires_in(&self, seconds: u64) {
        self.state.expires_in.store(seconds, Ordering::SeqCst);
    }

    pub fn refreshes(&self) -> usize {
        self.state.refreshes.load(Ordering::SeqCst)
    }
}
