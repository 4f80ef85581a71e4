// ABOUTME: Criterion benchmarks for the PKCE, token store and JWT validation hot paths
// ABOUTME: Validation runs against a pre-seeded key cache so no network is involved
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Criterion benchmarks for authflow hot paths.

#![allow(
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    missing_docs
)]

use authflow::jwt::{JsonWebKey, JwksCache, JwksConfig, JwtValidator, JwtValidatorConfig};
use authflow::oauth2_client::{derive_challenge, PkcePair, TokenSet};
use authflow::session::{ReusePolicy, TokenStore};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use std::sync::Arc;
use tokio::runtime::Runtime;

const ISSUER: &str = "https://id.example.com/";
const AUDIENCE: &str = "https://api.example.com";

fn bench_pkce(c: &mut Criterion) {
    let mut group = c.benchmark_group("pkce");
    group.bench_function("generate", |b| b.iter(|| PkcePair::generate().unwrap()));
    group.bench_function("derive_challenge", |b| {
        b.iter(|| derive_challenge(black_box("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk")));
    });
    group.finish();
}

fn tokens(n: u64) -> TokenSet {
    TokenSet {
        access_token: format!("access-{n}"),
        token_type: "Bearer".into(),
        id_token: None,
        refresh_token: Some(format!("refresh-{n}")),
        scope: None,
        expires_at: Some(Utc::now() + Duration::minutes(10)),
    }
}

fn bench_store(c: &mut Criterion) {
    c.bench_function("store/rotate", |b| {
        let store = TokenStore::new(ReusePolicy::Family);
        let id = store.create_session(tokens(0)).id;
        let mut n = 0;
        b.iter(|| {
            let used = format!("refresh-{n}");
            n += 1;
            store.complete_refresh(id, &used, tokens(n)).unwrap();
        });
    });
}

fn bench_validate(c: &mut Criterion) {
    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
    let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();

    let keys = Arc::new(JwksCache::new(JwksConfig::new("http://127.0.0.1:9/jwks.json")));
    keys.insert_jwk(&JsonWebKey {
        kty: "RSA".into(),
        key_use: Some("sig".into()),
        kid: Some("bench".into()),
        alg: Some("RS256".into()),
        n: Some(URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be())),
        e: Some(URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be())),
    })
    .unwrap();
    let validator = JwtValidator::new(JwtValidatorConfig::new(ISSUER, AUDIENCE), keys);

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("bench".into());
    let claims = serde_json::json!({
        "iss": ISSUER,
        "sub": "user-1",
        "aud": AUDIENCE,
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        "scope": "read:messages",
    });
    let token = encode(&header, &claims, &encoding_key).unwrap();

    let rt = Runtime::new().unwrap();
    c.bench_function("jwt/validate_cached_key", |b| {
        b.to_async(&rt)
            .iter(|| async { validator.validate(black_box(&token)).await.unwrap() });
    });
}

criterion_group!(benches, bench_pkce, bench_store, bench_validate);
criterion_main!(benches);
