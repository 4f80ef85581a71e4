// ABOUTME: Integration tests for PKCE verifier generation and S256 challenge derivation
// ABOUTME: Covers the RFC 7636 test vector, alphabet and length rules, and constant-time matching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use authflow::errors::OAuthError;
use authflow::oauth2_client::{derive_challenge, verify_challenge, PkcePair};
use std::collections::HashSet;

const RFC7636_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const RFC7636_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

#[test]
fn test_rfc7636_appendix_b_vector() {
    assert_eq!(derive_challenge(RFC7636_VERIFIER), RFC7636_CHALLENGE);

    let pair = PkcePair::from_verifier(RFC7636_VERIFIER).unwrap();
    assert_eq!(pair.challenge(), RFC7636_CHALLENGE);
    assert_eq!(pair.challenge_method(), "S256");
}

#[test]
fn test_generated_challenge_derives_from_verifier() {
    for _ in 0..64 {
        let pair = PkcePair::generate().unwrap();
        assert_eq!(derive_challenge(pair.verifier()), pair.challenge());
        assert!(pair.matches(pair.challenge()));
        assert!(verify_challenge(pair.verifier(), pair.challenge()));
    }
}

#[test]
fn test_derivation_is_deterministic() {
    let pair = PkcePair::generate().unwrap();
    let rebuilt = PkcePair::from_verifier(pair.verifier().to_owned()).unwrap();
    assert_eq!(rebuilt.challenge(), pair.challenge());
}

#[test]
fn test_verifier_alphabet_and_default_length() {
    let pair = PkcePair::generate().unwrap();
    assert_eq!(pair.verifier().len(), 128);
    assert!(pair
        .verifier()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')));

    // 43 base64url characters of a 32-byte digest, no padding
    assert_eq!(pair.challenge().len(), 43);
    assert!(!pair.challenge().contains('='));
}

#[test]
fn test_verifiers_are_unique() {
    let verifiers: HashSet<String> = (0..100)
        .map(|_| PkcePair::generate().unwrap().verifier().to_owned())
        .collect();
    assert_eq!(verifiers.len(), 100);
}

#[test]
fn test_every_allowed_length_generates() {
    for length in 43..=128 {
        let pair = PkcePair::generate_with_length(length).unwrap();
        assert_eq!(pair.verifier().len(), length);
    }
}

#[test]
fn test_from_verifier_rejects_bad_input() {
    assert!(matches!(
        PkcePair::from_verifier("short"),
        Err(OAuthError::InvalidVerifier { .. })
    ));
    assert!(matches!(
        PkcePair::from_verifier("a".repeat(129)),
        Err(OAuthError::InvalidVerifier { .. })
    ));

    let with_space = format!("{} x", "a".repeat(50));
    assert!(matches!(
        PkcePair::from_verifier(with_space),
        Err(OAuthError::InvalidVerifier { .. })
    ));
}

#[test]
fn test_mismatched_challenge_rejected() {
    let pair = PkcePair::generate().unwrap();
    let other = PkcePair::generate().unwrap();
    assert!(!pair.matches(other.challenge()));
    assert!(!verify_challenge(RFC7636_VERIFIER, &RFC7636_CHALLENGE[..42]));
}
