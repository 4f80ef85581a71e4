// ABOUTME: PKCE (RFC 7636) verifier generation and S256 challenge derivation
// ABOUTME: Verifiers come from the OS CSPRNG, stay out of Debug output and are zeroized on drop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::constants::pkce::{
    CHALLENGE_METHOD_S256, MAX_VERIFIER_LENGTH, MIN_VERIFIER_LENGTH, OAUTH_CODE_VERIFIER_LENGTH,
    VERIFIER_ALPHABET,
};
use crate::errors::OAuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are rejected so every character is equally likely.
const REJECTION_BOUND: u8 = (256 / VERIFIER_ALPHABET.len() * VERIFIER_ALPHABET.len()) as u8;

/// `PKCE` (Proof Key for Code Exchange) verifier and its `S256` challenge
#[derive(Clone)]
pub struct PkcePair {
    verifier: Zeroizing<String>,
    challenge: String,
}

impl PkcePair {
    /// Generate a pair with the default verifier length
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::EntropyUnavailable`] if the OS random source fails
    pub fn generate() -> Result<Self, OAuthError> {
        Self::generate_with_length(OAUTH_CODE_VERIFIER_LENGTH)
    }

    /// Generate a pair with a verifier of `length` characters (43-128)
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidVerifier`] for an out-of-range length, or
    /// [`OAuthError::EntropyUnavailable`] if the OS random source fails
    pub fn generate_with_length(length: usize) -> Result<Self, OAuthError> {
        check_length(length)?;

        let mut verifier = Zeroizing::new(String::with_capacity(length));
        let mut buffer = Zeroizing::new([0_u8; 64]);
        while verifier.len() < length {
            OsRng
                .try_fill_bytes(&mut buffer[..])
                .map_err(|e| OAuthError::EntropyUnavailable {
                    message: e.to_string(),
                })?;
            for &byte in buffer.iter().filter(|&&b| b < REJECTION_BOUND) {
                if verifier.len() == length {
                    break;
                }
                let index = usize::from(byte) % VERIFIER_ALPHABET.len();
                verifier.push(char::from(VERIFIER_ALPHABET[index]));
            }
        }

        let challenge = derive_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    /// Rebuild a pair from a verifier received out of band (e.g. CLI input)
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidVerifier`] if the verifier violates RFC 7636
    pub fn from_verifier(verifier: impl Into<String>) -> Result<Self, OAuthError> {
        let verifier = Zeroizing::new(verifier.into());
        check_length(verifier.len())?;
        if let Some(bad) = verifier.bytes().find(|b| !VERIFIER_ALPHABET.contains(b)) {
            return Err(OAuthError::InvalidVerifier {
                reason: format!("character {:?} is not unreserved", char::from(bad)),
            });
        }
        let challenge = derive_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    /// The secret verifier, sent only in the code exchange
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The public challenge, sent in the authorization request
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Challenge method (always `S256`)
    #[must_use]
    pub const fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD_S256
    }

    /// Constant-time check that `challenge` was derived from this verifier
    #[must_use]
    pub fn matches(&self, challenge: &str) -> bool {
        verify_challenge(&self.verifier, challenge)
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// `BASE64URL-NOPAD(SHA256(verifier))`
#[must_use]
pub fn derive_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Constant-time comparison of `derive_challenge(verifier)` against `challenge`
#[must_use]
pub fn verify_challenge(verifier: &str, challenge: &str) -> bool {
    let expected = derive_challenge(verifier);
    expected.as_bytes().ct_eq(challenge.as_bytes()).into()
}

fn check_length(length: usize) -> Result<(), OAuthError> {
    if (MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(OAuthError::InvalidVerifier {
            reason: format!(
                "length {length} is outside {MIN_VERIFIER_LENGTH}..={MAX_VERIFIER_LENGTH}"
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_bound_is_multiple_of_alphabet() {
        assert_eq!(usize::from(REJECTION_BOUND) % VERIFIER_ALPHABET.len(), 0);
        assert!(usize::from(REJECTION_BOUND) + VERIFIER_ALPHABET.len() > 255);
    }

    #[test]
    fn test_debug_redacts_verifier() {
        let pair = PkcePair::generate().unwrap();
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains(pair.verifier()));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_length_bounds() {
        assert!(PkcePair::generate_with_length(42).is_err());
        assert!(PkcePair::generate_with_length(129).is_err());
        assert_eq!(
            PkcePair::generate_with_length(43).unwrap().verifier().len(),
            43
        );
    }
}
