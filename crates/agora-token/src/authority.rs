use std::time::Duration;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, Payload as AeadPayload, rand_core::RngCore},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;
use crate::keys::KEY_SIZE;

/// Version/purpose header. Also bound into the ciphertext as associated data,
/// so a token cannot be replayed under a different header.
const HEADER: &str = "v1.local.";

const NONCE_SIZE: usize = 12;

/// Claims carried inside every credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub id: Uuid,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Payload {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues and verifies encrypted, expiring credentials.
///
/// Built once at startup from the shared secret and handed to whoever needs
/// it. The key is never rotated at runtime.
#[derive(Clone)]
pub struct TokenAuthority {
    cipher: Aes256Gcm,
}

impl TokenAuthority {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.len() != KEY_SIZE {
            return Err(TokenError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: secret.len(),
            });
        }

        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(secret)),
        })
    }

    /// Issue a credential for `subject` valid for `validity` from now.
    pub fn issue(&self, subject: &str, validity: Duration) -> Result<(String, Payload), TokenError> {
        self.issue_at(subject, validity, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<(String, Payload), TokenError> {
        let validity =
            chrono::Duration::from_std(validity).map_err(|_| TokenError::InvalidDuration)?;
        if validity <= chrono::Duration::zero() {
            return Err(TokenError::InvalidDuration);
        }
        let expires_at = now
            .checked_add_signed(validity)
            .ok_or(TokenError::InvalidDuration)?;

        let payload = Payload {
            id: Uuid::new_v4(),
            subject: subject.to_string(),
            issued_at: now,
            expires_at,
        };

        let plaintext =
            serde_json::to_vec(&payload).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                AeadPayload {
                    msg: &plaintext,
                    aad: HEADER.as_bytes(),
                },
            )
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok((format!("{}{}", HEADER, B64.encode(sealed)), payload))
    }

    /// Decrypt `token` and check it has not expired.
    pub fn verify(&self, token: &str) -> Result<Payload, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Payload, TokenError> {
        let body = token.strip_prefix(HEADER).ok_or(TokenError::Invalid)?;
        let sealed = B64.decode(body).map_err(|_| TokenError::Invalid)?;
        if sealed.len() <= NONCE_SIZE {
            return Err(TokenError::Invalid);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                AeadPayload {
                    msg: ciphertext,
                    aad: HEADER.as_bytes(),
                },
            )
            .map_err(|_| TokenError::Invalid)?;

        let payload: Payload =
            serde_json::from_slice(&plaintext).map_err(|_| TokenError::Invalid)?;

        if payload.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    const MINUTE: Duration = Duration::from_secs(60);

    fn authority() -> TokenAuthority {
        TokenAuthority::new(&generate_key()).unwrap()
    }

    #[test]
    fn issued_token_verifies_to_same_payload() {
        let authority = authority();
        let before = Utc::now();

        let (token, payload) = authority.issue("alice", MINUTE).unwrap();
        assert!(token.starts_with(HEADER));
        assert_eq!(payload.subject, "alice");
        assert!(payload.issued_at >= before);
        assert_eq!(payload.expires_at - payload.issued_at, chrono::Duration::minutes(1));

        let verified = authority.verify(&token).unwrap();
        assert_eq!(verified, payload);
    }

    #[test]
    fn token_ids_are_unique() {
        let authority = authority();
        let (_, a) = authority.issue("alice", MINUTE).unwrap();
        let (_, b) = authority.issue("alice", MINUTE).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn token_expires_exactly_at_deadline() {
        let authority = authority();
        let now = Utc::now();
        let (token, payload) = authority.issue_at("alice", MINUTE, now).unwrap();

        let just_before = payload.expires_at - chrono::Duration::milliseconds(1);
        assert_eq!(authority.verify_at(&token, just_before).unwrap(), payload);

        assert_eq!(
            authority.verify_at(&token, payload.expires_at),
            Err(TokenError::Expired)
        );
        assert_eq!(
            authority.verify_at(&token, now + chrono::Duration::hours(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn token_issued_in_the_past_is_expired_now() {
        let authority = authority();
        let long_ago = Utc::now() - chrono::Duration::minutes(10);
        let (token, _) = authority.issue_at("alice", MINUTE, long_ago).unwrap();
        assert_eq!(authority.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn flipped_secret_byte_is_rejected() {
        let key = generate_key();
        let issuer = TokenAuthority::new(&key).unwrap();
        let (token, _) = issuer.issue("alice", MINUTE).unwrap();

        for i in [0, 13, KEY_SIZE - 1] {
            let mut other = key;
            other[i] ^= 0x01;
            let verifier = TokenAuthority::new(&other).unwrap();
            assert_eq!(verifier.verify(&token), Err(TokenError::Invalid));
        }
    }

    #[test]
    fn tampered_token_is_rejected() {
        let authority = authority();
        let (token, _) = authority.issue("alice", MINUTE).unwrap();

        let mut sealed = B64.decode(&token[HEADER.len()..]).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        let tampered = format!("{}{}", HEADER, B64.encode(sealed));

        assert_eq!(authority.verify(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let authority = authority();
        for token in ["invalid token", "", HEADER, "v1.local.!!!", "v2.local.AAAA", "v1.local.AAAA"] {
            assert_eq!(authority.verify(token), Err(TokenError::Invalid), "{token:?}");
        }
    }

    #[test]
    fn key_must_be_32_bytes() {
        assert_eq!(
            TokenAuthority::new(b"too short").err(),
            Some(TokenError::InvalidKeySize { expected: 32, actual: 9 })
        );
    }

    #[test]
    fn zero_validity_is_rejected() {
        let authority = authority();
        assert_eq!(
            authority.issue("alice", Duration::ZERO).err(),
            Some(TokenError::InvalidDuration)
        );
    }
}
