// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs signed with a server-held secret. Besides `sub`,
//! `iat` and `exp` they carry `fpt`, an HMAC binding to the subject's
//! credential fingerprint at issuance. When the fingerprint changes (password
//! reset, re-hash) every token issued against the old value stops being live,
//! without any revocation list.
//!
//! Decoding and liveness are separate steps: [`TokenCodec::decode`] only
//! answers "is this a token we signed", [`TokenCodec::is_live`] answers "is it
//! still good for this credential record".

use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default token lifetime (24 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Domain separator for the fingerprint binding MAC.
const BINDING_CONTEXT: &[u8] = b"fpt:";

/// Errors raised while constructing the codec or signing a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("signing secret must be at least 32 bytes")]
    WeakSecret,

    #[error("token lifetime is out of range")]
    InvalidTtl,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    iat: i64,
    exp: i64,
    fpt: String,
}

/// A token that passed signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    /// Principal name the token was issued to
    pub subject: String,
    /// Issued-at (Unix seconds)
    pub issued_at: i64,
    /// Expiry (Unix seconds)
    pub expires_at: i64,
    binding: String,
}

/// Freshly issued token with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, decodes and checks liveness of bearer tokens.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    binding_key: Vec<u8>,
    ttl: Duration,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec from the shared signing secret.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }
        if ttl.is_zero() || i64::try_from(ttl.as_secs()).is_err() {
            return Err(TokenError::InvalidTtl);
        }

        // Expiry is checked by `is_live`, not here: a merely expired token is
        // Stale, not Malformed.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            binding_key: secret.to_vec(),
            ttl,
            validation,
        })
    }

    /// Issue a token for `subject`, bound to its current credential `fingerprint`.
    pub fn issue(&self, subject: &str, fingerprint: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, fingerprint, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = chrono::Duration::from_std(self.ttl).map_err(|_| TokenError::InvalidTtl)?;
        let expires_at = now + ttl;

        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            fpt: self.binding_for(fingerprint),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Parse a raw bearer value and verify its signature.
    ///
    /// Fails with [`AuthError::MalformedToken`] on bad encoding, bad signature,
    /// a foreign algorithm, or missing claims. Expiry is not checked here.
    pub fn decode(&self, raw: &str) -> Result<DecodedToken, AuthError> {
        let data = decode::<TokenClaims>(raw, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::MalformedToken)?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() || claims.fpt.is_empty() {
            return Err(AuthError::MalformedToken);
        }

        Ok(DecodedToken {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
            binding: claims.fpt,
        })
    }

    /// True iff the token is unexpired and was issued against `fingerprint`.
    pub fn is_live(&self, decoded: &DecodedToken, fingerprint: &str) -> bool {
        self.is_live_at(decoded, fingerprint, Utc::now())
    }

    /// [`is_live`](Self::is_live) evaluated at `now`. Never fails.
    pub fn is_live_at(&self, decoded: &DecodedToken, fingerprint: &str, now: DateTime<Utc>) -> bool {
        if decoded.expires_at <= now.timestamp() {
            return false;
        }

        let Ok(expected) = Base64UrlUnpadded::decode_vec(&decoded.binding) else {
            return false;
        };
        match self.binding_mac(fingerprint) {
            Some(mac) => mac.verify_slice(&expected).is_ok(),
            None => false,
        }
    }

    fn binding_mac(&self, fingerprint: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.binding_key).ok()?;
        mac.update(BINDING_CONTEXT);
        mac.update(fingerprint.as_bytes());
        Some(mac)
    }

    fn binding_for(&self, fingerprint: &str) -> String {
        // HMAC takes keys of any length, so the mac always exists.
        self.binding_mac(fingerprint)
            .map(|mac| Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes()))
            .unwrap_or_default()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::auth::context::Principal;
    use crate::auth::roles::{normalize_authorities, split_roles};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use proptest::prelude::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef-test";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Duration::from_secs(3600)).unwrap()
    }

    proptest! {
        /// Any non-blank subject comes back unchanged and live for its fingerprint.
        #[test]
        fn issued_tokens_decode_live(
            subject in any::<String>().prop_filter("non-blank", |s| !s.trim().is_empty()),
            fingerprint in any::<String>(),
        ) {
            let codec = codec();
            let issued = codec.issue(&subject, &fingerprint).unwrap();
            let decoded = codec.decode(&issued.token).unwrap();

            prop_assert_eq!(&decoded.subject, &subject);
            prop_assert!(codec.is_live(&decoded, &fingerprint));
        }

        /// The principal built for a decoded subject carries the canonical role set.
        #[test]
        fn principal_keeps_canonical_roles(
            subject in "[a-z0-9.]{1,20}@[a-z]{1,10}\\.io",
            authorities in prop::collection::vec(
                prop_oneof![any::<String>(), "(ROLE_)?[A-Z]{1,8}"],
                0..6,
            ),
        ) {
            let codec = codec();
            let decoded = codec.decode(&codec.issue(&subject, "fp").unwrap().token).unwrap();
            prop_assert!(codec.is_live(&decoded, "fp"));

            let principal = Principal::from_authorities(decoded.subject, "id-1", &authorities);
            prop_assert_eq!(&principal.subject, &subject);
            prop_assert_eq!(principal.roles_header(), normalize_authorities(&authorities));
            prop_assert_eq!(split_roles(&principal.roles_header()), principal.roles);
        }

        /// Flipping one bit of any signature byte breaks the token.
        #[test]
        fn any_signature_bit_flip_is_malformed(
            subject in "[a-z0-9@.]{1,400}",
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let codec = codec();
            let token = codec.issue(&subject, "fp").unwrap().token;
            let (signed, signature) = token.rsplit_once('.').unwrap();
            let mut sig_bytes = URL_SAFE_NO_PAD.decode(signature).unwrap();

            let i = index.index(sig_bytes.len());
            sig_bytes[i] ^= 1 << bit;
            let forged = format!("{signed}.{}", URL_SAFE_NO_PAD.encode(&sig_bytes));

            prop_assert!(matches!(codec.decode(&forged), Err(AuthError::MalformedToken)));
        }
    }
}
