// crates/receipt-relay-core/src/crypto.rs
// ============================================================================
// Module: Receipt Relay Decryption Gate
// Description: Fernet token decryption with a pre-shared key.
// Purpose: Reverse the authenticated symmetric encryption applied upstream.
// Dependencies: fernet, thiserror
// ============================================================================

//! ## Overview
//! [`ReceiptCipher`] wraps a Fernet key (AES-128-CBC with HMAC-SHA256,
//! url-safe base64 tokens). Every decryption failure, whether malformed
//! token, bad signature, wrong key or expired token, collapses into the single
//! opaque [`DecryptError`].
//! Security posture: the key is never formatted; error text carries no
//! detail from the cryptographic primitive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use fernet::Fernet;
use thiserror::Error;

use crate::secret::Secret;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Opaque decryption failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to decrypt")]
pub struct DecryptError;

/// The supplied key is not a 32-byte url-safe base64 Fernet key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid decryption key")]
pub struct InvalidKeyError;

// ============================================================================
// SECTION: Cipher
// ============================================================================

/// Pre-shared key cipher for receipt tokens.
///
/// # Invariants
/// - The key material is validated at construction.
/// - When `ttl_secs` is set, tokens older than the TTL are rejected.
pub struct ReceiptCipher {
    /// Fernet instance holding the signing and encryption keys.
    fernet: Fernet,
    /// Optional maximum token age in seconds.
    ttl_secs: Option<u64>,
}

impl ReceiptCipher {
    /// Builds a cipher from a url-safe base64 encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKeyError`] when the key cannot be decoded.
    pub fn new(secret: &Secret) -> Result<Self, InvalidKeyError> {
        let fernet = Fernet::new(secret.expose().trim()).ok_or(InvalidKeyError)?;
        Ok(Self {
            fernet,
            ttl_secs: None,
        })
    }

    /// Enforces a maximum token age.
    #[must_use]
    pub const fn with_ttl(mut self, ttl_secs: Option<u64>) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Generates a fresh random key suitable for [`ReceiptCipher::new`].
    #[must_use]
    pub fn generate_key() -> Secret {
        Secret::new(Fernet::generate_key())
    }

    /// Decrypts a token into plaintext bytes.
    ///
    /// Surrounding whitespace (such as a trailing newline from a file) is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError`] for any failure of the underlying primitive.
    pub fn decrypt(&self, token: &[u8]) -> Result<Vec<u8>, DecryptError> {
        let token = std::str::from_utf8(token).map_err(|_| DecryptError)?.trim();
        let plaintext = match self.ttl_secs {
            Some(ttl) => self.fernet.decrypt_with_ttl(token, ttl),
            None => self.fernet.decrypt(token),
        };
        plaintext.map_err(|_| DecryptError)
    }

    /// Encrypts plaintext into a token accepted by [`ReceiptCipher::decrypt`].
    #[must_use]
    pub fn encrypt(&self, plaintext: &[u8]) -> String {
        self.fernet.encrypt(plaintext)
    }
}

impl fmt::Debug for ReceiptCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptCipher").field("key", &"***").field("ttl_secs", &self.ttl_secs).finish()
    }
}
