//! The primitive-provider contract.
//!
//! The protocol engine never touches a cipher directly: everything goes
//! through [`CryptoProvider`], with key and nonce passed in per call.
//! Implementations are stateless between calls, so a provider can be
//! shared freely once the caller serializes access to each security
//! association.

use crate::error::CryptoError;

/// AES-256 key length in bytes.
pub const AES256_KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const GCM_IV_LEN: usize = 12;

/// Authentication tag length in bytes (GCM tag and CMAC alike).
pub const MAC_LEN: usize = 16;

/// Ciphertext plus authentication tag from an AEAD seal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AeadOutput {
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// Authentication tag over ciphertext and associated data
    pub tag: Vec<u8>,
}

/// Stateless authenticated-encryption and MAC primitives.
///
/// All inputs are caller-owned; outputs are freshly allocated and scoped
/// to the call. A failed operation leaves no partial state behind.
pub trait CryptoProvider: Send + Sync {
    /// Encrypt `plaintext` and authenticate it together with `aad`.
    ///
    /// # Errors
    ///
    /// Key or nonce length errors for the underlying AEAD.
    fn aead_encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<AeadOutput, CryptoError>;

    /// Decrypt `ciphertext` and verify `tag` over it and `aad`.
    ///
    /// Returns the plaintext only when the tag verifies.
    ///
    /// # Errors
    ///
    /// [`CryptoError::AuthenticationFailed`] on any tag mismatch; length
    /// errors for malformed key or nonce.
    fn aead_decrypt_and_verify(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Authentication tag over `aad` alone (AEAD with empty plaintext).
    ///
    /// # Errors
    ///
    /// Key or nonce length errors for the underlying AEAD.
    fn aead_tag_only(&self, key: &[u8], iv: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Compute a MAC over `data`.
    ///
    /// # Errors
    ///
    /// Key length errors for the underlying MAC.
    fn mac_tag(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify a MAC over `data`.
    ///
    /// # Errors
    ///
    /// [`CryptoError::AuthenticationFailed`] on mismatch; key length
    /// errors for malformed keys.
    fn mac_verify(&self, key: &[u8], data: &[u8], tag: &[u8]) -> Result<(), CryptoError>;
}
