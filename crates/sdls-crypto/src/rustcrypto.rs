//! Reference provider backed by the RustCrypto crates.
//!
//! AES-256-GCM supplies the authenticated-encryption suite and AES-256
//! CMAC the authentication-only suite. Keys and nonces are validated
//! before they reach the cipher so the provider never panics on
//! malformed input.

use aes::Aes256;
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use cmac::{Cmac, Mac};

use crate::{
    error::CryptoError,
    provider::{AES256_KEY_LEN, AeadOutput, CryptoProvider, GCM_IV_LEN, MAC_LEN},
};

/// AES-256-GCM / AES-256-CMAC provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    /// Create a provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != AES256_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES256_KEY_LEN,
            actual: key.len(),
        });
    }
    Ok(())
}

fn check_iv(iv: &[u8]) -> Result<(), CryptoError> {
    if iv.len() != GCM_IV_LEN {
        return Err(CryptoError::InvalidNonceLength { expected: GCM_IV_LEN, actual: iv.len() });
    }
    Ok(())
}

fn gcm_cipher(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    check_key(key)?;
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
}

fn cmac_state(key: &[u8]) -> Result<Cmac<Aes256>, CryptoError> {
    check_key(key)?;
    <Cmac<Aes256> as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: AES256_KEY_LEN,
        actual: key.len(),
    })
}

impl CryptoProvider for RustCryptoProvider {
    fn aead_encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<AeadOutput, CryptoError> {
        check_iv(iv)?;
        let cipher = gcm_cipher(key)?;

        let mut sealed = cipher
            .encrypt(Nonce::from_slice(iv), Payload { msg: plaintext, aad })
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        // The aead crate returns ciphertext with the tag appended.
        let tag = sealed.split_off(sealed.len() - MAC_LEN);
        Ok(AeadOutput { ciphertext: sealed, tag })
    }

    fn aead_decrypt_and_verify(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        check_iv(iv)?;
        if tag.len() != MAC_LEN {
            return Err(CryptoError::InvalidTagLength { expected: MAC_LEN, actual: tag.len() });
        }
        let cipher = gcm_cipher(key)?;

        let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        cipher
            .decrypt(Nonce::from_slice(iv), Payload { msg: &sealed, aad })
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    fn aead_tag_only(&self, key: &[u8], iv: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let output = self.aead_encrypt(key, iv, aad, &[])?;
        Ok(output.tag)
    }

    fn mac_tag(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut mac = cmac_state(key)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn mac_verify(&self, key: &[u8], data: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
        if tag.len() != MAC_LEN {
            return Err(CryptoError::InvalidTagLength { expected: MAC_LEN, actual: tag.len() });
        }
        let mut mac = cmac_state(key)?;
        mac.update(data);
        mac.verify_slice(tag).map_err(|_| CryptoError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> RustCryptoProvider {
        RustCryptoProvider::new()
    }

    // NIST SP 800-38D style vector: all-zero key and IV, empty plaintext.
    #[test]
    fn gcm_empty_plaintext_known_tag() {
        let out = provider().aead_encrypt(&[0u8; 32], &[0u8; 12], &[], &[]).unwrap();
        assert!(out.ciphertext.is_empty());
        assert_eq!(hex::encode(out.tag), "530f8afbc74536b9a963b4f1c4cb738b");
    }

    // All-zero key and IV, one zero block.
    #[test]
    fn gcm_single_block_known_vector() {
        let out = provider().aead_encrypt(&[0u8; 32], &[0u8; 12], &[], &[0u8; 16]).unwrap();
        assert_eq!(hex::encode(&out.ciphertext), "cea7403d4d606b6e074ec5d3baf39d18");
        assert_eq!(hex::encode(&out.tag), "d0d1c8a799996bf0265b98b5d48ab919");
    }

    #[test]
    fn gcm_round_trip_with_aad() {
        let key = [0x42u8; 32];
        let iv = [0x07u8; 12];
        let aad = b"masked header bytes";
        let plaintext = b"telecommand payload";

        let out = provider().aead_encrypt(&key, &iv, aad, plaintext).unwrap();
        let opened = provider()
            .aead_decrypt_and_verify(&key, &iv, aad, &out.ciphertext, &out.tag)
            .unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn gcm_rejects_tampered_ciphertext() {
        let key = [0x42u8; 32];
        let iv = [0x07u8; 12];
        let out = provider().aead_encrypt(&key, &iv, &[], b"payload").unwrap();

        let mut tampered = out.ciphertext.clone();
        tampered[0] ^= 0x01;
        let result = provider().aead_decrypt_and_verify(&key, &iv, &[], &tampered, &out.tag);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn gcm_rejects_tampered_aad() {
        let key = [0x42u8; 32];
        let iv = [0x07u8; 12];
        let out = provider().aead_encrypt(&key, &iv, b"aad", b"payload").unwrap();

        let result =
            provider().aead_decrypt_and_verify(&key, &iv, b"axd", &out.ciphertext, &out.tag);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn gcm_rejects_wrong_key_length() {
        let result = provider().aead_encrypt(&[0u8; 16], &[0u8; 12], &[], &[]);
        assert_eq!(result, Err(CryptoError::InvalidKeyLength { expected: 32, actual: 16 }));
    }

    #[test]
    fn gcm_rejects_wrong_iv_length() {
        let result = provider().aead_encrypt(&[0u8; 32], &[0u8; 16], &[], &[]);
        assert_eq!(result, Err(CryptoError::InvalidNonceLength { expected: 12, actual: 16 }));
    }

    #[test]
    fn tag_only_matches_encrypt_of_empty_plaintext() {
        let key = [0x11u8; 32];
        let iv = [0x22u8; 12];
        let aad = b"header";

        let tag = provider().aead_tag_only(&key, &iv, aad).unwrap();
        let out = provider().aead_encrypt(&key, &iv, aad, &[]).unwrap();
        assert_eq!(tag, out.tag);
    }

    // NIST SP 800-38B CMAC-AES256 example vectors.
    #[test]
    fn cmac_known_vectors() {
        let key = hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4")
            .unwrap();

        let tag = provider().mac_tag(&key, &[]).unwrap();
        assert_eq!(hex::encode(&tag), "028962f61b7bf89efc6b551f4667d983");

        let msg = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let tag = provider().mac_tag(&key, &msg).unwrap();
        assert_eq!(hex::encode(&tag), "28a7023f452e8f82bd4bf28d8c37c35c");
    }

    #[test]
    fn cmac_verify_round_trip() {
        let key = [0x5Au8; 32];
        let data = b"authenticated-only frame";

        let tag = provider().mac_tag(&key, data).unwrap();
        provider().mac_verify(&key, data, &tag).unwrap();
    }

    #[test]
    fn cmac_verify_rejects_altered_data() {
        let key = [0x5Au8; 32];
        let tag = provider().mac_tag(&key, b"original").unwrap();

        let result = provider().mac_verify(&key, b"altered!", &tag);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn cmac_verify_rejects_short_tag() {
        let key = [0x5Au8; 32];
        let result = provider().mac_verify(&key, b"data", &[0u8; 8]);
        assert_eq!(result, Err(CryptoError::InvalidTagLength { expected: 16, actual: 8 }));
    }
}
