//! Cryptographic primitives for the SDLS protocol engine.
//!
//! The engine consumes exactly four capabilities, collected behind the
//! [`CryptoProvider`] trait:
//!
//! ```text
//! Apply   ──► aead_encrypt ─────────► ciphertext + tag
//!         ──► mac_tag / aead_tag_only ──────────► tag
//! Process ──► aead_decrypt_and_verify ──► plaintext
//!         ──► mac_verify ───────────────► ()
//! ```
//!
//! Every call is stateless: the key and nonce come from the security
//! association, the associated data from the bit-masked frame header.
//! [`RustCryptoProvider`] is the reference implementation (AES-256-GCM
//! and AES-256-CMAC); missions with hardware security modules implement
//! the trait over their own backend.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod provider;
pub mod rustcrypto;

pub use error::CryptoError;
pub use provider::{AES256_KEY_LEN, AeadOutput, CryptoProvider, GCM_IV_LEN, MAC_LEN};
pub use rustcrypto::RustCryptoProvider;
