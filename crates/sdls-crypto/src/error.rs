//! Error types for primitive-provider operations.

use thiserror::Error;

/// Errors from AEAD and MAC primitive calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length for the algorithm
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required key length in bytes
        expected: usize,
        /// Supplied key length in bytes
        actual: usize,
    },

    /// Nonce has the wrong length for the algorithm
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Required nonce length in bytes
        expected: usize,
        /// Supplied nonce length in bytes
        actual: usize,
    },

    /// Authentication tag has the wrong length for the algorithm
    #[error("invalid tag length: expected {expected}, got {actual}")]
    InvalidTagLength {
        /// Required tag length in bytes
        expected: usize,
        /// Supplied tag length in bytes
        actual: usize,
    },

    /// Tag did not verify: the data or its context was altered
    #[error("authentication failed")]
    AuthenticationFailed,
}
