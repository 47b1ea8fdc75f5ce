use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("public key must be {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("public key is not a valid curve point")]
    InvalidKey,
}
