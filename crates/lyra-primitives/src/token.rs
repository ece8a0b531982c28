//! Fungible token family identifier (10 bytes)

use primitive_types::U256;
use std::fmt;
use thiserror::Error;

/// Token id parsing error
#[derive(Debug, Error)]
pub enum TokenIdError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid token id length: expected 10 bytes, got {0}")]
    InvalidLength(usize),
}

/// 10-byte fungible token family identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TokenId([u8; 10]);

impl TokenId {
    /// Size in bytes
    pub const LEN: usize = 10;

    /// The native token. It pays contract creation fees and intrinsic
    /// charges.
    pub const NATIVE: TokenId = TokenId([0u8; 10]);

    /// Create token id from bytes
    pub const fn from_bytes(bytes: [u8; 10]) -> Self {
        TokenId(bytes)
    }

    /// Create token id from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, TokenIdError> {
        if slice.len() != 10 {
            return Err(TokenIdError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; 10];
        bytes.copy_from_slice(slice);
        Ok(TokenId(bytes))
    }

    /// Parse token id from hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, TokenIdError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TokenIdError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Build a token id from the low 10 bytes of a 256-bit word
    pub fn from_word(word: U256) -> Self {
        let mut buf = [0u8; 32];
        word.to_big_endian(&mut buf);
        let mut bytes = [0u8; 10];
        bytes.copy_from_slice(&buf[22..32]);
        TokenId(bytes)
    }

    /// Right-align the token id bytes into a 256-bit word
    pub fn to_word(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }

    /// Check if this is the native token
    pub fn is_native(&self) -> bool {
        self.0 == [0u8; 10]
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.to_hex())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 10]> for TokenId {
    fn from(bytes: [u8; 10]) -> Self {
        TokenId(bytes)
    }
}

impl AsRef<[u8]> for TokenId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
