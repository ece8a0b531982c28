//! # lyra-primitives
//!
//! Primitive types for the LyraLedger chain.
//!
//! This crate provides the fundamental data types used throughout the system.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod hash;
mod token;

pub use address::{Address, AddressError};
pub use hash::{Hash, HashError, H256};
pub use token::{TokenId, TokenIdError};

// Re-export primitive-types for U256
pub use primitive_types::{U256, U512};

/// Block height type
pub type Height = u64;
