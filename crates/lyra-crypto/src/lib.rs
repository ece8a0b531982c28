//! # lyra-crypto
//!
//! Cryptographic primitives for the LyraLedger chain.
//!
//! This crate provides the 256-bit hash used for contract code digests,
//! the BLAKE2B opcode and jump table cache keys.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;

pub use hash::hash256;
