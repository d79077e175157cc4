//! Cryptographic utilities for the coordinator
//!
//! This module provides:
//! - SHA-256 hashing
//! - ECDSA key management (secp256k1)
//! - Child key derivation and shared address generation

pub mod derive;
pub mod hash;
pub mod keys;

pub use derive::{
    derive_key_pair, derive_public_key, derive_secret_key, multisig_address, redeem_script,
    sorted_keys,
};
pub use hash::{double_sha256, hash160, sha256, sha256_hex};
pub use keys::{public_key_from_hex, sign_message, verify_signature, KeyError, KeyPair};
