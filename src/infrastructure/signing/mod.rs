//! Manifest signature verification.

pub mod ed25519;

pub use ed25519::{SignatureError, TrustedSigners};
