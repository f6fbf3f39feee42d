//! Ed25519 detached-signature verification against a trusted key set.
//!
//! §6 requires disjunction across `TRUSTED_SIGNERS`: a manifest is
//! accepted if *any* trusted key validates its signature, keyed by the
//! `signer` label the manifest itself names.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("unknown signer '{0}', not in the trusted set")]
    UnknownSigner(String),

    #[error("malformed trusted signer key: {0}")]
    MalformedKey(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature did not verify for signer '{0}'")]
    VerificationFailed(String),
}

/// A label -> public key map, built from `TRUSTED_SIGNERS` (`label:base64key`
/// entries) or direct registration for tests.
pub struct TrustedSigners {
    keys: HashMap<String, VerifyingKey>,
}

impl TrustedSigners {
    pub fn new() -> Self {
        Self { keys: HashMap::new() }
    }

    pub fn insert(&mut self, label: impl Into<String>, key: VerifyingKey) {
        self.keys.insert(label.into(), key);
    }

    /// Parse `TRUSTED_SIGNERS` entries of the form `label:base64-encoded-32-byte-key`.
    pub fn from_env_entries(entries: &[String]) -> Result<Self, SignatureError> {
        let mut signers = Self::new();
        for entry in entries {
            let (label, encoded) = entry
                .split_once(':')
                .ok_or_else(|| SignatureError::MalformedKey(entry.clone()))?;
            let bytes = BASE64.decode(encoded).map_err(|e| SignatureError::MalformedKey(e.to_string()))?;
            let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| SignatureError::MalformedKey(label.to_string()))?;
            let key = VerifyingKey::from_bytes(&array).map_err(|e| SignatureError::MalformedKey(e.to_string()))?;
            signers.insert(label, key);
        }
        Ok(signers)
    }

    /// Verify `signature_base64` was produced by `signer` over `message`.
    ///
    /// An empty trust set is a deliberate bypass, not an oversight: §4.3
    /// only makes a missing/unverifiable signature a hard failure "when the
    /// trust set is non-empty". A deployment that hasn't configured
    /// `TRUSTED_SIGNERS` yet is trusting every manifest source it's given,
    /// not locked out of loading any of them.
    pub fn verify(&self, signer: &str, message: &[u8], signature_base64: &str) -> Result<(), SignatureError> {
        if self.keys.is_empty() {
            return Ok(());
        }
        let key = self.keys.get(signer).ok_or_else(|| SignatureError::UnknownSigner(signer.to_string()))?;
        let sig_bytes = BASE64.decode(signature_base64).map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
        let sig_array: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| SignatureError::MalformedSignature("expected 64 bytes".into()))?;
        let signature = Signature::from_bytes(&sig_array);
        key.verify(message, &signature).map_err(|_| SignatureError::VerificationFailed(signer.to_string()))
    }
}

impl Default for TrustedSigners {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand_core::OsRng;

    #[test]
    fn accepts_a_valid_signature_from_a_trusted_signer() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let mut signers = TrustedSigners::new();
        signers.insert("ops-key-1", signing_key.verifying_key());

        let message = b"canonical manifest bytes";
        let signature = signing_key.sign(message);
        let encoded = BASE64.encode(signature.to_bytes());

        signers.verify("ops-key-1", message, &encoded).unwrap();
    }

    #[test]
    fn rejects_signature_from_an_untrusted_signer_when_the_trust_set_is_non_empty() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let mut signers = TrustedSigners::new();
        signers.insert("ops-key-1", signing_key.verifying_key());
        let result = signers.verify("nobody", b"message", "deadbeef");
        assert!(matches!(result, Err(SignatureError::UnknownSigner(_))));
    }

    #[test]
    fn an_empty_trust_set_admits_any_signer() {
        let signers = TrustedSigners::new();
        assert!(signers.verify("nobody", b"message", "not even valid base64 signature bytes").is_ok());
    }

    #[test]
    fn rejects_tampered_message() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let mut signers = TrustedSigners::new();
        signers.insert("ops-key-1", signing_key.verifying_key());

        let signature = signing_key.sign(b"original message");
        let encoded = BASE64.encode(signature.to_bytes());

        let result = signers.verify("ops-key-1", b"tampered message", &encoded);
        assert!(matches!(result, Err(SignatureError::VerificationFailed(_))));
    }
}
