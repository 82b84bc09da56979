// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 node keypair generation and signature verification.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sealbox_core::SealboxError;

/// An Ed25519 keypair identifying one exchange party.
///
/// The hex-encoded public key is what the identity directory publishes;
/// the permalink of a party is the content hash of its published
/// identity record, not of the key itself.
#[derive(Debug)]
pub struct NodeKeypair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl NodeKeypair {
    /// Generate a new random Ed25519 keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstruct a keypair from private key bytes.
    pub fn from_bytes(private_bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(private_bytes);
        let verifying_key = VerifyingKey::from(&signing_key);
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Private key bytes, for keystore persistence.
    pub fn private_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Hex-encoded public key as published in the identity directory.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public_bytes())
    }

    /// Sign arbitrary bytes with this keypair's private key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Verify a signature against this keypair's public key using strict mode.
    ///
    /// Strict verification rejects weak public keys per ed25519-dalek
    /// security recommendations, preventing weak key forgery attacks.
    pub fn verify_strict(
        &self,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), SealboxError> {
        self.verifying_key
            .verify_strict(message, signature)
            .map_err(|e| {
                SealboxError::InvalidSignature(format!(
                    "Ed25519 signature verification failed: {e}"
                ))
            })
    }

    /// Verify a signature against this keypair's public key (non-strict).
    ///
    /// Permits weak public keys. Prefer `verify_strict` for handshake
    /// and envelope verification.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SealboxError> {
        self.verifying_key.verify(message, signature).map_err(|e| {
            SealboxError::InvalidSignature(format!(
                "Ed25519 signature verification failed: {e}"
            ))
        })
    }
}

/// Parse a hex-encoded public key into a verifying key.
pub fn verifying_key_from_hex(pub_key: &str) -> Result<VerifyingKey, SealboxError> {
    let bytes = hex::decode(pub_key).map_err(|e| {
        SealboxError::InvalidSignature(format!("public key is not valid hex: {e}"))
    })?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
        SealboxError::InvalidSignature("public key must be 32 bytes".to_string())
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| {
        SealboxError::InvalidSignature(format!("public key is not a valid Ed25519 point: {e}"))
    })
}

/// Verify a detached hex-encoded signature made by the holder of `pub_key`.
pub fn verify_detached(
    pub_key: &str,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), SealboxError> {
    let key = verifying_key_from_hex(pub_key)?;
    let sig_bytes = hex::decode(signature_hex).map_err(|e| {
        SealboxError::InvalidSignature(format!("signature is not valid hex: {e}"))
    })?;
    let sig_bytes: [u8; 64] = sig_bytes.try_into().map_err(|_| {
        SealboxError::InvalidSignature("signature must be 64 bytes".to_string())
    })?;
    let signature = Signature::from_bytes(&sig_bytes);
    key.verify_strict(message, &signature).map_err(|e| {
        SealboxError::InvalidSignature(format!("Ed25519 signature verification failed: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_creates_valid_keypair() {
        let kp = NodeKeypair::generate();
        assert_eq!(kp.private_bytes().len(), 32);
        assert_eq!(kp.public_bytes().len(), 32);
        assert_eq!(kp.public_hex().len(), 64); // 32 bytes = 64 hex chars
    }

    #[test]
    fn from_bytes_roundtrip() {
        let kp1 = NodeKeypair::generate();
        let private = kp1.private_bytes();

        let kp2 = NodeKeypair::from_bytes(&private);
        assert_eq!(kp1.public_bytes(), kp2.public_bytes());
        assert_eq!(kp1.private_bytes(), kp2.private_bytes());
    }

    #[test]
    fn different_keypairs_have_different_keys() {
        let kp1 = NodeKeypair::generate();
        let kp2 = NodeKeypair::generate();
        assert_ne!(kp1.public_hex(), kp2.public_hex());
    }

    #[test]
    fn sign_produces_64_byte_signature() {
        let kp = NodeKeypair::generate();
        let sig = kp.sign(b"hello world");
        assert_eq!(sig.to_bytes().len(), 64);
    }

    #[test]
    fn verify_strict_succeeds_for_correct_signature() {
        let kp = NodeKeypair::generate();
        let message = b"challenge bytes";
        let sig = kp.sign(message);
        assert!(kp.verify_strict(message, &sig).is_ok());
    }

    #[test]
    fn verify_strict_fails_for_tampered_bytes() {
        let kp = NodeKeypair::generate();
        let sig = kp.sign(b"original message");
        let result = kp.verify_strict(b"tampered message", &sig);
        match result.unwrap_err() {
            SealboxError::InvalidSignature(msg) => {
                assert!(msg.contains("Ed25519 signature verification failed"));
            }
            other => panic!("expected InvalidSignature, got: {other:?}"),
        }
    }

    #[test]
    fn verify_strict_fails_for_wrong_keypair() {
        let kp1 = NodeKeypair::generate();
        let kp2 = NodeKeypair::generate();
        let message = b"signed by kp1";
        let sig = kp1.sign(message);
        assert!(kp2.verify_strict(message, &sig).is_err());
    }

    #[test]
    fn detached_verification_round_trip() {
        let kp = NodeKeypair::generate();
        let message = b"challenge-1234";
        let sig_hex = hex::encode(kp.sign(message).to_bytes());

        assert!(verify_detached(&kp.public_hex(), message, &sig_hex).is_ok());
        assert!(verify_detached(&kp.public_hex(), b"other", &sig_hex).is_err());
    }

    #[test]
    fn detached_verification_rejects_malformed_inputs() {
        let kp = NodeKeypair::generate();
        let message = b"challenge-1234";
        let sig_hex = hex::encode(kp.sign(message).to_bytes());

        assert!(verify_detached("not-hex", message, &sig_hex).is_err());
        assert!(verify_detached("aabb", message, &sig_hex).is_err());
        assert!(verify_detached(&kp.public_hex(), message, "zz").is_err());
        assert!(verify_detached(&kp.public_hex(), message, "aabb").is_err());
    }
}
