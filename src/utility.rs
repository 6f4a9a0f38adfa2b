use crate::Error;
use crate::types::{Ed25519PublicKey, Ed25519Signature, base64_encode};
use sha2::{Digest, Sha256};

/// Stateless helpers for verifying signatures and hashing.
pub struct Utility(());

impl Utility {
    pub(crate) fn new() -> Self {
        Self(())
    }

    /// Verifies an Ed25519 signature given the base64 public key and signature.
    ///
    /// Malformed base64, an invalid key and a signature that does not match all
    /// fail; none of them are reported as success.
    pub fn ed25519_verify(&self, key: &str, message: &[u8], signature: &str) -> Result<(), Error> {
        let key = Ed25519PublicKey::from_base64(key)?;
        let signature = Ed25519Signature::from_base64(signature)?;
        key.verify(message, &signature)
    }

    /// SHA-256 of `input`, as unpadded base64.
    pub fn sha256(&self, input: &[u8]) -> String {
        base64_encode(Sha256::digest(input))
    }

    /// Releases the object.
    pub fn free(self) {}
}
