use crate::Error;
use crate::types::{base64_decode_array, base64_encode};
use ed25519_dalek::{Signature, VerifyingKey};
use std::fmt;

/// An Ed25519 public key used to verify detached signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey(VerifyingKey);

impl Ed25519PublicKey {
    /// Copies the raw key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Encodes the key as unpadded base64.
    pub fn to_base64(&self) -> String {
        base64_encode(self.0.as_bytes())
    }

    /// Parses a key from unpadded base64, rejecting points that are not valid keys.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        Self::from_bytes(&base64_decode_array::<32>(input)?)
    }

    /// Parses a key from its raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, Error> {
        Ok(Self(VerifyingKey::from_bytes(bytes)?))
    }

    /// Verifies a detached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), Error> {
        Ok(self.0.verify_strict(message, &signature.0)?)
    }
}

impl fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl From<VerifyingKey> for Ed25519PublicKey {
    fn from(value: VerifyingKey) -> Self {
        Self(value)
    }
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature(Signature);

impl Ed25519Signature {
    /// Copies the raw signature bytes.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Encodes the signature as unpadded base64.
    pub fn to_base64(&self) -> String {
        base64_encode(self.to_bytes())
    }

    /// Parses a signature from unpadded base64.
    pub fn from_base64(input: &str) -> Result<Self, Error> {
        Ok(Self::from_bytes(&base64_decode_array::<64>(input)?))
    }

    /// Builds a signature from its raw bytes.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(Signature::from_bytes(bytes))
    }
}

impl fmt::Display for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl From<Signature> for Ed25519Signature {
    fn from(value: Signature) -> Self {
        Self(value)
    }
}
