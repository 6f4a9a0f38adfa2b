use crate::Error;
use crate::types::{Ed25519PublicKey, Ed25519Signature, X25519PublicKey, X25519Secret};
use crate::types::generate_random_seed;
use ed25519_dalek::{Signer, SigningKey};
use x25519_dalek::SharedSecret;
use zeroize::{Zeroize, Zeroizing};

/// Long-term device identity: an Ed25519 key for signing and a Curve25519 key
/// for the 3DH handshake. The two halves come from independent seeds.
pub(crate) struct IdentityKey {
    signing_key: Box<SigningKey>,
    dh_key: X25519Secret,
}

impl IdentityKey {
    pub(crate) fn new() -> Result<Self, Error> {
        let mut signing_seed = generate_random_seed()?;
        let signing_key = Box::new(SigningKey::from_bytes(&signing_seed));
        signing_seed.zeroize();

        Ok(Self {
            signing_key,
            dh_key: X25519Secret::from(generate_random_seed()?),
        })
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing_key.sign(message).into()
    }

    pub(crate) fn signing_key_public(&self) -> Ed25519PublicKey {
        self.signing_key.verifying_key().into()
    }

    pub(crate) fn dh_key_public(&self) -> X25519PublicKey {
        self.dh_key.public_key()
    }

    pub(crate) fn dh(&self, public_key: &X25519PublicKey) -> SharedSecret {
        self.dh_key.dh(public_key)
    }

    /// Ed25519 seed followed by the Curve25519 secret.
    pub(crate) fn to_bytes(&self) -> Zeroizing<[u8; 64]> {
        let mut bytes = Zeroizing::new([0u8; 64]);
        bytes[0..32].copy_from_slice(self.signing_key.as_bytes());
        bytes[32..64].copy_from_slice(self.dh_key.as_bytes());
        bytes
    }
}

impl TryFrom<&[u8]> for IdentityKey {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 64 {
            return Err(Error::Serde(format!(
                "invalid identity key length {}",
                bytes.len()
            )));
        }

        let mut signing_seed = Zeroizing::new([0u8; 32]);
        signing_seed.copy_from_slice(&bytes[0..32]);

        Ok(Self {
            signing_key: Box::new(SigningKey::from_bytes(&signing_seed)),
            dh_key: X25519Secret::from_slice(&bytes[32..64])?,
        })
    }
}
