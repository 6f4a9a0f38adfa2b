use crate::Error;
use crate::types::{Ed25519PublicKey, Ed25519Signature, generate_random_seed};
use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroizing;

/// An Ed25519 signing key created from a 32-byte seed.
pub struct PkSigning {
    key: Option<Box<SigningKey>>,
}

impl PkSigning {
    pub(crate) fn new() -> Self {
        Self { key: None }
    }

    /// Returns 32 random bytes suitable for [`PkSigning::init_with_seed`].
    pub fn generate_seed(&self) -> Result<Zeroizing<[u8; 32]>, Error> {
        Ok(Zeroizing::new(*generate_random_seed()?))
    }

    /// Derives the key pair from `seed`. The same seed always gives the same key.
    pub fn init_with_seed(&mut self, seed: &[u8]) -> Result<Ed25519PublicKey, Error> {
        let seed = Zeroizing::new(
            <[u8; 32]>::try_from(seed)
                .map_err(|_| Error::Crypto(format!("invalid seed length {}", seed.len())))?,
        );

        let key = Box::new(SigningKey::from_bytes(&seed));
        let public_key = key.verifying_key().into();
        self.key = Some(key);

        Ok(public_key)
    }

    /// Signs `message` with the key derived from the seed.
    pub fn sign(&self, message: &[u8]) -> Result<Ed25519Signature, Error> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| Error::Crypto("PkSigning has no seed".to_string()))?;
        Ok(key.sign(message).into())
    }

    /// Releases the object, wiping the signing key.
    pub fn free(self) {}
}
