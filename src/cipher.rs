use crate::Error;
use aes_gcm_siv::aead::{Aead, Payload};
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub(crate) const NONCE_SIZE: usize = 12; // AES-GCM-SIV uses 12-byte (96-bit) nonces

/// AES-256-GCM-SIV key and nonce expanded from a single secret with HKDF-SHA256.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct MessageCipher {
    key: [u8; 32],
    nonce: [u8; NONCE_SIZE],
}

impl MessageCipher {
    /// Expands `secret` into a key and nonce, bound to `info`.
    pub(crate) fn derive(secret: &[u8], info: &[u8]) -> Result<Self, Error> {
        let hkdf = Hkdf::<Sha256>::new(None, secret);

        let mut derived_material = [0u8; 32 + NONCE_SIZE];
        hkdf.expand(info, &mut derived_material)
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        let mut cipher = Self {
            key: [0u8; 32],
            nonce: [0u8; NONCE_SIZE],
        };
        cipher.key.copy_from_slice(&derived_material[..32]);
        cipher.nonce.copy_from_slice(&derived_material[32..]);
        derived_material.zeroize();

        Ok(cipher)
    }

    /// Replaces the derived nonce, for keys that encrypt more than one payload.
    pub(crate) fn with_nonce(mut self, nonce: [u8; NONCE_SIZE]) -> Self {
        self.nonce = nonce;
        self
    }

    pub(crate) fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        self.cipher()?
            .encrypt(
                Nonce::from_slice(&self.nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| Error::Crypto("Message encryption failed".to_string()))
    }

    /// Decrypts and authenticates `ciphertext`. Any failure is reported as
    /// [`Error::Decryption`] so callers cannot distinguish a wrong key from tampering.
    pub(crate) fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        self.cipher()?
            .decrypt(
                Nonce::from_slice(&self.nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| Error::Decryption)
    }

    fn cipher(&self) -> Result<Aes256GcmSiv, Error> {
        Aes256GcmSiv::new_from_slice(&self.key)
            .map_err(|_| Error::Crypto("Invalid AES key length".to_string()))
    }
}
