use crate::Error;
use crate::pk::{PkMessage, TAG_SIZE, pk_cipher};
use crate::types::{X25519PublicKey, X25519Secret, base64_encode, generate_random_seed};

/// Encrypts messages to a single recipient's Curve25519 key.
pub struct PkEncryption {
    recipient_key: Option<X25519PublicKey>,
}

impl PkEncryption {
    pub(crate) fn new() -> Self {
        Self { recipient_key: None }
    }

    /// Sets the key messages are encrypted to.
    pub fn set_recipient_key(&mut self, recipient_key: X25519PublicKey) {
        self.recipient_key = Some(recipient_key);
    }

    /// Encrypts `plaintext` under a fresh ephemeral key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<PkMessage, Error> {
        let recipient_key = self
            .recipient_key
            .as_ref()
            .ok_or_else(|| Error::Crypto("No recipient key set".to_string()))?;

        let ephemeral = X25519Secret::from(generate_random_seed()?);
        let ephemeral_public = ephemeral.public_key();

        let mut ciphertext = pk_cipher(&ephemeral.dh(recipient_key))?
            .encrypt(plaintext, ephemeral_public.as_bytes())?;
        let mac = ciphertext.split_off(ciphertext.len().saturating_sub(TAG_SIZE));

        Ok(PkMessage {
            ciphertext: base64_encode(ciphertext),
            mac: base64_encode(mac),
            ephemeral: ephemeral_public.to_base64(),
        })
    }

    /// Releases the object.
    pub fn free(self) {}
}
