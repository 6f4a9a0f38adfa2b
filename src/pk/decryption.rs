use crate::Error;
use crate::pickle::{decrypt_pickle, encrypt_pickle};
use crate::pk::{PkMessage, pk_cipher};
use crate::proto::PkDecryptionPickle;
use crate::types::{X25519PublicKey, X25519Secret, base64_decode, generate_random_seed};
use zeroize::Zeroizing;

const PK_PICKLE_VERSION: u32 = 1;

/// Holds a Curve25519 private key and decrypts [`PkMessage`]s sent to it.
pub struct PkDecryption {
    key: Option<X25519Secret>,
}

impl PkDecryption {
    pub(crate) fn new() -> Self {
        Self { key: None }
    }

    fn key(&self) -> Result<&X25519Secret, Error> {
        self.key
            .as_ref()
            .ok_or_else(|| Error::Crypto("PkDecryption has no key".to_string()))
    }

    /// Generates a new key pair and returns its public key.
    pub fn generate_key(&mut self) -> Result<X25519PublicKey, Error> {
        let key = X25519Secret::from(generate_random_seed()?);
        let public_key = key.public_key();
        self.key = Some(key);
        Ok(public_key)
    }

    /// Uses the given 32-byte private key and returns its public key.
    pub fn init_with_private_key(&mut self, private_key: &[u8]) -> Result<X25519PublicKey, Error> {
        let key = X25519Secret::from_slice(private_key)?;
        let public_key = key.public_key();
        self.key = Some(key);
        Ok(public_key)
    }

    /// Returns the private key exactly as it was generated or imported.
    pub fn get_private_key(&self) -> Result<Zeroizing<[u8; 32]>, Error> {
        Ok(Zeroizing::new(*self.key()?.as_bytes()))
    }

    pub fn public_key(&self) -> Result<X25519PublicKey, Error> {
        Ok(self.key()?.public_key())
    }

    /// Decrypts a message produced by [`PkEncryption::encrypt`](crate::PkEncryption::encrypt).
    pub fn decrypt(&self, message: &PkMessage) -> Result<Vec<u8>, Error> {
        let key = self.key()?;
        let ephemeral = X25519PublicKey::from_base64(&message.ephemeral)?;

        let mut ciphertext = base64_decode(&message.ciphertext)?;
        ciphertext.extend_from_slice(&base64_decode(&message.mac)?);

        pk_cipher(&key.dh(&ephemeral))?.decrypt(&ciphertext, ephemeral.as_bytes())
    }

    /// Serializes the private key under `pickle_key`.
    pub fn pickle(&self, pickle_key: &[u8]) -> Result<String, Error> {
        let pickle = PkDecryptionPickle {
            version: PK_PICKLE_VERSION,
            private_key: self.key()?.as_bytes().to_vec(),
        };

        encrypt_pickle(pickle_key, &pickle)
    }

    /// Restores a key pickled with [`PkDecryption::pickle`] and returns its public key.
    pub fn unpickle(&mut self, pickle_key: &[u8], pickle: &str) -> Result<X25519PublicKey, Error> {
        let pickle: PkDecryptionPickle = decrypt_pickle(pickle_key, pickle)?;
        if pickle.version != PK_PICKLE_VERSION {
            return Err(Error::Serde(format!(
                "unsupported pk pickle version {}",
                pickle.version
            )));
        }

        self.init_with_private_key(&pickle.private_key)
    }

    /// Releases the object, wiping the private key.
    pub fn free(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pk::PkEncryption;

    fn encryption_to(public_key: X25519PublicKey) -> PkEncryption {
        let mut encryption = PkEncryption::new();
        encryption.set_recipient_key(public_key);
        encryption
    }

    #[test]
    fn test_round_trip() {
        let mut decryption = PkDecryption::new();
        let public_key = decryption.generate_key().unwrap();

        let message = encryption_to(public_key).encrypt(b"secret").unwrap();
        assert_eq!(decryption.decrypt(&message).unwrap(), b"secret");
    }

    #[test]
    fn test_tampered_mac_fails() {
        let mut decryption = PkDecryption::new();
        let public_key = decryption.generate_key().unwrap();

        let mut message = encryption_to(public_key).encrypt(b"secret").unwrap();
        message.mac = crate::types::base64_encode([0u8; 16]);
        assert_eq!(decryption.decrypt(&message), Err(Error::Decryption));
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let mut decryption = PkDecryption::new();
        decryption.generate_key().unwrap();
        let mut other = PkDecryption::new();
        let other_key = other.generate_key().unwrap();

        let message = encryption_to(other_key).encrypt(b"secret").unwrap();
        assert_eq!(decryption.decrypt(&message), Err(Error::Decryption));
    }

    #[test]
    fn test_missing_keys() {
        let decryption = PkDecryption::new();
        assert!(matches!(decryption.public_key(), Err(Error::Crypto(_))));
        assert!(matches!(
            PkEncryption::new().encrypt(b"secret"),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn test_rejects_short_private_key() {
        let mut decryption = PkDecryption::new();
        assert!(matches!(
            decryption.init_with_private_key(&[1u8; 31]),
            Err(Error::Serde(_))
        ));
    }
}
