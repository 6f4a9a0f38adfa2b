//! Pickling: protocol object state encrypted under a caller supplied pickle key.
//!
//! A pickle is the unpadded base64 of `version || nonce || ciphertext`, where the
//! ciphertext is a protobuf message sealed with AES-256-GCM-SIV under a key
//! expanded from the pickle key.

use crate::Error;
use crate::cipher::{MessageCipher, NONCE_SIZE};
use crate::types::{base64_decode, base64_encode, fill_random};
use prost::Message;

const PICKLE_VERSION: u8 = 1;
const PICKLE_INFO: &[u8] = b"Mecholm-Pickle";

/// Seals `state` under `pickle_key`. The nonce is random, so pickling the same
/// object twice yields different strings.
pub(crate) fn encrypt_pickle<M: Message>(pickle_key: &[u8], state: &M) -> Result<String, Error> {
    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut nonce)?;

    let cipher = MessageCipher::derive(pickle_key, PICKLE_INFO)?.with_nonce(nonce);
    let plaintext = zeroize::Zeroizing::new(state.encode_to_vec());
    let ciphertext = cipher.encrypt(&plaintext, &[PICKLE_VERSION])?;

    let mut bytes = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
    bytes.push(PICKLE_VERSION);
    bytes.extend_from_slice(&nonce);
    bytes.extend_from_slice(&ciphertext);

    Ok(base64_encode(bytes))
}

/// Opens a pickle produced by [`encrypt_pickle`].
pub(crate) fn decrypt_pickle<M: Message + Default>(
    pickle_key: &[u8],
    pickle: &str,
) -> Result<M, Error> {
    let bytes = base64_decode(pickle)?;
    if bytes.len() < 1 + NONCE_SIZE {
        return Err(Error::Serde("pickle is too short".to_string()));
    }
    if bytes[0] != PICKLE_VERSION {
        return Err(Error::Serde(format!("unsupported pickle version {}", bytes[0])));
    }

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&bytes[1..1 + NONCE_SIZE]);

    let cipher = MessageCipher::derive(pickle_key, PICKLE_INFO)?.with_nonce(nonce);
    let plaintext = cipher
        .decrypt(&bytes[1 + NONCE_SIZE..], &bytes[..1])
        .map(zeroize::Zeroizing::new)
        .map_err(|_| {
            tracing::warn!("pickle could not be opened with the given key");
            Error::BadPickleKey
        })?;

    Ok(M::decode(plaintext.as_slice())?)
}

/// Copies a protobuf byte field into a fixed-size key.
pub(crate) fn key_from_bytes(bytes: &[u8], what: &str) -> Result<Box<[u8; 32]>, Error> {
    let mut key = Box::new([0u8; 32]);
    if bytes.len() != key.len() {
        return Err(Error::Serde(format!("invalid {what} length {}", bytes.len())));
    }
    key.copy_from_slice(bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::PkDecryptionPickle;

    fn sample() -> PkDecryptionPickle {
        PkDecryptionPickle {
            version: 1,
            private_key: vec![42u8; 32],
        }
    }

    #[test]
    fn test_pickle_round_trip() {
        let pickle = encrypt_pickle(b"secret", &sample()).unwrap();
        let restored: PkDecryptionPickle = decrypt_pickle(b"secret", &pickle).unwrap();
        assert_eq!(restored, sample());
    }

    #[test]
    fn test_wrong_key_is_reported() {
        let pickle = encrypt_pickle(b"secret", &sample()).unwrap();
        let result = decrypt_pickle::<PkDecryptionPickle>(b"wrong", &pickle);
        assert_eq!(result, Err(Error::BadPickleKey));
    }

    #[test]
    fn test_pickles_use_fresh_nonces() {
        let first = encrypt_pickle(b"secret", &sample()).unwrap();
        let second = encrypt_pickle(b"secret", &sample()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_pickle() {
        assert!(matches!(
            decrypt_pickle::<PkDecryptionPickle>(b"secret", "AAAA"),
            Err(Error::Serde(_))
        ));
        assert!(matches!(
            decrypt_pickle::<PkDecryptionPickle>(b"secret", "not base64!"),
            Err(Error::Base64(_))
        ));
    }
}
