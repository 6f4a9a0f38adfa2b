//! Binary formats that hand a Megolm ratchet to other devices.
//!
//! ```text
//! session key:      0x02 || index (u32 BE) || ratchet (128) || ed25519 key (32) || signature (64)
//! exported session: 0x01 || index (u32 BE) || ratchet (128) || ed25519 key (32)
//! ```
//!
//! A session key is signed by the sending device's group signing key. An
//! exported session carries no signature and is used for key backups.

use crate::Error;
use crate::megolm::ratchet::{MegolmRatchet, RATCHET_SIZE};
use crate::types::{Ed25519PublicKey, Ed25519Signature, base64_decode, base64_encode};
use ed25519_dalek::{Signer, SigningKey};
use zeroize::Zeroizing;

const SESSION_KEY_VERSION: u8 = 2;
const SESSION_EXPORT_VERSION: u8 = 1;

const EXPORT_SIZE: usize = 1 + 4 + RATCHET_SIZE + 32;
const SESSION_KEY_SIZE: usize = EXPORT_SIZE + 64;

fn encode_unsigned(
    version: u8,
    ratchet: &MegolmRatchet,
    signing_key: &Ed25519PublicKey,
) -> Zeroizing<Vec<u8>> {
    let mut bytes = Zeroizing::new(Vec::with_capacity(SESSION_KEY_SIZE));
    bytes.push(version);
    bytes.extend_from_slice(&ratchet.index().to_be_bytes());
    bytes.extend_from_slice(&ratchet.to_bytes());
    bytes.extend_from_slice(&signing_key.to_bytes());
    bytes
}

fn decode_unsigned(bytes: &[u8]) -> Result<(MegolmRatchet, Ed25519PublicKey), Error> {
    let mut index = [0u8; 4];
    index.copy_from_slice(&bytes[1..5]);

    let ratchet =
        MegolmRatchet::from_bytes(&bytes[5..5 + RATCHET_SIZE], u32::from_be_bytes(index))?;

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[5 + RATCHET_SIZE..EXPORT_SIZE]);

    Ok((ratchet, Ed25519PublicKey::from_bytes(&key)?))
}

/// Encodes and signs a session key.
pub(crate) fn encode_session_key(ratchet: &MegolmRatchet, signing_key: &SigningKey) -> String {
    let mut bytes = encode_unsigned(
        SESSION_KEY_VERSION,
        ratchet,
        &signing_key.verifying_key().into(),
    );
    let signature = signing_key.sign(&bytes);
    bytes.extend_from_slice(&signature.to_bytes());

    base64_encode(bytes.as_slice())
}

/// Decodes a session key and checks its signature.
pub(crate) fn decode_session_key(
    session_key: &str,
) -> Result<(MegolmRatchet, Ed25519PublicKey), Error> {
    let bytes = Zeroizing::new(base64_decode(session_key)?);
    if bytes.len() != SESSION_KEY_SIZE || bytes[0] != SESSION_KEY_VERSION {
        return Err(Error::Serde("invalid session key".to_string()));
    }

    let (ratchet, signing_key) = decode_unsigned(&bytes)?;

    let mut signature = [0u8; 64];
    signature.copy_from_slice(&bytes[EXPORT_SIZE..]);
    signing_key.verify(&bytes[..EXPORT_SIZE], &Ed25519Signature::from_bytes(&signature))?;

    Ok((ratchet, signing_key))
}

pub(crate) fn encode_exported(ratchet: &MegolmRatchet, signing_key: &Ed25519PublicKey) -> String {
    base64_encode(encode_unsigned(SESSION_EXPORT_VERSION, ratchet, signing_key).as_slice())
}

pub(crate) fn decode_exported(
    exported: &str,
) -> Result<(MegolmRatchet, Ed25519PublicKey), Error> {
    let bytes = Zeroizing::new(base64_decode(exported)?);
    if bytes.len() != EXPORT_SIZE || bytes[0] != SESSION_EXPORT_VERSION {
        return Err(Error::Serde("invalid exported session".to_string()));
    }

    decode_unsigned(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_is_signed() {
        let ratchet = MegolmRatchet::new().unwrap();
        let signing_key = SigningKey::from_bytes(&[1u8; 32]);

        let session_key = encode_session_key(&ratchet, &signing_key);
        let (decoded, public) = decode_session_key(&session_key).unwrap();
        assert_eq!(decoded.to_bytes(), ratchet.to_bytes());
        assert_eq!(public.to_bytes(), signing_key.verifying_key().to_bytes());

        let mut bytes = base64_decode(&session_key).unwrap();
        bytes[10] ^= 0x01;
        assert!(matches!(
            decode_session_key(&base64_encode(bytes)),
            Err(Error::Signature(_))
        ));
    }

    #[test]
    fn test_formats_are_not_interchangeable() {
        let ratchet = MegolmRatchet::new().unwrap();
        let signing_key = SigningKey::from_bytes(&[1u8; 32]);
        let public = Ed25519PublicKey::from(signing_key.verifying_key());

        let exported = encode_exported(&ratchet, &public);
        assert!(decode_exported(&exported).is_ok());
        assert!(matches!(decode_session_key(&exported), Err(Error::Serde(_))));

        let session_key = encode_session_key(&ratchet, &signing_key);
        assert!(matches!(decode_exported(&session_key), Err(Error::Serde(_))));
    }
}
