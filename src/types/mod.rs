mod ed25519;
mod x25519;

pub use ed25519::{Ed25519PublicKey, Ed25519Signature};
pub use x25519::{X25519PublicKey, X25519Secret};

use crate::Error;
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::fmt;

/// Generates a cryptographically secure random 32-byte seed.
pub(crate) fn generate_random_seed() -> Result<Box<[u8; 32]>, Error> {
    let mut seed = Box::new([0u8; 32]);
    fill_random(seed.as_mut_slice())?;
    Ok(seed)
}

/// Fills `buffer` from the operating system's RNG.
pub(crate) fn fill_random(buffer: &mut [u8]) -> Result<(), Error> {
    OsRng.try_fill_bytes(buffer).map_err(|_| Error::Random)
}

/// Encodes bytes as unpadded standard base64, the encoding used for every key,
/// message body and pickle this crate hands out.
pub fn base64_encode(bytes: impl AsRef<[u8]>) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

/// Decodes unpadded standard base64.
pub fn base64_decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, Error> {
    Ok(STANDARD_NO_PAD.decode(input)?)
}

/// Decodes unpadded base64 into a fixed-size array.
pub(crate) fn base64_decode_array<const N: usize>(input: &str) -> Result<[u8; N], Error> {
    let bytes = base64_decode(input)?;
    <[u8; N]>::try_from(bytes.as_slice())
        .map_err(|_| Error::Base64(format!("expected {N} bytes, got {}", bytes.len())))
}

/// Identifier of a one-time or fallback key within an account.
///
/// Displayed as the unpadded base64 of its big-endian bytes, e.g. `AAAAAQ`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(pub(crate) u32);

impl KeyId {
    /// Returns the numeric value of this key id.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base64_encode(self.0.to_be_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_display() {
        assert_eq!(KeyId(1).to_string(), "AAAAAQ");
        assert_eq!(KeyId(256).to_string(), "AAABAA");
    }

    #[test]
    fn test_base64_is_unpadded() {
        assert_eq!(base64_encode(b"a"), "YQ");
        assert_eq!(base64_decode("YQ").unwrap(), b"a");
        assert!(base64_decode("YQ==").is_err());
    }

    #[test]
    fn test_decode_array_checks_length() {
        let encoded = base64_encode([7u8; 31]);
        assert!(matches!(
            base64_decode_array::<32>(&encoded),
            Err(Error::Base64(_))
        ));
        assert_eq!(
            base64_decode_array::<31>(&encoded).unwrap(),
            [7u8; 31]
        );
    }
}
