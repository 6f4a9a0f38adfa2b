//! Public-key encryption and signing, independent of any ratchet session.
//!
//! Encryption is ECIES-style: a fresh Curve25519 key agreed with the recipient's
//! key feeds an AES-256-GCM-SIV cipher. The authentication tag travels separately
//! as the message `mac`.

mod decryption;
mod encryption;
mod signing;

pub use decryption::PkDecryption;
pub use encryption::PkEncryption;
pub use signing::PkSigning;

use crate::Error;
use crate::cipher::MessageCipher;
use x25519_dalek::SharedSecret;

const PK_INFO: &[u8] = b"Mecholm-Pk";
const TAG_SIZE: usize = 16;

/// A message produced by [`PkEncryption::encrypt`]. Every field is unpadded base64.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PkMessage {
    /// The encrypted payload without its tag.
    pub ciphertext: String,
    /// The authentication tag.
    pub mac: String,
    /// The sender's ephemeral Curve25519 key.
    pub ephemeral: String,
}

fn pk_cipher(shared_secret: &SharedSecret) -> Result<MessageCipher, Error> {
    MessageCipher::derive(shared_secret.as_bytes(), PK_INFO)
}
