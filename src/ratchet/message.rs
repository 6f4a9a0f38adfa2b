use crate::{Error, X25519PublicKey};

pub(super) const HEADER_SIZE: usize = 40;

/// Header for a ratchet message
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct MessageHeader {
    pub(super) public_key: X25519PublicKey,
    pub(super) previous_chain_length: u32,
    pub(super) message_number: u32,
}

impl MessageHeader {
    pub(super) fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..32].copy_from_slice(self.public_key.as_bytes());
        bytes[32..36].copy_from_slice(&self.previous_chain_length.to_be_bytes());
        bytes[36..40].copy_from_slice(&self.message_number.to_be_bytes());

        bytes
    }
}

impl From<[u8; HEADER_SIZE]> for MessageHeader {
    fn from(bytes: [u8; HEADER_SIZE]) -> Self {
        let mut dh_bytes = [0u8; 32];
        dh_bytes.copy_from_slice(&bytes[0..32]);

        let mut pn_bytes = [0u8; 4];
        pn_bytes.copy_from_slice(&bytes[32..36]);

        let mut n_bytes = [0u8; 4];
        n_bytes.copy_from_slice(&bytes[36..40]);

        Self {
            public_key: X25519PublicKey::from(dh_bytes),
            previous_chain_length: u32::from_be_bytes(pn_bytes),
            message_number: u32::from_be_bytes(n_bytes),
        }
    }
}

/// A double ratchet message: an encrypted header followed by the encrypted payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RatchetMessage {
    pub(crate) header: Vec<u8>,
    pub(crate) ciphertext: Vec<u8>,
}

impl RatchetMessage {
    /// Format: [header length (4 bytes)][header][ciphertext]
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(4 + self.header.len() + self.ciphertext.len());
        let len = u32::try_from(self.header.len()).unwrap_or(u32::MAX);
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&self.header);
        result.extend_from_slice(&self.ciphertext);

        result
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 4 {
            return Err(Error::Protocol("Invalid message format".to_string()));
        }

        let header_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let rest = &bytes[4..];

        if rest.len() < header_len {
            return Err(Error::Protocol("Invalid message format".to_string()));
        }

        Ok(Self {
            header: rest[..header_len].to_vec(),
            ciphertext: rest[header_len..].to_vec(),
        })
    }
}
