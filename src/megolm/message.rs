use crate::Error;
use crate::proto::GroupMessageProto;
use crate::types::{Ed25519PublicKey, Ed25519Signature, base64_decode, base64_encode};
use ed25519_dalek::{Signer, SigningKey};
use prost::Message;

const GROUP_MESSAGE_VERSION: u8 = 3;
const SIGNATURE_SIZE: usize = 64;

/// A signed Megolm message.
///
/// Layout: `version || GroupMessageProto || ed25519 signature`, where the
/// signature covers everything before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GroupMessage {
    pub(crate) message_index: u32,
    pub(crate) ciphertext: Vec<u8>,
    signed_part: Vec<u8>,
    signature: Ed25519Signature,
}

impl GroupMessage {
    /// Associated data binding the ciphertext to its index.
    pub(crate) fn associated_data(message_index: u32) -> [u8; 5] {
        let mut ad = [GROUP_MESSAGE_VERSION, 0, 0, 0, 0];
        ad[1..].copy_from_slice(&message_index.to_be_bytes());
        ad
    }

    pub(crate) fn new(message_index: u32, ciphertext: Vec<u8>, signing_key: &SigningKey) -> Self {
        let proto = GroupMessageProto {
            message_index,
            ciphertext: ciphertext.clone(),
        };

        let mut signed_part = vec![GROUP_MESSAGE_VERSION];
        signed_part.extend_from_slice(&proto.encode_to_vec());
        let signature = signing_key.sign(&signed_part).into();

        Self {
            message_index,
            ciphertext,
            signed_part,
            signature,
        }
    }

    pub(crate) fn encode(&self) -> String {
        let mut bytes = self.signed_part.clone();
        bytes.extend_from_slice(&self.signature.to_bytes());
        base64_encode(bytes)
    }

    pub(crate) fn decode(body: &str) -> Result<Self, Error> {
        let bytes = base64_decode(body)?;
        if bytes.len() < 1 + SIGNATURE_SIZE {
            return Err(Error::Protocol("group message is too short".to_string()));
        }
        if bytes[0] != GROUP_MESSAGE_VERSION {
            return Err(Error::Protocol(format!(
                "unsupported group message version {}",
                bytes[0]
            )));
        }

        let (signed_part, signature) = bytes.split_at(bytes.len() - SIGNATURE_SIZE);
        let mut signature_bytes = [0u8; SIGNATURE_SIZE];
        signature_bytes.copy_from_slice(signature);

        let proto = GroupMessageProto::decode(&signed_part[1..])?;

        Ok(Self {
            message_index: proto.message_index,
            ciphertext: proto.ciphertext,
            signed_part: signed_part.to_vec(),
            signature: Ed25519Signature::from_bytes(&signature_bytes),
        })
    }

    pub(crate) fn verify(&self, signing_key: &Ed25519PublicKey) -> Result<(), Error> {
        signing_key.verify(&self.signed_part, &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_and_verify() {
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        let public = Ed25519PublicKey::from(signing_key.verifying_key());

        let message = GroupMessage::new(7, vec![1, 2, 3], &signing_key);
        let decoded = GroupMessage::decode(&message.encode()).unwrap();

        assert_eq!(decoded, message);
        assert_eq!(decoded.message_index, 7);
        assert!(decoded.verify(&public).is_ok());
    }

    #[test]
    fn test_tampering_breaks_the_signature() {
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        let public = Ed25519PublicKey::from(signing_key.verifying_key());

        let mut bytes = base64_decode(GroupMessage::new(7, vec![1, 2, 3], &signing_key).encode())
            .unwrap();
        let last_ciphertext_byte = bytes.len() - SIGNATURE_SIZE - 1;
        bytes[last_ciphertext_byte] ^= 0xff;

        let decoded = GroupMessage::decode(&base64_encode(bytes)).unwrap();
        assert!(matches!(decoded.verify(&public), Err(Error::Signature(_))));
    }

    #[test]
    fn test_rejects_short_input() {
        assert!(matches!(
            GroupMessage::decode(&base64_encode([3u8; 10])),
            Err(Error::Protocol(_))
        ));
    }
}
