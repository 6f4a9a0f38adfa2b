use crate::Error;
use crate::proto::PreKeyMessageProto;
use crate::ratchet::RatchetMessage;
use crate::triple_dh::SessionKeys;
use crate::types::{X25519PublicKey, base64_decode, base64_encode};
use prost::Message;
use std::fmt;

const MESSAGE_VERSION: u8 = 3;

/// Tells the receiver how to treat an Olm message body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Carries the keys needed to set up an inbound session. Sent until the
    /// initiator hears back from its peer.
    PreKey = 0,
    /// An ordinary ratchet message on an established session.
    Normal = 1,
}

impl From<MessageType> for usize {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::PreKey => 0,
            MessageType::Normal => 1,
        }
    }
}

impl TryFrom<usize> for MessageType {
    type Error = Error;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::PreKey),
            1 => Ok(Self::Normal),
            other => Err(Error::Protocol(format!("unknown message type {other}"))),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", usize::from(*self))
    }
}

/// An encrypted Olm message: the type tag and the unpadded base64 body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OlmMessage {
    /// Whether `body` is a pre-key or a normal message.
    pub message_type: MessageType,
    /// The encoded message.
    pub body: String,
}

pub(crate) fn encode_normal(message: &RatchetMessage) -> String {
    let mut bytes = vec![MESSAGE_VERSION];
    bytes.extend_from_slice(&message.to_bytes());
    base64_encode(bytes)
}

pub(crate) fn decode_normal(body: &str) -> Result<RatchetMessage, Error> {
    let bytes = base64_decode(body)?;
    match bytes.split_first() {
        Some((&MESSAGE_VERSION, rest)) => RatchetMessage::from_bytes(rest),
        Some((version, _)) => Err(Error::Protocol(format!(
            "unsupported message version {version}"
        ))),
        None => Err(Error::Protocol("empty message".to_string())),
    }
}

/// The first message of a session: the keys that set it up plus a normal message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PreKeyMessage {
    pub(crate) session_keys: SessionKeys,
    pub(crate) message: RatchetMessage,
}

impl PreKeyMessage {
    pub(crate) fn encode(&self) -> String {
        let proto = PreKeyMessageProto {
            one_time_key: self.session_keys.one_time_key.to_bytes().to_vec(),
            base_key: self.session_keys.base_key.to_bytes().to_vec(),
            identity_key: self.session_keys.identity_key.to_bytes().to_vec(),
            message: self.message.to_bytes(),
        };

        let mut bytes = vec![MESSAGE_VERSION];
        bytes.extend_from_slice(&proto.encode_to_vec());
        base64_encode(bytes)
    }

    pub(crate) fn decode(body: &str) -> Result<Self, Error> {
        let bytes = base64_decode(body)?;
        let proto = match bytes.split_first() {
            Some((&MESSAGE_VERSION, rest)) => PreKeyMessageProto::decode(rest)?,
            Some((version, _)) => {
                return Err(Error::Protocol(format!(
                    "unsupported pre-key message version {version}"
                )));
            }
            None => return Err(Error::Protocol("empty pre-key message".to_string())),
        };

        Ok(Self {
            session_keys: SessionKeys {
                identity_key: X25519PublicKey::from_slice(&proto.identity_key)?,
                base_key: X25519PublicKey::from_slice(&proto.base_key)?,
                one_time_key: X25519PublicKey::from_slice(&proto.one_time_key)?,
            },
            message: RatchetMessage::from_bytes(&proto.message)?,
        })
    }
}
