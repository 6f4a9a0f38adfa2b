//! Protobuf schemas for wire messages and pickles.

/// Body of a pre-key (type 0) message.
#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct PreKeyMessageProto {
    #[prost(bytes = "vec", tag = "1")]
    pub one_time_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub base_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub identity_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub message: Vec<u8>,
}

/// Signed body of a group message.
#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct GroupMessageProto {
    #[prost(uint32, tag = "1")]
    pub message_index: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub ciphertext: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct KeyPickle {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub key: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub published: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct AccountPickle {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub identity_key: Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub one_time_keys: Vec<KeyPickle>,
    #[prost(uint32, tag = "4")]
    pub next_key_id: u32,
    #[prost(message, optional, tag = "5")]
    pub fallback_key: Option<KeyPickle>,
    #[prost(message, optional, tag = "6")]
    pub previous_fallback_key: Option<KeyPickle>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct ChainPickle {
    #[prost(bytes = "vec", tag = "1")]
    pub chain_key: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub index: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct SkippedKeyPickle {
    #[prost(bytes = "vec", tag = "1")]
    pub header_key: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub message_number: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub message_key: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct RatchetPickle {
    #[prost(bytes = "vec", tag = "1")]
    pub dh_pair: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub remote_dh_key_public: Option<Vec<u8>>,
    #[prost(bytes = "vec", tag = "3")]
    pub root_key: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub sending_chain: Option<ChainPickle>,
    #[prost(message, optional, tag = "5")]
    pub receiving_chain: Option<ChainPickle>,
    #[prost(uint32, tag = "6")]
    pub previous_sending_chain_length: u32,
    #[prost(uint32, tag = "7")]
    pub sending_message_number: u32,
    #[prost(uint32, tag = "8")]
    pub receiving_message_number: u32,
    #[prost(bytes = "vec", optional, tag = "9")]
    pub sending_header_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "10")]
    pub receiving_header_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", tag = "11")]
    pub next_sending_header_key: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "12")]
    pub next_receiving_header_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", tag = "13")]
    pub associated_data: Vec<u8>,
    #[prost(uint32, tag = "14")]
    pub max_skip: u32,
    #[prost(message, repeated, tag = "15")]
    pub skipped_message_keys: Vec<SkippedKeyPickle>,
    #[prost(uint32, tag = "16")]
    pub max_skipped_keys: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct SessionKeysPickle {
    #[prost(bytes = "vec", tag = "1")]
    pub identity_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub base_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub one_time_key: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct SessionPickle {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(message, optional, tag = "2")]
    pub session_keys: Option<SessionKeysPickle>,
    #[prost(message, optional, tag = "3")]
    pub ratchet: Option<RatchetPickle>,
    #[prost(bool, tag = "4")]
    pub received_message: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct MegolmRatchetPickle {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub counter: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct OutboundGroupSessionPickle {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(message, optional, tag = "2")]
    pub ratchet: Option<MegolmRatchetPickle>,
    #[prost(bytes = "vec", tag = "3")]
    pub signing_key: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct InboundGroupSessionPickle {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(message, optional, tag = "2")]
    pub initial_ratchet: Option<MegolmRatchetPickle>,
    #[prost(message, optional, tag = "3")]
    pub latest_ratchet: Option<MegolmRatchetPickle>,
    #[prost(bytes = "vec", tag = "4")]
    pub signing_key: Vec<u8>,
    #[prost(bool, tag = "5")]
    pub signing_key_verified: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct PkDecryptionPickle {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub private_key: Vec<u8>,
}
