use crate::Error;
use crate::pickle::key_from_bytes;
use crate::proto::{ChainPickle, RatchetPickle};
use crate::ratchet::chain::Chain;
use crate::types::{X25519PublicKey, X25519Secret};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone)]
pub(crate) struct RatchetState {
    pub(crate) ad: Box<[u8; 64]>,

    pub(crate) dh_pair: X25519Secret,

    pub(crate) remote_dh_key_public: Option<X25519PublicKey>,

    pub(crate) root_key: Box<[u8; 32]>,
    pub(crate) sending_chain: Chain,
    pub(crate) receiving_chain: Chain,

    // Message counters
    pub(crate) previous_sending_chain_length: u32,
    pub(crate) sending_message_number: u32,
    pub(crate) receiving_message_number: u32,

    pub(crate) sending_header_key: Option<Box<[u8; 32]>>,
    pub(crate) receiving_header_key: Option<Box<[u8; 32]>>,
    pub(crate) next_sending_header_key: Box<[u8; 32]>,
    pub(crate) next_receiving_header_key: Option<Box<[u8; 32]>>,
}

impl Zeroize for RatchetState {
    fn zeroize(&mut self) {
        self.ad.zeroize();
        self.dh_pair.zeroize();

        self.root_key.zeroize();
        self.sending_chain.zeroize();
        self.receiving_chain.zeroize();

        self.sending_header_key.as_mut().map(|key| key.zeroize());
        self.receiving_header_key.as_mut().map(|key| key.zeroize());
        self.next_sending_header_key.zeroize();
        self.next_receiving_header_key
            .as_mut()
            .map(|key| key.zeroize());
    }
}

impl Drop for RatchetState {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for RatchetState {}

fn optional_key(bytes: Option<&Vec<u8>>, what: &str) -> Result<Option<Box<[u8; 32]>>, Error> {
    bytes.map(|bytes| key_from_bytes(bytes, what)).transpose()
}

impl RatchetState {
    pub(crate) fn to_pickle(&self) -> RatchetPickle {
        RatchetPickle {
            dh_pair: self.dh_pair.as_bytes().to_vec(),
            remote_dh_key_public: self.remote_dh_key_public.map(|key| key.to_bytes().to_vec()),
            root_key: self.root_key.to_vec(),
            sending_chain: Some(self.sending_chain.to_pickle()),
            receiving_chain: Some(self.receiving_chain.to_pickle()),
            previous_sending_chain_length: self.previous_sending_chain_length,
            sending_message_number: self.sending_message_number,
            receiving_message_number: self.receiving_message_number,
            sending_header_key: self.sending_header_key.as_ref().map(|key| key.to_vec()),
            receiving_header_key: self.receiving_header_key.as_ref().map(|key| key.to_vec()),
            next_sending_header_key: self.next_sending_header_key.to_vec(),
            next_receiving_header_key: self
                .next_receiving_header_key
                .as_ref()
                .map(|key| key.to_vec()),
            associated_data: self.ad.to_vec(),
            max_skip: 0,
            max_skipped_keys: 0,
            skipped_message_keys: Vec::new(),
        }
    }

    pub(crate) fn from_pickle(pickle: &RatchetPickle) -> Result<Self, Error> {
        let mut ad = Box::new([0u8; 64]);
        if pickle.associated_data.len() != ad.len() {
            return Err(Error::Serde("invalid associated data length".to_string()));
        }
        ad.copy_from_slice(&pickle.associated_data);

        let chain = |chain: Option<&ChainPickle>| -> Result<Chain, Error> {
            chain.map(Chain::from_pickle).transpose().map(Option::unwrap_or_default)
        };

        Ok(Self {
            ad,
            dh_pair: X25519Secret::from_slice(&pickle.dh_pair)?,
            remote_dh_key_public: pickle
                .remote_dh_key_public
                .as_deref()
                .map(X25519PublicKey::from_slice)
                .transpose()?,
            root_key: key_from_bytes(&pickle.root_key, "root key")?,
            sending_chain: chain(pickle.sending_chain.as_ref())?,
            receiving_chain: chain(pickle.receiving_chain.as_ref())?,
            previous_sending_chain_length: pickle.previous_sending_chain_length,
            sending_message_number: pickle.sending_message_number,
            receiving_message_number: pickle.receiving_message_number,
            sending_header_key: optional_key(pickle.sending_header_key.as_ref(), "header key")?,
            receiving_header_key: optional_key(
                pickle.receiving_header_key.as_ref(),
                "header key",
            )?,
            next_sending_header_key: key_from_bytes(
                &pickle.next_sending_header_key,
                "header key",
            )?,
            next_receiving_header_key: optional_key(
                pickle.next_receiving_header_key.as_ref(),
                "header key",
            )?,
        })
    }
}
