mod chain;
mod message;
mod state;

use crate::cipher::{MessageCipher, NONCE_SIZE};
use crate::error::Error;
use crate::pickle::key_from_bytes;
use crate::proto::{RatchetPickle, SkippedKeyPickle};
use crate::ratchet::chain::Chain;
use crate::ratchet::message::{HEADER_SIZE, MessageHeader};
pub(crate) use crate::ratchet::message::RatchetMessage;
use crate::ratchet::state::RatchetState;
use crate::triple_dh::TripleDhSecret;
use crate::types::{X25519PublicKey, X25519Secret, fill_random, generate_random_seed};
use hkdf::Hkdf;
use sha2::Sha256;
use std::cell::RefCell;
use std::collections::VecDeque;
use x25519_dalek::SharedSecret;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const MESSAGE_KEYS_INFO: &[u8] = b"Mecholm-Message-Keys";
const HEADER_INFO: &[u8] = b"Mecholm-Header";

thread_local! {
    static AD_BUFFER: RefCell<Vec<u8>> = RefCell::new(Vec::with_capacity(256));
}

fn with_ad_buffer<F, R>(f: F) -> R
where
    F: FnOnce(&mut Vec<u8>) -> R,
{
    AD_BUFFER.with(|buffer| {
        let mut buffer = buffer.borrow_mut();
        buffer.clear();
        f(&mut buffer)
    })
}

/// A message key kept for a message that has not arrived yet.
#[derive(Clone)]
pub(crate) struct SkippedMessageKey {
    header_key: Box<[u8; 32]>,
    message_number: u32,
    message_key: Box<[u8; 32]>,
}

impl Zeroize for SkippedMessageKey {
    fn zeroize(&mut self) {
        self.header_key.zeroize();
        self.message_key.zeroize();
    }
}

impl Drop for SkippedMessageKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SkippedMessageKey {}

/// Double ratchet with header encryption, the engine behind every Olm session.
///
/// Provides forward secrecy through the symmetric chains and break-in recovery
/// through a DH step every time the conversation changes direction. Message keys
/// skipped by out-of-order delivery are kept, up to `max_skip` per chain and
/// `max_skipped_keys` in total. Past the total the oldest keys are dropped.
///
/// A message key is used at most once. Replaying a message whose key has been
/// consumed fails with [`Error::Protocol`].
#[derive(Clone)]
pub(crate) struct DoubleRatchet {
    pub(crate) state: RatchetState,
    // Oldest first
    pub(crate) skipped_message_keys: VecDeque<SkippedMessageKey>,
    pub(crate) max_skip: u32,
    pub(crate) max_skipped_keys: usize,
}

impl Zeroize for DoubleRatchet {
    fn zeroize(&mut self) {
        self.state.zeroize();
        self.skipped_message_keys
            .iter_mut()
            .for_each(SkippedMessageKey::zeroize);
        self.skipped_message_keys.clear();
    }
}

impl Drop for DoubleRatchet {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl DoubleRatchet {
    /// Get the current dh ratchet public key
    pub(crate) fn public_key(&self) -> X25519PublicKey {
        self.state.dh_pair.public_key()
    }

    /// Initializes the initiator's ratchet. Bob's one-time key doubles as his
    /// first ratchet key, so Alice can send straight away.
    pub(crate) fn initialize_for_alice(
        shared_secret: TripleDhSecret,
        bob_public_key: &X25519PublicKey,
        max_skipped_messages: u32,
        max_skipped_keys: usize,
        ad: Box<[u8; 64]>,
    ) -> Result<Self, Error> {
        let dh_pair = X25519Secret::from(generate_random_seed()?);

        // Perform initial DH and KDF
        let dh_output = dh_pair.dh(bob_public_key);
        let (new_root_key, chain_key, next_sending_header_key) =
            Self::kdf_rk_he(&shared_secret.0, dh_output)?;

        let (header_key_a, next_header_key_b) = Self::derive_initial_header_keys(&shared_secret.0)?;

        Ok(Self {
            state: RatchetState {
                ad,
                root_key: new_root_key,
                dh_pair,
                remote_dh_key_public: Some(*bob_public_key),
                sending_chain: Chain::new(chain_key),
                sending_header_key: Some(header_key_a),
                next_sending_header_key,
                receiving_chain: Chain::default(),
                receiving_header_key: None,
                next_receiving_header_key: Some(next_header_key_b),
                previous_sending_chain_length: 0,
                sending_message_number: 0,
                receiving_message_number: 0,
            },
            skipped_message_keys: VecDeque::new(),
            max_skip: max_skipped_messages,
            max_skipped_keys,
        })
    }

    /// Initializes the responder's ratchet from the private half of the
    /// one-time key Alice used.
    pub(crate) fn initialize_for_bob(
        shared_secret: TripleDhSecret,
        dh_pair: X25519Secret,
        max_skipped_messages: u32,
        max_skipped_keys: usize,
        ad: Box<[u8; 64]>,
    ) -> Result<Self, Error> {
        let (header_key_a, next_header_key_b) = Self::derive_initial_header_keys(&shared_secret.0)?;

        Ok(Self {
            state: RatchetState {
                ad,
                root_key: shared_secret.0.clone(),
                dh_pair,
                remote_dh_key_public: None,
                sending_chain: Chain::default(),
                sending_header_key: None,
                next_sending_header_key: next_header_key_b,
                receiving_chain: Chain::default(),
                receiving_header_key: None,
                next_receiving_header_key: Some(header_key_a),
                previous_sending_chain_length: 0,
                sending_message_number: 0,
                receiving_message_number: 0,
            },
            skipped_message_keys: VecDeque::new(),
            max_skip: max_skipped_messages,
            max_skipped_keys,
        })
    }

    fn derive_initial_header_keys(
        root_key: &[u8; 32],
    ) -> Result<(Box<[u8; 32]>, Box<[u8; 32]>), Error> {
        let hkdf = Hkdf::<Sha256>::new(None, root_key);

        let mut header_key_a = Box::new([0u8; 32]);
        let mut next_header_key_b = Box::new([0u8; 32]);

        hkdf.expand(b"Mecholm-Header-Key-A", header_key_a.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;
        hkdf.expand(
            b"Mecholm-Next-Header-Key-B",
            next_header_key_b.as_mut_slice(),
        )
        .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        Ok((header_key_a, next_header_key_b))
    }

    /// Key derivation function for the root key ratchet with header encyption.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// 1. The new root key
    /// 2. The new chain key
    /// 3. The next header encryption key
    #[allow(clippy::type_complexity)]
    fn kdf_rk_he(
        root_key: &[u8; 32],
        dh_output: SharedSecret,
    ) -> Result<(Box<[u8; 32]>, Box<[u8; 32]>, Box<[u8; 32]>), Error> {
        let hkdf = Hkdf::<Sha256>::new(Some(root_key), dh_output.as_bytes());

        let mut new_root_key = Box::new([0u8; 32]);
        let mut chain_key = Box::new([0u8; 32]);
        let mut next_header_key = Box::new([0u8; 32]);

        hkdf.expand(b"Mecholm-Ratchet-Root", new_root_key.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed for root key".to_string()))?;
        hkdf.expand(b"Mecholm-Ratchet-Chain", chain_key.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed for chain key".to_string()))?;
        hkdf.expand(b"Mecholm-Ratchet-Next-Header", next_header_key.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed for header key".to_string()))?;

        Ok((new_root_key, chain_key, next_header_key))
    }

    /// Encrypts `plaintext` with the next key of the sending chain.
    pub(crate) fn encrypt(&mut self, plaintext: &[u8]) -> Result<RatchetMessage, Error> {
        let header = MessageHeader {
            public_key: self.public_key(),
            previous_chain_length: self.state.previous_sending_chain_length,
            message_number: self.state.sending_message_number,
        };
        let encrypted_header = self.encrypt_header(&header)?;

        let message_key = Zeroizing::new(*self.state.sending_chain.next()?);
        let ciphertext = with_ad_buffer(|buffer| {
            buffer.extend_from_slice(self.state.ad.as_slice());
            buffer.extend_from_slice(&encrypted_header);
            MessageCipher::derive(message_key.as_slice(), MESSAGE_KEYS_INFO)?
                .encrypt(plaintext, buffer)
        })?;

        self.state.sending_message_number = self.state.sending_message_number.wrapping_add(1);

        Ok(RatchetMessage {
            header: encrypted_header,
            ciphertext,
        })
    }

    /// Encrypts a message header under the sending header key with a random nonce.
    fn encrypt_header(&self, header: &MessageHeader) -> Result<Vec<u8>, Error> {
        let hk = self
            .state
            .sending_header_key
            .as_ref()
            .ok_or_else(|| Error::Protocol("No sending header key available".to_string()))?;

        let mut nonce = [0u8; NONCE_SIZE];
        fill_random(&mut nonce)?;

        let ciphertext = MessageCipher::derive(hk.as_slice(), HEADER_INFO)?
            .with_nonce(nonce)
            .encrypt(&header.to_bytes(), &[])?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// Decrypts a message, advancing the receiving side of the ratchet.
    ///
    /// State is only committed once the payload authenticates, so a forged or
    /// corrupted message leaves the ratchet untouched.
    pub(crate) fn decrypt(&mut self, message: &RatchetMessage) -> Result<Vec<u8>, Error> {
        if let Some(plaintext) = self.try_skipped_message_keys(message)? {
            return Ok(plaintext);
        }

        let (header, should_ratchet) = self.try_decrypt_header(&message.header)?;

        let mut state = self.state.clone();
        let mut skipped = Vec::new();

        if should_ratchet {
            Self::skip_message_keys(
                &mut state,
                &mut skipped,
                header.previous_chain_length,
                self.max_skip,
            )?;
            Self::dh_ratchet(&mut state, &header)?;
        } else if header.message_number < state.receiving_message_number {
            tracing::warn!(
                message_number = header.message_number,
                "rejected a message whose key was already used"
            );
            return Err(Error::Protocol(
                "Message key already used, the message was replayed".to_string(),
            ));
        }

        // Skip ahead if needed
        Self::skip_message_keys(&mut state, &mut skipped, header.message_number, self.max_skip)?;

        let message_key = Zeroizing::new(*state.receiving_chain.next()?);
        state.receiving_message_number = state.receiving_message_number.wrapping_add(1);

        let plaintext = with_ad_buffer(|buffer| {
            buffer.extend_from_slice(state.ad.as_slice());
            buffer.extend_from_slice(&message.header);
            MessageCipher::derive(message_key.as_slice(), MESSAGE_KEYS_INFO)?
                .decrypt(&message.ciphertext, buffer)
        })?;

        self.state = state;
        for skipped_key in skipped {
            self.store_skipped_key(skipped_key);
        }

        Ok(plaintext)
    }

    fn store_skipped_key(&mut self, skipped_key: SkippedMessageKey) {
        self.skipped_message_keys.push_back(skipped_key);

        let excess = self
            .skipped_message_keys
            .len()
            .saturating_sub(self.max_skipped_keys);
        if excess > 0 {
            self.skipped_message_keys.drain(..excess);
            tracing::debug!(dropped = excess, "dropped the oldest skipped message keys");
        }
    }

    /// Tries to decrypt a message using previously skipped message keys.
    fn try_skipped_message_keys(
        &mut self,
        message: &RatchetMessage,
    ) -> Result<Option<Vec<u8>>, Error> {
        let mut header_keys: Vec<&[u8; 32]> = Vec::new();
        for skipped in &self.skipped_message_keys {
            if !header_keys.contains(&&*skipped.header_key) {
                header_keys.push(&*skipped.header_key);
            }
        }

        let position = header_keys.into_iter().find_map(|header_key| {
            let header = Self::decrypt_header(&message.header, header_key)?;
            self.skipped_message_keys.iter().position(|skipped| {
                *skipped.header_key == *header_key
                    && skipped.message_number == header.message_number
            })
        });

        let Some(position) = position else {
            return Ok(None);
        };
        let Some(skipped) = self.skipped_message_keys.get(position) else {
            return Ok(None);
        };

        let plaintext = with_ad_buffer(|buffer| {
            buffer.extend_from_slice(self.state.ad.as_slice());
            buffer.extend_from_slice(&message.header);
            MessageCipher::derive(skipped.message_key.as_slice(), MESSAGE_KEYS_INFO)?
                .decrypt(&message.ciphertext, buffer)
        })?;

        self.skipped_message_keys.remove(position);

        Ok(Some(plaintext))
    }

    /// Tries to decrypt a header with both current and next header keys.
    ///
    /// Success with the next key means the sender has performed a DH step.
    fn try_decrypt_header(&self, encrypted_header: &[u8]) -> Result<(MessageHeader, bool), Error> {
        if let Some(ref rhk) = self.state.receiving_header_key {
            if let Some(header) = Self::decrypt_header(encrypted_header, rhk) {
                return Ok((header, false));
            }
        }

        if let Some(ref nrhk) = self.state.next_receiving_header_key {
            if let Some(header) = Self::decrypt_header(encrypted_header, nrhk) {
                return Ok((header, true));
            }
        }

        Err(Error::Protocol("Failed to decrypt header".to_string()))
    }

    /// Decrypts a message header using a specific header key.
    fn decrypt_header(encrypted_header: &[u8], hk: &[u8; 32]) -> Option<MessageHeader> {
        if encrypted_header.len() < NONCE_SIZE {
            return None;
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&encrypted_header[..NONCE_SIZE]);

        let plaintext = MessageCipher::derive(hk, HEADER_INFO)
            .ok()?
            .with_nonce(nonce)
            .decrypt(&encrypted_header[NONCE_SIZE..], &[])
            .ok()?;

        let header_bytes = <[u8; HEADER_SIZE]>::try_from(plaintext.as_slice()).ok()?;
        Some(MessageHeader::from(header_bytes))
    }

    /// Performs a Diffie-Hellman ratchet step.
    fn dh_ratchet(state: &mut RatchetState, header: &MessageHeader) -> Result<(), Error> {
        let seed = generate_random_seed()?;

        state.previous_sending_chain_length = state.sending_chain.index;

        // Update remote public key
        state.remote_dh_key_public = Some(header.public_key);

        // Reset message counters
        state.receiving_message_number = 0;
        state.sending_message_number = 0;

        state.receiving_header_key = state.next_receiving_header_key.clone();
        state.sending_header_key = Some(state.next_sending_header_key.clone());

        // Derive new receiving chain
        let dh_output = state.dh_pair.dh(&header.public_key);
        let (new_root_key, chain_key, next_header_key) =
            Self::kdf_rk_he(&state.root_key, dh_output)?;
        state.root_key = new_root_key;
        state.receiving_chain = Chain::new(chain_key);
        state.next_receiving_header_key = Some(next_header_key);

        // Generate new DH key pair
        state.dh_pair = X25519Secret::from(seed);

        // Derive new sending chain
        let dh_output = state.dh_pair.dh(&header.public_key);
        let (new_root_key, chain_key, next_header_key) =
            Self::kdf_rk_he(&state.root_key, dh_output)?;
        state.root_key = new_root_key;
        state.sending_chain = Chain::new(chain_key);
        state.next_sending_header_key = next_header_key;

        Ok(())
    }

    /// Derives the message keys of the receiving chain up to `until`, so
    /// messages that arrive late can still be opened.
    fn skip_message_keys(
        state: &mut RatchetState,
        skipped: &mut Vec<SkippedMessageKey>,
        until: u32,
        max_skip: u32,
    ) -> Result<(), Error> {
        if state.receiving_message_number.saturating_add(max_skip) < until {
            tracing::warn!(until, max_skip, "refusing to skip too many message keys");
            return Err(Error::Protocol("Too many skipped messages".to_string()));
        }

        if state.receiving_chain.is_empty() {
            return Ok(());
        }

        while state.receiving_message_number < until {
            let message_key = state.receiving_chain.next()?;

            if let Some(rhk) = state.receiving_header_key.clone() {
                skipped.push(SkippedMessageKey {
                    header_key: rhk,
                    message_number: state.receiving_message_number,
                    message_key,
                });
            }

            state.receiving_message_number = state.receiving_message_number.wrapping_add(1);
        }

        Ok(())
    }

    pub(crate) fn to_pickle(&self) -> RatchetPickle {
        let mut pickle = self.state.to_pickle();
        pickle.max_skip = self.max_skip;
        pickle.max_skipped_keys = u32::try_from(self.max_skipped_keys).unwrap_or(u32::MAX);
        pickle.skipped_message_keys = self
            .skipped_message_keys
            .iter()
            .map(|skipped| SkippedKeyPickle {
                header_key: skipped.header_key.to_vec(),
                message_number: skipped.message_number,
                message_key: skipped.message_key.to_vec(),
            })
            .collect();

        pickle
    }

    pub(crate) fn from_pickle(pickle: &RatchetPickle) -> Result<Self, Error> {
        let skipped_message_keys = pickle
            .skipped_message_keys
            .iter()
            .map(|skipped| {
                Ok(SkippedMessageKey {
                    header_key: key_from_bytes(&skipped.header_key, "header key")?,
                    message_number: skipped.message_number,
                    message_key: key_from_bytes(&skipped.message_key, "message key")?,
                })
            })
            .collect::<Result<VecDeque<_>, Error>>()?;

        let max_skipped_keys = usize::try_from(pickle.max_skipped_keys)
            .map_err(|_| Error::Serde("invalid skipped key limit".to_string()))?;

        Ok(Self {
            state: RatchetState::from_pickle(pickle)?,
            skipped_message_keys,
            max_skip: pickle.max_skip,
            max_skipped_keys,
        })
    }
}
