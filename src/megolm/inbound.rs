use crate::Error;
use crate::megolm::message::GroupMessage;
use crate::megolm::ratchet::MegolmRatchet;
use crate::megolm::session_key::{decode_exported, decode_session_key, encode_exported};
use crate::pickle::{decrypt_pickle, encrypt_pickle};
use crate::proto::InboundGroupSessionPickle;
use crate::types::{Ed25519PublicKey, base64_encode};

const INBOUND_PICKLE_VERSION: u32 = 1;

/// A decrypted group message and the index it was sent at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDecryption {
    /// The decrypted payload.
    pub plaintext: Vec<u8>,
    /// Position of the message in the sender's ratchet. Receivers use it to
    /// spot gaps, reordering and duplicates.
    pub message_index: u32,
}

struct InboundState {
    initial_ratchet: MegolmRatchet,
    latest_ratchet: MegolmRatchet,
    signing_key: Ed25519PublicKey,
    signing_key_verified: bool,
}

/// The receiving side of a Megolm session.
///
/// Decrypting does not consume message keys: the session keeps the ratchet at
/// the first index it knows, so any message at or after that index can be
/// decrypted again, and decrypting the same message twice yields the same
/// plaintext and index both times. Detecting replays is left to the caller,
/// using [`GroupDecryption::message_index`].
pub struct InboundGroupSession {
    state: Option<InboundState>,
}

impl InboundGroupSession {
    pub(crate) fn new() -> Self {
        Self { state: None }
    }

    fn state(&self) -> Result<&InboundState, Error> {
        self.state.as_ref().ok_or(Error::GroupSessionNotCreated)
    }

    fn set_state(
        &mut self,
        ratchet: MegolmRatchet,
        signing_key: Ed25519PublicKey,
        verified: bool,
    ) {
        tracing::debug!(
            session_id = %signing_key,
            first_known_index = ratchet.index(),
            "created inbound group session"
        );
        self.state = Some(InboundState {
            latest_ratchet: ratchet.clone(),
            initial_ratchet: ratchet,
            signing_key,
            signing_key_verified: verified,
        });
    }

    /// Imports a signed session key from
    /// [`OutboundGroupSession::session_key`](crate::OutboundGroupSession::session_key).
    pub fn create(&mut self, session_key: &str) -> Result<(), Error> {
        let (ratchet, signing_key) = decode_session_key(session_key)?;
        self.set_state(ratchet, signing_key, true);
        Ok(())
    }

    /// Imports an unsigned export from [`InboundGroupSession::export_session`].
    pub fn import_session(&mut self, exported: &str) -> Result<(), Error> {
        let (ratchet, signing_key) = decode_exported(exported)?;
        self.set_state(ratchet, signing_key, false);
        Ok(())
    }

    /// Exports the session so it can decrypt from `message_index` onwards.
    pub fn export_session(&self, message_index: u32) -> Result<String, Error> {
        let state = self.state()?;
        let ratchet = Self::ratchet_at(state, message_index)?;
        Ok(encode_exported(&ratchet, &state.signing_key))
    }

    /// The lowest index this session can decrypt.
    pub fn first_known_index(&self) -> Result<u32, Error> {
        Ok(self.state()?.initial_ratchet.index())
    }

    /// The sender's public signing key, which doubles as the session id.
    pub fn session_id(&self) -> Result<String, Error> {
        Ok(base64_encode(self.state()?.signing_key.to_bytes()))
    }

    /// Whether the session came from a signed session key rather than an export.
    pub fn is_verified(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.signing_key_verified)
    }

    fn ratchet_at(state: &InboundState, message_index: u32) -> Result<MegolmRatchet, Error> {
        let first_known = state.initial_ratchet.index();
        if message_index < first_known {
            return Err(Error::UnknownMessageIndex {
                first_known,
                requested: message_index,
            });
        }

        let mut ratchet = if state.latest_ratchet.index() <= message_index {
            state.latest_ratchet.clone()
        } else {
            state.initial_ratchet.clone()
        };
        ratchet.advance_to(message_index)?;

        Ok(ratchet)
    }

    /// Verifies and decrypts a group message.
    pub fn decrypt(&mut self, message: &str) -> Result<GroupDecryption, Error> {
        let state = self.state.as_mut().ok_or(Error::GroupSessionNotCreated)?;

        let message = GroupMessage::decode(message)?;
        message.verify(&state.signing_key)?;

        let ratchet = Self::ratchet_at(state, message.message_index)?;
        let plaintext = ratchet.message_cipher()?.decrypt(
            &message.ciphertext,
            &GroupMessage::associated_data(message.message_index),
        )?;

        // A message signed by the sender confirms the key, even for an import.
        state.signing_key_verified = true;
        if ratchet.index() >= state.latest_ratchet.index() {
            state.latest_ratchet = ratchet;
        }

        Ok(GroupDecryption {
            plaintext,
            message_index: message.message_index,
        })
    }

    /// Serializes the session under `pickle_key`.
    pub fn pickle(&self, pickle_key: &[u8]) -> Result<String, Error> {
        let state = self.state()?;
        let pickle = InboundGroupSessionPickle {
            version: INBOUND_PICKLE_VERSION,
            initial_ratchet: Some(state.initial_ratchet.to_pickle()),
            latest_ratchet: Some(state.latest_ratchet.to_pickle()),
            signing_key: state.signing_key.to_bytes().to_vec(),
            signing_key_verified: state.signing_key_verified,
        };

        encrypt_pickle(pickle_key, &pickle)
    }

    /// Restores state produced by [`InboundGroupSession::pickle`].
    pub fn unpickle(&mut self, pickle_key: &[u8], pickle: &str) -> Result<(), Error> {
        let pickle: InboundGroupSessionPickle = decrypt_pickle(pickle_key, pickle)?;
        if pickle.version != INBOUND_PICKLE_VERSION {
            return Err(Error::Serde(format!(
                "unsupported inbound group session pickle version {}",
                pickle.version
            )));
        }

        let (Some(initial_ratchet), Some(latest_ratchet)) =
            (pickle.initial_ratchet.as_ref(), pickle.latest_ratchet.as_ref())
        else {
            return Err(Error::Serde(
                "incomplete inbound group session pickle".to_string(),
            ));
        };
        let signing_key = <[u8; 32]>::try_from(pickle.signing_key.as_slice())
            .map_err(|_| Error::Serde("invalid signing key length".to_string()))?;

        self.state = Some(InboundState {
            initial_ratchet: MegolmRatchet::from_pickle(initial_ratchet)?,
            latest_ratchet: MegolmRatchet::from_pickle(latest_ratchet)?,
            signing_key: Ed25519PublicKey::from_bytes(&signing_key)?,
            signing_key_verified: pickle.signing_key_verified,
        });

        Ok(())
    }

    /// Releases the session, wiping its ratchets.
    pub fn free(self) {}
}
