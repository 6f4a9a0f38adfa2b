use crate::Error;
use crate::megolm::message::GroupMessage;
use crate::megolm::ratchet::MegolmRatchet;
use crate::megolm::session_key::encode_session_key;
use crate::pickle::{decrypt_pickle, encrypt_pickle, key_from_bytes};
use crate::proto::OutboundGroupSessionPickle;
use crate::types::{base64_encode, generate_random_seed};
use ed25519_dalek::SigningKey;
use zeroize::Zeroize;

const OUTBOUND_PICKLE_VERSION: u32 = 1;

struct OutboundState {
    ratchet: MegolmRatchet,
    signing_key: Box<SigningKey>,
}

/// The sending side of a Megolm session.
///
/// Every call to [`OutboundGroupSession::encrypt`] uses the current message index
/// and then moves the ratchet on by one. There is no way to go back.
pub struct OutboundGroupSession {
    state: Option<OutboundState>,
}

impl OutboundGroupSession {
    pub(crate) fn new() -> Self {
        Self { state: None }
    }

    fn state(&self) -> Result<&OutboundState, Error> {
        self.state.as_ref().ok_or(Error::GroupSessionNotCreated)
    }

    /// Generates a fresh ratchet at index 0 and a new signing key.
    pub fn create(&mut self) -> Result<(), Error> {
        let mut seed = generate_random_seed()?;
        let signing_key = Box::new(SigningKey::from_bytes(&seed));
        seed.zeroize();

        let state = OutboundState {
            ratchet: MegolmRatchet::new()?,
            signing_key,
        };
        tracing::debug!(
            session_id = %base64_encode(state.signing_key.verifying_key().as_bytes()),
            "created outbound group session"
        );
        self.state = Some(state);

        Ok(())
    }

    /// The index the next encrypted message will carry.
    pub fn message_index(&self) -> Result<u32, Error> {
        Ok(self.state()?.ratchet.index())
    }

    /// The public signing key, which doubles as the session id.
    pub fn session_id(&self) -> Result<String, Error> {
        Ok(base64_encode(
            self.state()?.signing_key.verifying_key().as_bytes(),
        ))
    }

    /// Signed key that lets recipients decrypt from the current index onwards.
    pub fn session_key(&self) -> Result<String, Error> {
        let state = self.state()?;
        Ok(encode_session_key(&state.ratchet, &state.signing_key))
    }

    /// Encrypts and signs `plaintext` at the current index, then advances.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<String, Error> {
        let state = self.state.as_mut().ok_or(Error::GroupSessionNotCreated)?;

        let message_index = state.ratchet.index();
        let ciphertext = state
            .ratchet
            .message_cipher()?
            .encrypt(plaintext, &GroupMessage::associated_data(message_index))?;
        let message = GroupMessage::new(message_index, ciphertext, &state.signing_key);

        state.ratchet.advance()?;

        Ok(message.encode())
    }

    /// Serializes the session under `pickle_key`.
    pub fn pickle(&self, pickle_key: &[u8]) -> Result<String, Error> {
        let state = self.state()?;
        let pickle = OutboundGroupSessionPickle {
            version: OUTBOUND_PICKLE_VERSION,
            ratchet: Some(state.ratchet.to_pickle()),
            signing_key: state.signing_key.to_bytes().to_vec(),
        };

        encrypt_pickle(pickle_key, &pickle)
    }

    /// Restores state produced by [`OutboundGroupSession::pickle`].
    pub fn unpickle(&mut self, pickle_key: &[u8], pickle: &str) -> Result<(), Error> {
        let pickle: OutboundGroupSessionPickle = decrypt_pickle(pickle_key, pickle)?;
        if pickle.version != OUTBOUND_PICKLE_VERSION {
            return Err(Error::Serde(format!(
                "unsupported outbound group session pickle version {}",
                pickle.version
            )));
        }

        let ratchet = pickle
            .ratchet
            .as_ref()
            .ok_or_else(|| Error::Serde("incomplete outbound group session pickle".to_string()))?;
        let mut seed = key_from_bytes(&pickle.signing_key, "signing key")?;
        let signing_key = Box::new(SigningKey::from_bytes(&seed));
        seed.zeroize();

        self.state = Some(OutboundState {
            ratchet: MegolmRatchet::from_pickle(ratchet)?,
            signing_key,
        });

        Ok(())
    }

    /// Releases the session, wiping its ratchet and signing key.
    pub fn free(self) {}
}
