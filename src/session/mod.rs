mod message;

pub use message::{MessageType, OlmMessage};

use crate::Error;
use crate::account::Account;
use crate::config::OlmConfig;
use crate::pickle::{decrypt_pickle, encrypt_pickle};
use crate::proto::{SessionKeysPickle, SessionPickle};
use crate::ratchet::DoubleRatchet;
use crate::triple_dh::{SessionKeys, TripleDh};
use crate::types::{X25519PublicKey, X25519Secret, generate_random_seed};
use message::{PreKeyMessage, decode_normal, encode_normal};

const SESSION_PICKLE_VERSION: u32 = 1;

struct EstablishedSession {
    session_keys: SessionKeys,
    ratchet: DoubleRatchet,
    received_message: bool,
}

/// A pairwise Olm session.
///
/// A new session is empty until it is established with
/// [`Session::create_outbound`], [`Session::create_inbound`] or
/// [`Session::unpickle`]. The initiator sends [`MessageType::PreKey`] messages until
/// it decrypts the first reply, and [`MessageType::Normal`] messages from then on.
///
/// A message decrypts once. Feeding the same ciphertext to the same session again
/// fails because its message key has been used up; a second session built from
/// the same pre-key message can still decrypt it.
pub struct Session {
    established: Option<EstablishedSession>,
    config: OlmConfig,
}

impl Session {
    pub(crate) fn new(config: OlmConfig) -> Self {
        Self {
            established: None,
            config,
        }
    }

    fn established(&self) -> Result<&EstablishedSession, Error> {
        self.established.as_ref().ok_or(Error::Session)
    }

    fn associated_data(
        alice_identity_key: &X25519PublicKey,
        bob_identity_key: &X25519PublicKey,
    ) -> Box<[u8; 64]> {
        let mut ad = Box::new([0u8; 64]);
        ad[0..32].copy_from_slice(alice_identity_key.as_bytes());
        ad[32..64].copy_from_slice(bob_identity_key.as_bytes());
        ad
    }

    /// Starts a session to a peer from its Curve25519 identity key and one of
    /// its one-time or fallback keys.
    pub fn create_outbound(
        &mut self,
        account: &Account,
        their_identity_key: &X25519PublicKey,
        their_one_time_key: &X25519PublicKey,
    ) -> Result<(), Error> {
        let identity_key = account.identity_key()?;
        let base_key = X25519Secret::from(generate_random_seed()?);

        let shared_secret = TripleDh::new(&self.config.protocol_info).initiate_for_alice(
            identity_key,
            &base_key,
            their_identity_key,
            their_one_time_key,
        )?;

        let ratchet = DoubleRatchet::initialize_for_alice(
            shared_secret,
            their_one_time_key,
            self.config.max_skipped_messages,
            self.config.max_skipped_message_keys,
            Self::associated_data(&identity_key.dh_key_public(), their_identity_key),
        )?;

        let session_keys = SessionKeys {
            identity_key: identity_key.dh_key_public(),
            base_key: base_key.public_key(),
            one_time_key: *their_one_time_key,
        };
        tracing::debug!(session_id = %session_keys.session_id(), "created outbound session");

        self.established = Some(EstablishedSession {
            session_keys,
            ratchet,
            received_message: false,
        });

        Ok(())
    }

    /// Sets up the receiving half of a session from a pre-key message body.
    ///
    /// The message itself is not decrypted; pass the same body to
    /// [`Session::decrypt`] afterwards. The one-time key stays in the account
    /// until [`Account::remove_one_time_keys`] is called.
    pub fn create_inbound(&mut self, account: &Account, body: &str) -> Result<(), Error> {
        let message = PreKeyMessage::decode(body)?;
        self.create_inbound_from_message(account, &message)
    }

    /// Like [`Session::create_inbound`], but fails unless the message was sent
    /// from `their_identity_key`.
    pub fn create_inbound_from(
        &mut self,
        account: &Account,
        their_identity_key: &X25519PublicKey,
        body: &str,
    ) -> Result<(), Error> {
        let message = PreKeyMessage::decode(body)?;
        if message.session_keys.identity_key != *their_identity_key {
            return Err(Error::PreKey(
                "Pre-key message was sent from a different identity key".to_string(),
            ));
        }

        self.create_inbound_from_message(account, &message)
    }

    fn create_inbound_from_message(
        &mut self,
        account: &Account,
        message: &PreKeyMessage,
    ) -> Result<(), Error> {
        let identity_key = account.identity_key()?;
        let session_keys = message.session_keys;
        let one_time_key = account.find_pre_key(&session_keys.one_time_key)?;

        let shared_secret = TripleDh::new(&self.config.protocol_info).initiate_for_bob(
            identity_key,
            one_time_key,
            &session_keys.identity_key,
            &session_keys.base_key,
        )?;

        let ratchet = DoubleRatchet::initialize_for_bob(
            shared_secret,
            one_time_key.clone(),
            self.config.max_skipped_messages,
            self.config.max_skipped_message_keys,
            Self::associated_data(&session_keys.identity_key, &identity_key.dh_key_public()),
        )?;
        tracing::debug!(session_id = %session_keys.session_id(), "created inbound session");

        self.established = Some(EstablishedSession {
            session_keys,
            ratchet,
            received_message: true,
        });

        Ok(())
    }

    /// Identifier shared by both halves of the session.
    pub fn session_id(&self) -> Result<String, Error> {
        Ok(self.established()?.session_keys.session_id())
    }

    /// Whether this session has decrypted a message from its peer.
    pub fn has_received_message(&self) -> bool {
        self.established
            .as_ref()
            .is_some_and(|session| session.received_message)
    }

    /// Whether a pre-key message body belongs to this session.
    pub fn matches_inbound(&self, body: &str) -> Result<bool, Error> {
        let session = self.established()?;
        let message = PreKeyMessage::decode(body)?;
        Ok(message.session_keys == session.session_keys)
    }

    /// Like [`Session::matches_inbound`], additionally requiring the message to
    /// come from `their_identity_key`.
    pub fn matches_inbound_from(
        &self,
        their_identity_key: &X25519PublicKey,
        body: &str,
    ) -> Result<bool, Error> {
        Ok(self.matches_inbound(body)?
            && self.established()?.session_keys.identity_key == *their_identity_key)
    }

    pub(crate) fn one_time_key_used(&self) -> Result<X25519PublicKey, Error> {
        Ok(self.established()?.session_keys.one_time_key)
    }

    /// Encrypts `plaintext`, advancing the sending chain.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<OlmMessage, Error> {
        let session = self.established.as_mut().ok_or(Error::Session)?;
        let message = session.ratchet.encrypt(plaintext)?;

        if session.received_message {
            Ok(OlmMessage {
                message_type: MessageType::Normal,
                body: encode_normal(&message),
            })
        } else {
            let pre_key_message = PreKeyMessage {
                session_keys: session.session_keys,
                message,
            };
            Ok(OlmMessage {
                message_type: MessageType::PreKey,
                body: pre_key_message.encode(),
            })
        }
    }

    /// Decrypts a message body of the given type.
    pub fn decrypt(&mut self, message_type: MessageType, body: &str) -> Result<Vec<u8>, Error> {
        let session = self.established.as_mut().ok_or(Error::Session)?;

        let message = match message_type {
            MessageType::PreKey => {
                let pre_key_message = PreKeyMessage::decode(body)?;
                if pre_key_message.session_keys != session.session_keys {
                    return Err(Error::Protocol(
                        "Pre-key message belongs to a different session".to_string(),
                    ));
                }
                pre_key_message.message
            }
            MessageType::Normal => decode_normal(body)?,
        };

        let plaintext = session.ratchet.decrypt(&message)?;
        session.received_message = true;

        Ok(plaintext)
    }

    /// Short human readable summary of the ratchet position, for debugging.
    pub fn describe(&self) -> String {
        match &self.established {
            Some(session) => {
                let state = &session.ratchet.state;
                format!(
                    "sender chain index: {} receiver chain index: {} skipped message keys: {}",
                    state.sending_chain.index,
                    state.receiving_chain.index,
                    session.ratchet.skipped_message_keys.len()
                )
            }
            None => "uninitialized session".to_string(),
        }
    }

    /// Serializes the session under `pickle_key`.
    pub fn pickle(&self, pickle_key: &[u8]) -> Result<String, Error> {
        let session = self.established()?;
        let pickle = SessionPickle {
            version: SESSION_PICKLE_VERSION,
            session_keys: Some(SessionKeysPickle {
                identity_key: session.session_keys.identity_key.to_bytes().to_vec(),
                base_key: session.session_keys.base_key.to_bytes().to_vec(),
                one_time_key: session.session_keys.one_time_key.to_bytes().to_vec(),
            }),
            ratchet: Some(session.ratchet.to_pickle()),
            received_message: session.received_message,
        };

        encrypt_pickle(pickle_key, &pickle)
    }

    /// Restores state produced by [`Session::pickle`].
    pub fn unpickle(&mut self, pickle_key: &[u8], pickle: &str) -> Result<(), Error> {
        let pickle: SessionPickle = decrypt_pickle(pickle_key, pickle)?;
        if pickle.version != SESSION_PICKLE_VERSION {
            return Err(Error::Serde(format!(
                "unsupported session pickle version {}",
                pickle.version
            )));
        }

        let (Some(keys), Some(ratchet)) = (pickle.session_keys, pickle.ratchet) else {
            return Err(Error::Serde("incomplete session pickle".to_string()));
        };

        self.established = Some(EstablishedSession {
            session_keys: SessionKeys {
                identity_key: X25519PublicKey::from_slice(&keys.identity_key)?,
                base_key: X25519PublicKey::from_slice(&keys.base_key)?,
                one_time_key: X25519PublicKey::from_slice(&keys.one_time_key)?,
            },
            ratchet: DoubleRatchet::from_pickle(&ratchet)?,
            received_message: pickle.received_message,
        });

        Ok(())
    }

    /// Releases the session, wiping its ratchet state.
    pub fn free(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        let mut account = Account::new(OlmConfig::default());
        account.create().unwrap();
        account
    }

    fn outbound_to(alice: &Account, bob: &mut Account) -> Session {
        bob.generate_one_time_keys(1).unwrap();
        let one_time_key = *bob.one_time_keys().unwrap().values().next().unwrap();

        let mut session = Session::new(OlmConfig::default());
        session
            .create_outbound(alice, &bob.curve25519_key().unwrap(), &one_time_key)
            .unwrap();
        session
    }

    #[test]
    fn test_uncreated_session() {
        let mut session = Session::new(OlmConfig::default());
        assert_eq!(session.encrypt(b"hi"), Err(Error::Session));
        assert_eq!(session.session_id(), Err(Error::Session));
        assert!(!session.has_received_message());
        assert_eq!(session.describe(), "uninitialized session");
    }

    #[test]
    fn test_inbound_session_shares_the_session_id() {
        let alice = account();
        let mut bob = account();
        let mut alice_session = outbound_to(&alice, &mut bob);

        let message = alice_session.encrypt(b"hello").unwrap();
        assert_eq!(message.message_type, MessageType::PreKey);

        let mut bob_session = Session::new(OlmConfig::default());
        bob_session.create_inbound(&bob, &message.body).unwrap();

        assert_eq!(bob_session.session_id(), alice_session.session_id());
        assert!(bob_session.matches_inbound(&message.body).unwrap());
        assert!(
            bob_session
                .matches_inbound_from(&alice.curve25519_key().unwrap(), &message.body)
                .unwrap()
        );
        assert!(
            !bob_session
                .matches_inbound_from(&bob.curve25519_key().unwrap(), &message.body)
                .unwrap()
        );
        assert_eq!(
            bob_session.decrypt(message.message_type, &message.body).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_inbound_from_checks_identity() {
        let alice = account();
        let mut bob = account();
        let mut alice_session = outbound_to(&alice, &mut bob);
        let message = alice_session.encrypt(b"hello").unwrap();

        let mut bob_session = Session::new(OlmConfig::default());
        let stranger = account().curve25519_key().unwrap();
        assert!(matches!(
            bob_session.create_inbound_from(&bob, &stranger, &message.body),
            Err(Error::PreKey(_))
        ));
    }

    #[test]
    fn test_unknown_one_time_key() {
        let alice = account();
        let mut bob = account();
        let mut alice_session = outbound_to(&alice, &mut bob);
        let message = alice_session.encrypt(b"hello").unwrap();

        let mut session = Session::new(OlmConfig::default());
        assert!(matches!(
            session.create_inbound(&account(), &message.body),
            Err(Error::PreKey(_))
        ));
    }

    #[test]
    fn test_pre_key_until_reply() {
        let alice = account();
        let mut bob = account();
        let mut alice_session = outbound_to(&alice, &mut bob);

        let first = alice_session.encrypt(b"one").unwrap();
        let second = alice_session.encrypt(b"two").unwrap();
        assert_eq!(second.message_type, MessageType::PreKey);

        let mut bob_session = Session::new(OlmConfig::default());
        bob_session.create_inbound(&bob, &first.body).unwrap();
        bob_session.decrypt(first.message_type, &first.body).unwrap();
        assert_eq!(
            bob_session.decrypt(second.message_type, &second.body).unwrap(),
            b"two"
        );

        let reply = bob_session.encrypt(b"three").unwrap();
        assert_eq!(reply.message_type, MessageType::Normal);
        alice_session.decrypt(reply.message_type, &reply.body).unwrap();
        assert!(alice_session.has_received_message());

        assert_eq!(
            alice_session.encrypt(b"four").unwrap().message_type,
            MessageType::Normal
        );
    }

    #[test]
    fn test_pre_key_message_for_other_session() {
        let alice = account();
        let mut bob = account();
        let mut first_session = outbound_to(&alice, &mut bob);
        let mut second_session = outbound_to(&alice, &mut bob);

        let first = first_session.encrypt(b"first").unwrap();
        let second = second_session.encrypt(b"second").unwrap();

        let mut bob_session = Session::new(OlmConfig::default());
        bob_session.create_inbound(&bob, &first.body).unwrap();
        assert!(!bob_session.matches_inbound(&second.body).unwrap());
        assert!(matches!(
            bob_session.decrypt(MessageType::PreKey, &second.body),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_pickle_round_trip() {
        let alice = account();
        let mut bob = account();
        let mut alice_session = outbound_to(&alice, &mut bob);
        let message = alice_session.encrypt(b"hello").unwrap();

        let pickle = alice_session.pickle(b"key").unwrap();
        let mut restored = Session::new(OlmConfig::default());
        restored.unpickle(b"key", &pickle).unwrap();
        assert_eq!(restored.session_id(), alice_session.session_id());
        assert!(!restored.has_received_message());

        let mut bob_session = Session::new(OlmConfig::default());
        bob_session.create_inbound(&bob, &message.body).unwrap();
        bob_session.decrypt(message.message_type, &message.body).unwrap();

        let next = restored.encrypt(b"from the restored session").unwrap();
        assert_eq!(
            bob_session.decrypt(next.message_type, &next.body).unwrap(),
            b"from the restored session"
        );

        assert_eq!(
            Session::new(OlmConfig::default()).unpickle(b"wrong", &pickle),
            Err(Error::BadPickleKey)
        );
    }

    #[test]
    fn test_describe_tracks_chains() {
        let alice = account();
        let mut bob = account();
        let mut alice_session = outbound_to(&alice, &mut bob);
        alice_session.encrypt(b"one").unwrap();
        alice_session.encrypt(b"two").unwrap();

        assert_eq!(
            alice_session.describe(),
            "sender chain index: 2 receiver chain index: 0 skipped message keys: 0"
        );
    }
}
