//! Olm's triple Diffie-Hellman handshake.
//!
//! The initiator (Alice) combines her identity key and a fresh base key with the
//! responder's (Bob's) identity key and one of his one-time or fallback keys:
//!
//! ```text
//! DH1 = DH(IKa, OTKb)
//! DH2 = DH(EKa, IKb)
//! DH3 = DH(EKa, OTKb)
//! ```

use crate::Error;
use crate::account::IdentityKey;
use crate::types::{X25519PublicKey, X25519Secret, base64_encode};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use x25519_dalek::SharedSecret;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const SALT: &[u8] = b"Mecholm-Olm-NaCl";

/// Root secret both sides feed into the double ratchet.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct TripleDhSecret(pub(crate) Box<[u8; 32]>);

/// The public keys that pin down one Olm session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SessionKeys {
    /// Curve25519 identity key of the initiator.
    pub(crate) identity_key: X25519PublicKey,
    /// The initiator's ephemeral key.
    pub(crate) base_key: X25519PublicKey,
    /// The responder's one-time or fallback key.
    pub(crate) one_time_key: X25519PublicKey,
}

impl SessionKeys {
    /// Both halves of a session derive the same id from these keys.
    pub(crate) fn session_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.identity_key.as_bytes());
        hasher.update(self.base_key.as_bytes());
        hasher.update(self.one_time_key.as_bytes());

        base64_encode(hasher.finalize())
    }
}

pub(crate) struct TripleDh<'a> {
    info: &'a [u8],
}

impl<'a> TripleDh<'a> {
    pub(crate) fn new(info: &'a [u8]) -> Self {
        Self { info }
    }

    /// Alice's side. `base_key` is her freshly generated ephemeral secret.
    pub(crate) fn initiate_for_alice(
        &self,
        alice_identity: &IdentityKey,
        base_key: &X25519Secret,
        bob_identity_key: &X25519PublicKey,
        bob_one_time_key: &X25519PublicKey,
    ) -> Result<TripleDhSecret, Error> {
        let dh1 = alice_identity.dh(bob_one_time_key);
        let dh2 = base_key.dh(bob_identity_key);
        let dh3 = base_key.dh(bob_one_time_key);

        self.calculate_shared_secret(dh1, dh2, dh3)
    }

    /// Bob's side, mirroring each exchange Alice performed.
    pub(crate) fn initiate_for_bob(
        &self,
        bob_identity: &IdentityKey,
        bob_one_time_key: &X25519Secret,
        alice_identity_key: &X25519PublicKey,
        alice_base_key: &X25519PublicKey,
    ) -> Result<TripleDhSecret, Error> {
        let dh1 = bob_one_time_key.dh(alice_identity_key);
        let dh2 = bob_identity.dh(alice_base_key);
        let dh3 = bob_one_time_key.dh(alice_base_key);

        self.calculate_shared_secret(dh1, dh2, dh3)
    }

    fn calculate_shared_secret(
        &self,
        dh1: SharedSecret,
        dh2: SharedSecret,
        dh3: SharedSecret,
    ) -> Result<TripleDhSecret, Error> {
        let mut key_material = Zeroizing::new([0u8; 96]);
        key_material[0..32].copy_from_slice(dh1.as_bytes());
        key_material[32..64].copy_from_slice(dh2.as_bytes());
        key_material[64..96].copy_from_slice(dh3.as_bytes());

        let hkdf = Hkdf::<Sha256>::new(Some(SALT), key_material.as_slice());

        let mut shared_secret = Box::new([0u8; 32]);
        hkdf.expand(self.info, shared_secret.as_mut_slice())
            .map_err(|_| Error::Crypto("HKDF expansion failed".to_string()))?;

        Ok(TripleDhSecret(shared_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::generate_random_seed;

    fn random_secret() -> X25519Secret {
        X25519Secret::from(generate_random_seed().unwrap())
    }

    #[test]
    fn test_both_sides_agree() {
        let alice = IdentityKey::new().unwrap();
        let bob = IdentityKey::new().unwrap();
        let bob_one_time_key = random_secret();
        let base_key = random_secret();

        let triple_dh = TripleDh::new(b"Test-Protocol-Info");
        let alice_secret = triple_dh
            .initiate_for_alice(
                &alice,
                &base_key,
                &bob.dh_key_public(),
                &bob_one_time_key.public_key(),
            )
            .unwrap();
        let bob_secret = triple_dh
            .initiate_for_bob(
                &bob,
                &bob_one_time_key,
                &alice.dh_key_public(),
                &base_key.public_key(),
            )
            .unwrap();

        assert_eq!(alice_secret.0, bob_secret.0);
    }

    #[test]
    fn test_protocol_info_separates_secrets() {
        let alice = IdentityKey::new().unwrap();
        let bob = IdentityKey::new().unwrap();
        let one_time_key = random_secret().public_key();
        let base_key = random_secret();

        let first = TripleDh::new(b"Protocol-Info-1")
            .initiate_for_alice(&alice, &base_key, &bob.dh_key_public(), &one_time_key)
            .unwrap();
        let second = TripleDh::new(b"Protocol-Info-2")
            .initiate_for_alice(&alice, &base_key, &bob.dh_key_public(), &one_time_key)
            .unwrap();

        assert_ne!(first.0, second.0);
    }

    #[test]
    fn test_session_id_covers_every_key() {
        let keys = SessionKeys {
            identity_key: random_secret().public_key(),
            base_key: random_secret().public_key(),
            one_time_key: random_secret().public_key(),
        };
        let other = SessionKeys {
            one_time_key: random_secret().public_key(),
            ..keys
        };

        assert_eq!(keys.session_id(), keys.session_id());
        assert_ne!(keys.session_id(), other.session_id());
        assert_eq!(keys.session_id().len(), 43);
    }
}
