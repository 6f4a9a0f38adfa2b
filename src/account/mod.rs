mod fallback_key;
mod identity_key;
mod one_time_keys;

pub(crate) use identity_key::IdentityKey;

use crate::Error;
use crate::config::OlmConfig;
use crate::pickle::{decrypt_pickle, encrypt_pickle};
use crate::proto::AccountPickle;
use crate::session::Session;
use crate::types::{Ed25519PublicKey, Ed25519Signature, KeyId, X25519PublicKey, X25519Secret};
use fallback_key::FallbackKeys;
use one_time_keys::OneTimeKeys;
use std::collections::BTreeMap;

const ACCOUNT_PICKLE_VERSION: u32 = 1;

/// The public halves of an account's identity key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityKeys {
    /// Key agreement key, used to establish Olm sessions.
    pub curve25519: X25519PublicKey,
    /// Fingerprint key, used to sign device keys and one-time keys.
    pub ed25519: Ed25519PublicKey,
}

/// A device's long-term identity plus its pools of one-time and fallback keys.
///
/// A fresh account holds no keys. Call [`Account::create`] (or
/// [`Account::unpickle`]) before reading key material, otherwise every accessor
/// fails with [`Error::AccountNotCreated`].
///
/// The account only tracks whether a one-time key has been *published*. It does
/// not notice when the same published key is used by two different peers; callers
/// remove a key with [`Account::remove_one_time_keys`] once an inbound session
/// consumed it.
pub struct Account {
    identity_key: Option<IdentityKey>,
    one_time_keys: OneTimeKeys,
    fallback_keys: FallbackKeys,
    config: OlmConfig,
}

impl Account {
    pub(crate) fn new(config: OlmConfig) -> Self {
        Self {
            identity_key: None,
            one_time_keys: OneTimeKeys::new(config.max_one_time_keys),
            fallback_keys: FallbackKeys::default(),
            config,
        }
    }

    /// Generates the identity key pair.
    pub fn create(&mut self) -> Result<(), Error> {
        if self.identity_key.is_some() {
            return Err(Error::AccountAlreadyCreated);
        }

        let identity_key = IdentityKey::new()?;
        tracing::debug!(
            curve25519 = %identity_key.dh_key_public(),
            "created account identity key"
        );
        self.identity_key = Some(identity_key);

        Ok(())
    }

    pub(crate) fn identity_key(&self) -> Result<&IdentityKey, Error> {
        self.identity_key.as_ref().ok_or(Error::AccountNotCreated)
    }

    /// Returns both public identity keys.
    pub fn identity_keys(&self) -> Result<IdentityKeys, Error> {
        let identity_key = self.identity_key()?;
        Ok(IdentityKeys {
            curve25519: identity_key.dh_key_public(),
            ed25519: identity_key.signing_key_public(),
        })
    }

    /// Returns the Curve25519 identity key.
    pub fn curve25519_key(&self) -> Result<X25519PublicKey, Error> {
        Ok(self.identity_key()?.dh_key_public())
    }

    /// Returns the Ed25519 fingerprint key.
    pub fn ed25519_key(&self) -> Result<Ed25519PublicKey, Error> {
        Ok(self.identity_key()?.signing_key_public())
    }

    /// Signs `message` with the Ed25519 fingerprint key.
    pub fn sign(&self, message: &[u8]) -> Result<Ed25519Signature, Error> {
        Ok(self.identity_key()?.sign(message))
    }

    /// Size of the one-time key pool.
    pub fn max_number_of_one_time_keys(&self) -> usize {
        self.one_time_keys.max_keys
    }

    /// Generates `count` one-time keys, evicting the oldest keys past the pool size.
    pub fn generate_one_time_keys(&mut self, count: usize) -> Result<(), Error> {
        self.identity_key()?;
        self.one_time_keys.generate(count)?;
        tracing::debug!(count, "generated one-time keys");

        Ok(())
    }

    /// Returns the one-time keys that have not been published yet.
    pub fn one_time_keys(&self) -> Result<BTreeMap<KeyId, X25519PublicKey>, Error> {
        self.identity_key()?;
        Ok(self.one_time_keys.unpublished())
    }

    /// Marks every current one-time key and the current fallback key as published.
    pub fn mark_keys_as_published(&mut self) {
        self.one_time_keys.mark_as_published();
        self.fallback_keys.mark_as_published();
    }

    /// Removes the one-time key an inbound session was created from.
    ///
    /// Fails with [`Error::PreKey`] when the session used a fallback key or a key
    /// that was already removed.
    pub fn remove_one_time_keys(&mut self, session: &Session) -> Result<(), Error> {
        self.identity_key()?;
        let one_time_key = session.one_time_key_used()?;

        let id = self
            .one_time_keys
            .remove(&one_time_key)
            .ok_or_else(|| Error::PreKey("One-time key not found".to_string()))?;
        tracing::debug!(key_id = %id, "removed one-time key");

        Ok(())
    }

    /// Generates a new fallback key.
    pub fn generate_fallback_key(&mut self) -> Result<(), Error> {
        self.identity_key()?;
        let id = self.one_time_keys.allocate_id();
        self.fallback_keys.generate(id)?;
        tracing::debug!(key_id = %id, "generated fallback key");

        Ok(())
    }

    /// Returns the current fallback key if it has not been published yet.
    pub fn unpublished_fallback_key(&self) -> Result<Option<(KeyId, X25519PublicKey)>, Error> {
        self.identity_key()?;
        Ok(self.fallback_keys.unpublished())
    }

    /// Forgets the fallback key that preceded the current one. Returns whether
    /// a key was removed.
    pub fn forget_old_fallback_key(&mut self) -> bool {
        self.fallback_keys.forget_previous()
    }

    /// Looks up the private half of a one-time or fallback key. Neither is
    /// consumed.
    pub(crate) fn find_pre_key(&self, public_key: &X25519PublicKey) -> Result<&X25519Secret, Error> {
        if let Some((_, key)) = self.one_time_keys.find(public_key) {
            return Ok(&key.key);
        }

        self.fallback_keys
            .find(public_key)
            .map(|key| &key.key)
            .ok_or_else(|| Error::PreKey("Unknown one-time key".to_string()))
    }

    /// Serializes the account under `pickle_key`.
    pub fn pickle(&self, pickle_key: &[u8]) -> Result<String, Error> {
        let identity_key = self.identity_key()?;
        let (fallback_key, previous_fallback_key) = self.fallback_keys.to_pickle();

        let pickle = AccountPickle {
            version: ACCOUNT_PICKLE_VERSION,
            identity_key: identity_key.to_bytes().to_vec(),
            one_time_keys: self.one_time_keys.to_pickle(),
            next_key_id: self.one_time_keys.next_id,
            fallback_key,
            previous_fallback_key,
        };

        encrypt_pickle(pickle_key, &pickle)
    }

    /// Restores state produced by [`Account::pickle`], replacing any keys this
    /// account already holds.
    pub fn unpickle(&mut self, pickle_key: &[u8], pickle: &str) -> Result<(), Error> {
        let pickle: AccountPickle = decrypt_pickle(pickle_key, pickle)?;
        if pickle.version != ACCOUNT_PICKLE_VERSION {
            return Err(Error::Serde(format!(
                "unsupported account pickle version {}",
                pickle.version
            )));
        }

        let identity_key = IdentityKey::try_from(pickle.identity_key.as_slice())?;
        let one_time_keys = OneTimeKeys::from_pickle(
            &pickle.one_time_keys,
            pickle.next_key_id,
            self.config.max_one_time_keys,
        )?;
        let fallback_keys = FallbackKeys::from_pickle(
            pickle.fallback_key.as_ref(),
            pickle.previous_fallback_key.as_ref(),
        )?;

        self.identity_key = Some(identity_key);
        self.one_time_keys = one_time_keys;
        self.fallback_keys = fallback_keys;

        Ok(())
    }

    /// Releases the account, wiping its private keys.
    pub fn free(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_account() -> Account {
        let mut account = Account::new(OlmConfig::default());
        account.create().unwrap();
        account
    }

    #[test]
    fn test_uncreated_account_has_no_keys() {
        let mut account = Account::new(OlmConfig::default());

        assert_eq!(account.identity_keys(), Err(Error::AccountNotCreated));
        assert_eq!(account.one_time_keys(), Err(Error::AccountNotCreated));
        assert_eq!(
            account.generate_one_time_keys(1),
            Err(Error::AccountNotCreated)
        );
        assert_eq!(
            account.unpublished_fallback_key(),
            Err(Error::AccountNotCreated)
        );
        assert_eq!(account.pickle(b"key"), Err(Error::AccountNotCreated));
    }

    #[test]
    fn test_create_twice_fails() {
        let mut account = created_account();
        assert_eq!(account.create(), Err(Error::AccountAlreadyCreated));
    }

    #[test]
    fn test_signature_verifies_with_ed25519_key() {
        let account = created_account();
        let signature = account.sign(b"device keys").unwrap();

        let ed25519 = account.ed25519_key().unwrap();
        assert!(ed25519.verify(b"device keys", &signature).is_ok());
        assert_eq!(account.identity_keys().unwrap().ed25519, ed25519);
    }

    #[test]
    fn test_one_time_key_publication() {
        let mut account = created_account();
        account.generate_one_time_keys(5).unwrap();
        assert_eq!(account.one_time_keys().unwrap().len(), 5);

        account.mark_keys_as_published();
        assert!(account.one_time_keys().unwrap().is_empty());

        account.generate_one_time_keys(2).unwrap();
        assert_eq!(account.one_time_keys().unwrap().len(), 2);
    }

    #[test]
    fn test_pool_is_bounded() {
        let mut account = Account::new(OlmConfig {
            max_one_time_keys: 4,
            ..OlmConfig::default()
        });
        account.create().unwrap();

        account.generate_one_time_keys(10).unwrap();
        assert_eq!(account.max_number_of_one_time_keys(), 4);
        assert_eq!(account.one_time_keys().unwrap().len(), 4);
    }

    #[test]
    fn test_fallback_key_lifecycle() {
        let mut account = created_account();
        assert_eq!(account.unpublished_fallback_key().unwrap(), None);

        account.generate_fallback_key().unwrap();
        let (_, first) = account.unpublished_fallback_key().unwrap().unwrap();
        assert!(account.find_pre_key(&first).is_ok());

        account.mark_keys_as_published();
        assert_eq!(account.unpublished_fallback_key().unwrap(), None);

        account.generate_fallback_key().unwrap();
        assert!(account.find_pre_key(&first).is_ok());

        assert!(account.forget_old_fallback_key());
        assert!(matches!(
            account.find_pre_key(&first),
            Err(Error::PreKey(_))
        ));
    }

    #[test]
    fn test_pickle_round_trip() {
        let mut account = created_account();
        account.generate_one_time_keys(3).unwrap();
        account.generate_fallback_key().unwrap();

        let pickle = account.pickle(b"pickle key").unwrap();

        let mut restored = Account::new(OlmConfig::default());
        restored.unpickle(b"pickle key", &pickle).unwrap();

        assert_eq!(restored.identity_keys(), account.identity_keys());
        assert_eq!(restored.one_time_keys(), account.one_time_keys());
        assert_eq!(
            restored.unpublished_fallback_key(),
            account.unpublished_fallback_key()
        );

        let mut wrong = Account::new(OlmConfig::default());
        assert_eq!(
            wrong.unpickle(b"other key", &pickle),
            Err(Error::BadPickleKey)
        );
        assert_eq!(wrong.identity_keys(), Err(Error::AccountNotCreated));
    }
}
