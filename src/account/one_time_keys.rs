use crate::Error;
use crate::proto::KeyPickle;
use crate::types::{KeyId, X25519PublicKey, X25519Secret, generate_random_seed};
use std::collections::BTreeMap;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A one-time key held by an account, consumed by a single inbound session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct OneTimeKey {
    pub(crate) key: X25519Secret,
    pub(crate) published: bool,
}

impl OneTimeKey {
    pub(crate) fn public_key(&self) -> X25519PublicKey {
        self.key.public_key()
    }
}

/// Pool of one-time keys with monotonically increasing ids.
///
/// Ids are shared with fallback keys, so the counter lives here and fallback
/// key generation borrows it through [`OneTimeKeys::allocate_id`].
pub(crate) struct OneTimeKeys {
    pub(crate) keys: BTreeMap<KeyId, OneTimeKey>,
    pub(crate) next_id: u32,
    pub(crate) max_keys: usize,
}

impl OneTimeKeys {
    pub(crate) fn new(max_keys: usize) -> Self {
        Self {
            keys: BTreeMap::new(),
            next_id: 1,
            max_keys,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> KeyId {
        let id = KeyId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Generates `count` fresh keys. Once the pool is full the oldest keys are
    /// evicted, published or not.
    pub(crate) fn generate(&mut self, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            let id = self.allocate_id();
            let key = OneTimeKey {
                key: X25519Secret::from(generate_random_seed()?),
                published: false,
            };
            self.keys.insert(id, key);

            while self.keys.len() > self.max_keys {
                self.keys.pop_first();
            }
        }

        Ok(())
    }

    pub(crate) fn unpublished(&self) -> BTreeMap<KeyId, X25519PublicKey> {
        self.keys
            .iter()
            .filter(|(_, key)| !key.published)
            .map(|(id, key)| (*id, key.public_key()))
            .collect()
    }

    pub(crate) fn mark_as_published(&mut self) {
        self.keys
            .values_mut()
            .for_each(|key| key.published = true);
    }

    pub(crate) fn find(&self, public_key: &X25519PublicKey) -> Option<(KeyId, &OneTimeKey)> {
        self.keys
            .iter()
            .find(|(_, key)| key.public_key() == *public_key)
            .map(|(id, key)| (*id, key))
    }

    pub(crate) fn remove(&mut self, public_key: &X25519PublicKey) -> Option<KeyId> {
        let (id, _) = self.find(public_key)?;
        self.keys.remove(&id);
        Some(id)
    }

    pub(crate) fn to_pickle(&self) -> Vec<KeyPickle> {
        self.keys
            .iter()
            .map(|(id, key)| KeyPickle {
                id: id.value(),
                key: key.key.as_bytes().to_vec(),
                published: key.published,
            })
            .collect()
    }

    pub(crate) fn from_pickle(
        keys: &[KeyPickle],
        next_id: u32,
        max_keys: usize,
    ) -> Result<Self, Error> {
        let mut store = Self::new(max_keys);
        store.next_id = next_id;
        for key in keys {
            store.keys.insert(
                KeyId(key.id),
                OneTimeKey {
                    key: X25519Secret::from_slice(&key.key)?,
                    published: key.published,
                },
            );
        }

        Ok(store)
    }
}

impl Zeroize for OneTimeKeys {
    fn zeroize(&mut self) {
        self.keys.values_mut().for_each(Zeroize::zeroize);
        self.keys.clear();
        self.next_id = 0;
    }
}

impl Drop for OneTimeKeys {
    fn drop(&mut self) {
        self.zeroize();
    }
}
