use crate::Error;
use crate::proto::KeyPickle;
use crate::types::{KeyId, X25519PublicKey, X25519Secret, generate_random_seed};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A reusable pre-key that answers session requests once one-time keys run out.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct FallbackKey {
    #[zeroize(skip)]
    pub(crate) id: KeyId,
    pub(crate) key: X25519Secret,
    pub(crate) published: bool,
}

impl FallbackKey {
    pub(crate) fn public_key(&self) -> X25519PublicKey {
        self.key.public_key()
    }

    fn to_pickle(&self) -> KeyPickle {
        KeyPickle {
            id: self.id.value(),
            key: self.key.as_bytes().to_vec(),
            published: self.published,
        }
    }

    fn from_pickle(pickle: &KeyPickle) -> Result<Self, Error> {
        Ok(Self {
            id: KeyId(pickle.id),
            key: X25519Secret::from_slice(&pickle.key)?,
            published: pickle.published,
        })
    }
}

/// The current fallback key and, once it has been published and rotated, its
/// predecessor. Peers may still be holding the previous key, so it keeps
/// accepting sessions until explicitly forgotten.
#[derive(Default)]
pub(crate) struct FallbackKeys {
    pub(crate) current: Option<FallbackKey>,
    pub(crate) previous: Option<FallbackKey>,
}

impl FallbackKeys {
    /// Generates a new fallback key. An unpublished current key was never seen
    /// by peers and is simply replaced; a published one becomes the previous key.
    pub(crate) fn generate(&mut self, id: KeyId) -> Result<(), Error> {
        let key = FallbackKey {
            id,
            key: X25519Secret::from(generate_random_seed()?),
            published: false,
        };

        match self.current.replace(key) {
            Some(old) if old.published => self.previous = Some(old),
            _ => {}
        }

        Ok(())
    }

    pub(crate) fn unpublished(&self) -> Option<(KeyId, X25519PublicKey)> {
        self.current
            .as_ref()
            .filter(|key| !key.published)
            .map(|key| (key.id, key.public_key()))
    }

    pub(crate) fn mark_as_published(&mut self) {
        if let Some(key) = self.current.as_mut() {
            key.published = true;
        }
    }

    /// Drops the previous fallback key. Returns whether there was one.
    pub(crate) fn forget_previous(&mut self) -> bool {
        self.previous.take().is_some()
    }

    pub(crate) fn find(&self, public_key: &X25519PublicKey) -> Option<&FallbackKey> {
        self.current
            .iter()
            .chain(self.previous.iter())
            .find(|key| key.public_key() == *public_key)
    }

    pub(crate) fn to_pickle(&self) -> (Option<KeyPickle>, Option<KeyPickle>) {
        (
            self.current.as_ref().map(FallbackKey::to_pickle),
            self.previous.as_ref().map(FallbackKey::to_pickle),
        )
    }

    pub(crate) fn from_pickle(
        current: Option<&KeyPickle>,
        previous: Option<&KeyPickle>,
    ) -> Result<Self, Error> {
        Ok(Self {
            current: current.map(FallbackKey::from_pickle).transpose()?,
            previous: previous.map(FallbackKey::from_pickle).transpose()?,
        })
    }
}
