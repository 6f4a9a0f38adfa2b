use crate::Error;
use crate::pickle::key_from_bytes;
use crate::proto::ChainPickle;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Symmetric-key ratchet chain. Each step yields one message key.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Chain {
    pub(crate) chain_key: Box<[u8; 32]>,
    pub(crate) index: u32,
}

impl Chain {
    pub(crate) fn new(chain_key: Box<[u8; 32]>) -> Self {
        Self {
            chain_key,
            index: 0,
        }
    }

    /// A chain that has never been keyed by a DH ratchet step.
    pub(crate) fn is_empty(&self) -> bool {
        self.chain_key.as_ref() == &[0u8; 32]
    }

    /// Advances the chain and returns a message key
    pub(crate) fn next(&mut self) -> Result<Box<[u8; 32]>, Error> {
        let chain_result = Self::mac(&self.chain_key, 0x01)?;
        let message_result = Self::mac(&self.chain_key, 0x02)?;

        self.chain_key.copy_from_slice(&chain_result);
        self.index = self.index.wrapping_add(1);

        let mut message_key = Box::new([0u8; 32]);
        message_key.copy_from_slice(&message_result);
        Ok(message_key)
    }

    fn mac(key: &[u8; 32], constant: u8) -> Result<[u8; 32], Error> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|_| Error::Crypto("HMAC initialization failed".to_string()))?;
        mac.update(&[constant]);

        let mut output = [0u8; 32];
        output.copy_from_slice(&mac.finalize().into_bytes());
        Ok(output)
    }

    pub(crate) fn to_pickle(&self) -> ChainPickle {
        ChainPickle {
            chain_key: self.chain_key.to_vec(),
            index: self.index,
        }
    }

    pub(crate) fn from_pickle(pickle: &ChainPickle) -> Result<Self, Error> {
        Ok(Self {
            chain_key: key_from_bytes(&pickle.chain_key, "chain key")?,
            index: pickle.index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_deterministic() {
        let mut first = Chain::new(Box::new([7u8; 32]));
        let mut second = Chain::new(Box::new([7u8; 32]));

        for _ in 0..3 {
            assert_eq!(first.next().unwrap(), second.next().unwrap());
        }
        assert_eq!(first.index, 3);
    }

    #[test]
    fn test_message_keys_differ_from_chain_keys() {
        let mut chain = Chain::new(Box::new([7u8; 32]));
        let message_key = chain.next().unwrap();

        assert_ne!(message_key, chain.chain_key);
        assert_ne!(chain.next().unwrap(), message_key);
    }

    #[test]
    fn test_default_chain_is_empty() {
        assert!(Chain::default().is_empty());
        assert!(!Chain::new(Box::new([1u8; 32])).is_empty());
    }
}
