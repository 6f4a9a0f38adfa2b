use crate::Error;
use crate::cipher::MessageCipher;
use crate::proto::MegolmRatchetPickle;
use crate::types::fill_random;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const RATCHET_PART_SIZE: usize = 32;
pub(crate) const RATCHET_PARTS: usize = 4;
pub(crate) const RATCHET_SIZE: usize = RATCHET_PART_SIZE * RATCHET_PARTS;

const HASH_KEY_SEEDS: [u8; RATCHET_PARTS] = [0x00, 0x01, 0x02, 0x03];
const MESSAGE_KEYS_INFO: &[u8] = b"Mecholm-Megolm-Keys";

/// The Megolm ratchet: four 256-bit parts `R0..R3` and a 32-bit counter.
///
/// `R3` is rehashed on every step, `R2` every 2^8 steps, `R1` every 2^16 and
/// `R0` every 2^24. Lower parts seed the higher ones, so any position can be
/// reached from an earlier one with at most 1020 hashes, but never from a
/// later one.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct MegolmRatchet {
    data: Box<[[u8; RATCHET_PART_SIZE]; RATCHET_PARTS]>,
    counter: u32,
}

impl MegolmRatchet {
    /// A ratchet with random parts, positioned at index 0.
    pub(crate) fn new() -> Result<Self, Error> {
        let mut data = Box::new([[0u8; RATCHET_PART_SIZE]; RATCHET_PARTS]);
        for part in data.iter_mut() {
            fill_random(part)?;
        }

        Ok(Self { data, counter: 0 })
    }

    pub(crate) fn from_bytes(bytes: &[u8], counter: u32) -> Result<Self, Error> {
        if bytes.len() != RATCHET_SIZE {
            return Err(Error::Serde(format!(
                "invalid megolm ratchet length {}",
                bytes.len()
            )));
        }

        let mut data = Box::new([[0u8; RATCHET_PART_SIZE]; RATCHET_PARTS]);
        for (part, chunk) in data.iter_mut().zip(bytes.chunks_exact(RATCHET_PART_SIZE)) {
            part.copy_from_slice(chunk);
        }

        Ok(Self { data, counter })
    }

    pub(crate) fn to_bytes(&self) -> zeroize::Zeroizing<Vec<u8>> {
        zeroize::Zeroizing::new(self.data.concat())
    }

    pub(crate) fn index(&self) -> u32 {
        self.counter
    }

    /// Overwrites part `to` with `HMAC(R_from, seed_to)`.
    fn rehash_part(&mut self, from: usize, to: usize) -> Result<(), Error> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.data[from])
            .map_err(|_| Error::Crypto("HMAC initialization failed".to_string()))?;
        mac.update(&[HASH_KEY_SEEDS[to]]);
        self.data[to].copy_from_slice(&mac.finalize().into_bytes());

        Ok(())
    }

    /// Moves the ratchet forward by one step.
    pub(crate) fn advance(&mut self) -> Result<(), Error> {
        let mut mask: u32 = 0x00ff_ffff;
        let mut h = 0;

        self.counter = self.counter.wrapping_add(1);

        // The lowest part whose counter bits all rolled over gets rehashed,
        // along with every part above it.
        while h < RATCHET_PARTS {
            if self.counter & mask == 0 {
                break;
            }
            h += 1;
            mask >>= 8;
        }

        for i in (h..RATCHET_PARTS).rev() {
            self.rehash_part(h, i)?;
        }

        Ok(())
    }

    /// Moves the ratchet forward to `target`, wrapping around `u32::MAX` if
    /// `target` is below the current index.
    pub(crate) fn advance_to(&mut self, target: u32) -> Result<(), Error> {
        for j in 0..RATCHET_PARTS {
            let shift = (RATCHET_PARTS - j - 1) * 8;
            let mask = u32::MAX << shift;

            let mut steps = (target >> shift).wrapping_sub(self.counter >> shift) & 0xff;
            if steps == 0 {
                // Only R0 can hit this: the target wrapped around, so R0 goes
                // a full lap.
                if target < self.counter {
                    steps = 0x100;
                } else {
                    continue;
                }
            }

            // Every step but the last only touches R(j).
            while steps > 1 {
                self.rehash_part(j, j)?;
                steps -= 1;
            }

            // The last step reseeds R(j+1)..R3 as well.
            for k in (j..RATCHET_PARTS).rev() {
                self.rehash_part(j, k)?;
            }

            self.counter = target & mask;
        }

        Ok(())
    }

    /// Message cipher keyed by the current ratchet value.
    pub(crate) fn message_cipher(&self) -> Result<MessageCipher, Error> {
        MessageCipher::derive(&self.to_bytes(), MESSAGE_KEYS_INFO)
    }

    pub(crate) fn to_pickle(&self) -> MegolmRatchetPickle {
        MegolmRatchetPickle {
            data: self.to_bytes().to_vec(),
            counter: self.counter,
        }
    }

    pub(crate) fn from_pickle(pickle: &MegolmRatchetPickle) -> Result<Self, Error> {
        Self::from_bytes(&pickle.data, pickle.counter)
    }
}
