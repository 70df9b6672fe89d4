//! Curl-P-81, the 729-trit sponge used for transaction hashing and
//! proof of work. Address, signature and bundle hashing use [`Kerl`]
//! instead; the two are deliberately separate types.
//!
//! [`Kerl`]: crate::kerl::Kerl

use crate::trinary::{Trit, Trits, Trytes, HASH_TRITS, HASH_TRYTES};

/// Size of the sponge state in trits.
pub const STATE_TRITS: usize = 3 * HASH_TRITS;

/// Number of transformation rounds.
const ROUNDS: usize = 81;

/// S-box indexed by `a + 3*b + 4` for trit pair `(a, b)`.
const SBOX: [Trit; 9] = [1, 0, -1, 1, -1, 0, -1, 1, 0];

/// The all-`9` hash, used as a placeholder for unset hash fields.
pub fn empty_hash() -> Trytes {
    Trytes::nines(HASH_TRYTES)
}

#[derive(Clone)]
pub struct Curl {
    state: [Trit; STATE_TRITS],
}

impl Default for Curl {
    fn default() -> Self {
        Self::new()
    }
}

impl Curl {
    pub fn new() -> Self {
        Curl {
            state: [0; STATE_TRITS],
        }
    }

    /// Absorb trits in 243-trit blocks: each block replaces the first
    /// third of the state, followed by a transformation. A final
    /// partial block replaces only its own length.
    pub fn absorb<T: AsRef<[Trit]>>(&mut self, trits: T) {
        for block in trits.as_ref().chunks(HASH_TRITS) {
            self.state[..block.len()].copy_from_slice(block);
            self.transform();
        }
    }

    /// Squeeze `length` trits, 243 per transformation.
    pub fn squeeze(&mut self, length: usize) -> Trits {
        let mut out = vec![0; length];
        for chunk in out.chunks_mut(HASH_TRITS) {
            chunk.copy_from_slice(&self.state[..chunk.len()]);
            self.transform();
        }
        Trits::from_raw(out)
    }

    pub fn reset(&mut self) {
        self.state = [0; STATE_TRITS];
    }

    /// Current state, for the bit-sliced proof-of-work engine.
    pub(crate) fn state(&self) -> &[Trit; STATE_TRITS] {
        &self.state
    }

    fn transform(&mut self) {
        let mut scratch = [0 as Trit; STATE_TRITS];
        for _ in 0..ROUNDS {
            scratch.copy_from_slice(&self.state);
            let mut p = 0;
            for s in self.state.iter_mut() {
                let q = if p < 365 { p + 364 } else { p - 365 };
                *s = SBOX[(scratch[p] + 3 * scratch[q] + 4) as usize];
                p = q;
            }
        }
    }
}

/// Curl-P-81 hash of a tryte sequence: absorb everything, squeeze one
/// 243-trit block.
pub fn hash(trytes: &Trytes) -> Trytes {
    let mut curl = Curl::new();
    curl.absorb(trytes.trits());
    curl.squeeze(HASH_TRITS)
        .trytes()
        .expect("hash length is a multiple of 3")
}
