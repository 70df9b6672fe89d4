//! Kerl, the Keccak-384-based sponge over 243-trit blocks, used for
//! address, signature and bundle hashing.
//!
//! The boundary between the trit and bit domains is lossy: a 243-trit
//! block drops its last trit so that the remaining 242 trits fit a
//! signed 384-bit integer, carried as 48 big-endian bytes. The reverse
//! conversion of a digest likewise yields 242 trits plus a zero. Both
//! directions must be preserved bit-for-bit; the address and checksum
//! test vectors pin them down.

use sha3::{Digest, Keccak384};

use crate::errors::{Error, Result};
use crate::trinary::{Trit, Trits, HASH_TRITS};

/// Keccak-384 digest width in bytes.
const DIGEST_BYTES: usize = 48;

/// 384-bit integer as little-endian u32 limbs.
const LIMBS: usize = DIGEST_BYTES / 4;

#[derive(Clone, Default)]
pub struct Kerl {
    keccak: Keccak384,
}

impl Kerl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb trits. The length must be a positive multiple of 243.
    pub fn absorb<T: AsRef<[Trit]>>(&mut self, trits: T) -> Result<()> {
        let trits = trits.as_ref();
        if trits.is_empty() || trits.len() % HASH_TRITS != 0 {
            return Err(Error::InvalidBlockSize(trits.len()));
        }
        for block in trits.chunks(HASH_TRITS) {
            self.keccak.update(trits_to_bytes(block));
        }
        Ok(())
    }

    /// Squeeze `length` trits, a multiple of 243. Between blocks the
    /// sponge is re-seeded with the bitwise complement of the digest.
    pub fn squeeze(&mut self, length: usize) -> Result<Trits> {
        if length == 0 || length % HASH_TRITS != 0 {
            return Err(Error::InvalidTritCount(length));
        }
        let mut out = vec![0; length];
        for chunk in out.chunks_mut(HASH_TRITS) {
            let digest = self.keccak.finalize_reset();
            bytes_to_trits(digest.as_slice(), chunk);
            let mut flipped = [0u8; DIGEST_BYTES];
            for (f, d) in flipped.iter_mut().zip(digest.as_slice()) {
                *f = !d;
            }
            self.keccak.update(flipped);
        }
        Ok(Trits::from_raw(out))
    }

    /// Recreate the Keccak state.
    pub fn reset(&mut self) {
        self.keccak = Keccak384::new();
    }
}

/// Absorb one buffer and squeeze a single 243-trit hash.
pub fn hash<T: AsRef<[Trit]>>(trits: T) -> Result<Trits> {
    let mut kerl = Kerl::new();
    kerl.absorb(trits)?;
    kerl.squeeze(HASH_TRITS)
}

/// Convert a 243-trit block into the 48-byte Keccak payload.
///
/// The final trit is discarded; the remaining 242 are read as a signed
/// balanced-ternary integer and written as a big-endian two's-complement
/// 384-bit value.
fn trits_to_bytes(block: &[Trit]) -> [u8; DIGEST_BYTES] {
    debug_assert_eq!(block.len(), HASH_TRITS);
    // acc = 3*acc + trit, most significant trit first, wrapping mod
    // 2^384 so that negative values land on their two's complement.
    let mut limbs = [0u32; LIMBS];
    for &t in block[..HASH_TRITS - 1].iter().rev() {
        mul3(&mut limbs);
        match t {
            1 => add_one(&mut limbs),
            -1 => sub_one(&mut limbs),
            _ => {}
        }
    }
    let mut bytes = [0u8; DIGEST_BYTES];
    for (chunk, limb) in bytes.chunks_mut(4).zip(limbs.iter().rev()) {
        chunk.copy_from_slice(&limb.to_be_bytes());
    }
    bytes
}

/// Convert a 48-byte digest into 243 trits (the last always zero).
///
/// The bytes are read as a signed big-endian 384-bit integer; a negative
/// value is converted by magnitude and the resulting trits negated.
fn bytes_to_trits(bytes: &[u8], out: &mut [Trit]) {
    debug_assert_eq!(bytes.len(), DIGEST_BYTES);
    debug_assert_eq!(out.len(), HASH_TRITS);
    let mut limbs = [0u32; LIMBS];
    for i in 0..LIMBS {
        let o = i * 4;
        limbs[LIMBS - 1 - i] =
            u32::from_be_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);
    }
    let negative = bytes[0] & 0x80 != 0;
    if negative {
        negate(&mut limbs);
    }
    for t in out[..HASH_TRITS - 1].iter_mut() {
        let rem = divmod3(&mut limbs);
        *t = if rem == 2 {
            add_one(&mut limbs);
            -1
        } else {
            rem as Trit
        };
    }
    if negative {
        for t in out[..HASH_TRITS - 1].iter_mut() {
            *t = -*t;
        }
    }
    out[HASH_TRITS - 1] = 0;
}

fn mul3(limbs: &mut [u32; LIMBS]) {
    let mut carry = 0u64;
    for limb in limbs.iter_mut() {
        let v = *limb as u64 * 3 + carry;
        *limb = v as u32;
        carry = v >> 32;
    }
}

fn add_one(limbs: &mut [u32; LIMBS]) {
    for limb in limbs.iter_mut() {
        let (v, overflow) = limb.overflowing_add(1);
        *limb = v;
        if !overflow {
            return;
        }
    }
}

fn sub_one(limbs: &mut [u32; LIMBS]) {
    for limb in limbs.iter_mut() {
        let (v, borrow) = limb.overflowing_sub(1);
        *limb = v;
        if !borrow {
            return;
        }
    }
}

fn negate(limbs: &mut [u32; LIMBS]) {
    for limb in limbs.iter_mut() {
        *limb = !*limb;
    }
    add_one(limbs);
}

/// Divide by 3 in place, returning the remainder (0..2).
fn divmod3(limbs: &mut [u32; LIMBS]) -> u32 {
    let mut rem = 0u64;
    for limb in limbs.iter_mut().rev() {
        let v = (rem << 32) | *limb as u64;
        *limb = (v / 3) as u32;
        rem = v % 3;
    }
    rem as u32
}
