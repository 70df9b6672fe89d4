//! Bit-coded-trit Curl: every trit position holds two lane bitmaps,
//! so one transformation advances 64 or 128 nonce candidates at once.
//!
//! Encoding per lane bit pair `(lo, hi)`: `(1,1)` is 0, `(0,1)` is +1,
//! `(1,0)` is -1.

use core::ops::{BitAnd, BitOr, BitXor, Not};

use crate::curl::STATE_TRITS;
use crate::trinary::{Trit, HASH_TRITS};

/// A machine word holding one bitmap bit per lane.
pub(crate) trait BcWord:
    Copy
    + PartialEq
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
{
    const LANES: usize;
    fn zeros() -> Self;
    fn ones() -> Self;
    fn lane_bit(self, lane: usize) -> bool;
    fn with_bit(self, lane: usize) -> Self;
    fn first_lane(self) -> usize;
}

impl BcWord for u64 {
    const LANES: usize = 64;

    fn zeros() -> Self {
        0
    }

    fn ones() -> Self {
        u64::MAX
    }

    fn lane_bit(self, lane: usize) -> bool {
        (self >> lane) & 1 != 0
    }

    fn with_bit(self, lane: usize) -> Self {
        self | (1 << lane)
    }

    fn first_lane(self) -> usize {
        self.trailing_zeros() as usize
    }
}

impl BcWord for u128 {
    const LANES: usize = 128;

    fn zeros() -> Self {
        0
    }

    fn ones() -> Self {
        u128::MAX
    }

    fn lane_bit(self, lane: usize) -> bool {
        (self >> lane) & 1 != 0
    }

    fn with_bit(self, lane: usize) -> Self {
        self | (1 << lane)
    }

    fn first_lane(self) -> usize {
        self.trailing_zeros() as usize
    }
}

/// The bit-sliced Curl state: one `(lo, hi)` bitmap pair per trit.
#[derive(Clone)]
pub(crate) struct BctState<W: BcWord> {
    pub lo: [W; STATE_TRITS],
    pub hi: [W; STATE_TRITS],
}

impl<W: BcWord> BctState<W> {
    /// Broadcast a scalar state: every lane starts identical.
    pub fn broadcast(state: &[Trit; STATE_TRITS]) -> Self {
        let mut lo = [W::ones(); STATE_TRITS];
        let mut hi = [W::ones(); STATE_TRITS];
        for (i, &t) in state.iter().enumerate() {
            match t {
                1 => lo[i] = W::zeros(),
                -1 => hi[i] = W::zeros(),
                _ => {}
            }
        }
        BctState { lo, hi }
    }

    /// Write one trit position from a per-lane function.
    pub fn set_lanes(&mut self, position: usize, f: impl Fn(usize) -> Trit) {
        let mut lo = W::zeros();
        let mut hi = W::zeros();
        for lane in 0..W::LANES {
            match f(lane) {
                0 => {
                    lo = lo.with_bit(lane);
                    hi = hi.with_bit(lane);
                }
                1 => hi = hi.with_bit(lane),
                _ => lo = lo.with_bit(lane),
            }
        }
        self.lo[position] = lo;
        self.hi[position] = hi;
    }

    /// Decode the trit of one lane at one position.
    pub fn trit(&self, position: usize, lane: usize) -> Trit {
        match (self.lo[position].lane_bit(lane), self.hi[position].lane_bit(lane)) {
            (true, true) => 0,
            (false, _) => 1,
            (true, false) => -1,
        }
    }

    /// The 81 rounds of Curl-P-81 across all lanes at once.
    pub fn transform(&mut self) {
        let mut lo_scratch = [W::zeros(); STATE_TRITS];
        let mut hi_scratch = [W::zeros(); STATE_TRITS];
        for _ in 0..81 {
            lo_scratch.copy_from_slice(&self.lo);
            hi_scratch.copy_from_slice(&self.hi);
            let mut p = 0;
            for i in 0..STATE_TRITS {
                let q = if p < 365 { p + 364 } else { p - 365 };
                let alpha = lo_scratch[p];
                let beta = hi_scratch[p];
                let gamma = hi_scratch[q];
                let delta = (alpha | !gamma) & (lo_scratch[q] ^ beta);
                self.lo[i] = !delta;
                self.hi[i] = (alpha ^ gamma) | delta;
                p = q;
            }
        }
    }

    /// Increment the balanced-ternary counter spanning `range`, whose
    /// positions hold the same trit in every lane. Returns true when
    /// the counter overflows the range.
    pub fn increment(&mut self, range: core::ops::Range<usize>) -> bool {
        for i in range {
            if self.lo[i] == W::zeros() {
                // +1 becomes -1, carry on
                self.lo[i] = W::ones();
                self.hi[i] = W::zeros();
            } else if self.hi[i] == W::zeros() {
                // -1 becomes 0
                self.hi[i] = W::ones();
                return false;
            } else {
                // 0 becomes +1
                self.lo[i] = W::zeros();
                return false;
            }
        }
        true
    }

    /// Which lane, if any, ends the hash with at least `mwm` zero
    /// trits. The hash occupies the first 243 state positions.
    pub fn probe(&self, mwm: usize) -> Option<usize> {
        let mut hits = W::ones();
        for i in HASH_TRITS - mwm..HASH_TRITS {
            hits = hits & self.lo[i] & self.hi[i];
            if hits == W::zeros() {
                return None;
            }
        }
        Some(hits.first_lane())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curl::Curl;
    use crate::trinary::Trits;

    fn pseudo_random_state() -> [Trit; STATE_TRITS] {
        // deterministic trit soup, squeezed out of Curl itself
        let mut curl = Curl::new();
        curl.absorb(Trits::from_raw(vec![1, -1, 0, 1, 0, -1]));
        let mut state = [0 as Trit; STATE_TRITS];
        state.copy_from_slice(curl.squeeze(STATE_TRITS).as_slice());
        state
    }

    #[test]
    fn broadcast_round_trips_all_lanes() {
        let state = pseudo_random_state();
        let bct: BctState<u64> = BctState::broadcast(&state);
        for lane in [0, 17, 63] {
            for (i, &t) in state.iter().enumerate() {
                assert_eq!(bct.trit(i, lane), t);
            }
        }
    }

    #[test]
    fn transform_matches_scalar_curl() {
        let state = pseudo_random_state();
        let mut curl = Curl::new();
        curl.absorb(Trits::from_raw(state[..HASH_TRITS].to_vec()));

        // drive the bit-sliced state through the same absorb: block
        // into the first third of a zero state, then transform
        let mut seeded = [0 as Trit; STATE_TRITS];
        seeded[..HASH_TRITS].copy_from_slice(&state[..HASH_TRITS]);
        let mut bct: BctState<u128> = BctState::broadcast(&seeded);
        bct.transform();

        let reference = curl.squeeze(HASH_TRITS);
        for (i, &t) in reference.as_slice().iter().enumerate() {
            assert_eq!(bct.trit(i, 0), t);
            assert_eq!(bct.trit(i, 101), t);
        }
    }

    #[test]
    fn increment_carries_like_balanced_ternary() {
        let zero = [0 as Trit; STATE_TRITS];
        let mut bct: BctState<u64> = BctState::broadcast(&zero);
        let value = |bct: &BctState<u64>| {
            Trits::from_raw((0..4).map(|i| bct.trit(i, 9)).collect()).to_int()
        };
        for expected in 1..=40 {
            assert!(!bct.increment(0..4));
            assert_eq!(value(&bct), expected);
        }
        // all-ones counter overflows the range
        assert!(bct.increment(0..4));
    }

    #[test]
    fn set_lanes_distinguishes_lanes() {
        let zero = [0 as Trit; STATE_TRITS];
        let mut bct: BctState<u64> = BctState::broadcast(&zero);
        bct.set_lanes(5, |lane| if lane == 3 { 1 } else { -1 });
        assert_eq!(bct.trit(5, 3), 1);
        assert_eq!(bct.trit(5, 4), -1);
    }
}
