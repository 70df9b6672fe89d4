//! Parallel nonce search: find nonce trits such that the Curl-P-81
//! hash of the transaction ends in at least `mwm` zero trits.
//!
//! The engine is a bit-sliced Curl ([`bct`]) advancing 64 or 128 nonce
//! candidates per transformation, spread across worker threads that
//! explore disjoint regions of nonce space. The only shared state is a
//! stop flag and a compare-and-set claimed result.

mod bct;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread;

use log::debug;

use crate::curl::{Curl, STATE_TRITS};
use crate::errors::{Error, Result};
use crate::transaction::{NONCE_SIZE, TRANSACTION_TRITS, TRANSACTION_TRYTES};
use crate::trinary::{Trit, Trits, Trytes, HASH_TRITS};

use bct::{BcWord, BctState};

/// Start of the nonce region within the final 243-trit block.
const NONCE_STATE_OFFSET: usize = HASH_TRITS - NONCE_SIZE;

/// Start of the per-pass counter region; the trits below it (after the
/// lane rows) separate the workers.
const INNER_COUNTER_OFFSET: usize = NONCE_STATE_OFFSET + 27;

/// Cooperative cancellation for a running nonce search. Setting the
/// flag stops every worker within one transformation.
#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Interchangeable search implementations: lane width of the
/// bit-sliced state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowImpl {
    Lane64,
    Lane128,
}

impl PowImpl {
    /// The widest implementation the target runs well, decided once at
    /// first use.
    pub fn best() -> PowImpl {
        static BEST: OnceLock<PowImpl> = OnceLock::new();
        *BEST.get_or_init(|| {
            if cfg!(target_pointer_width = "64") {
                PowImpl::Lane128
            } else {
                PowImpl::Lane64
            }
        })
    }
}

/// Explicit proof-of-work configuration: worker count and lane width.
/// Nothing is read from process-wide state inside the search.
#[derive(Clone, Debug)]
pub struct PowConfig {
    pub workers: usize,
    pub implementation: PowImpl,
}

impl Default for PowConfig {
    fn default() -> Self {
        PowConfig {
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            implementation: PowImpl::best(),
        }
    }
}

impl PowConfig {
    /// Search a nonce for the 2673-tryte transaction so that its hash
    /// carries at least `mwm` trailing zero trits. Returns the 27-tryte
    /// nonce, or [`Error::Interrupted`] once `cancel` is set.
    pub fn run(&self, trytes: &Trytes, mwm: usize, cancel: &StopFlag) -> Result<Trytes> {
        if trytes.len() != TRANSACTION_TRYTES {
            return Err(Error::InvalidTransactionLength(trytes.len()));
        }
        if mwm == 0 || mwm > HASH_TRITS {
            return Err(Error::InvalidTritCount(mwm));
        }
        let base = mid_state(&trytes.trits());
        let workers = self.workers.max(1);
        debug!(
            "nonce search: mwm {mwm}, {workers} workers, {:?}",
            self.implementation
        );

        let claimed = AtomicBool::new(false);
        let (sender, receiver) = mpsc::channel::<Trits>();
        thread::scope(|scope| {
            for worker in 0..workers {
                let sender = sender.clone();
                let claimed = &claimed;
                let cancel = cancel.clone();
                let base = &base;
                let implementation = self.implementation;
                scope.spawn(move || {
                    let found = match implementation {
                        PowImpl::Lane64 => search_lanes::<u64>(base, mwm, worker, &cancel),
                        PowImpl::Lane128 => search_lanes::<u128>(base, mwm, worker, &cancel),
                    };
                    if let Some(nonce) = found {
                        let won = claimed
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_ok();
                        if won {
                            cancel.set();
                            let _ = sender.send(nonce);
                        }
                    }
                });
            }
            drop(sender);
        });

        match receiver.try_recv() {
            Ok(nonce) => {
                debug!("nonce found");
                nonce.trytes()
            }
            Err(_) => Err(Error::Interrupted),
        }
    }
}

/// One-shot search with a fresh stop flag.
pub fn search(trytes: &Trytes, mwm: usize, config: &PowConfig) -> Result<Trytes> {
    config.run(trytes, mwm, &StopFlag::new())
}

/// Absorb everything up to the final block, then lay the final block
/// over the first third of the state; the transformation the search
/// performs per candidate completes the absorb.
fn mid_state(tx_trits: &Trits) -> [Trit; STATE_TRITS] {
    debug_assert_eq!(tx_trits.len(), TRANSACTION_TRITS);
    let mut curl = Curl::new();
    curl.absorb(&tx_trits.as_slice()[..TRANSACTION_TRITS - HASH_TRITS]);
    let mut state = *curl.state();
    state[..HASH_TRITS].copy_from_slice(&tx_trits.as_slice()[TRANSACTION_TRITS - HASH_TRITS..]);
    state
}

/// Rows needed to give every lane a distinct balanced-ternary prefix.
fn seed_rows(lanes: usize) -> usize {
    let mut rows = 0;
    let mut combinations = 1;
    while combinations < lanes {
        combinations *= 3;
        rows += 1;
    }
    rows
}

/// Balanced-ternary digit `row` of a lane index.
fn lane_digit(lane: usize, row: usize) -> Trit {
    let mut value = lane;
    let mut digit = 0;
    for _ in 0..=row {
        digit = value % 3;
        value /= 3;
        if digit == 2 {
            value += 1;
        }
    }
    if digit == 2 {
        -1
    } else {
        digit as Trit
    }
}

fn search_lanes<W: BcWord>(
    base: &[Trit; STATE_TRITS],
    mwm: usize,
    worker: usize,
    stop: &StopFlag,
) -> Option<Trits> {
    let mut bct: BctState<W> = BctState::broadcast(base);

    // give every lane a distinct nonce prefix, and every worker a
    // distinct counter start, so the explored regions are disjoint
    let rows = seed_rows(W::LANES);
    for row in 0..rows {
        bct.set_lanes(NONCE_STATE_OFFSET + row, |lane| lane_digit(lane, row));
    }
    for _ in 0..worker {
        bct.increment(NONCE_STATE_OFFSET + rows..INNER_COUNTER_OFFSET);
    }

    loop {
        if stop.is_set() {
            return None;
        }
        bct.increment(INNER_COUNTER_OFFSET..HASH_TRITS);
        let mut candidate = bct.clone();
        candidate.transform();
        if let Some(lane) = candidate.probe(mwm) {
            let nonce: Vec<Trit> = (0..NONCE_SIZE)
                .map(|i| bct.trit(NONCE_STATE_OFFSET + i, lane))
                .collect();
            return Some(Trits::from_raw(nonce));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curl;
    use crate::transaction::DEFAULT_MIN_WEIGHT_MAGNITUDE;

    const TX: &str = include_str!("../testdata/pow_tx.trytes");

    fn attach_nonce(tx: &str, nonce: &Trytes) -> Trytes {
        format!("{}{}", &tx[..TRANSACTION_TRYTES - 27], nonce)
            .parse()
            .unwrap()
    }

    fn check(config: PowConfig, mwm: usize) {
        let tx: Trytes = TX.trim().parse().unwrap();
        let nonce = search(&tx, mwm, &config).unwrap();
        assert_eq!(nonce.len(), 27);
        let attached = attach_nonce(TX.trim(), &nonce);
        let hash = curl::hash(&attached);
        assert!(
            hash.trits().trailing_zeros() >= mwm,
            "hash {hash} has fewer than {mwm} trailing zeros"
        );
    }

    #[test]
    fn nonce_satisfies_mwm_lane64() {
        check(
            PowConfig {
                workers: 2,
                implementation: PowImpl::Lane64,
            },
            9,
        );
    }

    #[test]
    fn nonce_satisfies_mwm_lane128() {
        check(
            PowConfig {
                workers: 2,
                implementation: PowImpl::Lane128,
            },
            9,
        );
    }

    #[test]
    #[ignore = "minutes in debug builds; run in release"]
    fn nonce_satisfies_default_mwm() {
        let tx: Trytes = TX.trim().parse().unwrap();
        let nonce = search(&tx, DEFAULT_MIN_WEIGHT_MAGNITUDE, &PowConfig::default()).unwrap();
        let attached = attach_nonce(TX.trim(), &nonce);
        let hash = curl::hash(&attached);
        // at least 14 trailing zeros means the hash ends in 9999
        assert_eq!(&hash.as_str()[77..81], "9999");
    }

    #[test]
    fn cancelled_search_returns_interrupted() {
        let tx: Trytes = TX.trim().parse().unwrap();
        let stop = StopFlag::new();
        stop.set();
        let result = PowConfig::default().run(&tx, 9, &stop);
        assert_eq!(result.unwrap_err(), Error::Interrupted);
    }

    #[test]
    fn rejects_short_input() {
        let short: Trytes = "ABC".parse().unwrap();
        assert_eq!(
            search(&short, 9, &PowConfig::default()).unwrap_err(),
            Error::InvalidTransactionLength(3)
        );
    }

    #[test]
    fn lane_digits_are_distinct_prefixes() {
        for lanes in [64usize, 128] {
            let rows = seed_rows(lanes);
            let mut seen = std::collections::HashSet::new();
            for lane in 0..lanes {
                let prefix: Vec<Trit> = (0..rows).map(|row| lane_digit(lane, row)).collect();
                assert!(seen.insert(prefix), "lane {lane} collides");
            }
        }
    }
}
