//! Transfers: the caller-facing description of outputs, and the
//! attachment step that chains proof of work through a bundle.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::Result;
use crate::pow::{PowConfig, StopFlag};
use crate::signing::{self, Address, SecurityLevel, SIGNATURE_FRAGMENT_TRYTES};
use crate::transaction::Transaction;
use crate::trinary::{Trits, Trytes};

/// Largest 27-trit value, used as the attachment-timestamp upper bound.
pub const MAX_TIMESTAMP: i64 = (3i64.pow(27) - 1) / 2;

/// One output of a transfer: an address, a value and an optional
/// message and tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub address: Address,
    pub value: i64,
    pub message: Trytes,
    pub tag: Trytes,
}

/// An address the caller can sign for: the seed it derives from, its
/// index and security level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressInfo {
    pub seed: Trytes,
    pub index: u32,
    pub security: SecurityLevel,
}

impl AddressInfo {
    pub fn address(&self) -> Result<Address> {
        signing::new_address(&self.seed, self.index, self.security)
    }

    pub fn key(&self) -> Result<Trits> {
        signing::key(&self.seed, self.index, self.security)
    }
}

/// Current unix time in seconds, for bundle entry timestamps.
pub fn unix_timestamp() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(_) => 0,
    }
}

fn unix_timestamp_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(_) => 0,
    }
}

/// Lay out the output transactions for a list of transfers.
///
/// A message longer than one signature fragment (2187 trytes) spreads
/// across `1 + len/2187` transactions at the same address. Returns the
/// bundle, the message fragments to place at finalization, and the
/// total value of all outputs. Checksummed addresses are accepted.
pub fn create_bundle(
    transfers: &[Transfer],
    timestamp: i64,
) -> Result<(super::Bundle, Vec<Trytes>, i64)> {
    let mut bundle = super::Bundle::new();
    let mut fragments = Vec::new();
    let mut total = 0i64;

    for transfer in transfers {
        let num_signatures = 1 + transfer.message.len() / SIGNATURE_FRAGMENT_TRYTES;
        for k in 0..num_signatures {
            let start = k * SIGNATURE_FRAGMENT_TRYTES;
            let end = usize::min(start + SIGNATURE_FRAGMENT_TRYTES, transfer.message.len());
            fragments.push(transfer.message.slice(start, end));
        }
        bundle.add_entry(
            num_signatures,
            transfer.address.clone(),
            transfer.value,
            timestamp,
            &transfer.tag,
        );
        total += transfer.value;
    }
    Ok((bundle, fragments, total))
}

/// Attach a bundle's transactions to the given tips: walk back-to-front,
/// chain trunk and branch references, stamp attachment timestamps and
/// search a nonce for each transaction.
pub fn attach(
    trunk: &Trytes,
    branch: &Trytes,
    transactions: &mut [Transaction],
    mwm: usize,
    pow: &PowConfig,
) -> Result<()> {
    let mut prev: Option<Trytes> = None;
    for i in (0..transactions.len()).rev() {
        {
            let tx = &mut transactions[i];
            match prev.take() {
                // the tail links to both tips
                None => {
                    tx.trunk_transaction = trunk.clone();
                    tx.branch_transaction = branch.clone();
                }
                Some(prev_hash) => {
                    tx.trunk_transaction = prev_hash;
                    tx.branch_transaction = trunk.clone();
                }
            }
            tx.attachment_timestamp = unix_timestamp_ms();
            tx.attachment_timestamp_lower_bound = 0;
            tx.attachment_timestamp_upper_bound = MAX_TIMESTAMP;
        }
        let trytes = transactions[i].to_trytes()?;
        transactions[i].nonce = pow.run(&trytes, mwm, &StopFlag::new())?;
        prev = Some(transactions[i].hash()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        "RGVOWCDJAGSO9TNLBBPUVYE9KHBOAZNVFRVKVYYCHRKQRKRNKGGWBF9WCRJVROKLVKWZUMBABVJGAALWU"
            .parse()
            .unwrap()
    }

    #[test]
    fn short_message_fits_one_transaction() {
        let transfers = [Transfer {
            address: address(),
            value: 3,
            message: "CAFE".parse().unwrap(),
            tag: Trytes::default(),
        }];
        let (bundle, fragments, total) = create_bundle(&transfers, 0).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_str(), "CAFE");
        assert_eq!(total, 3);
    }

    #[test]
    fn long_message_spreads_over_transactions() {
        let message: Trytes = "A".repeat(3000).parse().unwrap();
        let transfers = [Transfer {
            address: address(),
            value: 0,
            message,
            tag: Trytes::default(),
        }];
        let (bundle, fragments, _) = create_bundle(&transfers, 0).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].len(), SIGNATURE_FRAGMENT_TRYTES);
        assert_eq!(fragments[1].len(), 3000 - SIGNATURE_FRAGMENT_TRYTES);
    }

    #[test]
    fn totals_sum_all_outputs() {
        let transfer = |value| Transfer {
            address: address(),
            value,
            message: Trytes::default(),
            tag: Trytes::default(),
        };
        let transfers = [transfer(10), transfer(32)];
        let (bundle, _, total) = create_bundle(&transfers, 0).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(total, 42);
    }

    #[test]
    fn max_timestamp_is_widest_27_trit_value() {
        assert_eq!(MAX_TIMESTAMP, 3_812_798_742_493);
        let trits = Trits::from_int(MAX_TIMESTAMP, 27).unwrap();
        assert!(trits.as_slice().iter().all(|&t| t == 1));
        assert!(Trits::from_int(MAX_TIMESTAMP + 1, 27).is_err());
    }
}
