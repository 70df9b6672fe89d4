//! Bundles: groups of transactions that transfer value together, share
//! a bundle hash and sum to zero.

mod transfer;

pub use transfer::{attach, create_bundle, unix_timestamp, AddressInfo, Transfer, MAX_TIMESTAMP};

use log::debug;

use crate::curl;
use crate::errors::{Error, Result};
use crate::kerl::Kerl;
use crate::signing::{self, Address};
use crate::transaction::{
    Transaction, CURRENT_INDEX_SIZE, LAST_INDEX_SIZE, OBSOLETE_TAG_SIZE,
    SIGNATURE_MESSAGE_FRAGMENT_SIZE, TIMESTAMP_SIZE, VALUE_SIZE,
};
use crate::trinary::{self, normalize, Trit, Trits, Trytes, HASH_TRITS, TRITS_PER_TRYTE};

/// Trits each transaction contributes to the bundle hash:
/// Address ‖ Value ‖ ObsoleteTag ‖ Timestamp ‖ CurrentIndex ‖ LastIndex.
const ESSENCE_TRITS: usize =
    HASH_TRITS + VALUE_SIZE + OBSOLETE_TAG_SIZE + TIMESTAMP_SIZE + CURRENT_INDEX_SIZE + LAST_INDEX_SIZE;

/// Offset of the obsolete tag within a transaction's essence.
const ESSENCE_TAG_OFFSET: usize = HASH_TRITS + VALUE_SIZE;

/// An ordered, non-empty group of transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bundle {
    transactions: Vec<Transaction>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transactions_mut(&mut self) -> &mut [Transaction] {
        &mut self.transactions
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Append `count` transactions at `address`; the first carries
    /// `value`, the rest are zero-value signature carriers.
    pub fn add_entry(
        &mut self,
        count: usize,
        address: Address,
        value: i64,
        timestamp: i64,
        tag: &Trytes,
    ) {
        let tag = tag.pad(OBSOLETE_TAG_SIZE / TRITS_PER_TRYTE);
        for i in 0..count {
            self.transactions.push(Transaction {
                signature_message_fragment: Trytes::nines(
                    SIGNATURE_MESSAGE_FRAGMENT_SIZE / TRITS_PER_TRYTE,
                ),
                address: address.clone(),
                value: if i == 0 { value } else { 0 },
                obsolete_tag: tag.clone(),
                timestamp,
                current_index: 0,
                last_index: 0,
                bundle: curl::empty_hash(),
                trunk_transaction: curl::empty_hash(),
                branch_transaction: curl::empty_hash(),
                tag: tag.clone(),
                attachment_timestamp: 0,
                attachment_timestamp_lower_bound: 0,
                attachment_timestamp_upper_bound: 0,
                nonce: Trytes::nines(27),
            });
        }
    }

    /// The essence of transaction `index` in a bundle of `len`.
    fn essence(tx: &Transaction, index: usize, len: usize) -> Result<Vec<Trit>> {
        let mut out = Vec::with_capacity(ESSENCE_TRITS);
        out.extend_from_slice(tx.address.trits().as_slice());
        out.extend_from_slice(Trits::from_int(tx.value, VALUE_SIZE)?.as_slice());
        out.extend_from_slice(tx.obsolete_tag.trits().as_slice());
        out.extend_from_slice(Trits::from_int(tx.timestamp, TIMESTAMP_SIZE)?.as_slice());
        out.extend_from_slice(Trits::from_int(index as i64, CURRENT_INDEX_SIZE)?.as_slice());
        out.extend_from_slice(Trits::from_int(len as i64 - 1, LAST_INDEX_SIZE)?.as_slice());
        Ok(out)
    }

    /// Kerl hash over the essence of every transaction, with the
    /// obsolete tags as currently stored.
    pub fn hash(&self) -> Result<Trytes> {
        let mut kerl = Kerl::new();
        for (i, tx) in self.transactions.iter().enumerate() {
            kerl.absorb(Self::essence(tx, i, self.transactions.len())?)?;
        }
        kerl.squeeze(HASH_TRITS)?.trytes()
    }

    /// Search for a bundle hash whose normalized form has no `+13`
    /// entry, incrementing the first transaction's obsolete tag until
    /// one is found, then finalize: indices, bundle hash and message
    /// fragments are written into every transaction.
    ///
    /// Deterministic in the bundle contents. Returns the bundle hash.
    pub fn finalize(&mut self, fragments: &[Trytes]) -> Result<Trytes> {
        if self.transactions.is_empty() {
            return Err(Error::NonFinalizedBundle);
        }
        let len = self.transactions.len();
        let mut buf = Vec::with_capacity(len * ESSENCE_TRITS);
        for (i, tx) in self.transactions.iter().enumerate() {
            buf.extend_from_slice(&Self::essence(tx, i, len)?);
        }

        let mut kerl = Kerl::new();
        let mut retries = 0usize;
        let hash = loop {
            kerl.absorb(&buf[..])?;
            let hash = kerl.squeeze(HASH_TRITS)?.trytes()?;
            let normalized = normalize(&hash)?;
            if normalized.iter().all(|&v| v != 13) {
                break hash;
            }
            // the obsolete tag is inside the hashed region, so bumping
            // it resamples the hash
            kerl.reset();
            trinary::increment(
                &mut buf[ESSENCE_TAG_OFFSET..ESSENCE_TAG_OFFSET + OBSOLETE_TAG_SIZE],
            );
            retries += 1;
        };
        if retries > 0 {
            debug!("bundle hash settled after {retries} obsolete-tag increments");
        }

        let tag = Trits::from_raw(
            buf[ESSENCE_TAG_OFFSET..ESSENCE_TAG_OFFSET + OBSOLETE_TAG_SIZE].to_vec(),
        )
        .trytes()?;
        self.transactions[0].obsolete_tag = tag;

        for (i, tx) in self.transactions.iter_mut().enumerate() {
            tx.current_index = i as i64;
            tx.last_index = len as i64 - 1;
            tx.bundle = hash.clone();
            if let Some(fragment) = fragments.get(i) {
                tx.signature_message_fragment =
                    fragment.pad(SIGNATURE_MESSAGE_FRAGMENT_SIZE / TRITS_PER_TRYTE);
            }
        }
        Ok(hash)
    }

    /// Sign every input transaction (value < 0) with the key derived
    /// from its matching [`AddressInfo`], placing continuation
    /// fragments into the following zero-value transactions at the
    /// same address.
    pub fn sign_inputs(&mut self, inputs: &[AddressInfo]) -> Result<()> {
        let hash = self.hash()?;
        let normalized = normalize(&hash)?;

        for i in 0..self.transactions.len() {
            if self.transactions[i].value >= 0 {
                continue;
            }
            let address = self.transactions[i].address.clone();
            let mut matched = None;
            for info in inputs {
                if info.address()? == address {
                    matched = Some(info);
                    break;
                }
            }
            let info = matched.ok_or(Error::InvalidSignature)?;
            let key = info.key()?;
            let key = key.as_slice();

            self.transactions[i].signature_message_fragment =
                signing::sign_fragment(&normalized[..27], &key[..signing::KEY_FRAGMENT_TRITS])?;

            for j in 1..info.security.fragments() {
                if i + j >= self.transactions.len() {
                    break;
                }
                let tx = &self.transactions[i + j];
                if tx.address == address && tx.value == 0 {
                    let chunk = &normalized[(j % 3) * 27..(j % 3 + 1) * 27];
                    let fragment = signing::sign_fragment(
                        chunk,
                        &key[j * signing::KEY_FRAGMENT_TRITS..(j + 1) * signing::KEY_FRAGMENT_TRITS],
                    )?;
                    self.transactions[i + j].signature_message_fragment = fragment;
                }
            }
        }
        Ok(())
    }

    /// Check the finalized-bundle invariants: coherent indices, zero
    /// balance, and valid input signatures.
    pub fn validate(&self) -> Result<()> {
        let len = self.transactions.len();
        let empty_fragment = Trytes::nines(SIGNATURE_MESSAGE_FRAGMENT_SIZE / TRITS_PER_TRYTE);
        let mut total: i64 = 0;
        let mut signatures: Vec<(Address, Vec<Trytes>)> = Vec::new();

        for (index, tx) in self.transactions.iter().enumerate() {
            total += tx.value;
            if tx.current_index != index as i64 {
                return Err(Error::InvalidCurrentIndex {
                    at: index,
                    found: tx.current_index,
                });
            }
            if tx.last_index != len as i64 - 1 {
                return Err(Error::InvalidLastIndex {
                    at: index,
                    found: tx.last_index,
                });
            }
            if tx.bundle == curl::empty_hash() {
                return Err(Error::NonFinalizedBundle);
            }
            if tx.value >= 0 {
                continue;
            }
            if tx.signature_message_fragment == empty_fragment {
                return Err(Error::InvalidSignature);
            }
            // the carriers directly after an input hold the rest of
            // its signature
            let mut fragments = vec![tx.signature_message_fragment.clone()];
            for next in &self.transactions[index + 1..] {
                if next.address != tx.address || next.value != 0 {
                    break;
                }
                fragments.push(next.signature_message_fragment.clone());
            }
            signatures.push((tx.address.clone(), fragments));
        }

        if total != 0 {
            return Err(Error::InvalidBundleBalance(total));
        }

        let hash = self.hash()?;
        for (address, fragments) in &signatures {
            if !signing::is_valid_signature(address, fragments, &hash)? {
                return Err(Error::InvalidSignature);
            }
        }
        Ok(())
    }

    /// Split the bundle's transactions at `address` into (sent,
    /// received). Zero-value transactions count as received.
    pub fn categorize(&self, address: &Address) -> (Vec<&Transaction>, Vec<&Transaction>) {
        let mut sent = Vec::new();
        let mut received = Vec::new();
        for tx in &self.transactions {
            if tx.address != *address {
                continue;
            }
            if tx.value >= 0 {
                received.push(tx);
            } else {
                sent.push(tx);
            }
        }
        (sent, received)
    }
}
