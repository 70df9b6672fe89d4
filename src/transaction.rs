//! The fixed 8019-trit (2673-tryte) transaction frame.

use core::fmt;
use core::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::curl;
use crate::errors::{Error, Result};
use crate::signing::Address;
use crate::trinary::{Trits, Trytes, HASH_TRYTES, TRITS_PER_TRYTE};

// Trit offsets and sizes of the transaction frame.
pub const SIGNATURE_MESSAGE_FRAGMENT_OFFSET: usize = 0;
pub const SIGNATURE_MESSAGE_FRAGMENT_SIZE: usize = 6561;
pub const ADDRESS_OFFSET: usize = SIGNATURE_MESSAGE_FRAGMENT_OFFSET + SIGNATURE_MESSAGE_FRAGMENT_SIZE;
pub const ADDRESS_SIZE: usize = 243;
pub const VALUE_OFFSET: usize = ADDRESS_OFFSET + ADDRESS_SIZE;
pub const VALUE_SIZE: usize = 81;
/// Usable width of the value field; the trits above it must be zero.
pub const VALUE_USABLE_SIZE: usize = 33;
pub const OBSOLETE_TAG_OFFSET: usize = VALUE_OFFSET + VALUE_SIZE;
pub const OBSOLETE_TAG_SIZE: usize = 81;
pub const TIMESTAMP_OFFSET: usize = OBSOLETE_TAG_OFFSET + OBSOLETE_TAG_SIZE;
pub const TIMESTAMP_SIZE: usize = 27;
pub const CURRENT_INDEX_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_SIZE;
pub const CURRENT_INDEX_SIZE: usize = 27;
pub const LAST_INDEX_OFFSET: usize = CURRENT_INDEX_OFFSET + CURRENT_INDEX_SIZE;
pub const LAST_INDEX_SIZE: usize = 27;
pub const BUNDLE_OFFSET: usize = LAST_INDEX_OFFSET + LAST_INDEX_SIZE;
pub const BUNDLE_SIZE: usize = 243;
pub const TRUNK_OFFSET: usize = BUNDLE_OFFSET + BUNDLE_SIZE;
pub const TRUNK_SIZE: usize = 243;
pub const BRANCH_OFFSET: usize = TRUNK_OFFSET + TRUNK_SIZE;
pub const BRANCH_SIZE: usize = 243;
pub const TAG_OFFSET: usize = BRANCH_OFFSET + BRANCH_SIZE;
pub const TAG_SIZE: usize = 81;
pub const ATTACHMENT_TIMESTAMP_OFFSET: usize = TAG_OFFSET + TAG_SIZE;
pub const ATTACHMENT_TIMESTAMP_SIZE: usize = 27;
pub const ATTACHMENT_TIMESTAMP_LOWER_OFFSET: usize =
    ATTACHMENT_TIMESTAMP_OFFSET + ATTACHMENT_TIMESTAMP_SIZE;
pub const ATTACHMENT_TIMESTAMP_LOWER_SIZE: usize = 27;
pub const ATTACHMENT_TIMESTAMP_UPPER_OFFSET: usize =
    ATTACHMENT_TIMESTAMP_LOWER_OFFSET + ATTACHMENT_TIMESTAMP_LOWER_SIZE;
pub const ATTACHMENT_TIMESTAMP_UPPER_SIZE: usize = 27;
pub const NONCE_OFFSET: usize = ATTACHMENT_TIMESTAMP_UPPER_OFFSET + ATTACHMENT_TIMESTAMP_UPPER_SIZE;
pub const NONCE_SIZE: usize = 81;

/// Total frame size in trits.
pub const TRANSACTION_TRITS: usize = NONCE_OFFSET + NONCE_SIZE;

/// Total frame size in trytes.
pub const TRANSACTION_TRYTES: usize = TRANSACTION_TRITS / TRITS_PER_TRYTE;

/// Tryte window of the value field's upper trits, which must be all `9`.
const VALUE_PAD_TRYTES: core::ops::Range<usize> = 2279..2295;

/// The default minimum weight magnitude of the main network.
pub const DEFAULT_MIN_WEIGHT_MAGNITUDE: usize = 14;

/// One transaction, decoded into typed fields. Its identity is the
/// Curl-P-81 hash of its 2673-tryte encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub signature_message_fragment: Trytes,
    pub address: Address,
    pub value: i64,
    pub obsolete_tag: Trytes,
    pub timestamp: i64,
    pub current_index: i64,
    pub last_index: i64,
    pub bundle: Trytes,
    pub trunk_transaction: Trytes,
    pub branch_transaction: Trytes,
    pub tag: Trytes,
    pub attachment_timestamp: i64,
    pub attachment_timestamp_lower_bound: i64,
    pub attachment_timestamp_upper_bound: i64,
    pub nonce: Trytes,
}

/// Parse and validate the frame.
fn check_frame(trytes: &Trytes) -> Result<()> {
    if trytes.len() != TRANSACTION_TRYTES {
        return Err(Error::InvalidTransactionLength(trytes.len()));
    }
    if trytes.as_str().as_bytes()[VALUE_PAD_TRYTES].iter().any(|&b| b != b'9') {
        return Err(Error::InvalidTransactionFrame);
    }
    Ok(())
}

impl Transaction {
    /// Decode a 2673-tryte frame. Validates the length and the all-`9`
    /// padding of the value field's upper trits.
    pub fn from_trytes(trytes: &Trytes) -> Result<Self> {
        check_frame(trytes)?;
        let trits = trytes.trits();
        let t = trits.as_slice();
        let int = |offset: usize, size: usize| {
            Trits::from_raw(t[offset..offset + size].to_vec()).to_int()
        };
        let field = |offset: usize, size: usize| {
            trytes.slice(offset / TRITS_PER_TRYTE, (offset + size) / TRITS_PER_TRYTE)
        };
        Ok(Transaction {
            signature_message_fragment: field(
                SIGNATURE_MESSAGE_FRAGMENT_OFFSET,
                SIGNATURE_MESSAGE_FRAGMENT_SIZE,
            ),
            address: Address::from_trytes(&field(ADDRESS_OFFSET, ADDRESS_SIZE))?,
            value: int(VALUE_OFFSET, VALUE_SIZE),
            obsolete_tag: field(OBSOLETE_TAG_OFFSET, OBSOLETE_TAG_SIZE),
            timestamp: int(TIMESTAMP_OFFSET, TIMESTAMP_SIZE),
            current_index: int(CURRENT_INDEX_OFFSET, CURRENT_INDEX_SIZE),
            last_index: int(LAST_INDEX_OFFSET, LAST_INDEX_SIZE),
            bundle: field(BUNDLE_OFFSET, BUNDLE_SIZE),
            trunk_transaction: field(TRUNK_OFFSET, TRUNK_SIZE),
            branch_transaction: field(BRANCH_OFFSET, BRANCH_SIZE),
            tag: field(TAG_OFFSET, TAG_SIZE),
            attachment_timestamp: int(ATTACHMENT_TIMESTAMP_OFFSET, ATTACHMENT_TIMESTAMP_SIZE),
            attachment_timestamp_lower_bound: int(
                ATTACHMENT_TIMESTAMP_LOWER_OFFSET,
                ATTACHMENT_TIMESTAMP_LOWER_SIZE,
            ),
            attachment_timestamp_upper_bound: int(
                ATTACHMENT_TIMESTAMP_UPPER_OFFSET,
                ATTACHMENT_TIMESTAMP_UPPER_SIZE,
            ),
            nonce: field(NONCE_OFFSET, NONCE_SIZE),
        })
    }

    /// Encode the transaction into its 2673-tryte frame.
    pub fn to_trytes(&self) -> Result<Trytes> {
        let int = |value: i64, size: usize| -> Result<Trytes> {
            Trits::from_int(value, size)?.trytes()
        };
        let mut s = String::with_capacity(TRANSACTION_TRYTES);
        s.push_str(
            self.signature_message_fragment
                .pad(SIGNATURE_MESSAGE_FRAGMENT_SIZE / TRITS_PER_TRYTE)
                .as_str(),
        );
        s.push_str(self.address.as_trytes().as_str());
        s.push_str(int(self.value, VALUE_SIZE)?.as_str());
        s.push_str(self.obsolete_tag.pad(OBSOLETE_TAG_SIZE / TRITS_PER_TRYTE).as_str());
        s.push_str(int(self.timestamp, TIMESTAMP_SIZE)?.as_str());
        s.push_str(int(self.current_index, CURRENT_INDEX_SIZE)?.as_str());
        s.push_str(int(self.last_index, LAST_INDEX_SIZE)?.as_str());
        s.push_str(self.bundle.pad(HASH_TRYTES).as_str());
        s.push_str(self.trunk_transaction.pad(HASH_TRYTES).as_str());
        s.push_str(self.branch_transaction.pad(HASH_TRYTES).as_str());
        s.push_str(self.tag.pad(TAG_SIZE / TRITS_PER_TRYTE).as_str());
        s.push_str(int(self.attachment_timestamp, ATTACHMENT_TIMESTAMP_SIZE)?.as_str());
        s.push_str(int(self.attachment_timestamp_lower_bound, ATTACHMENT_TIMESTAMP_LOWER_SIZE)?.as_str());
        s.push_str(int(self.attachment_timestamp_upper_bound, ATTACHMENT_TIMESTAMP_UPPER_SIZE)?.as_str());
        s.push_str(self.nonce.pad(NONCE_SIZE / TRITS_PER_TRYTE).as_str());
        debug_assert_eq!(s.len(), TRANSACTION_TRYTES);
        s.parse()
    }

    /// The transaction hash: `CurlP81(trytes)`.
    pub fn hash(&self) -> Result<Trytes> {
        Ok(curl::hash(&self.to_trytes()?))
    }

    /// Whether the nonce satisfies the minimum weight magnitude: the
    /// hash must end in at least `mwm` zero trits.
    pub fn has_valid_nonce(&self, mwm: usize) -> Result<bool> {
        Ok(self.hash()?.trits().trailing_zeros() >= mwm)
    }

    /// A tail transaction heads its bundle.
    pub fn is_tail(&self) -> bool {
        self.current_index == 0
    }
}

impl FromStr for Transaction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Transaction::from_trytes(&s.parse()?)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_trytes() {
            Ok(trytes) => f.write_str(trytes.as_str()),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let trytes = self.to_trytes().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(trytes.as_str())
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let trytes = Trytes::deserialize(deserializer)?;
        Transaction::from_trytes(&trytes).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // the reference transaction from the transaction-hash vector
    const TX: &str = include_str!("testdata/curl_tx.trytes");

    fn reference() -> Transaction {
        TX.trim().parse().unwrap()
    }

    #[test]
    fn frame_constants_are_consistent() {
        assert_eq!(TRANSACTION_TRITS, 8019);
        assert_eq!(TRANSACTION_TRYTES, 2673);
        assert_eq!(NONCE_OFFSET, 7938);
        assert_eq!(VALUE_PAD_TRYTES.start * TRITS_PER_TRYTE, VALUE_OFFSET + VALUE_USABLE_SIZE);
    }

    #[test]
    fn round_trip() {
        let tx = reference();
        assert_eq!(tx.to_trytes().unwrap().as_str(), TX.trim());
    }

    #[test]
    fn curl_hash_vector() {
        let tx = reference();
        assert_eq!(
            tx.hash().unwrap().as_str(),
            "WPM9JCTQH9QHBHBJCODWDNPSLFLQDZADRAEZTZDL9OEGTVRZARVLVJHZIMPBPCTAIYJKWTUSRKNNTMFOQ"
        );
    }

    #[test]
    fn rejects_wrong_length() {
        let short: Trytes = "ABC".parse().unwrap();
        assert_eq!(
            Transaction::from_trytes(&short).unwrap_err(),
            Error::InvalidTransactionLength(3)
        );
    }

    #[test]
    fn rejects_dirty_value_padding() {
        let mut s = TX.trim().to_string();
        s.replace_range(2280..2281, "A");
        let trytes: Trytes = s.parse().unwrap();
        assert_eq!(
            Transaction::from_trytes(&trytes).unwrap_err(),
            Error::InvalidTransactionFrame
        );
    }

    #[test]
    fn serde_as_tryte_string() {
        let tx = reference();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
