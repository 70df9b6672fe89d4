//! Winternitz-style one-time signatures over Kerl, and the address
//! pipeline built on them: subseed → key → digests → address.
//!
//! Each security level contributes one 6561-trit key fragment of 27
//! segments. A segment is consumed by walking a 26-step Kerl rehash
//! chain: signing walks `13 - v` steps, verification walks the
//! remaining `13 + v`, where `v` is the signed tryte value of the
//! normalized hash chunk.

use core::fmt;
use core::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{Error, Result};
use crate::kerl::Kerl;
use crate::trinary::{normalize, Trit, Trits, Trytes, HASH_TRITS, HASH_TRYTES};

/// Trits of key material per security level: 27 segments of 243 trits.
pub const KEY_FRAGMENT_TRITS: usize = 27 * HASH_TRITS;

/// Trytes of one signature fragment.
pub const SIGNATURE_FRAGMENT_TRYTES: usize = KEY_FRAGMENT_TRITS / 3;

/// Segments per key fragment.
const SEGMENTS: usize = 27;

/// Full rehash chain length per segment.
const CHAIN: i8 = 26;

/// Trytes in an address, without checksum.
pub const ADDRESS_TRYTES: usize = HASH_TRYTES;

/// Trytes in an address checksum.
pub const CHECKSUM_TRYTES: usize = 9;

/// Signature/key size multiplier. Each level adds 2187 trytes of key
/// material and one signature-carrier transaction per input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    One = 1,
    Two = 2,
    Three = 3,
}

impl SecurityLevel {
    /// Number of 6561-trit key fragments.
    pub fn fragments(self) -> usize {
        self as usize
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::Two
    }
}

/// An 81-tryte address. Construct via [`new_address`] or parse from
/// trytes; a 90-tryte input has its checksum verified and stripped.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Trytes);

impl Address {
    /// Validate 81 trytes, or 90 trytes with checksum.
    pub fn from_trytes(trytes: &Trytes) -> Result<Self> {
        match trytes.len() {
            n if n == ADDRESS_TRYTES => Ok(Address(trytes.clone())),
            n if n == ADDRESS_TRYTES + CHECKSUM_TRYTES => {
                let address = Address(trytes.slice(0, ADDRESS_TRYTES));
                let checksum = trytes.slice(ADDRESS_TRYTES, n);
                address.verify_checksum(&checksum)?;
                Ok(address)
            }
            n => Err(Error::InvalidAddressLength(n)),
        }
    }

    pub fn as_trytes(&self) -> &Trytes {
        &self.0
    }

    pub fn trits(&self) -> Trits {
        self.0.trits()
    }

    /// The 9-tryte checksum: trytes 72..81 of `Kerl(address)`.
    pub fn checksum(&self) -> Result<Trytes> {
        let hash = crate::kerl::hash(self.trits())?.trytes()?;
        Ok(hash.slice(ADDRESS_TRYTES - CHECKSUM_TRYTES, ADDRESS_TRYTES))
    }

    /// The 90-tryte checksummed form.
    pub fn with_checksum(&self) -> Result<Trytes> {
        Ok(self.0.concat(&self.checksum()?))
    }

    pub fn verify_checksum(&self, checksum: &Trytes) -> Result<()> {
        if self.checksum()? != *checksum {
            return Err(Error::InvalidChecksum);
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::from_trytes(&s.parse()?)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let trytes = Trytes::deserialize(deserializer)?;
        Address::from_trytes(&trytes).map_err(de::Error::custom)
    }
}

/// Derive the 243-trit subseed for an address index: the seed trits
/// plus the index in balanced ternary, hashed once through Kerl.
pub fn subseed(seed: &Trytes, index: u32) -> Result<Trits> {
    if seed.len() != ADDRESS_TRYTES {
        return Err(Error::InvalidAddressLength(seed.len()));
    }
    let mut trits = seed.trits();
    crate::trinary::add_int(trits.as_mut_slice(), index as i64);
    crate::kerl::hash(trits)
}

/// Derive the private key for `(seed, index, security)`:
/// `security * 6561` trits squeezed from the absorbed subseed.
pub fn key(seed: &Trytes, index: u32, security: SecurityLevel) -> Result<Trits> {
    let subseed = subseed(seed, index)?;
    let mut kerl = Kerl::new();
    kerl.absorb(subseed)?;
    kerl.squeeze(security.fragments() * KEY_FRAGMENT_TRITS)
}

/// Walk the rehash chain: `value = Kerl(value)`, `rounds` times.
fn rehash(buffer: &mut [Trit], rounds: usize) -> Result<()> {
    for _ in 0..rounds {
        let hashed = crate::kerl::hash(&buffer[..])?;
        buffer.copy_from_slice(hashed.as_slice());
    }
    Ok(())
}

/// Per-fragment digests of a private key: each 243-trit segment walked
/// to the end of its chain, the 27 results hashed together.
pub fn digests(key: &Trits) -> Result<Trits> {
    if key.is_empty() || key.len() % KEY_FRAGMENT_TRITS != 0 {
        return Err(Error::InvalidTritCount(key.len()));
    }
    let fragments = key.len() / KEY_FRAGMENT_TRITS;
    let mut out = vec![0; fragments * HASH_TRITS];
    let mut segment = [0 as Trit; HASH_TRITS];
    for (f, fragment) in key.as_slice().chunks(KEY_FRAGMENT_TRITS).enumerate() {
        let mut kerl = Kerl::new();
        for chunk in fragment.chunks(HASH_TRITS) {
            segment.copy_from_slice(chunk);
            rehash(&mut segment, CHAIN as usize)?;
            kerl.absorb(&segment[..])?;
        }
        let digest = kerl.squeeze(HASH_TRITS)?;
        out[f * HASH_TRITS..(f + 1) * HASH_TRITS].copy_from_slice(digest.as_slice());
    }
    Ok(Trits::from_raw(out))
}

/// Hash concatenated digests into the 243 address trits.
pub fn address_from_digests(digests: &Trits) -> Result<Trits> {
    crate::kerl::hash(digests)
}

/// Derive the address for `(seed, index, security)`. Pure in its
/// arguments.
pub fn new_address(seed: &Trytes, index: u32, security: SecurityLevel) -> Result<Address> {
    let key = key(seed, index, security)?;
    let digests = digests(&key)?;
    let trits = address_from_digests(&digests)?;
    Ok(Address(trits.trytes()?))
}

/// Derive `count` consecutive addresses starting at `start`.
pub fn new_addresses(
    seed: &Trytes,
    start: u32,
    count: u32,
    security: SecurityLevel,
) -> Result<Vec<Address>> {
    (start..start + count)
        .map(|index| new_address(seed, index, security))
        .collect()
}

/// Sign one 27-tryte normalized hash chunk with one 6561-trit key
/// fragment, producing a 2187-tryte signature fragment.
pub fn sign_fragment(chunk: &[i8], key_fragment: &[Trit]) -> Result<Trytes> {
    debug_assert_eq!(chunk.len(), SEGMENTS);
    if key_fragment.len() != KEY_FRAGMENT_TRITS {
        return Err(Error::InvalidTritCount(key_fragment.len()));
    }
    let mut out = vec![0; KEY_FRAGMENT_TRITS];
    let mut segment = [0 as Trit; HASH_TRITS];
    for (j, part) in key_fragment.chunks(HASH_TRITS).enumerate() {
        segment.copy_from_slice(part);
        rehash(&mut segment, (13 - chunk[j]) as usize)?;
        out[j * HASH_TRITS..(j + 1) * HASH_TRITS].copy_from_slice(&segment);
    }
    Trits::from_raw(out).trytes()
}

/// Rebuild the digest a signature fragment contributes to the address.
fn fragment_digest(chunk: &[i8], fragment: &Trytes) -> Result<Trits> {
    debug_assert_eq!(chunk.len(), SEGMENTS);
    if fragment.len() != SIGNATURE_FRAGMENT_TRYTES {
        return Err(Error::InvalidTritCount(fragment.len() * 3));
    }
    let trits = fragment.trits();
    let mut kerl = Kerl::new();
    let mut segment = [0 as Trit; HASH_TRITS];
    for (j, part) in trits.as_slice().chunks(HASH_TRITS).enumerate() {
        segment.copy_from_slice(part);
        rehash(&mut segment, (13 + chunk[j]) as usize)?;
        kerl.absorb(&segment[..])?;
    }
    kerl.squeeze(HASH_TRITS)
}

/// Verify signature fragments against an address and a bundle hash.
///
/// Fragment `i` is checked against normalized-hash chunk `i mod 3`; the
/// rebuilt digests must hash back to the address.
pub fn is_valid_signature(
    address: &Address,
    fragments: &[Trytes],
    bundle_hash: &Trytes,
) -> Result<bool> {
    if fragments.is_empty() {
        return Ok(false);
    }
    let normalized = normalize(bundle_hash)?;
    let mut digests = vec![0; fragments.len() * HASH_TRITS];
    for (i, fragment) in fragments.iter().enumerate() {
        let chunk = &normalized[(i % 3) * SEGMENTS..(i % 3 + 1) * SEGMENTS];
        let digest = fragment_digest(chunk, fragment)?;
        digests[i * HASH_TRITS..(i + 1) * HASH_TRITS].copy_from_slice(digest.as_slice());
    }
    let candidate = address_from_digests(&Trits::from_raw(digests))?;
    Ok(candidate.trytes()? == *address.as_trytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "WQNZOHUT99PWKEBFSKQSYNC9XHT9GEBMOSJAQDQAXPEZPJNDIUB9TSNWVMHKWICW9WVZXSMDFGISOD9FZ";

    fn seed() -> Trytes {
        SEED.parse().unwrap()
    }

    #[test]
    fn address_index_0_security_2() {
        let address = new_address(&seed(), 0, SecurityLevel::Two).unwrap();
        assert_eq!(
            address.as_trytes().as_str(),
            "AYYNHWWNZQOFYXNQSLVULU9ARZCSXNWWAFYEWEL9LIXYDFS9KDSRZF9ZID9AQWSLAEUAJSTQKGPGXNWCD"
        );
    }

    #[test]
    fn address_index_1_security_2() {
        let address = new_address(&seed(), 1, SecurityLevel::Two).unwrap();
        assert_eq!(
            address.as_trytes().as_str(),
            "9CTFIAYOFLOKXVNDFKNERQQEFR9FCIXQQHNRDKHIVVGFZQKTBWPCOIHCCQIU9ASJQECGPHDBAREDXIRCX"
        );
    }

    #[test]
    fn address_is_deterministic() {
        let a = new_address(&seed(), 3, SecurityLevel::One).unwrap();
        let b = new_address(&seed(), 3, SecurityLevel::One).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn addresses_differ_by_index_and_security() {
        let a = new_address(&seed(), 0, SecurityLevel::Two).unwrap();
        let b = new_address(&seed(), 1, SecurityLevel::Two).unwrap();
        let c = new_address(&seed(), 0, SecurityLevel::One).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn batch_derivation_matches_single() {
        let batch = new_addresses(&seed(), 0, 2, SecurityLevel::Two).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], new_address(&seed(), 0, SecurityLevel::Two).unwrap());
        assert_eq!(batch[1], new_address(&seed(), 1, SecurityLevel::Two).unwrap());
    }

    #[test]
    fn checksum_vector() {
        let address: Address =
            "RGVOWCDJAGSO9TNLBBPUVYE9KHBOAZNVFRVKVYYCHRKQRKRNKGGWBF9WCRJVROKLVKWZUMBABVJGAALWU"
                .parse()
                .unwrap();
        assert_eq!(address.checksum().unwrap().as_str(), "NPJ9QIHFW");
    }

    #[test]
    fn checksum_of_all_nines() {
        let address: Address = Address::from_trytes(&Trytes::nines(81)).unwrap();
        assert_eq!(address.checksum().unwrap().as_str(), "A9BEONKZW");
    }

    #[test]
    fn with_checksum_prefixes_address() {
        let address: Address =
            "RGVOWCDJAGSO9TNLBBPUVYE9KHBOAZNVFRVKVYYCHRKQRKRNKGGWBF9WCRJVROKLVKWZUMBABVJGAALWU"
                .parse()
                .unwrap();
        let full = address.with_checksum().unwrap();
        assert_eq!(full.len(), 90);
        assert_eq!(full.slice(0, 81), *address.as_trytes());
        assert_eq!(Address::from_trytes(&full).unwrap(), address);
    }

    #[test]
    fn checksummed_parse_rejects_mismatch() {
        let bad: Trytes =
            "RGVOWCDJAGSO9TNLBBPUVYE9KHBOAZNVFRVKVYYCHRKQRKRNKGGWBF9WCRJVROKLVKWZUMBABVJGAALWUA9BEONKZW"
                .parse()
                .unwrap();
        assert_eq!(Address::from_trytes(&bad).unwrap_err(), Error::InvalidChecksum);
    }

    #[test]
    fn address_length_checked() {
        let short: Trytes = "ABC".parse().unwrap();
        assert_eq!(
            Address::from_trytes(&short).unwrap_err(),
            Error::InvalidAddressLength(3)
        );
    }

    #[test]
    fn signature_round_trip() {
        let security = SecurityLevel::Two;
        let key = key(&seed(), 5, security).unwrap();
        let address = new_address(&seed(), 5, security).unwrap();

        // any valid normalized hash will do; use a bundle-hash-shaped input
        let hash: Trytes =
            "BYGWQMALMVZXUCIVU9AVIOBDETGEZLEVRSCISIFXULRDIDNINYPUZXMVZZSSMDRFCXEHLKBNEYUCOXATX"
                .parse()
                .unwrap();
        let normalized = normalize(&hash).unwrap();

        let mut fragments = Vec::new();
        for j in 0..security.fragments() {
            let chunk = &normalized[(j % 3) * 27..(j % 3 + 1) * 27];
            let fragment =
                sign_fragment(chunk, &key.as_slice()[j * KEY_FRAGMENT_TRITS..(j + 1) * KEY_FRAGMENT_TRITS])
                    .unwrap();
            fragments.push(fragment);
        }

        assert!(is_valid_signature(&address, &fragments, &hash).unwrap());

        // a tampered fragment must not verify
        let mut tampered = fragments.clone();
        let mut trits = tampered[0].trits();
        trits.as_mut_slice()[0] = -trits.as_slice()[0];
        tampered[0] = trits.trytes().unwrap();
        assert!(!is_valid_signature(&address, &tampered, &hash).unwrap());

        // fragments against the wrong address must not verify
        let other = new_address(&seed(), 6, security).unwrap();
        assert!(!is_valid_signature(&other, &fragments, &hash).unwrap());
    }

    #[test]
    fn signature_round_trip_security_three() {
        // three fragments wrap around the normalized hash: chunks 0, 1, 2
        let security = SecurityLevel::Three;
        let key = key(&seed(), 2, security).unwrap();
        let address = new_address(&seed(), 2, security).unwrap();
        let hash: Trytes =
            "LNISWNCEWLLSPIDCKMUITJKZEZZTEQWIDARSEAPSTCHFWAIKSZIKSFSQZIMWHUFAIRJKEBBENDQVIDGZB"
                .parse()
                .unwrap();
        let normalized = normalize(&hash).unwrap();
        let fragments: Vec<Trytes> = (0..3)
            .map(|j| {
                let chunk = &normalized[(j % 3) * 27..(j % 3 + 1) * 27];
                sign_fragment(
                    chunk,
                    &key.as_slice()[j * KEY_FRAGMENT_TRITS..(j + 1) * KEY_FRAGMENT_TRITS],
                )
                .unwrap()
            })
            .collect();
        assert!(is_valid_signature(&address, &fragments, &hash).unwrap());
        // dropping a fragment leaves an incomplete signature
        assert!(!is_valid_signature(&address, &fragments[..2], &hash).unwrap());
    }

    #[test]
    fn subseed_depends_on_index() {
        let a = subseed(&seed(), 0).unwrap();
        let b = subseed(&seed(), 1).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), HASH_TRITS);
    }
}
