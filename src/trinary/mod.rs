//! Balanced-ternary domain: trits, trytes and the conversions between
//! them, integers and ASCII.
//!
//! A trit holds a value in `{-1, 0, 1}`; three trits form a tryte with a
//! value in `[-13, 13]`, written as one of the 27 characters `9A..Z`.
//! Sequences are little-endian: the trit at position `i` weighs `3^i`.

use core::fmt;
use core::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{Error, Result};

/// A single balanced trit: -1, 0 or 1.
pub type Trit = i8;

/// Trits per tryte.
pub const TRITS_PER_TRYTE: usize = 3;

/// Size of a hash in trits.
pub const HASH_TRITS: usize = 243;

/// Size of a hash in trytes.
pub const HASH_TRYTES: usize = HASH_TRITS / TRITS_PER_TRYTE;

/// The 27 tryte characters, in tryte-index order.
pub const TRYTE_ALPHABET: &str = "9ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Trits of each tryte, indexed by tryte index (alphabet order),
/// little-endian within the tryte.
const TRYTE_TRITS: [[Trit; 3]; 27] = [
    [0, 0, 0],
    [1, 0, 0],
    [-1, 1, 0],
    [0, 1, 0],
    [1, 1, 0],
    [-1, -1, 1],
    [0, -1, 1],
    [1, -1, 1],
    [-1, 0, 1],
    [0, 0, 1],
    [1, 0, 1],
    [-1, 1, 1],
    [0, 1, 1],
    [1, 1, 1],
    [-1, -1, -1],
    [0, -1, -1],
    [1, -1, -1],
    [-1, 0, -1],
    [0, 0, -1],
    [1, 0, -1],
    [-1, 1, -1],
    [0, 1, -1],
    [1, 1, -1],
    [-1, -1, 0],
    [0, -1, 0],
    [1, -1, 0],
    [-1, 0, 0],
];

/// Tryte index (0..27) of a character, if it is in the alphabet.
fn tryte_index(c: char) -> Option<usize> {
    match c {
        '9' => Some(0),
        'A'..='Z' => Some(c as usize - 'A' as usize + 1),
        _ => None,
    }
}

/// Character of a tryte index.
fn tryte_char(index: usize) -> char {
    debug_assert!(index < 27);
    if index == 0 {
        '9'
    } else {
        (index as u8 - 1 + b'A') as char
    }
}

/// Signed value in [-13, 13] of a tryte character known to be valid.
fn tryte_value(b: u8) -> i8 {
    let index = if b == b'9' { 0 } else { (b - b'A' + 1) as i8 };
    if index > 13 {
        index - 27
    } else {
        index
    }
}

/// Remainder in {-1, 0, 1} and quotient of `t` mods 3: `t == r + 3 * q`.
pub(crate) fn mods3(t: i64) -> (Trit, i64) {
    let r = ((t % 3) + 4) % 3 - 1;
    (r as Trit, (t - r) / 3)
}

/// An owned sequence of trits.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Trits(Vec<Trit>);

impl Trits {
    /// All-zero trits of the given length.
    pub fn zero(len: usize) -> Self {
        Trits(vec![0; len])
    }

    /// Wrap raw trits. Values must already be in {-1, 0, 1}.
    pub(crate) fn from_raw(trits: Vec<Trit>) -> Self {
        debug_assert!(trits.iter().all(|t| (-1..=1).contains(t)));
        Trits(trits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Trit] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [Trit] {
        &mut self.0
    }

    /// Encode `value` in `width` balanced trits, zero-extended.
    ///
    /// Fails with [`Error::IntegerOverflow`] if `|value|` exceeds
    /// `(3^width - 1) / 2`.
    pub fn from_int(value: i64, width: usize) -> Result<Self> {
        // max = (3^width - 1) / 2, saturated for wide fields
        let mut max: i64 = 0;
        for _ in 0..width {
            max = max.saturating_mul(3).saturating_add(1);
        }
        if value.checked_abs().map_or(true, |abs| abs > max) {
            return Err(Error::IntegerOverflow(value, width));
        }
        let mut trits = vec![0; width];
        let mut acc = value;
        for t in trits.iter_mut() {
            if acc == 0 {
                break;
            }
            let (r, q) = mods3(acc);
            *t = r;
            acc = q;
        }
        Ok(Trits(trits))
    }

    /// Little-endian balanced-ternary value of the trits.
    pub fn to_int(&self) -> i64 {
        let mut value: i128 = 0;
        for &t in self.0.iter().rev() {
            value = value * 3 + t as i128;
        }
        debug_assert!(i64::try_from(value).is_ok());
        value as i64
    }

    /// Add 1 in balanced ternary with carry, wrapping at the trit
    /// boundary.
    pub fn increment(&mut self) {
        increment(&mut self.0);
    }

    /// Number of trailing zero trits.
    pub fn trailing_zeros(&self) -> usize {
        self.0.iter().rev().take_while(|&&t| t == 0).count()
    }

    /// Convert to trytes. The length must be a multiple of 3.
    pub fn trytes(&self) -> Result<Trytes> {
        if self.0.len() % TRITS_PER_TRYTE != 0 {
            return Err(Error::InvalidTritCount(self.0.len()));
        }
        let mut s = String::with_capacity(self.0.len() / TRITS_PER_TRYTE);
        for chunk in self.0.chunks(TRITS_PER_TRYTE) {
            let value = chunk[0] as i32 + 3 * chunk[1] as i32 + 9 * chunk[2] as i32;
            s.push(tryte_char(((value % 27) + 27) as usize % 27));
        }
        Ok(Trytes(s))
    }
}

impl AsRef<[Trit]> for Trits {
    fn as_ref(&self) -> &[Trit] {
        &self.0
    }
}

impl fmt::Debug for Trits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trits({:?})", self.0)
    }
}

/// Add 1 in balanced ternary with carry, wrapping at the end of the
/// slice.
pub fn increment(trits: &mut [Trit]) {
    for t in trits.iter_mut() {
        *t += 1;
        if *t <= 1 {
            return;
        }
        *t = -1;
    }
}

/// Add an integer into a trit slice in place, with carry. Carry past the
/// end of the slice is dropped.
pub(crate) fn add_int(trits: &mut [Trit], value: i64) {
    let mut acc = value;
    for t in trits.iter_mut() {
        if acc == 0 {
            return;
        }
        let (r, q) = mods3(*t as i64 + acc);
        *t = r;
        acc = q;
    }
}

/// An owned, validated sequence of trytes over the alphabet `[9A-Z]`.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Trytes(String);

impl Trytes {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert each tryte into its three trits.
    pub fn trits(&self) -> Trits {
        let mut trits = Vec::with_capacity(self.0.len() * TRITS_PER_TRYTE);
        for b in self.0.bytes() {
            let index = if b == b'9' { 0 } else { (b - b'A' + 1) as usize };
            trits.extend_from_slice(&TRYTE_TRITS[index]);
        }
        Trits(trits)
    }

    /// Pad with `9`s up to `len` trytes. Longer inputs are returned
    /// unchanged.
    pub fn pad(&self, len: usize) -> Trytes {
        let mut s = self.0.clone();
        while s.len() < len {
            s.push('9');
        }
        Trytes(s)
    }

    /// `len` trytes of `9`s.
    pub fn nines(len: usize) -> Trytes {
        Trytes("9".repeat(len))
    }

    /// Sub-range of trytes. Panics if out of bounds, like slice indexing.
    pub fn slice(&self, start: usize, end: usize) -> Trytes {
        Trytes(self.0[start..end].to_string())
    }

    /// Concatenate two tryte sequences.
    pub fn concat(&self, other: &Trytes) -> Trytes {
        let mut s = self.0.clone();
        s.push_str(&other.0);
        Trytes(s)
    }

    /// Encode ASCII text as trytes, two trytes per byte.
    pub fn from_ascii(text: &str) -> Result<Trytes> {
        let mut s = String::with_capacity(text.len() * 2);
        for b in text.bytes() {
            if b > 0x7F {
                return Err(Error::InvalidTryte(b as char));
            }
            s.push(tryte_char(b as usize % 27));
            s.push(tryte_char(b as usize / 27));
        }
        Ok(Trytes(s))
    }

    /// Decode trytes produced by [`Trytes::from_ascii`].
    pub fn to_ascii(&self) -> Result<String> {
        if self.0.len() % 2 != 0 {
            return Err(Error::InvalidTritCount(self.0.len() * TRITS_PER_TRYTE));
        }
        let bytes = self.0.as_bytes();
        let mut text = String::with_capacity(self.0.len() / 2);
        for pair in bytes.chunks(2) {
            let first = if pair[0] == b'9' { 0 } else { (pair[0] - b'A' + 1) as usize };
            let second = if pair[1] == b'9' { 0 } else { (pair[1] - b'A' + 1) as usize };
            let value = first + second * 27;
            if value > 0x7F {
                return Err(Error::InvalidTryte(pair[1] as char));
            }
            text.push(value as u8 as char);
        }
        Ok(text)
    }
}

impl FromStr for Trytes {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        for c in s.chars() {
            if tryte_index(c).is_none() {
                return Err(Error::InvalidTryte(c));
            }
        }
        Ok(Trytes(s.to_string()))
    }
}

impl TryFrom<&str> for Trytes {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for Trytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Trytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trytes({})", self.0)
    }
}

impl Serialize for Trytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Trytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Normalize an 81-tryte hash into 81 signed tryte values whose sum per
/// 27-tryte chunk is zero.
///
/// A `+13` entry surviving normalization marks a hash that cannot be
/// signed and must be resampled.
pub fn normalize(hash: &Trytes) -> Result<[i8; HASH_TRYTES]> {
    if hash.len() != HASH_TRYTES {
        return Err(Error::InvalidTritCount(hash.len() * TRITS_PER_TRYTE));
    }
    let bytes = hash.as_str().as_bytes();
    let mut normalized = [0i8; HASH_TRYTES];
    for chunk in 0..3 {
        let window = &mut normalized[chunk * 27..(chunk + 1) * 27];
        let mut sum: i32 = 0;
        for (v, b) in window.iter_mut().zip(&bytes[chunk * 27..]) {
            *v = tryte_value(*b);
            sum += *v as i32;
        }
        while sum > 0 {
            for v in window.iter_mut() {
                if *v > -13 {
                    *v -= 1;
                    break;
                }
            }
            sum -= 1;
        }
        while sum < 0 {
            for v in window.iter_mut() {
                if *v < 13 {
                    *v += 1;
                    break;
                }
            }
            sum += 1;
        }
    }
    Ok(normalized)
}
