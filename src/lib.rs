//! Client-library core for a distributed ledger that represents all
//! data in balanced ternary.
//!
//! The crate is layered leaves-first:
//!
//! - [`trinary`]: trits, trytes, integer conversion and normalization.
//! - [`curl`]: the Curl-P-81 sponge, hashing transactions and backing
//!   proof of work.
//! - [`kerl`]: the Keccak-384-based sponge behind addresses, signatures
//!   and bundle hashes. Curl and Kerl serve different roles and are
//!   deliberately not interchangeable.
//! - [`signing`]: Winternitz-style one-time signatures and the
//!   seed → subseed → key → digests → address pipeline.
//! - [`transaction`]: the fixed 8019-trit transaction frame.
//! - [`bundle`]: bundle assembly, the normalized-bundle-hash search and
//!   input signing.
//! - [`pow`]: the parallel bit-sliced nonce search.
//! - [`client`]: the node boundary and the transfer workflow on top of
//!   it.

pub mod bundle;
pub mod client;
pub mod curl;
pub mod errors;
pub mod kerl;
pub mod pow;
pub mod signing;
pub mod transaction;
pub mod trinary;

pub use bundle::{AddressInfo, Bundle, Transfer};
pub use client::{BucketNode, NodeClient};
pub use errors::{Error, Result};
pub use kerl::Kerl;
pub use pow::{PowConfig, PowImpl, StopFlag};
pub use signing::{Address, SecurityLevel};
pub use transaction::Transaction;
pub use trinary::{Trits, Trytes};
