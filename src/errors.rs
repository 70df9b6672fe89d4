use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    //////////
    // Trinary
    //////////
    #[error("Character '{0}' is not in the tryte alphabet [9A-Z]")]
    InvalidTryte(char),
    #[error("Trit count is invalid here (found: {0})")]
    InvalidTritCount(usize),
    #[error("Integer {0} does not fit in {1} balanced trits")]
    IntegerOverflow(i64, usize),

    //////////
    // Kerl
    //////////
    #[error("Absorbed block must be a positive multiple of 243 trits (found: {0})")]
    InvalidBlockSize(usize),

    //////////
    // Address
    //////////
    #[error("Address must be 81 trytes, or 90 with checksum (found: {0})")]
    InvalidAddressLength(usize),
    #[error("Checksum doesn't match address")]
    InvalidChecksum,

    //////////
    // Transaction
    //////////
    #[error("Transaction must be 2673 trytes (found: {0})")]
    InvalidTransactionLength(usize),
    #[error("Transaction value field has non-zero upper trits")]
    InvalidTransactionFrame,

    //////////
    // Bundle
    //////////
    #[error("CurrentIndex {found} of transaction {at} is not correct")]
    InvalidCurrentIndex { at: usize, found: i64 },
    #[error("LastIndex {found} of transaction {at} is not correct")]
    InvalidLastIndex { at: usize, found: i64 },
    #[error("Total balance of the bundle is not 0 (found: {0})")]
    InvalidBundleBalance(i64),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Bundle has not been finalized")]
    NonFinalizedBundle,

    //////////
    // Inputs
    //////////
    #[error("Not enough balance (required: {required}, available: {available})")]
    NotEnoughBalance { required: i64, available: i64 },
    #[error("Invalid start/end address range (start: {start}, end: {end})")]
    InvalidAddressStartEnd { start: u32, end: u32 },

    //////////
    // Proof of work
    //////////
    #[error("Proof of work was interrupted")]
    Interrupted,

    //////////
    // Node
    //////////
    #[error("Node error {code}: {message}")]
    Node { code: i64, message: String },
}

impl Error {
    /// Failure surfaced by the external node, with no particular status code.
    pub fn node<S: Into<String>>(message: S) -> Self {
        Error::Node {
            code: 0,
            message: message.into(),
        }
    }
}
