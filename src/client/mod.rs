//! The node boundary and the high-level operations built on it.
//!
//! [`NodeClient`] is the set of logical operations the core consumes
//! from a remote node; any transport can implement it. The functions in
//! this module assemble transfers, gather inputs and drive attachment
//! against whichever client they are handed. [`BucketNode`] is the
//! in-memory implementation backing the tests.

pub mod bucket;

pub use bucket::BucketNode;

use std::thread;

use log::debug;

use crate::bundle::{attach, create_bundle, unix_timestamp, AddressInfo, Bundle, Transfer};
use crate::errors::{Error, Result};
use crate::pow::PowConfig;
use crate::signing::{self, Address, SecurityLevel};
use crate::transaction::Transaction;
use crate::trinary::Trytes;

/// Upper bound on one input-gathering sweep.
const MAX_INPUT_SWEEP: u32 = 500;

/// Query for `find_transactions`: any non-empty field filters.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FindTransactionsQuery {
    pub bundles: Vec<Trytes>,
    pub addresses: Vec<Address>,
    pub tags: Vec<Trytes>,
    pub approvees: Vec<Trytes>,
}

impl FindTransactionsQuery {
    pub fn addresses(addresses: Vec<Address>) -> Self {
        FindTransactionsQuery {
            addresses,
            ..Self::default()
        }
    }
}

/// The balance found at one derived address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Balance {
    pub address: Address,
    pub value: i64,
    pub index: u32,
}

/// Sum of a list of balances.
pub fn total_balance(balances: &[Balance]) -> i64 {
    balances.iter().map(|b| b.value).sum()
}

/// The logical node operations the core consumes. Request/response
/// only, no streaming; failures surface as [`Error::Node`].
pub trait NodeClient {
    /// Two tip transactions to approve.
    fn get_tips_pair(&self, depth: usize, reference: Option<&Trytes>)
        -> Result<(Trytes, Trytes)>;

    /// Remote attachment, used only when local proof of work is
    /// disabled.
    fn attach_to_tangle(
        &self,
        trunk: &Trytes,
        branch: &Trytes,
        mwm: usize,
        transactions: &[Transaction],
    ) -> Result<Vec<Transaction>>;

    fn broadcast_transactions(&self, transactions: &[Transaction]) -> Result<()>;

    fn store_transactions(&self, transactions: &[Transaction]) -> Result<()>;

    fn get_balances(&self, addresses: &[Address], threshold: u8) -> Result<Vec<i64>>;

    fn find_transactions(&self, query: &FindTransactionsQuery) -> Result<Vec<Trytes>>;

    fn get_trytes(&self, hashes: &[Trytes]) -> Result<Vec<Transaction>>;

    fn get_inclusion_states(&self, transactions: &[Trytes], tips: &[Trytes])
        -> Result<Vec<bool>>;

    fn were_addresses_spent_from(&self, addresses: &[Address]) -> Result<Vec<bool>>;

    fn check_consistency(&self, tails: &[Trytes]) -> Result<(bool, String)>;
}

/// Derive addresses until one with no transactions is found. Returns
/// the first unused address and all used ones before it.
pub fn get_used_address<C: NodeClient>(
    client: &C,
    seed: &Trytes,
    security: SecurityLevel,
) -> Result<(Address, Vec<Address>)> {
    let mut used = Vec::new();
    let mut index = 0u32;
    loop {
        let address = signing::new_address(seed, index, security)?;
        let hashes =
            client.find_transactions(&FindTransactionsQuery::addresses(vec![address.clone()]))?;
        if hashes.is_empty() {
            return Ok((address, used));
        }
        used.push(address);
        index += 1;
    }
}

/// Positive balances of the addresses in `[start, end)`. With `end` of
/// zero, sweeps from index 0 up to the first unused address instead.
pub fn get_inputs<C: NodeClient>(
    client: &C,
    seed: &Trytes,
    start: u32,
    end: u32,
    security: SecurityLevel,
) -> Result<Vec<Balance>> {
    let addresses = if end > 0 {
        if start > end || end > start + MAX_INPUT_SWEEP {
            return Err(Error::InvalidAddressStartEnd { start, end });
        }
        signing::new_addresses(seed, start, end - start, security)?
    } else {
        let (_, used) = get_used_address(client, seed, security)?;
        used
    };
    balances_of(client, &addresses, start)
}

fn balances_of<C: NodeClient>(
    client: &C,
    addresses: &[Address],
    start: u32,
) -> Result<Vec<Balance>> {
    let values = client.get_balances(addresses, 100)?;
    Ok(addresses
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(_, (_, value))| *value > 0)
        .map(|(i, (address, value))| Balance {
            address: address.clone(),
            value,
            index: start + i as u32,
        })
        .collect())
}

/// Resolve the inputs for a transfer of `total`: either validate the
/// caller's address infos against the node, or sweep the seed's
/// addresses for enough balance.
fn setup_inputs<C: NodeClient>(
    client: &C,
    seed: &Trytes,
    inputs: Option<&[AddressInfo]>,
    security: SecurityLevel,
    total: i64,
) -> Result<(Vec<Balance>, Vec<AddressInfo>)> {
    let (balances, infos) = match inputs {
        Some(infos) => {
            let addresses = infos
                .iter()
                .map(|info| info.address())
                .collect::<Result<Vec<_>>>()?;
            let mut balances = balances_of(client, &addresses, 0)?;
            // keep balance indices aligned with the caller's infos
            for balance in &mut balances {
                balance.index = infos[balance.index as usize].index;
            }
            (balances, infos.to_vec())
        }
        None => {
            let balances = get_inputs(client, seed, 0, 100, security)?;
            let infos = balances
                .iter()
                .map(|balance| AddressInfo {
                    seed: seed.clone(),
                    index: balance.index,
                    security,
                })
                .collect();
            (balances, infos)
        }
    };
    let available = total_balance(&balances);
    if total > available {
        return Err(Error::NotEnoughBalance {
            required: total,
            available,
        });
    }
    Ok((balances, infos))
}

/// Add input entries covering `total`, plus a remainder output when the
/// inputs overshoot. Without an explicit remainder address, a fresh
/// unused address of the seed receives the change.
fn add_remainder<C: NodeClient>(
    client: &C,
    balances: &[Balance],
    bundle: &mut Bundle,
    security: SecurityLevel,
    remainder: Option<Address>,
    seed: &Trytes,
    mut total: i64,
) -> Result<()> {
    let timestamp = unix_timestamp();
    for balance in balances {
        bundle.add_entry(
            security.fragments(),
            balance.address.clone(),
            -balance.value,
            timestamp,
            &Trytes::default(),
        );

        let remain = balance.value - total;
        if remain > 0 {
            let address = match remainder.clone() {
                Some(address) => address,
                None => get_used_address(client, seed, security)?.0,
            };
            bundle.add_entry(1, address, remain, timestamp, &Trytes::default());
            return Ok(());
        }
        total -= balance.value;
        if total == 0 {
            return Ok(());
        }
    }
    Ok(())
}

/// Build the bundle for a transfer: outputs, inputs, remainder,
/// finalization and input signatures.
pub fn prepare_transfers<C: NodeClient>(
    client: &C,
    seed: &Trytes,
    transfers: &[Transfer],
    inputs: Option<&[AddressInfo]>,
    remainder: Option<Address>,
    security: SecurityLevel,
) -> Result<Bundle> {
    let (mut bundle, fragments, total) = create_bundle(transfers, unix_timestamp())?;

    if total <= 0 {
        // nothing to fund, nothing to sign
        bundle.finalize(&fragments)?;
        return Ok(bundle);
    }

    let (balances, infos) = setup_inputs(client, seed, inputs, security, total)?;
    add_remainder(client, &balances, &mut bundle, security, remainder, seed, total)?;
    bundle.finalize(&fragments)?;
    bundle.sign_inputs(&infos)?;
    Ok(bundle)
}

fn attach_broadcast_store<C: NodeClient>(
    client: &C,
    trunk: &Trytes,
    branch: &Trytes,
    mut transactions: Vec<Transaction>,
    mwm: usize,
    pow: Option<&PowConfig>,
) -> Result<Vec<Transaction>> {
    debug!("attaching {} transactions", transactions.len());
    match pow {
        Some(config) => attach(trunk, branch, &mut transactions, mwm, config)?,
        None => transactions = client.attach_to_tangle(trunk, branch, mwm, &transactions)?,
    }
    client.broadcast_transactions(&transactions)?;
    client.store_transactions(&transactions)?;
    Ok(transactions)
}

/// Attach, broadcast and store a prepared list of transactions. With a
/// [`PowConfig`] the attachment runs locally; without one the node's
/// `attach_to_tangle` is used.
pub fn send_trytes<C: NodeClient>(
    client: &C,
    depth: usize,
    transactions: Vec<Transaction>,
    mwm: usize,
    pow: Option<&PowConfig>,
) -> Result<Vec<Transaction>> {
    let (trunk, branch) = client.get_tips_pair(depth, None)?;
    attach_broadcast_store(client, &trunk, &branch, transactions, mwm, pow)
}

/// Promote a tail transaction: check it is still consistent, then
/// attach the given transactions with the tail as tip reference.
pub fn promote<C: NodeClient>(
    client: &C,
    tail: &Trytes,
    depth: usize,
    transactions: Vec<Transaction>,
    mwm: usize,
    pow: Option<&PowConfig>,
) -> Result<Vec<Transaction>> {
    if transactions.is_empty() {
        return Err(Error::node("nothing to promote"));
    }
    let (consistent, info) = client.check_consistency(std::slice::from_ref(tail))?;
    if !consistent {
        return Err(Error::node(info));
    }
    let (trunk, branch) = client.get_tips_pair(depth, Some(tail))?;
    attach_broadcast_store(client, &trunk, &branch, transactions, mwm, pow)
}

/// Prepare and send a transfer in one call.
pub fn send<C: NodeClient>(
    client: &C,
    seed: &Trytes,
    security: SecurityLevel,
    depth: usize,
    transfers: &[Transfer],
    mwm: usize,
    pow: Option<&PowConfig>,
) -> Result<Bundle> {
    let bundle = prepare_transfers(client, seed, transfers, None, None, security)?;
    let transactions = send_trytes(client, depth, bundle.into_transactions(), mwm, pow)?;
    Ok(reassemble(transactions))
}

fn reassemble(transactions: Vec<Transaction>) -> Bundle {
    let mut bundle = Bundle::new();
    for tx in transactions {
        bundle.push(tx);
    }
    bundle
}

/// Inclusion states of the given transactions against the current
/// tips. The transaction lookup and the tip selection are independent
/// requests and run concurrently; results join positionally.
pub fn get_latest_inclusion<C: NodeClient + Sync>(
    client: &C,
    hashes: &[Trytes],
    depth: usize,
) -> Result<Vec<bool>> {
    let (transactions, tips) = thread::scope(|scope| {
        let lookup = scope.spawn(|| client.get_trytes(hashes));
        let tips = scope.spawn(|| client.get_tips_pair(depth, None));
        (join(lookup), join(tips))
    });
    let transactions = transactions?;
    let (trunk, _) = tips?;
    if transactions.is_empty() {
        return Err(Error::node("transactions not found"));
    }
    let states = client.get_inclusion_states(hashes, &[trunk])?;
    if states.is_empty() {
        return Err(Error::node("no inclusion states returned"));
    }
    Ok(states)
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(Error::node("node request panicked")),
    }
}

/// Re-broadcast a full bundle given its tail transaction hash, walking
/// the trunk chain to collect the rest.
pub fn broadcast_bundle<C: NodeClient>(client: &C, tail: &Trytes) -> Result<()> {
    let found = client.get_trytes(std::slice::from_ref(tail))?;
    let mut tx = match found.into_iter().next() {
        Some(tx) => tx,
        None => return Err(Error::node("tail transaction not found")),
    };
    if !tx.is_tail() {
        return Err(Error::InvalidCurrentIndex {
            at: 0,
            found: tx.current_index,
        });
    }
    let count = tx.last_index + 1;
    let mut transactions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let trunk = tx.trunk_transaction.clone();
        transactions.push(tx);
        if transactions.len() == count as usize {
            break;
        }
        let found = client.get_trytes(&[trunk])?;
        tx = match found.into_iter().next() {
            Some(tx) => tx,
            None => return Err(Error::node("bundle transaction not found")),
        };
    }
    client.broadcast_transactions(&transactions)
}
