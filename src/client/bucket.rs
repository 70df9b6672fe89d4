//! An in-memory [`NodeClient`]: transactions land in a bucket, balances
//! come from a table. Backs the test suite and documents the contract
//! without a network.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::bundle::attach;
use crate::curl;
use crate::errors::Result;
use crate::pow::PowConfig;
use crate::signing::Address;
use crate::transaction::Transaction;
use crate::trinary::Trytes;

use super::{FindTransactionsQuery, NodeClient};

#[derive(Default)]
struct Bucket {
    transactions: Vec<(Trytes, Transaction)>,
    balances: HashMap<Address, i64>,
}

/// In-memory node. Tip selection hands out the hashes of the latest
/// stored transactions (or the empty hash on an empty bucket), and
/// every known transaction counts as included.
#[derive(Default)]
pub struct BucketNode {
    bucket: Mutex<Bucket>,
}

impl BucketNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance, consumed by `get_balances`.
    pub fn with_balance(self, address: Address, value: i64) -> Self {
        self.lock().balances.insert(address, value);
        self
    }

    /// Snapshot of every stored transaction.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.iter().map(|(_, tx)| tx.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, transactions: &[Transaction]) -> Result<()> {
        let mut bucket = self.lock();
        for tx in transactions {
            let hash = tx.hash()?;
            if !bucket.transactions.iter().any(|(h, _)| *h == hash) {
                bucket.transactions.push((hash, tx.clone()));
            }
        }
        Ok(())
    }
}

impl NodeClient for BucketNode {
    fn get_tips_pair(
        &self,
        _depth: usize,
        reference: Option<&Trytes>,
    ) -> Result<(Trytes, Trytes)> {
        let bucket = self.lock();
        let mut latest = bucket
            .transactions
            .iter()
            .rev()
            .map(|(hash, _)| hash.clone());
        let trunk = reference
            .cloned()
            .or_else(|| latest.next())
            .unwrap_or_else(curl::empty_hash);
        let branch = latest.next().unwrap_or_else(|| trunk.clone());
        Ok((trunk, branch))
    }

    fn attach_to_tangle(
        &self,
        trunk: &Trytes,
        branch: &Trytes,
        mwm: usize,
        transactions: &[Transaction],
    ) -> Result<Vec<Transaction>> {
        let mut attached = transactions.to_vec();
        attach(trunk, branch, &mut attached, mwm, &PowConfig::default())?;
        Ok(attached)
    }

    fn broadcast_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        self.insert(transactions)
    }

    fn store_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        self.insert(transactions)
    }

    fn get_balances(&self, addresses: &[Address], _threshold: u8) -> Result<Vec<i64>> {
        let bucket = self.lock();
        Ok(addresses
            .iter()
            .map(|address| bucket.balances.get(address).copied().unwrap_or(0))
            .collect())
    }

    fn find_transactions(&self, query: &FindTransactionsQuery) -> Result<Vec<Trytes>> {
        let bucket = self.lock();
        Ok(bucket
            .transactions
            .iter()
            .filter(|(_, tx)| {
                query.addresses.contains(&tx.address)
                    || query.bundles.contains(&tx.bundle)
                    || query.tags.contains(&tx.tag)
                    || query.approvees.contains(&tx.trunk_transaction)
                    || query.approvees.contains(&tx.branch_transaction)
            })
            .map(|(hash, _)| hash.clone())
            .collect())
    }

    fn get_trytes(&self, hashes: &[Trytes]) -> Result<Vec<Transaction>> {
        let bucket = self.lock();
        Ok(hashes
            .iter()
            .filter_map(|wanted| {
                bucket
                    .transactions
                    .iter()
                    .find(|(hash, _)| hash == wanted)
                    .map(|(_, tx)| tx.clone())
            })
            .collect())
    }

    fn get_inclusion_states(
        &self,
        transactions: &[Trytes],
        _tips: &[Trytes],
    ) -> Result<Vec<bool>> {
        let bucket = self.lock();
        Ok(transactions
            .iter()
            .map(|wanted| bucket.transactions.iter().any(|(hash, _)| hash == wanted))
            .collect())
    }

    fn were_addresses_spent_from(&self, addresses: &[Address]) -> Result<Vec<bool>> {
        let bucket = self.lock();
        Ok(addresses
            .iter()
            .map(|address| {
                bucket
                    .transactions
                    .iter()
                    .any(|(_, tx)| tx.address == *address && tx.value < 0)
            })
            .collect())
    }

    fn check_consistency(&self, tails: &[Trytes]) -> Result<(bool, String)> {
        let bucket = self.lock();
        let all_known = tails
            .iter()
            .all(|wanted| bucket.transactions.iter().any(|(hash, _)| hash == wanted));
        if all_known {
            Ok((true, String::new()))
        } else {
            Ok((false, "tail not found".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use crate::trinary::Trytes;

    fn address() -> Address {
        "RGVOWCDJAGSO9TNLBBPUVYE9KHBOAZNVFRVKVYYCHRKQRKRNKGGWBF9WCRJVROKLVKWZUMBABVJGAALWU"
            .parse()
            .unwrap()
    }

    fn stored_transaction() -> Transaction {
        let mut bundle = Bundle::new();
        bundle.add_entry(1, address(), 0, 1_544_207_541, &Trytes::default());
        bundle.finalize(&[]).unwrap();
        bundle.into_transactions().remove(0)
    }

    #[test]
    fn balances_default_to_zero() {
        let node = BucketNode::new().with_balance(address(), 25);
        let other: Address = Address::from_trytes(&Trytes::nines(81)).unwrap();
        assert_eq!(
            node.get_balances(&[address(), other], 100).unwrap(),
            vec![25, 0]
        );
    }

    #[test]
    fn stored_transactions_are_findable() {
        let node = BucketNode::new();
        let tx = stored_transaction();
        node.store_transactions(std::slice::from_ref(&tx)).unwrap();

        let hashes = node
            .find_transactions(&FindTransactionsQuery::addresses(vec![address()]))
            .unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0], tx.hash().unwrap());

        let fetched = node.get_trytes(&hashes).unwrap();
        assert_eq!(fetched, vec![tx]);
    }

    #[test]
    fn inclusion_follows_storage() {
        let node = BucketNode::new();
        let tx = stored_transaction();
        let hash = tx.hash().unwrap();
        assert_eq!(
            node.get_inclusion_states(std::slice::from_ref(&hash), &[])
                .unwrap(),
            vec![false]
        );
        node.broadcast_transactions(std::slice::from_ref(&tx)).unwrap();
        assert_eq!(
            node.get_inclusion_states(std::slice::from_ref(&hash), &[])
                .unwrap(),
            vec![true]
        );
    }

    #[test]
    fn tips_fall_back_to_empty_hash() {
        let node = BucketNode::new();
        let (trunk, branch) = node.get_tips_pair(3, None).unwrap();
        assert_eq!(trunk, curl::empty_hash());
        assert_eq!(branch, curl::empty_hash());
    }

    #[test]
    fn spent_addresses_are_tracked() {
        let node = BucketNode::new();
        let mut tx = stored_transaction();
        assert_eq!(
            node.were_addresses_spent_from(&[address()]).unwrap(),
            vec![false]
        );
        tx.value = -1;
        tx.bundle = curl::empty_hash();
        node.store_transactions(&[tx]).unwrap();
        assert_eq!(
            node.were_addresses_spent_from(&[address()]).unwrap(),
            vec![true]
        );
    }
}
