use criterion::{criterion_group, criterion_main, Criterion};

use tangle_client::curl::Curl;
use tangle_client::kerl::Kerl;
use tangle_client::trinary::{Trits, HASH_TRITS};

const TX_TRITS: usize = 8019;

fn curl_transaction_hash(c: &mut Criterion) {
    let trits = Trits::zero(TX_TRITS);
    c.bench_function("curl_transaction_hash", |b| {
        b.iter(|| {
            let mut curl = Curl::new();
            curl.absorb(&trits);
            curl.squeeze(HASH_TRITS)
        })
    });
}

fn kerl_hash_block(c: &mut Criterion) {
    let trits = Trits::zero(HASH_TRITS);
    c.bench_function("kerl_hash_block", |b| {
        b.iter(|| {
            let mut kerl = Kerl::new();
            kerl.absorb(&trits).unwrap();
            kerl.squeeze(HASH_TRITS).unwrap()
        })
    });
}

criterion_group!(benches, curl_transaction_hash, kerl_hash_block);
criterion_main!(benches);
