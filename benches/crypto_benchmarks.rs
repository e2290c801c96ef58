use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use onions_core::hashers::pow_value;
use onions_core::{verify_proof, Config, MerkleTree, Record, RecordKeys, RecordType, ScryptCost, Subdomain};
use rand_core::OsRng;

fn leaves(n: usize) -> Vec<(String, [u8; 32])> {
    (0..n)
        .map(|i| (format!("name{i:06}.tor"), onions_primitives::sha256(&i.to_le_bytes())))
        .collect()
}

fn bench_merkle_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_build");
    for n in [16usize, 1024, 16_384] {
        let input = leaves(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| MerkleTree::from_leaves(black_box(input.clone())));
        });
    }
    group.finish();
}

fn bench_merkle_proofs(c: &mut Criterion) {
    let tree = MerkleTree::from_leaves(leaves(16_384));
    let root = tree.root();
    let present = "name008192.tor";
    let absent = "name008192a.tor";

    c.bench_function("merkle_inclusion_proof", |b| {
        b.iter(|| tree.proof_for(black_box(present)));
    });

    let inclusion = tree.proof_for(present);
    c.bench_function("merkle_inclusion_verify", |b| {
        b.iter(|| verify_proof(black_box(&root), black_box(&inclusion), present, None));
    });

    let absence = tree.proof_for(absent);
    c.bench_function("merkle_absence_verify", |b| {
        b.iter(|| verify_proof(black_box(&root), black_box(&absence), absent, None));
    });
}

fn bench_pow(c: &mut Criterion) {
    let scope = [0x5Au8; 200];
    let mut group = c.benchmark_group("pow_value");
    group.sample_size(10);
    for log_n in [10u8, 14] {
        let cost = ScryptCost { log_n, ..ScryptCost::default() };
        group.bench_with_input(BenchmarkId::from_parameter(log_n), &cost, |b, cost| {
            b.iter(|| pow_value(black_box(&scope), cost));
        });
    }
    group.finish();
}

fn bench_validity(c: &mut Criterion) {
    let keys = RecordKeys::generate(&mut OsRng).expect("keys");
    let cfg = Config { difficulty: 2, scrypt: ScryptCost { log_n: 10, r: 8, p: 1 }, workers: 1 };
    let mut record = Record::new_draft(
        RecordType::Record,
        "example.tor",
        "AD97364FC20BEC80",
        vec![Subdomain::new("www", "abcdefghijklmnop.onion")],
        0,
        0,
    );
    record.assign_keys(&keys).expect("assign");
    record.make_valid_default(&keys, &cfg).expect("mine");

    c.bench_function("record_check_validity", |b| {
        b.iter(|| black_box(&record).check_validity(&cfg));
    });
}

criterion_group!(benches, bench_merkle_build, bench_merkle_proofs, bench_pow, bench_validity);
criterion_main!(benches);
