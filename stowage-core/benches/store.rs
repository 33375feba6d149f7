use std::hint::black_box;
use std::io::Read;

use criterion::{Criterion, criterion_group, criterion_main};
use stowage_core::{FileStore, PutOptions, StoreConfig};

fn bench_put_forced(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(StoreConfig::with_base_dir(temp_dir.path()));
    let payload = vec![0x5a; 64 * 1024];

    c.bench_function("put_forced_64k", |b| {
        b.iter(|| {
            runtime
                .block_on(store.put(
                    "bench",
                    "blob.bin",
                    payload.clone(),
                    PutOptions::forced(),
                ))
                .unwrap()
        });
    });
}

fn bench_get_staged(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(StoreConfig::with_base_dir(temp_dir.path()));

    // A rejected put leaves its bytes staged, which keeps reads in memory
    runtime
        .block_on(store.put("bench", "doc.txt", &b"v1"[..], PutOptions::default()))
        .unwrap();
    let _ = runtime.block_on(store.put(
        "bench",
        "doc.txt",
        vec![0x5a; 64 * 1024],
        PutOptions::default(),
    ));

    c.bench_function("get_staged_64k", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(64 * 1024);
            store
                .get_blocking("bench", "doc.txt")
                .unwrap()
                .read_to_end(&mut out)
                .unwrap();
            black_box(out)
        });
    });
}

criterion_group!(benches, bench_put_forced, bench_get_staged);
criterion_main!(benches);
