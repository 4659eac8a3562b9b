use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use memolru::{Args, Error, LruStore, Memo, Value};

fn int_arg(args: &Args) -> i64 {
    match args.args() {
        [Value::Int(n), ..] => *n,
        _ => 0,
    }
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_hit", |b| {
        let mut store = LruStore::new(1000).unwrap();
        for i in 0..1000u64 {
            store.put(i, i);
        }

        let mut counter = 0u64;
        b.iter(|| {
            black_box(store.get(&(counter % 1000)));
            counter += 1;
        });
    });

    group.bench_function("put_evict", |b| {
        let mut store = LruStore::new(100).unwrap();
        let mut counter = 0u64;
        b.iter(|| {
            black_box(store.put(counter, counter));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_memo(c: &mut Criterion) {
    let mut group = c.benchmark_group("memo");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("call_hit", |b| {
        let memo = Memo::new(|args: &Args| Ok::<_, Error>(int_arg(args) * 2), 1000).unwrap();
        for i in 0..100i64 {
            memo.call(&Args::new().arg(i)).unwrap();
        }

        let mut counter = 0i64;
        b.iter(|| {
            black_box(memo.call(&Args::new().arg(counter % 100)).unwrap());
            counter += 1;
        });
    });

    group.bench_function("call_miss", |b| {
        // Small cache, cycling keys: every call misses and evicts.
        let memo = Memo::new(|args: &Args| Ok::<_, Error>(int_arg(args) * 2), 10).unwrap();

        let mut counter = 0i64;
        b.iter(|| {
            black_box(memo.call(&Args::new().arg(counter % 100)).unwrap());
            counter += 1;
        });
    });

    group.bench_function("fingerprint_kwargs", |b| {
        let args = Args::new()
            .arg("path/to/file.json")
            .kwarg("encoding", "utf-8")
            .kwarg("strict", true)
            .kwarg("depth", 4);
        b.iter(|| black_box(args.fingerprint().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_store, bench_memo);
criterion_main!(benches);
