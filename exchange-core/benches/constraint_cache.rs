use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exchange_common::data::{ConstraintTable, PairConstraint, Registry};
use exchange_core::exchange::{BittrexApi, Credentials, Exchange, ExchangeAdapter};
use std::sync::Arc;
use std::time::Duration;

fn pair_constraint(id: u32) -> PairConstraint {
    PairConstraint {
        pair_id: id,
        ex_symbol: format!("BTC-C{}", id),
        taker_fee: 0.0025,
        maker_fee: 0.0015,
        lot_size: 0.001,
        price_filter: 0.00000001,
    }
}

fn filled_table(size: u32) -> ConstraintTable<PairConstraint> {
    let table: ConstraintTable<PairConstraint> = ConstraintTable::new();
    for id in 0..size {
        table.set(pair_constraint(id));
    }
    table
}

fn bench_single_set(c: &mut Criterion) {
    let table: ConstraintTable<PairConstraint> = ConstraintTable::new();
    let record = pair_constraint(7);

    c.bench_function("single_set", |b| {
        b.iter(|| {
            table.set(black_box(record.clone()));
        });
    });
}

fn bench_replace_all(c: &mut Criterion) {
    let table: ConstraintTable<PairConstraint> = ConstraintTable::new();

    let mut group = c.benchmark_group("replace_all");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(10));

    for size in [10u32, 100, 1000].iter() {
        let records: Vec<PairConstraint> = (0..*size).map(pair_constraint).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| {
                table.replace_all(black_box(records.clone()));
            });
        });
    }
    group.finish();
}

fn bench_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookups");
    group.sample_size(100);

    for size in [100u32, 1000].iter() {
        let table = filled_table(*size);
        let last_symbol = format!("BTC-C{}", size - 1);

        group.bench_with_input(BenchmarkId::new("get", size), size, |b, &size| {
            b.iter(|| black_box(table.get(size / 2)));
        });
        group.bench_with_input(BenchmarkId::new("ids_sorted", size), size, |b, _| {
            b.iter(|| black_box(table.ids_sorted()));
        });
        // Worst case for the linear scan
        group.bench_with_input(BenchmarkId::new("find_by_symbol", size), size, |b, _| {
            b.iter(|| black_box(table.find_by_symbol(&last_symbol)));
        });
    }
    group.finish();
}

fn bench_concurrent_operations(c: &mut Criterion) {
    use std::thread;

    let table = Arc::new(filled_table(100));

    let mut group = c.benchmark_group("concurrent_operations");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("concurrent_read_write", |b| {
        b.iter(|| {
            let writer = Arc::clone(&table);
            let write_thread = thread::spawn(move || {
                for id in 0..100 {
                    writer.set(pair_constraint(id));
                }
            });

            let reader = Arc::clone(&table);
            let read_thread = thread::spawn(move || {
                for id in 0..100 {
                    black_box(reader.get(id));
                }
            });

            write_thread.join().unwrap();
            read_thread.join().unwrap();
        });
    });

    group.finish();
}

fn bench_derived_accessors(c: &mut Criterion) {
    let registry = Arc::new(
        Registry::builder()
            .coin(1, "BTC")
            .coin(2, "ETH")
            .pair(10, "BTC", "ETH")
            .unwrap()
            .build(),
    );
    let adapter = ExchangeAdapter::new(
        Arc::new(BittrexApi::new()),
        registry.clone(),
        Credentials::default(),
        None,
    );
    adapter.set_pair_constraint(pair_constraint(10));
    let pair = registry.pair(10).unwrap().clone();

    c.bench_function("derived_accessors", |b| {
        b.iter(|| {
            black_box(adapter.get_fee(&pair).unwrap());
            black_box(adapter.get_lot_size(&pair).unwrap());
            black_box(adapter.symbol_for_pair(&pair));
        });
    });
}

criterion_group!(
    benches,
    bench_single_set,
    bench_replace_all,
    bench_lookups,
    bench_concurrent_operations,
    bench_derived_accessors
);
criterion_main!(benches);
