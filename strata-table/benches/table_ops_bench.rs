//! Table operation benchmarks: construction, sort, select and index
//! lookups.
//!
//! What it measures
//! - Validated construction of a 3-column table (float, string, int).
//! - Stable two-key sort.
//! - Equality selection versus an index lookup for the same key.
//!
//! Run:
//!   cargo bench --bench table_ops_bench

#![forbid(unsafe_code)]

use std::hint::black_box;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata_expr::{ge, is_in};
use strata_table::{Column, SchemaBuilder, SortKey, StringIndex, Table, TableSchema};

const ROW_COUNTS: &[usize] = &[10_000, 100_000];
const DISTINCT_KEYS: usize = 256;

fn schema() -> Arc<TableSchema> {
    SchemaBuilder::new("Bench")
        .column(Column::float64("value").with_validator(ge(0.0)))
        .column(Column::utf8("key"))
        .column(Column::int64("bucket").with_validator(is_in(0..16i64)))
        .build()
        .expect("valid definition")
}

fn columns(rows: usize) -> (ArrayRef, ArrayRef, ArrayRef) {
    let mut rng = StdRng::seed_from_u64(42);
    let values = Float64Array::from_iter_values((0..rows).map(|_| rng.random_range(0.0..1000.0)));
    let keys: StringArray = (0..rows)
        .map(|_| Some(format!("key-{}", rng.random_range(0..DISTINCT_KEYS))))
        .collect();
    let buckets = Int64Array::from_iter_values((0..rows).map(|_| rng.random_range(0..16i64)));
    (Arc::new(values), Arc::new(keys), Arc::new(buckets))
}

fn build(schema: &Arc<TableSchema>, rows: usize) -> Table {
    let (values, keys, buckets) = columns(rows);
    schema
        .builder()
        .column("value", values)
        .column("key", keys)
        .column("bucket", buckets)
        .finish()
        .expect("construct")
}

fn bench_construct(c: &mut Criterion) {
    let schema = schema();
    let mut group = c.benchmark_group("construct");
    for &rows in ROW_COUNTS {
        let (values, keys, buckets) = columns(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| {
                let table = schema
                    .builder()
                    .column("value", Arc::clone(&values))
                    .column("key", Arc::clone(&keys))
                    .column("bucket", Arc::clone(&buckets))
                    .finish()
                    .expect("construct");
                black_box(table.num_rows())
            });
        });
    }
    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let schema = schema();
    let mut group = c.benchmark_group("sort_by");
    for &rows in ROW_COUNTS {
        let table = build(&schema, rows);
        let keys = [SortKey::asc("bucket"), SortKey::desc("value")];
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, table| {
            b.iter(|| black_box(table.sort_by(&keys).expect("sort").num_rows()));
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let schema = schema();
    let mut group = c.benchmark_group("point_lookup");
    for &rows in ROW_COUNTS {
        let table = build(&schema, rows);
        let index = StringIndex::new(&table, "key").expect("index");
        group.bench_with_input(BenchmarkId::new("select", rows), &table, |b, table| {
            b.iter(|| black_box(table.select("key", "key-7").expect("select").num_rows()));
        });
        group.bench_with_input(BenchmarkId::new("index", rows), &index, |b, index| {
            b.iter(|| {
                black_box(
                    index
                        .lookup("key-7")
                        .expect("lookup")
                        .map_or(0, |t| t.num_rows()),
                )
            });
        });
        group.bench_with_input(BenchmarkId::new("build_index", rows), &table, |b, table| {
            b.iter(|| black_box(StringIndex::new(table, "key").expect("index").len()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_construct, bench_sort, bench_lookup);
criterion_main!(benches);
