//! Query Execution Performance Benchmarks
//!
//! Benchmarks for the data-access paths behind `/api/query/execute` and the
//! row endpoints:
//! - Simple SELECT queries
//! - Queries with WHERE clauses
//! - Parameterized inserts through the row mutator
//! - Paged reads
//! - Large result set handling

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::Arc;

use sqldesk::{PageRequest, PaginationEngine, QueryExecutor, RowMutator, RowRecord, Store};

fn store_with_users(rows: usize) -> Arc<Store> {
    let store = Arc::new(Store::open_in_memory().expect("Failed to open store"));
    let executor = QueryExecutor::new(Arc::clone(&store));
    executor
        .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
        .expect("Failed to create table");
    executor
        .execute(&format!(
            "INSERT INTO users (name, age)
             WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {rows})
             SELECT 'User ' || i, i % 90 FROM n"
        ))
        .expect("Failed to insert");
    store
}

fn bench_simple_select(c: &mut Criterion) {
    let executor = QueryExecutor::new(store_with_users(100));

    c.bench_function("select_all", |b| {
        b.iter(|| executor.execute(black_box("SELECT * FROM users")).expect("query"));
    });
}

fn bench_filtered_select(c: &mut Criterion) {
    let executor = QueryExecutor::new(store_with_users(1000));

    c.bench_function("select_where", |b| {
        b.iter(|| executor.execute(black_box("SELECT name FROM users WHERE age > 50")).expect("query"));
    });
}

fn bench_insert_row(c: &mut Criterion) {
    let mutator = RowMutator::new(store_with_users(0));
    let values = RowRecord::new().with("name", json!("Bench User")).with("age", json!(30));

    c.bench_function("insert_row", |b| {
        b.iter(|| mutator.insert_row(black_box("users"), black_box(&values)).expect("insert"));
    });
}

fn bench_page(c: &mut Criterion) {
    let pages = PaginationEngine::new(store_with_users(10_000));

    c.bench_function("page_offset_5000", |b| {
        b.iter(|| pages.page(black_box("users"), PageRequest::new(Some(100), Some(5000))).expect("page"));
    });
}

fn bench_large_result_set(c: &mut Criterion) {
    let executor = QueryExecutor::new(store_with_users(10_000));

    c.bench_function("select_10k_rows", |b| {
        b.iter(|| executor.execute(black_box("SELECT * FROM users")).expect("query"));
    });
}

criterion_group!(
    benches,
    bench_simple_select,
    bench_filtered_select,
    bench_insert_row,
    bench_page,
    bench_large_result_set
);
criterion_main!(benches);
