use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};
use std::time::Duration;

use kitchen_cloud::services::{token_from_header, TokenService};

fn payload(fields: usize) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("email".to_string(), json!("chef@kitchen.io"));
    for i in 0..fields {
        payload.insert(format!("field_{}", i), json!(format!("value {}", i)));
    }
    payload
}

fn bench_issue(c: &mut Criterion) {
    let tokens = TokenService::new("benchmark-secret", 3600);

    let mut group = c.benchmark_group("token_issue");
    group.measurement_time(Duration::from_secs(5));

    for fields in [0, 10, 50].iter() {
        group.bench_with_input(BenchmarkId::new("extra_fields", fields), fields, |b, &n| {
            let body = payload(n);
            b.iter(|| black_box(tokens.issue(body.clone()).unwrap()));
        });
    }
    group.finish();
}

fn bench_verify(c: &mut Criterion) {
    let tokens = TokenService::new("benchmark-secret", 3600);

    let mut group = c.benchmark_group("token_verify");
    group.measurement_time(Duration::from_secs(5));

    for fields in [0, 10, 50].iter() {
        group.bench_with_input(BenchmarkId::new("extra_fields", fields), fields, |b, &n| {
            let token = tokens.issue(payload(n)).unwrap();
            let header = format!("Bearer {}", token);
            b.iter(|| {
                let token = token_from_header(Some(header.as_str())).unwrap();
                black_box(tokens.verify(token).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_issue, bench_verify);
criterion_main!(benches);
