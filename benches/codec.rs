use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polycodec::{
    from_slice, reflect_struct, to_vec, CborHandle, Handle, JsonHandle, Options, SimpleHandle,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
struct Product {
    sku: String,
    name: String,
    price: f64,
    quantity: u32,
}

reflect_struct!(Product {
    sku codec = "sku",
    name codec = "name",
    price codec = "price",
    quantity codec = "quantity",
});

fn products(n: u32) -> Vec<Product> {
    (0..n)
        .map(|i| Product {
            sku: format!("SKU{}", i),
            name: format!("Product {}", i),
            price: 9.99 + f64::from(i),
            quantity: i,
        })
        .collect()
}

fn bench_format<H: Handle>(c: &mut Criterion, handle: &H) {
    let mut group = c.benchmark_group(format!("{}_products", handle.name()));
    for size in [10_u32, 100, 500] {
        let data = products(size);
        let bytes = to_vec(handle, &data).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), &data, |b, data| {
            b.iter(|| to_vec(handle, black_box(data)))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| from_slice::<Vec<Product>>(handle, black_box(bytes)))
        });
    }
    group.finish();
}

fn benchmark_formats(c: &mut Criterion) {
    bench_format(c, &JsonHandle::new());
    bench_format(c, &CborHandle::new());
    bench_format(c, &SimpleHandle::new());
}

fn benchmark_fast_path(c: &mut Criterion) {
    let handle = CborHandle::new();
    let mut group = c.benchmark_group("fast_path");

    // Vec<i64> has a specialized routine, Vec<Option<i64>> goes through the
    // generic engine.
    let fast: Vec<i64> = (0..1000).collect();
    let generic: Vec<Option<i64>> = fast.iter().copied().map(Some).collect();
    let fast_bytes = to_vec(&handle, &fast).unwrap();

    group.bench_function("encode_specialized", |b| b.iter(|| to_vec(&handle, black_box(&fast))));
    group.bench_function("encode_generic", |b| b.iter(|| to_vec(&handle, black_box(&generic))));
    group.bench_function("decode_specialized", |b| {
        b.iter(|| from_slice::<Vec<i64>>(&handle, black_box(&fast_bytes)))
    });
    group.bench_function("decode_generic", |b| {
        b.iter(|| from_slice::<Vec<Option<i64>>>(&handle, black_box(&fast_bytes)))
    });
    group.finish();
}

fn benchmark_canonical_maps(c: &mut Criterion) {
    let map: HashMap<String, u64> = (0..256).map(|i| (format!("key{}", i), i)).collect();
    let plain = SimpleHandle::new();
    let canonical = SimpleHandle::new().with_options(Options::new().with_canonical(true));

    let mut group = c.benchmark_group("map_256");
    group.bench_function("unordered", |b| b.iter(|| to_vec(&plain, black_box(&map))));
    group.bench_function("canonical", |b| b.iter(|| to_vec(&canonical, black_box(&map))));
    group.finish();
}

fn benchmark_comparison_with_serde_json(c: &mut Criterion) {
    let data = products(100);
    let handle = JsonHandle::new();
    let mut group = c.benchmark_group("comparison");

    group.bench_function("polycodec_encode", |b| b.iter(|| to_vec(&handle, black_box(&data))));
    group.bench_function("serde_json_encode", |b| {
        b.iter(|| serde_json::to_vec(black_box(&data)))
    });

    let bytes = serde_json::to_vec(&data).unwrap();
    group.bench_function("polycodec_decode", |b| {
        b.iter(|| from_slice::<Vec<Product>>(&handle, black_box(&bytes)))
    });
    group.bench_function("serde_json_decode", |b| {
        b.iter(|| serde_json::from_slice::<Vec<Product>>(black_box(&bytes)))
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_formats,
    benchmark_fast_path,
    benchmark_canonical_maps,
    benchmark_comparison_with_serde_json
);
criterion_main!(benches);
