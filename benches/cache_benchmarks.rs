use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use order_core::cache::LruCache;
use order_core::models::Order;
use uuid::Uuid;

fn benchmark_cache_put_get(c: &mut Criterion) {
    let cache: LruCache<u64, String> = LruCache::new(10_000, "bench").unwrap();
    for i in 0..10_000u64 {
        cache.put(i, format!("value-{i}"), Duration::ZERO);
    }

    c.bench_function("cache_hit", |b| {
        let mut key = 0u64;
        b.iter(|| {
            key = (key + 7) % 10_000;
            black_box(cache.get(&key))
        })
    });

    c.bench_function("cache_put_with_eviction", |b| {
        let mut key = 10_000u64;
        b.iter(|| {
            key += 1;
            cache.put(black_box(key), "value".to_string(), Duration::ZERO);
        })
    });
}

fn benchmark_order_decode(c: &mut Criterion) {
    let payload = serde_json::json!({
        "order_uid": Uuid::new_v4(),
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@wb.ru"
        },
        "payment": {
            "transaction": Uuid::new_v4(),
            "request_id": Uuid::nil(),
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [{
            "chrt_id": 9934930,
            "track_number": "WBILMTESTTRACK",
            "price": 453,
            "rid": Uuid::new_v4(),
            "name": "Mascaras",
            "sale": 30,
            "size": "0",
            "total_price": 317,
            "nm_id": 2389212,
            "brand": "Vivienne Sabo",
            "status": 202
        }],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    })
    .to_string();

    c.bench_function("order_json_decode", |b| {
        b.iter(|| {
            let order: Order = serde_json::from_str(black_box(&payload)).unwrap();
            black_box(order)
        })
    });
}

criterion_group!(benches, benchmark_cache_put_get, benchmark_order_decode);
criterion_main!(benches);
