//! # Codec Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | JSON envelope | encode + decode of one call |
//! | Fragment | chunking + reassembly across payload sizes |
//! | Relay batch | batch encode + decode with pending packets |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rpc_types::{
    decode_fragment, decode_json, encode_fragments, encode_json, Envelope, FragmentAssembler,
    RelayBatch, RelayPacket,
};
use serde_json::json;

fn envelope(payload_len: usize) -> Envelope {
    Envelope::builder("set_pref", "..")
        .callback_id(7)
        .arg(json!("height"))
        .arg(json!("x".repeat(payload_len)))
        .auth_token(Some("7154637291".to_string()))
        .build()
}

// ============================================================================
// JSON envelope
// ============================================================================

fn bench_json_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("json-envelope");
    let call = envelope(64);

    group.bench_function("encode", |b| b.iter(|| black_box(encode_json(&call))));

    let wire = encode_json(&call).expect("encodes");
    group.bench_function("decode", |b| b.iter(|| black_box(decode_json(&wire))));
    group.finish();
}

// ============================================================================
// Fragment chunking
// ============================================================================

fn bench_fragment_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragment");

    for size in [100, 2_000, 20_000] {
        let call = envelope(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("chunk_and_reassemble", size), &call, |b, call| {
            b.iter(|| {
                let fragments = encode_fragments("g1", "..", 1, call, 2_000).expect("encodes");
                let mut assembler = FragmentAssembler::new();
                let mut done = None;
                for fragment in &fragments {
                    let packet = decode_fragment(fragment).expect("decodes");
                    done = assembler.accept(packet).expect("accepts");
                }
                black_box(done)
            })
        });
    }
    group.finish();
}

// ============================================================================
// Relay batches
// ============================================================================

fn bench_relay_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("relay-batch");
    let data = encode_json(&envelope(64)).expect("encodes");

    for pending in [1u64, 10, 50] {
        let batch = RelayBatch {
            ack: 3,
            packets: (1..=pending)
                .map(|seq| RelayPacket {
                    seq,
                    data: data.clone(),
                })
                .collect(),
        };
        group.throughput(Throughput::Elements(pending));
        group.bench_with_input(BenchmarkId::new("encode_decode", pending), &batch, |b, batch| {
            b.iter(|| {
                let contents = batch.encode().expect("encodes");
                black_box(RelayBatch::decode(&contents))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_json_envelope,
    bench_fragment_round_trip,
    bench_relay_batch
);
criterion_main!(benches);
