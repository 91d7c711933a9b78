//! Wire codec benchmarks.
//!
//! Measures encoding and decoding of request and response payloads into a
//! region-sized buffer.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use shmdb_types::{KvPair, Record, ResultSet};
use shmdb_wire::{Decoder, Encoder, Opcode, ReadRequest, Reply, Request, WriteRequest};

const BUFFER: usize = 1 << 20;

fn ycsb_record(fields: usize) -> Record {
    (0..fields)
        .map(|i| KvPair::new(format!("field{i}"), "x".repeat(100)))
        .collect()
}

// ============================================================================
// Request Payloads
// ============================================================================

fn bench_request_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_encode");
    let mut buf = vec![0u8; BUFFER];

    let read = Request::Read(ReadRequest {
        table: "usertable".to_string(),
        key: "user0000000042".to_string(),
        fields: vec![],
    });
    group.bench_function("read", |b| {
        b.iter(|| {
            let mut enc = Encoder::new(&mut buf);
            black_box(&read).encode_payload(&mut enc).unwrap();
            black_box(enc.position());
        });
    });

    for fields in [1, 10, 50] {
        let insert = Request::Insert(WriteRequest {
            table: "usertable".to_string(),
            key: "user0000000042".to_string(),
            values: ycsb_record(fields),
        });
        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::new("insert", fields), &insert, |b, insert| {
            b.iter(|| {
                let mut enc = Encoder::new(&mut buf);
                black_box(insert).encode_payload(&mut enc).unwrap();
                black_box(enc.position());
            });
        });
    }

    group.finish();
}

fn bench_request_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_decode");

    for fields in [1, 10, 50] {
        let insert = Request::Insert(WriteRequest {
            table: "usertable".to_string(),
            key: "user0000000042".to_string(),
            values: ycsb_record(fields),
        });
        let mut buf = vec![0u8; BUFFER];
        insert.encode_payload(&mut Encoder::new(&mut buf)).unwrap();

        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::new("insert", fields), &buf, |b, buf| {
            b.iter(|| {
                let decoded = Request::decode(Opcode::Insert, &mut Decoder::new(black_box(buf)));
                black_box(decoded.unwrap());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Scan Replies
// ============================================================================

fn bench_scan_reply(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_reply");
    let mut buf = vec![0u8; BUFFER];

    for rows in [1, 10, 100] {
        let reply = Reply::Rows((0..rows).map(|_| ycsb_record(10)).collect());
        group.throughput(Throughput::Bytes(reply.encoded_len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", rows), &reply, |b, reply| {
            b.iter(|| {
                reply.encode_payload(&mut Encoder::new(&mut buf)).unwrap();
            });
        });

        reply.encode_payload(&mut Encoder::new(&mut buf)).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", rows), &buf, |b, buf| {
            b.iter(|| {
                let rows: ResultSet = Decoder::new(black_box(buf)).take().unwrap();
                black_box(rows);
            });
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    wire_benches,
    bench_request_encode,
    bench_request_decode,
    bench_scan_reply
);

criterion_main!(wire_benches);
