//! Decode throughput of the hot inbound frames.
//!
//! Realtime car updates arrive per car per interval, so their decode cost
//! dominates the reader task. Run with
//! `cargo bench --features benchmark`.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use pitwire::protocol::codec::ByteReader;
use pitwire::protocol::decode;
use pitwire::test_utils::{
    car_update_frame, entry_car_frame, sample_car_update, sample_entry, sample_session_update,
    session_update_frame,
};
use pitwire::{NullSink, ProtocolEngine, SendFn};

fn decode_benchmarks(c: &mut Criterion) {
    let car_frame = car_update_frame(&sample_car_update(5, 1));
    let session_frame = session_update_frame(&sample_session_update());
    let entry_frame = entry_car_frame(&sample_entry(5));

    let mut group = c.benchmark_group("frame_decode");

    group.throughput(Throughput::Bytes(car_frame.len() as u64));
    group.bench_function("car_update", |b| {
        b.iter(|| {
            let mut r = ByteReader::new(black_box(&car_frame[1..]));
            decode::car_update(&mut r).unwrap()
        })
    });

    group.throughput(Throughput::Bytes(session_frame.len() as u64));
    group.bench_function("session_update", |b| {
        b.iter(|| {
            let mut r = ByteReader::new(black_box(&session_frame[1..]));
            decode::session_update(&mut r).unwrap()
        })
    });

    group.throughput(Throughput::Bytes(entry_frame.len() as u64));
    group.bench_function("entry_list_car", |b| {
        b.iter(|| {
            let mut r = ByteReader::new(black_box(&entry_frame[1..]));
            decode::entry_list_car(&mut r).unwrap()
        })
    });

    group.finish();
}

fn engine_dispatch(c: &mut Criterion) {
    let send: SendFn = Box::new(|_| Ok(()));
    let engine = ProtocolEngine::new("bench", send, Arc::new(NullSink));

    // Prime the cache so car updates pass the roster check.
    engine
        .process_inbound(&pitwire::test_utils::entry_list_frame(1, &[5]))
        .unwrap();
    engine.process_inbound(&entry_car_frame(&sample_entry(5))).unwrap();

    let frame = car_update_frame(&sample_car_update(5, 1));
    c.bench_function("engine_process_car_update", |b| {
        b.iter(|| engine.process_inbound(black_box(&frame)).unwrap())
    });
}

criterion_group!(benches, decode_benchmarks, engine_dispatch);
criterion_main!(benches);
