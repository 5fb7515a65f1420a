// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for ccreplay
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Time index construction
//! - Seek latency (the scrubbing hot path)
//! - Incremental advance at transport tick rate
//! - Statistics over a full session
//! - Raw message parsing

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ccreplay::capture::EventCapture;
use ccreplay::capture::ControllerFilter;
use ccreplay::midi::ControlChange;
use ccreplay::session::{ControllerEvent, EventLog};
use ccreplay::stats;
use ccreplay::timeline::{ControllerSink, Scrubber, TimeIndex};

/// Sink that only counts dispatches
#[derive(Default)]
struct CountingSink(usize);

impl ControllerSink for CountingSink {
    fn send_message(&mut self, _console: u8, _number: u8, _value: u8) {
        self.0 += 1;
    }
}

/// A session of `events` moves spread over `duration` seconds
fn session(events: usize, duration: f32) -> EventLog {
    let mut rng = StdRng::seed_from_u64(1);
    EventLog::from_events(
        (0..events)
            .map(|_| {
                ControllerEvent::new(
                    rng.gen_range(0.0..duration),
                    rng.gen_range(0..3),
                    1,
                    rng.gen_range(1..=128),
                    rng.gen_range(0..=127),
                )
            })
            .collect(),
    )
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(20);

    for (events, duration) in [(1_000, 60.0), (10_000, 600.0), (100_000, 3600.0)] {
        let log = session(events, duration);
        group.bench_with_input(BenchmarkId::from_parameter(events), &log, |b, log| {
            b.iter(|| black_box(TimeIndex::build(log, duration).bucket_count()))
        });
    }
    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    let duration = 600.0;
    let log = Arc::new(session(50_000, duration));
    let mut scrubber = Scrubber::load(log, duration);
    let mut rng = StdRng::seed_from_u64(2);

    c.bench_function("seek_random", |b| {
        b.iter(|| {
            let mut sink = CountingSink::default();
            scrubber.seek(rng.gen_range(0.0..duration), &mut sink);
            black_box(sink.0)
        })
    });
}

fn bench_advance(c: &mut Criterion) {
    let duration = 600.0;
    let log = Arc::new(session(50_000, duration));

    // One second of 1 ms ticks
    c.bench_function("advance_1s_of_ticks", |b| {
        b.iter_batched(
            || {
                let mut scrubber = Scrubber::load(Arc::clone(&log), duration);
                scrubber.play(100.0, &mut CountingSink::default());
                scrubber
            },
            |mut scrubber| {
                let mut sink = CountingSink::default();
                for tick in 1..=1000 {
                    let _ = scrubber.advance(100.0 + tick as f32 * 0.001, &mut sink);
                }
                black_box(sink.0)
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_statistics(c: &mut Criterion) {
    let log = session(100_000, 3600.0);
    c.bench_function("statistics_100k", |b| {
        b.iter(|| black_box(stats::compute(&log, 3600.0).duration()))
    });
}

fn bench_capture(c: &mut Criterion) {
    let mut capture = EventCapture::new();
    capture.configure(0, 0, ControllerFilter::all());
    let now = std::time::Instant::now();

    c.bench_function("parse_control_change", |b| {
        b.iter(|| black_box(ControlChange::parse(black_box(&[0xB3, 7, 100]))))
    });

    c.bench_function("capture_on_message", |b| {
        b.iter(|| black_box(capture.on_message(0, black_box(&[0xB0, 7, 100]), now)))
    });
}

criterion_group!(
    benches,
    bench_index_build,
    bench_seek,
    bench_advance,
    bench_statistics,
    bench_capture,
);
criterion_main!(benches);
