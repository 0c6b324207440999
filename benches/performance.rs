// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for surface-bridge
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Dispatch latency per message type
//! - Registry lookup cost as bindings grow
//! - Filter compilation
//! - Relative codec throughput

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use surface_bridge::control::{
    BindingRegistry, ButtonControl, ButtonEvent, Channel, ContinuousControl, Dispatcher,
    RelativeCodec, RelativeControl, RelativeEncoding, Trigger,
};
use surface_bridge::notes::compile_filters;

/// Control that does nothing, so only dispatch is measured
struct Sink;

impl ButtonControl for Sink {
    fn trigger(&self, event: ButtonEvent, velocity: f64) {
        black_box((event, velocity));
    }
}

impl ContinuousControl for Sink {
    fn handle_value(&self, normalized: f64) {
        black_box(normalized);
    }
}

impl RelativeControl for Sink {
    fn handle_delta(&self, delta: f64) {
        black_box(delta);
    }
}

fn mixer_dispatcher() -> Dispatcher {
    let registry = BindingRegistry::shared();
    {
        let mut registry = registry.write();
        for strip in 0..8u8 {
            registry.bind_hi_res(Arc::new(Sink), Channel::Fixed(0), strip);
            registry.bind_relative(
                Arc::new(Sink),
                Channel::Fixed(0),
                16 + strip,
                RelativeCodec::new(RelativeEncoding::SignedBit),
            );
            registry.bind_note_button(Arc::new(Sink), Channel::Fixed(0), strip, Trigger::Any);
        }
        registry.bind_pitch_bend(Arc::new(Sink), Channel::Any);
    }
    Dispatcher::new(registry).with_forward(|s, d1, d2| {
        black_box((s, d1, d2));
    })
}

/// Benchmark one message of each routed family
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let mut dispatcher = mixer_dispatcher();

    group.bench_function("absolute_hi_res_pair", |b| {
        b.iter(|| {
            dispatcher.dispatch(0xB0, black_box(3), 64);
            black_box(dispatcher.dispatch(0xB0, black_box(35), 12))
        })
    });

    group.bench_function("relative", |b| {
        b.iter(|| black_box(dispatcher.dispatch(0xB0, black_box(18), 65)))
    });

    group.bench_function("note_button", |b| {
        b.iter(|| black_box(dispatcher.dispatch(0x90, black_box(5), 127)))
    });

    group.bench_function("pitch_bend", |b| {
        b.iter(|| black_box(dispatcher.dispatch(0xE7, 0x12, black_box(0x40))))
    });

    group.bench_function("unbound", |b| {
        b.iter(|| black_box(dispatcher.dispatch(0xB3, black_box(100), 1)))
    });

    group.finish();
}

/// Benchmark lookup as the number of CC bindings grows
fn bench_registry_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_size");

    for count in [1u8, 32, 128].iter() {
        let registry = BindingRegistry::shared();
        {
            let mut registry = registry.write();
            for cc in 0..*count {
                registry.bind_continuous(Arc::new(Sink), Channel::Any, cc);
            }
        }
        let mut dispatcher = Dispatcher::new(registry);

        group.bench_with_input(BenchmarkId::new("dispatch", count), count, |b, &count| {
            b.iter(|| black_box(dispatcher.dispatch(0xB1, count - 1, 100)))
        });
    }

    group.finish();
}

/// Benchmark bind and unbind of an ANY-channel control
fn bench_bind_unbind(c: &mut Criterion) {
    let mut registry = BindingRegistry::new();
    let control = Arc::new(Sink);

    c.bench_function("bind_unbind_any_channel", |b| {
        b.iter(|| {
            registry.bind_cc_button(control.clone(), Channel::Any, 64, Trigger::Value(127));
            registry.unbind(&control);
        })
    });
}

/// Benchmark filter compilation
fn bench_filters(c: &mut Criterion) {
    let patterns = ["9?????", "8?????", "B?40??", "B?01??", "E?????", "D0????"];

    c.bench_function("compile_filters", |b| {
        b.iter(|| black_box(compile_filters(black_box(&patterns[..]))))
    });

    let filter = compile_filters(&patterns[..]).unwrap();
    c.bench_function("filter_matches", |b| {
        b.iter(|| black_box(filter.matches(black_box(0x95), 60, 100)))
    });
}

/// Benchmark the relative codecs
fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for encoding in RelativeEncoding::ALL {
        let codec = RelativeCodec::with_sensitivity(encoding, 0.5);
        group.bench_with_input(
            BenchmarkId::new("decode_all", format!("{:?}", encoding)),
            &codec,
            |b, codec| {
                b.iter(|| {
                    let mut sum = 0.0;
                    for raw in 0..=127u8 {
                        sum += codec.decode(black_box(raw));
                    }
                    black_box(sum)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch,
    bench_registry_size,
    bench_bind_unbind,
    bench_filters,
    bench_codecs
);

criterion_main!(benches);
