//! Benchmarks for the per-port aggregator.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use portwatch::synthetic::FixedSynthetic;
use portwatch::{schema, PacketDescriptor, PortAggregator};

fn packet_mix() -> Vec<PacketDescriptor> {
    (0..10_000u32)
        .map(|i| match i % 4 {
            0 => PacketDescriptor::udp(53, 80),
            1 => PacketDescriptor::non_ip(60),
            _ => PacketDescriptor::tcp(1024 + (i % 64) as u16, 64 + (i % 1400) as usize),
        })
        .collect()
}

fn bench_observe(c: &mut Criterion) {
    let packets = packet_mix();

    c.bench_function("observe_10k_packets", |b| {
        b.iter(|| {
            let mut aggregator = PortAggregator::new(Box::new(FixedSynthetic::default()));
            for packet in &packets {
                black_box(aggregator.observe(packet));
            }
            aggregator
        })
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let mut aggregator = PortAggregator::new(Box::new(FixedSynthetic::default()));
    for packet in packet_mix() {
        aggregator.observe(&packet);
    }
    let expected: Vec<String> = portwatch::features::PORT_FEATURE_COLUMNS
        .iter()
        .rev()
        .map(|name| name.to_string())
        .collect();

    c.bench_function("snapshot_and_align_65_ports", |b| {
        b.iter(|| {
            let rows = aggregator.snapshot_and_advance();
            let aligned: Vec<_> = rows.iter().map(|row| schema::align(row, &expected)).collect();
            black_box(aligned)
        })
    });
}

criterion_group!(benches, bench_observe, bench_snapshot);
criterion_main!(benches);
