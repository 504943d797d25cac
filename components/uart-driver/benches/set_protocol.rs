use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use uart750_ddk::mock::RamRegisters;
use uart750_driver::baud::{self, DEFAULT_TABLE};
use uart750_driver::protocol;
use uart750_driver::sim::SimUart;
use uart750_driver::{Command, IerShadow, ProtocolDescriptor};

fn bench_protocol(c: &mut Criterion) {
    let desc = ProtocolDescriptor::with_baud(9600);

    // Plain RAM: the cost of the sequence itself
    let ram = RamRegisters::new();
    let ier = IerShadow::new();
    c.bench_function("set_protocol_ram", |b| {
        b.iter(|| protocol::set_protocol(&ram, &ier, &DEFAULT_TABLE, black_box(&desc)))
    });

    let sim = SimUart::new();
    let ier = IerShadow::new();
    c.bench_function("set_protocol_sim", |b| {
        b.iter(|| {
            sim.clear_log();
            protocol::set_protocol(&sim, &ier, &DEFAULT_TABLE, black_box(&desc))
        })
    });

    c.bench_function("baud_lookup_last", |b| {
        b.iter(|| baud::lookup(&DEFAULT_TABLE, black_box(3_686_400)))
    });
}

fn bench_codec(c: &mut Criterion) {
    let record = Command::SetParam {
        uart_id: 1,
        protocol: ProtocolDescriptor::with_baud(115_200),
    }
    .encode()
    .unwrap();

    c.bench_function("command_decode", |b| {
        b.iter(|| Command::decode(black_box(&record)))
    });
}

criterion_group!(benches, bench_protocol, bench_codec);
criterion_main!(benches);
