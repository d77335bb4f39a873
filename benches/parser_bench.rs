//! Benchmarks for the NEM12 parser.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use nem12_parser::diagnostics::NullSink;
use nem12_parser::parser::{Nem12Parser, classify, parse_date_field, parse_volume_field};

/// Build a file with `blocks` meter reads of `days` readings each.
fn sample_file(blocks: usize, days: u32) -> Vec<String> {
    let mut lines = vec!["100,NEM12,201801211010,MYENERGY,OTHERENERGY".to_string()];
    for block in 0..blocks {
        lines.push(format!("200,{:010},KWH", block));
        for day in 1..=days {
            lines.push(format!("300,202301{:02},{}.{},A", day, day * 3, day % 10));
        }
    }
    lines.push("900".to_string());
    lines
}

fn bench_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("fields");

    group.bench_function("classify", |b| {
        b.iter(|| classify(black_box("300,20230101,12.5,A")))
    });

    group.bench_function("date", |b| b.iter(|| parse_date_field(black_box("20230101"))));

    group.bench_function("volume", |b| b.iter(|| parse_volume_field(black_box("1234.567"))));

    group.finish();
}

fn bench_parse_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_file");
    let parser = Nem12Parser::new();

    for (blocks, days) in [(1, 28), (100, 28)] {
        let lines = sample_file(blocks, days);
        group.throughput(Throughput::Elements(lines.len() as u64));
        group.bench_function(format!("{}x{}", blocks, days), |b| {
            b.iter(|| parser.parse_with_sink(black_box(&lines), &mut NullSink))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fields, bench_parse_file);
criterion_main!(benches);
