use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ripper::generator::parse_generated_commands;
use ripper::security::{CommandValidator, Policy, tokenize};
use std::sync::Arc;

const ACCEPTED: &[&str] = &[
    "rg -i TODO src/",
    "tree -L 2 --noreport",
    "git log --oneline -20",
    "git blame -L 1,30 src/core.py",
    "head -n 200 README.md",
    "fd -e py -t f",
];

const REJECTED: &[&str] = &[
    "cat file.txt | grep foo",
    "rm -rf /",
    "ls ../../etc",
    "git push origin main",
    "git branch new-feature",
    "python script.py",
];

fn generate_batch(size: usize) -> Vec<String> {
    ACCEPTED
        .iter()
        .chain(REJECTED.iter())
        .cycle()
        .take(size)
        .map(|s| s.to_string())
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    group.bench_function("plain", |b| {
        b.iter(|| tokenize(black_box("git log --oneline -20 --author=alice src/")))
    });

    group.bench_function("quoted", |b| {
        b.iter(|| tokenize(black_box(r#"rg "fn main\(" -t rust 'src/with space/' -A 3"#)))
    });

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let validator = CommandValidator::new(Arc::new(Policy::read_only_default().unwrap()));
    let mut group = c.benchmark_group("validate");

    group.bench_function("accepted", |b| {
        b.iter(|| {
            for raw in ACCEPTED {
                black_box(validator.validate(black_box(raw)));
            }
        })
    });

    group.bench_function("rejected", |b| {
        b.iter(|| {
            for raw in REJECTED {
                black_box(validator.validate(black_box(raw)));
            }
        })
    });

    for size in [10, 100] {
        let batch = generate_batch(size);
        group.bench_with_input(BenchmarkId::new("batch", size), &batch, |b, batch| {
            b.iter(|| {
                batch
                    .iter()
                    .filter(|raw| validator.validate(raw).is_accepted())
                    .count()
            })
        });
    }

    group.finish();
}

fn bench_parse_generated(c: &mut Criterion) {
    let batch = generate_batch(100);
    let json = serde_json::to_string(&batch).unwrap();
    let list: String = batch.iter().map(|c| format!("- `{}`\n", c)).collect();

    let mut group = c.benchmark_group("parse_generated_commands");
    group.bench_function("json", |b| b.iter(|| parse_generated_commands(black_box(&json))));
    group.bench_function("list", |b| b.iter(|| parse_generated_commands(black_box(&list))));
    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_validate, bench_parse_generated);
criterion_main!(benches);
