
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use evaluate_common::{build_scenario, wide_matrix_specs_baseline};
use netreach_core::Verdict;
use std::hint::black_box;

fn score(verdict: Verdict) -> usize {
    if verdict.allowed { verdict.checks.len() } else { 0 }
}

fn benchmark_evaluate_baseline(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_baseline");
    group.sample_size(40);

    let scenarios: Vec<_> = wide_matrix_specs_baseline()
        .into_iter()
        .map(build_scenario)
        .collect();

    for scenario in &scenarios {
        group.bench_with_input(BenchmarkId::from_parameter(scenario.name), scenario, |b, s| {
            b.iter(|| {
                let verdict = s.engine.diagnose(black_box(&s.request));
                black_box(score(verdict));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_evaluate_baseline);
criterion_main!(benches);
