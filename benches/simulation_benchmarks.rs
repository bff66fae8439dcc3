//! Simulation benchmarks with 95% confidence intervals.
//!
//! - Concentration integration over a working day
//! - Deposited dose and infection risk on Monte Carlo batches
//! - CO2 ventilation fit
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use airsim::prelude::*;
use airsim::scenarios::{OfficeConfig, OfficeScenario};

fn office_hours() -> Interval {
    Interval::specific(vec![(8.0, 12.0), (13.0, 17.0)])
}

fn concentration_model() -> ConcentrationModel {
    ConcentrationModel::new(
        Room::new(75.0),
        Ventilation::multiple(vec![
            AirChange::new(Interval::specific(vec![(0.0, 24.0)]), 0.25).into(),
            HepaFilter::new(office_hours(), 250.0).into(),
        ]),
        InfectedPopulation::new(
            Population::new(Occupancy::fixed(1, office_hours()), Activity::seated(), Mask::no_mask()),
            Virus::sars_cov_2(),
            Expiration::speaking(),
        ),
    )
}

/// Concentration at every quarter hour on a fresh model.
fn bench_concentration(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concentration");
    group.sample_size(100);
    group.confidence_level(0.95);

    group.bench_function("quarter_hours", |b| {
        b.iter(|| {
            let model = concentration_model();
            let total: f64 = (32..=72)
                .filter_map(|i| model.concentration(f64::from(i) * 0.25).ok())
                .map(|c| c.mean())
                .sum();
            black_box(total)
        });
    });

    group.bench_function("integrated_day", |b| {
        b.iter(|| {
            let model = concentration_model();
            black_box(model.integrated_concentration(8.0, 17.0).map(|c| c.mean()))
        });
    });

    group.finish();
}

/// Batch construction and infection probability of the office scenario.
fn bench_office_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Office_Batch");
    group.sample_size(30);
    group.confidence_level(0.95);

    let scenario = OfficeScenario::with_config(OfficeConfig::default());
    for size in [1_usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("infection_probability", size), &size, |b, &n| {
            b.iter(|| {
                let mut rng = SimRng::new(42);
                let model = scenario.exposure_model(true, n, &mut rng);
                black_box(model.and_then(|m| m.infection_probability()).map(|p| p.mean()))
            });
        });
    }

    group.finish();
}

/// CO2 fit of a synthetic trace with three ventilation segments.
fn bench_co2_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("CO2_Fit");
    group.sample_size(10);
    group.confidence_level(0.95);

    let times: Vec<f64> = (0..=90).map(|i| 8.0 + f64::from(i) * 0.1).collect();
    let build = |co2: Vec<f64>| {
        Co2DataModel::new(
            Room::new(75.0),
            IntPiecewiseConstant::new(vec![8.0, 12.0, 13.0, 17.0], vec![2, 1, 2])?,
            vec![8.0, 12.0, 13.0, 17.0],
            times.clone(),
            co2,
        )
    };
    let trace = build(vec![0.0; times.len()])
        .and_then(|m| m.concentrations_from_params(0.51, &[0.25, 2.45, 0.25]));
    let Ok(model) = trace.and_then(build) else {
        return;
    };

    group.bench_function("three_segments", |b| {
        b.iter(|| black_box(model.fit().map(|fit| fit.residual)));
    });

    group.finish();
}

criterion_group!(benches, bench_concentration, bench_office_batch, bench_co2_fit);
criterion_main!(benches);
