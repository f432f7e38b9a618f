use agprs::{
    AmbulatoryProfileEngine, AnalyticsRequest, ArtifactFilter, BatchAnalyzer, BatchConfig,
    BiomarkerConfig, BiomarkerType, EngineConfig, HourlyPercentileBuilder, PatientBiomarkerPayload,
    PercentagesPayload, PercentileTrack, Reading,
};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

/// Benchmarks for the ambulatory profile pipeline
///
/// Single reports should stay well under a millisecond; batch runs check
/// that throughput scales with request count.

fn create_request(seed: usize) -> AnalyticsRequest {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let track: Vec<Option<f64>> = (0..24)
        .map(|hour| Some(if hour < 6 { 110.0 } else { 90.0 + ((hour + seed) % 17) as f64 * 7.5 }))
        .collect();

    AnalyticsRequest::new(
        BiomarkerType::Glucose,
        PatientBiomarkerPayload {
            start_at: Some(start),
            end_at: Some(start + Duration::days(14)),
            statistics: Some(json!({
                "average": 152.0,
                "standardDeviation": 48.0,
                "coefficientOfVariationPercentage": 31.6,
                "a1c": 7.0,
                "gmi": 7.0,
                "totalWearTimeMinutes": 18000 + seed,
                "percentBelow54": 1,
                "percentBelow70": 4,
                "percentBetween70And180": 68,
                "percentAbove180": 28,
                "percentAbove250": 8
            })),
            percentages: Some(PercentagesPayload {
                p5: Some(track.clone()),
                p25: Some(track.clone()),
                p50: Some(track.clone()),
                p75: Some(track.clone()),
                p95: Some(track),
            }),
        },
    )
    .with_conditions(["olderAdult"])
}

fn bench_single_report(c: &mut Criterion) {
    let config = EngineConfig::default();
    let engine = AmbulatoryProfileEngine::new(&config);
    let request = create_request(0);

    c.bench_function("analyze_single_report", |b| {
        b.iter(|| engine.analyze(black_box(&request)))
    });
}

fn bench_artifact_filter(c: &mut Criterion) {
    let filter = ArtifactFilter::for_biomarker(&BiomarkerConfig::glucose_default());
    let mut values = [None; 24];
    for (hour, slot) in values.iter_mut().enumerate() {
        *slot = Some(if hour % 8 < 6 { 100.0 } else { 15.0 });
    }
    let track = PercentileTrack::new(values);

    c.bench_function("clean_track", |b| b.iter(|| filter.clean_track(black_box(&track))));
}

fn bench_batch(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut group = c.benchmark_group("Batch Analysis");

    for &size in &[10, 100, 1000] {
        let requests: Vec<AnalyticsRequest> = (0..size).map(create_request).collect();
        let analyzer = BatchAnalyzer::with_config(AmbulatoryProfileEngine::new(&config), BatchConfig::default());

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("analyze_all", size), &requests, |b, requests| {
            b.iter(|| analyzer.analyze_all(requests))
        });
    }

    group.finish();
}

fn bench_hourly_percentiles(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    // 14 days of 5-minute readings
    let readings: Vec<Reading> = (0..14 * 288)
        .map(|i| Reading {
            timestamp: start + Duration::minutes(5 * i as i64),
            value: 80.0 + (i % 97) as f64 * 1.5,
            sensor_id: "bench".to_string(),
        })
        .collect();
    let builder = HourlyPercentileBuilder::new(3);

    c.bench_function("hourly_percentiles_14d", |b| b.iter(|| builder.build(black_box(&readings))));
}

criterion_group!(
    benches,
    bench_single_report,
    bench_artifact_filter,
    bench_batch,
    bench_hourly_percentiles
);
criterion_main!(benches);
