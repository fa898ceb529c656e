#![cfg(test)]
//! Full-year replay at station resolution.
//!
//! A year of 1-minute samples through all five arrays of the default
//! installation, with the real solar position and device models:
//! - decomposition of 525 600 samples
//! - five concurrent array simulations on the blocking pool
//! - two sources running at the same time on one pipeline

use std::time::{Duration, Instant};

use chrono::{TimeDelta, TimeZone, Utc};
use pv_yield::config::Config;
use pv_yield::pipeline::{Pipeline, SeriesOptions};
use pv_yield::solar::SpaSolarPosition;
use pv_yield::weather::{WeatherSample, WeatherSeries};

/// Hazy clear sky: 70 % of a 1000 W/m² beam on the horizontal.
fn synthetic_year(step_minutes: i64) -> WeatherSeries {
    let sun = SpaSolarPosition::new();
    let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
    let steps = 365 * 24 * 60 / step_minutes;
    WeatherSeries::from_samples(
        (0..steps)
            .map(|i| {
                let t = start + TimeDelta::minutes(i * step_minutes);
                let zenith = sun.position_at(t, 52.45544, 13.52481).expect("sun position").zenith;
                let ghi = 700.0 * zenith.to_radians().cos().max(0.0);
                WeatherSample::measured(t, ghi, 3.0, 10.0)
            })
            .collect(),
    )
}

fn default_pipeline() -> Pipeline {
    let toml = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml"))
        .expect("default config");
    let mut cfg = Config::from_toml_str(&toml).expect("valid default config");
    cfg.report.csv = false;
    cfg.report.chart = false;
    cfg.report.json = false;
    Pipeline::from_config(&cfg).expect("pipeline")
}

/// Test: one year of minute data finishes well inside the run limit
#[tokio::test]
#[ignore] // Ignore by default as this is a slow test
async fn test_minute_resolution_year() {
    let pipeline = default_pipeline();
    let series = synthetic_year(1);
    assert_eq!(series.len(), 525_600);

    let start = Instant::now();
    let out = pipeline
        .run_series("synthetic", series, SeriesOptions::default())
        .await
        .unwrap();
    let elapsed = start.elapsed();
    println!("Year replay took {:?}", elapsed);

    assert!(elapsed < Duration::from_secs(120), "replay took {:?}", elapsed);
    assert_eq!(out.report.arrays().len(), 5);

    for (array, config) in out.report.arrays().iter().zip(pipeline.arrays()) {
        let specific = array.annual_kwh / (config.nameplate_dc_w() / 1000.0);
        println!("{}: {:.0} kWh/kWp", array.name, specific);
        assert!(
            (500.0..2500.0).contains(&specific),
            "{} specific yield {:.0} kWh/kWp",
            array.name,
            specific
        );
    }
}

/// Test: two sources on one pipeline at the same time
///
/// The pipeline shares its arrays and device models read-only; concurrent
/// runs must give the same numbers as sequential ones.
#[tokio::test]
#[ignore] // Ignore by default as this is a slow test
async fn test_concurrent_sources_share_pipeline() {
    let pipeline = default_pipeline();
    let series = synthetic_year(10);

    let sequential = pipeline
        .run_series("a", series.clone(), SeriesOptions::default())
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        pipeline.run_series("a", series.clone(), SeriesOptions::default()),
        pipeline.run_series("b", series, SeriesOptions::default()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.report.arrays(), sequential.report.arrays());
    assert_eq!(a.report.arrays(), b.report.arrays());
    assert_eq!(a.report.grand_total_kwh(), b.report.grand_total_kwh());
}
