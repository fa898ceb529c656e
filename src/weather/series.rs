use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Utc};
use chrono_tz::Tz;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

/// One weather observation in canonical units.
///
/// Irradiance in W/m², wind speed in m/s, air temperature in °C. A value that
/// the source left empty is NaN. `dni` and `dhi` stay NaN until they are
/// derived by the decomposition or read from a source that carries them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherSample {
    pub timestamp: DateTime<Utc>,
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub wind_speed: f64,
    pub temp_air: f64,
}

impl WeatherSample {
    /// Sample with only the measured quantities; components unknown.
    pub fn measured(timestamp: DateTime<Utc>, ghi: f64, wind_speed: f64, temp_air: f64) -> Self {
        Self {
            timestamp,
            ghi,
            dni: f64::NAN,
            dhi: f64::NAN,
            wind_speed,
            temp_air,
        }
    }

    pub fn with_components(mut self, dni: f64, dhi: f64) -> Self {
        self.dni = dni;
        self.dhi = dhi;
        self
    }
}

/// Time-ordered weather samples with unique timestamps.
///
/// Gaps are allowed and never filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherSeries {
    samples: Vec<WeatherSample>,
}

impl WeatherSeries {
    /// Sort by timestamp and drop repeated timestamps, keeping the first.
    pub fn from_samples(mut samples: Vec<WeatherSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        let before = samples.len();
        samples.dedup_by_key(|s| s.timestamp);
        let dropped = before - samples.len();
        if dropped > 0 {
            warn!(dropped, "duplicate weather timestamps dropped");
        }
        Self { samples }
    }

    pub fn samples(&self) -> &[WeatherSample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeatherSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Hourly series, each field averaged over the samples in its hour.
    ///
    /// Buckets are labelled with the start of the hour. NaN values are left
    /// out of the mean; a bucket without any finite value for a field keeps
    /// NaN for it. Hours without samples do not appear in the output.
    pub fn resample_hourly(&self) -> WeatherSeries {
        let samples: Vec<WeatherSample> = self
            .samples
            .iter()
            .chunk_by(|s| hour_start(s.timestamp))
            .into_iter()
            .map(|(hour, bucket)| {
                let bucket: Vec<&WeatherSample> = bucket.collect();
                WeatherSample {
                    timestamp: hour,
                    ghi: finite_mean(bucket.iter().map(|s| s.ghi)),
                    dni: finite_mean(bucket.iter().map(|s| s.dni)),
                    dhi: finite_mean(bucket.iter().map(|s| s.dhi)),
                    wind_speed: finite_mean(bucket.iter().map(|s| s.wind_speed)),
                    temp_air: finite_mean(bucket.iter().map(|s| s.temp_air)),
                }
            })
            .collect();

        debug!(input = self.len(), output = samples.len(), "resampled to hourly");
        WeatherSeries { samples }
    }

    /// Samples whose local calendar year in `tz` equals `year`.
    pub fn filter_year(&self, year: i32, tz: Tz) -> WeatherSeries {
        WeatherSeries {
            samples: self
                .samples
                .iter()
                .filter(|s| s.timestamp.with_timezone(&tz).year() == year)
                .copied()
                .collect(),
        }
    }

    /// Largest finite GHI value, if any.
    pub fn max_ghi(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| s.ghi)
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }
}

fn hour_start(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    // truncation to whole hours cannot overflow for any real timestamp
    timestamp
        .duration_trunc(TimeDelta::hours(1))
        .unwrap_or(timestamp)
}

fn finite_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_from_samples_sorts_and_dedups() {
        let series = WeatherSeries::from_samples(vec![
            WeatherSample::measured(at(2, 0), 30.0, 1.0, 10.0),
            WeatherSample::measured(at(1, 0), 10.0, 1.0, 10.0),
            WeatherSample::measured(at(1, 0), 99.0, 1.0, 10.0),
        ]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.samples()[0].ghi, 10.0);
        assert_eq!(series.first_timestamp(), Some(at(1, 0)));
        assert_eq!(series.last_timestamp(), Some(at(2, 0)));
    }

    #[test]
    fn test_resample_hourly_mean() {
        let series = WeatherSeries::from_samples(vec![
            WeatherSample::measured(at(10, 0), 100.0, 1.0, 20.0),
            WeatherSample::measured(at(10, 15), 200.0, 3.0, 21.0),
            WeatherSample::measured(at(10, 30), f64::NAN, 2.0, 22.0),
            WeatherSample::measured(at(10, 45), 300.0, 2.0, 23.0),
            WeatherSample::measured(at(13, 0), 50.0, 0.0, 25.0),
        ]);

        let hourly = series.resample_hourly();
        assert_eq!(hourly.len(), 2, "missing hours are not filled");

        let first = hourly.samples()[0];
        assert_eq!(first.timestamp, at(10, 0));
        assert_relative_eq!(first.ghi, 200.0);
        assert_relative_eq!(first.wind_speed, 2.0);
        assert_relative_eq!(first.temp_air, 21.5);
        assert!(first.dni.is_nan());

        assert_eq!(hourly.samples()[1].timestamp, at(13, 0));
    }

    #[test]
    fn test_resample_hourly_is_stable_on_hourly_data() {
        let series = WeatherSeries::from_samples(
            (0..24)
                .map(|h| WeatherSample::measured(at(h, 0), h as f64, 1.0, 15.0))
                .collect(),
        );
        let hourly = series.resample_hourly();
        assert_eq!(hourly.timestamps(), series.timestamps());
        for (a, b) in hourly.iter().zip(series.iter()) {
            assert_eq!(a.ghi, b.ghi);
            assert_eq!(a.temp_air, b.temp_air);
        }
    }

    #[test]
    fn test_filter_year_uses_local_calendar() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        // 23:30 UTC on New Year's Eve is already 2015 in Berlin
        let eve = Utc.with_ymd_and_hms(2014, 12, 31, 23, 30, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2014, 12, 31, 20, 0, 0).unwrap();
        let series = WeatherSeries::from_samples(vec![
            WeatherSample::measured(earlier, 0.0, 1.0, 1.0),
            WeatherSample::measured(eve, 0.0, 1.0, 1.0),
        ]);

        let filtered = series.filter_year(2015, tz);
        assert_eq!(filtered.timestamps(), vec![eve]);
    }

    #[test]
    fn test_max_ghi_skips_nan() {
        let series = WeatherSeries::from_samples(vec![
            WeatherSample::measured(at(1, 0), 120.0, 1.0, 1.0),
            WeatherSample::measured(at(2, 0), f64::NAN, 1.0, 1.0),
            WeatherSample::measured(at(3, 0), 80.0, 1.0, 1.0),
        ]);
        assert_eq!(series.max_ghi(), Some(120.0));
        assert_eq!(WeatherSeries::default().max_ghi(), None);
    }
}
