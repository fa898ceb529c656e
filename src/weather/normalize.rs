//! Weather source normalisation.
//!
//! Turns a delimited weather file with source-specific column names into a
//! canonical [`WeatherSeries`]. Schema and timestamp problems are fatal; an
//! empty or missing numeric cell becomes NaN.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::StringRecord;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::{WeatherSample, WeatherSeries};
use crate::error::PipelineError;

/// Source column names for each canonical quantity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnMapping {
    pub time: String,
    pub ghi: String,
    pub wind_speed: String,
    pub temp_air: String,
    /// Direct normal irradiance, when the source already carries it
    #[serde(default)]
    pub dni: Option<String>,
    /// Diffuse horizontal irradiance, when the source already carries it
    #[serde(default)]
    pub dhi: Option<String>,
}

impl ColumnMapping {
    pub fn new(
        time: impl Into<String>,
        ghi: impl Into<String>,
        wind_speed: impl Into<String>,
        temp_air: impl Into<String>,
    ) -> Self {
        Self {
            time: time.into(),
            ghi: ghi.into(),
            wind_speed: wind_speed.into(),
            temp_air: temp_air.into(),
            dni: None,
            dhi: None,
        }
    }

    pub fn with_components(mut self, dni: impl Into<String>, dhi: impl Into<String>) -> Self {
        self.dni = Some(dni.into());
        self.dhi = Some(dhi.into());
        self
    }

    /// True when both irradiance components are read from the source.
    pub fn provides_components(&self) -> bool {
        self.dni.is_some() && self.dhi.is_some()
    }
}

/// Reads one weather source into a [`WeatherSeries`].
#[derive(Debug, Clone)]
pub struct WeatherNormalizer {
    name: String,
    delimiter: u8,
    mapping: ColumnMapping,
    timezone: Tz,
}

struct ColumnIndex {
    time: usize,
    ghi: usize,
    wind_speed: usize,
    temp_air: usize,
    components: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimestampKind {
    /// Carries its own UTC offset
    OffsetAware,
    /// Wall-clock time in the source time zone
    Naive,
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%#z",
    "%Y-%m-%dT%H:%M:%S%#z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

impl WeatherNormalizer {
    pub fn new(name: impl Into<String>, delimiter: u8, mapping: ColumnMapping, timezone: Tz) -> Self {
        Self {
            name: name.into(),
            delimiter,
            mapping,
            timezone,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<WeatherSeries, PipelineError> {
        let path = path.as_ref();
        info!(source = %self.name, path = %path.display(), "reading weather source");
        let file = File::open(path)?;
        self.read(file)
    }

    pub fn read<R: Read>(&self, reader: R) -> Result<WeatherSeries, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let index = self.resolve_columns(&headers)?;

        let mut kind = None;
        let mut samples = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = record.position().map(|p| p.line() as usize).unwrap_or(i + 2);

            let raw_time = record.get(index.time).unwrap_or_default();
            let timestamp = self.parse_timestamp(raw_time, row, &mut kind)?;

            let ghi = self.numeric(&record, index.ghi, &self.mapping.ghi, row)?;
            let wind_speed = self.numeric(&record, index.wind_speed, &self.mapping.wind_speed, row)?;
            let temp_air = self.numeric(&record, index.temp_air, &self.mapping.temp_air, row)?;
            let mut sample = WeatherSample::measured(timestamp, ghi, wind_speed, temp_air);

            if let (Some((dni_idx, dhi_idx)), Some(dni_col), Some(dhi_col)) =
                (index.components, &self.mapping.dni, &self.mapping.dhi)
            {
                let dni = self.numeric(&record, dni_idx, dni_col, row)?;
                let dhi = self.numeric(&record, dhi_idx, dhi_col, row)?;
                sample = sample.with_components(dni, dhi);
            }

            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(PipelineError::EmptySource(self.name.clone()));
        }

        let series = WeatherSeries::from_samples(samples);
        debug!(source = %self.name, samples = series.len(), "weather source normalised");
        Ok(series)
    }

    fn resolve_columns(&self, headers: &StringRecord) -> Result<ColumnIndex, PipelineError> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| PipelineError::Schema {
                    source_name: self.name.clone(),
                    column: column.to_string(),
                })
        };

        let components = match (&self.mapping.dni, &self.mapping.dhi) {
            (Some(dni), Some(dhi)) => Some((find(dni.as_str())?, find(dhi.as_str())?)),
            _ => None,
        };

        Ok(ColumnIndex {
            time: find(self.mapping.time.as_str())?,
            ghi: find(self.mapping.ghi.as_str())?,
            wind_speed: find(self.mapping.wind_speed.as_str())?,
            temp_air: find(self.mapping.temp_air.as_str())?,
            components,
        })
    }

    fn parse_timestamp(
        &self,
        raw: &str,
        row: usize,
        kind: &mut Option<TimestampKind>,
    ) -> Result<DateTime<Utc>, PipelineError> {
        let (parsed_kind, timestamp) = if let Some(t) = parse_offset_aware(raw) {
            (TimestampKind::OffsetAware, Some(t.with_timezone(&Utc)))
        } else if let Some(naive) = parse_naive(raw) {
            (TimestampKind::Naive, self.localise(naive))
        } else {
            return Err(PipelineError::Parse {
                row,
                value: raw.to_string(),
            });
        };

        match *kind {
            None => *kind = Some(parsed_kind),
            Some(expected) if expected != parsed_kind => {
                return Err(PipelineError::MixedTimestamps {
                    row,
                    value: raw.to_string(),
                })
            }
            Some(_) => {}
        }

        // a wall-clock time skipped by a DST change does not exist
        timestamp.ok_or_else(|| PipelineError::Parse {
            row,
            value: raw.to_string(),
        })
    }

    fn localise(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    }

    fn numeric(
        &self,
        record: &StringRecord,
        index: usize,
        column: &str,
        row: usize,
    ) -> Result<f64, PipelineError> {
        let raw = record.get(index).unwrap_or_default();
        parse_numeric(raw, self.delimiter).ok_or_else(|| PipelineError::InvalidValue {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
    }
}

fn parse_offset_aware(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    })
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse a numeric cell. Empty and not-available markers read as NaN. Files
/// not separated by commas may use a decimal comma.
fn parse_numeric(raw: &str, delimiter: u8) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw == "-"
        || ["nan", "na", "null"].iter().any(|m| raw.eq_ignore_ascii_case(m))
    {
        return Some(f64::NAN);
    }

    match raw.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) if delimiter != b',' && raw.contains(',') => raw.replace(',', ".").parse().ok(),
        Err(_) => None,
    }
}
